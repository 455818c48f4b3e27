//! Registration dialog state machine — tracks which field is collected next.

use serde::{Deserialize, Serialize};

use super::model::{Plan, RecordStatus, StudentRecord};

/// The steps of the registration dialog.
///
/// Progresses linearly: AwaitName → AwaitGrade → AwaitExam → AwaitSubjects →
/// AwaitParentPhone → AwaitSchedule → AwaitPlan → AwaitTarget → AwaitReceipt.
/// The receipt step is terminal; a photo there commits the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStep {
    AwaitName,
    AwaitGrade,
    AwaitExam,
    AwaitSubjects,
    AwaitParentPhone,
    AwaitSchedule,
    AwaitPlan,
    AwaitTarget,
    AwaitReceipt,
}

impl EnrollmentStep {
    /// Get the next step in the linear progression, if any.
    pub fn next(&self) -> Option<EnrollmentStep> {
        use EnrollmentStep::*;
        match self {
            AwaitName => Some(AwaitGrade),
            AwaitGrade => Some(AwaitExam),
            AwaitExam => Some(AwaitSubjects),
            AwaitSubjects => Some(AwaitParentPhone),
            AwaitParentPhone => Some(AwaitSchedule),
            AwaitSchedule => Some(AwaitPlan),
            AwaitPlan => Some(AwaitTarget),
            AwaitTarget => Some(AwaitReceipt),
            AwaitReceipt => None,
        }
    }
}

impl std::fmt::Display for EnrollmentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitName => "await_name",
            Self::AwaitGrade => "await_grade",
            Self::AwaitExam => "await_exam",
            Self::AwaitSubjects => "await_subjects",
            Self::AwaitParentPhone => "await_parent_phone",
            Self::AwaitSchedule => "await_schedule",
            Self::AwaitPlan => "await_plan",
            Self::AwaitTarget => "await_target",
            Self::AwaitReceipt => "await_receipt",
        };
        write!(f, "{s}")
    }
}

impl Default for EnrollmentStep {
    fn default() -> Self {
        Self::AwaitName
    }
}

/// Ephemeral per-user dialog state: the partially collected fields plus the
/// step pointer. Never persisted — on completion the fields move by value
/// into a [`StudentRecord`]; a reset discards the draft entirely.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentDraft {
    pub step: EnrollmentStep,
    pub name: Option<String>,
    pub grade: Option<String>,
    pub exam_info: Option<String>,
    pub subjects: Option<String>,
    pub parent_phone: Option<String>,
    pub weekly_schedule: Option<String>,
    pub plan: Option<Plan>,
    pub target: Option<String>,
}

impl EnrollmentDraft {
    /// Store `text` against the field collected by the current step and
    /// advance. Plan selection, the target, and the receipt step carry
    /// their own handling ([`Self::select_plan`], [`Self::set_target`],
    /// the engine's photo path); for those this only advances.
    ///
    /// Returns the new current step.
    pub fn record_answer(&mut self, text: &str) -> EnrollmentStep {
        match self.step {
            EnrollmentStep::AwaitName => self.name = Some(text.to_string()),
            EnrollmentStep::AwaitGrade => self.grade = Some(text.to_string()),
            EnrollmentStep::AwaitExam => self.exam_info = Some(text.to_string()),
            EnrollmentStep::AwaitSubjects => self.subjects = Some(text.to_string()),
            EnrollmentStep::AwaitParentPhone => self.parent_phone = Some(text.to_string()),
            EnrollmentStep::AwaitSchedule => self.weekly_schedule = Some(text.to_string()),
            EnrollmentStep::AwaitPlan | EnrollmentStep::AwaitTarget | EnrollmentStep::AwaitReceipt => {}
        }
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        self.step
    }

    /// Select the plan and advance to the target step.
    pub fn select_plan(&mut self, plan: Plan) -> EnrollmentStep {
        self.plan = Some(plan);
        self.step = EnrollmentStep::AwaitTarget;
        self.step
    }

    /// Store the target and advance to the receipt step.
    pub fn set_target(&mut self, text: &str) -> EnrollmentStep {
        self.target = Some(text.to_string());
        self.step = EnrollmentStep::AwaitReceipt;
        self.step
    }

    /// Consume the draft into a pending record. Fails with the name of the
    /// first missing field if the dialog has not collected everything yet.
    pub fn into_record(
        self,
        chat_id: i64,
        receipt_file_id: &str,
    ) -> Result<StudentRecord, &'static str> {
        Ok(StudentRecord {
            chat_id,
            name: self.name.ok_or("name")?,
            grade: self.grade.ok_or("grade")?,
            exam_info: self.exam_info.ok_or("exam_info")?,
            subjects: self.subjects.ok_or("subjects")?,
            parent_phone: self.parent_phone.ok_or("parent_phone")?,
            weekly_schedule: self.weekly_schedule.ok_or("weekly_schedule")?,
            plan: self.plan.ok_or("plan")?,
            target: self.target.ok_or("target")?,
            status: RecordStatus::Pending,
            join_date: None,
            expiry_date: None,
            receipt_file_id: receipt_file_id.to_string(),
            start_link: None,
        })
    }
}
