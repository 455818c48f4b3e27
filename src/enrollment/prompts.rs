//! All user- and admin-facing message text.

use chrono::NaiveDate;

use super::model::{Plan, StudentRecord};
use super::state::EnrollmentStep;

pub const RESET_NOTICE: &str = "🔄 Your profile has been reset.\nLet's register again.";

pub const PLAN_RETRY: &str = "Please choose one of the listed plans:";

pub const RECEIPT_RETRY: &str = "Please upload image.";

pub const PENDING_NOTICE: &str = "✅ Waiting for Admin Approval.";

pub const UNDER_REVIEW_NOTICE: &str =
    "⏳ Your registration is still awaiting admin approval.\nYou'll be notified once it's reviewed.";

pub const EXPIRED_NOTICE: &str = "⚠️ Your plan expired.";

pub const APPROVED_NOTICE: &str = "✅ Student Approved.";

pub const NOT_FOUND_NOTICE: &str = "❌ Student not found.";

pub const APPROVE_USAGE: &str = "❌ Format:\n/approve <user id> <start link>";

pub const ADMIN_GREETING: &str =
    "🛠 Admin Mode Ready.\nApprove using:\n/approve <user id> <start link>";

/// The question asked when a step becomes current.
pub fn step_prompt(step: EnrollmentStep) -> &'static str {
    match step {
        EnrollmentStep::AwaitName => "Enter Student Name:",
        EnrollmentStep::AwaitGrade => "Enter Grade:",
        EnrollmentStep::AwaitExam => "O/L or A/L + Exam Year:",
        EnrollmentStep::AwaitSubjects => "Enter Subjects:",
        EnrollmentStep::AwaitParentPhone => "Enter Parent Phone:",
        EnrollmentStep::AwaitSchedule => "Enter Weekly Schedule:",
        EnrollmentStep::AwaitPlan => "Select Plan:",
        EnrollmentStep::AwaitTarget => "Your Target? (Type None if no target)",
        EnrollmentStep::AwaitReceipt => "Upload Payment Receipt:",
    }
}

/// Reply-keyboard options for plan selection.
pub fn plan_options() -> Vec<String> {
    vec![Plan::TwoWeek.label(), Plan::OneMonth.label()]
}

/// Dashboard shown to an approved, unexpired student.
pub fn dashboard(start_link: &str, remaining_days: i64) -> String {
    format!(
        "🎓 STUDENT DASHBOARD\n\n🚀 Start Project:\n{start_link}\n\n⏳ Days Remaining: {remaining_days}"
    )
}

/// Caption for the receipt photo forwarded to the admin, with the approval
/// instruction appended.
pub fn admin_summary(record: &StudentRecord) -> String {
    format!(
        "📌 NEW STUDENT\n\n\
         👤 Name: {}\n\
         🎓 Grade: {}\n\
         📚 Exam: {}\n\
         📖 Subjects: {}\n\
         📞 Parent: {}\n\
         🗓 Schedule: {}\n\
         💰 Plan: {}\n\
         🎯 Target: {}\n\n\
         Approve using:\n/approve {} <start link>",
        record.name,
        record.grade,
        record.exam_info,
        record.subjects,
        record.parent_phone,
        record.weekly_schedule,
        record.plan,
        record.target,
        record.chat_id,
    )
}

/// Message sent to the student when their payment is approved.
pub fn approval_message(start_link: &str, join: NaiveDate, expiry: NaiveDate) -> String {
    format!(
        "🎉 Payment Approved!\n\n🚀 Start Project:\n{start_link}\n\n📅 Start: {}\n⏳ Expire: {}",
        join.format("%Y-%m-%d"),
        expiry.format("%Y-%m-%d"),
    )
}

/// Admin notice when the sweeper expires a subscription.
pub fn expired_admin_notice(chat_id: i64) -> String {
    format!("Student {chat_id} expired.")
}
