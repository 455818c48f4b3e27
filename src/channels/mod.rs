//! Channel abstraction for message I/O.

pub mod channel;
pub mod telegram;

pub use channel::{EventStream, Notifier, UserEvent};
pub use telegram::TelegramChannel;
