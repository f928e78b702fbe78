//! Candidate alert delivery: formatting, splitting, and the Telegram and
//! console sinks.

pub mod format;
pub mod notifier;
pub mod sink;

pub use notifier::{Notifier, PartialDelivery};
pub use sink::{ConsoleSink, TelegramSink};
