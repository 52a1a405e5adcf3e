/// Alert state tracking, message formatting and the sink contract
pub mod format;
pub mod sink;
pub mod tracker;

pub use format::{format_message, Notification};
pub use sink::{Markup, NotificationKind, NotificationSink};
pub use tracker::{AlertFlags, AlertState, AlertTracker};
