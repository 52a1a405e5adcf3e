use crate::error::AlertError;
use serde::Serialize;
use std::fmt;

/// Category of a notification handed to a sink
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// Routine weather reading
    Update,
    /// A metric crossed its raise threshold
    Raised,
    /// A previously raised metric is back at or below its recovery threshold
    Recovered,
    /// The reported weather condition changed
    ConditionChanged,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::Update => "update",
            NotificationKind::Raised => "raised",
            NotificationKind::Recovered => "recovered",
            NotificationKind::ConditionChanged => "condition-changed",
        };
        f.write_str(name)
    }
}

/// Text markup a sink understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    Plain,
    /// Telegram-style HTML subset (`<b>` for bold)
    Html,
}

/// External notification destination
///
/// Implementations must bound the time a single `notify` call can take. A failed
/// delivery is reported through the returned error and is never retried by the
/// caller.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    /// Deliver one formatted message
    fn notify(&self, kind: NotificationKind, message: &str) -> Result<(), AlertError>;

    /// Markup used when formatting messages for this sink
    fn markup(&self) -> Markup {
        Markup::Plain
    }
}
