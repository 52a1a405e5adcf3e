use crate::alerts::{Markup, NotificationKind, NotificationSink};
use crate::error::AlertError;
use chrono::Local;
use std::io::{self, Write};
use std::sync::Mutex;

/// Prints notifications as plain text lines
///
/// Writes to stdout by default; any writer can be injected for tests or for
/// redirecting output to a file.
pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl NotificationSink for ConsoleSink {
    fn notify(&self, kind: NotificationKind, message: &str) -> Result<(), AlertError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| AlertError::NotificationFailed("console writer poisoned".to_string()))?;

        writeln!(
            writer,
            "[{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            kind,
            message
        )?;
        writer.flush()?;
        Ok(())
    }

    fn markup(&self) -> Markup {
        Markup::Plain
    }
}
