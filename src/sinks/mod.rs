/// Notification sink implementations
pub mod console;
pub mod telegram;

pub use console::ConsoleSink;
pub use telegram::TelegramSink;
