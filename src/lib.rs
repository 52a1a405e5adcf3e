/// Error types for the weather alert system
pub mod error;

/// Snapshots, condition changes, metrics and bus topics
pub mod events;

/// In-process publish/subscribe bus
pub mod bus;

/// Configuration management
pub mod config;

/// Weather data providers
pub mod provider;

/// Poll loop and event derivation
pub mod sampler;

/// Alert state tracking and notification formatting
pub mod alerts;

/// Notification sink implementations
pub mod sinks;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use error::{AlertError, ConfigError, ProviderError, SamplerError};
