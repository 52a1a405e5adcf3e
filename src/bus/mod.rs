/// Topic-keyed publish/subscribe bus
pub mod event_bus;

pub use event_bus::{EventBus, Handler, PublishReport};
