/// Weather sampling: fetch, derive events, publish
pub mod deriver;
pub mod poller;

pub use deriver::EventDeriver;
pub use poller::{CycleOutcome, Poller, Sampler};
