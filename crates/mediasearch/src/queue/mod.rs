//! Job queue adapters.

mod local;

pub use local::LocalJobQueue;
