//! Pipeline components: ingest controller, orchestrator, version
//! publisher, retry/quarantine manager, and the queue worker loop.

pub mod ingest;
pub mod orchestrator;
pub mod publisher;
pub mod retry;
pub mod worker;

pub use ingest::IngestController;
pub use orchestrator::Orchestrator;
pub use publisher::Publisher;
pub use retry::{FailureDisposition, RetryManager};
pub use worker::Worker;
