//! mediasearch - searchable media library core.
//!
//! Core library exposing the data model, port contracts, local adapters,
//! and pure pipeline logic (segmentation, error classification, retry
//! backoff, search fusion) for workspace crates.

// Model types use `from_str` methods that return Option<Self> (infallible
// parse with a known vocabulary), not Result<Self, Error> as
// std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod search;
pub mod segmenter;
pub mod storage;

pub use error::{ErrorKind, PipelineError};
