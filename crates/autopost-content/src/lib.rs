//! Content selection and publishing for autopost.
//!
//! This crate provides:
//! - Content pools scanned at selection time (one per content kind)
//! - A parameterized retry policy (exponential backoff with jitter)
//! - An upload executor wrapping a publish transport in bounded retries
//! - Best-effort archiving of successfully published content
//! - The firing pipeline composing all of the above for the scheduler

mod archive;
mod error;
mod generate;
mod pipeline;
mod pool;
mod retry;
mod upload;

pub use archive::archive_item;
pub use error::{ContentError, TransportError};
pub use generate::ContentGenerator;
pub use pipeline::PublishPipeline;
pub use pool::{ContentItem, ContentKind, ContentPools};
pub use retry::RetryPolicy;
pub use upload::{PublishResponse, PublishTransport, UploadExecutor, UploadOutcome};
