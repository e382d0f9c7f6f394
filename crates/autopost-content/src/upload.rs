//! Upload execution with bounded retry.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{ContentItem, ContentKind, RetryPolicy, TransportError};

/// Structured result of one publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Whether the transport accepted the publish.
    pub ok: bool,
    /// Error detail when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Remote identifier of the published post, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PublishResponse {
    pub fn accepted(id: Option<String>) -> Self {
        Self {
            ok: true,
            error: None,
            id,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            id: None,
        }
    }
}

/// The external publish transport.
///
/// Implementations are chosen at construction time; there is no runtime
/// probing for a collaborator. Test doubles implement this directly.
#[async_trait]
pub trait PublishTransport: Send + Sync {
    async fn publish_image(
        &self,
        caption: &str,
        path: &Path,
    ) -> Result<PublishResponse, TransportError>;

    async fn publish_video(&self, path: &Path) -> Result<PublishResponse, TransportError>;
}

/// Terminal outcome of one firing's upload sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The transport accepted the publish.
    Success(PublishResponse),
    /// Every attempt failed; terminal for this firing.
    Exhausted { attempts: u32, last_error: String },
}

/// Wraps one publish call per attempt in the retry policy.
///
/// Transport faults and structured `ok=false` results both count as
/// failed attempts. Exhaustion is reported as an outcome, never as an
/// error: the scheduler always proceeds to reschedule.
pub struct UploadExecutor {
    transport: Arc<dyn PublishTransport>,
    policy: RetryPolicy,
    rng: Mutex<StdRng>,
}

impl UploadExecutor {
    pub fn new(transport: Arc<dyn PublishTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            rng: Mutex::new(StdRng::from_rng(&mut rand::rng())),
        }
    }

    /// Replace the jitter source with a seeded one (tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Publish one item, retrying transient failures with backoff.
    pub async fn publish(&self, item: &ContentItem, caption: &str) -> UploadOutcome {
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.policy.max_attempts {
            let result = match item.kind {
                ContentKind::Image => self.transport.publish_image(caption, &item.path).await,
                ContentKind::Video => self.transport.publish_video(&item.path).await,
            };

            match result {
                Ok(resp) if resp.ok => {
                    info!(attempt, path = %item.path.display(), "publish accepted");
                    return UploadOutcome::Success(resp);
                }
                Ok(resp) => {
                    last_error = resp
                        .error
                        .unwrap_or_else(|| "transport reported not ok".to_string());
                    warn!(attempt, error = %last_error, "publish attempt rejected");
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt, error = %last_error, "publish attempt failed");
                }
            }

            if attempt < self.policy.max_attempts {
                let delay = {
                    let mut rng = self.rng.lock().expect("jitter rng lock poisoned");
                    self.policy.delay_after(attempt, &mut *rng)
                };
                info!(delay_ms = delay.as_millis() as u64, "retrying after backoff");
                sleep(delay).await;
            }
        }

        error!(
            attempts = self.policy.max_attempts,
            error = %last_error,
            "upload attempts exhausted"
        );
        UploadOutcome::Exhausted {
            attempts: self.policy.max_attempts,
            last_error,
        }
    }
}
