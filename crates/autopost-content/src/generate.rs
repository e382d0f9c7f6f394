//! Content generator collaborator.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::ContentError;

/// External generator of fresh content.
///
/// Satisfied by a concrete client or a test double at construction
/// time. Jobs that publish images ask for a caption; `render_video`
/// produces an on-demand clip from a script for callers that synthesize
/// rather than pool their video content.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate a caption for an image post.
    async fn generate_caption(&self) -> Result<String, ContentError>;

    /// Render a video from a script. `None` means the generator had
    /// nothing to render.
    async fn render_video(&self, script: &str) -> Result<Option<PathBuf>, ContentError>;
}
