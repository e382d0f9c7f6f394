//! HTTP clients for the external publish and generation services.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use autopost_content::{
    ContentError, ContentGenerator, PublishResponse, PublishTransport, TransportError,
};

/// Per-request timeout for the publish service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct PublishRequest<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

/// Publish transport backed by an HTTP service.
///
/// POSTs `{path, caption?}` to `<base>/publish/image` and
/// `<base>/publish/video`; the service answers with the structured
/// `{ok, error?, id?}` result.
pub struct RemotePublisher {
    base_url: String,
    http: reqwest::Client,
}

impl RemotePublisher {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn post_publish(
        &self,
        endpoint: &str,
        body: &PublishRequest<'_>,
    ) -> Result<PublishResponse, TransportError> {
        let url = format!("{}/publish/{}", self.base_url, endpoint);
        debug!(url = %url, path = %body.path, "posting publish request");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Request(format!(
                "{url} returned {status}"
            )));
        }

        response
            .json::<PublishResponse>()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PublishTransport for RemotePublisher {
    async fn publish_image(
        &self,
        caption: &str,
        path: &Path,
    ) -> Result<PublishResponse, TransportError> {
        let path = path.to_string_lossy();
        self.post_publish(
            "image",
            &PublishRequest {
                path: &path,
                caption: Some(caption),
            },
        )
        .await
    }

    async fn publish_video(&self, path: &Path) -> Result<PublishResponse, TransportError> {
        let path = path.to_string_lossy();
        self.post_publish(
            "video",
            &PublishRequest {
                path: &path,
                caption: None,
            },
        )
        .await
    }
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    script: &'a str,
}

#[derive(Deserialize)]
struct RenderResponse {
    path: Option<String>,
}

/// Content generator backed by the same service: GET `<base>/caption`
/// for plain-text captions, POST `<base>/render` for on-demand videos.
pub struct RemoteGenerator {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteGenerator {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl ContentGenerator for RemoteGenerator {
    async fn generate_caption(&self) -> Result<String, ContentError> {
        let url = format!("{}/caption", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ContentError::Caption(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Caption(format!("{url} returned {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ContentError::Caption(e.to_string()))
    }

    async fn render_video(&self, script: &str) -> Result<Option<PathBuf>, ContentError> {
        let url = format!("{}/render", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&RenderRequest { script })
            .send()
            .await
            .map_err(|e| ContentError::Render(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Render(format!("{url} returned {status}")));
        }

        let rendered: RenderResponse = response
            .json()
            .await
            .map_err(|e| ContentError::Render(e.to_string()))?;
        Ok(rendered.path.map(PathBuf::from))
    }
}

/// Placeholder transport for dry-run wiring; the pipeline never calls
/// it because dry runs return before the upload step.
pub struct DisabledTransport;

#[async_trait]
impl PublishTransport for DisabledTransport {
    async fn publish_image(
        &self,
        _caption: &str,
        _path: &Path,
    ) -> Result<PublishResponse, TransportError> {
        Err(TransportError::Request("publishing is disabled".to_string()))
    }

    async fn publish_video(&self, _path: &Path) -> Result<PublishResponse, TransportError> {
        Err(TransportError::Request("publishing is disabled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_publish_video_decodes_structured_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish/video"))
            .and(body_partial_json(json!({"path": "/pool/clip.mp4"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "id": "post-9"})),
            )
            .mount(&server)
            .await;

        let publisher = RemotePublisher::new(&server.uri()).unwrap();
        let resp = publisher
            .publish_video(Path::new("/pool/clip.mp4"))
            .await
            .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.id.as_deref(), Some("post-9"));
    }

    #[tokio::test]
    async fn test_publish_image_sends_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish/image"))
            .and(body_partial_json(json!({"caption": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let publisher = RemotePublisher::new(&server.uri()).unwrap();
        let resp = publisher
            .publish_image("hello", Path::new("/pool/pic.jpg"))
            .await
            .unwrap();
        assert!(resp.ok);
    }

    #[tokio::test]
    async fn test_not_ok_response_is_returned_structured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish/image"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "rate limited"})),
            )
            .mount(&server)
            .await;

        let publisher = RemotePublisher::new(&server.uri()).unwrap();
        let resp = publisher
            .publish_image("c", Path::new("/pool/pic.jpg"))
            .await
            .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some("rate limited"));
    }

    #[tokio::test]
    async fn test_http_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish/video"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let publisher = RemotePublisher::new(&server.uri()).unwrap();
        let err = publisher
            .publish_video(Path::new("/pool/clip.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_caption_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/caption"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh caption"))
            .mount(&server)
            .await;

        let generator = RemoteGenerator::new(&server.uri()).unwrap();
        assert_eq!(generator.generate_caption().await.unwrap(), "fresh caption");
    }

    #[tokio::test]
    async fn test_caption_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/caption"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let generator = RemoteGenerator::new(&server.uri()).unwrap();
        assert!(generator.generate_caption().await.is_err());
    }

    #[tokio::test]
    async fn test_render_returns_optional_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"path": "/rendered/out.mp4"})),
            )
            .mount(&server)
            .await;

        let generator = RemoteGenerator::new(&server.uri()).unwrap();
        let rendered = generator.render_video("a script").await.unwrap();
        assert_eq!(rendered, Some(PathBuf::from("/rendered/out.mp4")));
    }
}
