//! Image generation capability.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use newsroom_shared::{ImageSettings, NewsroomError, Result};

use crate::http::{build_client, check_status, endpoint};

/// Given a prompt, return encoded image bytes (PNG).
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, settings: &ImageSettings) -> Result<Vec<u8>>;
}

/// OpenAI-compatible `images/generations` client.
pub struct OpenAiImageGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiImageGenerator {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url,
        })
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    #[instrument(skip_all, fields(model = %settings.model, quality = settings.quality.as_str()))]
    async fn generate(&self, prompt: &str, settings: &ImageSettings) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "images/generations"))
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                model: &settings.model,
                prompt,
                size: &settings.size,
                quality: settings.quality.as_str(),
                n: 1,
            })
            .send()
            .await
            .map_err(|e| NewsroomError::ImageGeneration(e.to_string()))?;
        let response = check_status(response)
            .await
            .map_err(NewsroomError::ImageGeneration)?;

        let body: ImageResponse = response
            .json()
            .await
            .map_err(|e| NewsroomError::ImageGeneration(format!("bad response: {e}")))?;

        let encoded = body
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| NewsroomError::ImageGeneration("response carried no image data".into()))?;

        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| NewsroomError::ImageGeneration(format!("invalid base64 payload: {e}")))?;
        debug!(bytes = bytes.len(), "image decoded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsroom_shared::ImageQuality;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> ImageSettings {
        ImageSettings {
            enabled: true,
            model: "gpt-image-1.5".into(),
            quality: ImageQuality::Low,
            size: "1536x1024".into(),
        }
    }

    #[tokio::test]
    async fn decodes_first_image() {
        let server = MockServer::start().await;
        let png = b"\x89PNG\r\n\x1a\nfake";
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(body_partial_json(json!({
                "model": "gpt-image-1.5",
                "size": "1536x1024",
                "quality": "low",
                "n": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"b64_json": STANDARD.encode(png)}]
            })))
            .mount(&server)
            .await;

        let img = OpenAiImageGenerator::new("k".into(), server.uri(), Duration::from_secs(5)).unwrap();
        let bytes = img.generate("a deep-sea vent", &settings()).await.expect("image");
        assert_eq!(bytes, png);
    }

    #[tokio::test]
    async fn missing_data_is_image_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let img = OpenAiImageGenerator::new("k".into(), server.uri(), Duration::from_secs(5)).unwrap();
        let err = img.generate("x", &settings()).await.expect_err("empty");
        assert!(matches!(err, NewsroomError::ImageGeneration(_)));
        assert!(err.is_transient());
    }
}
