use crate::error::HuggingFaceError;
use crate::models::parse_image_to_text;
use assistant_core::config::{AppConfig, HuggingFaceConfig};
use anyhow::Result;
use reqwest::Client;
use tracing::{info, instrument};

/// Model used for the `object_detection` function.
pub const OBJECT_DETECTION_MODEL: &str = "facebook/detr-resnet-50";

#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    http: Client,
    base_url: String,
    api_key: String,
    image_to_text_model: String,
}

impl HuggingFaceClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let huggingface = config.require_huggingface_config()?;
        Ok(Self::new(huggingface)?)
    }

    pub fn new(config: &HuggingFaceConfig) -> Result<Self, HuggingFaceError> {
        let http = Client::builder()
            .user_agent("vision-assistant/0.1")
            .build()?;

        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            image_to_text_model: config.image_to_text_model.clone(),
        })
    }

    /// Sends the payload found at `data_path` to `model` and returns the raw
    /// response body.
    #[instrument(skip(self))]
    pub async fn post(&self, data_path: &str, model: &str) -> Result<String, HuggingFaceError> {
        let payload = self.load_payload(data_path).await?;
        let url = format!("{}/models/{}", self.base_url, model);

        info!(url = %url, payload_bytes = payload.len(), "Hugging Face POST");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("x-wait-for-model", "true")
            .body(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(HuggingFaceError::HttpStatusWithBody { status, body });
        }

        Ok(body)
    }

    /// Captions the image at `data_path` with the configured model.
    #[instrument(skip(self), fields(model = %self.image_to_text_model))]
    pub async fn image_to_text(&self, data_path: &str) -> Result<String, HuggingFaceError> {
        let raw = self.post(data_path, &self.image_to_text_model).await?;
        parse_image_to_text(&raw, &self.image_to_text_model)
    }

    async fn load_payload(&self, data_path: &str) -> Result<Vec<u8>, HuggingFaceError> {
        if data_path.starts_with("http://") || data_path.starts_with("https://") {
            let response = self.http.get(data_path).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<failed to read body>".to_string());
                return Err(HuggingFaceError::HttpStatusWithBody { status, body });
            }
            return Ok(response.bytes().await?.to_vec());
        }

        tokio::fs::read(data_path)
            .await
            .map_err(|source| HuggingFaceError::Payload {
                path: data_path.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use std::io::Write;

    async fn detect(headers: AxumHeaders, body: Bytes) -> (StatusCode, String) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let wait = headers
            .get("x-wait-for-model")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Bearer hf_test" || wait != "true" {
            return (StatusCode::UNAUTHORIZED, "bad headers".into());
        }
        (
            StatusCode::OK,
            format!(r#"[{{"label":"zebra","bytes":{}}}]"#, body.len()),
        )
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/models/facebook/detr-resnet-50", post(detect))
            .route(
                "/models/Salesforce/blip-image-captioning-large",
                post(|| async { r#"[{"generated_text":"zebras grazing"}]"# }),
            )
            .route(
                "/models/broken/model",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading") }),
            )
            .route("/remote.jpg", get(|| async { "remote-bytes" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(endpoint: &str) -> HuggingFaceClient {
        HuggingFaceClient::new(&HuggingFaceConfig {
            api_key: "hf_test".into(),
            endpoint: format!("{endpoint}/"),
            image_to_text_model: "Salesforce/blip-image-captioning-large".into(),
        })
        .unwrap()
    }

    fn image_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn post_returns_raw_body_for_local_file() {
        let endpoint = spawn_server().await;
        let image = image_file(b"12345");
        let path = image.path().to_str().unwrap();

        let body = client(&endpoint)
            .post(path, OBJECT_DETECTION_MODEL)
            .await
            .unwrap();
        assert_eq!(body, r#"[{"label":"zebra","bytes":5}]"#);
    }

    #[tokio::test]
    async fn post_fetches_remote_payload() {
        let endpoint = spawn_server().await;
        let remote = format!("{endpoint}/remote.jpg");

        let body = client(&endpoint)
            .post(&remote, OBJECT_DETECTION_MODEL)
            .await
            .unwrap();
        assert_eq!(body, r#"[{"label":"zebra","bytes":12}]"#);
    }

    #[tokio::test]
    async fn image_to_text_extracts_generated_text() {
        let endpoint = spawn_server().await;
        let image = image_file(b"jpeg");

        let caption = client(&endpoint)
            .image_to_text(image.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(caption, "zebras grazing");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let endpoint = spawn_server().await;
        let image = image_file(b"jpeg");

        let err = client(&endpoint)
            .post(image.path().to_str().unwrap(), "broken/model")
            .await
            .unwrap_err();
        match err {
            HuggingFaceError::HttpStatusWithBody { status, body } => {
                assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "loading");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_local_file_is_a_payload_error() {
        let err = client("http://127.0.0.1:9")
            .post("/definitely/not/here.jpg", OBJECT_DETECTION_MODEL)
            .await
            .unwrap_err();
        assert!(matches!(err, HuggingFaceError::Payload { .. }));
    }
}
