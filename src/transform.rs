//! Background removal via the remote image-edit service.
//!
//! Uploads a staged photo with a fixed transformation directive and
//! materializes the returned image as a local file. The directive is
//! constant configuration — there is no per-request customization.

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::TransformError;
use crate::fetch::StagedAsset;
use crate::pipeline::InvocationId;

/// HTTP deadline for the transformation round-trip (the service
/// renders an image, so this is generous).
const HTTP_TIMEOUT: Duration = Duration::from_secs(180);

/// Fixed transformation directive.
const MODEL: &str = "gpt-image-1";
const PROMPT: &str =
    "Cut the subject out of this photo and return it on a transparent background as a png file";
const SIZE: &str = "1024x1024";
const BACKGROUND: &str = "transparent";

/// A transformed image on local disk. Ownership passes to the caller
/// for delivery; the file is not mutated afterwards.
#[derive(Debug)]
pub struct TransformationResult {
    pub path: PathBuf,
}

/// JSON envelope returned by the image-edit endpoint.
#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(default)]
    b64_json: String,
    #[allow(dead_code)]
    #[serde(default)]
    url: String,
}

/// Client for the remote image-edit service.
pub struct TransformationClient {
    api_key: String,
    base_url: String,
    work_dir: PathBuf,
    client: reqwest::Client,
}

impl TransformationClient {
    pub fn new(api_key: String, base_url: String, work_dir: PathBuf) -> Self {
        Self {
            api_key,
            base_url,
            work_dir,
            client: reqwest::Client::new(),
        }
    }

    /// Upload the staged photo and write the transformed image to a
    /// result file scoped by the invocation id.
    ///
    /// Only `data[0]` of the response is consumed; multi-result
    /// responses are not an intended use case.
    pub async fn transform(
        &self,
        staged: &StagedAsset,
        invocation: &InvocationId,
    ) -> Result<TransformationResult, TransformError> {
        let image = tokio::fs::read(&staged.path)
            .await
            .map_err(|source| TransformError::OpenInput {
                path: staged.path.display().to_string(),
                source,
            })?;

        let file_name = staged
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.jpg")
            .to_string();
        let image_part = Part::bytes(image)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(TransformError::Multipart)?;

        let form = Form::new()
            .text("model", MODEL)
            .text("prompt", PROMPT)
            .text("size", SIZE)
            .text("background", BACKGROUND)
            .part("image", image_part);

        let resp = self
            .client
            .post(&self.base_url)
            .timeout(HTTP_TIMEOUT)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(TransformError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            // keep the body for diagnostics; it never reaches the user
            let body = resp.text().await.unwrap_or_default();
            return Err(TransformError::BadStatus { status, body });
        }

        let raw = resp.bytes().await.map_err(TransformError::Transport)?;
        let envelope: ImagesResponse = serde_json::from_slice(&raw)?;

        let payload = envelope
            .data
            .first()
            .map(|entry| entry.b64_json.as_str())
            .filter(|payload| !payload.is_empty())
            .ok_or(TransformError::NoImage)?;

        let png = BASE64.decode(payload)?;

        let result_path = self.work_dir.join(invocation.result_name());
        tokio::fs::write(&result_path, &png)
            .await
            .map_err(|source| TransformError::WriteOutput {
                path: result_path.display().to_string(),
                source,
            })?;

        tracing::debug!(path = %result_path.display(), len = png.len(), "Transformed image written");
        Ok(TransformationResult { path: result_path })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn stage_bytes(dir: &std::path::Path, bytes: &[u8]) -> StagedAsset {
        let path = dir.join("photo_1_2_test.jpg");
        tokio::fs::write(&path, bytes).await.expect("stage input");
        StagedAsset {
            path,
            len: bytes.len() as u64,
        }
    }

    fn client_for(server: &MockServer, work_dir: PathBuf) -> TransformationClient {
        TransformationClient::new(
            "sk-test".into(),
            format!("{}/v1/images/edits", server.uri()),
            work_dir,
        )
    }

    #[tokio::test]
    async fn transform_writes_decoded_payload() {
        let server = MockServer::start().await;
        let payload = BASE64.encode([1u8, 2, 3, 4]);
        Mock::given(method("POST"))
            .and(path("/v1/images/edits"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "b64_json": payload, "url": "" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let staged = stage_bytes(dir.path(), b"jpegdata").await;
        let client = client_for(&server, dir.path().to_path_buf());
        let invocation = InvocationId::new(42, 1_700_000_000);

        let result = client.transform(&staged, &invocation).await.expect("transform");

        let name = result.path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("cutout_"));
        assert!(name.ends_with(".png"));
        assert_ne!(result.path, staged.path);
        let bytes = std::fs::read(&result.path).expect("result file");
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn transform_missing_input_is_open_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let client = client_for(&server, dir.path().to_path_buf());
        let staged = StagedAsset {
            path: dir.path().join("never_staged.jpg"),
            len: 0,
        };

        let err = client
            .transform(&staged, &InvocationId::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::OpenInput { .. }));
    }

    #[tokio::test]
    async fn transform_non_success_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let staged = stage_bytes(dir.path(), b"jpegdata").await;
        let client = client_for(&server, dir.path().to_path_buf());

        let err = client
            .transform(&staged, &InvocationId::new(1, 2))
            .await
            .unwrap_err();
        match err {
            TransformError::BadStatus { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected BadStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transform_empty_data_is_no_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": [] })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let staged = stage_bytes(dir.path(), b"jpegdata").await;
        let client = client_for(&server, dir.path().to_path_buf());

        let err = client
            .transform(&staged, &InvocationId::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::NoImage));
        // nothing written: the input is the only file in the dir
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn transform_empty_first_payload_is_no_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "b64_json": "", "url": "https://cdn/img.png" }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let staged = stage_bytes(dir.path(), b"jpegdata").await;
        let client = client_for(&server, dir.path().to_path_buf());

        let err = client
            .transform(&staged, &InvocationId::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::NoImage));
    }

    #[tokio::test]
    async fn transform_malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let staged = stage_bytes(dir.path(), b"jpegdata").await;
        let client = client_for(&server, dir.path().to_path_buf());

        let err = client
            .transform(&staged, &InvocationId::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Decode(_)));
    }

    #[tokio::test]
    async fn transform_bad_base64_is_payload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "b64_json": "@@not-base64@@" }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let staged = stage_bytes(dir.path(), b"jpegdata").await;
        let client = client_for(&server, dir.path().to_path_buf());

        let err = client
            .transform(&staged, &InvocationId::new(1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Base64(_)));
    }
}
