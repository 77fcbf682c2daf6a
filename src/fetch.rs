//! Photo staging — resolves a platform file path to bytes on local disk.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::FetchError;
use crate::pipeline::InvocationId;

/// HTTP deadline for the file download.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// A locally persisted copy of a remotely fetched photo.
///
/// Owned by the invocation that created it; the path is scoped by the
/// invocation id, so no two invocations ever share one.
#[derive(Debug)]
pub struct StagedAsset {
    pub path: PathBuf,
    pub len: u64,
}

/// Downloads photo bytes from the platform file host and stages them
/// locally for the transformation upload.
pub struct ContentFetcher {
    /// URL template with two `%s` slots: credential, then file path.
    file_base_url: String,
    token: String,
    work_dir: PathBuf,
    client: reqwest::Client,
}

impl ContentFetcher {
    pub fn new(file_base_url: String, token: String, work_dir: PathBuf) -> Self {
        Self {
            file_base_url,
            token,
            work_dir,
            client: reqwest::Client::new(),
        }
    }

    /// Download the file behind `file_path` and stage it under a name
    /// derived from the invocation id.
    ///
    /// The body is written to a `.part` temporary name and renamed
    /// once complete, so a failed download never leaves a corrupt file
    /// under the final name.
    pub async fn fetch(
        &self,
        file_path: &str,
        invocation: &InvocationId,
    ) -> Result<StagedAsset, FetchError> {
        let url = fill_template(&self.file_base_url, &self.token, file_path);

        let resp = self.client.get(&url).timeout(HTTP_TIMEOUT).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::BadStatus { status, body });
        }
        let bytes = resp.bytes().await?;

        let staged_path = self.work_dir.join(invocation.staged_name());
        let part_path = staged_path.with_extension("jpg.part");

        tokio::fs::write(&part_path, &bytes)
            .await
            .map_err(|source| FetchError::Write {
                path: part_path.display().to_string(),
                source,
            })?;
        tokio::fs::rename(&part_path, &staged_path)
            .await
            .map_err(|source| FetchError::Write {
                path: staged_path.display().to_string(),
                source,
            })?;

        let len = bytes.len() as u64;
        tracing::debug!(path = %staged_path.display(), len, "Photo staged locally");
        Ok(StagedAsset {
            path: staged_path,
            len,
        })
    }
}

/// Fill the file-URL template: first `%s` takes the credential, the
/// second takes the platform file path.
fn fill_template(template: &str, token: &str, file_path: &str) -> String {
    let with_token = template.replacen("%s", token, 1);
    match with_token.find("%s") {
        Some(idx) => {
            let mut url = String::with_capacity(with_token.len() + file_path.len());
            url.push_str(&with_token[..idx]);
            url.push_str(file_path);
            url.push_str(&with_token[idx + 2..]);
            url
        }
        None => with_token,
    }
}

// ── Tests ───────────────────────────────────────────────────────────
