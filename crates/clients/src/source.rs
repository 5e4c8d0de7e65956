use async_trait::async_trait;
use common_types::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// One child of a folder in the external Drive-like source.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveChild {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListChildrenResponse {
    files: Vec<DriveChild>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Pages `list_children` to completion and returns the flat result.
    async fn list_children(&self, folder_id: &str, access_token: &str) -> Result<Vec<DriveChild>>;

    /// Streams file bytes; callers decide whether to buffer in memory
    /// (plain images, up to `DRIVE_MAX`) or to a temp file (ZIP
    /// containers), per spec.md §4.8.
    async fn download(&self, file_id: &str, access_token: &str) -> Result<Vec<u8>>;

    /// Streams file bytes straight to `dest_path` without buffering the
    /// whole body in memory, invoking `on_progress(downloaded, total)`
    /// each time cumulative progress crosses a reporting threshold. Used
    /// for ZIP containers, which may be up to `ZIP_CONTAINER_MAX` (5 GiB).
    async fn download_to_path(
        &self,
        file_id: &str,
        access_token: &str,
        dest_path: &std::path::Path,
        on_progress: &mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> Result<u64>;

    /// Exchanges a refresh token for a fresh access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String>;

    /// Revokes the stored refresh token, disconnecting the source.
    async fn revoke(&self, refresh_token: &str) -> Result<()>;
}

pub struct HttpSourceClient {
    client: reqwest::Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpSourceClient {
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("failed to build source http client"),
            api_base: api_base.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn list_children(&self, folder_id: &str, access_token: &str) -> Result<Vec<DriveChild>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/files", self.api_base))
                .bearer_auth(access_token)
                .query(&[("folderId", folder_id)])
                .timeout(Duration::from_secs(60));
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Internal(format!("list_children failed: {e}")))?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(Error::SourceAuthRevoked);
            }
            if !response.status().is_success() {
                return Err(Error::Internal(format!(
                    "list_children returned {}",
                    response.status()
                )));
            }

            let parsed: ListChildrenResponse = response
                .json()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            out.extend(parsed.files);

            match parsed.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(out)
    }

    async fn download(&self, file_id: &str, access_token: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/files/{file_id}/content", self.api_base))
            .bearer_auth(access_token)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| Error::Internal(format!("download failed: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SourceAuthRevoked);
        }
        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "download returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn download_to_path(
        &self,
        file_id: &str,
        access_token: &str,
        dest_path: &std::path::Path,
        on_progress: &mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> Result<u64> {
        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        const REPORT_THRESHOLD: u64 = 64 * 1024 * 1024;

        let response = self
            .client
            .get(format!("{}/files/{file_id}/content", self.api_base))
            .bearer_auth(access_token)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| Error::Internal(format!("download failed: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SourceAuthRevoked);
        }
        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "download returned {}",
                response.status()
            )));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest_path)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_reported: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Internal(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            downloaded += chunk.len() as u64;
            if downloaded - last_reported >= REPORT_THRESHOLD {
                last_reported = downloaded;
                on_progress(downloaded, total);
            }
        }
        on_progress(downloaded, total);

        Ok(downloaded)
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let response = self
            .client
            .post(&self.token_url)
            .timeout(Duration::from_secs(15))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await
            .map_err(|e| Error::Internal(format!("token refresh failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SourceAuthRevoked);
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(parsed.access_token)
    }

    async fn revoke(&self, refresh_token: &str) -> Result<()> {
        self.client
            .post(format!("{}/revoke", self.token_url))
            .timeout(Duration::from_secs(15))
            .form(&[("token", refresh_token)])
            .send()
            .await
            .map_err(|e| Error::Internal(format!("revoke failed: {e}")))?;
        Ok(())
    }
}
