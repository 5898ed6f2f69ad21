use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::error::ClientError;
use super::types::{
    ClusterCounts, FetchResponse, JobEntry, MessageResponse, NotReadyResponse, TokenRequest,
    TokenResponse, UploadResponse,
};
use crate::archive::JobArchive;
use crate::config::CloudSolveConfig;
use crate::session::TokenStore;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Stateless wrapper around the cluster's REST surface.
///
/// Every authenticated call reads the current session from the token store.
/// With no session the call short-circuits to
/// [`ClientError::NotAuthenticated`] and nothing is sent.
#[derive(Clone)]
pub struct ClusterClient {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
    download_timeout: Duration,
}

impl ClusterClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        Self::with_timeouts(
            base_url,
            tokens,
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_TIMEOUT,
            DEFAULT_DOWNLOAD_TIMEOUT,
        )
    }

    pub fn from_config(
        config: &CloudSolveConfig,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        Self::with_timeouts(
            config.base_url.clone(),
            tokens,
            config.connect_timeout(),
            config.request_timeout(),
            config.download_timeout(),
        )
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenStore>,
        connect_timeout: Duration,
        timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            tokens,
            download_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Appends `segments` to the base URL, each one percent-encoded, and
    /// keeps the trailing slash the service expects.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    fn authorized(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, ClientError> {
        let session = self.tokens.load().ok_or(ClientError::NotAuthenticated)?;
        let url = self.endpoint(segments)?;
        tracing::debug!(%method, path = url.path(), "cluster request");
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(session.access_token()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("cluster answered 401");
            return Err(ClientError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "cluster request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// `POST token/` with the user's credentials. Not authenticated.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        tracing::debug!("cluster request: token");
        let request = self
            .http
            .post(self.endpoint(&["token"])?)
            .json(&TokenRequest { email, password });
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// `GET checkin/`: cluster-wide completed/processing/queued counts.
    pub async fn checkin(&self) -> Result<ClusterCounts, ClientError> {
        let request = self.authorized(Method::GET, &["checkin"])?;
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// `GET fetch/`: the user's jobs.
    pub async fn fetch_jobs(&self) -> Result<Vec<JobEntry>, ClientError> {
        let request = self.authorized(Method::GET, &["fetch"])?;
        let response = self.send(request).await?;
        let body: FetchResponse = Self::decode(response).await?;
        Ok(body.jobs)
    }

    /// `POST upload/` with the archive as multipart field `file`. Returns the job id.
    pub async fn upload(&self, archive: &JobArchive) -> Result<String, ClientError> {
        let request = self.authorized(Method::POST, &["upload"])?;
        let part = Part::bytes(archive.bytes().to_vec())
            .file_name(archive.file_name().to_string())
            .mime_str("application/zip")?;
        let response = self
            .send(request.multipart(Form::new().part("file", part)))
            .await?;
        let body: UploadResponse = Self::decode(response).await?;
        Ok(body.job_id)
    }

    /// `GET download/{id}/`. The body is left unread so the caller can
    /// stream it to disk.
    pub async fn download(&self, job_id: &str) -> Result<Response, ClientError> {
        let request = self
            .authorized(Method::GET, &["download", job_id])?
            .timeout(self.download_timeout);
        match self.send(request).await {
            Err(ClientError::Status {
                status,
                reason,
                body,
            }) => match serde_json::from_str::<NotReadyResponse>(&body) {
                Ok(NotReadyResponse {
                    not_ready: Some(msg),
                }) => Err(ClientError::NotReady(msg)),
                _ => Err(ClientError::Status {
                    status,
                    reason,
                    body,
                }),
            },
            other => other,
        }
    }

    /// `POST cancel/{id}/`. Returns the server's confirmation message.
    pub async fn cancel(&self, job_id: &str) -> Result<Option<String>, ClientError> {
        self.post_message("cancel", job_id).await
    }

    /// `POST remove/{id}/`. Returns the server's confirmation message.
    pub async fn remove(&self, job_id: &str) -> Result<Option<String>, ClientError> {
        self.post_message("remove", job_id).await
    }

    async fn post_message(
        &self,
        action: &str,
        job_id: &str,
    ) -> Result<Option<String>, ClientError> {
        let request = self.authorized(Method::POST, &[action, job_id])?;
        let response = self.send(request).await?;
        let body: MessageResponse = Self::decode(response).await?;
        Ok(body.message)
    }
}

/// Extracts `filename="..."` from a `Content-Disposition` header.
pub fn disposition_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let (_, rest) = value.split_once("filename=")?;
    let name = rest.split(';').next()?.trim().trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
