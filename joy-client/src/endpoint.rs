use async_trait::async_trait;
use joy_core::protocol::{
    DevServerPing, EndpointMetadata, FileInfo, Hook, PresignedUrlRequestResponse, UploadActionBody,
    HOOK_HEADER, UPLOAD_ACTION,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// The app's upload handler, as seen from the client.
#[async_trait]
pub trait UploadEndpoint: Send + Sync {
    /// `GET {mount}`: every route with its expanded config and access.
    async fn metadata(&self) -> ClientResult<Vec<EndpointMetadata>>;

    /// `POST {mount}?actionType=upload&slug={slug}`
    async fn presigned_urls(
        &self,
        slug: &str,
        files: &[FileInfo],
    ) -> ClientResult<PresignedUrlRequestResponse>;

    /// Tell the handler to simulate the storage webhook for an upload.
    async fn dev_server_ping(&self, upload_request_id: &str) -> ClientResult<()>;
}

/// [`UploadEndpoint`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    http: Client,
    url: String,
}

impl HttpEndpoint {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.endpoint_url.clone())
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn read<O: DeserializeOwned>(res: Response) -> ClientResult<O> {
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), body = %text, "upload endpoint call failed");
            return Err(ClientError::status(status.as_u16(), text));
        }
        serde_json::from_str(&text).map_err(|_| ClientError::InvalidResponse { body: text })
    }
}

#[async_trait]
impl UploadEndpoint for HttpEndpoint {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn metadata(&self) -> ClientResult<Vec<EndpointMetadata>> {
        let res = self.http.get(&self.url).send().await?;
        Self::read(res).await
    }

    #[instrument(skip(self, files), fields(files = files.len()))]
    async fn presigned_urls(
        &self,
        slug: &str,
        files: &[FileInfo],
    ) -> ClientResult<PresignedUrlRequestResponse> {
        let body = UploadActionBody {
            files: files.to_vec(),
        };
        let res = self
            .http
            .post(&self.url)
            .query(&[("actionType", UPLOAD_ACTION), ("slug", slug)])
            .json(&body)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn dev_server_ping(&self, upload_request_id: &str) -> ClientResult<()> {
        debug!(upload_request_id, "pinging dev server");
        let body = DevServerPing {
            upload_request_id: upload_request_id.to_string(),
        };
        let res = self
            .http
            .post(&self.url)
            .header(HOOK_HEADER, Hook::DevServer.as_str())
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ClientError::status(status.as_u16(), res.text().await.unwrap_or_default()));
        }
        Ok(())
    }
}
