use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use async_trait::async_trait;

use super::types::{
    AbortMultipartInput, CompleteMultipartInput, DownloadPrivateObjectsInput,
    DownloadPrivateObjectsOutput, MultipartUploadObjectInput, MultipartUploadObjectOutput,
    MultipartUploadRef, UploadObjectsInput, UploadObjectsOutput,
};
use super::{ApiError, ApiResult, StorageApi};
use crate::config::{HandlerConfig, DEFAULT_INFRA_URL};
use crate::protocol::{PollUploadResponse, PrepareUploadRequest, PROTOCOL_VERSION, VERSION_HEADER};

/// HTTP client for the Uploadjoy storage service.
///
/// Every call is bearer-authenticated with the project secret and tagged
/// with the protocol version header.
#[derive(Debug, Clone)]
pub struct UploadjoyApi {
    http: Client,
    token: String,
    infra_url: String,
    api_base: String,
}

impl UploadjoyApi {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            infra_url: DEFAULT_INFRA_URL.to_string(),
            api_base: format!("{DEFAULT_INFRA_URL}/api/v1"),
        }
    }

    pub fn from_config(config: &HandlerConfig) -> Self {
        Self::new(config.secret.clone()).with_infra_url(config.infra_url.clone())
    }

    /// Host of the upload endpoints. Also moves the object API base.
    pub fn with_infra_url<S: Into<String>>(mut self, url: S) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.api_base = format!("{url}/api/v1");
        self.infra_url = url;
        self
    }

    pub fn with_api_base<S: Into<String>>(mut self, url: S) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn infra_url(&self) -> &str {
        &self.infra_url
    }

    async fn read<O: DeserializeOwned>(res: Response) -> ApiResult<O> {
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            warn!(status = status.as_u16(), %body, "storage API call failed");
            return Err(ApiError::status(status.as_u16(), body));
        }
        let bytes = res.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::invalid_response(e.to_string()))
    }

    async fn post_json<I, O>(&self, url: &str, input: &I) -> ApiResult<O>
    where
        I: Serialize + ?Sized + Sync,
        O: DeserializeOwned,
    {
        debug!(url, "POST");
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(VERSION_HEADER, PROTOCOL_VERSION)
            .json(input)
            .send()
            .await?;
        Self::read(res).await
    }

    /// Presigned POST targets for new objects.
    #[instrument(skip_all, fields(count = input.objects.len()))]
    pub async fn upload_objects(&self, input: &UploadObjectsInput) -> ApiResult<UploadObjectsOutput> {
        let url = format!("{}/presigned-url/put-objects", self.api_base);
        self.post_json(&url, input).await
    }

    /// Presigned GET URLs for private objects.
    #[instrument(skip_all, fields(count = input.keys.len()))]
    pub async fn download_private_objects(
        &self,
        input: &DownloadPrivateObjectsInput,
    ) -> ApiResult<DownloadPrivateObjectsOutput> {
        let url = format!("{}/presigned-url/get-private-objects", self.api_base);
        self.post_json(&url, input).await
    }

    #[instrument(skip_all, fields(key = %input.key, parts = input.file_part_names.len()))]
    pub async fn multipart_upload_object(
        &self,
        input: &MultipartUploadObjectInput,
    ) -> ApiResult<MultipartUploadObjectOutput> {
        let url = format!("{}/presigned-url/multipart-upload-object", self.api_base);
        self.post_json(&url, input).await
    }

    #[instrument(skip_all, fields(key = %input.key, upload_id = %input.upload_id))]
    pub async fn complete_multipart_upload(
        &self,
        input: &CompleteMultipartInput,
    ) -> ApiResult<MultipartUploadRef> {
        let url = format!("{}/multipart-upload/complete", self.api_base);
        self.post_json(&url, input).await
    }

    #[instrument(skip_all, fields(key = %input.key, upload_id = %input.upload_id))]
    pub async fn abort_multipart_upload(
        &self,
        input: &AbortMultipartInput,
    ) -> ApiResult<MultipartUploadRef> {
        let url = format!("{}/multipart-upload/abort", self.api_base);
        self.post_json(&url, input).await
    }
}

#[async_trait]
impl StorageApi for UploadjoyApi {
    #[instrument(skip_all, fields(files = request.files.len(), slug = %request.callback_slug))]
    async fn prepare_upload(&self, request: &PrepareUploadRequest) -> ApiResult<Value> {
        let url = format!("{}/api/prepareUpload", self.infra_url);
        self.post_json(&url, request).await
    }

    #[instrument(skip(self))]
    async fn poll_upload(&self, upload_request_id: &str) -> ApiResult<PollUploadResponse> {
        let url = format!("{}/api/pollUpload", self.infra_url);
        let res = self
            .http
            .get(&url)
            .query(&[("uploadRequestId", upload_request_id)])
            .bearer_auth(&self.token)
            .header(VERSION_HEADER, PROTOCOL_VERSION)
            .send()
            .await?;
        Self::read(res).await
    }
}
