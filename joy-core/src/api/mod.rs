//! # Storage API
//!
//! The handler talks to the external storage service through the
//! [`StorageApi`] trait so tests (and alternative backends) can stand in for
//! it. [`UploadjoyApi`] is the HTTP implementation and also exposes the
//! object endpoints (`/api/v1/...`) for server-side use.

pub mod client;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{PollUploadResponse, PrepareUploadRequest};

pub use client::UploadjoyApi;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx answer; the body is kept for diagnostics.
    #[error("Storage API responded with {status}")]
    Status { status: u16, body: Value },

    #[error("Storage API request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    #[error("Unexpected storage API response: {message}")]
    InvalidResponse { message: String },
}

impl ApiError {
    pub fn status<B: Into<Value>>(status: u16, body: B) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport { source } => source.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse { .. } => None,
        }
    }
}

/// What the request handler needs from the storage service.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// `POST /api/prepareUpload`. The JSON body is returned untouched.
    async fn prepare_upload(&self, request: &PrepareUploadRequest) -> ApiResult<Value>;

    /// `GET /api/pollUpload?uploadRequestId=...`
    async fn poll_upload(&self, upload_request_id: &str) -> ApiResult<PollUploadResponse>;
}
