//! Moving file bytes to presigned storage targets.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use joy_core::protocol::{MultipartDescriptor, StandardDescriptor};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Body, Client};
use tracing::{debug, instrument};

use crate::config::{ClientConfig, DEFAULT_PROGRESS_CHUNK_SIZE};
use crate::error::{ClientError, ClientResult};
use crate::types::ClientFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: u64,
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// What a finished transfer leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferReceipt {
    Standard {
        key: String,
    },
    /// Parts are uploaded but not assembled; completing the upload is the
    /// server's job.
    Multipart {
        key: String,
        upload_id: String,
        parts: Vec<CompletedPart>,
    },
}

impl TransferReceipt {
    pub fn key(&self) -> &str {
        match self {
            TransferReceipt::Standard { key } => key,
            TransferReceipt::Multipart { key, .. } => key,
        }
    }
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// One form POST carrying the descriptor's fields and the file.
    async fn send_standard(
        &self,
        file: &ClientFile,
        target: &StandardDescriptor,
        progress: ProgressFn,
    ) -> ClientResult<TransferReceipt>;

    /// One PUT per part.
    async fn send_multipart(
        &self,
        file: &ClientFile,
        target: &MultipartDescriptor,
        progress: ProgressFn,
    ) -> ClientResult<TransferReceipt>;
}

/// S3 object tagging that links the object to its upload request.
pub fn tagging(upload_request_id: &str) -> String {
    format!(
        "<Tagging><TagSet><Tag><Key>UploadRequestId</Key><Value>{upload_request_id}</Value></Tag></TagSet></Tagging>"
    )
}

/// Split `data` into `parts` chunks of equal size; the last one may be shorter.
pub fn split_parts(data: &Bytes, parts: usize) -> Vec<Bytes> {
    if parts == 0 {
        return Vec::new();
    }
    let len = data.len();
    let chunk = len.div_ceil(parts).max(1);
    (0..parts)
        .map(|i| {
            let start = (i * chunk).min(len);
            let end = (start + chunk).min(len);
            data.slice(start..end)
        })
        .collect()
}

/// A request body that reports progress as it is read.
fn progress_body(data: Bytes, chunk_size: usize, progress: ProgressFn) -> Body {
    let total = data.len() as u64;
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect();

    let mut loaded = 0u64;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        loaded += chunk.len() as u64;
        progress(Progress { loaded, total });
        Ok::<_, std::io::Error>(chunk)
    }));
    Body::wrap_stream(stream)
}

/// [`UploadTransport`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    chunk_size: usize,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            http: Client::new(),
            chunk_size: DEFAULT_PROGRESS_CHUNK_SIZE,
        }
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::default().with_chunk_size(config.progress_chunk_size)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    #[instrument(skip_all, fields(file = %file.name, key = %target.key))]
    async fn send_standard(
        &self,
        file: &ClientFile,
        target: &StandardDescriptor,
        progress: ProgressFn,
    ) -> ClientResult<TransferReceipt> {
        let mut form = Form::new();
        for (name, value) in &target.fields {
            form = form.text(name.clone(), value.clone());
        }
        // S3 ignores everything after the file field.
        form = form.text("tagging", tagging(&target.upload_request_id));

        let body = progress_body(file.data.clone(), self.chunk_size, progress);
        let mut part = Part::stream_with_length(body, file.size).file_name(file.name.clone());
        if !file.mime.is_empty() {
            part = part.mime_str(&file.mime)?;
        }
        form = form.part("file", part);

        let res = self.http.post(&target.url).multipart(form).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::transfer(
                &file.name,
                format!("storage responded with {status}: {body}"),
            ));
        }

        debug!("standard upload finished");
        Ok(TransferReceipt::Standard {
            key: target.key.clone(),
        })
    }

    #[instrument(skip_all, fields(file = %file.name, key = %target.key, parts = target.parts.len()))]
    async fn send_multipart(
        &self,
        file: &ClientFile,
        target: &MultipartDescriptor,
        progress: ProgressFn,
    ) -> ClientResult<TransferReceipt> {
        if target.parts.is_empty() {
            return Err(ClientError::transfer(&file.name, "multipart upload has no parts"));
        }

        let chunks = split_parts(&file.data, target.parts.len());
        let mut loaded = 0u64;
        let mut completed = Vec::with_capacity(chunks.len());

        for (part, chunk) in target.parts.iter().zip(chunks) {
            let url = part.url.as_deref().ok_or_else(|| {
                ClientError::transfer(&file.name, format!("part {} has no URL", part.part_number))
            })?;

            let len = chunk.len() as u64;
            let res = self.http.put(url).body(chunk).send().await?;
            let status = res.status();
            if !status.is_success() {
                return Err(ClientError::transfer(
                    &file.name,
                    format!("part {} failed with {status}", part.part_number),
                ));
            }

            let etag = res
                .headers()
                .get(header::ETAG)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    ClientError::transfer(&file.name, format!("part {} returned no ETag", part.part_number))
                })?
                .to_string();

            loaded += len;
            progress(Progress {
                loaded,
                total: file.size,
            });
            completed.push(CompletedPart {
                part_number: part.part_number,
                etag,
            });
        }

        debug!(parts = completed.len(), "multipart parts uploaded");
        Ok(TransferReceipt::Multipart {
            key: target.key.clone(),
            upload_id: target.upload_id.clone(),
            parts: completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_equal_except_the_last() {
        let data = Bytes::from(vec![7u8; 10]);
        let parts = split_parts(&data, 3);
        let lens: Vec<_> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(lens, vec![4, 4, 2]);
        assert_eq!(split_parts(&data, 1)[0].len(), 10);
        assert!(split_parts(&data, 0).is_empty());
    }

    #[test]
    fn tagging_names_the_upload_request() {
        assert_eq!(
            tagging("req-1"),
            "<Tagging><TagSet><Tag><Key>UploadRequestId</Key><Value>req-1</Value></Tag></TagSet></Tagging>"
        );
    }
}
