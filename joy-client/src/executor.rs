//! Sends accepted files to their presigned targets.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use joy_core::protocol::{Access, PresignedDescriptor, PresignedUrlRequestResponse};
use tracing::{error, info, warn};

use crate::endpoint::UploadEndpoint;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Progress, ProgressFn, TransferReceipt, UploadTransport};
use crate::types::ClientFile;

pub type ProgressCallback = Arc<dyn Fn(&ClientFile, Access, Progress) + Send + Sync>;
pub type SuccessCallback = Arc<dyn Fn(&ClientFile, Access) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ClientFile, Access, &ClientError) + Send + Sync>;

/// Per-file hooks fired while uploads run.
#[derive(Clone, Default)]
pub struct UploadCallbacks {
    pub on_upload_progress: Option<ProgressCallback>,
    pub on_upload_success: Option<SuccessCallback>,
    pub on_upload_error: Option<ErrorCallback>,
}

impl fmt::Debug for UploadCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCallbacks")
            .field("on_upload_progress", &self.on_upload_progress.is_some())
            .field("on_upload_success", &self.on_upload_success.is_some())
            .field("on_upload_error", &self.on_upload_error.is_some())
            .finish()
    }
}

impl UploadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_upload_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClientFile, Access, Progress) + Send + Sync + 'static,
    {
        self.on_upload_progress = Some(Arc::new(f));
        self
    }

    pub fn on_upload_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClientFile, Access) + Send + Sync + 'static,
    {
        self.on_upload_success = Some(Arc::new(f));
        self
    }

    pub fn on_upload_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClientFile, Access, &ClientError) + Send + Sync + 'static,
    {
        self.on_upload_error = Some(Arc::new(f));
        self
    }
}

/// How one file's transfer settled.
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    pub key: String,
    pub access: Access,
    pub result: ClientResult<TransferReceipt>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every transfer of one batch, in descriptor order.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(UploadOutcome::is_success)
    }

    /// Receipts of multipart transfers the server still has to complete.
    pub fn multipart_receipts(&self) -> Vec<&TransferReceipt> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .filter(|r| matches!(r, TransferReceipt::Multipart { .. }))
            .collect()
    }
}

#[derive(Clone)]
pub struct UploadExecutor {
    endpoint: Arc<dyn UploadEndpoint>,
    transport: Arc<dyn UploadTransport>,
    dev_mode: bool,
}

impl UploadExecutor {
    pub fn new(endpoint: Arc<dyn UploadEndpoint>, transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            endpoint,
            transport,
            dev_mode: false,
        }
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Upload `files` to the targets in `presigned`.
    ///
    /// Targets are matched to files by the last segment of their key. A
    /// target without a file fails the whole batch before anything is sent.
    /// Otherwise all transfers run concurrently and every one settles; the
    /// report holds each outcome.
    pub async fn upload(
        &self,
        files: &[ClientFile],
        presigned: &PresignedUrlRequestResponse,
        callbacks: &UploadCallbacks,
    ) -> ClientResult<UploadReport> {
        let mut jobs = Vec::with_capacity(presigned.urls.len());
        for descriptor in &presigned.urls {
            let name = descriptor.file_name();
            let file = files.iter().find(|f| f.name == name).ok_or_else(|| {
                error!(key = descriptor.key(), "no file found for presigned URL");
                ClientError::no_file_for(descriptor.key())
            })?;
            jobs.push((file, descriptor));
        }

        info!(files = jobs.len(), "starting uploads");
        let outcomes = join_all(
            jobs.into_iter()
                .map(|(file, descriptor)| self.transfer(file, descriptor, callbacks)),
        )
        .await;

        let report = UploadReport { outcomes };
        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "uploads settled"
        );
        Ok(report)
    }

    async fn transfer(
        &self,
        file: &ClientFile,
        descriptor: &PresignedDescriptor,
        callbacks: &UploadCallbacks,
    ) -> UploadOutcome {
        let access = descriptor.access();

        if self.dev_mode {
            // Best effort.
            if let Err(err) = self.endpoint.dev_server_ping(descriptor.upload_request_id()).await {
                warn!(key = descriptor.key(), error = %err, "dev server ping failed");
            }
        }

        let progress: ProgressFn = match &callbacks.on_upload_progress {
            Some(cb) => {
                let cb = cb.clone();
                let file = file.clone();
                Arc::new(move |p: Progress| cb(&file, access, p))
            }
            None => Arc::new(|_: Progress| {}),
        };

        let result = match descriptor {
            PresignedDescriptor::Standard(target) => {
                self.transport.send_standard(file, target, progress).await
            }
            PresignedDescriptor::Multipart(target) => {
                self.transport.send_multipart(file, target, progress).await
            }
        };

        match &result {
            Ok(_) => {
                if let Some(cb) = &callbacks.on_upload_success {
                    cb(file, access);
                }
            }
            Err(err) => {
                error!(file = %file.name, error = %err, "upload failed");
                if let Some(cb) = &callbacks.on_upload_error {
                    cb(file, access, err);
                }
            }
        }

        UploadOutcome {
            file_name: file.name.clone(),
            key: descriptor.key().to_string(),
            access,
            result,
        }
    }
}
