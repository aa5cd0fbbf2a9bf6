#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use joy_client::transport::ProgressFn;
use joy_client::{
    ClientError, ClientFile, ClientResult, FilePicker, PickerError, PickerKind, PickerOptions,
    Progress, TransferReceipt, UploadEndpoint, UploadTransport,
};
use joy_core::protocol::{
    EndpointMetadata, FileInfo, MultipartDescriptor, PresignedDescriptor,
    PresignedUrlRequestResponse, StandardDescriptor,
};
use joy_core::{Access, RouteConfig};
use parking_lot::Mutex;

pub fn route(slug: &str, config: RouteConfig) -> EndpointMetadata {
    EndpointMetadata {
        slug: slug.to_string(),
        config: config.expand().unwrap(),
        access: Access::Public,
    }
}

pub fn png(name: &str, size: usize) -> ClientFile {
    ClientFile::new(name, "image/png", vec![1u8; size])
}

pub fn standard(name: &str) -> PresignedDescriptor {
    PresignedDescriptor::Standard(StandardDescriptor {
        url: "https://bucket.s3.amazonaws.com".to_string(),
        fields: BTreeMap::from([("key".to_string(), format!("user_1/{name}"))]),
        key: format!("user_1/{name}"),
        upload_request_id: format!("req-{name}"),
        access: Access::Public,
    })
}

pub fn multipart(name: &str) -> PresignedDescriptor {
    serde_json::from_value(serde_json::json!({
        "uploadType": "multipart",
        "key": format!("user_1/{name}"),
        "s3UploadId": "up-1",
        "uploadjoyUploadRequestId": format!("req-{name}"),
        "parts": [
            {"partNumber": 1, "url": "https://bucket/p1"},
            {"partNumber": 2, "url": "https://bucket/p2"}
        ]
    }))
    .unwrap()
}

#[derive(Default)]
pub struct MockEndpoint {
    pub routes: Vec<EndpointMetadata>,
    pub fail_presign: bool,
    pub presign_calls: AtomicUsize,
    pub pings: Mutex<Vec<String>>,
}

impl MockEndpoint {
    pub fn with_routes(routes: Vec<EndpointMetadata>) -> Self {
        Self {
            routes,
            ..Self::default()
        }
    }

    pub fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadEndpoint for MockEndpoint {
    async fn metadata(&self) -> ClientResult<Vec<EndpointMetadata>> {
        Ok(self.routes.clone())
    }

    async fn presigned_urls(
        &self,
        _slug: &str,
        files: &[FileInfo],
    ) -> ClientResult<PresignedUrlRequestResponse> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_presign {
            return Err(ClientError::status(500, "Unable to upload file."));
        }
        Ok(PresignedUrlRequestResponse {
            urls: files.iter().map(|f| standard(&f.name)).collect(),
        })
    }

    async fn dev_server_ping(&self, upload_request_id: &str) -> ClientResult<()> {
        self.pings.lock().push(upload_request_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockTransport {
    pub fail: Vec<String>,
    pub sent: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl UploadTransport for MockTransport {
    async fn send_standard(
        &self,
        file: &ClientFile,
        target: &StandardDescriptor,
        progress: ProgressFn,
    ) -> ClientResult<TransferReceipt> {
        self.sent.lock().push(file.name.clone());
        progress(Progress {
            loaded: file.size,
            total: file.size,
        });
        if self.fail.contains(&file.name) {
            return Err(ClientError::transfer(&file.name, "storage responded with 403 Forbidden"));
        }
        Ok(TransferReceipt::Standard {
            key: target.key.clone(),
        })
    }

    async fn send_multipart(
        &self,
        file: &ClientFile,
        target: &MultipartDescriptor,
        _progress: ProgressFn,
    ) -> ClientResult<TransferReceipt> {
        self.sent.lock().push(file.name.clone());
        Ok(TransferReceipt::Multipart {
            key: target.key.clone(),
            upload_id: target.upload_id.clone(),
            parts: Vec::new(),
        })
    }
}

/// Picker answering every call with the same outcome.
pub struct ScriptedPicker {
    pub kind: PickerKind,
    pub outcome: Result<Vec<ClientFile>, PickerError>,
    pub selected: usize,
    pub calls: AtomicUsize,
}

impl ScriptedPicker {
    pub fn new(kind: PickerKind, outcome: Result<Vec<ClientFile>, PickerError>) -> Self {
        Self {
            kind,
            outcome,
            selected: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FilePicker for ScriptedPicker {
    fn kind(&self) -> PickerKind {
        self.kind
    }

    async fn pick(&self, _options: &PickerOptions) -> Result<Vec<ClientFile>, PickerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn selected_count(&self) -> usize {
        self.selected
    }
}
