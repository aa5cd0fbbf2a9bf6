//! Wire types shared by the request handler, framework adapters and clients.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::route_config::ExpandedRouteConfig;

/// Protocol version, sent on every response and outbound storage API call.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HOOK_HEADER: &str = "uploadjoy-hook";
pub const SIGNATURE_HEADER: &str = "x-uploadjoy-wh-signature";
pub const VERSION_HEADER: &str = "x-uploadjoy-version";

/// `actionType` query value that starts an upload.
pub const UPLOAD_ACTION: &str = "upload";

/// Visibility of an uploaded object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Public,
    Private,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of the `uploadjoy-hook` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Callback,
    DevServer,
}

impl Hook {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "callback" => Some(Hook::Callback),
            "devServer" => Some(Hook::DevServer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Callback => "callback",
            Hook::DevServer => "devServer",
        }
    }
}

/// A file the client wants to upload, as announced in the upload action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub file_type: String,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, size: u64, file_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            file_type: file_type.into(),
        }
    }
}

/// Body of `POST ?actionType=upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadActionBody {
    pub files: Vec<FileInfo>,
}

/// One item of the route listing (`GET`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMetadata {
    pub slug: String,
    pub config: ExpandedRouteConfig,
    pub access: Access,
}

/// A stored object, as reported by the completion webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub key: String,
    pub url: String,
    pub access: Access,
    pub size: u64,
}

/// Completion webhook body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub file: UploadedFile,
    #[serde(default)]
    pub metadata: Value,
    #[serde(rename = "uploadjoyUploadRequestId")]
    pub upload_request_id: String,
}

/// Body of the dev-server ping sent by clients in development.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevServerPing {
    #[serde(rename = "uploadRequestId")]
    pub upload_request_id: String,
}

/// A presigned single-request upload target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardDescriptor {
    pub url: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    pub key: String,
    #[serde(rename = "uploadjoyUploadRequestId")]
    pub upload_request_id: String,
    pub access: Access,
}

/// One part of a multipart upload target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDescriptor {
    pub part_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// A presigned multipart upload target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartDescriptor {
    pub key: String,
    #[serde(rename = "s3MultipartUploadId", alias = "s3UploadId")]
    pub upload_id: String,
    #[serde(rename = "uploadjoyUploadRequestId", default)]
    pub upload_request_id: String,
    #[serde(default)]
    pub access: Access,
    #[serde(rename = "urls", alias = "parts")]
    pub parts: Vec<PartDescriptor>,
}

/// Where and how to send one file, as issued by the storage API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "uploadType", rename_all = "lowercase")]
pub enum PresignedDescriptor {
    Standard(StandardDescriptor),
    Multipart(MultipartDescriptor),
}

impl PresignedDescriptor {
    pub fn key(&self) -> &str {
        match self {
            PresignedDescriptor::Standard(d) => &d.key,
            PresignedDescriptor::Multipart(d) => &d.key,
        }
    }

    /// Last path segment of the key, which is the original file name.
    pub fn file_name(&self) -> &str {
        let key = self.key();
        key.rsplit('/').next().unwrap_or(key)
    }

    pub fn upload_request_id(&self) -> &str {
        match self {
            PresignedDescriptor::Standard(d) => &d.upload_request_id,
            PresignedDescriptor::Multipart(d) => &d.upload_request_id,
        }
    }

    pub fn access(&self) -> Access {
        match self {
            PresignedDescriptor::Standard(d) => d.access,
            PresignedDescriptor::Multipart(d) => d.access,
        }
    }
}

/// Body of a successful upload action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrlRequestResponse {
    pub urls: Vec<PresignedDescriptor>,
}

/// One file of a prepare-upload call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareUploadFile {
    pub key: String,
    pub upload_type: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
}

/// Body of `POST {infra}/api/prepareUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareUploadRequest {
    pub files: Vec<PrepareUploadFile>,
    pub config: ExpandedRouteConfig,
    pub file_access: Access,
    #[serde(default)]
    pub metadata: Value,
    pub callback_url: String,
    pub callback_slug: String,
}

/// Body of `GET {infra}/api/pollUpload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollUploadResponse {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "fileData", default)]
    pub file_data: Option<PolledFile>,
}

impl PollUploadResponse {
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }
}

/// What the storage backend knows about a finished upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledFile {
    pub url: String,
    pub key: String,
    pub name: String,
    pub access: Access,
    pub size: u64,
    #[serde(default)]
    pub metadata: Value,
    pub callback_url: String,
    pub callback_slug: String,
}

impl PolledFile {
    /// Metadata as an object. The backend stores it as a JSON string;
    /// missing metadata becomes `{}`.
    pub fn metadata_value(&self) -> Value {
        match &self.metadata {
            Value::Null => Value::Object(Default::default()),
            Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
            other => other.clone(),
        }
    }

    pub fn uploaded_file(&self) -> UploadedFile {
        UploadedFile {
            name: self.name.clone(),
            key: self.key.clone(),
            url: self.url.clone(),
            access: self.access,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptors_are_tagged_by_upload_type() {
        let body = json!({"urls": [
            {"uploadType": "standard", "url": "https://s3/bucket", "fields": {"key": "a/cat.png"},
             "key": "a/cat.png", "uploadjoyUploadRequestId": "req-1", "access": "private"},
            {"uploadType": "multipart", "key": "big.mov", "s3UploadId": "up-9",
             "parts": [{"partNumber": 1, "url": "https://s3/p1"}]}
        ]});
        let res: PresignedUrlRequestResponse = serde_json::from_value(body).unwrap();

        assert_eq!(res.urls[0].file_name(), "cat.png");
        assert_eq!(res.urls[0].access(), Access::Private);
        match &res.urls[1] {
            PresignedDescriptor::Multipart(m) => {
                assert_eq!(m.upload_id, "up-9");
                assert_eq!(m.parts[0].part_number, 1);
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn hook_header_values() {
        assert_eq!(Hook::parse("devServer"), Some(Hook::DevServer));
        assert_eq!(Hook::parse("callback"), Some(Hook::Callback));
        assert_eq!(Hook::parse("Callback"), None);
    }
}
