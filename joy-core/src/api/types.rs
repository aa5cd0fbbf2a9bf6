//! Request/response bodies of the object API (`/api/v1`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::protocol::Access;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlOptions {
    /// URL lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl PresignedUrlOptions {
    pub fn expires_in(seconds: u64) -> Self {
        Self {
            expires_in: Some(seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUpload {
    pub key: String,
    pub visibility: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url_options: Option<PresignedUrlOptions>,
}

impl ObjectUpload {
    pub fn new(key: impl Into<String>, visibility: Access) -> Self {
        Self {
            key: key.into(),
            visibility,
            presigned_url_options: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadObjectsInput {
    pub objects: Vec<ObjectUpload>,
}

/// Either a presigned POST target or a per-object error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadObjectUrl {
    Ready {
        key: String,
        visibility: Access,
        url: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Failed {
        key: String,
        visibility: Access,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadObjectsOutput {
    pub presigned_urls: Vec<UploadObjectUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPrivateObjectsInput {
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url_options: Option<PresignedUrlOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateObjectUrl {
    pub key: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPrivateObjectsOutput {
    pub presigned_urls: Vec<PrivateObjectUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadObjectInput {
    pub key: String,
    pub visibility: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presigned_url_options: Option<PresignedUrlOptions>,
    pub file_part_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultipartPartUrl {
    #[serde(rename_all = "camelCase")]
    Ready {
        file_part_name: String,
        url: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
        part_number: u32,
    },
    #[serde(rename_all = "camelCase")]
    Failed { file_part_name: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadObjectOutput {
    pub key: String,
    pub visibility: Access,
    pub upload_id: String,
    pub presigned_urls: Vec<MultipartPartUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub e_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMultipartInput {
    pub upload_id: String,
    pub key: String,
    pub completed_parts: Vec<CompletedPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortMultipartInput {
    pub upload_id: String,
    pub key: String,
}

/// Echo of the multipart upload a complete/abort call acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadRef {
    pub upload_id: String,
    pub key: String,
}
