//! Files and error records the client hands to callers.

use std::fmt;

use bytes::Bytes;
use joy_core::protocol::FileInfo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file picked or dropped by the user, held in memory until upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFile {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    /// Declared MIME type. Empty when the platform did not report one.
    pub mime: String,
    pub data: Bytes,
}

impl ClientFile {
    pub fn new<N, M, D>(name: N, mime: M, data: D) -> Self
    where
        N: Into<String>,
        M: Into<String>,
        D: Into<Bytes>,
    {
        let data = data.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            size: data.len() as u64,
            mime: mime.into(),
            data,
        }
    }

    /// What the upload action announces to the server.
    pub fn info(&self) -> FileInfo {
        FileInfo::new(self.name.clone(), self.size, self.mime.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    DragAndDropError,
    FileTooLarge,
    FileTooSmall,
    InvalidFileType,
    FileNameInvalid,
    TooManyFiles,
    PresignedUrlFetchError,
    UploadError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DragAndDropError => "drag-and-drop-error",
            ErrorCode::FileTooLarge => "file-too-large",
            ErrorCode::FileTooSmall => "file-too-small",
            ErrorCode::InvalidFileType => "invalid-file-type",
            ErrorCode::FileNameInvalid => "file-name-invalid",
            ErrorCode::TooManyFiles => "too-many-files",
            ErrorCode::PresignedUrlFetchError => "presigned-url-fetch-error",
            ErrorCode::UploadError => "upload-error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coded, human readable problem with a file or a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderError {
    pub code: ErrorCode,
    pub message: String,
}

impl UploaderError {
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_file_type(accept: &[String]) -> Self {
        Self::new(
            ErrorCode::InvalidFileType,
            format!("Invalid file type. Only {} are allowed.", accept.join(", ")),
        )
    }

    pub fn too_large(max_size: u64) -> Self {
        Self::new(
            ErrorCode::FileTooLarge,
            format!("File too large. Maximum size allowed is {max_size} bytes."),
        )
    }

    pub fn too_small(min_size: u64) -> Self {
        Self::new(
            ErrorCode::FileTooSmall,
            format!("File too small. Minimum size allowed is {min_size} bytes."),
        )
    }

    pub fn too_many_files(max_files: u32) -> Self {
        Self::new(
            ErrorCode::TooManyFiles,
            format!("Too many files. Maximum allowed is {max_files}."),
        )
    }
}

/// One file that failed validation, with every reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRejection {
    pub file: ClientFile,
    pub errors: Vec<UploaderError>,
}

/// Entries of the controller's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    FolderNameError { message: String },
    FileRejectionError(FileRejection),
    /// A request made on the user's behalf failed, e.g. fetching presigned URLs.
    RequestError(UploaderError),
}

impl InputError {
    /// Codes carried by this entry. Folder errors have none.
    pub fn codes(&self) -> Vec<ErrorCode> {
        match self {
            InputError::FolderNameError { .. } => Vec::new(),
            InputError::FileRejectionError(rejection) => {
                rejection.errors.iter().map(|e| e.code).collect()
            }
            InputError::RequestError(err) => vec![err.code],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_kebab_case() {
        let json = serde_json::to_string(&ErrorCode::PresignedUrlFetchError).unwrap();
        assert_eq!(json, "\"presigned-url-fetch-error\"");
        assert_eq!(ErrorCode::TooManyFiles.to_string(), "too-many-files");
    }

    #[test]
    fn file_size_comes_from_data() {
        let file = ClientFile::new("cat.png", "image/png", vec![0u8; 12]);
        assert_eq!(file.size, 12);
        assert_eq!(file.info(), FileInfo::new("cat.png", 12, "image/png"));
    }
}
