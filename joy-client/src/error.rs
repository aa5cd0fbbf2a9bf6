use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by the acquisition controller, the endpoint and the upload executor
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("No file found for presigned URL: {key}")]
    NoFileForPresignedUrl { key: String },

    #[error("Upload endpoint responded with {status}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response as JSON. Got: {body}")]
    InvalidResponse { body: String },

    #[error("Upload of {file} failed: {reason}")]
    Transfer { file: String, reason: String },

    #[error("{message}")]
    Picker { message: String },

    #[error("Uploads are disabled for this route")]
    Disabled,

    #[error("No presigned URLs to upload with")]
    NothingToUpload,

    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn no_file_for<S: Into<String>>(key: S) -> Self {
        Self::NoFileForPresignedUrl { key: key.into() }
    }

    pub fn status<S: Into<String>>(status: u16, body: S) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn transfer<F: Into<String>, R: Into<String>>(file: F, reason: R) -> Self {
        Self::Transfer {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn picker<S: Into<String>>(message: S) -> Self {
        Self::Picker {
            message: message.into(),
        }
    }
}
