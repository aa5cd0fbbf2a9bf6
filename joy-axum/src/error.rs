use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use joy_core::errors::JoyError;
pub use joy_core::handler::DEFAULT_ERROR_MESSAGE;
use joy_core::protocol::{PROTOCOL_VERSION, VERSION_HEADER};

/// Adapter-level failure, rendered the way the upload protocol expects:
/// plain-text message, version header.
#[derive(Debug)]
pub struct JoyAxumError(pub anyhow::Error);

impl From<anyhow::Error> for JoyAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<JoyError> for JoyAxumError {
    fn from(e: JoyError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for JoyAxumError {
    fn into_response(self) -> Response {
        // A JoyError keeps its status even behind anyhow contexts.
        let (status, message) = match JoyError::from_anyhow(&self.0) {
            Some(joy) => {
                let safe = joy.sanitize_for_client();
                let status =
                    StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, safe.message)
            }
            None => {
                tracing::error!(error = ?self.0, "upload adapter failed");
                (StatusCode::INTERNAL_SERVER_ERROR, DEFAULT_ERROR_MESSAGE.to_string())
            }
        };

        let mut res = (status, message).into_response();
        res.headers_mut()
            .insert(VERSION_HEADER, HeaderValue::from_static(PROTOCOL_VERSION));
        res
    }
}
