//! File picking capability.
//!
//! Two strategies exist: a native dialog API and a fallback input element.
//! The controller starts with the native picker when one is given and
//! switches to the fallback for good after a security error.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::ClientFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKind {
    Native,
    Fallback,
}

/// What the dialog should offer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PickerOptions {
    pub multiple: bool,
    /// Accepted patterns. Empty means any file.
    pub accept: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PickerError {
    /// The user dismissed the dialog.
    #[error("file dialog was dismissed")]
    Aborted,

    /// The platform refused the native API, e.g. outside a secure context.
    #[error("file dialog blocked: {0}")]
    Security(String),

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait FilePicker: Send + Sync {
    fn kind(&self) -> PickerKind;

    /// Show the dialog and wait for the user's choice.
    async fn pick(&self, options: &PickerOptions) -> Result<Vec<ClientFile>, PickerError>;

    /// Files currently held by the picker. Only meaningful for the fallback
    /// input, whose cancellation is not reported directly.
    fn selected_count(&self) -> usize {
        0
    }
}
