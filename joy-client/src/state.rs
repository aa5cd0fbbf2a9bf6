//! The acquisition state and its pure transition function.

use joy_core::protocol::PresignedUrlRequestResponse;

use crate::types::{ClientFile, InputError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionState {
    pub is_file_dialog_active: bool,
    pub is_focused: bool,
    pub is_drag_active: bool,
    pub accepted_files: Vec<ClientFile>,
    pub errors: Vec<InputError>,
    pub presigned_urls: Option<PresignedUrlRequestResponse>,
    pub ready_to_upload: bool,
    pub is_uploading: bool,
}

/// Coarse view of [`AcquisitionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    DialogOpen,
    ReadyToUpload,
    Uploading,
    /// The last selection produced errors.
    Rejected,
}

impl AcquisitionState {
    pub fn phase(&self) -> Phase {
        if self.is_uploading {
            Phase::Uploading
        } else if self.is_file_dialog_active {
            Phase::DialogOpen
        } else if self.ready_to_upload {
            Phase::ReadyToUpload
        } else if !self.errors.is_empty() {
            Phase::Rejected
        } else {
            Phase::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Focus,
    Blur,
    /// Clears the previous selection.
    OpenDialog,
    CloseDialog,
    SetDragActive(bool),
    SetFiles {
        accepted_files: Vec<ClientFile>,
        errors: Vec<InputError>,
        presigned_urls: Option<PresignedUrlRequestResponse>,
        ready_to_upload: bool,
    },
    SetPresignedUrls(Option<PresignedUrlRequestResponse>),
    SetIsUploading,
    SetDoneUploading,
    Reset,
}

pub fn reduce(state: AcquisitionState, transition: Transition) -> AcquisitionState {
    match transition {
        Transition::Focus => AcquisitionState {
            is_focused: true,
            ..state
        },
        Transition::Blur => AcquisitionState {
            is_focused: false,
            ..state
        },
        Transition::OpenDialog => AcquisitionState {
            is_file_dialog_active: true,
            accepted_files: Vec::new(),
            errors: Vec::new(),
            presigned_urls: None,
            ..state
        },
        Transition::CloseDialog => AcquisitionState {
            is_file_dialog_active: false,
            ..state
        },
        Transition::SetDragActive(active) => AcquisitionState {
            is_drag_active: active,
            ..state
        },
        Transition::SetFiles {
            accepted_files,
            errors,
            presigned_urls,
            ready_to_upload,
        } => AcquisitionState {
            accepted_files,
            errors,
            presigned_urls,
            ready_to_upload,
            ..state
        },
        Transition::SetPresignedUrls(presigned_urls) => AcquisitionState {
            presigned_urls,
            ..state
        },
        Transition::SetIsUploading => AcquisitionState {
            is_uploading: true,
            ..state
        },
        Transition::SetDoneUploading => AcquisitionState {
            ready_to_upload: false,
            is_uploading: false,
            ..state
        },
        Transition::Reset => AcquisitionState {
            accepted_files: Vec::new(),
            errors: Vec::new(),
            presigned_urls: None,
            ready_to_upload: false,
            is_uploading: false,
            ..state
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> AcquisitionState {
        reduce(
            AcquisitionState::default(),
            Transition::SetFiles {
                accepted_files: vec![ClientFile::new("a.png", "image/png", vec![1u8])],
                errors: Vec::new(),
                presigned_urls: Some(PresignedUrlRequestResponse { urls: Vec::new() }),
                ready_to_upload: true,
            },
        )
    }

    #[test]
    fn open_dialog_clears_the_previous_selection() {
        let state = reduce(ready(), Transition::OpenDialog);
        assert!(state.is_file_dialog_active);
        assert!(state.accepted_files.is_empty());
        assert!(state.presigned_urls.is_none());
        assert_eq!(state.phase(), Phase::DialogOpen);
    }

    #[test]
    fn upload_cycle_returns_to_idle() {
        let state = ready();
        assert_eq!(state.phase(), Phase::ReadyToUpload);

        let state = reduce(state, Transition::SetIsUploading);
        assert_eq!(state.phase(), Phase::Uploading);

        let state = reduce(state, Transition::SetDoneUploading);
        assert_eq!(state.phase(), Phase::Idle);
        // Accepted files stay visible until the next selection.
        assert_eq!(state.accepted_files.len(), 1);
    }

    #[test]
    fn reset_keeps_focus_and_dialog_flags() {
        let state = reduce(reduce(ready(), Transition::Focus), Transition::SetIsUploading);
        let state = reduce(state, Transition::Reset);
        assert!(state.is_focused);
        assert!(!state.is_uploading);
        assert!(state.accepted_files.is_empty());
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn errors_without_dialog_are_rejected_phase() {
        let state = reduce(
            AcquisitionState::default(),
            Transition::SetFiles {
                accepted_files: Vec::new(),
                errors: vec![InputError::FolderNameError { message: "bad".into() }],
                presigned_urls: None,
                ready_to_upload: false,
            },
        );
        assert_eq!(state.phase(), Phase::Rejected);
    }
}
