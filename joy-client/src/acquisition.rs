//! # File acquisition
//!
//! [`AcquisitionController`] drives one upload route from the user's point
//! of view: open a dialog or take a drop, validate the selection, fetch
//! presigned URLs for the accepted files and upload them.
//!
//! Every change goes through [`reduce`] under a lock, so concurrent calls
//! see consistent snapshots; the last writer wins.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use joy_core::protocol::EndpointMetadata;
use joy_core::validators::{folder_name_is_valid, FOLDER_NAME_MESSAGE};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClientConfig;
use crate::endpoint::{HttpEndpoint, UploadEndpoint};
use crate::error::{ClientError, ClientResult};
use crate::executor::{UploadCallbacks, UploadExecutor, UploadReport};
use crate::picker::{FilePicker, PickerError, PickerOptions};
use crate::state::{reduce, AcquisitionState, Transition};
use crate::transport::{HttpTransport, UploadTransport};
use crate::types::{ClientFile, ErrorCode, InputError, UploaderError};
use crate::validation::{validate_files, FileValidator, ValidationRules};

/// How long after the window regains focus an empty fallback input counts
/// as a cancelled dialog.
pub const FOCUS_CANCEL_DELAY: Duration = Duration::from_millis(300);

const NO_PICKER_MESSAGE: &str = "Cannot open the file picker because the native file dialog is not supported and no fallback input was provided.";

pub type DialogCallback = Arc<dyn Fn() + Send + Sync>;
pub type DialogErrorCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;
pub type DropCallback = Arc<dyn Fn(&[ClientFile]) + Send + Sync>;

/// Dialog and drop notifications.
#[derive(Clone, Default)]
pub struct AcquisitionCallbacks {
    pub on_file_dialog_open: Option<DialogCallback>,
    pub on_file_dialog_cancel: Option<DialogCallback>,
    /// Without one, dialog errors are logged.
    pub on_file_dialog_error: Option<DialogErrorCallback>,
    pub on_drop: Option<DropCallback>,
}

impl fmt::Debug for AcquisitionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionCallbacks")
            .field("on_file_dialog_open", &self.on_file_dialog_open.is_some())
            .field("on_file_dialog_cancel", &self.on_file_dialog_cancel.is_some())
            .field("on_file_dialog_error", &self.on_file_dialog_error.is_some())
            .field("on_drop", &self.on_drop.is_some())
            .finish()
    }
}

impl AcquisitionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_file_dialog_open<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_file_dialog_open = Some(Arc::new(f));
        self
    }

    pub fn on_file_dialog_cancel<F: Fn() + Send + Sync + 'static>(mut self, f: F) -> Self {
        self.on_file_dialog_cancel = Some(Arc::new(f));
        self
    }

    pub fn on_file_dialog_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.on_file_dialog_error = Some(Arc::new(f));
        self
    }

    pub fn on_drop<F>(mut self, f: F) -> Self
    where
        F: Fn(&[ClientFile]) + Send + Sync + 'static,
    {
        self.on_drop = Some(Arc::new(f));
        self
    }

    fn opened(&self) {
        if let Some(cb) = &self.on_file_dialog_open {
            cb();
        }
    }

    fn cancelled(&self) {
        if let Some(cb) = &self.on_file_dialog_cancel {
            cb();
        }
    }

    fn failed(&self, err: &ClientError) {
        match &self.on_file_dialog_error {
            Some(cb) => cb(err),
            None => error!(error = %err, "file dialog error"),
        }
    }
}

pub struct AcquisitionController {
    slug: String,
    config: ClientConfig,
    endpoint: Arc<dyn UploadEndpoint>,
    executor: UploadExecutor,
    state: Mutex<AcquisitionState>,
    metadata: RwLock<Option<EndpointMetadata>>,
    native: Option<Arc<dyn FilePicker>>,
    fallback: Option<Arc<dyn FilePicker>>,
    native_works: AtomicBool,
    disabled: bool,
    min_size: Option<u64>,
    validator: Option<FileValidator>,
    callbacks: AcquisitionCallbacks,
    upload_callbacks: UploadCallbacks,
}

impl fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionController")
            .field("slug", &self.slug)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

impl AcquisitionController {
    pub fn new<S: Into<String>>(
        slug: S,
        config: ClientConfig,
        endpoint: Arc<dyn UploadEndpoint>,
        transport: Arc<dyn UploadTransport>,
    ) -> Self {
        let executor = UploadExecutor::new(endpoint.clone(), transport).with_dev_mode(config.dev_mode);
        Self {
            slug: slug.into(),
            config,
            endpoint,
            executor,
            state: Mutex::new(AcquisitionState::default()),
            metadata: RwLock::new(None),
            native: None,
            fallback: None,
            native_works: AtomicBool::new(false),
            disabled: false,
            min_size: None,
            validator: None,
            callbacks: AcquisitionCallbacks::default(),
            upload_callbacks: UploadCallbacks::default(),
        }
    }

    /// Controller talking HTTP to the handler at `config.endpoint_url`.
    pub fn http<S: Into<String>>(slug: S, config: ClientConfig) -> Self {
        let endpoint = Arc::new(HttpEndpoint::from_config(&config));
        let transport = Arc::new(HttpTransport::from_config(&config));
        Self::new(slug, config, endpoint, transport)
    }

    pub fn with_native_picker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.native = Some(picker);
        self.native_works = AtomicBool::new(true);
        self
    }

    pub fn with_fallback_picker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.fallback = Some(picker);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = Some(min_size);
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ClientFile) -> Option<UploaderError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_callbacks(mut self, callbacks: AcquisitionCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_upload_callbacks(mut self, callbacks: UploadCallbacks) -> Self {
        self.upload_callbacks = callbacks;
        self
    }

    /// Start from known route metadata instead of fetching it.
    pub fn with_metadata(self, metadata: EndpointMetadata) -> Self {
        *self.metadata.write() = Some(metadata);
        self
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn state(&self) -> AcquisitionState {
        self.state.lock().clone()
    }

    pub fn metadata(&self) -> Option<EndpointMetadata> {
        self.metadata.read().clone()
    }

    /// Disabled by the caller, or the route is not known (yet).
    pub fn is_disabled(&self) -> bool {
        self.disabled || self.metadata.read().is_none()
    }

    /// Whether the dialog allows picking several files.
    pub fn multiple(&self) -> bool {
        self.metadata
            .read()
            .as_ref()
            .map(|m| m.config.accepts_multiple())
            .unwrap_or(false)
    }

    fn dispatch(&self, transition: Transition) {
        let mut state = self.state.lock();
        let current = std::mem::take(&mut *state);
        *state = reduce(current, transition);
    }

    /// Fetch the route listing and keep this route's entry.
    #[instrument(skip(self), fields(slug = %self.slug))]
    pub async fn load_metadata(&self) -> ClientResult<Option<EndpointMetadata>> {
        let routes = self.endpoint.metadata().await.map_err(|err| {
            warn!(error = %err, "failed to load endpoint metadata");
            err
        })?;

        let found = routes.into_iter().find(|r| r.slug == self.slug);
        if found.is_none() {
            warn!("route not found in endpoint metadata, uploads stay disabled");
        }
        *self.metadata.write() = found.clone();
        Ok(found)
    }

    fn rules(&self) -> Option<ValidationRules> {
        let metadata = self.metadata.read();
        let metadata = metadata.as_ref()?;
        let mut rules = ValidationRules::from_config(&metadata.config);
        rules.min_size = self.min_size;
        rules.validator = self.validator.clone();
        Some(rules)
    }

    fn picker_options(&self) -> Option<PickerOptions> {
        let metadata = self.metadata.read();
        let config = &metadata.as_ref()?.config;
        Some(PickerOptions {
            multiple: config.accepts_multiple(),
            accept: if config.has_blob() {
                Vec::new()
            } else {
                config.mime_types()
            },
        })
    }

    pub fn focus(&self) {
        self.dispatch(Transition::Focus);
    }

    pub fn blur(&self) {
        self.dispatch(Transition::Blur);
    }

    /// Open the file dialog. A no-op while disabled.
    ///
    /// The native picker is tried first. A security error switches to the
    /// fallback for this and every later call; dismissing the dialog counts
    /// as a cancel.
    pub async fn open_dialog(&self) -> ClientResult<()> {
        if self.is_disabled() {
            debug!(slug = %self.slug, "open_dialog ignored, uploads are disabled");
            return Ok(());
        }
        let Some(options) = self.picker_options() else {
            return Ok(());
        };

        if self.native_works.load(Ordering::SeqCst) {
            if let Some(native) = self.native.clone() {
                self.dispatch(Transition::OpenDialog);
                self.callbacks.opened();

                return match native.pick(&options).await {
                    Ok(files) => {
                        self.set_files(files).await;
                        self.dispatch(Transition::CloseDialog);
                        Ok(())
                    }
                    Err(PickerError::Aborted) => {
                        self.callbacks.cancelled();
                        self.dispatch(Transition::CloseDialog);
                        Ok(())
                    }
                    Err(PickerError::Security(reason)) => {
                        info!(%reason, "native file dialog unavailable, using fallback input");
                        self.native_works.store(false, Ordering::SeqCst);
                        match self.fallback.clone() {
                            Some(fallback) => self.pick_with_fallback(fallback, &options).await,
                            None => {
                                let err = ClientError::picker(NO_PICKER_MESSAGE);
                                self.callbacks.failed(&err);
                                Err(err)
                            }
                        }
                    }
                    Err(other) => {
                        let err = ClientError::picker(other.to_string());
                        self.callbacks.failed(&err);
                        Err(err)
                    }
                };
            }
        }

        if let Some(fallback) = self.fallback.clone() {
            self.dispatch(Transition::OpenDialog);
            self.callbacks.opened();
            return self.pick_with_fallback(fallback, &options).await;
        }
        Ok(())
    }

    /// The fallback input only reports selections. An empty one leaves the
    /// dialog open for [`Self::on_window_focus`] to settle.
    async fn pick_with_fallback(
        &self,
        fallback: Arc<dyn FilePicker>,
        options: &PickerOptions,
    ) -> ClientResult<()> {
        match fallback.pick(options).await {
            Ok(files) if files.is_empty() => Ok(()),
            Ok(files) => {
                self.set_files(files).await;
                self.dispatch(Transition::CloseDialog);
                Ok(())
            }
            Err(PickerError::Aborted) => {
                self.callbacks.cancelled();
                self.dispatch(Transition::CloseDialog);
                Ok(())
            }
            Err(other) => {
                let err = ClientError::picker(other.to_string());
                self.callbacks.failed(&err);
                Err(err)
            }
        }
    }

    /// Window focus returned. With the fallback input and an open dialog,
    /// no selection after [`FOCUS_CANCEL_DELAY`] means the user cancelled.
    pub async fn on_window_focus(&self) {
        if self.native_works.load(Ordering::SeqCst) || !self.state.lock().is_file_dialog_active {
            return;
        }
        let Some(fallback) = self.fallback.clone() else {
            return;
        };

        tokio::time::sleep(FOCUS_CANCEL_DELAY).await;
        if fallback.selected_count() == 0 {
            self.dispatch(Transition::CloseDialog);
            self.callbacks.cancelled();
        }
    }

    pub fn drag_enter(&self) {
        if !self.is_disabled() {
            self.dispatch(Transition::SetDragActive(true));
        }
    }

    pub fn drag_leave(&self) {
        self.dispatch(Transition::SetDragActive(false));
    }

    /// Files dropped on the drop zone go through the same validation as picked ones.
    pub async fn drop_files(&self, files: Vec<ClientFile>) {
        self.dispatch(Transition::SetDragActive(false));
        if self.is_disabled() {
            return;
        }

        self.set_files(files).await;
        if let Some(cb) = &self.callbacks.on_drop {
            let accepted = self.state.lock().accepted_files.clone();
            cb(&accepted);
        }
    }

    /// Validate a selection and, when it is clean, fetch presigned URLs for it.
    ///
    /// Problems land in the state's `errors`; nothing is sent for a
    /// selection with errors.
    #[instrument(skip(self, files), fields(slug = %self.slug, files = files.len()))]
    pub async fn set_files(&self, files: Vec<ClientFile>) {
        let Some(rules) = self.rules() else {
            return;
        };

        let mut errors = Vec::new();
        if let Some(folder) = self.config.folder.as_deref() {
            if !folder_name_is_valid(folder) {
                errors.push(InputError::FolderNameError {
                    message: FOLDER_NAME_MESSAGE.to_string(),
                });
            }
        }

        let selection = validate_files(files, &rules);
        errors.extend(selection.rejected.into_iter().map(InputError::FileRejectionError));
        let accepted_files = selection.accepted;

        if accepted_files.is_empty() || !errors.is_empty() {
            debug!(errors = errors.len(), "selection not ready to upload");
            self.dispatch(Transition::SetFiles {
                accepted_files,
                errors,
                presigned_urls: None,
                ready_to_upload: false,
            });
            return;
        }

        let infos: Vec<_> = accepted_files.iter().map(ClientFile::info).collect();
        match self.endpoint.presigned_urls(&self.slug, &infos).await {
            Ok(urls) => {
                self.dispatch(Transition::SetFiles {
                    accepted_files,
                    errors,
                    presigned_urls: Some(urls),
                    ready_to_upload: true,
                });
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch presigned URLs");
                self.dispatch(Transition::SetFiles {
                    accepted_files,
                    errors: vec![InputError::RequestError(UploaderError::new(
                        ErrorCode::PresignedUrlFetchError,
                        err.to_string(),
                    ))],
                    presigned_urls: None,
                    ready_to_upload: false,
                });
                return;
            }
        }

        if self.config.auto_upload {
            if let Err(err) = self.upload().await {
                warn!(error = %err, "auto upload failed");
            }
        }
    }

    /// Upload the accepted files to their presigned URLs.
    ///
    /// Per-file failures are reported through the callbacks and the report.
    /// A batch that cannot start at all resets the controller.
    pub async fn upload(&self) -> ClientResult<UploadReport> {
        let (files, urls, ready) = {
            let state = self.state.lock();
            (
                state.accepted_files.clone(),
                state.presigned_urls.clone(),
                state.ready_to_upload,
            )
        };

        let Some(urls) = urls else {
            warn!(slug = %self.slug, "no presigned URLs, nothing to upload");
            return Err(ClientError::NothingToUpload);
        };
        if self.is_disabled() {
            return Err(ClientError::Disabled);
        }
        if !ready {
            return Err(ClientError::NothingToUpload);
        }

        self.dispatch(Transition::SetIsUploading);
        match self.executor.upload(&files, &urls, &self.upload_callbacks).await {
            Ok(report) => {
                self.dispatch(Transition::SetDoneUploading);
                Ok(report)
            }
            Err(err) => {
                self.dispatch(Transition::Reset);
                Err(err)
            }
        }
    }

    /// Back to idle. Transfers already running are not cancelled.
    pub fn reset(&self) {
        self.dispatch(Transition::Reset);
    }
}
