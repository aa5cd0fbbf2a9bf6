/// Default mount path of the upload handler.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/uploadjoy";

/// Default size of the body chunks progress is reported on.
pub const DEFAULT_PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where the upload handler is mounted, e.g. `http://localhost:3000/api/uploadjoy`
    pub endpoint_url: String,

    /// Ping the handler's dev server after each transfer is started
    pub dev_mode: bool,

    /// Bytes sent between two progress reports
    pub progress_chunk_size: usize,

    /// Start uploading as soon as presigned URLs arrive
    pub auto_upload: bool,

    /// Folder to upload into, validated before any request
    pub folder: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            dev_mode: false,
            progress_chunk_size: DEFAULT_PROGRESS_CHUNK_SIZE,
            auto_upload: false,
            folder: None,
        }
    }
}

impl ClientConfig {
    pub fn new<S: Into<String>>(endpoint_url: S) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint_url<S: Into<String>>(mut self, url: S) -> Self {
        self.endpoint_url = url.into();
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_progress_chunk_size(mut self, size: usize) -> Self {
        self.progress_chunk_size = size.max(1);
        self
    }

    pub fn with_auto_upload(mut self, auto_upload: bool) -> Self {
        self.auto_upload = auto_upload;
        self
    }

    pub fn with_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.folder = Some(folder.into());
        self
    }
}
