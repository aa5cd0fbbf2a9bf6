//! Library template created with FerrisUp

//! joy-client: the client half of the Uploadjoy SDK.
//!
//! An [`AcquisitionController`] takes files from a [`FilePicker`] or a drop,
//! validates them against the route's advertised config, asks the app's
//! upload handler for presigned URLs and hands them to the
//! [`UploadExecutor`], which sends every file and reports how each settled.
//!
//! ```rust,no_run
//! use joy_client::{AcquisitionController, ClientConfig, ClientFile};
//!
//! # async fn run() -> joy_client::ClientResult<()> {
//! let config = ClientConfig::new("http://localhost:3000/api/uploadjoy");
//! let controller = AcquisitionController::http("imageUploader", config);
//! controller.load_metadata().await?;
//!
//! controller
//!     .drop_files(vec![ClientFile::new("cat.png", "image/png", vec![0u8; 128])])
//!     .await;
//! let report = controller.upload().await?;
//! assert!(report.all_succeeded());
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod picker;
pub mod state;
pub mod transport;
pub mod types;
pub mod validation;

pub use acquisition::{AcquisitionCallbacks, AcquisitionController, FOCUS_CANCEL_DELAY};
pub use config::ClientConfig;
pub use endpoint::{HttpEndpoint, UploadEndpoint};
pub use error::{ClientError, ClientResult};
pub use executor::{UploadCallbacks, UploadExecutor, UploadOutcome, UploadReport};
pub use picker::{FilePicker, PickerError, PickerKind, PickerOptions};
pub use state::{reduce, AcquisitionState, Phase, Transition};
pub use transport::{HttpTransport, Progress, TransferReceipt, UploadTransport};
pub use types::{ClientFile, ErrorCode, FileRejection, InputError, UploaderError};
pub use validation::{validate_file, validate_files, ValidationRules};
