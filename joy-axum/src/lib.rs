//! Library template created with FerrisUp

//! joy-axum: Axum adapter for the Uploadjoy SDK.
//!
//! Mounts a [`joy_core::RequestHandler`] as `GET`/`POST` on a path and
//! marshals HTTP in and out of the handler's runtime-agnostic contract.

pub mod app;
pub mod params;
pub mod state;
pub mod upload;
mod error;
pub use error::{JoyAxumError, DEFAULT_ERROR_MESSAGE};
pub use state::JoyAxumState;
pub use upload::{into_http, upload_router};

pub use app::{axum, JoyAxumApp};
