//! Library template created with FerrisUp

//! joy-core: framework-agnostic core of the Uploadjoy SDK.
//!
//! Routes are declared with the immutable [`builder::UploadBuilder`],
//! collected into a [`builder::FileRouter`] and served by a
//! [`handler::RequestHandler`], which brokers presigned URLs with the
//! storage API. Framework adapters only translate HTTP in and out.

pub mod api;
pub mod builder;
pub mod config;
pub mod dev_server;
pub mod errors;
pub mod handler;
pub mod protocol;
pub mod route_config;
pub mod runtime;
pub mod signature;
pub mod validators;
pub mod verify;

pub use api::{ApiError, StorageApi, UploadjoyApi};
pub use builder::{
    create_builder, FileRouter, Middleware, MiddlewareContext, MiddlewareOutput, Resolver,
    ResolverOptions, RouteDefinition, UnsetMetadata, UploadBuilder, Uploadable,
};
pub use config::{HandlerConfig, JoyConfig, JoyConfigSnapshot};
pub use errors::{ConfigError, ErrorKind, JoyError, JoyResult};
pub use handler::{Action, HandlerInput, HandlerResponse, RequestHandler};
pub use protocol::{Access, PresignedDescriptor, PresignedUrlRequestResponse, PROTOCOL_VERSION};
pub use route_config::{
    expand, file_size_to_bytes, CategoryConfig, ExpandedRouteConfig, FileCategory, RouteConfig,
};
pub use runtime::{ResponseHandle, RouteRequest, Runtime, Web, WithResponse};
pub use signature::{create_signature, signature_is_valid};
pub use verify::{file_verification_failed, verify_files, VerificationError};
