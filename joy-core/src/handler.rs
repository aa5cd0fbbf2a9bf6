//! # Request handler
//!
//! Runtime-agnostic protocol core. Framework adapters turn an HTTP request
//! into a [`HandlerInput`] and send back the [`HandlerResponse`]:
//!
//! | request | action |
//! |---|---|
//! | `GET` | list routes |
//! | `POST` + `uploadjoy-hook: devServer` (development only) | simulate the completion webhook |
//! | `POST ?slug=s` + `uploadjoy-hook: callback` | run the route's resolver |
//! | `POST ?slug=s&actionType=upload` | middleware, verification, presigned URLs |
//!
//! Every failure inside the upload pipeline that is not an explicit status
//! becomes a 400 carrying the error message.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiError, StorageApi, UploadjoyApi};
use crate::bail_joy;
use crate::builder::{FileRouter, MiddlewareContext, RouteDefinition};
use crate::config::HandlerConfig;
use crate::dev_server::DevServer;
use crate::errors::{ErrorKind, JoyError, JoyResult};
use crate::protocol::{
    CallbackPayload, DevServerPing, EndpointMetadata, Hook, PrepareUploadFile,
    PrepareUploadRequest, UploadActionBody, HOOK_HEADER, SIGNATURE_HEADER, UPLOAD_ACTION,
};
use crate::route_config::classify;
use crate::runtime::{RouteRequest, Runtime};
use crate::signature::signature_is_valid;
use crate::validators::{folder_name_is_valid, object_key, object_key_is_valid, FOLDER_NAME_MESSAGE};
use crate::verify::verify_files;

pub const PRESIGNED_URLS_FAILED: &str =
    "Unable to get presigned urls from uploadjoy, check server logs.";
pub const INVALID_UPLOAD_BODY: &str = "Invalid request body for upload action";
pub const VERIFICATION_FAILED: &str = "File verification failed";
pub const INVALID_SIGNATURE: &str = "Invalid signature";
pub const MISSING_SLUG: &str = "No slug provided";
pub const INVALID_OBJECT_KEY: &str = "Invalid object key";
/// Message for failures that produced none of their own.
pub const DEFAULT_ERROR_MESSAGE: &str = "Unable to upload file.";

/// Everything the handler needs from one HTTP request.
#[derive(Debug, Clone)]
pub struct HandlerInput<Rt: Runtime> {
    pub request: RouteRequest,
    pub hook: Option<String>,
    pub signature: Option<String>,
    pub slug: Option<String>,
    pub action_type: Option<String>,
    pub response: Rt::Response,
    pub body: Bytes,
}

impl<Rt: Runtime> HandlerInput<Rt> {
    /// Hook and signature are read from the request headers.
    pub fn new(request: RouteRequest, body: impl Into<Bytes>) -> Self {
        let hook = request.header(HOOK_HEADER).map(str::to_string);
        let signature = request.header(SIGNATURE_HEADER).map(str::to_string);
        Self {
            request,
            hook,
            signature,
            slug: None,
            action_type: None,
            response: Rt::Response::default(),
            body: body.into(),
        }
    }

    pub fn with_slug<S: Into<String>>(mut self, slug: S) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_action_type<S: Into<String>>(mut self, action_type: S) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    pub fn with_response(mut self, response: Rt::Response) -> Self {
        self.response = response;
        self
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }
}

/// What the adapter should send back.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub message: Option<String>,
    /// Headers set by middleware through the response handle.
    pub headers: HeaderMap,
}

impl HandlerResponse {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn json(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::ok()
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: None,
            message: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn from_error(err: &JoyError) -> Self {
        Self {
            message: Some(err.message.clone()),
            ..Self::status(err.code())
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Which branch of the protocol a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ListRoutes,
    DevServer,
    Callback,
    Upload,
    Unknown,
}

impl Action {
    pub fn resolve(method: &Method, hook: Option<Hook>, action_type: Option<&str>, is_dev: bool) -> Self {
        if *method == Method::GET {
            return Action::ListRoutes;
        }
        if *method != Method::POST {
            return Action::Unknown;
        }
        match (hook, action_type) {
            (Some(Hook::DevServer), _) if is_dev => Action::DevServer,
            (Some(Hook::Callback), _) => Action::Callback,
            (_, Some(UPLOAD_ACTION)) => Action::Upload,
            _ => Action::Unknown,
        }
    }
}

/// Serves one [`FileRouter`].
pub struct RequestHandler<Rt: Runtime> {
    router: FileRouter<Rt>,
    config: HandlerConfig,
    api: Arc<dyn StorageApi>,
}

impl<Rt: Runtime> Clone for RequestHandler<Rt> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            config: self.config.clone(),
            api: Arc::clone(&self.api),
        }
    }
}

impl<Rt: Runtime> RequestHandler<Rt> {
    /// Uses the HTTP storage API configured by `config`.
    pub fn new(router: FileRouter<Rt>, config: HandlerConfig) -> Self {
        let api = Arc::new(UploadjoyApi::from_config(&config));
        Self { router, config, api }
    }

    pub fn with_api(mut self, api: Arc<dyn StorageApi>) -> Self {
        self.api = api;
        self
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn router(&self) -> &FileRouter<Rt> {
        &self.router
    }

    /// `GET`: every route with its expanded config. No side effects.
    pub fn list_routes(&self) -> Vec<EndpointMetadata> {
        self.router
            .iter()
            .map(|(slug, route)| EndpointMetadata {
                slug: slug.to_string(),
                config: route.expanded_config().clone(),
                access: route.access(),
            })
            .collect()
    }

    #[instrument(skip_all, fields(runtime = Rt::NAME, method = %input.method(), slug = ?input.slug))]
    pub async fn handle(&self, input: HandlerInput<Rt>) -> HandlerResponse {
        let response = input.response.clone();
        let mut out = match self.dispatch(input).await {
            Ok(res) => res,
            Err(err) => {
                let joy = JoyError::normalize(err, ErrorKind::BadRequest);
                match &joy.source {
                    Some(source) => error!(status = joy.code(), error = ?source, "upload request failed"),
                    None => debug!(status = joy.code(), error = %joy, "request refused"),
                }
                HandlerResponse::from_error(&joy)
            }
        };
        out.headers.extend(Rt::response_headers(&response));
        out
    }

    async fn dispatch(&self, input: HandlerInput<Rt>) -> JoyResult<HandlerResponse> {
        let hook = input.hook.as_deref().and_then(Hook::parse);
        let action = Action::resolve(
            input.method(),
            hook,
            input.action_type.as_deref(),
            self.config.is_dev,
        );

        match action {
            Action::ListRoutes => Ok(HandlerResponse::json(serde_json::to_value(self.list_routes())?)),
            Action::DevServer => self.simulate(&input.body),
            _ => {
                let Some(slug) = input.slug.as_deref() else {
                    bail_joy!(bad_request, MISSING_SLUG);
                };
                let Some(route) = self.router.get(slug) else {
                    warn!(slug, "no route for slug");
                    bail_joy!(not_found, DEFAULT_ERROR_MESSAGE);
                };

                match action {
                    Action::Callback => {
                        self.callback(route.as_ref(), input.signature.as_deref(), &input.body)
                            .await
                    }
                    Action::Upload => {
                        let slug = slug.to_owned();
                        self.upload(&slug, route.as_ref(), input).await
                    }
                    _ => bail_joy!(not_found, DEFAULT_ERROR_MESSAGE),
                }
            }
        }
    }

    fn simulate(&self, body: &[u8]) -> JoyResult<HandlerResponse> {
        let ping: DevServerPing = serde_json::from_slice(body)
            .map_err(|e| JoyError::bad_request(format!("Invalid dev server ping: {e}")).into_anyhow())?;

        info!(upload_request_id = %ping.upload_request_id, "starting dev server simulation");
        let dev = DevServer::new(Arc::clone(&self.api), self.config.secret.clone());
        tokio::spawn(dev.run(ping.upload_request_id));
        Ok(HandlerResponse::ok())
    }

    async fn callback(
        &self,
        route: &dyn RouteDefinition<Rt>,
        signature: Option<&str>,
        body: &[u8],
    ) -> JoyResult<HandlerResponse> {
        let raw = String::from_utf8_lossy(body);
        let verified = match signature {
            Some(sig) => signature_is_valid(&raw, sig, &self.config.secret),
            None => !self.config.verify_signatures,
        };
        if !verified {
            warn!(has_signature = signature.is_some(), "webhook signature rejected");
            bail_joy!(not_authenticated, INVALID_SIGNATURE);
        }

        let payload: CallbackPayload = serde_json::from_slice(body)
            .map_err(|e| JoyError::bad_request(format!("Invalid webhook body: {e}")).into_anyhow())?;
        let key = payload.file.key.clone();

        if let Err(err) = route.resolve(payload).await {
            error!(key = %key, error = ?err, "upload completion handler failed");
            return Err(JoyError::general_error("Upload completion handler failed")
                .with_source(err)
                .into_anyhow());
        }

        info!(key = %key, "upload completed");
        Ok(HandlerResponse::ok())
    }

    async fn upload(
        &self,
        slug: &str,
        route: &dyn RouteDefinition<Rt>,
        input: HandlerInput<Rt>,
    ) -> JoyResult<HandlerResponse> {
        let body: UploadActionBody = match serde_json::from_slice(&input.body) {
            Ok(body) => body,
            Err(err) => {
                error!(error = %err, "invalid request body for upload action");
                bail_joy!(bad_request, INVALID_UPLOAD_BODY);
            }
        };
        let files = body.files;

        let ctx = MiddlewareContext {
            files: files.clone(),
        };
        let out = route.run_middleware(input.request, ctx, input.response).await?;

        let folder = out.folder.as_deref().filter(|f| !f.is_empty());
        if let Some(folder) = folder {
            if !folder_name_is_valid(folder) {
                bail_joy!(bad_request, FOLDER_NAME_MESSAGE);
            }
        }

        let config = route.expanded_config();
        if let Err(reason) = verify_files(&files, config) {
            if self.config.debug {
                info!(%reason, "file verification failed");
            } else {
                debug!(%reason, "file verification failed");
            }
            bail_joy!(bad_request, VERIFICATION_FAILED);
        }

        let mut prepared = Vec::with_capacity(files.len());
        for f in &files {
            let key = object_key(folder, &f.name);
            if !object_key_is_valid(&key) {
                debug!(%key, "rejected object key");
                bail_joy!(bad_request, INVALID_OBJECT_KEY);
            }
            prepared.push(PrepareUploadFile {
                key,
                upload_type: "standard".to_string(),
                size: f.size,
                file_type: classify(&f.file_type, &f.name)
                    .map(|d| d.mime)
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            });
        }

        let request = PrepareUploadRequest {
            files: prepared,
            config: config.clone(),
            file_access: route.access(),
            metadata: out.metadata.unwrap_or(Value::Null),
            callback_url: self.config.callback_url.clone(),
            callback_slug: slug.to_string(),
        };

        match self.api.prepare_upload(&request).await {
            Ok(body) => {
                if self.config.debug {
                    info!(response = %body, "prepareUpload response");
                }
                Ok(HandlerResponse::json(body))
            }
            Err(ApiError::Status { status, body }) => {
                error!(status, %body, "unable to get presigned urls");
                bail_joy!(general_error, PRESIGNED_URLS_FAILED);
            }
            Err(err) => Err(err.into()),
        }
    }
}
