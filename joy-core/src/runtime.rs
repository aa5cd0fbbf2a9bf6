//! Runtime flavors.
//!
//! A route builder is created for one runtime flavor, and the flavor decides
//! what its middleware receives:
//!
//! - [`Web`]: `(request, ctx)`
//! - [`WithResponse`]: `(request, ctx, response)`, where the response handle
//!   lets middleware put headers on the HTTP response the adapter sends.

use std::sync::{Arc, Mutex};

use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};

mod private {
    pub trait Sealed {}
}

/// The inbound HTTP request as seen by route middleware.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RouteRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl Default for RouteRequest {
    fn default() -> Self {
        Self::new(Method::POST, Uri::from_static("/"), HeaderMap::new())
    }
}

/// Headers middleware wants on the outgoing response.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    headers: Arc<Mutex<HeaderMap>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        let mut headers = self.headers.lock().unwrap_or_else(|e| e.into_inner());
        headers.insert(name, value);
    }

    pub fn headers(&self) -> HeaderMap {
        self.headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// A runtime flavor tag. Sealed: the set of flavors is closed.
pub trait Runtime: private::Sealed + Send + Sync + 'static {
    /// What middleware gets besides the request; `()` when nothing.
    type Response: Clone + Default + std::fmt::Debug + Send + Sync + 'static;

    const NAME: &'static str;

    /// Headers collected from middleware, to be merged into the response.
    fn response_headers(res: &Self::Response) -> HeaderMap;
}

/// Standard request-only flavor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Web;

/// Request/response pair flavor.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithResponse;

impl private::Sealed for Web {}
impl private::Sealed for WithResponse {}

impl Runtime for Web {
    type Response = ();

    const NAME: &'static str = "web";

    fn response_headers(_res: &()) -> HeaderMap {
        HeaderMap::new()
    }
}

impl Runtime for WithResponse {
    type Response = ResponseHandle;

    const NAME: &'static str = "with-response";

    fn response_headers(res: &ResponseHandle) -> HeaderMap {
        res.headers()
    }
}
