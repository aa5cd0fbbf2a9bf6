//! # Upload route builder
//!
//! Routes are declared with an immutable builder. Every step returns a new
//! builder and leaves the receiver untouched, so one partially configured
//! builder can seed many routes:
//!
//! ```rust
//! use joy_core::builder::{create_builder, MiddlewareOutput, FileRouter};
//! use joy_core::protocol::Access;
//! use joy_core::route_config::{CategoryConfig, RouteConfig};
//! use joy_core::runtime::Web;
//!
//! let f = create_builder::<Web>();
//!
//! let avatars = f(RouteConfig::new().image(CategoryConfig::new().with_max_file_size("2MB")))
//!     .access(Access::Private)
//!     .middleware(|req, _ctx| async move {
//!         let user = req.header("x-user-id").unwrap_or("anonymous").to_string();
//!         Ok(MiddlewareOutput::new()
//!             .with_metadata(serde_json::json!({ "userId": user }))
//!             .with_folder("avatars"))
//!     })
//!     .on_upload_complete(|opts| async move {
//!         tracing::info!(key = %opts.file.key, "avatar stored");
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let router = FileRouter::new().route("avatar", avatars).unwrap();
//! assert_eq!(router.len(), 1);
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::{ConfigError, ConfigResult};
use crate::protocol::{Access, CallbackPayload, FileInfo, UploadedFile};
use crate::route_config::{CategoryConfig, ExpandedRouteConfig, RouteConfig};
use crate::runtime::{ResponseHandle, RouteRequest, Runtime, Web, WithResponse};

/// Anything middleware may hand to the completion resolver.
pub trait Metadata: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Metadata for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Metadata type of a route whose middleware was never set.
///
/// Deserializes from anything so webhooks never fail on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnsetMetadata;

impl<'de> Deserialize<'de> for UnsetMetadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(UnsetMetadata)
    }
}

/// Data middleware can look at.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareContext {
    pub files: Vec<FileInfo>,
}

/// Middleware result.
#[derive(Debug, Clone)]
pub struct MiddlewareOutput<M> {
    /// Stored with the object and handed back to the resolver.
    pub metadata: Option<M>,

    /// Folder to place the objects in, e.g. `user_1/images`.
    pub folder: Option<String>,
}

impl<M> Default for MiddlewareOutput<M> {
    fn default() -> Self {
        Self {
            metadata: None,
            folder: None,
        }
    }
}

impl<M> MiddlewareOutput<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: M) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.folder = Some(folder.into());
        self
    }
}

/// Route middleware, run before presigned URLs are requested.
///
/// Closures get this through [`UploadBuilder::middleware`]; implement it
/// directly for reusable middleware structs.
#[async_trait]
pub trait Middleware<Rt: Runtime, M>: Send + Sync {
    async fn run(
        &self,
        req: RouteRequest,
        ctx: MiddlewareContext,
        res: Rt::Response,
    ) -> anyhow::Result<MiddlewareOutput<M>>;
}

struct NoopMiddleware;

#[async_trait]
impl<Rt: Runtime> Middleware<Rt, UnsetMetadata> for NoopMiddleware {
    async fn run(
        &self,
        _req: RouteRequest,
        _ctx: MiddlewareContext,
        _res: Rt::Response,
    ) -> anyhow::Result<MiddlewareOutput<UnsetMetadata>> {
        Ok(MiddlewareOutput::default())
    }
}

/// Adapts a closure to [`Middleware`] for a given runtime flavor.
pub struct FnMiddleware<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, M> Middleware<Web, M> for FnMiddleware<F>
where
    F: Fn(RouteRequest, MiddlewareContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<MiddlewareOutput<M>>> + Send + 'static,
    M: Send + 'static,
{
    async fn run(
        &self,
        req: RouteRequest,
        ctx: MiddlewareContext,
        _res: (),
    ) -> anyhow::Result<MiddlewareOutput<M>> {
        (self.f)(req, ctx).await
    }
}

#[async_trait]
impl<F, Fut, M> Middleware<WithResponse, M> for FnMiddleware<F>
where
    F: Fn(RouteRequest, MiddlewareContext, ResponseHandle) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<MiddlewareOutput<M>>> + Send + 'static,
    M: Send + 'static,
{
    async fn run(
        &self,
        req: RouteRequest,
        ctx: MiddlewareContext,
        res: ResponseHandle,
    ) -> anyhow::Result<MiddlewareOutput<M>> {
        (self.f)(req, ctx, res).await
    }
}

/// What the resolver receives when an upload completes.
#[derive(Debug, Clone)]
pub struct ResolverOptions<M> {
    pub file: UploadedFile,
    pub metadata: Option<M>,
    pub upload_request_id: String,
}

/// Upload completion resolver.
#[async_trait]
pub trait Resolver<M>: Send + Sync {
    async fn resolve(&self, opts: ResolverOptions<M>) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut, M> Resolver<M> for F
where
    F: Fn(ResolverOptions<M>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    M: Send + 'static,
{
    async fn resolve(&self, opts: ResolverOptions<M>) -> anyhow::Result<()> {
        (self)(opts).await
    }
}

/// An upload route under construction.
pub struct UploadBuilder<Rt: Runtime, M = UnsetMetadata> {
    access: Access,
    router_config: RouteConfig,
    middleware: Arc<dyn Middleware<Rt, M>>,
}

impl<Rt: Runtime, M> Clone for UploadBuilder<Rt, M> {
    fn clone(&self) -> Self {
        Self {
            access: self.access,
            router_config: self.router_config.clone(),
            middleware: Arc::clone(&self.middleware),
        }
    }
}

impl<Rt: Runtime> UploadBuilder<Rt, UnsetMetadata> {
    pub fn new(router_config: RouteConfig) -> Self {
        Self {
            access: Access::Public,
            router_config,
            middleware: Arc::new(NoopMiddleware),
        }
    }
}

impl<Rt: Runtime> Default for UploadBuilder<Rt, UnsetMetadata> {
    /// Public, one image up to 4MB, no middleware.
    fn default() -> Self {
        Self::new(RouteConfig::new().image(CategoryConfig::new().with_max_file_size("4MB")))
    }
}

impl<Rt: Runtime, M: Metadata> UploadBuilder<Rt, M> {
    pub fn access(&self, access: Access) -> Self {
        Self {
            access,
            ..self.clone()
        }
    }

    pub fn get_access(&self) -> Access {
        self.access
    }

    pub fn router_config(&self) -> &RouteConfig {
        &self.router_config
    }

    /// Install a [`Middleware`] implementation.
    pub fn middleware_with<M2, W>(&self, middleware: W) -> UploadBuilder<Rt, M2>
    where
        M2: Metadata,
        W: Middleware<Rt, M2> + 'static,
    {
        UploadBuilder {
            access: self.access,
            router_config: self.router_config.clone(),
            middleware: Arc::new(middleware),
        }
    }

    /// Freeze the route. The config is expanded here, so configuration
    /// mistakes surface while routes are being declared.
    pub fn on_upload_complete<F, Fut>(&self, resolver: F) -> ConfigResult<Uploadable<Rt, M>>
    where
        F: Fn(ResolverOptions<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_upload_complete_with(resolver)
    }

    pub fn on_upload_complete_with<R>(&self, resolver: R) -> ConfigResult<Uploadable<Rt, M>>
    where
        R: Resolver<M> + 'static,
    {
        let expanded = self.router_config.expand()?;
        Ok(Uploadable {
            def: self.clone(),
            expanded,
            resolver: Arc::new(resolver),
        })
    }
}

impl<M: Metadata> UploadBuilder<Web, M> {
    pub fn middleware<F, Fut, M2>(&self, f: F) -> UploadBuilder<Web, M2>
    where
        F: Fn(RouteRequest, MiddlewareContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<MiddlewareOutput<M2>>> + Send + 'static,
        M2: Metadata,
    {
        self.middleware_with(FnMiddleware { f })
    }
}

impl<M: Metadata> UploadBuilder<WithResponse, M> {
    pub fn middleware<F, Fut, M2>(&self, f: F) -> UploadBuilder<WithResponse, M2>
    where
        F: Fn(RouteRequest, MiddlewareContext, ResponseHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<MiddlewareOutput<M2>>> + Send + 'static,
        M2: Metadata,
    {
        self.middleware_with(FnMiddleware { f })
    }
}

/// Returns the route constructor for a runtime flavor.
pub fn create_builder<Rt: Runtime>() -> impl Fn(RouteConfig) -> UploadBuilder<Rt> {
    UploadBuilder::<Rt>::new
}

/// A frozen route: its definition plus the completion resolver.
pub struct Uploadable<Rt: Runtime, M> {
    def: UploadBuilder<Rt, M>,
    expanded: ExpandedRouteConfig,
    resolver: Arc<dyn Resolver<M>>,
}

/// Object-safe view of a route, independent of its metadata type.
#[async_trait]
pub trait RouteDefinition<Rt: Runtime>: Send + Sync {
    fn access(&self) -> Access;

    fn router_config(&self) -> &RouteConfig;

    fn expanded_config(&self) -> &ExpandedRouteConfig;

    async fn run_middleware(
        &self,
        req: RouteRequest,
        ctx: MiddlewareContext,
        res: Rt::Response,
    ) -> anyhow::Result<MiddlewareOutput<Value>>;

    async fn resolve(&self, payload: CallbackPayload) -> anyhow::Result<()>;
}

#[async_trait]
impl<Rt: Runtime, M: Metadata> RouteDefinition<Rt> for Uploadable<Rt, M> {
    fn access(&self) -> Access {
        self.def.access
    }

    fn router_config(&self) -> &RouteConfig {
        &self.def.router_config
    }

    fn expanded_config(&self) -> &ExpandedRouteConfig {
        &self.expanded
    }

    async fn run_middleware(
        &self,
        req: RouteRequest,
        ctx: MiddlewareContext,
        res: Rt::Response,
    ) -> anyhow::Result<MiddlewareOutput<Value>> {
        let out = self.def.middleware.run(req, ctx, res).await?;
        let metadata = out
            .metadata
            .map(serde_json::to_value)
            .transpose()
            .context("middleware metadata is not serializable")?;
        Ok(MiddlewareOutput {
            metadata,
            folder: out.folder,
        })
    }

    async fn resolve(&self, payload: CallbackPayload) -> anyhow::Result<()> {
        let metadata = match payload.metadata {
            Value::Null => None,
            other => Some(serde_json::from_value::<M>(other).context("invalid webhook metadata")?),
        };
        self.resolver
            .resolve(ResolverOptions {
                file: payload.file,
                metadata,
                upload_request_id: payload.upload_request_id,
            })
            .await
    }
}

/// The route table: slug → route.
pub struct FileRouter<Rt: Runtime> {
    routes: BTreeMap<String, Arc<dyn RouteDefinition<Rt>>>,
    _runtime: PhantomData<Rt>,
}

impl<Rt: Runtime> Clone for FileRouter<Rt> {
    fn clone(&self) -> Self {
        Self {
            routes: self.routes.clone(),
            _runtime: PhantomData,
        }
    }
}

impl<Rt: Runtime> Default for FileRouter<Rt> {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
            _runtime: PhantomData,
        }
    }
}

impl<Rt: Runtime> FileRouter<Rt> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Slugs are unique.
    pub fn route<S, D>(mut self, slug: S, route: D) -> ConfigResult<Self>
    where
        S: Into<String>,
        D: RouteDefinition<Rt> + 'static,
    {
        let slug = slug.into();
        if self.routes.contains_key(&slug) {
            return Err(ConfigError::duplicate_slug(slug));
        }
        self.routes.insert(slug, Arc::new(route));
        Ok(self)
    }

    pub fn get(&self, slug: &str) -> Option<Arc<dyn RouteDefinition<Rt>>> {
        self.routes.get(slug).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn RouteDefinition<Rt>>)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_config::FileCategory;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Owner {
        user_id: String,
    }

    fn uploaded() -> UploadedFile {
        UploadedFile {
            name: "cat.png".into(),
            key: "u1/cat.png".into(),
            url: "https://cdn/u1/cat.png".into(),
            access: Access::Public,
            size: 10,
        }
    }

    #[test]
    fn builder_steps_do_not_mutate_the_receiver() {
        let base = UploadBuilder::<Web>::default();
        let private = base.access(Access::Private);

        assert_eq!(base.get_access(), Access::Public);
        assert_eq!(private.get_access(), Access::Private);
        assert_eq!(base.router_config(), private.router_config());
    }

    #[test]
    fn default_route_is_a_single_small_image() {
        let route = UploadBuilder::<Web>::default()
            .on_upload_complete(|_opts| async { Ok(()) })
            .unwrap();
        let image = route.expanded_config().get(FileCategory::Image).unwrap();
        assert_eq!(image.max_file_size, "4MB");
        assert_eq!(image.max_file_count, 1);
    }

    #[test]
    fn invalid_config_fails_at_freeze_time() {
        let res = create_builder::<Web>()(RouteConfig::new()).on_upload_complete(|_| async { Ok(()) });
        assert!(matches!(res, Err(ConfigError::InvalidConfig { .. })));
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let a = UploadBuilder::<Web>::default().on_upload_complete(|_| async { Ok(()) }).unwrap();
        let b = UploadBuilder::<Web>::default().on_upload_complete(|_| async { Ok(()) }).unwrap();
        let res = FileRouter::new().route("img", a).unwrap().route("img", b);
        assert!(matches!(res, Err(ConfigError::DuplicateSlug { .. })));
    }

    #[tokio::test]
    async fn metadata_flows_from_middleware_to_resolver() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let route = UploadBuilder::<Web>::default()
            .middleware(|_req, ctx| async move {
                assert_eq!(ctx.files.len(), 1);
                Ok(MiddlewareOutput::new().with_metadata(Owner { user_id: "u1".into() }))
            })
            .on_upload_complete(move |opts: ResolverOptions<Owner>| {
                let counter = Arc::clone(&counter);
                async move {
                    assert_eq!(opts.metadata, Some(Owner { user_id: "u1".into() }));
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        let ctx = MiddlewareContext {
            files: vec![FileInfo::new("cat.png", 10, "image/png")],
        };
        let out = route.run_middleware(RouteRequest::default(), ctx, ()).await.unwrap();
        assert_eq!(out.metadata, Some(json!({"user_id": "u1"})));

        route
            .resolve(CallbackPayload {
                file: uploaded(),
                metadata: out.metadata.unwrap_or(Value::Null),
                upload_request_id: "req-1".into(),
            })
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn response_flavor_middleware_can_set_headers() {
        let route = UploadBuilder::<WithResponse>::default()
            .middleware(|_req, _ctx, res: ResponseHandle| async move {
                res.insert_header(
                    http::HeaderName::from_static("x-upload-owner"),
                    http::HeaderValue::from_static("u1"),
                );
                Ok(MiddlewareOutput::<Value>::new())
            })
            .on_upload_complete(|_| async { Ok(()) })
            .unwrap();

        let res = ResponseHandle::new();
        route
            .run_middleware(RouteRequest::default(), MiddlewareContext::default(), res.clone())
            .await
            .unwrap();
        assert_eq!(
            WithResponse::response_headers(&res).get("x-upload-owner").unwrap(),
            "u1"
        );
    }

    #[tokio::test]
    async fn unset_metadata_accepts_any_webhook_payload() {
        let route = UploadBuilder::<Web>::default()
            .on_upload_complete(|opts: ResolverOptions<UnsetMetadata>| async move {
                assert_eq!(opts.upload_request_id, "req-2");
                Ok(())
            })
            .unwrap();
        route
            .resolve(CallbackPayload {
                file: uploaded(),
                metadata: json!({"anything": [1, 2]}),
                upload_request_id: "req-2".into(),
            })
            .await
            .unwrap();
    }
}
