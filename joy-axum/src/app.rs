use axum::Router;
use joy_core::handler::RequestHandler;
use joy_core::runtime::Runtime;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::info;

use crate::upload::upload_router;
use crate::JoyAxumState;

/// An axum app with one or more upload endpoints mounted.
#[derive(Clone, Default)]
pub struct JoyAxumApp {
    pub router: Router<()>,
}

impl JoyAxumApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = match path.trim_end_matches('/') {
            "" => self.router.merge(router),
            path => self.router.nest(path, router),
        };
        self
    }

    /// Mount a file router's handler at `path`, e.g. `/api/uploadjoy`.
    pub fn use_uploads<Rt: Runtime>(self, path: &str, handler: RequestHandler<Rt>) -> Self {
        info!(path, routes = handler.router().len(), runtime = Rt::NAME, "mounting upload endpoint");
        let router = upload_router(JoyAxumState::new(handler));
        self.use_router(path, router)
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

pub fn axum() -> JoyAxumApp {
    JoyAxumApp::new()
}
