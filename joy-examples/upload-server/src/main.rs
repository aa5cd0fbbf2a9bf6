use anyhow::Result;
use axum::routing::get;
use axum::Router;
use joy_core::builder::{FileRouter, MiddlewareOutput, UploadBuilder};
use joy_core::config::HandlerConfig;
use joy_core::handler::RequestHandler;
use joy_core::protocol::Access;
use joy_core::route_config::{CategoryConfig, RouteConfig};
use joy_core::runtime::Web;
use joy_core::JoyError;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Owner {
    user_id: String,
}

fn file_router() -> Result<FileRouter<Web>> {
    let avatars = UploadBuilder::<Web>::new(
        RouteConfig::new().image(CategoryConfig::new().with_max_file_size("2MB")),
    )
    .access(Access::Public)
    .middleware(|req, _ctx| async move {
        let user_id = req
            .header("x-user-id")
            .ok_or_else(|| JoyError::not_authenticated("Missing x-user-id"))?
            .to_string();
        Ok::<_, anyhow::Error>(
            MiddlewareOutput::new()
                .with_folder(format!("{user_id}/avatars"))
                .with_metadata(Owner { user_id }),
        )
    })
    .on_upload_complete(|opts| async move {
        info!(
            key = %opts.file.key,
            url = %opts.file.url,
            owner = ?opts.metadata,
            "avatar uploaded"
        );
        Ok(())
    })?;

    let attachments = UploadBuilder::<Web>::new(
        RouteConfig::new()
            .application(CategoryConfig::new().with_accepted_files(["application/pdf"]).with_max_file_count(4))
            .blob(CategoryConfig::new().with_max_file_size("8MB").with_max_file_count(2)),
    )
    .access(Access::Private)
    .on_upload_complete(|opts| async move {
        info!(key = %opts.file.key, size = opts.file.size, "attachment uploaded");
        Ok(())
    })?;

    Ok(FileRouter::new()
        .route("avatar", avatars)?
        .route("attachments", attachments)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = HandlerConfig::from_env()?;
    let handler = RequestHandler::new(file_router()?, config);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    println!("[upload-server] listening on http://{addr}");

    joy_axum::axum()
        .use_router("/", Router::new().route("/health", get(|| async { "ok" })))
        .use_uploads("/api/uploadjoy", handler)
        .listen(addr)
        .await?;

    Ok(())
}
