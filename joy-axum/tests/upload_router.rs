use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderValue, Request};
use http_body_util::BodyExt;
use joy_axum::axum;
use joy_core::api::{ApiResult, StorageApi};
use joy_core::builder::{FileRouter, MiddlewareOutput, UploadBuilder};
use joy_core::config::HandlerConfig;
use joy_core::handler::RequestHandler;
use joy_core::protocol::{Access, PollUploadResponse, PrepareUploadRequest, PROTOCOL_VERSION};
use joy_core::route_config::{CategoryConfig, RouteConfig};
use joy_core::runtime::{ResponseHandle, Web, WithResponse};
use joy_core::signature::create_signature;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Default)]
struct RecordingApi {
    requests: Mutex<Vec<PrepareUploadRequest>>,
}

#[async_trait]
impl StorageApi for RecordingApi {
    async fn prepare_upload(&self, request: &PrepareUploadRequest) -> ApiResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(json!({"urls": [{
            "uploadType": "standard",
            "url": "https://bucket.s3.amazonaws.com",
            "fields": {"policy": "p"},
            "key": request.files[0].key,
            "uploadjoyUploadRequestId": "req-1",
            "access": request.file_access
        }]}))
    }

    async fn poll_upload(&self, _id: &str) -> ApiResult<PollUploadResponse> {
        Ok(PollUploadResponse { status: "pending".into(), file_data: None })
    }
}

fn image_router(resolved: Arc<AtomicUsize>) -> FileRouter<Web> {
    let route = UploadBuilder::<Web>::new(
        RouteConfig::new().image(CategoryConfig::new().with_max_file_size("1MB")),
    )
    .access(Access::Private)
    .on_upload_complete(move |_opts| {
        let resolved = Arc::clone(&resolved);
        async move {
            resolved.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .unwrap();
    FileRouter::new().route("imageUploader", route).unwrap()
}

fn app(api: Arc<RecordingApi>, resolved: Arc<AtomicUsize>) -> joy_axum::JoyAxumApp {
    let handler = RequestHandler::new(image_router(resolved), HandlerConfig::new("secret")).with_api(api);
    axum().use_uploads("/api/uploadjoy", handler)
}

async fn body_bytes(res: axum::response::Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn upload_request(files: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/uploadjoy?slug=imageUploader&actionType=upload")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "files": files }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn get_lists_routes_with_version_header() {
    let ax = app(Arc::default(), Arc::default());

    let res = ax
        .router
        .oneshot(Request::builder().uri("/api/uploadjoy").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers().get("x-uploadjoy-version").unwrap(), PROTOCOL_VERSION);
    assert!(res.headers().get("x-request-id").is_some());
    let body: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(
        body,
        json!([{
            "slug": "imageUploader",
            "config": {"image": {"maxFileSize": "1MB", "maxFileCount": 1, "acceptedFiles": ["image/*"]}},
            "access": "private"
        }])
    );
}

#[tokio::test]
async fn oversize_upload_is_rejected_before_storage() {
    let api = Arc::new(RecordingApi::default());
    let ax = app(Arc::clone(&api), Arc::default());

    let res = ax
        .router
        .oneshot(upload_request(json!([{"name": "big.png", "size": 5 * 1024 * 1024, "type": "image/png"}])))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(res.headers().get("x-uploadjoy-version").unwrap(), PROTOCOL_VERSION);
    assert_eq!(body_bytes(res).await, b"File verification failed");
    assert!(api.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn valid_upload_returns_presigned_descriptors() {
    let api = Arc::new(RecordingApi::default());
    let ax = app(Arc::clone(&api), Arc::default());

    let res = ax
        .router
        .oneshot(upload_request(json!([{"name": "cat.png", "size": 2048, "type": "image/png"}])))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(body["urls"][0]["uploadType"], "standard");
    assert_eq!(body["urls"][0]["access"], "private");

    let sent = api.requests.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].file_access, Access::Private);
    assert_eq!(sent[0].callback_slug, "imageUploader");
}

#[tokio::test]
async fn unknown_slug_is_404_with_default_message() {
    let ax = app(Arc::default(), Arc::default());

    let res = ax
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadjoy?slug=nope&actionType=upload")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 404);
    assert_eq!(body_bytes(res).await, b"Unable to upload file.");
}

#[tokio::test]
async fn signed_webhook_reaches_the_resolver() {
    let resolved = Arc::new(AtomicUsize::new(0));
    let ax = app(Arc::default(), Arc::clone(&resolved));

    let body = json!({
        "file": {"name": "cat.png", "key": "cat.png", "url": "https://cdn/cat.png", "access": "private", "size": 2048},
        "metadata": null,
        "uploadjoyUploadRequestId": "req-1"
    })
    .to_string();
    let signature = create_signature(&body, "secret").unwrap();

    let res = ax
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadjoy?slug=imageUploader")
                .header("uploadjoy-hook", "callback")
                .header("x-uploadjoy-wh-signature", signature)
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(resolved.load(Ordering::SeqCst), 1);

    let res = ax
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/uploadjoy?slug=imageUploader")
                .header("uploadjoy-hook", "callback")
                .header("x-uploadjoy-wh-signature", "bm9wZQ==")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);
    assert_eq!(body_bytes(res).await, b"Invalid signature");
    assert_eq!(resolved.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let ax = app(Arc::default(), Arc::default());

    let provided = HeaderValue::from_static("req-test-123");
    let res = ax
        .router
        .oneshot(
            Request::builder()
                .uri("/api/uploadjoy")
                .header("x-request-id", provided.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test]
async fn response_flavor_middleware_sets_headers() {
    let route = UploadBuilder::<WithResponse>::default()
        .middleware(|req, _ctx, res: ResponseHandle| async move {
            let user = req.header("x-user-id").unwrap_or("anonymous").to_string();
            res.insert_header(
                axum::http::HeaderName::from_static("x-upload-owner"),
                HeaderValue::from_str(&user)?,
            );
            Ok::<_, anyhow::Error>(MiddlewareOutput::new().with_metadata(json!({ "userId": user })))
        })
        .on_upload_complete(|_| async { Ok(()) })
        .unwrap();
    let router = FileRouter::new().route("imageUploader", route).unwrap();
    let api = Arc::new(RecordingApi::default());
    let handler = RequestHandler::new(router, HandlerConfig::new("secret")).with_api(api.clone());
    let ax = axum().use_uploads("/api/uploadjoy", handler);

    let mut req = upload_request(json!([{"name": "cat.png", "size": 10, "type": "image/png"}]));
    req.headers_mut().insert("x-user-id", HeaderValue::from_static("u1"));
    let res = ax.router.oneshot(req).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers().get("x-upload-owner").unwrap(), "u1");
    assert_eq!(api.requests.lock().unwrap()[0].metadata, json!({"userId": "u1"}));
}
