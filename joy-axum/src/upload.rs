use std::collections::HashMap;

use axum::{
    extract::{rejection::BytesRejection, OriginalUri, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use bytes::Bytes;
use joy_core::errors::JoyError;
use joy_core::handler::HandlerResponse;
use joy_core::protocol::{PROTOCOL_VERSION, VERSION_HEADER};
use joy_core::runtime::Runtime;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::{error::DEFAULT_ERROR_MESSAGE, params::UploadParams, JoyAxumError, JoyAxumState};

fn map_body_rejection(rejection: BytesRejection) -> JoyAxumError {
    JoyError::bad_request(format!("Failed to read the request body: {rejection}")).into()
}

/// 200 carries the JSON body (empty when there is none); anything else a
/// plain-text message.
pub fn into_http(res: HandlerResponse) -> Response {
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = if status == StatusCode::OK {
        match res.body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    } else {
        let message = res
            .message
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
        (status, message).into_response()
    };

    response.headers_mut().extend(res.headers);
    response
}

/// `GET /` lists the routes, `POST /` runs the upload protocol.
///
/// Every response carries `x-uploadjoy-version` and an `x-request-id`.
pub fn upload_router<Rt: Runtime>(state: JoyAxumState<Rt>) -> Router<()> {
    Router::new()
        .route(
            "/",
            routing::get(|State(state): State<JoyAxumState<Rt>>| async move {
                let routes = state.handler.list_routes();
                Ok::<_, JoyAxumError>(Json(routes))
            })
            .post(
                |State(state): State<JoyAxumState<Rt>>,
                 method: Method,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>,
                 OriginalUri(uri): OriginalUri,
                 body: Result<Bytes, BytesRejection>| async move {
                    let body = body.map_err(map_body_rejection)?;

                    let params = UploadParams::from_parts(&headers, &query, &uri);
                    let input = params.into_input::<Rt>(method, uri, headers, body);

                    let res = state.handler.handle(input).await;
                    Ok::<_, JoyAxumError>(into_http(res))
                },
            ),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static(VERSION_HEADER),
                    HeaderValue::from_static(PROTOCOL_VERSION),
                )),
        )
        .with_state(state)
}
