use std::collections::HashMap;

use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use joy_core::handler::HandlerInput;
use joy_core::protocol::{HOOK_HEADER, SIGNATURE_HEADER};
use joy_core::runtime::{RouteRequest, Runtime};

/// The parts of an upload request the handler dispatches on.
#[derive(Debug, Clone, Default)]
pub struct UploadParams {
    pub slug: Option<String>,
    pub action_type: Option<String>,
    pub hook: Option<String>,
    pub signature: Option<String>,
    pub path: String,
}

impl UploadParams {
    pub fn from_parts(headers: &HeaderMap, query: &HashMap<String, String>, uri: &Uri) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            slug: query.get("slug").filter(|s| !s.is_empty()).cloned(),
            action_type: query.get("actionType").cloned(),
            hook: header(HOOK_HEADER),
            signature: header(SIGNATURE_HEADER),
            path: uri.path().to_string(),
        }
    }

    /// Assemble the handler input; the response handle starts empty.
    pub fn into_input<Rt: Runtime>(
        self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> HandlerInput<Rt> {
        let request = RouteRequest::new(method, uri, headers);
        let mut input = HandlerInput::new(request, body);
        input.slug = self.slug;
        input.action_type = self.action_type;
        input.hook = self.hook;
        input.signature = self.signature;
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use joy_core::runtime::Web;

    #[test]
    fn reads_query_and_hook_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOOK_HEADER, HeaderValue::from_static("callback"));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("c2ln"));
        let query = HashMap::from([
            ("slug".to_string(), "avatar".to_string()),
            ("actionType".to_string(), "upload".to_string()),
        ]);
        let uri: Uri = "/api/uploadjoy?slug=avatar&actionType=upload".parse().unwrap();

        let params = UploadParams::from_parts(&headers, &query, &uri);
        assert_eq!(params.slug.as_deref(), Some("avatar"));
        assert_eq!(params.hook.as_deref(), Some("callback"));
        assert_eq!(params.path, "/api/uploadjoy");

        let input = params.into_input::<Web>(Method::POST, uri, headers, Bytes::from_static(b"{}"));
        assert_eq!(input.signature.as_deref(), Some("c2ln"));
        assert_eq!(input.action_type.as_deref(), Some("upload"));
    }

    #[test]
    fn empty_slug_counts_as_missing() {
        let query = HashMap::from([("slug".to_string(), String::new())]);
        let params = UploadParams::from_parts(&HeaderMap::new(), &query, &Uri::from_static("/"));
        assert!(params.slug.is_none());
    }
}
