//! TraceLayer span maker that keeps principal identity out of request spans.

use axum::http::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

use super::auth::PRINCIPAL_ID_HEADER;

/// Query parameters whose values are redacted from logged URIs.
const SENSITIVE_PARAMS: &[&str] = &["user_id", "principal", "token"];

/// A `MakeSpan` that logs method and a sanitized URI, and records only
/// whether a principal header was present.
#[derive(Clone, Debug)]
pub struct SanitizedMakeSpan;

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %sanitize_uri(request.uri()),
            authenticated = request.headers().contains_key(PRINCIPAL_ID_HEADER),
        )
    }
}

fn sanitize_uri(uri: &axum::http::Uri) -> String {
    let query = match uri.query() {
        Some(q) => q,
        None => return uri.path().to_string(),
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_PARAMS.contains(&key.to_ascii_lowercase().as_str()) => {
                format!("{key}=[REDACTED]")
            }
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), pairs.join("&"))
}
