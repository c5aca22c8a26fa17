use std::sync::Arc;

use {
    axum::{
        body::Body,
        extract::{Query, State},
        http::{Request, StatusCode},
        middleware::Next,
        response::{IntoResponse, Json, Response},
    },
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::warn,
};

use crate::state::GatewayState;

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Guard for the WeCom callback: the `?token=` query parameter must equal
/// `wecom.api_token`.
///
/// Runs before the callback is looked at, so a wrong token gets a 401 even
/// when the WeCom crypto is not configured.
pub async fn require_api_token(
    State(state): State<Arc<GatewayState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = Query::<TokenQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(q)| q.token);
    let expected = state.api_token.as_ref().map(|t| t.expose_secret().as_str());

    match (presented.as_deref(), expected) {
        (Some(presented), Some(expected)) if tokens_match(presented, expected) => {
            next.run(request).await
        },
        _ => {
            warn!(path = %request.uri().path(), "rejected callback with invalid token");
            invalid_token()
        },
    }
}

fn invalid_token() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Invalid token" })),
    )
        .into_response()
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}
