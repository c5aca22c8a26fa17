use std::sync::Arc;

use {
    axum::{
        Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
    },
    secrecy::ExposeSecret,
    tracing::{debug, error, warn},
};

use homegate_telegram::Update;

use crate::state::GatewayState;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

pub fn telegram_router() -> Router<Arc<GatewayState>> {
    Router::new().route("/telegram", post(webhook))
}

/// Telegram retries any non-2xx answer, so every update that passes the
/// secret check is acknowledged with `ok`, whatever became of it.
async fn webhook(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let Some(telegram) = state.telegram.as_ref() else {
        debug!("telegram update dropped, channel not configured");
        return "ok".into_response();
    };

    if let Some(expected) = telegram.webhook_secret.as_ref() {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.expose_secret().as_str()) {
            warn!("telegram webhook secret mismatch");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let update: Update = match serde_json::from_str(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "malformed telegram update");
            return "ok".into_response();
        },
    };

    match telegram.channel.handle_update(&update).await {
        Ok(handled) => debug!(update_id = update.id.0, ?handled, "telegram update handled"),
        Err(e) => error!(update_id = update.id.0, error = %e, "telegram update failed"),
    }
    "ok".into_response()
}
