//! WeCom application callback: URL verification and encrypted click events.

use std::sync::Arc;

use {
    axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        middleware,
        response::{IntoResponse, Response},
        routing::get,
    },
    serde::Deserialize,
    tracing::{debug, error, info, warn},
};

use {
    homegate_channels::{Delivery, deliver, format::text_reply},
    homegate_common::ReplyTarget,
    homegate_stream::{FAILURE_TEXT, TransitionRequest},
    homegate_wecom::InboundMessage,
};

use crate::{auth_middleware::require_api_token, state::GatewayState};

/// Reply to anything other than an enable/disable menu click.
pub const UNKNOWN_EVENT_TEXT: &str = "未知消息类型或事件";

/// Signature parameters WeCom appends to every callback.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackQuery {
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
    pub echostr: Option<String>,
}

pub fn wecom_router(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/v1/message/", get(verify_url).post(callback))
        .layer(middleware::from_fn_with_state(state, require_api_token))
}

fn failed() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_TEXT).into_response()
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "wecom is not configured").into_response()
}

/// `GET`: one-time ownership check when the callback URL is saved in the
/// WeCom admin console.
async fn verify_url(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(crypto) = state.wecom.as_deref() else {
        return unavailable();
    };
    let Some(echostr) = query.echostr.as_deref() else {
        warn!("url verification without echostr");
        return FAILURE_TEXT.into_response();
    };
    match crypto.verify_url(&query.msg_signature, &query.timestamp, &query.nonce, echostr)
    {
        Ok(echo) => {
            info!("wecom callback url verified");
            echo.into_response()
        },
        Err(e) => {
            warn!(code = e.code(), error = %e, "wecom url verification failed");
            FAILURE_TEXT.into_response()
        },
    }
}

/// `POST`: decrypt, act on the click, answer with an encrypted reply.
async fn callback(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<CallbackQuery>,
    body: String,
) -> Response {
    let Some(crypto) = state.wecom.as_deref() else {
        return unavailable();
    };

    let xml = match crypto.decrypt_msg(&body, &query.msg_signature, &query.timestamp, &query.nonce)
    {
        Ok(xml) => xml,
        Err(e) => {
            error!(code = e.code(), error = %e, "wecom decrypt failed");
            return failed();
        },
    };

    let reply = reply_for(&state, &xml).await;

    match crypto.encrypt_msg(&reply, &query.nonce, &query.timestamp) {
        Ok(encrypted) => encrypted.into_response(),
        Err(e) => {
            error!(code = e.code(), error = %e, "wecom encrypt failed");
            failed()
        },
    }
}

/// Plain XML reply for one decrypted callback message.
async fn reply_for(state: &GatewayState, xml: &str) -> String {
    let message = match InboundMessage::parse(xml) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "unparseable wecom message");
            return UNKNOWN_EVENT_TEXT.to_string();
        },
    };
    let correlation = message.correlation();

    let Some(desired) = message.command() else {
        debug!(
            msg_type = %message.msg_type,
            event = ?message.event,
            event_key = ?message.event_key,
            "unhandled wecom message"
        );
        return text_reply(&correlation, UNKNOWN_EVENT_TEXT);
    };

    info!(
        user = %message.from_user_name,
        desired = %desired,
        "wecom menu click"
    );
    let request = TransitionRequest::new(desired, ReplyTarget::InlineXml(correlation.clone()));
    let transition = state.coordinator.transition(request).await;

    match deliver(&transition, &state.images, None).await {
        Ok(Delivery::Inline(reply)) => reply,
        Ok(other) => {
            warn!(delivery = ?other, "inline reply expected");
            text_reply(&correlation, FAILURE_TEXT)
        },
        Err(e) => {
            warn!(error = %e, "building wecom reply failed");
            text_reply(&correlation, FAILURE_TEXT)
        },
    }
}
