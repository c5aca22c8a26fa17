use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::get,
    },
    tower_http::trace::TraceLayer,
    tracing::{debug, error, info, warn},
};

use homegate_config::{HomegateConfig, Severity};

use crate::{state::GatewayState, telegram_routes::telegram_router, wecom_routes::wecom_router};

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(wecom_router(Arc::clone(&state)))
        .merge(telegram_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire everything from `config` and serve until the process is stopped.
pub async fn start_gateway(config: &HomegateConfig) -> anyhow::Result<()> {
    check_config(config)?;
    let state = GatewayState::from_config(config)?;
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    info!(
        %addr,
        version = %state.version,
        wecom = state.wecom.is_some(),
        telegram = state.telegram.is_some(),
        window_secs = config.revert.window_secs,
        "homegate gateway listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Log every diagnostic and refuse to start when any of them is an error.
fn check_config(config: &HomegateConfig) -> anyhow::Result<()> {
    let result = homegate_config::validate(config);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => debug!(path = %d.path, "{}", d.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "configuration has {} error(s); run `homegate config check` for details",
            result.count(Severity::Error)
        );
    }
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let status = state.coordinator.status();
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "stream": {
            "state": status.state,
            "revert_in_secs": status.revert_in.map(|d| d.as_secs()),
            "window_secs": status.window.as_secs(),
        },
        "channels": {
            "wecom": state.wecom.is_some(),
            "telegram": state.telegram.is_some(),
        },
    }))
}
