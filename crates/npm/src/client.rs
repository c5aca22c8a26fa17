use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{StatusCode, header::CONTENT_TYPE},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, info},
};

use {homegate_common::StreamState, homegate_config::ProxyConfig};

use crate::{
    auth::{AuthToken, TokenCache, request_token},
    error::{Error, Result},
};

/// Classified answer of a state-change request.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The proxy manager accepted the change.
    Applied,
    /// Enable was requested but the stream was already enabled.
    AlreadyEnabled,
    /// Disable was requested but the stream was already disabled.
    AlreadyDisabled,
    /// Anything else. Terminal for the current request; never retried here.
    Failed(Error),
}

impl ApplyOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Anything able to switch the stream. Implemented by [`NpmClient`]; tests
/// substitute scripted fakes.
#[async_trait]
pub trait StreamControl: Send + Sync {
    async fn apply_status(&self, desired: StreamState) -> ApplyOutcome;
}

/// Client for the Nginx Proxy Manager REST API, bound to one stream.
pub struct NpmClient {
    http: reqwest::Client,
    base_url: String,
    item_id: String,
    identity: String,
    secret: Secret<String>,
    tokens: TokenCache,
}

impl NpmClient {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        if config.url.is_empty() || config.item_id.is_empty() {
            return Err(Error::config("proxy.url and proxy.item_id are required"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::external("building http client", e))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            item_id: config.item_id.clone(),
            identity: config.identity.clone(),
            secret: config.secret.clone(),
            tokens: TokenCache::default(),
        })
    }

    /// Fetch a fresh token, bypassing the cache.
    pub async fn authenticate(&self) -> Result<AuthToken> {
        request_token(&self.http, &self.base_url, &self.identity, &self.secret).await
    }

    async fn bearer(&self) -> Result<Secret<String>> {
        if let Some(token) = self.tokens.get().await {
            debug!("reusing cached proxy manager token");
            return Ok(token);
        }
        let token = self.authenticate().await?;
        self.tokens.store(&token).await;
        Ok(token.value)
    }

    async fn try_apply(&self, desired: StreamState) -> Result<ApplyOutcome> {
        let token = self.bearer().await?;
        let action = desired.action();
        let url = format!(
            "{}/api/nginx/streams/{}/{action}",
            self.base_url,
            urlencoding::encode(&self.item_id)
        );

        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| Error::external(format!("stream {action} request"), e))?;

        let status = resp.status();
        if status.is_success() {
            info!(item_id = %self.item_id, action, "stream status updated");
            return Ok(ApplyOutcome::Applied);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.clear().await;
        }

        let body = resp.text().await.unwrap_or_default();
        if let Some(outcome) = classify_rejection(desired, &body) {
            info!(item_id = %self.item_id, action, response = %body, "stream already in requested state");
            return Ok(outcome);
        }
        Err(Error::ApplyFailed {
            action,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl StreamControl for NpmClient {
    async fn apply_status(&self, desired: StreamState) -> ApplyOutcome {
        self.try_apply(desired)
            .await
            .unwrap_or_else(ApplyOutcome::Failed)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Recognise the proxy manager's idempotent rejections.
///
/// The proxy manager answers an enable of an enabled stream (and vice versa)
/// with a non-2xx status and one of two English messages. These literals are
/// an external contract we do not control; if upstream rewords them, the
/// request degrades to `Failed` instead of `Already*`.
pub(crate) fn classify_rejection(desired: StreamState, body: &str) -> Option<ApplyOutcome> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = parsed.error?.message?;
    match (desired, message.as_str()) {
        (StreamState::Disabled, "Host is already disabled") => Some(ApplyOutcome::AlreadyDisabled),
        (StreamState::Enabled, "Host is already enabled") => Some(ApplyOutcome::AlreadyEnabled),
        _ => None,
    }
}
