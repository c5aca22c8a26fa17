use std::time::{Duration, Instant};

use {
    chrono::{DateTime, Utc},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tokio::sync::Mutex,
    tracing::debug,
};

use crate::error::{Error, Result};

/// Tokens are refreshed this long before the proxy manager says they expire.
const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Bearer token issued by `POST /api/tokens`.
#[derive(Clone)]
pub struct AuthToken {
    pub value: Secret<String>,
    pub obtained_at: Instant,
    /// `None` when the response carried no usable `expires` field; such
    /// tokens are used once and never cached.
    pub expires_at: Option<Instant>,
}

impl AuthToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at > Instant::now() + REFRESH_SKEW)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"[REDACTED]")
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    identity: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    expires: Option<String>,
}

/// Exchange identity/secret for a bearer token. No retry.
pub async fn request_token(
    http: &reqwest::Client,
    base_url: &str,
    identity: &str,
    secret: &Secret<String>,
) -> Result<AuthToken> {
    let url = format!("{base_url}/api/tokens");
    let resp = http
        .post(url)
        .json(&TokenRequest {
            identity,
            secret: secret.expose_secret(),
        })
        .send()
        .await
        .map_err(Error::auth_failed)?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::auth_failed(format!("status {status}: {body}")));
    }

    let body: TokenResponse = resp.json().await.map_err(Error::auth_failed)?;
    let token = body
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::auth_failed("response carried no token"))?;

    let obtained_at = Instant::now();
    let expires_at = body.expires.as_deref().and_then(|raw| expiry_instant(raw, obtained_at));
    debug!(cached = expires_at.is_some(), "obtained proxy manager token");

    Ok(AuthToken {
        value: Secret::new(token),
        obtained_at,
        expires_at,
    })
}

/// Map the RFC 3339 `expires` timestamp onto the monotonic clock.
fn expiry_instant(raw: &str, now: Instant) -> Option<Instant> {
    let expires = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    let ttl = (expires - Utc::now()).to_std().ok()?;
    Some(now + ttl)
}

/// Single-entry token cache.
#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<AuthToken>>,
}

impl TokenCache {
    pub async fn get(&self) -> Option<Secret<String>> {
        let guard = self.slot.lock().await;
        guard
            .as_ref()
            .filter(|t| t.is_fresh())
            .map(|t| t.value.clone())
    }

    pub async fn store(&self, token: &AuthToken) {
        if token.expires_at.is_some() {
            *self.slot.lock().await = Some(token.clone());
        }
    }

    pub async fn clear(&self) {
        self.slot.lock().await.take();
    }
}
