//! Configuration validation.
//!
//! Checks a loaded [`HomegateConfig`] for settings that would make the relay
//! fail at runtime: missing proxy-manager credentials, malformed URLs, a
//! half-configured WeCom application, or a Telegram bot nobody may talk to.

use {secrecy::ExposeSecret, url::Url};

use crate::schema::{HomegateConfig, has_secret};

/// Length of a WeCom EncodingAESKey (base64 of 32 bytes, without padding).
const ENCODING_AES_KEY_LEN: usize = 43;

/// Longest accepted auto-revert window: one week.
pub const MAX_WINDOW_SECS: u64 = 7 * 24 * 3600;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "missing", "format", "channel"
    pub category: &'static str,
    /// Dotted path, e.g. "proxy.url"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a loaded configuration.
#[must_use]
pub fn validate(config: &HomegateConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_proxy(config, &mut result);
    check_revert(config, &mut result);
    check_wecom(config, &mut result);
    check_telegram(config, &mut result);
    check_images(config, &mut result);

    if !config.wecom.is_configured() && !config.telegram.is_configured() {
        result.push(
            Severity::Warning,
            "channel",
            "wecom,telegram",
            "no chat channel configured; the stream can only be driven from the CLI",
        );
    }
    result
}

fn check_proxy(config: &HomegateConfig, result: &mut ValidationResult) {
    let proxy = &config.proxy;
    if proxy.url.is_empty() {
        result.push(Severity::Error, "missing", "proxy.url", "proxy manager URL is required");
    } else if !is_http_url(&proxy.url) {
        result.push(
            Severity::Error,
            "format",
            "proxy.url",
            format!("'{}' is not an http(s) URL", proxy.url),
        );
    }
    if proxy.item_id.is_empty() {
        result.push(Severity::Error, "missing", "proxy.item_id", "stream id is required");
    }
    if proxy.identity.is_empty() {
        result.push(Severity::Error, "missing", "proxy.identity", "login identity is required");
    }
    if proxy.secret.expose_secret().is_empty() {
        result.push(Severity::Error, "missing", "proxy.secret", "login secret is required");
    }
    if proxy.timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "format",
            "proxy.timeout_secs",
            "a zero timeout makes every request fail immediately",
        );
    }
}

fn check_revert(config: &HomegateConfig, result: &mut ValidationResult) {
    if config.revert.window_secs == 0 {
        result.push(
            Severity::Error,
            "format",
            "revert.window_secs",
            "auto-revert window must be greater than zero",
        );
    } else if config.revert.window_secs > MAX_WINDOW_SECS {
        result.push(
            Severity::Error,
            "format",
            "revert.window_secs",
            format!(
                "auto-revert window of {}s exceeds the {MAX_WINDOW_SECS}s limit",
                config.revert.window_secs
            ),
        );
    }
}

fn check_wecom(config: &HomegateConfig, result: &mut ValidationResult) {
    let wecom = &config.wecom;
    let any_set = has_secret(&wecom.token)
        || has_secret(&wecom.encoding_aes_key)
        || !wecom.corp_id.is_empty();

    if !wecom.is_configured() {
        if any_set {
            result.push(
                Severity::Warning,
                "channel",
                "wecom",
                "token, encoding_aes_key and corp_id must all be set; WeCom webhook disabled",
            );
        } else {
            result.push(Severity::Info, "channel", "wecom", "WeCom webhook disabled");
        }
        return;
    }

    if let Some(key) = wecom.encoding_aes_key.as_ref()
        && key.expose_secret().len() != ENCODING_AES_KEY_LEN
    {
        result.push(
            Severity::Error,
            "format",
            "wecom.encoding_aes_key",
            format!("EncodingAESKey must be {ENCODING_AES_KEY_LEN} characters"),
        );
    }
    if !has_secret(&wecom.api_token) {
        result.push(
            Severity::Error,
            "missing",
            "wecom.api_token",
            "a webhook query token is required when WeCom is enabled",
        );
    }
}

fn check_telegram(config: &HomegateConfig, result: &mut ValidationResult) {
    let telegram = &config.telegram;
    if !telegram.is_configured() {
        result.push(Severity::Info, "channel", "telegram", "Telegram webhook disabled");
        return;
    }
    match telegram.chat_id.as_deref() {
        None | Some("") => result.push(
            Severity::Warning,
            "missing",
            "telegram.chat_id",
            "no authorized chat id; every sender will be rejected",
        ),
        Some(id) if id.parse::<i64>().is_err() => result.push(
            Severity::Error,
            "format",
            "telegram.chat_id",
            format!("'{id}' is not a numeric chat id"),
        ),
        Some(_) => {},
    }
}

fn check_images(config: &HomegateConfig, result: &mut ValidationResult) {
    for (path, value) in [
        ("images.open_url", &config.images.open_url),
        ("images.closed_url", &config.images.closed_url),
    ] {
        if !is_http_url(value) {
            result.push(
                Severity::Warning,
                "format",
                path,
                format!("'{value}' is not an http(s) URL; WeCom will show no picture"),
            );
        }
    }
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}
