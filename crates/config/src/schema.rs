/// Config schema types (server, channels, proxy manager, auto-revert).
use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HomegateConfig {
    pub server: ServerConfig,
    pub wecom: WecomConfig,
    pub proxy: ProxyConfig,
    pub telegram: TelegramConfig,
    pub revert: RevertConfig,
    pub images: ImageConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0" so the chat platforms can
    /// reach the webhooks.
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// WeCom (corporate WeChat) application settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WecomConfig {
    /// Static token expected in the `?token=` query parameter of the webhook.
    pub api_token: Option<Secret<String>>,

    /// Callback token used to sign messages.
    pub token: Option<Secret<String>>,

    /// 43-character EncodingAESKey from the application's callback settings.
    pub encoding_aes_key: Option<Secret<String>>,

    /// Corp ID, also the receive id embedded in every encrypted message.
    pub corp_id: String,

    /// Application secret, only needed to provision the menu.
    pub corp_secret: Option<Secret<String>>,

    /// Application agent id, only needed to provision the menu.
    pub agent_id: Option<String>,

    /// Top-level menu label.
    pub menu_name: String,

    /// Prefix of the click keys, e.g. `frp` for `frp.enable`.
    pub menu_key_prefix: String,
}

impl WecomConfig {
    /// Whether enough is configured to decrypt callbacks.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        has_secret(&self.token) && has_secret(&self.encoding_aes_key) && !self.corp_id.is_empty()
    }
}

impl Default for WecomConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            token: None,
            encoding_aes_key: None,
            corp_id: String::new(),
            corp_secret: None,
            agent_id: None,
            menu_name: "FRP".into(),
            menu_key_prefix: "frp".into(),
        }
    }
}

impl std::fmt::Debug for WecomConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WecomConfig")
            .field("api_token", &redact(&self.api_token))
            .field("token", &redact(&self.token))
            .field("encoding_aes_key", &redact(&self.encoding_aes_key))
            .field("corp_id", &self.corp_id)
            .field("corp_secret", &redact(&self.corp_secret))
            .field("agent_id", &self.agent_id)
            .field("menu_name", &self.menu_name)
            .field("menu_key_prefix", &self.menu_key_prefix)
            .finish()
    }
}

/// Nginx Proxy Manager API settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL, e.g. `http://192.168.1.2:81`.
    pub url: String,
    /// Id of the stream to toggle.
    pub item_id: String,
    pub identity: String,
    pub secret: Secret<String>,
    /// Timeout applied to each proxy-manager request.
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            item_id: String::new(),
            identity: String::new(),
            secret: Secret::new(String::new()),
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &self.url)
            .field("item_id", &self.item_id)
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Telegram bot settings.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Option<Secret<String>>,
    /// The one chat allowed to issue commands.
    pub chat_id: Option<String>,
    /// Optional `X-Telegram-Bot-Api-Secret-Token` expected on webhook calls.
    pub webhook_secret: Option<Secret<String>>,
}

impl TelegramConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        has_secret(&self.token)
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &redact(&self.token))
            .field("chat_id", &self.chat_id)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RevertConfig {
    /// Seconds the stream stays enabled before it is switched off again.
    pub window_secs: u64,
}

impl Default for RevertConfig {
    fn default() -> Self {
        Self { window_secs: 7200 }
    }
}

/// Pictures shown on the WeCom news card.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub open_url: String,
    pub closed_url: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            open_url: "https://img.yufelix.xyz/project/open.png".into(),
            closed_url: "https://img.yufelix.xyz/project/closed.png".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when neither `RUST_LOG` nor `--log-level` is given.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

pub(crate) fn has_secret(secret: &Option<Secret<String>>) -> bool {
    secret
        .as_ref()
        .is_some_and(|s| !s.expose_secret().is_empty())
}

fn redact(secret: &Option<Secret<String>>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}
