use std::{sync::Arc, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{info, warn},
};

use {
    homegate_channels::PushOutbound,
    homegate_config::{HomegateConfig, ImageConfig},
    homegate_npm::{NpmClient, StreamControl},
    homegate_stream::StreamCoordinator,
    homegate_telegram::{TelegramChannel, TelegramOutbound, bot},
    homegate_wecom::{MessageCrypto, WxCrypt},
};

/// Telegram webhook wiring. Present only when a bot token is set.
pub struct TelegramEndpoint {
    pub channel: Arc<TelegramChannel>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header, if any.
    pub webhook_secret: Option<Secret<String>>,
}

/// Everything the HTTP handlers share.
pub struct GatewayState {
    pub version: String,
    pub coordinator: Arc<StreamCoordinator>,
    pub images: ImageConfig,
    /// Expected `?token=` value on the WeCom callback. `None` rejects every call.
    pub api_token: Option<Secret<String>>,
    /// Callback crypto, present only when the WeCom credentials are set.
    pub wecom: Option<Arc<dyn MessageCrypto>>,
    pub telegram: Option<TelegramEndpoint>,
}

impl GatewayState {
    /// State with no chat channel attached.
    pub fn new(coordinator: Arc<StreamCoordinator>, images: ImageConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            coordinator,
            images,
            api_token: None,
            wecom: None,
            telegram: None,
        }
    }

    #[must_use]
    pub fn with_api_token(mut self, token: Option<Secret<String>>) -> Self {
        self.api_token = token;
        self
    }

    #[must_use]
    pub fn with_wecom(mut self, crypto: Arc<dyn MessageCrypto>) -> Self {
        self.wecom = Some(crypto);
        self
    }

    #[must_use]
    pub fn with_telegram(
        mut self,
        channel: Arc<TelegramChannel>,
        webhook_secret: Option<Secret<String>>,
    ) -> Self {
        self.telegram = Some(TelegramEndpoint {
            channel,
            webhook_secret,
        });
        self
    }

    /// Wire the proxy client, coordinator and whichever channels `config`
    /// enables.
    pub fn from_config(config: &HomegateConfig) -> anyhow::Result<Arc<Self>> {
        let control: Arc<dyn StreamControl> = Arc::new(NpmClient::new(&config.proxy)?);
        let coordinator = StreamCoordinator::new(
            control,
            Duration::from_secs(config.revert.window_secs),
        );
        let mut state = Self::new(Arc::clone(&coordinator), config.images.clone())
            .with_api_token(non_empty(&config.wecom.api_token));
        if state.api_token.is_none() {
            warn!("wecom.api_token is not set, every callback will be rejected");
        }

        if config.wecom.is_configured() {
            let crypto = WxCrypt::from_config(&config.wecom)?;
            state = state.with_wecom(Arc::new(crypto));
            info!(corp_id = %config.wecom.corp_id, "wecom callback enabled");
        } else {
            warn!("wecom is not configured, /api/v1/message/ will answer 503");
        }

        if config.telegram.is_configured() {
            let outbound: Arc<dyn PushOutbound> =
                Arc::new(TelegramOutbound::new(bot::build_bot(&config.telegram)?));
            let channel = TelegramChannel::new(
                coordinator,
                outbound,
                config.telegram.chat_id.clone(),
                config.images.clone(),
            );
            state = state.with_telegram(
                Arc::new(channel),
                non_empty(&config.telegram.webhook_secret),
            );
            info!(chat_id = ?config.telegram.chat_id, "telegram webhook enabled");
        } else {
            warn!("telegram is not configured, /telegram updates are dropped");
        }

        Ok(Arc::new(state))
    }
}

fn non_empty(secret: &Option<Secret<String>>) -> Option<Secret<String>> {
    secret
        .as_ref()
        .filter(|s| !s.expose_secret().is_empty())
        .cloned()
}
