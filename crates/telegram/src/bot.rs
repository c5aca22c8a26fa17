use std::time::Duration;

use {
    secrecy::ExposeSecret,
    teloxide::{payloads::SetWebhookSetters, prelude::*, types::BotCommand},
    tracing::{info, warn},
};

use homegate_config::TelegramConfig;

use crate::{
    command::Command,
    error::{Error, Result},
};

/// Outbound requests give up after this long.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a bot client from config. Fails when no token is configured.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let token = config
        .token
        .as_ref()
        .filter(|t| !t.expose_secret().is_empty())
        .ok_or_else(|| Error::message("telegram.token is not configured"))?;
    let client = teloxide::net::default_reqwest_settings()
        .timeout(CLIENT_TIMEOUT)
        .build()?;
    Ok(Bot::with_client(token.expose_secret(), client))
}

fn bot_commands() -> Vec<BotCommand> {
    Command::ALL
        .iter()
        .map(|(name, description)| BotCommand::new(*name, *description))
        .collect()
}

/// Register the command list for autocomplete in Telegram clients.
pub async fn register_commands(bot: &Bot) -> Result<()> {
    bot.set_my_commands(bot_commands()).await?;
    Ok(())
}

/// Point the bot at `url` and register commands.
///
/// When a webhook secret is configured Telegram echoes it in the
/// `X-Telegram-Bot-Api-Secret-Token` header of every call.
pub async fn set_webhook(bot: &Bot, config: &TelegramConfig, url: &str) -> Result<()> {
    let url = reqwest::Url::parse(url)
        .map_err(|e| Error::message(format!("invalid webhook url '{url}': {e}")))?;
    if url.scheme() != "https" {
        warn!(%url, "telegram only delivers webhooks to https urls");
    }

    let me = bot.get_me().await?;
    let mut request = bot.set_webhook(url.clone());
    if let Some(secret) = config
        .webhook_secret
        .as_ref()
        .filter(|s| !s.expose_secret().is_empty())
    {
        request = request.secret_token(secret.expose_secret().clone());
    }
    request.await?;

    if let Err(e) = register_commands(bot).await {
        warn!(error = %e, "failed to register bot commands");
    }

    info!(username = ?me.username, %url, "telegram webhook registered");
    Ok(())
}
