//! CLI subcommands that provision the chat channels.

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    tracing::info,
};

use {
    homegate_config::HomegateConfig,
    homegate_telegram::bot,
    homegate_wecom::{MenuClient, menu::DEFAULT_API_BASE},
};

#[derive(Subcommand)]
pub enum WecomAction {
    /// Install the Enable/Disable menu on the WeCom application.
    CreateMenu {
        /// API base URL (for testing against a fake).
        #[arg(long, default_value = DEFAULT_API_BASE)]
        api_base: String,
    },
}

#[derive(Subcommand)]
pub enum TelegramAction {
    /// Point the bot at this gateway's `/telegram` route and register commands.
    SetWebhook {
        /// Public URL Telegram should post updates to, e.g. `https://example.org/telegram`.
        url: String,
    },
}

pub async fn handle_wecom(action: WecomAction, config: &HomegateConfig) -> Result<()> {
    match action {
        WecomAction::CreateMenu { api_base } => {
            let menu = MenuClient::with_base_url(&api_base)
                .provision(&config.wecom)
                .await?;
            for top in &menu.button {
                for button in &top.sub_button {
                    println!("  {} / {} -> {}", top.name, button.name, button.key);
                }
            }
            info!(agent_id = ?config.wecom.agent_id, "wecom menu installed");
            Ok(())
        },
    }
}

pub async fn handle_telegram(action: TelegramAction, config: &HomegateConfig) -> Result<()> {
    match action {
        TelegramAction::SetWebhook { url } => {
            if !config.telegram.is_configured() {
                bail!("telegram.token (or TELEGRAM_TOKEN) is not set");
            }
            let bot = bot::build_bot(&config.telegram)?;
            bot::set_webhook(&bot, &config.telegram, &url).await?;
            println!("Webhook set to {url}");
            Ok(())
        },
    }
}
