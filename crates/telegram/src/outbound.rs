use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{RequestError, prelude::*, types::ChatId},
    tracing::{debug, warn},
};

use homegate_channels::{Error as ChannelError, PushOutbound};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Plain-text sender for the Telegram bot.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        to: &str,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = to,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = to,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl PushOutbound for TelegramOutbound {
    async fn send_text(&self, to: &str, text: &str) -> homegate_channels::Result<()> {
        let chat_id = parse_chat_id(to)?;
        self.run_with_retry(to, "send message", || {
            let req = self.bot.send_message(chat_id, text);
            async move { req.await }
        })
        .await
        .map_err(|e| ChannelError::external("telegram send message", e))?;
        debug!(chat_id = to, "telegram message sent");
        Ok(())
    }
}

fn parse_chat_id(to: &str) -> homegate_channels::Result<ChatId> {
    to.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| ChannelError::external(format!("invalid telegram chat id '{to}'"), e))
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
