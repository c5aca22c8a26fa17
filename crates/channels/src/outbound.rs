use async_trait::async_trait;

use crate::Result;

/// Out-of-band sender for chats that do not read the webhook response.
#[async_trait]
pub trait PushOutbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;
}
