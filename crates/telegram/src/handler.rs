use std::sync::Arc;

use {
    teloxide::types::{Update, UpdateKind},
    tracing::{debug, info, warn},
};

use {
    homegate_channels::{PushOutbound, ReplyTarget, deliver, is_authorized},
    homegate_config::ImageConfig,
    homegate_stream::{StreamCoordinator, Transition, TransitionRequest},
};

use crate::{
    command::{self, Parsed},
    error::Result,
};

pub const WELCOME_TEXT: &str = "欢迎使用！请输入命令。";
pub const UNAUTHORIZED_TEXT: &str = "Unauthorized access.";

/// What an update led to.
#[derive(Debug)]
pub enum Handled {
    /// Not a text message, an unknown command, or plain text from the owner.
    Ignored,
    Welcomed,
    /// Sender is not the configured chat; told so, nothing else happened.
    Rejected,
    Transitioned(Transition),
}

/// Turns webhook updates into stream transitions for the one allowed chat.
pub struct TelegramChannel {
    coordinator: Arc<StreamCoordinator>,
    outbound: Arc<dyn PushOutbound>,
    allowed_chat_id: Option<String>,
    images: ImageConfig,
}

impl TelegramChannel {
    pub fn new(
        coordinator: Arc<StreamCoordinator>,
        outbound: Arc<dyn PushOutbound>,
        allowed_chat_id: Option<String>,
        images: ImageConfig,
    ) -> Self {
        Self {
            coordinator,
            outbound,
            allowed_chat_id,
            images,
        }
    }

    pub async fn handle_update(&self, update: &Update) -> Result<Handled> {
        let Some((chat_id, text)) = text_message(update) else {
            debug!(update_id = update.id.0, "ignoring non-text update");
            return Ok(Handled::Ignored);
        };
        let parsed = command::parse(text);
        if parsed == Parsed::Unknown {
            debug!(chat_id, "ignoring unknown command");
            return Ok(Handled::Ignored);
        }

        let chat = chat_id.to_string();
        if !is_authorized(&chat, self.allowed_chat_id.as_deref()) {
            warn!(chat_id, "unauthorized telegram chat");
            self.outbound.send_text(&chat, UNAUTHORIZED_TEXT).await?;
            return Ok(Handled::Rejected);
        }

        let Parsed::Command(cmd) = parsed else {
            return Ok(Handled::Ignored);
        };
        match cmd.desired_state() {
            None => {
                self.outbound.send_text(&chat, WELCOME_TEXT).await?;
                Ok(Handled::Welcomed)
            },
            Some(desired) => {
                info!(chat_id, command = ?cmd, "telegram command");
                let request = TransitionRequest::new(desired, ReplyTarget::DirectPush(chat));
                let transition = self.coordinator.transition(request).await;
                deliver(&transition, &self.images, Some(self.outbound.as_ref())).await?;
                Ok(Handled::Transitioned(transition))
            },
        }
    }
}

/// Chat id and text of a new text message, if `update` carries one.
fn text_message(update: &Update) -> Option<(i64, &str)> {
    let UpdateKind::Message(msg) = &update.kind else {
        return None;
    };
    Some((msg.chat.id.0, msg.text()?))
}
