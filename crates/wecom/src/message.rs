//! Decrypted WeCom callback messages.

use serde::Deserialize;

use homegate_common::{Correlation, StreamState};

use crate::error::Result;

/// Inner XML of a callback, after decryption.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: String,
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    #[serde(rename = "Event")]
    pub event: Option<String>,
    #[serde(rename = "EventKey")]
    pub event_key: Option<String>,
    #[serde(rename = "AgentID")]
    pub agent_id: Option<String>,
}

impl InboundMessage {
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    #[must_use]
    pub fn correlation(&self) -> Correlation {
        Correlation {
            to_user_name: self.to_user_name.clone(),
            from_user_name: self.from_user_name.clone(),
            create_time: self.create_time.clone(),
        }
    }

    #[must_use]
    pub fn is_click(&self) -> bool {
        self.msg_type == "event" && self.event.as_deref() == Some("click")
    }

    /// Desired state of a menu click.
    ///
    /// Only the part of the key after the last `.` counts, so `frp.enable`
    /// and `home.enable` both map to [`StreamState::Enabled`].
    #[must_use]
    pub fn command(&self) -> Option<StreamState> {
        if !self.is_click() {
            return None;
        }
        let key = self.event_key.as_deref()?;
        match key.rsplit('.').next()? {
            "enable" => Some(StreamState::Enabled),
            "disable" => Some(StreamState::Disabled),
            _ => None,
        }
    }
}
