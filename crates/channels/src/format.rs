//! Notification formatter.

use tracing::debug;

use {
    homegate_common::{Correlation, ReplyTarget, StreamState},
    homegate_config::ImageConfig,
    homegate_stream::{FAILURE_TEXT, Transition},
};

use crate::{Error, Result, outbound::PushOutbound};

/// What became of a transition's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Plain XML to be encrypted into the webhook response.
    Inline(String),
    /// Sent through the push client.
    Pushed,
    /// Nobody to tell (timer-originated).
    Dropped,
}

/// Route the outcome of `transition` to its reply target.
pub async fn deliver(
    transition: &Transition,
    images: &ImageConfig,
    push: Option<&dyn PushOutbound>,
) -> Result<Delivery> {
    match &transition.reply_target {
        Some(ReplyTarget::InlineXml(correlation)) => {
            Ok(Delivery::Inline(inline_reply(transition, correlation, images)))
        },
        Some(ReplyTarget::DirectPush(chat_id)) => {
            let push = push.ok_or_else(|| Error::unavailable("no push client configured"))?;
            push.send_text(chat_id, &transition.message()).await?;
            debug!(chat_id, "transition outcome pushed");
            Ok(Delivery::Pushed)
        },
        None => Ok(Delivery::Dropped),
    }
}

/// XML reply for a WeCom click: a one-article news card on success, a text
/// message carrying [`FAILURE_TEXT`] otherwise.
#[must_use]
pub fn inline_reply(
    transition: &Transition,
    correlation: &Correlation,
    images: &ImageConfig,
) -> String {
    match transition.state() {
        Some(state) => news_reply(correlation, &transition.message(), picture(state, images)),
        None => text_reply(correlation, FAILURE_TEXT),
    }
}

fn picture(state: StreamState, images: &ImageConfig) -> &str {
    match state {
        StreamState::Enabled => &images.open_url,
        StreamState::Disabled => &images.closed_url,
    }
}

/// Reply header. The reply goes back the way the message came, so the
/// inbound sender becomes the recipient.
fn envelope(correlation: &Correlation, msg_type: &str, body: &str) -> String {
    format!(
        "<xml><ToUserName>{}</ToUserName><FromUserName>{}</FromUserName>\
         <CreateTime>{}</CreateTime><MsgType>{}</MsgType>{body}</xml>",
        cdata(&correlation.from_user_name),
        cdata(&correlation.to_user_name),
        correlation.create_time,
        cdata(msg_type),
    )
}

#[must_use]
pub fn news_reply(correlation: &Correlation, title: &str, pic_url: &str) -> String {
    let body = format!(
        "<ArticleCount>1</ArticleCount><Articles><item><Title>{}</Title>\
         <PicUrl>{}</PicUrl></item></Articles>",
        cdata(title),
        cdata(pic_url),
    );
    envelope(correlation, "news", &body)
}

#[must_use]
pub fn text_reply(correlation: &Correlation, content: &str) -> String {
    envelope(correlation, "text", &format!("<Content>{}</Content>", cdata(content)))
}

/// Wrap `text` in a CDATA section, splitting any `]]>` it contains.
#[must_use]
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}
