//! Integration tests for the webhook routes, driven over a real listener.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {async_trait::async_trait, secrecy::Secret, tokio::net::TcpListener};

use {
    homegate_channels::PushOutbound,
    homegate_common::StreamState,
    homegate_config::ImageConfig,
    homegate_gateway::{server::build_gateway_app, state::GatewayState},
    homegate_npm::{ApplyOutcome, StreamControl},
    homegate_stream::StreamCoordinator,
    homegate_telegram::TelegramChannel,
    homegate_wecom::{MessageCrypto, WxCrypt},
};

const API_TOKEN: &str = "callback-token";
const CORP_ID: &str = "wwcorp0001";
const SIGN_TOKEN: &str = "QDG6eK";
const AES_KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";
const OWNER_CHAT: &str = "42";

#[derive(Default)]
struct CountingControl {
    calls: Mutex<Vec<StreamState>>,
}

#[async_trait]
impl StreamControl for CountingControl {
    async fn apply_status(&self, desired: StreamState) -> ApplyOutcome {
        self.calls.lock().unwrap().push(desired);
        ApplyOutcome::Applied
    }
}

#[derive(Default)]
struct RecordingPush {
    sent: Mutex<Vec<(String, String)>>,
    count: AtomicUsize,
}

#[async_trait]
impl PushOutbound for RecordingPush {
    async fn send_text(&self, to: &str, text: &str) -> homegate_channels::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push((to.into(), text.into()));
        Ok(())
    }
}

struct TestServer {
    addr: SocketAddr,
    control: Arc<CountingControl>,
    push: Arc<RecordingPush>,
    crypto: WxCrypt,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn proxy_calls(&self) -> Vec<StreamState> {
        self.control.calls.lock().unwrap().clone()
    }
}

fn crypto() -> WxCrypt {
    WxCrypt::new(SIGN_TOKEN, AES_KEY, CORP_ID).unwrap()
}

/// Start a server with both channels wired to fakes.
async fn start_server(telegram_secret: Option<&str>) -> TestServer {
    let control = Arc::new(CountingControl::default());
    let push = Arc::new(RecordingPush::default());
    let coordinator = StreamCoordinator::new(
        Arc::clone(&control) as Arc<dyn StreamControl>,
        Duration::from_secs(7200),
    );
    let channel = TelegramChannel::new(
        Arc::clone(&coordinator),
        Arc::clone(&push) as Arc<dyn PushOutbound>,
        Some(OWNER_CHAT.into()),
        ImageConfig::default(),
    );
    let state = GatewayState::new(coordinator, ImageConfig::default())
        .with_api_token(Some(Secret::new(API_TOKEN.into())))
        .with_wecom(Arc::new(crypto()))
        .with_telegram(
            Arc::new(channel),
            telegram_secret.map(|s| Secret::new(s.to_string())),
        );
    let app = build_gateway_app(Arc::new(state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        addr,
        control,
        push,
        crypto: crypto(),
    }
}

fn between<'a>(haystack: &'a str, start: &str, end: &str) -> &'a str {
    let from = haystack.find(start).unwrap() + start.len();
    let len = haystack[from..].find(end).unwrap();
    &haystack[from..from + len]
}

fn click(key: &str) -> String {
    format!(
        "<xml><ToUserName><![CDATA[{CORP_ID}]]></ToUserName>\
         <FromUserName><![CDATA[alice]]></FromUserName>\
         <CreateTime>1700000000</CreateTime>\
         <MsgType><![CDATA[event]]></MsgType>\
         <Event><![CDATA[click]]></Event>\
         <EventKey><![CDATA[{key}]]></EventKey>\
         <AgentID>1000002</AgentID></xml>"
    )
}

/// Encrypt `inner` the way WeCom would and post it; return the decrypted reply.
async fn post_callback(server: &TestServer, inner: &str) -> (u16, String) {
    let (timestamp, nonce) = ("1700000001", "n0nce");
    let envelope = server.crypto.encrypt_msg(inner, nonce, timestamp).unwrap();
    let signature = between(&envelope, "<MsgSignature><![CDATA[", "]]>").to_string();

    let resp = reqwest::Client::new()
        .post(server.url(&format!(
            "/api/v1/message/?token={API_TOKEN}&msg_signature={signature}\
             &timestamp={timestamp}&nonce={nonce}"
        )))
        .body(envelope)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    if status != 200 {
        return (status, body);
    }

    let reply_sig = between(&body, "<MsgSignature><![CDATA[", "]]>");
    let reply_ts = between(&body, "<TimeStamp>", "</TimeStamp>");
    let reply_nonce = between(&body, "<Nonce><![CDATA[", "]]>");
    let plain = server
        .crypto
        .decrypt_msg(&body, reply_sig, reply_ts, reply_nonce)
        .unwrap();
    (status, plain)
}

fn telegram_update(chat_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": 10,
        "message": {
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": {"id": chat_id, "type": "private", "first_name": "Owner"},
            "from": {"id": chat_id, "is_bot": false, "first_name": "Owner"},
            "text": text
        }
    })
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let server = start_server(None).await;
    for query in ["?token=nope", ""] {
        let resp = reqwest::get(server.url(&format!("/api/v1/message/{query}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, serde_json::json!({"error": "Invalid token"}));
    }
    assert!(server.proxy_calls().is_empty());
}

#[tokio::test]
async fn url_verification_echoes_decrypted_string() {
    let server = start_server(None).await;
    let envelope = server.crypto.encrypt_msg("echo-1234", "n", "1700000000").unwrap();
    let echostr = between(&envelope, "<Encrypt><![CDATA[", "]]>");
    let signature = between(&envelope, "<MsgSignature><![CDATA[", "]]>");

    let resp = reqwest::Client::new()
        .get(server.url("/api/v1/message/"))
        .query(&[
            ("token", API_TOKEN),
            ("msg_signature", signature),
            ("timestamp", "1700000000"),
            ("nonce", "n"),
            ("echostr", echostr),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "echo-1234");

    let resp = reqwest::Client::new()
        .get(server.url("/api/v1/message/"))
        .query(&[
            ("token", API_TOKEN),
            ("msg_signature", "bad"),
            ("timestamp", "1700000000"),
            ("nonce", "n"),
            ("echostr", echostr),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "failed");
}

#[tokio::test]
async fn enable_click_returns_encrypted_news_reply() {
    let server = start_server(None).await;
    let (status, reply) = post_callback(&server, &click("frp.enable")).await;

    assert_eq!(status, 200);
    assert!(reply.contains("<ToUserName><![CDATA[alice]]></ToUserName>"), "{reply}");
    assert!(reply.contains(&format!("<FromUserName><![CDATA[{CORP_ID}]]></FromUserName>")));
    assert!(reply.contains("<CreateTime>1700000000</CreateTime>"), "{reply}");
    assert!(reply.contains("<MsgType><![CDATA[news]]></MsgType>"));
    assert!(reply.contains("回家模式已激活，有效期两小时"));
    assert!(reply.contains(&ImageConfig::default().open_url));
    assert_eq!(server.proxy_calls(), [StreamState::Enabled]);
}

#[tokio::test]
async fn unknown_event_gets_fixed_text() {
    let server = start_server(None).await;
    let inner = "<xml><ToUserName>corp</ToUserName><FromUserName>bob</FromUserName>\
                 <CreateTime>1</CreateTime><MsgType>text</MsgType>\
                 <Content>hello</Content></xml>";
    let (status, reply) = post_callback(&server, inner).await;

    assert_eq!(status, 200);
    assert!(reply.contains("<MsgType><![CDATA[text]]></MsgType>"));
    assert!(reply.contains("未知消息类型或事件"));
    assert!(server.proxy_calls().is_empty());
}

#[tokio::test]
async fn tampered_callback_is_a_server_error() {
    let server = start_server(None).await;
    let envelope = server.crypto.encrypt_msg(&click("frp.enable"), "n", "1").unwrap();
    let resp = reqwest::Client::new()
        .post(server.url(&format!(
            "/api/v1/message/?token={API_TOKEN}&msg_signature=forged&timestamp=1&nonce=n"
        )))
        .body(envelope)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert_eq!(resp.text().await.unwrap(), "failed");
    assert!(server.proxy_calls().is_empty());
}

#[tokio::test]
async fn unconfigured_wecom_answers_503() {
    let control: Arc<dyn StreamControl> = Arc::new(CountingControl::default());
    let coordinator = StreamCoordinator::new(control, Duration::from_secs(60));
    let state = GatewayState::new(coordinator, ImageConfig::default())
        .with_api_token(Some(Secret::new(API_TOKEN.into())));
    let app = build_gateway_app(Arc::new(state));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let url = format!("http://{addr}/api/v1/message/?token={API_TOKEN}");
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 503);
    let resp = reqwest::Client::new().post(&url).body("<xml/>").send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let resp = reqwest::get(format!("http://{addr}/api/v1/message/?token=wrong"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn telegram_owner_enable_reaches_proxy() {
    let server = start_server(None).await;
    let resp = reqwest::Client::new()
        .post(server.url("/telegram"))
        .json(&telegram_update(42, "/enable"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
    assert_eq!(server.proxy_calls(), [StreamState::Enabled]);
    let sent = server.push.sent.lock().unwrap().clone();
    assert_eq!(sent, [(OWNER_CHAT.to_string(), "回家模式已激活，有效期两小时".to_string())]);
}

#[tokio::test]
async fn telegram_stranger_never_reaches_proxy() {
    let server = start_server(None).await;
    for text in ["/enable", "/disable"] {
        let resp = reqwest::Client::new()
            .post(server.url("/telegram"))
            .json(&telegram_update(7, text))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.text().await.unwrap(), "ok");
    }

    assert!(server.proxy_calls().is_empty());
    assert_eq!(server.push.count.load(Ordering::SeqCst), 2);
    assert!(
        server
            .push
            .sent
            .lock()
            .unwrap()
            .iter()
            .all(|(to, text)| to == "7" && text == "Unauthorized access.")
    );
}

#[tokio::test]
async fn telegram_secret_header_is_enforced() {
    let server = start_server(Some("hook-secret")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/telegram"))
        .json(&telegram_update(42, "/enable"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert!(server.proxy_calls().is_empty());

    let resp = client
        .post(server.url("/telegram"))
        .header("X-Telegram-Bot-Api-Secret-Token", "hook-secret")
        .json(&telegram_update(42, "/enable"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(server.proxy_calls(), [StreamState::Enabled]);
}

#[tokio::test]
async fn malformed_telegram_update_is_acknowledged() {
    let server = start_server(None).await;
    let resp = reqwest::Client::new()
        .post(server.url("/telegram"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn health_reports_stream_state() {
    let server = start_server(None).await;
    let body: serde_json::Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stream"]["state"], "disabled");
    assert!(body["stream"]["revert_in_secs"].is_null());
    assert_eq!(body["stream"]["window_secs"], 7200);

    post_callback(&server, &click("frp.enable")).await;
    let body: serde_json::Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["stream"]["state"], "enabled");
    assert!(body["stream"]["revert_in_secs"].as_u64().unwrap() <= 7200);
}
