//! Application menu provisioning through the WeCom server API.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::info,
};

use homegate_config::WecomConfig;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://qyapi.weixin.qq.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub button: Vec<MenuButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuButton {
    pub name: String,
    pub sub_button: Vec<ClickButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickButton {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub key: String,
}

impl Menu {
    /// One top-level entry with Enable/Disable clicks keyed `{prefix}.enable`
    /// and `{prefix}.disable`.
    #[must_use]
    pub fn stream_toggle(name: &str, key_prefix: &str) -> Self {
        let click = |label: &str, action: &str| ClickButton {
            kind: "click",
            name: label.to_string(),
            key: format!("{key_prefix}.{action}"),
        };
        Self {
            button: vec![MenuButton {
                name: name.to_string(),
                sub_button: vec![click("Enable", "enable"), click("Disable", "disable")],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    access_token: Option<String>,
}

impl ApiResponse {
    fn check(self) -> Result<Self> {
        if self.errcode == 0 {
            Ok(self)
        } else {
            Err(Error::Api {
                errcode: self.errcode,
                errmsg: self.errmsg,
            })
        }
    }
}

pub struct MenuClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for MenuClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /cgi-bin/gettoken`.
    pub async fn access_token(
        &self,
        corp_id: &str,
        corp_secret: &Secret<String>,
    ) -> Result<Secret<String>> {
        let resp: ApiResponse = self
            .http
            .get(format!("{}/cgi-bin/gettoken", self.base_url))
            .query(&[("corpid", corp_id), ("corpsecret", corp_secret.expose_secret().as_str())])
            .send()
            .await
            .map_err(|e| Error::external("requesting access token", e))?
            .error_for_status()
            .map_err(|e| Error::external("requesting access token", e))?
            .json()
            .await
            .map_err(|e| Error::external("decoding access token response", e))?;

        resp.check()?
            .access_token
            .map(Secret::new)
            .ok_or_else(|| Error::Api {
                errcode: 0,
                errmsg: "response carried no access_token".into(),
            })
    }

    /// `POST /cgi-bin/menu/create`.
    pub async fn create_menu(
        &self,
        access_token: &Secret<String>,
        agent_id: &str,
        menu: &Menu,
    ) -> Result<()> {
        let resp: ApiResponse = self
            .http
            .post(format!("{}/cgi-bin/menu/create", self.base_url))
            .query(&[("access_token", access_token.expose_secret().as_str()), ("agentid", agent_id)])
            .json(menu)
            .send()
            .await
            .map_err(|e| Error::external("creating menu", e))?
            .json()
            .await
            .map_err(|e| Error::external("decoding menu response", e))?;
        resp.check()?;
        info!(agent_id, "wecom menu created");
        Ok(())
    }

    /// Fetch a token and install the stream toggle menu described by `config`.
    pub async fn provision(&self, config: &WecomConfig) -> Result<Menu> {
        let secret = config
            .corp_secret
            .as_ref()
            .ok_or_else(|| Error::config("wecom.corp_secret is required to create the menu"))?;
        let agent_id = config
            .agent_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::config("wecom.agent_id is required to create the menu"))?;
        if config.corp_id.is_empty() {
            return Err(Error::config("wecom.corp_id is required to create the menu"));
        }

        let token = self.access_token(&config.corp_id, secret).await?;
        let menu = Menu::stream_toggle(&config.menu_name, &config.menu_key_prefix);
        self.create_menu(&token, agent_id, &menu).await?;
        Ok(menu)
    }
}
