use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use checkin_types::line::Profile;

use crate::Messenger;
use crate::rich_menu::RichMenu;

pub const DEFAULT_API_BASE: &str = "https://api.line.me";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// LINE Messaging API client authenticated with a channel access token.
///
/// Built without a token it still constructs, but every call fails with a
/// "not configured" error so the caller can report the send as failed.
pub struct LineClient {
    http: Client,
    token: Option<String>,
    api_base: String,
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(text: &'a str) -> Self {
        Self { kind: "text", text }
    }
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RichMenuId {
    rich_menu_id: String,
}

#[derive(Deserialize)]
struct RichMenuList {
    #[serde(default)]
    richmenus: Vec<RichMenuId>,
}

impl LineClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(token: Option<String>, api_base: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            token: token.filter(|t| !t.is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.token {
            Some(token) => Ok(req.bearer_auth(token)),
            None => bail!("LINE channel access token is not configured"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = self.authed(req)?.send().await.with_context(|| format!("{what}: request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{what}: LINE API returned {status}: {body}");
        }
        Ok(resp)
    }

    pub async fn list_rich_menus(&self) -> Result<Vec<String>> {
        let resp = self
            .send(self.http.get(self.url("/v2/bot/richmenu/list")), "list rich menus")
            .await?;
        let list: RichMenuList = resp.json().await?;
        Ok(list.richmenus.into_iter().map(|m| m.rich_menu_id).collect())
    }

    pub async fn delete_rich_menu(&self, id: &str) -> Result<()> {
        self.send(
            self.http.delete(self.url(&format!("/v2/bot/richmenu/{id}"))),
            "delete rich menu",
        )
        .await?;
        Ok(())
    }

    pub async fn create_rich_menu(&self, menu: &RichMenu) -> Result<String> {
        let resp = self
            .send(self.http.post(self.url("/v2/bot/richmenu")).json(menu), "create rich menu")
            .await?;
        let created: RichMenuId = resp.json().await?;
        Ok(created.rich_menu_id)
    }

    pub async fn set_default_rich_menu(&self, id: &str) -> Result<()> {
        self.send(
            self.http.post(self.url(&format!("/v2/bot/user/all/richmenu/{id}"))),
            "set default rich menu",
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for LineClient {
    async fn push_text(&self, to: &str, text: &str) -> Result<()> {
        let body = PushRequest { to, messages: [TextMessage::new(text)] };
        self.send(self.http.post(self.url("/v2/bot/message/push")).json(&body), "push message")
            .await?;
        debug!("Pushed message to {}", to);
        Ok(())
    }

    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()> {
        let body = ReplyRequest { reply_token, messages: [TextMessage::new(text)] };
        self.send(self.http.post(self.url("/v2/bot/message/reply")).json(&body), "reply message")
            .await?;
        Ok(())
    }

    async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let req = self.authed(self.http.get(self.url(&format!("/v2/bot/profile/{user_id}"))))?;
        let resp = req.send().await.context("get profile: request failed")?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.json().await?)),
            s => {
                let body = resp.text().await.unwrap_or_default();
                bail!("get profile: LINE API returned {s}: {body}")
            }
        }
    }

    async fn install_rich_menu(&self, menu: &RichMenu) -> Result<String> {
        for id in self.list_rich_menus().await? {
            self.delete_rich_menu(&id).await?;
            info!("Deleted rich menu {}", id);
        }
        let id = self.create_rich_menu(menu).await?;
        self.set_default_rich_menu(&id).await?;
        info!("Installed rich menu {}", id);
        Ok(id)
    }
}
