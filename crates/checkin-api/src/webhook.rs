use anyhow::Result;
use axum::{body::Bytes, extract::State, http::HeaderMap};
use tracing::{debug, info, warn};

use checkin_line::verify_signature;
use checkin_types::line::{EventSource, MessageContent, WebhookBody, WebhookEvent};

use crate::commands::{self, GROUP_WELCOME_TEXT, WELCOME_TEXT};
use crate::error::{ApiError, run_blocking};
use crate::group::store_group_message;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// LINE callback. Answers `OK` for any correctly signed body; individual
/// event failures are logged and dropped.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    if let Some(secret) = state.config.channel_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("Webhook signature mismatch");
            return Err(ApiError::Unauthorized("簽名驗證失敗".into()));
        }
    }

    let parsed: WebhookBody = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(e) => {
            warn!("Unparseable webhook body: {}", e);
            return Ok("OK");
        }
    };

    for event in parsed.events {
        if let Err(e) = handle_event(&state, event).await {
            warn!("Webhook event failed: {:#}", e);
        }
    }
    Ok("OK")
}

async fn handle_event(state: &AppState, event: WebhookEvent) -> Result<()> {
    match event {
        WebhookEvent::Message { reply_token, source, message: MessageContent::Text { text, .. } } => {
            handle_text(state, reply_token.as_deref(), &source, &text).await
        }
        WebhookEvent::Message { .. } => Ok(()),
        WebhookEvent::Follow { reply_token, source } => {
            if let Some(user_id) = source.user_id() {
                let name = commands::display_name(state, user_id).await;
                let st = state.clone();
                let uid = user_id.to_string();
                run_blocking(move || st.db.upsert_user(&uid, &name)).await?;
                info!("New follower {}", user_id);
            }
            reply(state, reply_token.as_deref(), WELCOME_TEXT).await
        }
        WebhookEvent::Join { reply_token, source } => {
            info!("Joined {:?}", source.group_id());
            reply(state, reply_token.as_deref(), GROUP_WELCOME_TEXT).await
        }
        WebhookEvent::Unfollow { source } => {
            info!("Unfollowed by {:?}", source.user_id());
            Ok(())
        }
        WebhookEvent::Postback { postback, .. } => {
            debug!("Ignoring postback {}", postback.data);
            Ok(())
        }
        WebhookEvent::Other => Ok(()),
    }
}

async fn handle_text(
    state: &AppState,
    reply_token: Option<&str>,
    source: &EventSource,
    text: &str,
) -> Result<()> {
    let user_id = source.user_id();

    if let Some(command) = commands::parse(text) {
        let answer = commands::execute(state, user_id, command).await?;
        return reply(state, reply_token, &answer).await;
    }

    let from_our_group = source.group_id().is_some()
        && source.group_id() == state.config.group_id.as_deref();
    if from_our_group {
        if let Some(uid) = user_id {
            let name = commands::display_name(state, uid).await;
            store_group_message(state, uid, &name, text).await?;
        }
    }

    if source.is_direct() {
        return reply(state, reply_token, &format!("收到您的訊息：{}", text)).await;
    }
    Ok(())
}

async fn reply(state: &AppState, reply_token: Option<&str>, text: &str) -> Result<()> {
    match reply_token {
        Some(token) => state.messenger.reply_text(token, text).await,
        None => {
            debug!("No reply token, dropping reply");
            Ok(())
        }
    }
}
