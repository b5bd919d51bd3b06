use axum::{
    Json,
    extract::{Query, State},
};
use tracing::{info, warn};

use checkin_line::rich_menu::checkin_menu;
use checkin_types::api::{AdminRequest, MessageResponse, SystemInfo, UserQuery};

use crate::error::{ApiError, run_blocking};
use crate::notify::push_to_group;
use crate::state::AppState;

fn require_admin(state: &AppState, user_id: Option<&str>) -> Result<(), ApiError> {
    match user_id {
        Some(id) if state.config.is_admin(id.trim()) => Ok(()),
        _ => Err(ApiError::Forbidden("權限不足".into())),
    }
}

pub async fn system_info(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<SystemInfo>, ApiError> {
    require_admin(&state, query.user_id.as_deref())?;

    let now = state.config.now();
    let st = state.clone();
    let (checkin_count, today_count, user_count, group_message_count) =
        run_blocking(move || -> anyhow::Result<_> {
            Ok((
                st.db.count_checkins(None)?,
                st.db.count_checkins(Some(now.date()))?,
                st.db.count_users()?,
                st.db.count_group_messages()?,
            ))
        })
        .await?;

    Ok(Json(SystemInfo {
        time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checkin_count,
        today_count,
        user_count,
        group_message_count,
    }))
}

pub async fn broadcast(
    State(state): State<AppState>,
    Json(req): Json<AdminRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_admin(&state, req.user_id.as_deref())?;
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("消息不能為空".into()))?;

    let text = format!(
        "📢 系統公告\n{}\n\n🕒 {}",
        message,
        state.config.now().format("%Y-%m-%d %H:%M:%S")
    );
    if push_to_group(&state, &text).await {
        Ok(Json(MessageResponse::ok("廣播消息已發送")))
    } else {
        Ok(Json(MessageResponse::fail("發送廣播消息失敗")))
    }
}

/// Replace the bot's rich menus with the check-in menu.
pub async fn rich_menu(
    State(state): State<AppState>,
    Json(req): Json<AdminRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_admin(&state, req.user_id.as_deref())?;

    let config = &state.config;
    let menu = checkin_menu(&config.liff_id, &config.group_liff_id, &config.app_url);
    match state.messenger.install_rich_menu(&menu).await {
        Ok(id) => {
            info!("Rich menu {} installed", id);
            Ok(Json(MessageResponse::ok(format!("Rich Menu 初始化成功: {id}"))))
        }
        Err(e) => {
            warn!("Rich menu setup failed: {:#}", e);
            Ok(Json(MessageResponse::fail("Rich Menu 初始化失敗")))
        }
    }
}
