use axum::{
    Json,
    extract::{Query, State},
};

use checkin_db::group_messages::GROUP_MESSAGE_RETENTION;
use checkin_db::models::GroupMessageRow;
use checkin_types::api::{
    GroupMessageView, GroupMessagesQuery, GroupMessagesResponse, GroupSendRequest, MessageResponse,
};

use crate::error::{ApiError, require_user_id, run_blocking};
use crate::notify::push_to_group;
use crate::state::AppState;

const DEFAULT_COUNT: u32 = 20;

fn message_view(row: GroupMessageRow) -> GroupMessageView {
    GroupMessageView {
        id: row.id,
        user_id: row.user_id,
        user_name: row.user_name,
        message: row.message,
        timestamp: row.timestamp,
    }
}

/// Store a message seen in, or sent to, the group.
pub async fn store_group_message(
    state: &AppState,
    user_id: &str,
    user_name: &str,
    message: &str,
) -> Result<i64, ApiError> {
    let st = state.clone();
    let (uid, name, msg) = (user_id.to_string(), user_name.to_string(), message.to_string());
    let timestamp = state.config.now().format("%Y-%m-%d %H:%M:%S").to_string();
    run_blocking(move || st.db.insert_group_message(&uid, &name, &msg, &timestamp)).await
}

pub async fn messages(
    State(state): State<AppState>,
    Query(query): Query<GroupMessagesQuery>,
) -> Result<Json<GroupMessagesResponse>, ApiError> {
    let count = query.count.unwrap_or(DEFAULT_COUNT).clamp(1, GROUP_MESSAGE_RETENTION);
    let st = state.clone();
    let rows = run_blocking(move || st.db.recent_group_messages(count)).await?;
    Ok(Json(GroupMessagesResponse {
        success: true,
        messages: rows.into_iter().map(message_view).collect(),
    }))
}

/// Relay a message from the group LIFF page into the LINE group. Only
/// delivered messages are stored.
pub async fn send(
    State(state): State<AppState>,
    Json(req): Json<GroupSendRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = require_user_id(req.user_id)?;
    let user_name = req
        .user_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("缺少用戶名稱".into()))?;
    let message = req
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("訊息不能為空".into()))?;

    if !push_to_group(&state, &format!("💬 {}:\n{}", user_name, message)).await {
        return Ok(Json(MessageResponse::fail("訊息發送失敗")));
    }

    store_group_message(&state, &user_id, &user_name, &message).await?;
    Ok(Json(MessageResponse::ok("訊息已發送")))
}
