use tracing::warn;

use checkin_db::models::CheckinRow;

use crate::state::AppState;

/// Appended to a success message when the group push did not go through.
pub const NOTIFY_FAILED_SUFFIX: &str = "（通知發送失敗）";

pub fn checkin_notification(row: &CheckinRow) -> String {
    let mut text = format!(
        "✅ {} 已於 {} {} 完成{}打卡",
        row.name, row.date, row.time, row.checkin_type
    );
    text.push_str(&format!("\n📍 位置: {}", row.location.as_deref().unwrap_or("未提供位置")));
    if let Some(note) = row.note.as_deref().filter(|n| !n.is_empty()) {
        text.push_str(&format!("\n📝 備註: {}", note));
    }
    if let (Some(lat), Some(lng)) = (row.latitude, row.longitude) {
        text.push_str(&format!("\n🗺️ https://www.google.com/maps?q={},{}", lat, lng));
    }
    text
}

/// Push `text` to the configured group. Returns whether it was delivered;
/// failures are logged, never propagated.
pub async fn push_to_group(state: &AppState, text: &str) -> bool {
    let Some(group_id) = state.config.group_id.as_deref() else {
        warn!("LINE_GROUP_ID is not configured, group message dropped");
        return false;
    };
    match state.messenger.push_text(group_id, text).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Group push failed: {:#}", e);
            false
        }
    }
}

/// Push `text` to a single user, logging failures.
pub async fn push_to_user(state: &AppState, user_id: &str, text: &str) -> bool {
    match state.messenger.push_text(user_id, text).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Push to {} failed: {:#}", user_id, e);
            false
        }
    }
}
