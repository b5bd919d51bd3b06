use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{NaiveDateTime, Timelike};
use tracing::{info, warn};

use checkin_db::models::{ReminderSettingPatch, ReminderSettingRow};
use checkin_db::reminders::normalize_time;
use checkin_types::api::{
    MessageResponse, ReminderSettingView, ReminderSettingsResponse, ReminderSettingsUpdate,
    ReminderTestRequest, UserQuery,
};
use checkin_types::models::ReminderKind;

use crate::error::{ApiError, require_user_id, run_blocking};
use crate::notify::push_to_user;
use crate::state::AppState;

pub fn reminder_message(kind: ReminderKind, name: &str) -> String {
    match kind {
        ReminderKind::Morning => format!("⏰ {name}，早安！您今天還沒有上班打卡，請記得打卡。"),
        ReminderKind::Evening => {
            format!("⏰ {name}，下班時間到了！您今天還沒有下班打卡，請記得打卡。")
        }
    }
}

pub fn test_reminder_message(name: &str) -> String {
    format!("⏰ 測試提醒 - {name}，這是一條測試提醒消息。")
}

pub fn reminder_settings_text(setting: &ReminderSettingRow, app_url: &str) -> String {
    let on_off = |b: bool| if b { "啟用" } else { "停用" };
    format!(
        "⏰ 當前提醒設置：\n\
         - 提醒：{}\n\
         - 上班提醒時間：{}\n\
         - 下班提醒時間：{}\n\
         - 週末提醒：{}\n\n\
         您可以使用以下指令修改設置：\n\
         !設定上班提醒 HH:MM\n\
         !設定下班提醒 HH:MM\n\
         或點擊以下連結進行詳細設置：\n\
         {}/reminder-settings?userId={}",
        on_off(setting.enabled),
        setting.morning_time,
        setting.evening_time,
        on_off(setting.weekend_enabled),
        app_url,
        setting.user_id,
    )
}

/// Reminder kinds whose active window contains the hour of `now`.
pub fn active_kinds(now: NaiveDateTime) -> Vec<ReminderKind> {
    [ReminderKind::Morning, ReminderKind::Evening]
        .into_iter()
        .filter(|k| {
            let (from, to) = k.active_hours();
            (from..=to).contains(&now.hour())
        })
        .collect()
}

/// One reminder pass at local time `now`: push to every due user and log
/// the successful sends. Returns how many went out.
pub async fn send_due_reminders(state: &AppState, now: NaiveDateTime) -> anyhow::Result<usize> {
    let mut sent = 0;

    for kind in active_kinds(now) {
        let st = state.clone();
        let due = run_blocking(move || st.db.users_due_for_reminder(kind, now)).await?;

        for user in due {
            if !push_to_user(state, &user.user_id, &reminder_message(kind, &user.name)).await {
                continue;
            }
            let st = state.clone();
            let uid = user.user_id.clone();
            if let Err(e) = run_blocking(move || st.db.log_reminder(&uid, kind, now)).await {
                warn!("Failed to log {} reminder for {}: {}", kind.as_str(), user.user_id, e);
            }
            info!("Sent {} reminder to {}", kind.as_str(), user.user_id);
            sent += 1;
        }
    }

    Ok(sent)
}

fn setting_view(row: ReminderSettingRow) -> ReminderSettingView {
    ReminderSettingView {
        user_id: row.user_id,
        enabled: row.enabled,
        morning_time: row.morning_time,
        evening_time: row.evening_time,
        weekend_enabled: row.weekend_enabled,
    }
}

pub async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ReminderSettingsResponse>, ApiError> {
    let user_id = require_user_id(query.user_id)?;
    let st = state.clone();
    let row = run_blocking(move || st.db.reminder_setting(&user_id)).await?;
    Ok(Json(ReminderSettingsResponse { success: true, settings: setting_view(row) }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<ReminderSettingsUpdate>,
) -> Result<Json<ReminderSettingsResponse>, ApiError> {
    let user_id = require_user_id(req.user_id)?;

    let check = |t: Option<String>| -> Result<Option<String>, ApiError> {
        t.map(|t| {
            normalize_time(&t).ok_or_else(|| {
                ApiError::BadRequest(format!("時間格式不正確，請使用24小時制（例如：09:00）: {t}"))
            })
        })
        .transpose()
    };
    let patch = ReminderSettingPatch {
        enabled: req.enabled,
        morning_time: check(req.morning_time)?,
        evening_time: check(req.evening_time)?,
        weekend_enabled: req.weekend_enabled,
    };

    let st = state.clone();
    let row = run_blocking(move || {
        if patch.is_empty() {
            st.db.reminder_setting(&user_id)
        } else {
            st.db.update_reminder_setting(&user_id, &patch)
        }
    })
    .await?;
    Ok(Json(ReminderSettingsResponse { success: true, settings: setting_view(row) }))
}

pub async fn test_reminder(
    State(state): State<AppState>,
    Json(req): Json<ReminderTestRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = require_user_id(req.user_id)?;
    let name = req.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "用戶".into());
    let kind = match req.kind.as_deref() {
        None | Some("") => ReminderKind::Morning,
        Some(k) => k.parse::<ReminderKind>().map_err(ApiError::BadRequest)?,
    };

    let text = format!("⏰ 測試 - {}", reminder_message(kind, &name).trim_start_matches("⏰ "));
    if push_to_user(&state, &user_id, &text).await {
        Ok(Json(MessageResponse::ok("測試提醒已發送")))
    } else {
        Ok(Json(MessageResponse::fail("發送測試提醒失敗")))
    }
}
