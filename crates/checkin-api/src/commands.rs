use anyhow::Result;
use tracing::{info, warn};

use checkin_db::models::ReminderSettingPatch;
use checkin_db::reminders::normalize_time;
use checkin_types::models::{CheckinType, ReminderKind};

use crate::checkin::quick_checkin;
use crate::error::{ApiError, run_blocking};
use crate::notify::push_to_user;
use crate::reminders::{reminder_settings_text, test_reminder_message};
use crate::state::AppState;
use crate::vocabulary::{format_daily_words, todays_words};

pub const HELP_TEXT: &str = "📱 打卡系統指令說明：\n\
!上班打卡 - 快速完成上班打卡\n\
!下班打卡 - 快速完成下班打卡\n\
!快速打卡 - 快速完成上班打卡（等同於!上班打卡）\n\
!打卡 - 依今日狀態自動上班或下班打卡\n\
!打卡報表 - 查看打卡統計報表\n\
!今日單字學習 - 獲取今日英文單字\n\
!設定提醒 - 查看與設定提醒時間\n\
!設定上班提醒 HH:MM - 設定上班提醒時間\n\
!設定下班提醒 HH:MM - 設定下班提醒時間\n\
!測試提醒 - 發送測試提醒\n\
!系統狀態 - 查看系統運行狀態\n\
打卡 - 獲取打卡頁面連結\n\
查詢ID - 查詢您的用戶ID\n\
其他問題請聯繫管理員";

pub const WELCOME_TEXT: &str = "👋 感謝您加入打卡系統！\n\n\
您可以使用以下指令：\n\
!上班打卡 - 完成上班打卡\n\
!下班打卡 - 完成下班打卡\n\
!幫助 - 查看所有指令列表\n\n\
祝您使用愉快！";

pub const GROUP_WELCOME_TEXT: &str = "👋 感謝您邀請打卡系統加入群組！\n\n\
群組成員可以使用以下指令：\n\
!上班打卡 - 完成上班打卡\n\
!下班打卡 - 完成下班打卡\n\
!幫助 - 查看所有指令列表\n\n\
祝大家使用愉快！";

const NO_USER_ID: &str = "❌ 無法獲取用戶ID，請稍後再試";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `None` picks the next legal type for today.
    Checkin(Option<CheckinType>),
    Report,
    Vocabulary,
    ShowReminders,
    SetReminder(ReminderKind, String),
    Help,
    TestReminder,
    SystemStatus,
    LiffLink,
    WhoAmI,
}

/// Recognize a chat command. Anything else is plain chat.
pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();
    match text {
        "查詢ID" => return Some(Command::WhoAmI),
        "打卡" | "打卡連結" => return Some(Command::LiffLink),
        _ => {}
    }

    let body = text.strip_prefix('!')?.trim();
    let command = match body {
        "上班打卡" | "快速打卡" => Command::Checkin(Some(CheckinType::ClockIn)),
        "下班打卡" => Command::Checkin(Some(CheckinType::ClockOut)),
        "打卡" => Command::Checkin(None),
        "打卡報表" => Command::Report,
        "今日單字學習" | "單字學習" | "學習單字" | "今日單字" => Command::Vocabulary,
        "設定提醒" => Command::ShowReminders,
        "幫助" => Command::Help,
        "測試提醒" => Command::TestReminder,
        "系統狀態" => Command::SystemStatus,
        other => {
            if let Some(arg) = other.strip_prefix("設定上班提醒") {
                set_reminder(ReminderKind::Morning, arg)?
            } else if let Some(arg) = other.strip_prefix("設定下班提醒") {
                set_reminder(ReminderKind::Evening, arg)?
            } else {
                return None;
            }
        }
    };
    Some(command)
}

fn set_reminder(kind: ReminderKind, arg: &str) -> Option<Command> {
    let arg = arg.trim();
    (!arg.is_empty()).then(|| Command::SetReminder(kind, arg.to_string()))
}

/// Run a command and produce the reply text.
pub async fn execute(state: &AppState, user_id: Option<&str>, command: Command) -> Result<String> {
    info!("Command {:?} from {:?}", command, user_id);

    let reply = match (command, user_id) {
        (Command::Help, _) => HELP_TEXT.to_string(),
        (Command::LiffLink, _) => format!("請點擊以下連結進行打卡：\n{}", state.config.liff_url()),
        (Command::SystemStatus, _) => system_status(state).await?,
        (_, None) => NO_USER_ID.to_string(),
        (Command::WhoAmI, Some(user_id)) => format!("您的用戶 ID 是: {}", user_id),
        (Command::Checkin(kind), Some(user_id)) => {
            let name = display_name(state, user_id).await;
            match quick_checkin(state, user_id, &name, kind).await {
                Ok(outcome) => format!("✅ {}\n🕒 {}", outcome.message(), outcome.timestamp()),
                Err(ApiError::Conflict(reason)) => format!("❌ {}", reason),
                Err(e) => {
                    warn!("Quick check-in for {} failed: {}", user_id, e);
                    "❌ 打卡失敗，請稍後再試".to_string()
                }
            }
        }
        (Command::Report, Some(user_id)) => format!(
            "📊 您的打卡報表：\n{}/personal-history?userId={}",
            state.config.app_url, user_id
        ),
        (Command::Vocabulary, Some(user_id)) => match todays_words(state, Some(user_id)).await {
            Ok(words) => format_daily_words(&words),
            Err(e) => {
                warn!("Vocabulary for {} failed: {}", user_id, e);
                "📚 今日單字學習\n正在準備您的詞彙，請稍後再試".to_string()
            }
        },
        (Command::ShowReminders, Some(user_id)) => {
            let st = state.clone();
            let uid = user_id.to_string();
            let setting = run_blocking(move || st.db.reminder_setting(&uid)).await?;
            reminder_settings_text(&setting, &state.config.app_url)
        }
        (Command::SetReminder(kind, time), Some(user_id)) => {
            let Some(time) = normalize_time(&time) else {
                return Ok("❌ 時間格式不正確，請使用24小時制（例如：09:00）".to_string());
            };
            let patch = match kind {
                ReminderKind::Morning => ReminderSettingPatch {
                    morning_time: Some(time.clone()),
                    ..Default::default()
                },
                ReminderKind::Evening => ReminderSettingPatch {
                    evening_time: Some(time.clone()),
                    ..Default::default()
                },
            };
            let st = state.clone();
            let uid = user_id.to_string();
            run_blocking(move || st.db.update_reminder_setting(&uid, &patch)).await?;
            format!("✅ 已將{}提醒時間設為 {}", kind.checkin_type(), time)
        }
        (Command::TestReminder, Some(user_id)) => {
            let name = display_name(state, user_id).await;
            if push_to_user(state, user_id, &test_reminder_message(&name)).await {
                "✅ 測試提醒已發送，請查看您的LINE通知".to_string()
            } else {
                "❌ 發送提醒時出錯，請稍後再試".to_string()
            }
        }
    };
    Ok(reply)
}

/// Name to show for a user: LINE profile, then the stored name, then a
/// generic label.
pub async fn display_name(state: &AppState, user_id: &str) -> String {
    match state.messenger.profile(user_id).await {
        Ok(Some(profile)) => return profile.display_name,
        Ok(None) => {}
        Err(e) => warn!("Profile lookup for {} failed: {:#}", user_id, e),
    }

    let st = state.clone();
    let uid = user_id.to_string();
    match run_blocking(move || st.db.get_user(&uid)).await {
        Ok(Some(user)) => user.name,
        _ => "用戶".to_string(),
    }
}

async fn system_status(state: &AppState) -> Result<String> {
    let now = state.config.now();
    let st = state.clone();
    let (total, today, users, latest) = run_blocking(move || -> Result<_> {
        Ok((
            st.db.count_checkins(None)?,
            st.db.count_checkins(Some(now.date()))?,
            st.db.count_users()?,
            st.db.latest_checkin()?,
        ))
    })
    .await?;

    let mut text = format!("系統狀態報告 ({})\n", now.format("%Y-%m-%d %H:%M:%S"));
    text.push_str(&format!("✓ 打卡記錄總數: {} 筆\n", total));
    text.push_str(&format!("✓ 今日打卡數: {} 筆\n", today));
    text.push_str(&format!("✓ 用戶總數: {} 人", users));
    if let Some(r) = latest {
        text.push_str(&format!(
            "\n✓ 最近打卡: {} 於 {} {} {}打卡",
            r.name, r.date, r.time, r.checkin_type
        ));
    }
    Ok(text)
}
