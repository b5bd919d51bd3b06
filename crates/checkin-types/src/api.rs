use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CheckinState, CheckinType};

// -- Check-in --

/// A number the LIFF page may send either as JSON number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// `Ok(None)` for an empty string, `Err` for text that is not a number.
    pub fn to_f64(&self) -> Result<Option<f64>, ()> {
        match self {
            Self::Number(n) => Ok(Some(*n)),
            Self::Text(s) if s.trim().is_empty() => Ok(None),
            Self::Text(s) => s.trim().parse::<f64>().map(Some).map_err(|_| ()),
        }
    }
}

/// Body of `POST /api/checkin`. Every field is optional at the serde level so
/// the handler can report all missing fields at once.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRequest {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub note: Option<String>,
    pub latitude: Option<LooseNumber>,
    pub longitude: Option<LooseNumber>,
    pub checkin_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CheckinState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecordView {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub date: String,
    pub time: String,
    pub checkin_type: CheckinType,
    pub location: Option<String>,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinStatusResponse {
    pub success: bool,
    pub date: String,
    pub state: CheckinState,
    pub records: Vec<CheckinRecordView>,
}

// -- History / statistics --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: Option<String>,
    pub date_range: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub success: bool,
    pub days: String,
    pub has_map_records: bool,
    pub records: Vec<CheckinRecordView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub user_id: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatistics {
    pub month: String,
    pub total_days: u32,
    pub on_time_days: u32,
    pub late_days: u32,
    pub incomplete_days: u32,
    pub overtime_days: u32,
    /// `YYYY-MM-DD` to that day's times.
    pub daily_records: BTreeMap<String, DayTimes>,
}

/// Clock-in and clock-out time of one day, keyed by check-in type on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTimes {
    #[serde(rename = "上班")]
    pub clock_in: Option<String>,
    #[serde(rename = "下班")]
    pub clock_out: Option<String>,
}

// -- Group relay --

#[derive(Debug, Deserialize)]
pub struct GroupMessagesQuery {
    pub count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSendRequest {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageView {
    pub id: i64,
    pub user_id: String,
    pub user_name: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupMessagesResponse {
    pub success: bool,
    pub messages: Vec<GroupMessageView>,
}

// -- Reminders --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettingView {
    pub user_id: String,
    pub enabled: bool,
    pub morning_time: String,
    pub evening_time: String,
    pub weekend_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReminderSettingsResponse {
    pub success: bool,
    pub settings: ReminderSettingView,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettingsUpdate {
    pub user_id: Option<String>,
    pub enabled: Option<bool>,
    pub morning_time: Option<String>,
    pub evening_time: Option<String>,
    pub weekend_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTestRequest {
    pub user_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// -- Vocabulary --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordView {
    pub english: String,
    pub chinese: String,
    pub difficulty: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VocabularyResponse {
    pub success: bool,
    pub date: String,
    pub words: Vec<WordView>,
}

// -- Export --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub user_id: Option<String>,
    pub date_range: Option<String>,
    pub format: Option<String>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequest {
    pub user_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub time: String,
    pub version: String,
    pub checkin_count: i64,
    pub today_count: i64,
    pub user_count: i64,
    pub group_message_count: i64,
}

/// Generic `{success, message}` envelope used by most endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}
