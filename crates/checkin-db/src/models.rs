/// Database row types. These map directly to SQLite rows and stay
/// independent of the checkin-types API views.
use checkin_types::models::{CheckinType, ReminderKind};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckinRow {
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
    pub created_at: String,
}

/// Everything needed to insert a check-in. `at` is local wall-clock time.
#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub user_id: String,
    pub name: String,
    pub checkin_type: CheckinType,
    pub location: Option<String>,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct GroupMessageRow {
    pub id: i64,
    pub user_id: String,
    pub user_name: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderSettingRow {
    pub user_id: String,
    pub enabled: bool,
    pub morning_time: String,
    pub evening_time: String,
    pub weekend_enabled: bool,
    pub updated_at: String,
}

/// Fields of a reminder setting a caller wants to change.
#[derive(Debug, Clone, Default)]
pub struct ReminderSettingPatch {
    pub enabled: Option<bool>,
    pub morning_time: Option<String>,
    pub evening_time: Option<String>,
    pub weekend_enabled: Option<bool>,
}

impl ReminderSettingPatch {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.morning_time.is_none()
            && self.evening_time.is_none()
            && self.weekend_enabled.is_none()
    }
}

/// A user the scheduler should nag right now.
#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub user_id: String,
    pub name: String,
    pub kind: ReminderKind,
    pub reminder_time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordRow {
    pub id: i64,
    pub english: String,
    pub chinese: String,
    pub difficulty: u8,
}
