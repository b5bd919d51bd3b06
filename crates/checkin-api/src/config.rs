use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Taipei.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

/// Settings the handlers need. Network and storage settings live in the
/// binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Group that receives check-in notifications and broadcasts.
    pub group_id: Option<String>,
    pub liff_id: String,
    pub group_liff_id: String,
    pub app_url: String,
    /// When set, webhook requests must carry a valid `x-line-signature`.
    pub channel_secret: Option<String>,
    pub utc_offset: FixedOffset,
    pub admin_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            group_id: None,
            liff_id: String::new(),
            group_liff_id: String::new(),
            app_url: String::new(),
            channel_secret: None,
            utc_offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600)
                .unwrap_or_else(|| Utc.fix()),
            admin_ids: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let offset_hours: i32 = match env_opt("CHECKIN_UTC_OFFSET_HOURS") {
            Some(v) => v.parse().context("CHECKIN_UTC_OFFSET_HOURS must be an integer")?,
            None => DEFAULT_UTC_OFFSET_HOURS,
        };
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .with_context(|| format!("UTC offset out of range: {offset_hours}"))?;

        Ok(Self {
            group_id: env_opt("LINE_GROUP_ID"),
            liff_id: env_opt("LIFF_ID").unwrap_or_default(),
            group_liff_id: env_opt("GROUP_LIFF_ID").unwrap_or_default(),
            app_url: env_opt("APP_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            channel_secret: env_opt("MESSAGING_CHANNEL_SECRET"),
            utc_offset,
            admin_ids: parse_list(&env_opt("CHECKIN_ADMIN_IDS").unwrap_or_default()),
        })
    }

    /// Local wall-clock time.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_ids.iter().any(|id| id == user_id)
    }

    pub fn liff_url(&self) -> String {
        format!("https://liff.line.me/{}", self.liff_id)
    }
}

/// Unset and empty variables both read as `None`.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
