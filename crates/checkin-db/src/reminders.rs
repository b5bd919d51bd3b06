use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use rusqlite::{Connection, Row};

use checkin_types::models::ReminderKind;

use crate::Database;
use crate::checkins::DATE_FORMAT;
use crate::models::{DueReminder, ReminderSettingPatch, ReminderSettingRow};

/// Parse a user-supplied `H:MM` / `HH:MM` and return it zero-padded, so
/// stored times compare correctly as strings.
pub fn normalize_time(input: &str) -> Option<String> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

impl Database {
    /// Read a user's reminder setting, creating the default row on first read.
    pub fn reminder_setting(&self, user_id: &str) -> Result<ReminderSettingRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO reminder_settings (user_id) VALUES (?1)",
                [user_id],
            )?;
            Ok(query_setting(conn, user_id)?)
        })
    }

    pub fn update_reminder_setting(
        &self,
        user_id: &str,
        patch: &ReminderSettingPatch,
    ) -> Result<ReminderSettingRow> {
        let morning = match &patch.morning_time {
            Some(t) => match normalize_time(t) {
                Some(t) => Some(t),
                None => bail!("invalid morning time: {}", t),
            },
            None => None,
        };
        let evening = match &patch.evening_time {
            Some(t) => match normalize_time(t) {
                Some(t) => Some(t),
                None => bail!("invalid evening time: {}", t),
            },
            None => None,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO reminder_settings (user_id) VALUES (?1)",
                [user_id],
            )?;
            conn.execute(
                "UPDATE reminder_settings SET
                    enabled = COALESCE(?2, enabled),
                    morning_time = COALESCE(?3, morning_time),
                    evening_time = COALESCE(?4, evening_time),
                    weekend_enabled = COALESCE(?5, weekend_enabled),
                    updated_at = datetime('now')
                 WHERE user_id = ?1",
                rusqlite::params![user_id, patch.enabled, morning, evening, patch.weekend_enabled],
            )?;
            Ok(query_setting(conn, user_id)?)
        })
    }

    /// Users who should get a `kind` reminder at local time `now`: enabled,
    /// reminder time reached, weekday or weekend opted in, not yet checked
    /// in for that slot and not already reminded today.
    pub fn users_due_for_reminder(
        &self,
        kind: ReminderKind,
        now: NaiveDateTime,
    ) -> Result<Vec<DueReminder>> {
        let time_column = match kind {
            ReminderKind::Morning => "morning_time",
            ReminderKind::Evening => "evening_time",
        };
        let is_weekend = matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
        let today = now.date().format(DATE_FORMAT).to_string();
        let current = now.time().format("%H:%M").to_string();

        let sql = format!(
            "SELECT r.user_id, u.name, r.{time_column}
             FROM reminder_settings r
             JOIN users u ON u.user_id = r.user_id
             WHERE r.enabled = 1
               AND r.{time_column} <= ?1
               AND (r.weekend_enabled = 1 OR ?2 = 0)
               AND NOT EXISTS (
                   SELECT 1 FROM checkin_records c
                   WHERE c.user_id = r.user_id AND c.date = ?3 AND c.checkin_type = ?4
               )
               AND NOT EXISTS (
                   SELECT 1 FROM reminder_logs l
                   WHERE l.user_id = r.user_id AND l.reminder_type = ?5
                     AND substr(l.sent_at, 1, 10) = ?3
               )
             ORDER BY r.user_id"
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        current,
                        is_weekend,
                        today,
                        kind.checkin_type().as_str(),
                        kind.as_str()
                    ],
                    |row| {
                        Ok(DueReminder {
                            user_id: row.get(0)?,
                            name: row.get(1)?,
                            kind,
                            reminder_time: row.get(2)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn log_reminder(&self, user_id: &str, kind: ReminderKind, sent_at: NaiveDateTime) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminder_logs (user_id, reminder_type, sent_at) VALUES (?1, ?2, ?3)",
                (user_id, kind.as_str(), sent_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            )?;
            Ok(())
        })
    }
}

fn query_setting(conn: &Connection, user_id: &str) -> rusqlite::Result<ReminderSettingRow> {
    conn.query_row(
        "SELECT user_id, enabled, morning_time, evening_time, weekend_enabled, updated_at
         FROM reminder_settings WHERE user_id = ?1",
        [user_id],
        map_setting,
    )
}

fn map_setting(row: &Row<'_>) -> rusqlite::Result<ReminderSettingRow> {
    Ok(ReminderSettingRow {
        user_id: row.get(0)?,
        enabled: row.get(1)?,
        morning_time: row.get(2)?,
        evening_time: row.get(3)?,
        weekend_enabled: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
