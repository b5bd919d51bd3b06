use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{Months, NaiveDate};
use rusqlite::{Connection, ErrorCode, Row};

use checkin_types::api::{DayTimes, MonthlyStatistics};
use checkin_types::models::{CheckinState, CheckinType};

use crate::models::{CheckinRow, NewCheckin};
use crate::{CheckinError, Database, OptionalExt};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Clock-in at or before this time counts as on time.
const ON_TIME_LIMIT: &str = "09:00:00";
/// Clock-out at or after this time counts as overtime.
const OVERTIME_FROM: &str = "18:00:00";

const RECORD_COLUMNS: &str =
    "id, user_id, name, date, time, checkin_type, location, note, latitude, longitude, created_at";

impl Database {
    /// Apply one check-in to the user's day.
    ///
    /// Clock-in is refused when one already exists; clock-out is refused
    /// without a prior clock-in or when the user already clocked out. The
    /// state read and the insert happen under the same lock.
    pub fn record_checkin(&self, new: &NewCheckin) -> Result<CheckinRow, CheckinError> {
        let conn = self.lock()?;
        let date = new.at.date().format(DATE_FORMAT).to_string();
        let time = new.at.time().format(TIME_FORMAT).to_string();

        let state = query_state(&conn, &new.user_id, &date)?;
        match (new.checkin_type, state) {
            (CheckinType::ClockIn, CheckinState::None) => {}
            (CheckinType::ClockIn, _) => return Err(CheckinError::DuplicateCheckin(CheckinType::ClockIn)),
            (CheckinType::ClockOut, CheckinState::None) => return Err(CheckinError::MissingClockIn),
            (CheckinType::ClockOut, CheckinState::ClockedIn) => {}
            (CheckinType::ClockOut, CheckinState::ClockedOut) => {
                return Err(CheckinError::DuplicateCheckin(CheckinType::ClockOut));
            }
        }

        let inserted = conn.execute(
            "INSERT INTO checkin_records
                (user_id, name, date, time, checkin_type, location, note, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                new.user_id,
                new.name,
                date,
                time,
                new.checkin_type.as_str(),
                new.location,
                new.note,
                new.latitude,
                new.longitude,
            ],
        );

        match inserted {
            Ok(_) => {}
            // Another process sharing the file won the race.
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(CheckinError::DuplicateCheckin(new.checkin_type));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        let row = conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM checkin_records WHERE id = ?1"),
            [id],
            map_record,
        )?;
        Ok(row)
    }

    pub fn checkin_state(&self, user_id: &str, date: NaiveDate) -> Result<CheckinState> {
        let date = date.format(DATE_FORMAT).to_string();
        self.with_conn(|conn| Ok(query_state(conn, user_id, &date)?))
    }

    pub fn records_on(&self, user_id: &str, date: NaiveDate) -> Result<Vec<CheckinRow>> {
        let date = date.format(DATE_FORMAT).to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM checkin_records
                 WHERE user_id = ?1 AND date = ?2
                 ORDER BY time ASC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, date], map_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Records matching the optional filters, newest first. Used by history
    /// and export; `user_id = None` means everyone.
    pub fn query_records(
        &self,
        user_id: Option<&str>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<CheckinRow>> {
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM checkin_records WHERE 1 = 1");
        let mut params: Vec<String> = Vec::new();

        if let Some(uid) = user_id {
            params.push(uid.to_string());
            sql.push_str(&format!(" AND user_id = ?{}", params.len()));
        }
        if let Some(from) = from {
            params.push(from.format(DATE_FORMAT).to_string());
            sql.push_str(&format!(" AND date >= ?{}", params.len()));
        }
        if let Some(to) = to {
            params.push(to.format(DATE_FORMAT).to_string());
            sql.push_str(&format!(" AND date <= ?{}", params.len()));
        }
        sql.push_str(" ORDER BY date DESC, time DESC");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_record)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_checkins(&self, date: Option<NaiveDate>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = match date {
                Some(d) => conn.query_row(
                    "SELECT COUNT(*) FROM checkin_records WHERE date = ?1",
                    [d.format(DATE_FORMAT).to_string()],
                    |r| r.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM checkin_records", [], |r| r.get(0))?,
            };
            Ok(count)
        })
    }

    pub fn latest_checkin(&self) -> Result<Option<CheckinRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {RECORD_COLUMNS} FROM checkin_records ORDER BY id DESC LIMIT 1"),
                    [],
                    map_record,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Per-month attendance summary for one user. `month` is `YYYY-MM`.
    pub fn monthly_statistics(&self, user_id: &str, month: &str) -> Result<MonthlyStatistics> {
        let start = NaiveDate::parse_from_str(&format!("{month}-01"), DATE_FORMAT)
            .with_context(|| format!("invalid month: {month}"))?;
        let end = start
            .checked_add_months(Months::new(1))
            .context("month out of range")?;

        let rows: Vec<(String, String, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date, checkin_type, time FROM checkin_records
                 WHERE user_id = ?1 AND date >= ?2 AND date < ?3
                 ORDER BY date, time",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        user_id,
                        start.format(DATE_FORMAT).to_string(),
                        end.format(DATE_FORMAT).to_string()
                    ],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        Ok(summarize_month(month, &rows))
    }
}

fn summarize_month(month: &str, rows: &[(String, String, String)]) -> MonthlyStatistics {
    let mut daily_records: BTreeMap<String, DayTimes> = BTreeMap::new();
    for (date, kind, time) in rows {
        let day = daily_records.entry(date.clone()).or_default();
        match kind.parse::<CheckinType>() {
            Ok(CheckinType::ClockIn) => day.clock_in = Some(time.clone()),
            Ok(CheckinType::ClockOut) => day.clock_out = Some(time.clone()),
            Err(_) => {}
        }
    }

    let mut stats = MonthlyStatistics {
        month: month.to_string(),
        total_days: daily_records.len() as u32,
        ..Default::default()
    };

    for day in daily_records.values() {
        match (day.clock_in.as_deref(), day.clock_out.as_deref()) {
            (Some(i), Some(o)) => {
                if i <= ON_TIME_LIMIT {
                    stats.on_time_days += 1;
                } else {
                    stats.late_days += 1;
                }
                if o >= OVERTIME_FROM {
                    stats.overtime_days += 1;
                }
            }
            _ => stats.incomplete_days += 1,
        }
    }

    stats.daily_records = daily_records;
    stats
}

pub(crate) fn query_state(conn: &Connection, user_id: &str, date: &str) -> rusqlite::Result<CheckinState> {
    let mut stmt = conn.prepare(
        "SELECT checkin_type FROM checkin_records WHERE user_id = ?1 AND date = ?2",
    )?;
    let kinds = stmt
        .query_map(rusqlite::params![user_id, date], |r| r.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let has = |t: CheckinType| kinds.iter().any(|k| k == t.as_str());
    Ok(if has(CheckinType::ClockOut) {
        CheckinState::ClockedOut
    } else if has(CheckinType::ClockIn) {
        CheckinState::ClockedIn
    } else {
        CheckinState::None
    })
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<CheckinRow> {
    let kind: String = row.get(5)?;
    let checkin_type = kind.parse::<CheckinType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(CheckinRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        checkin_type,
        location: row.get(6)?,
        note: row.get(7)?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
        created_at: row.get(10)?,
    })
}
