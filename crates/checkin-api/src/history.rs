use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, NaiveDate};

use checkin_db::checkins::DATE_FORMAT;
use checkin_types::api::{HistoryQuery, HistoryResponse, MonthlyStatistics, StatisticsQuery};

use crate::checkin::record_view;
use crate::error::{ApiError, require_user_id, run_blocking};
use crate::state::AppState;

pub const DEFAULT_RANGE: &str = "7";

/// First day covered by a `dateRange` of `7`, `30`, ... days or `all`.
pub fn range_start(range: &str, today: NaiveDate) -> Result<Option<NaiveDate>, ApiError> {
    if range == "all" {
        return Ok(None);
    }
    range
        .parse::<u32>()
        .ok()
        .and_then(|days| today.checked_sub_signed(Duration::days(days as i64)))
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("無效的日期範圍: {range}")))
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = require_user_id(query.user_id)?;
    let range = query.date_range.unwrap_or_else(|| DEFAULT_RANGE.into());
    let from = range_start(&range, state.config.today())?;

    let st = state.clone();
    let rows = run_blocking(move || st.db.query_records(Some(&user_id), from, None)).await?;

    let records: Vec<_> = rows.into_iter().map(record_view).collect();
    let has_map_records = records
        .iter()
        .any(|r| r.latitude.is_some() && r.longitude.is_some());

    Ok(Json(HistoryResponse { success: true, days: range, has_map_records, records }))
}

pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<MonthlyStatistics>, ApiError> {
    let user_id = require_user_id(query.user_id)?;
    let month = query
        .month
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.today().format("%Y-%m").to_string());
    if NaiveDate::parse_from_str(&format!("{month}-01"), DATE_FORMAT).is_err() {
        return Err(ApiError::BadRequest("月份格式不正確，請使用 YYYY-MM".into()));
    }

    let st = state.clone();
    let stats = run_blocking(move || st.db.monthly_statistics(&user_id, &month)).await?;
    Ok(Json(stats))
}
