use axum::{
    Json,
    extract::{Query, State},
};
use tracing::info;

use checkin_db::CheckinError;
use checkin_db::checkins::DATE_FORMAT;
use checkin_db::models::{CheckinRow, NewCheckin};
use checkin_types::api::{
    CheckinRecordView, CheckinRequest, CheckinResponse, CheckinStatusResponse, LooseNumber,
    UserQuery,
};
use checkin_types::models::{CheckinState, CheckinType};

use crate::error::{ApiError, require_user_id, run_blocking};
use crate::notify::{NOTIFY_FAILED_SUFFIX, checkin_notification, push_to_group};
use crate::state::AppState;

/// A stored check-in plus whether the group heard about it.
#[derive(Debug)]
pub struct CheckinOutcome {
    pub row: CheckinRow,
    pub notified: bool,
}

impl CheckinOutcome {
    pub fn message(&self) -> String {
        let mut message = format!("{}打卡成功", self.row.checkin_type);
        if !self.notified {
            message.push_str(NOTIFY_FAILED_SUFFIX);
        }
        message
    }

    pub fn timestamp(&self) -> String {
        format!("{} {}", self.row.date, self.row.time)
    }

    pub fn state(&self) -> CheckinState {
        match self.row.checkin_type {
            CheckinType::ClockIn => CheckinState::ClockedIn,
            CheckinType::ClockOut => CheckinState::ClockedOut,
        }
    }
}

/// A check-in request that passed field validation.
#[derive(Debug, PartialEq)]
pub struct ValidCheckin {
    pub user_id: String,
    pub display_name: String,
    pub location: String,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub checkin_type: CheckinType,
}

/// Collect every problem with the request instead of stopping at the first.
pub fn validate(req: CheckinRequest) -> Result<ValidCheckin, Vec<String>> {
    fn present(v: Option<String>) -> Option<String> {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }
    fn coordinate(v: Option<&LooseNumber>) -> Result<Option<f64>, ()> {
        v.map(LooseNumber::to_f64).transpose().map(Option::flatten)
    }

    let mut errors = Vec::new();

    let user_id = present(req.user_id);
    if user_id.is_none() {
        errors.push("缺少用戶ID".to_string());
    }
    let display_name = present(req.display_name);
    if display_name.is_none() {
        errors.push("缺少用戶名稱".to_string());
    }
    let location = present(req.location);
    if location.is_none() {
        errors.push("缺少位置信息".to_string());
    }

    let latitude = coordinate(req.latitude.as_ref());
    let longitude = coordinate(req.longitude.as_ref());
    if latitude.is_err() || longitude.is_err() {
        errors.push("經緯度格式不正確".to_string());
    }

    let checkin_type = match present(req.checkin_type) {
        None => Ok(CheckinType::ClockIn),
        Some(t) => t.parse::<CheckinType>(),
    };
    if let Err(e) = &checkin_type {
        errors.push(e.clone());
    }

    match (user_id, display_name, location, latitude, longitude, checkin_type) {
        (Some(user_id), Some(display_name), Some(location), Ok(latitude), Ok(longitude), Ok(checkin_type))
            if errors.is_empty() =>
        {
            Ok(ValidCheckin {
                user_id,
                display_name,
                location,
                note: present(req.note),
                latitude,
                longitude,
                checkin_type,
            })
        }
        _ => Err(errors),
    }
}

/// Store the check-in, then tell the group. A failed notification only
/// changes the message; the record stays.
pub async fn perform_checkin(state: &AppState, new: NewCheckin) -> Result<CheckinOutcome, ApiError> {
    let st = state.clone();
    let row = run_blocking(move || -> Result<CheckinRow, CheckinError> {
        st.db.upsert_user(&new.user_id, &new.name)?;
        st.db.record_checkin(&new)
    })
    .await?;

    info!("{} {} check-in recorded at {} {}", row.user_id, row.checkin_type, row.date, row.time);

    let notified = push_to_group(state, &checkin_notification(&row)).await;
    Ok(CheckinOutcome { row, notified })
}

/// Check-in from a chat command. Without an explicit type the next legal
/// one for today is used.
pub async fn quick_checkin(
    state: &AppState,
    user_id: &str,
    name: &str,
    checkin_type: Option<CheckinType>,
) -> Result<CheckinOutcome, ApiError> {
    let now = state.config.now();

    let checkin_type = match checkin_type {
        Some(t) => t,
        None => {
            let st = state.clone();
            let uid = user_id.to_string();
            let today = now.date();
            let current = run_blocking(move || st.db.checkin_state(&uid, today)).await?;
            current
                .next_type()
                .ok_or(CheckinError::DuplicateCheckin(CheckinType::ClockOut))?
        }
    };

    let new = NewCheckin {
        user_id: user_id.to_string(),
        name: name.to_string(),
        checkin_type,
        location: Some(format!("快速{}打卡", checkin_type)),
        note: Some(format!("通過指令快速{}打卡", checkin_type)),
        latitude: None,
        longitude: None,
        at: now,
    };
    perform_checkin(state, new).await
}

pub async fn checkin(
    State(state): State<AppState>,
    Json(req): Json<CheckinRequest>,
) -> Result<Json<CheckinResponse>, ApiError> {
    let valid = validate(req).map_err(|errors| ApiError::BadRequest(errors.join(", ")))?;

    let new = NewCheckin {
        user_id: valid.user_id,
        name: valid.display_name,
        checkin_type: valid.checkin_type,
        location: Some(valid.location),
        note: valid.note,
        latitude: valid.latitude,
        longitude: valid.longitude,
        at: state.config.now(),
    };
    let outcome = perform_checkin(&state, new).await?;

    Ok(Json(CheckinResponse {
        success: true,
        message: outcome.message(),
        timestamp: Some(outcome.timestamp()),
        state: Some(outcome.state()),
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<CheckinStatusResponse>, ApiError> {
    let user_id = require_user_id(query.user_id)?;
    let today = state.config.today();

    let st = state.clone();
    let (current, rows) = run_blocking(move || -> anyhow::Result<_> {
        Ok((st.db.checkin_state(&user_id, today)?, st.db.records_on(&user_id, today)?))
    })
    .await?;

    Ok(Json(CheckinStatusResponse {
        success: true,
        date: today.format(DATE_FORMAT).to_string(),
        state: current,
        records: rows.into_iter().map(record_view).collect(),
    }))
}

pub fn record_view(row: CheckinRow) -> CheckinRecordView {
    CheckinRecordView {
        id: row.id,
        user_id: row.user_id,
        name: row.name,
        date: row.date,
        time: row.time,
        checkin_type: row.checkin_type,
        location: row.location,
        note: row.note,
        latitude: row.latitude,
        longitude: row.longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CheckinRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn reports_every_missing_field() {
        let errors = validate(CheckinRequest::default()).unwrap_err();
        assert_eq!(errors.join(", "), "缺少用戶ID, 缺少用戶名稱, 缺少位置信息");
    }

    #[test]
    fn accepts_string_coordinates_and_defaults_to_clock_in() {
        let valid = validate(request(
            r#"{"userId":"U1","displayName":"小明","location":"辦公室","latitude":"25.03","longitude":121.56}"#,
        ))
        .unwrap();
        assert_eq!(valid.checkin_type, CheckinType::ClockIn);
        assert_eq!(valid.latitude, Some(25.03));
        assert_eq!(valid.longitude, Some(121.56));
        assert_eq!(valid.note, None);
    }

    #[test]
    fn rejects_bad_coordinates_and_unknown_type() {
        let errors = validate(request(
            r#"{"userId":"U1","displayName":"小明","location":"辦公室","latitude":"north","checkinType":"午休"}"#,
        ))
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "經緯度格式不正確");
        assert!(errors[1].contains("午休"));
    }

    #[test]
    fn empty_coordinate_strings_mean_absent() {
        let valid = validate(request(
            r#"{"userId":"U1","displayName":"小明","location":"辦公室","latitude":"","longitude":"","checkinType":"下班"}"#,
        ))
        .unwrap();
        assert_eq!(valid.latitude, None);
        assert_eq!(valid.checkin_type, CheckinType::ClockOut);
    }
}
