use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use checkin_db::CheckinError;
use checkin_types::api::MessageResponse;

/// Handler failure, rendered as `{success: false, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// A check-in rule was violated.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CheckinError> for ApiError {
    fn from(e: CheckinError) -> Self {
        match e {
            CheckinError::Storage(inner) => Self::Internal(inner),
            rejection => Self::Conflict(rejection.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self {
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "系統錯誤".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(MessageResponse::fail(message))).into_response()
    }
}

/// Run blocking DB work off the async runtime.
pub async fn run_blocking<F, T, E>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(Into::into)
}

/// Trimmed, non-empty `userId` or a 400.
pub fn require_user_id(user_id: Option<String>) -> Result<String, ApiError> {
    user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("缺少用戶ID".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_types::models::CheckinType;

    #[test]
    fn rejections_become_conflicts_and_storage_stays_internal() {
        let e: ApiError = CheckinError::DuplicateCheckin(CheckinType::ClockIn).into();
        assert!(matches!(&e, ApiError::Conflict(m) if m == "今天已經上班打卡過了"));
        assert_eq!(e.into_response().status(), StatusCode::CONFLICT);

        let e: ApiError = CheckinError::Storage(anyhow::anyhow!("disk full")).into();
        assert_eq!(e.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn user_id_is_required() {
        assert!(require_user_id(None).is_err());
        assert!(require_user_id(Some("  ".into())).is_err());
        assert_eq!(require_user_id(Some(" U1 ".into())).unwrap(), "U1");
    }
}
