use checkin_types::models::CheckinType;
use thiserror::Error;

/// Why a check-in was refused. `Storage` wraps anything that went wrong
/// underneath; the other variants are rule violations the caller reports
/// back to the user verbatim.
#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("今天已經{0}打卡過了")]
    DuplicateCheckin(CheckinType),

    #[error("今天尚未上班打卡，無法下班打卡")]
    MissingClockIn,

    #[error("數據庫錯誤: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for CheckinError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.into())
    }
}

impl CheckinError {
    /// True for the two rule violations, false for storage failures.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}
