use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two kinds of check-in. Stored and transmitted as the Chinese labels
/// the LIFF page and chat commands use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckinType {
    #[serde(rename = "上班")]
    ClockIn,
    #[serde(rename = "下班")]
    ClockOut,
}

impl CheckinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClockIn => "上班",
            Self::ClockOut => "下班",
        }
    }

    /// Reminder slot that nags about this check-in type.
    pub fn reminder_kind(&self) -> ReminderKind {
        match self {
            Self::ClockIn => ReminderKind::Morning,
            Self::ClockOut => ReminderKind::Evening,
        }
    }
}

impl fmt::Display for CheckinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "上班" => Ok(Self::ClockIn),
            "下班" => Ok(Self::ClockOut),
            other => Err(format!("打卡類型必須是上班或下班: {}", other)),
        }
    }
}

/// Per-user, per-day position in the clock-in / clock-out sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckinState {
    None,
    ClockedIn,
    ClockedOut,
}

impl CheckinState {
    /// The check-in type that is legal next, if any.
    pub fn next_type(&self) -> Option<CheckinType> {
        match self {
            Self::None => Some(CheckinType::ClockIn),
            Self::ClockedIn => Some(CheckinType::ClockOut),
            Self::ClockedOut => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Morning,
    Evening,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Evening => "evening",
        }
    }

    /// Check-in type whose presence silences this reminder.
    pub fn checkin_type(&self) -> CheckinType {
        match self {
            Self::Morning => CheckinType::ClockIn,
            Self::Evening => CheckinType::ClockOut,
        }
    }

    /// Local hours (inclusive) during which the scheduler looks for due users.
    pub fn active_hours(&self) -> (u32, u32) {
        match self {
            Self::Morning => (6, 10),
            Self::Evening => (17, 20),
        }
    }
}

impl FromStr for ReminderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "evening" => Ok(Self::Evening),
            other => Err(format!("unknown reminder type: {}", other)),
        }
    }
}
