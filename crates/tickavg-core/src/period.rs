//! SMA period codes.

use crate::error::CoreError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time bound applied to SMA eviction, encoded by a short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodCode {
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1m")]
    OneMinute,
}

impl PeriodCode {
    pub const ALL: [PeriodCode; 5] = [
        Self::OneWeek,
        Self::OneDay,
        Self::ThirtyMinutes,
        Self::FiveMinutes,
        Self::OneMinute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneWeek => "1w",
            Self::OneDay => "1d",
            Self::ThirtyMinutes => "30m",
            Self::FiveMinutes => "5m",
            Self::OneMinute => "1m",
        }
    }

    pub fn minutes(&self) -> u32 {
        match self {
            Self::OneWeek => 10_080,
            Self::OneDay => 1_440,
            Self::ThirtyMinutes => 30,
            Self::FiveMinutes => 5,
            Self::OneMinute => 1,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }
}

impl fmt::Display for PeriodCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| {
                CoreError::InvalidParameter(format!(
                    "unknown period code '{s}' (expected one of 1w, 1d, 30m, 5m, 1m)"
                ))
            })
    }
}
