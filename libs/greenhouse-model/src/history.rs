use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Window selectable for historical views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPeriod {
    /// Last 24 hours, raw points
    #[default]
    Day,
    /// Last 7 days, one point per day
    Week,
    /// Last 30 days, one point per day
    Month,
}

impl HistoryPeriod {
    pub fn duration(self) -> Duration {
        match self {
            HistoryPeriod::Day => Duration::days(1),
            HistoryPeriod::Week => Duration::days(7),
            HistoryPeriod::Month => Duration::days(30),
        }
    }

    /// Week and month views are reduced to daily buckets
    pub fn is_aggregated(self) -> bool {
        !matches!(self, HistoryPeriod::Day)
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryPeriod::Day => "day",
            HistoryPeriod::Week => "week",
            HistoryPeriod::Month => "month",
        };
        f.write_str(s)
    }
}

impl FromStr for HistoryPeriod {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" | "24h" => Ok(HistoryPeriod::Day),
            "week" | "7d" => Ok(HistoryPeriod::Week),
            "month" | "30d" => Ok(HistoryPeriod::Month),
            other => Err(ModelError::UnknownPeriod(other.to_string())),
        }
    }
}
