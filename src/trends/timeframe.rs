//! Google Trends timeframe strings.
//!
//! Accepted formats:
//!
//! - `all` - everything
//! - `YYYY-MM-DD YYYY-MM-DD` - specific dates
//! - `YYYY-MM-DDTHH YYYY-MM-DDTHH` - specific datetimes
//! - `today N-y` / `today {1,3,12}-m` - current time minus years / months
//! - `now {1,7}-d` / `now {1,4}-H` - current time minus days / hours

use crate::error::{MonitorError, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Timeframe used when none is given
pub const DEFAULT_TIMEFRAME: &str = "today 12-m";

/// A validated timeframe string as the Trends API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe(String);

impl Timeframe {
    /// Parse a user-supplied timeframe. Blank input yields the default.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        if is_valid(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(MonitorError::Validation(format!(
                "Unsupported timeframe '{}'. Use 'all', 'today 5-y', 'today 3-m', 'now 7-d', 'now 4-H', \
                 'YYYY-MM-DD YYYY-MM-DD' or 'YYYY-MM-DDTHH YYYY-MM-DDTHH'",
                trimmed
            )))
        }
    }

    /// Custom date range. The start may not be after the end.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(MonitorError::Validation(
                "Start date cannot be after end date.".to_string(),
            ));
        }
        Ok(Self(format!(
            "{} {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self(DEFAULT_TIMEFRAME.to_string())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Timeframe {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.0
    }
}

fn timeframe_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:all|today [1-9]\d*-y|today (?:1|3|12)-m|now (?:1|7)-d|now (?:1|4)-H|\d{4}-\d{2}-\d{2} \d{4}-\d{2}-\d{2}|\d{4}-\d{2}-\d{2}T\d{2} \d{4}-\d{2}-\d{2}T\d{2})$",
        )
        .unwrap_or_else(|_| unreachable!("timeframe pattern is a valid regex"))
    })
}

fn is_valid(s: &str) -> bool {
    if !timeframe_regex().is_match(s) {
        return false;
    }
    // Explicit ranges must also name real calendar dates.
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        return s.split(' ').all(|part| {
            let date = part.split('T').next().unwrap_or(part);
            NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
        });
    }
    true
}

/// Dashboard timeframe choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframePreset {
    AllTime,
    Last5Years,
    Last12Months,
    Last3Months,
    LastMonth,
    Last7Days,
    Last24Hours,
    Last4Hours,
    LastHour,
}

impl TimeframePreset {
    pub const ALL: [TimeframePreset; 9] = [
        TimeframePreset::AllTime,
        TimeframePreset::Last5Years,
        TimeframePreset::Last12Months,
        TimeframePreset::Last3Months,
        TimeframePreset::LastMonth,
        TimeframePreset::Last7Days,
        TimeframePreset::Last24Hours,
        TimeframePreset::Last4Hours,
        TimeframePreset::LastHour,
    ];

    /// Label shown in the dashboard select box
    pub fn label(self) -> &'static str {
        match self {
            TimeframePreset::AllTime => "All time",
            TimeframePreset::Last5Years => "Last 5 years",
            TimeframePreset::Last12Months => "Last 12 months",
            TimeframePreset::Last3Months => "Last 3 months",
            TimeframePreset::LastMonth => "Last month",
            TimeframePreset::Last7Days => "Last 7 days",
            TimeframePreset::Last24Hours => "Last 24 hours",
            TimeframePreset::Last4Hours => "Last 4 hours",
            TimeframePreset::LastHour => "Last hour",
        }
    }

    /// API timeframe string for this preset
    pub fn api_value(self) -> &'static str {
        match self {
            TimeframePreset::AllTime => "all",
            TimeframePreset::Last5Years => "today 5-y",
            TimeframePreset::Last12Months => "today 12-m",
            TimeframePreset::Last3Months => "today 3-m",
            TimeframePreset::LastMonth => "today 1-m",
            TimeframePreset::Last7Days => "now 7-d",
            TimeframePreset::Last24Hours => "now 1-d",
            TimeframePreset::Last4Hours => "now 4-H",
            TimeframePreset::LastHour => "now 1-H",
        }
    }

    pub fn timeframe(self) -> Timeframe {
        Timeframe(self.api_value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_defaults_to_twelve_months() {
        assert_eq!(Timeframe::parse("   ").expect("default").as_str(), "today 12-m");
    }

    #[test]
    fn test_accepts_documented_formats() {
        for tf in [
            "all",
            "today 5-y",
            "today 3-m",
            "now 7-d",
            "now 4-H",
            "2025-09-08 2025-01-01",
            "2025-09-08T12 2025-01-01T00",
        ] {
            assert!(Timeframe::parse(tf).is_ok(), "{tf} should be accepted");
        }
    }

    #[test]
    fn test_rejects_unsupported_windows() {
        for tf in ["today 2-m", "now 3-d", "now 2-H", "yesterday", "2025-13-01 2025-01-01"] {
            assert!(Timeframe::parse(tf).is_err(), "{tf} should be rejected");
        }
    }

    #[test]
    fn test_between_orders_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1).expect("date");
        let end = NaiveDate::from_ymd_opt(2025, 10, 1).expect("date");

        let tf = Timeframe::between(start, end).expect("valid range");
        assert_eq!(tf.as_str(), "2024-10-01 2025-10-01");

        let err = Timeframe::between(end, start).expect_err("reversed range");
        assert!(err.to_string().contains("Start date cannot be after end date."));
    }

    #[test]
    fn test_presets_are_valid_timeframes() {
        for preset in TimeframePreset::ALL {
            assert!(Timeframe::parse(preset.api_value()).is_ok(), "{}", preset.label());
        }
        assert_eq!(TimeframePreset::Last24Hours.api_value(), "now 1-d");
    }
}
