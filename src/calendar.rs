// =============================================================================
// Key-Date Calendar: delivery windows, flagged low-liquidity dates, weekends
// =============================================================================
//
// Dates are supplied by configuration (first notice days, options expiries,
// exchange holidays). Delivery months are fixed per metal.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::Metal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDateKind {
    FirstNotice,
    OptionsExpiry,
    Holiday,
    LowLiquidity,
}

impl std::fmt::Display for KeyDateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstNotice => write!(f, "first notice"),
            Self::OptionsExpiry => write!(f, "options expiry"),
            Self::Holiday => write!(f, "holiday"),
            Self::LowLiquidity => write!(f, "low liquidity"),
        }
    }
}

/// One flagged date. `metal == None` applies to every metal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDate {
    pub date: NaiveDate,
    pub label: String,
    pub kind: KeyDateKind,
    #[serde(default)]
    pub metal: Option<Metal>,
}

#[derive(Debug, Clone, Default)]
pub struct KeyCalendar {
    dates: Vec<KeyDate>,
}

impl KeyCalendar {
    pub fn new(mut dates: Vec<KeyDate>) -> Self {
        dates.sort_by_key(|d| d.date);
        Self { dates }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Flagged date for `metal` nearest to `today`, within `days` either side.
    pub fn nearest_within(&self, metal: Metal, today: NaiveDate, days: i64) -> Option<&KeyDate> {
        self.dates
            .iter()
            .filter(|d| d.metal.map_or(true, |m| m == metal))
            .filter(|d| (d.date - today).num_days().abs() <= days)
            .min_by_key(|d| (d.date - today).num_days().abs())
    }
}

/// Friday through Sunday: thin weekend liquidity ahead or in progress.
pub fn is_weekend_window(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat | Weekday::Sun)
}

/// Whether the delivery-activity indicator is live for `metal` on `date`.
pub fn in_delivery_window(metal: Metal, date: NaiveDate) -> bool {
    metal.is_delivery_month(date)
}
