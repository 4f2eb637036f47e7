// =============================================================================
// Shared types used across the metal-pulse evaluation core
// =============================================================================

use chrono::{Datelike, Month};
use serde::{Deserialize, Serialize};

/// Commodity tracked by the engine. Every indicator series exists once per
/// metal; the scoring rules are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metal {
    Silver,
    Gold,
}

impl Metal {
    pub const ALL: [Metal; 2] = [Metal::Silver, Metal::Gold];

    /// Troy ounces per COMEX futures contract.
    pub fn contract_size_oz(self) -> f64 {
        match self {
            Self::Silver => 5_000.0,
            Self::Gold => 100.0,
        }
    }

    /// Active delivery months on COMEX.
    pub fn delivery_months(self) -> &'static [Month] {
        match self {
            Self::Silver => &[
                Month::March,
                Month::May,
                Month::July,
                Month::September,
                Month::December,
            ],
            Self::Gold => &[
                Month::February,
                Month::April,
                Month::June,
                Month::August,
                Month::October,
                Month::December,
            ],
        }
    }

    /// Whether `date` falls inside one of this metal's delivery months.
    pub fn is_delivery_month(self, date: chrono::NaiveDate) -> bool {
        self.delivery_months()
            .iter()
            .any(|m| m.number_from_month() == date.month())
    }

    /// Week-over-week fall in registered ounces that forces a RED vault
    /// signal regardless of the ratio band.
    pub fn registered_drawdown_alarm_oz(self) -> f64 {
        match self {
            Self::Silver => 5_000_000.0,
            Self::Gold => 100_000.0,
        }
    }

    /// Absolute widening of the futures/spot spread ($/oz) that counts as a
    /// slam-risk warning.
    pub fn spread_widening_alarm_usd(self) -> f64 {
        match self {
            Self::Silver => 0.25,
            Self::Gold => 5.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silver" | "xag" => Ok(Self::Silver),
            "gold" | "xau" => Ok(Self::Gold),
            other => Err(format!("unknown metal '{other}'. Use 'silver' or 'gold'.")),
        }
    }
}

/// Traffic-light verdict for one indicator. There is no "unknown" value:
/// `Error` is itself a displayable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Green,
    Yellow,
    Red,
    Error,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => write!(f, "GREEN"),
            Self::Yellow => write!(f, "YELLOW"),
            Self::Red => write!(f, "RED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of the upstream fetch that produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Error,
    Timeout,
    ParseError,
}

impl Default for FetchStatus {
    fn default() -> Self {
        Self::Success
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
            Self::ParseError => write!(f, "parse_error"),
        }
    }
}

/// Whether a value came from the real source or was substituted by the fetch
/// layer. Fallback values are never scored as if they were genuine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Fallback,
}

impl Default for Provenance {
    fn default() -> Self {
        Self::Live
    }
}

/// Presentation-layer classification of one indicator, independent of the
/// signal colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Success,
    Error,
    Awaiting,
    Stale,
    NotApplicable,
}

impl std::fmt::Display for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Awaiting => write!(f, "awaiting"),
            Self::Stale => write!(f, "stale"),
            Self::NotApplicable => write!(f, "not_applicable"),
        }
    }
}

/// Synthesized overall market recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Posture {
    Buy,
    Sell,
    Caution,
    Neutral,
    InsufficientData,
}

impl std::fmt::Display for Posture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Caution => write!(f, "CAUTION"),
            Self::Neutral => write!(f, "NEUTRAL"),
            Self::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn delivery_months_differ_per_metal() {
        let march = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let april = NaiveDate::from_ymd_opt(2026, 4, 10).unwrap();
        assert!(Metal::Silver.is_delivery_month(march));
        assert!(!Metal::Gold.is_delivery_month(march));
        assert!(Metal::Gold.is_delivery_month(april));
        assert!(!Metal::Silver.is_delivery_month(april));
    }

    #[test]
    fn metal_parses_tickers_and_names() {
        assert_eq!("Silver".parse::<Metal>().unwrap(), Metal::Silver);
        assert_eq!("xau".parse::<Metal>().unwrap(), Metal::Gold);
        assert!("copper".parse::<Metal>().is_err());
    }

    #[test]
    fn posture_serialises_screaming_case() {
        let json = serde_json::to_string(&Posture::InsufficientData).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_DATA\"");
        assert_eq!(Posture::Sell.to_string(), "SELL");
    }

    #[test]
    fn display_state_names() {
        assert_eq!(DisplayState::NotApplicable.to_string(), "not_applicable");
        let json = serde_json::to_string(&DisplayState::Stale).unwrap();
        assert_eq!(json, "\"stale\"");
    }
}
