// =============================================================================
// Trend Calculator: week-over-week direction and percent change
// =============================================================================
//
// Direction is a plain numeric comparison of computed values. Whether "up" is
// good or bad is a scorer concern and never decided here.
//
//   change% = (current - prior) / |prior| * 100     (None if prior is 0)

use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// Values closer than this are treated as unchanged.
const FLAT_EPSILON: f64 = 1e-9;

/// Days back the "prior week" lookup targets.
pub const WEEK_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: Direction,
    pub week_over_week_change_pct: Option<f64>,
}

impl Trend {
    pub const FLAT: Trend = Trend {
        direction: Direction::Flat,
        week_over_week_change_pct: None,
    };
}

/// Percent change from `prior` to `current`, `None` when `prior` is zero.
pub fn percent_change(current: f64, prior: f64) -> Option<f64> {
    if prior.abs() < f64::EPSILON || !prior.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - prior) / prior.abs() * 100.0)
}

/// Compare two raw values.
pub fn trend_between(current: f64, prior: Option<f64>) -> Trend {
    let Some(prior) = prior.filter(|p| p.is_finite()) else {
        return Trend::FLAT;
    };
    let direction = if (current - prior).abs() < FLAT_EPSILON {
        Direction::Flat
    } else if current > prior {
        Direction::Up
    } else {
        Direction::Down
    };
    Trend {
        direction,
        week_over_week_change_pct: percent_change(current, prior),
    }
}

/// Trend of `current` against the observation from about a week earlier.
/// Unusable readings on either side produce a flat trend with no change.
pub fn trend(current: &Observation, prior_week: Option<&Observation>) -> Trend {
    match current.value() {
        Some(c) => trend_between(c, prior_week.and_then(Observation::value)),
        None => Trend::FLAT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorId;
    use crate::observation::{Observation, RatioRaw, RawPayload};
    use crate::types::{FetchStatus, Metal};
    use chrono::NaiveDate;

    fn ratio_obs(date: NaiveDate, gold: f64) -> Observation {
        Observation::from_payload(
            Metal::Silver,
            IndicatorId::GoldSilverRatio,
            date,
            Observation::end_of_day(date),
            RawPayload::Ratio(RatioRaw {
                gold_usd: gold,
                silver_usd: 30.0,
            }),
        )
    }

    #[test]
    fn up_down_flat() {
        assert_eq!(trend_between(11.0, Some(10.0)).direction, Direction::Up);
        assert_eq!(trend_between(9.0, Some(10.0)).direction, Direction::Down);
        assert_eq!(trend_between(10.0, Some(10.0)).direction, Direction::Flat);
    }

    #[test]
    fn change_uses_absolute_prior() {
        let t = trend_between(-5.0, Some(-10.0));
        assert_eq!(t.direction, Direction::Up);
        assert!((t.week_over_week_change_pct.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_prior_gives_direction_without_change() {
        let t = trend_between(3.0, Some(0.0));
        assert_eq!(t.direction, Direction::Up);
        assert!(t.week_over_week_change_pct.is_none());
    }

    #[test]
    fn missing_prior_is_flat_none() {
        assert_eq!(trend_between(3.0, None), Trend::FLAT);
    }

    #[test]
    fn trend_over_observations_ignores_failed_prior() {
        let d = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        let cur = ratio_obs(d, 2_400.0);
        let failed = Observation::failed(
            Metal::Silver,
            IndicatorId::GoldSilverRatio,
            d,
            Observation::end_of_day(d),
            FetchStatus::Timeout,
        );
        assert_eq!(trend(&cur, Some(&failed)), Trend::FLAT);

        let prior = ratio_obs(d, 2_000.0);
        let t = trend(&cur, Some(&prior));
        assert_eq!(t.direction, Direction::Up);
        assert!((t.week_over_week_change_pct.unwrap() - 20.0).abs() < 1e-9);
    }
}
