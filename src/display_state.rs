// =============================================================================
// Display-State Resolver: freshness and availability for presentation
// =============================================================================
//
// Classification order (first match wins):
//
//   1. no observation                                      -> awaiting
//   2. fetch failed, ERROR signal, or fallback provenance  -> error
//   3. now - fetched_at > stale_multiplier x cadence       -> stale
//   4. delivery activity outside its delivery months       -> not_applicable
//   5. otherwise                                           -> success
//
// A stale reading keeps its signal colour for display, but `stale` is set so
// the posture synthesizer can exclude it. Only `success` feeds the tallies.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::calendar::in_delivery_window;
use crate::indicators::IndicatorId;
use crate::observation::Observation;
use crate::runtime_config::FreshnessSettings;
use crate::types::{DisplayState, Provenance, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolution {
    pub state: DisplayState,
    /// Signal shown next to the state; `None` while awaiting.
    pub signal: Option<Signal>,
    pub stale: bool,
    /// Hours since the observation was fetched.
    pub age_hours: Option<f64>,
}

impl Resolution {
    pub fn counts_toward_posture(&self) -> bool {
        self.state == DisplayState::Success
    }
}

/// Freshness limit for `indicator`.
pub fn stale_after(indicator: IndicatorId, freshness: &FreshnessSettings) -> Duration {
    let minutes = indicator.cadence().hours() as f64 * 60.0 * freshness.stale_multiplier;
    Duration::minutes(minutes.round() as i64)
}

pub fn resolve(
    indicator: IndicatorId,
    observation: Option<&Observation>,
    signal: Option<Signal>,
    now: DateTime<Utc>,
    freshness: &FreshnessSettings,
) -> Resolution {
    let Some(obs) = observation else {
        return Resolution {
            state: DisplayState::Awaiting,
            signal: None,
            stale: false,
            age_hours: None,
        };
    };

    let age = now - obs.fetched_at;
    let age_hours = Some(age.num_minutes() as f64 / 60.0);
    let failed = !obs.is_success()
        || signal == Some(Signal::Error)
        || obs.provenance == Provenance::Fallback;

    let (state, stale) = if failed {
        (DisplayState::Error, false)
    } else if age > stale_after(indicator, freshness) {
        (DisplayState::Stale, true)
    } else if indicator == IndicatorId::DeliveryActivity
        && !in_delivery_window(obs.metal, obs.data_date)
    {
        (DisplayState::NotApplicable, false)
    } else {
        (DisplayState::Success, false)
    };

    Resolution {
        state,
        signal: if failed { Some(Signal::Error) } else { signal },
        stale,
        age_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{DeliveryRaw, RawPayload};
    use crate::types::{FetchStatus, Metal};
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn obs(indicator: IndicatorId, fetched_at: DateTime<Utc>) -> Observation {
        let mut o = Observation::from_payload(
            Metal::Silver,
            indicator,
            fetched_at.date_naive(),
            fetched_at,
            RawPayload::Empty,
        );
        o.computed_value = Some(1.0);
        o
    }

    #[test]
    fn missing_observation_awaits() {
        let r = resolve(
            IndicatorId::MarginLevel,
            None,
            None,
            at(2026, 3, 2, 12),
            &FreshnessSettings::default(),
        );
        assert_eq!(r.state, DisplayState::Awaiting);
        assert!(r.signal.is_none());
        assert!(!r.counts_toward_posture());
    }

    #[test]
    fn daily_goes_stale_after_48h_weekly_after_336h() {
        let fresh = FreshnessSettings::default();
        let fetched = at(2026, 3, 2, 12);
        let o = obs(IndicatorId::MarginLevel, fetched);

        let r = resolve(IndicatorId::MarginLevel, Some(&o), Some(Signal::Red), at(2026, 3, 4, 12), &fresh);
        assert_eq!(r.state, DisplayState::Success);

        let r = resolve(IndicatorId::MarginLevel, Some(&o), Some(Signal::Red), at(2026, 3, 4, 13), &fresh);
        assert_eq!(r.state, DisplayState::Stale);
        assert!(r.stale);
        assert_eq!(r.signal, Some(Signal::Red));
        assert!(!r.counts_toward_posture());

        let w = obs(IndicatorId::SpeculatorPositioning, fetched);
        let r = resolve(
            IndicatorId::SpeculatorPositioning,
            Some(&w),
            Some(Signal::Green),
            at(2026, 3, 15, 12),
            &fresh,
        );
        assert_eq!(r.state, DisplayState::Success);
        let r = resolve(
            IndicatorId::SpeculatorPositioning,
            Some(&w),
            Some(Signal::Green),
            at(2026, 3, 16, 13),
            &fresh,
        );
        assert_eq!(r.state, DisplayState::Stale);
    }

    #[test]
    fn error_outranks_stale() {
        let fetched = at(2026, 3, 2, 12);
        let failed = Observation::failed(
            Metal::Silver,
            IndicatorId::MarginLevel,
            fetched.date_naive(),
            fetched,
            FetchStatus::Timeout,
        );
        let r = resolve(
            IndicatorId::MarginLevel,
            Some(&failed),
            Some(Signal::Error),
            at(2026, 4, 1, 0),
            &FreshnessSettings::default(),
        );
        assert_eq!(r.state, DisplayState::Error);
        assert!(!r.stale);
    }

    #[test]
    fn fallback_and_scorer_error_route_to_error() {
        let fetched = at(2026, 3, 2, 12);
        let mut o = obs(IndicatorId::MarginLevel, fetched);
        let now = at(2026, 3, 2, 13);
        let fresh = FreshnessSettings::default();

        let r = resolve(IndicatorId::MarginLevel, Some(&o), Some(Signal::Error), now, &fresh);
        assert_eq!(r.state, DisplayState::Error);

        o.provenance = Provenance::Fallback;
        let r = resolve(IndicatorId::MarginLevel, Some(&o), Some(Signal::Green), now, &fresh);
        assert_eq!(r.state, DisplayState::Error);
        assert_eq!(r.signal, Some(Signal::Error));
    }

    #[test]
    fn delivery_activity_outside_window_is_not_applicable() {
        let date = NaiveDate::from_ymd_opt(2026, 4, 14).unwrap();
        let fetched = Observation::end_of_day(date);
        let o = Observation::from_payload(
            Metal::Silver,
            IndicatorId::DeliveryActivity,
            date,
            fetched,
            RawPayload::Delivery(DeliveryRaw {
                contracts_stopped: 10.0,
                registered_oz: 1.0,
            }),
        );
        let r = resolve(
            IndicatorId::DeliveryActivity,
            Some(&o),
            Some(Signal::Green),
            fetched + Duration::hours(2),
            &FreshnessSettings::default(),
        );
        assert_eq!(r.state, DisplayState::NotApplicable);
        assert_eq!(r.signal, Some(Signal::Green));
        assert!(!r.counts_toward_posture());
    }
}
