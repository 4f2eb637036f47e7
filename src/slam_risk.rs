// =============================================================================
// Slam-Risk Checklist: five independent early-warning flags
// =============================================================================
//
// Each check compares the current reading with the previous period's reading
// (latest observation strictly before the current data date). A missing or
// unusable reading on either side leaves the item inactive with a reason; it
// is never an error.
//
//   a. commercial_short_build   commercial net short rose
//   b. margin_hike              margin scored RED, or margin level rose
//   c. open_interest_drop       total OI fell more than 5% in one period
//   d. spread_widening          |futures - spot| widened past the metal alarm
//   e. calendar_proximity       key date within 3 days, or Friday-Sunday
//
// The checklist is elevated when at least 3 items are active. Pure count, no
// veto.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::calendar::{is_weekend_window, KeyCalendar};
use crate::observation::Observation;
use crate::runtime_config::SlamRiskSettings;
use crate::types::{Metal, Signal};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlamRiskItemId {
    CommercialShortBuild,
    MarginHike,
    OpenInterestDrop,
    SpreadWidening,
    CalendarProximity,
}

impl SlamRiskItemId {
    pub const ALL: [SlamRiskItemId; 5] = [
        Self::CommercialShortBuild,
        Self::MarginHike,
        Self::OpenInterestDrop,
        Self::SpreadWidening,
        Self::CalendarProximity,
    ];
}

impl std::fmt::Display for SlamRiskItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CommercialShortBuild => write!(f, "commercial_short_build"),
            Self::MarginHike => write!(f, "margin_hike"),
            Self::OpenInterestDrop => write!(f, "open_interest_drop"),
            Self::SpreadWidening => write!(f, "spread_widening"),
            Self::CalendarProximity => write!(f, "calendar_proximity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlamRiskItem {
    pub item_id: SlamRiskItemId,
    pub active: bool,
    pub reason: String,
}

impl SlamRiskItem {
    fn active(item_id: SlamRiskItemId, reason: String) -> Self {
        Self {
            item_id,
            active: true,
            reason,
        }
    }

    fn inactive(item_id: SlamRiskItemId, reason: String) -> Self {
        Self {
            item_id,
            active: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlamRiskChecklist {
    pub items: Vec<SlamRiskItem>,
    pub active_count: usize,
    pub elevated: bool,
}

impl SlamRiskChecklist {
    pub fn from_items(items: Vec<SlamRiskItem>, settings: &SlamRiskSettings) -> Self {
        let active_count = items.iter().filter(|i| i.active).count();
        Self {
            elevated: active_count >= settings.elevated_min_active,
            active_count,
            items,
        }
    }
}

/// Current and previous-period observation of one series.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodPair<'a> {
    pub current: Option<&'a Observation>,
    pub previous: Option<&'a Observation>,
}

impl<'a> PeriodPair<'a> {
    pub fn new(current: Option<&'a Observation>, previous: Option<&'a Observation>) -> Self {
        Self { current, previous }
    }

    fn values(&self) -> Option<(f64, f64)> {
        Some((self.current?.value()?, self.previous?.value()?))
    }
}

/// Everything the checklist reads. All observations are supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct SlamRiskInputs<'a> {
    pub metal: Metal,
    pub today: NaiveDate,
    pub commercial: PeriodPair<'a>,
    pub margin: PeriodPair<'a>,
    /// Signal the margin scorer gave the current margin observation.
    pub margin_signal: Option<Signal>,
    pub roll: PeriodPair<'a>,
    pub spread: PeriodPair<'a>,
    pub calendar: &'a KeyCalendar,
}

// =============================================================================
// Checks
// =============================================================================

fn commercial_short_build(pair: PeriodPair<'_>) -> SlamRiskItem {
    let id = SlamRiskItemId::CommercialShortBuild;
    match pair.values() {
        None => SlamRiskItem::inactive(
            id,
            "no current and previous commercial positioning readings to compare".into(),
        ),
        Some((cur, prev)) if cur > prev => SlamRiskItem::active(
            id,
            format!(
                "commercial net short rose {:+.0} contracts ({:.0} -> {:.0})",
                cur - prev,
                prev,
                cur
            ),
        ),
        Some((cur, prev)) => SlamRiskItem::inactive(
            id,
            format!("commercial net short {:.0} vs {:.0} previously, no build", cur, prev),
        ),
    }
}

fn margin_hike(pair: PeriodPair<'_>, signal: Option<Signal>) -> SlamRiskItem {
    let id = SlamRiskItemId::MarginHike;
    let level = pair.current.and_then(Observation::value);

    if signal == Some(Signal::Red) {
        let level = level.map_or_else(|| "n/a".to_string(), |l| format!("{l:.2}%"));
        return SlamRiskItem::active(id, format!("margin signal is RED (level {level})"));
    }

    match pair.values() {
        None => SlamRiskItem::inactive(id, "no current and previous margin readings to compare".into()),
        Some((cur, prev)) if cur - prev > EPSILON => SlamRiskItem::active(
            id,
            format!("margin raised from {:.2}% to {:.2}% of notional", prev, cur),
        ),
        Some((cur, prev)) => SlamRiskItem::inactive(
            id,
            format!("margin {:.2}% vs {:.2}% previously, no hike", cur, prev),
        ),
    }
}

fn total_oi(obs: Option<&Observation>) -> Option<f64> {
    let obs = obs.filter(|o| o.value().is_some())?;
    let total = obs.roll().ok()?.total_oi;
    (total > 0.0).then_some(total)
}

fn open_interest_drop(pair: PeriodPair<'_>, settings: &SlamRiskSettings) -> SlamRiskItem {
    let id = SlamRiskItemId::OpenInterestDrop;
    let (Some(cur), Some(prev)) = (total_oi(pair.current), total_oi(pair.previous)) else {
        return SlamRiskItem::inactive(id, "no current and previous open interest to compare".into());
    };
    let drop_pct = (prev - cur) / prev * 100.0;
    let reason = format!(
        "total open interest {:.0} -> {:.0} ({:+.1}%)",
        prev, cur, -drop_pct
    );
    if drop_pct > settings.oi_drop_pct {
        SlamRiskItem::active(id, format!("{reason}, a drop of more than {:.0}%", settings.oi_drop_pct))
    } else {
        SlamRiskItem::inactive(id, reason)
    }
}

fn spread_widening(pair: PeriodPair<'_>, metal: Metal) -> SlamRiskItem {
    let id = SlamRiskItemId::SpreadWidening;
    let threshold = metal.spread_widening_alarm_usd();
    let Some((cur, prev)) = pair.values() else {
        return SlamRiskItem::inactive(id, "no current and previous futures/spot spread to compare".into());
    };
    let widened = cur.abs() - prev.abs();
    let reason = format!(
        "|spread| ${:.2} -> ${:.2} ({:+.2}, alarm ${:.2})",
        prev.abs(),
        cur.abs(),
        widened,
        threshold
    );
    if widened > threshold {
        SlamRiskItem::active(id, reason)
    } else {
        SlamRiskItem::inactive(id, reason)
    }
}

fn calendar_proximity(
    metal: Metal,
    today: NaiveDate,
    calendar: &KeyCalendar,
    settings: &SlamRiskSettings,
) -> SlamRiskItem {
    let id = SlamRiskItemId::CalendarProximity;
    if let Some(key) = calendar.nearest_within(metal, today, settings.proximity_days) {
        let days = (key.date - today).num_days();
        return SlamRiskItem::active(
            id,
            format!(
                "{} ({}) on {} is {} day(s) {}",
                key.label,
                key.kind,
                key.date,
                days.abs(),
                if days < 0 { "past" } else { "away" }
            ),
        );
    }
    if is_weekend_window(today) {
        return SlamRiskItem::active(
            id,
            format!("{} {} falls in the weekend liquidity window", today.weekday(), today),
        );
    }
    SlamRiskItem::inactive(
        id,
        format!(
            "no key date within {} days of {} and not a weekend",
            settings.proximity_days, today
        ),
    )
}

/// Evaluate all five checks.
pub fn evaluate(inputs: &SlamRiskInputs<'_>, settings: &SlamRiskSettings) -> SlamRiskChecklist {
    let items = vec![
        commercial_short_build(inputs.commercial),
        margin_hike(inputs.margin, inputs.margin_signal),
        open_interest_drop(inputs.roll, settings),
        spread_widening(inputs.spread, inputs.metal),
        calendar_proximity(inputs.metal, inputs.today, inputs.calendar, settings),
    ];
    let checklist = SlamRiskChecklist::from_items(items, settings);

    debug!(
        metal = %inputs.metal,
        active = checklist.active_count,
        elevated = checklist.elevated,
        "slam-risk checklist evaluated"
    );

    checklist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{KeyDate, KeyDateKind};
    use crate::indicators::IndicatorId;
    use crate::observation::{RawPayload, RollRaw, SpreadRaw};
    use chrono::Duration;

    /// Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn valued(indicator: IndicatorId, date: NaiveDate, value: f64) -> Observation {
        let mut o = Observation::from_payload(
            Metal::Silver,
            indicator,
            date,
            Observation::end_of_day(date),
            RawPayload::Empty,
        );
        o.computed_value = Some(value);
        o
    }

    fn roll(date: NaiveDate, total: f64) -> Observation {
        Observation::from_payload(
            Metal::Silver,
            IndicatorId::RollPattern,
            date,
            Observation::end_of_day(date),
            RawPayload::Roll(RollRaw {
                front_month_oi: 20_000.0,
                total_oi: total,
                days_to_first_notice: 30,
            }),
        )
    }

    fn spread(date: NaiveDate, futures: f64) -> Observation {
        Observation::from_payload(
            Metal::Silver,
            IndicatorId::Backwardation,
            date,
            Observation::end_of_day(date),
            RawPayload::Spread(SpreadRaw {
                spot_usd: 30.0,
                futures_usd: futures,
                days_to_expiry: 40,
            }),
        )
    }

    struct Fixture {
        comm: (Observation, Observation),
        margin: (Observation, Observation),
        roll: (Observation, Observation),
        spread: (Observation, Observation),
        calendar: KeyCalendar,
    }

    impl Fixture {
        fn quiet() -> Self {
            let today = monday();
            let prev = today - Duration::days(7);
            Self {
                comm: (
                    valued(IndicatorId::CommercialPositioning, today, 40_000.0),
                    valued(IndicatorId::CommercialPositioning, prev, 42_000.0),
                ),
                margin: (
                    valued(IndicatorId::MarginLevel, today, 8.0),
                    valued(IndicatorId::MarginLevel, prev, 8.0),
                ),
                roll: (roll(today, 150_000.0), roll(prev, 152_000.0)),
                spread: (spread(today, 30.10), spread(prev, 30.05)),
                calendar: KeyCalendar::default(),
            }
        }

        fn run(&self, today: NaiveDate, margin_signal: Option<Signal>) -> SlamRiskChecklist {
            let inputs = SlamRiskInputs {
                metal: Metal::Silver,
                today,
                commercial: PeriodPair::new(Some(&self.comm.0), Some(&self.comm.1)),
                margin: PeriodPair::new(Some(&self.margin.0), Some(&self.margin.1)),
                margin_signal,
                roll: PeriodPair::new(Some(&self.roll.0), Some(&self.roll.1)),
                spread: PeriodPair::new(Some(&self.spread.0), Some(&self.spread.1)),
                calendar: &self.calendar,
            };
            evaluate(&inputs, &SlamRiskSettings::default())
        }
    }

    fn active_ids(c: &SlamRiskChecklist) -> Vec<SlamRiskItemId> {
        c.items.iter().filter(|i| i.active).map(|i| i.item_id).collect()
    }

    #[test]
    fn quiet_market_has_nothing_active() {
        let c = Fixture::quiet().run(monday(), Some(Signal::Green));
        assert_eq!(c.items.len(), 5);
        assert_eq!(c.active_count, 0);
        assert!(!c.elevated);
        assert!(c.items.iter().all(|i| !i.reason.is_empty()));
    }

    #[test]
    fn exactly_three_active_is_elevated() {
        let mut f = Fixture::quiet();
        let today = monday();
        f.comm.0 = valued(IndicatorId::CommercialPositioning, today, 47_000.0);
        f.roll.0 = roll(today, 140_000.0); // -7.9%
        f.spread.0 = spread(today, 29.60); // |0.40| vs |0.05|
        let c = f.run(today, Some(Signal::Green));
        assert_eq!(
            active_ids(&c),
            vec![
                SlamRiskItemId::CommercialShortBuild,
                SlamRiskItemId::OpenInterestDrop,
                SlamRiskItemId::SpreadWidening
            ]
        );
        assert_eq!(c.active_count, 3);
        assert!(c.elevated);
        assert!(c.items[0].reason.contains("+5000"), "{}", c.items[0].reason);
    }

    #[test]
    fn exactly_two_active_is_not_elevated() {
        let mut f = Fixture::quiet();
        let today = monday();
        f.comm.0 = valued(IndicatorId::CommercialPositioning, today, 47_000.0);
        f.roll.0 = roll(today, 140_000.0);
        let c = f.run(today, Some(Signal::Green));
        assert_eq!(c.active_count, 2);
        assert!(!c.elevated);
    }

    #[test]
    fn red_margin_signal_is_a_hike_without_prior() {
        let f = Fixture::quiet();
        let inputs = SlamRiskInputs {
            metal: Metal::Silver,
            today: monday(),
            commercial: PeriodPair::default(),
            margin: PeriodPair::new(Some(&f.margin.0), None),
            margin_signal: Some(Signal::Red),
            roll: PeriodPair::default(),
            spread: PeriodPair::default(),
            calendar: &f.calendar,
        };
        let c = evaluate(&inputs, &SlamRiskSettings::default());
        assert_eq!(active_ids(&c), vec![SlamRiskItemId::MarginHike]);
        assert!(c.items[1].reason.contains("8.00%"));
        // Missing priors never error: every other item is inactive with a reason.
        assert!(c.items[0].reason.contains("no current and previous"));
    }

    #[test]
    fn margin_level_increase_is_a_hike() {
        let mut f = Fixture::quiet();
        f.margin.0 = valued(IndicatorId::MarginLevel, monday(), 8.5);
        let c = f.run(monday(), Some(Signal::Yellow));
        assert_eq!(active_ids(&c), vec![SlamRiskItemId::MarginHike]);
    }

    #[test]
    fn calendar_and_weekend_proximity() {
        let mut f = Fixture::quiet();
        let friday = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let c = f.run(friday, None);
        assert_eq!(active_ids(&c), vec![SlamRiskItemId::CalendarProximity]);
        assert!(c.items[4].reason.contains("weekend"));

        f.calendar = KeyCalendar::new(vec![KeyDate {
            date: monday() + Duration::days(2),
            label: "Dec first notice".into(),
            kind: KeyDateKind::FirstNotice,
            metal: Some(Metal::Silver),
        }]);
        let c = f.run(monday(), None);
        assert!(c.items[4].active);
        assert!(c.items[4].reason.contains("2 day(s) away"));

        let c = f.run(monday() - Duration::days(7), None);
        assert!(!c.items[4].active);
    }
}
