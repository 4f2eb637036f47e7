// =============================================================================
// Evaluation Engine: one scoring pass per metal
// =============================================================================
//
// A pass:
//   1. reads the latest observation, prior-week observation, previous-period
//      observation and baseline history of every fetched series
//   2. derives the derived indicators from their explicit upstream readings
//   3. scores every indicator independently; a contract violation is caught
//      and becomes that indicator's ERROR verdict
//   4. resolves display states and week-over-week trends
//   5. synthesizes the posture and the slam-risk checklist
//
// The engine only reads through `ObservationSource` and never writes. What to
// persist (signal records, derived rows) is returned in the report.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::{trend, Trend};
use crate::display_state::{self, Resolution};
use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::observation::{success_values, Observation, ObservationSource, SeriesKey};
use crate::posture::{self, PostureInput, PostureReport};
use crate::runtime_config::{EngineConfig, ScoringSettings};
use crate::scoring::{
    self, derive_delivery_pressure, derive_lease_rate, DeliveryPressureUpstream, LeaseUpstream,
    ScoreContext, SignalRecord, Verdict,
};
use crate::slam_risk::{self, PeriodPair, SlamRiskChecklist, SlamRiskInputs};
use crate::types::{DisplayState, Metal, Signal};

// =============================================================================
// Report types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReport {
    pub indicator: IndicatorId,
    pub id: u8,
    pub name: &'static str,
    pub display_state: DisplayState,
    pub stale: bool,
    pub signal: Option<Signal>,
    pub reason: String,
    pub rule: Option<&'static str>,
    pub observation_id: Option<u64>,
    pub computed_value: Option<f64>,
    pub data_date: Option<NaiveDate>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_hours: Option<f64>,
    pub trend: Trend,
    /// Signal differs from the one reported by the previous pass.
    pub signal_changed: bool,
    /// Unmodified computed values for the narration layer, oldest first.
    pub history_values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub pass_id: Uuid,
    pub metal: Metal,
    pub evaluated_at: DateTime<Utc>,
    pub indicators: Vec<IndicatorReport>,
    /// `{signal, signal_reason}` for every stored observation that was scored.
    pub signal_records: Vec<SignalRecord>,
    /// Derived rows built this pass, with their signal attached.
    pub derived_observations: Vec<Observation>,
    pub posture: PostureReport,
    pub slam_risk: SlamRiskChecklist,
}

impl EvaluationReport {
    pub fn indicator(&self, id: IndicatorId) -> Option<&IndicatorReport> {
        self.indicators.iter().find(|r| r.indicator == id)
    }
}

// =============================================================================
// Inputs gathered per series
// =============================================================================

#[derive(Debug, Clone, Default)]
struct SeriesInputs {
    current: Option<Observation>,
    prior: Option<Observation>,
    previous: Option<Observation>,
    history: Vec<Observation>,
    derive_error: Option<ScoreError>,
}

fn gather<S: ObservationSource + ?Sized>(
    source: &S,
    key: SeriesKey,
    settings: &ScoringSettings,
) -> SeriesInputs {
    let Some(current) = source.latest(key) else {
        return SeriesInputs::default();
    };
    let date = current.data_date;
    SeriesInputs {
        prior: source.about_days_before(
            key,
            date,
            settings.prior_week_days,
            settings.prior_tolerance_days,
        ),
        previous: source.previous_before(key, date),
        history: source.last_years(key, date, settings.baseline_years),
        current: Some(current),
        derive_error: None,
    }
}

fn derive_series<S: ObservationSource + ?Sized>(
    source: &S,
    metal: Metal,
    indicator: IndicatorId,
    fetched: &HashMap<IndicatorId, SeriesInputs>,
    settings: &ScoringSettings,
) -> SeriesInputs {
    let current_of = |id: IndicatorId| fetched.get(&id).and_then(|s| s.current.as_ref());
    let prior_of = |id: IndicatorId| fetched.get(&id).and_then(|s| s.prior.as_ref());

    let (derived, prior) = match indicator {
        IndicatorId::DeliveryPressure => {
            let upstream = DeliveryPressureUpstream {
                roll: current_of(IndicatorId::RollPattern),
                vault: current_of(IndicatorId::VaultInventory),
            };
            if upstream.is_empty() {
                return SeriesInputs::default();
            }
            let prior_upstream = DeliveryPressureUpstream {
                roll: prior_of(IndicatorId::RollPattern),
                vault: prior_of(IndicatorId::VaultInventory),
            };
            (
                derive_delivery_pressure(metal, upstream),
                derive_delivery_pressure(metal, prior_upstream).ok(),
            )
        }
        IndicatorId::LeaseRate => {
            let upstream = LeaseUpstream {
                spread: current_of(IndicatorId::Backwardation),
            };
            if upstream.is_empty() {
                return SeriesInputs::default();
            }
            let prior_upstream = LeaseUpstream {
                spread: prior_of(IndicatorId::Backwardation),
            };
            (
                derive_lease_rate(metal, upstream, settings.risk_free_rate_pct),
                derive_lease_rate(metal, prior_upstream, settings.risk_free_rate_pct).ok(),
            )
        }
        _ => return gather(source, SeriesKey::new(metal, indicator), settings),
    };

    match derived {
        Ok(current) => {
            let key = SeriesKey::new(metal, indicator);
            let date = current.data_date;
            SeriesInputs {
                prior,
                previous: source.previous_before(key, date),
                history: source.last_years(key, date, settings.baseline_years),
                current: Some(current),
                derive_error: None,
            }
        }
        Err(e) => SeriesInputs {
            derive_error: Some(e),
            ..SeriesInputs::default()
        },
    }
}

// =============================================================================
// Evaluator
// =============================================================================

pub struct Evaluator<'a> {
    config: &'a EngineConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Run one pass for `metal` as of `now`. `previous` is the last report for
    /// the same metal, used only to flag signal changes.
    pub fn evaluate<S: ObservationSource + ?Sized>(
        &self,
        source: &S,
        metal: Metal,
        now: DateTime<Utc>,
        previous: Option<&EvaluationReport>,
    ) -> EvaluationReport {
        let pass_id = Uuid::new_v4();
        let settings = &self.config.scoring;

        let mut series: HashMap<IndicatorId, SeriesInputs> = IndicatorId::ALL
            .iter()
            .filter(|id| !id.is_derived())
            .map(|id| (*id, gather(source, SeriesKey::new(metal, *id), settings)))
            .collect();
        for id in IndicatorId::ALL.iter().filter(|id| id.is_derived()) {
            let inputs = derive_series(source, metal, *id, &series, settings);
            series.insert(*id, inputs);
        }

        let mut indicators = Vec::with_capacity(IndicatorId::COUNT);
        let mut signal_records = Vec::new();
        let mut derived_observations = Vec::new();
        let mut verdicts: HashMap<IndicatorId, Verdict> = HashMap::new();

        let awaiting = SeriesInputs::default();
        for id in IndicatorId::ALL {
            let inputs = series.get(&id).unwrap_or(&awaiting);
            let verdict = self.score_series(metal, id, inputs, pass_id);
            let resolution = match (&inputs.derive_error, &verdict) {
                (Some(_), _) => Resolution {
                    state: DisplayState::Error,
                    signal: Some(Signal::Error),
                    stale: false,
                    age_hours: None,
                },
                (None, v) => display_state::resolve(
                    id,
                    inputs.current.as_ref(),
                    v.as_ref().map(|v| v.signal),
                    now,
                    &self.config.freshness,
                ),
            };

            if let (Some(obs), Some(v)) = (&inputs.current, &verdict) {
                if id.is_derived() {
                    let mut row = obs.clone();
                    row.signal = Some(v.signal);
                    row.signal_reason = Some(v.reason.clone());
                    derived_observations.push(row);
                } else {
                    signal_records.push(SignalRecord::new(obs, v));
                }
            }

            let report = self.indicator_report(
                source, metal, id, inputs, verdict.as_ref(), resolution, now, previous,
            );
            if let Some(v) = verdict {
                verdicts.insert(id, v);
            }
            indicators.push(report);
        }

        let posture_inputs: Vec<PostureInput> = indicators
            .iter()
            .map(|r| PostureInput {
                indicator: r.indicator,
                resolution: Resolution {
                    state: r.display_state,
                    signal: r.signal,
                    stale: r.stale,
                    age_hours: r.age_hours,
                },
            })
            .collect();
        let posture = posture::synthesize(&posture_inputs, &self.config.posture);

        let calendar = self.config.calendar();
        let pair = |id: IndicatorId| {
            let s = series.get(&id);
            PeriodPair::new(
                s.and_then(|s| s.current.as_ref()),
                s.and_then(|s| s.previous.as_ref()),
            )
        };
        let slam_risk = slam_risk::evaluate(
            &SlamRiskInputs {
                metal,
                today: now.date_naive(),
                commercial: pair(IndicatorId::CommercialPositioning),
                margin: pair(IndicatorId::MarginLevel),
                margin_signal: verdicts.get(&IndicatorId::MarginLevel).map(|v| v.signal),
                roll: pair(IndicatorId::RollPattern),
                spread: pair(IndicatorId::Backwardation),
                calendar: &calendar,
            },
            &self.config.slam_risk,
        );

        info!(
            %pass_id,
            metal = %metal,
            posture = %posture.posture,
            available = posture.available_count,
            slam_active = slam_risk.active_count,
            slam_elevated = slam_risk.elevated,
            "evaluation pass complete"
        );

        EvaluationReport {
            pass_id,
            metal,
            evaluated_at: now,
            indicators,
            signal_records,
            derived_observations,
            posture,
            slam_risk,
        }
    }

    /// Verdict for one series, or `None` when there is nothing to score.
    /// Contract violations are isolated to this indicator.
    fn score_series(
        &self,
        metal: Metal,
        id: IndicatorId,
        inputs: &SeriesInputs,
        pass_id: Uuid,
    ) -> Option<Verdict> {
        if let Some(e) = &inputs.derive_error {
            warn!(%pass_id, metal = %metal, indicator = %id, error = %e, "derivation failed");
            return Some(Verdict::error(e.to_string(), "derivation_failed"));
        }
        let current = inputs.current.as_ref()?;
        let ctx = ScoreContext {
            metal,
            current,
            prior: inputs.prior.as_ref(),
            history: &inputs.history,
            settings: &self.config.scoring,
        };
        match scoring::score(&ctx) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    %pass_id,
                    metal = %metal,
                    indicator = %id,
                    observation_id = current.id,
                    error = %e,
                    "scorer rejected observation"
                );
                Some(Verdict::error(e.to_string(), "contract_violation"))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn indicator_report<S: ObservationSource + ?Sized>(
        &self,
        source: &S,
        metal: Metal,
        id: IndicatorId,
        inputs: &SeriesInputs,
        verdict: Option<&Verdict>,
        resolution: Resolution,
        now: DateTime<Utc>,
        previous: Option<&EvaluationReport>,
    ) -> IndicatorReport {
        let current = inputs.current.as_ref();
        let reason = match verdict {
            Some(v) => v.reason.clone(),
            None if id.is_derived() => format!(
                "awaiting upstream {}",
                id.upstream()
                    .iter()
                    .map(|u| u.slug())
                    .collect::<Vec<_>>()
                    .join(" and ")
            ),
            None => format!("awaiting first {} observation", id.slug()),
        };
        let signal_changed = match (
            previous.and_then(|p| p.indicator(id)).and_then(|r| r.signal),
            resolution.signal,
        ) {
            (Some(before), Some(after)) => before != after,
            _ => false,
        };
        let history = source.last_days(
            SeriesKey::new(metal, id),
            now.date_naive(),
            self.config.scoring.narration_days,
        );

        IndicatorReport {
            indicator: id,
            id: id.id(),
            name: id.name(),
            display_state: resolution.state,
            stale: resolution.stale,
            signal: resolution.signal,
            reason,
            rule: verdict.map(|v| v.rule),
            observation_id: current.map(|o| o.id).filter(|id| *id != 0),
            computed_value: current.and_then(|o| o.computed_value).filter(|v| v.is_finite()),
            data_date: current.map(|o| o.data_date),
            fetched_at: current.map(|o| o.fetched_at),
            age_hours: resolution.age_hours,
            trend: current.map_or(Trend::FLAT, |c| trend(c, inputs.prior.as_ref())),
            signal_changed,
            history_values: success_values(&history),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Direction;
    use crate::observation::{
        MarginRaw, ObservationStore, PositioningRaw, PremiumRaw, RangeRaw, RatioRaw, RawPayload,
        RollRaw, SpreadRaw, VaultRaw,
    };
    use crate::types::{FetchStatus, Posture};
    use chrono::{Duration, TimeZone};

    /// Monday, outside silver's delivery months.
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 20, 0, 0).unwrap()
    }

    fn at(indicator: IndicatorId, date: NaiveDate, raw: RawPayload) -> Observation {
        Observation::from_payload(Metal::Silver, indicator, date, Observation::end_of_day(date), raw)
    }

    fn positioning(indicator: IndicatorId, date: NaiveDate, net: f64) -> Observation {
        let (long, short) = match indicator {
            IndicatorId::CommercialPositioning => (50_000.0, 50_000.0 + net),
            _ => (50_000.0 + net, 50_000.0),
        };
        at(
            indicator,
            date,
            RawPayload::Positioning(PositioningRaw {
                long_contracts: long,
                short_contracts: short,
                open_interest: 160_000.0,
            }),
        )
    }

    fn margin(date: NaiveDate, pct: f64) -> Observation {
        at(
            IndicatorId::MarginLevel,
            date,
            RawPayload::Margin(MarginRaw {
                initial_margin_usd: pct * 1_500.0,
                contract_notional_usd: 150_000.0,
            }),
        )
    }

    fn roll(date: NaiveDate, front: f64, total: f64) -> Observation {
        at(
            IndicatorId::RollPattern,
            date,
            RawPayload::Roll(RollRaw {
                front_month_oi: front,
                total_oi: total,
                days_to_first_notice: 30,
            }),
        )
    }

    fn vault(date: NaiveDate, registered: f64) -> Observation {
        at(
            IndicatorId::VaultInventory,
            date,
            RawPayload::Vault(VaultRaw {
                registered_oz: registered,
                eligible_oz: 50_000_000.0,
            }),
        )
    }

    fn spread(date: NaiveDate, futures: f64) -> Observation {
        at(
            IndicatorId::Backwardation,
            date,
            RawPayload::Spread(SpreadRaw {
                spot_usd: 30.0,
                futures_usd: futures,
                days_to_expiry: 73,
            }),
        )
    }

    /// A calm silver market: every scored indicator GREEN, delivery activity
    /// out of season.
    fn calm_market() -> ObservationStore {
        let store = ObservationStore::new();
        let d = today();
        let week_ago = d - Duration::days(7);

        for id in [IndicatorId::SpeculatorPositioning, IndicatorId::CommercialPositioning] {
            for i in 0..30 {
                let date = d - Duration::days(7 * (30 - i));
                store.append(positioning(id, date, 10_000.0 + 1_000.0 * i as f64));
            }
            store.append(positioning(id, d, 20_000.0));
        }

        store.append(vault(week_ago, 50_000_000.0));
        store.append(vault(d, 50_000_000.0));
        store.append(at(
            IndicatorId::DeliveryActivity,
            d,
            RawPayload::Delivery(crate::observation::DeliveryRaw {
                contracts_stopped: 12.0,
                registered_oz: 50_000_000.0,
            }),
        ));
        store.append(margin(week_ago, 8.0));
        store.append(margin(d, 8.0));
        store.append(spread(week_ago, 30.18));
        store.append(spread(d, 30.18));
        store.append(roll(week_ago, 2_000.0, 150_000.0));
        store.append(roll(d, 2_000.0, 150_000.0));
        store.append(at(
            IndicatorId::ShanghaiPremium,
            d,
            RawPayload::Premium(PremiumRaw {
                shanghai_usd_oz: 40.4,
                western_usd_oz: 40.0,
            }),
        ));
        store.append(at(
            IndicatorId::GoldSilverRatio,
            week_ago,
            RawPayload::Ratio(RatioRaw {
                gold_usd: 2_550.0,
                silver_usd: 30.0,
            }),
        ));
        store.append(at(
            IndicatorId::GoldSilverRatio,
            d,
            RawPayload::Ratio(RatioRaw {
                gold_usd: 2_550.0,
                silver_usd: 30.0,
            }),
        ));
        store.append(at(
            IndicatorId::VolatilityRange,
            d,
            RawPayload::Range(RangeRaw {
                high_usd: 30.15,
                low_usd: 29.85,
                close_usd: 30.0,
            }),
        ));
        store
    }

    fn run(store: &ObservationStore, previous: Option<&EvaluationReport>) -> EvaluationReport {
        let config = EngineConfig::default();
        Evaluator::new(&config).evaluate(store, Metal::Silver, now(), previous)
    }

    #[test]
    fn calm_market_is_a_buy() {
        let report = run(&calm_market(), None);
        assert_eq!(report.indicators.len(), 12);

        let delivery = report.indicator(IndicatorId::DeliveryActivity).unwrap();
        assert_eq!(delivery.display_state, DisplayState::NotApplicable);

        for r in report.indicators.iter().filter(|r| r.indicator != IndicatorId::DeliveryActivity) {
            assert_eq!(r.display_state, DisplayState::Success, "{}: {}", r.indicator, r.reason);
            assert_eq!(r.signal, Some(Signal::Green), "{}: {}", r.indicator, r.reason);
        }
        assert_eq!(report.posture.posture, Posture::Buy);
        assert_eq!(report.posture.available_count, 11);
        assert_eq!(report.posture.total_count, 12);
        assert!(!report.slam_risk.elevated);
    }

    #[test]
    fn derived_indicators_are_built_from_upstream() {
        let report = run(&calm_market(), None);
        assert_eq!(report.derived_observations.len(), 2);

        let pressure = report.indicator(IndicatorId::DeliveryPressure).unwrap();
        // 2,000 x 5,000 / 50,000,000
        assert!((pressure.computed_value.unwrap() - 0.2).abs() < 1e-9);
        assert!(pressure.observation_id.is_none());

        let lease = report.indicator(IndicatorId::LeaseRate).unwrap();
        assert!((lease.computed_value.unwrap() - 1.5).abs() < 1e-6);
        assert!(report
            .derived_observations
            .iter()
            .all(|o| o.signal == Some(Signal::Green)));

        // Fetched series produce signal records, derived ones do not.
        assert_eq!(report.signal_records.len(), 10);
    }

    #[test]
    fn margin_hike_overrides_to_sell() {
        let store = calm_market();
        store.append(margin(today(), 9.0)); // +12.5% vs a week ago
        let report = run(&store, None);
        let m = report.indicator(IndicatorId::MarginLevel).unwrap();
        assert_eq!(m.signal, Some(Signal::Red));
        assert_eq!(m.rule, Some("hike"));
        assert_eq!(m.trend.direction, Direction::Up);
        assert_eq!(report.posture.posture, Posture::Sell);
        assert_eq!(report.posture.override_indicator, Some(IndicatorId::MarginLevel));
        assert!(report.slam_risk.items[1].active);
    }

    #[test]
    fn one_bad_indicator_does_not_stop_the_others() {
        let store = calm_market();
        let mut bad = at(
            IndicatorId::GoldSilverRatio,
            today(),
            RawPayload::Ratio(RatioRaw {
                gold_usd: 2_550.0,
                silver_usd: 30.0,
            }),
        );
        bad.computed_value = Some(f64::NAN);
        store.append(bad);
        store.append(Observation::failed(
            Metal::Silver,
            IndicatorId::ShanghaiPremium,
            today(),
            Observation::end_of_day(today()),
            FetchStatus::Timeout,
        ));

        let report = run(&store, None);
        let ratio = report.indicator(IndicatorId::GoldSilverRatio).unwrap();
        assert_eq!(ratio.display_state, DisplayState::Error);
        assert_eq!(ratio.rule, Some("contract_violation"));
        assert!(ratio.reason.contains("non-finite"), "{}", ratio.reason);

        let premium = report.indicator(IndicatorId::ShanghaiPremium).unwrap();
        assert_eq!(premium.display_state, DisplayState::Error);
        assert!(premium.reason.contains("timeout"));

        let green = report
            .indicators
            .iter()
            .filter(|r| r.signal == Some(Signal::Green) && r.display_state == DisplayState::Success)
            .count();
        assert_eq!(green, 9);
        assert_eq!(report.posture.available_count, 9);
        assert_eq!(report.posture.posture, Posture::Buy);
    }

    #[test]
    fn failed_upstream_errors_the_derived_indicator() {
        let store = calm_market();
        store.append(Observation::failed(
            Metal::Silver,
            IndicatorId::VaultInventory,
            today(),
            Observation::end_of_day(today()),
            FetchStatus::ParseError,
        ));
        let report = run(&store, None);
        let pressure = report.indicator(IndicatorId::DeliveryPressure).unwrap();
        assert_eq!(pressure.display_state, DisplayState::Error);
        assert_eq!(pressure.signal, Some(Signal::Error));
        assert!(pressure.reason.contains("vault_inventory"), "{}", pressure.reason);
    }

    #[test]
    fn empty_store_awaits_everything() {
        let report = run(&ObservationStore::new(), None);
        assert!(report
            .indicators
            .iter()
            .all(|r| r.display_state == DisplayState::Awaiting && !r.reason.is_empty()));
        assert_eq!(report.posture.posture, Posture::InsufficientData);
        assert_eq!(report.posture.available_count, 0);
        let lease = report.indicator(IndicatorId::LeaseRate).unwrap();
        assert_eq!(lease.reason, "awaiting upstream backwardation");
    }

    #[test]
    fn stale_readings_drop_out_of_the_tally() {
        let store = calm_market();
        let config = EngineConfig::default();
        let later = now() + Duration::hours(60);
        let report = Evaluator::new(&config).evaluate(&store, Metal::Silver, later, None);
        let margin = report.indicator(IndicatorId::MarginLevel).unwrap();
        assert_eq!(margin.display_state, DisplayState::Stale);
        assert_eq!(margin.signal, Some(Signal::Green));
        // Weekly positioning is still fresh; nothing else is.
        assert_eq!(report.posture.available_count, 2);
        assert_eq!(report.posture.posture, Posture::InsufficientData);
    }

    #[test]
    fn repeated_passes_are_identical_and_track_changes() {
        let store = calm_market();
        let first = run(&store, None);
        let second = run(&store, Some(&first));
        for (a, b) in first.indicators.iter().zip(&second.indicators) {
            assert_eq!((a.signal, &a.reason), (b.signal, &b.reason));
            assert!(!b.signal_changed);
        }
        assert_ne!(first.pass_id, second.pass_id);

        store.append(margin(today(), 9.0));
        let third = run(&store, Some(&second));
        assert!(third.indicator(IndicatorId::MarginLevel).unwrap().signal_changed);
    }

    #[test]
    fn narration_history_is_passed_through() {
        let report = run(&calm_market(), None);
        let speculator = report.indicator(IndicatorId::SpeculatorPositioning).unwrap();
        // 90 days back covers 12 weekly readings plus today's.
        assert_eq!(speculator.history_values.len(), 13);
        assert_eq!(speculator.history_values.last(), Some(&20_000.0));
        assert!(speculator.reason.contains("20000"));
    }
}
