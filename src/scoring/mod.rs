// =============================================================================
// Per-Indicator Scorers
// =============================================================================
//
// Each scorer maps (current observation, optional prior-week observation,
// baseline history) to a traffic-light verdict whose reason carries the
// numbers that justified it. Scorers are pure and independent; derived
// indicators are built from explicit upstream observations by `derive_*`
// functions before they are scored.
//
// Groups:
//   positioning   speculator net long, commercial net short (percentile)
//   inventory     registered vault ratio (bands + drawdown)
//   delivery      delivery activity (calendar-aware), delivery pressure (derived)
//   margin        initial margin level (bands + hike)
//   spread        futures/spot backwardation
//   roll          front-month roll progress
//   lease         lease-rate proxy (derived)
//   premium       Shanghai premium
//   ratio         gold/silver ratio
//   volatility    daily range proxy

pub mod delivery;
pub mod inventory;
pub mod lease;
pub mod margin;
pub mod positioning;
pub mod premium;
pub mod ratio;
pub mod roll;
pub mod rules;
pub mod spread;
pub mod volatility;

pub use delivery::{derive_delivery_pressure, DeliveryPressureUpstream};
pub use lease::{derive_lease_rate, LeaseUpstream};
pub use rules::{Decision, Outcome, Rule, RuleTable, Verdict};

use serde::Serialize;
use tracing::debug;

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::observation::Observation;
use crate::runtime_config::ScoringSettings;
use crate::types::{Metal, Provenance, Signal};

// =============================================================================
// Inputs / outputs
// =============================================================================

/// Everything a scorer may read. History is read-only and never required.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub metal: Metal,
    pub current: &'a Observation,
    /// Observation about one week before `current`, if any.
    pub prior: Option<&'a Observation>,
    /// Baseline history of the same series, any order.
    pub history: &'a [Observation],
    pub settings: &'a ScoringSettings,
}

impl<'a> ScoreContext<'a> {
    /// Successful baseline values strictly before the current data date.
    pub fn baseline_values(&self) -> Vec<f64> {
        self.history
            .iter()
            .filter(|o| o.data_date < self.current.data_date)
            .filter_map(Observation::value)
            .collect()
    }

    /// Baseline values no older than `days` before the current data date.
    pub fn recent_baseline_values(&self, days: i64) -> Vec<f64> {
        let from = self.current.data_date - chrono::Duration::days(days);
        self.history
            .iter()
            .filter(|o| o.data_date >= from && o.data_date < self.current.data_date)
            .filter_map(Observation::value)
            .collect()
    }

    /// Prior-week computed value, when the prior is a usable reading.
    pub fn prior_value(&self) -> Option<f64> {
        self.prior.and_then(Observation::value)
    }

    fn ensure(&self, expected: IndicatorId) -> Result<(), ScoreError> {
        if self.current.indicator != expected {
            return Err(ScoreError::WrongScorer {
                indicator: self.current.indicator,
                observation_id: self.current.id,
                scorer: expected,
            });
        }
        Ok(())
    }
}

/// `{signal, signal_reason}` destined for persistence next to the row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub observation_id: u64,
    pub metal: Metal,
    pub indicator: IndicatorId,
    pub signal: Signal,
    pub signal_reason: String,
}

impl SignalRecord {
    pub fn new(obs: &Observation, verdict: &Verdict) -> Self {
        Self {
            observation_id: obs.id,
            metal: obs.metal,
            indicator: obs.indicator,
            signal: verdict.signal,
            signal_reason: verdict.reason.clone(),
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Score one observation with the scorer its indicator names.
///
/// Failed fetches and fallback values short-circuit to ERROR verdicts.
/// Contract violations surface as `Err` and are the caller's to convert.
pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    let current = ctx.current;
    current.validate()?;

    if !current.is_success() {
        return Ok(Verdict::error(
            format!(
                "{} {} fetch {} for {} (fetched {})",
                current.metal,
                current.indicator,
                current.fetch_status,
                current.data_date,
                current.fetched_at.format("%Y-%m-%d %H:%M UTC"),
            ),
            "fetch_failed",
        ));
    }

    if current.provenance == Provenance::Fallback {
        return Ok(Verdict::error(
            format!(
                "{} {} value {} for {} is a fetch-layer fallback, not scored",
                current.metal,
                current.indicator,
                current.require_value()?,
                current.data_date,
            ),
            "fallback_value",
        ));
    }

    let verdict = match current.indicator {
        IndicatorId::SpeculatorPositioning => positioning::score_speculator(ctx),
        IndicatorId::CommercialPositioning => positioning::score_commercial(ctx),
        IndicatorId::VaultInventory => inventory::score(ctx),
        IndicatorId::DeliveryActivity => delivery::score_activity(ctx),
        IndicatorId::DeliveryPressure => delivery::score_pressure(ctx),
        IndicatorId::MarginLevel => margin::score(ctx),
        IndicatorId::Backwardation => spread::score(ctx),
        IndicatorId::RollPattern => roll::score(ctx),
        IndicatorId::LeaseRate => lease::score(ctx),
        IndicatorId::ShanghaiPremium => premium::score(ctx),
        IndicatorId::GoldSilverRatio => ratio::score(ctx),
        IndicatorId::VolatilityRange => volatility::score(ctx),
    }?;

    debug!(
        metal = %current.metal,
        indicator = %current.indicator,
        observation_id = current.id,
        signal = %verdict.signal,
        rule = verdict.rule,
        "indicator scored"
    );

    Ok(verdict)
}

// =============================================================================
// Reason formatting helpers
// =============================================================================

/// "85th", "21st", "12th".
pub(crate) fn ordinal(pct: f64) -> String {
    let n = pct.round().max(0.0) as u64;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// "+$0.22", "-$0.30".
pub(crate) fn signed_usd(v: f64) -> String {
    let sign = if v < 0.0 { "-" } else { "+" };
    format!("{sign}${:.2}", v.abs())
}

/// "+12.5%" or "n/a" when undefined.
pub(crate) fn signed_pct(v: Option<f64>) -> String {
    match v {
        Some(p) => format!("{p:+.1}%"),
        None => "n/a".to_string(),
    }
}
