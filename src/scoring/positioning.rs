// =============================================================================
// Positioning Scorers: speculator net long and commercial net short
// =============================================================================
//
// Both series are scored the same way: an increase in the computed value is
// the adverse move (speculators piling in, commercials building shorts).
//
//   1. crowded        percentile > 80                          RED
//   2. surge          week-over-week rise > 20% or > 10k lots  RED
//   3. insufficient   baseline below minimum size              YELLOW
//   4. elevated       percentile >= 60                         YELLOW
//   5. washed_out     percentile < 20                          GREEN
//   6. normal                                                  GREEN

use crate::analytics::{percent_change, PercentileBaseline};
use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::{ordinal, signed_pct, ScoreContext};

const CROWDED_PCT: f64 = 80.0;
const ELEVATED_PCT: f64 = 60.0;
const WASHED_OUT_PCT: f64 = 20.0;
const SURGE_PCT: f64 = 20.0;
const SURGE_CONTRACTS: f64 = 10_000.0;

pub(crate) struct PositioningCtx {
    label: &'static str,
    value: f64,
    percentile: Option<f64>,
    baseline_len: usize,
    min_history: usize,
    /// Contracts added since the prior week.
    change: Option<f64>,
    change_pct: Option<f64>,
}

impl PositioningCtx {
    fn is_surge(&self) -> bool {
        match self.change {
            Some(delta) if delta > 0.0 => {
                delta > SURGE_CONTRACTS || self.change_pct.map_or(false, |p| p > SURGE_PCT)
            }
            _ => false,
        }
    }

    fn pct(&self) -> f64 {
        self.percentile.unwrap_or(f64::NAN)
    }

    fn pct_at_least(&self, floor: f64) -> bool {
        self.percentile.map_or(false, |p| p >= floor)
    }
}

pub(crate) fn table() -> RuleTable<PositioningCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "crowded",
                |c: &PositioningCtx| c.percentile.map_or(false, |p| p > CROWDED_PCT),
                |c: &PositioningCtx| {
                    (
                        Signal::Red,
                        format!(
                            "{} of {:.0} contracts sits at the {} percentile of {} readings (above 80th)",
                            c.label,
                            c.value,
                            ordinal(c.pct()),
                            c.baseline_len
                        ),
                    )
                },
            ),
            Rule::new(
                "surge",
                |c: &PositioningCtx| c.is_surge(),
                |c: &PositioningCtx| {
                    (
                        Signal::Red,
                        format!(
                            "{} jumped {:+.0} contracts ({}) week over week to {:.0}",
                            c.label,
                            c.change.unwrap_or_default(),
                            signed_pct(c.change_pct),
                            c.value
                        ),
                    )
                },
            ),
            Rule::new(
                "insufficient_history",
                |c: &PositioningCtx| c.percentile.is_none(),
                |c: &PositioningCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "{} of {:.0} contracts: insufficient history ({} of {} readings), using absolute thresholds",
                            c.label, c.value, c.baseline_len, c.min_history
                        ),
                    )
                },
            ),
            Rule::new(
                "elevated",
                |c: &PositioningCtx| c.pct_at_least(ELEVATED_PCT),
                |c: &PositioningCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "{} of {:.0} contracts sits at the {} percentile (60th-80th band)",
                            c.label,
                            c.value,
                            ordinal(c.pct())
                        ),
                    )
                },
            ),
            Rule::new(
                "washed_out",
                |c: &PositioningCtx| c.percentile.map_or(false, |p| p < WASHED_OUT_PCT),
                |c: &PositioningCtx| {
                    (
                        Signal::Green,
                        format!(
                            "{} of {:.0} contracts is washed out at the {} percentile",
                            c.label,
                            c.value,
                            ordinal(c.pct())
                        ),
                    )
                },
            ),
        ],
        "normal",
        |c: &PositioningCtx| {
            (
                Signal::Green,
                format!(
                    "{} of {:.0} contracts sits at the {} percentile",
                    c.label,
                    c.value,
                    ordinal(c.pct())
                ),
            )
        },
    )
}

fn build(ctx: &ScoreContext<'_>, label: &'static str) -> Result<PositioningCtx, ScoreError> {
    let value = ctx.current.require_value()?;
    let baseline = PercentileBaseline::new(&ctx.baseline_values(), ctx.settings.min_percentile_history);
    let prior = ctx.prior_value();
    Ok(PositioningCtx {
        label,
        value,
        percentile: baseline.rank(value),
        baseline_len: baseline.len(),
        min_history: ctx.settings.min_percentile_history,
        change: prior.map(|p| value - p),
        change_pct: prior.and_then(|p| percent_change(value, p)),
    })
}

pub fn score_speculator(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::SpeculatorPositioning)?;
    Ok(table().evaluate(&build(ctx, "managed-money net long")?))
}

pub fn score_commercial(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::CommercialPositioning)?;
    Ok(table().evaluate(&build(ctx, "commercial net short")?))
}
