// =============================================================================
// Margin Level Scorer: initial margin as % of contract notional
// =============================================================================
//
//   1. hike           >= 10% relative increase vs prior    RED
//   2. punitive       level >= 12%                         RED
//   3. raised         any increase vs prior                YELLOW
//   4. elevated       level >= 9%                          YELLOW
//   5. normal                                              GREEN
//
// Margin is one of the two override indicators: a RED here vetoes any BUY.

use crate::analytics::percent_change;
use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::{signed_pct, ScoreContext};

const HIKE_PCT: f64 = 10.0;
const RED_LEVEL_PCT: f64 = 12.0;
const YELLOW_LEVEL_PCT: f64 = 9.0;
const EPSILON: f64 = 1e-9;

pub(crate) struct MarginCtx {
    level_pct: f64,
    initial_margin_usd: f64,
    prior_pct: Option<f64>,
}

impl MarginCtx {
    fn change_pct(&self) -> Option<f64> {
        self.prior_pct.and_then(|p| percent_change(self.level_pct, p))
    }

    fn increased(&self) -> bool {
        self.prior_pct.map_or(false, |p| self.level_pct - p > EPSILON)
    }
}

pub(crate) fn table() -> RuleTable<MarginCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "hike",
                |c: &MarginCtx| c.change_pct().map_or(false, |p| p >= HIKE_PCT),
                |c: &MarginCtx| {
                    (
                        Signal::Red,
                        format!(
                            "margin hiked {} from {:.2}% to {:.2}% of notional (${:.0} initial)",
                            signed_pct(c.change_pct()),
                            c.prior_pct.unwrap_or_default(),
                            c.level_pct,
                            c.initial_margin_usd
                        ),
                    )
                },
            ),
            Rule::new(
                "punitive",
                |c: &MarginCtx| c.level_pct >= RED_LEVEL_PCT,
                |c: &MarginCtx| {
                    (
                        Signal::Red,
                        format!(
                            "margin {:.2}% of notional (${:.0} initial) is at or above 12%",
                            c.level_pct, c.initial_margin_usd
                        ),
                    )
                },
            ),
            Rule::new(
                "raised",
                |c: &MarginCtx| c.increased(),
                |c: &MarginCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "margin raised {} from {:.2}% to {:.2}% of notional",
                            signed_pct(c.change_pct()),
                            c.prior_pct.unwrap_or_default(),
                            c.level_pct
                        ),
                    )
                },
            ),
            Rule::new(
                "elevated",
                |c: &MarginCtx| c.level_pct >= YELLOW_LEVEL_PCT,
                |c: &MarginCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "margin {:.2}% of notional (${:.0} initial) is in the 9-12% band",
                            c.level_pct, c.initial_margin_usd
                        ),
                    )
                },
            ),
        ],
        "normal",
        |c: &MarginCtx| {
            (
                Signal::Green,
                format!(
                    "margin {:.2}% of notional (${:.0} initial), unchanged or lower",
                    c.level_pct, c.initial_margin_usd
                ),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::MarginLevel)?;
    let level_pct = ctx.current.require_value()?;
    let initial_margin_usd = ctx.current.margin()?.initial_margin_usd;

    Ok(table().evaluate(&MarginCtx {
        level_pct,
        initial_margin_usd,
        prior_pct: ctx.prior_value(),
    }))
}
