// =============================================================================
// Gold/Silver Ratio Scorer
// =============================================================================
//
// A falling ratio means silver outrunning gold, which historically shows up
// late in squeezes.
//
//   1. collapsing   week-over-week change <= -8%    RED
//   2. compressed   ratio < 60                      RED
//   3. narrowing    ratio < 75                      YELLOW
//   4. normal                                       GREEN

use crate::analytics::percent_change;
use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::{signed_pct, ScoreContext};

const COLLAPSE_PCT: f64 = -8.0;
const RED_RATIO: f64 = 60.0;
const YELLOW_RATIO: f64 = 75.0;

pub(crate) struct RatioCtx {
    ratio: f64,
    prior: Option<f64>,
}

impl RatioCtx {
    fn change_pct(&self) -> Option<f64> {
        self.prior.and_then(|p| percent_change(self.ratio, p))
    }
}

pub(crate) fn table() -> RuleTable<RatioCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "collapsing",
                |c: &RatioCtx| c.change_pct().map_or(false, |p| p <= COLLAPSE_PCT),
                |c: &RatioCtx| {
                    (
                        Signal::Red,
                        format!(
                            "gold/silver ratio fell {} week over week, {:.1} -> {:.1}",
                            signed_pct(c.change_pct()),
                            c.prior.unwrap_or_default(),
                            c.ratio
                        ),
                    )
                },
            ),
            Rule::new(
                "compressed",
                |c: &RatioCtx| c.ratio < RED_RATIO,
                |c: &RatioCtx| {
                    (
                        Signal::Red,
                        format!("gold/silver ratio {:.1} is below 60 ({} w/w)", c.ratio, signed_pct(c.change_pct())),
                    )
                },
            ),
            Rule::new(
                "narrowing",
                |c: &RatioCtx| c.ratio < YELLOW_RATIO,
                |c: &RatioCtx| {
                    (
                        Signal::Yellow,
                        format!("gold/silver ratio {:.1} is in the 60-75 band ({} w/w)", c.ratio, signed_pct(c.change_pct())),
                    )
                },
            ),
        ],
        "normal",
        |c: &RatioCtx| {
            (
                Signal::Green,
                format!("gold/silver ratio {:.1} ({} w/w)", c.ratio, signed_pct(c.change_pct())),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::GoldSilverRatio)?;
    let ratio = ctx.current.require_value()?;

    Ok(table().evaluate(&RatioCtx {
        ratio,
        prior: ctx.prior_value(),
    }))
}
