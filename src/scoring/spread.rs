// =============================================================================
// Backwardation Scorer: front futures minus spot
// =============================================================================
//
// Contango (futures over spot) is the normal carry market. Backwardation means
// physical metal is worth more now than later.
//
//   1. deep_backwardation   spread <= -0.5% of spot    RED
//   2. backwardation        spread < 0                 YELLOW
//   3. contango                                        GREEN

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::{signed_usd, ScoreContext};

const DEEP_BACKWARDATION_PCT: f64 = -0.5;

pub(crate) struct SpreadCtx {
    spread_usd: f64,
    spot_usd: f64,
    days_to_expiry: u32,
}

impl SpreadCtx {
    fn spread_pct(&self) -> f64 {
        self.spread_usd / self.spot_usd * 100.0
    }
}

pub(crate) fn table() -> RuleTable<SpreadCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "deep_backwardation",
                |c: &SpreadCtx| c.spread_pct() <= DEEP_BACKWARDATION_PCT,
                |c: &SpreadCtx| {
                    (
                        Signal::Red,
                        format!(
                            "futures {} vs spot ${:.2} ({:+.2}% of spot, {} days to expiry): deep backwardation",
                            signed_usd(c.spread_usd),
                            c.spot_usd,
                            c.spread_pct(),
                            c.days_to_expiry
                        ),
                    )
                },
            ),
            Rule::new(
                "backwardation",
                |c: &SpreadCtx| c.spread_usd < 0.0,
                |c: &SpreadCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "futures {} vs spot ${:.2} ({:+.2}% of spot): mild backwardation",
                            signed_usd(c.spread_usd),
                            c.spot_usd,
                            c.spread_pct()
                        ),
                    )
                },
            ),
        ],
        "contango",
        |c: &SpreadCtx| {
            (
                Signal::Green,
                format!(
                    "futures {} vs spot ${:.2} ({:+.2}% of spot): normal contango",
                    signed_usd(c.spread_usd),
                    c.spot_usd,
                    c.spread_pct()
                ),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::Backwardation)?;
    let spread_usd = ctx.current.require_value()?;
    let raw = ctx.current.spread()?;
    if raw.spot_usd <= 0.0 {
        return Err(ScoreError::InvalidField {
            indicator: IndicatorId::Backwardation,
            field: "spot_usd",
            value: raw.spot_usd,
        });
    }

    Ok(table().evaluate(&SpreadCtx {
        spread_usd,
        spot_usd: raw.spot_usd,
        days_to_expiry: raw.days_to_expiry,
    }))
}
