// =============================================================================
// Vault Inventory Scorer: registered share of exchange stocks
// =============================================================================
//
//   1. thin_registered   ratio < 25%                                RED
//   2. drawdown          registered fell by more than metal alarm    RED
//   3. low_registered    ratio <= 40%                               YELLOW
//   4. healthy                                                      GREEN
//
// The band rules never need a prior; only the drawdown rule reads one.

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::{Metal, Signal};

use super::rules::{Rule, RuleTable, Verdict};
use super::ScoreContext;

const RED_RATIO_PCT: f64 = 25.0;
const YELLOW_RATIO_PCT: f64 = 40.0;

pub(crate) struct InventoryCtx {
    metal: Metal,
    ratio_pct: f64,
    registered_oz: f64,
    /// Ounces that left registered since the prior week (positive = outflow).
    drawdown_oz: Option<f64>,
}

impl InventoryCtx {
    fn alarm_oz(&self) -> f64 {
        self.metal.registered_drawdown_alarm_oz()
    }
}

pub(crate) fn table() -> RuleTable<InventoryCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "thin_registered",
                |c: &InventoryCtx| c.ratio_pct < RED_RATIO_PCT,
                |c: &InventoryCtx| {
                    (
                        Signal::Red,
                        format!(
                            "registered ratio {:.1}% ({:.0} oz registered) is below 25%",
                            c.ratio_pct, c.registered_oz
                        ),
                    )
                },
            ),
            Rule::new(
                "drawdown",
                |c: &InventoryCtx| c.drawdown_oz.map_or(false, |d| d > c.alarm_oz()),
                |c: &InventoryCtx| {
                    (
                        Signal::Red,
                        format!(
                            "registered fell {:.0} oz week over week (alarm {:.0} oz) to {:.0} oz, ratio {:.1}%",
                            c.drawdown_oz.unwrap_or_default(),
                            c.alarm_oz(),
                            c.registered_oz,
                            c.ratio_pct
                        ),
                    )
                },
            ),
            Rule::new(
                "low_registered",
                |c: &InventoryCtx| c.ratio_pct <= YELLOW_RATIO_PCT,
                |c: &InventoryCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "registered ratio {:.1}% ({:.0} oz registered) is in the 25-40% band",
                            c.ratio_pct, c.registered_oz
                        ),
                    )
                },
            ),
        ],
        "healthy",
        |c: &InventoryCtx| {
            (
                Signal::Green,
                format!(
                    "registered ratio {:.1}% ({:.0} oz registered) is above 40%",
                    c.ratio_pct, c.registered_oz
                ),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::VaultInventory)?;
    let ratio_pct = ctx.current.require_value()?;
    let registered_oz = ctx.current.vault()?.registered_oz;
    let prior_registered = ctx
        .prior
        .filter(|p| p.value().is_some())
        .and_then(|p| p.vault().ok())
        .map(|v| v.registered_oz);

    Ok(table().evaluate(&InventoryCtx {
        metal: ctx.metal,
        ratio_pct,
        registered_oz,
        drawdown_oz: prior_registered.map(|p| p - registered_oz),
    }))
}
