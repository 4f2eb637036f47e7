// =============================================================================
// Shanghai Premium Scorer: Shanghai price over the western benchmark
// =============================================================================
//
// Scored on the premium as a share of the western price. Premiums escalate
// faster than discounts of the same size: a premium pulls metal east, a
// discount only says Chinese demand is soft.
//
//   1. strong_premium    > +5%     RED
//   2. premium           > +2%     YELLOW
//   3. deep_discount     < -3%     YELLOW
//   4. parity                      GREEN

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::{signed_usd, ScoreContext};

const RED_PREMIUM_PCT: f64 = 5.0;
const YELLOW_PREMIUM_PCT: f64 = 2.0;
const YELLOW_DISCOUNT_PCT: f64 = -3.0;

pub(crate) struct PremiumCtx {
    premium_usd: f64,
    western_usd: f64,
}

impl PremiumCtx {
    fn pct(&self) -> f64 {
        self.premium_usd / self.western_usd * 100.0
    }
}

pub(crate) fn table() -> RuleTable<PremiumCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "strong_premium",
                |c: &PremiumCtx| c.pct() > RED_PREMIUM_PCT,
                |c: &PremiumCtx| {
                    (
                        Signal::Red,
                        format!(
                            "Shanghai premium {}/oz ({:+.2}% over ${:.2} western) is above 5%",
                            signed_usd(c.premium_usd),
                            c.pct(),
                            c.western_usd
                        ),
                    )
                },
            ),
            Rule::new(
                "premium",
                |c: &PremiumCtx| c.pct() > YELLOW_PREMIUM_PCT,
                |c: &PremiumCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "Shanghai premium {}/oz ({:+.2}% over ${:.2} western) is in the 2-5% band",
                            signed_usd(c.premium_usd),
                            c.pct(),
                            c.western_usd
                        ),
                    )
                },
            ),
            Rule::new(
                "deep_discount",
                |c: &PremiumCtx| c.pct() < YELLOW_DISCOUNT_PCT,
                |c: &PremiumCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "Shanghai trades at a {}/oz discount ({:+.2}% vs ${:.2} western)",
                            signed_usd(c.premium_usd),
                            c.pct(),
                            c.western_usd
                        ),
                    )
                },
            ),
        ],
        "parity",
        |c: &PremiumCtx| {
            (
                Signal::Green,
                format!(
                    "Shanghai premium {}/oz ({:+.2}% vs ${:.2} western)",
                    signed_usd(c.premium_usd),
                    c.pct(),
                    c.western_usd
                ),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::ShanghaiPremium)?;
    let premium_usd = ctx.current.require_value()?;
    let western_usd = ctx.current.premium()?.western_usd_oz;
    if western_usd <= 0.0 {
        return Err(ScoreError::InvalidField {
            indicator: IndicatorId::ShanghaiPremium,
            field: "western_usd_oz",
            value: western_usd,
        });
    }

    Ok(table().evaluate(&PremiumCtx {
        premium_usd,
        western_usd,
    }))
}
