// =============================================================================
// Roll Pattern Scorer: front-month share of total open interest
// =============================================================================
//
// Longs that intend to stand for delivery stay in the front month as first
// notice approaches. The check only applies once the roll window opens.
//
//   1. window_closed   > 10 days to first notice                GREEN
//   2. late_roll       <= 5 days and front share > 20%          RED
//   3. slow_roll       front share > 35%                        YELLOW
//   4. rolling                                                  GREEN

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::ScoreContext;

const WINDOW_DAYS: u32 = 10;
const LATE_DAYS: u32 = 5;
const LATE_SHARE_PCT: f64 = 20.0;
const SLOW_SHARE_PCT: f64 = 35.0;

pub(crate) struct RollCtx {
    front_share_pct: f64,
    front_month_oi: f64,
    total_oi: f64,
    days_to_first_notice: u32,
}

pub(crate) fn table() -> RuleTable<RollCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "window_closed",
                |c: &RollCtx| c.days_to_first_notice > WINDOW_DAYS,
                |c: &RollCtx| {
                    (
                        Signal::Green,
                        format!(
                            "roll window not open: {} days to first notice (front month {:.1}% of {:.0} OI)",
                            c.days_to_first_notice, c.front_share_pct, c.total_oi
                        ),
                    )
                },
            ),
            Rule::new(
                "late_roll",
                |c: &RollCtx| {
                    c.days_to_first_notice <= LATE_DAYS && c.front_share_pct > LATE_SHARE_PCT
                },
                |c: &RollCtx| {
                    (
                        Signal::Red,
                        format!(
                            "{:.0} contracts ({:.1}% of OI) still in the front month {} days before first notice",
                            c.front_month_oi, c.front_share_pct, c.days_to_first_notice
                        ),
                    )
                },
            ),
            Rule::new(
                "slow_roll",
                |c: &RollCtx| c.front_share_pct > SLOW_SHARE_PCT,
                |c: &RollCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "front month holds {:.1}% of OI ({:.0} contracts) with {} days to first notice",
                            c.front_share_pct, c.front_month_oi, c.days_to_first_notice
                        ),
                    )
                },
            ),
        ],
        "rolling",
        |c: &RollCtx| {
            (
                Signal::Green,
                format!(
                    "front month down to {:.1}% of OI ({:.0} contracts), {} days to first notice",
                    c.front_share_pct, c.front_month_oi, c.days_to_first_notice
                ),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::RollPattern)?;
    let front_share_pct = ctx.current.require_value()?;
    let raw = ctx.current.roll()?;

    Ok(table().evaluate(&RollCtx {
        front_share_pct,
        front_month_oi: raw.front_month_oi,
        total_oi: raw.total_oi,
        days_to_first_notice: raw.days_to_first_notice,
    }))
}
