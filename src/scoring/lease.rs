// =============================================================================
// Lease Rate Scorer: implied lease rate proxy (derived from backwardation)
// =============================================================================
//
//   carry = (F / S - 1) * 365 / days * 100
//   lease = risk_free - carry
//
// A rising lease rate means holders demand more to lend metal out.
//
//   1. tight      lease > 5%/yr     RED
//   2. firm       lease > 2%/yr     YELLOW
//   3. normal                       GREEN

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::observation::{LeaseRaw, Observation, RawPayload};
use crate::types::{Metal, Signal};

use super::delivery::{derived_observation, require_upstream};
use super::rules::{Rule, RuleTable, Verdict};
use super::ScoreContext;

const RED_LEASE_PCT: f64 = 5.0;
const YELLOW_LEASE_PCT: f64 = 2.0;

/// Upstream observation the lease-rate proxy is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaseUpstream<'a> {
    pub spread: Option<&'a Observation>,
}

impl<'a> LeaseUpstream<'a> {
    pub fn is_empty(&self) -> bool {
        self.spread.is_none()
    }
}

/// Build a lease-rate observation from a backwardation observation.
pub fn derive_lease_rate(
    metal: Metal,
    upstream: LeaseUpstream<'_>,
    risk_free_pct: f64,
) -> Result<Observation, ScoreError> {
    let indicator = IndicatorId::LeaseRate;
    let spread = require_upstream(indicator, IndicatorId::Backwardation, upstream.spread)?;
    let raw = spread.spread()?;

    if raw.spot_usd <= 0.0 {
        return Err(ScoreError::InvalidField {
            indicator,
            field: "spot_usd",
            value: raw.spot_usd,
        });
    }
    if raw.days_to_expiry == 0 {
        return Err(ScoreError::InvalidField {
            indicator,
            field: "days_to_expiry",
            value: 0.0,
        });
    }

    Ok(derived_observation(
        metal,
        indicator,
        spread,
        &[],
        RawPayload::Lease(LeaseRaw {
            spot_usd: raw.spot_usd,
            futures_usd: raw.futures_usd,
            days_to_expiry: raw.days_to_expiry,
            risk_free_pct,
        }),
    ))
}

pub(crate) struct LeaseCtx {
    lease_pct: f64,
    carry_pct: f64,
    risk_free_pct: f64,
}

pub(crate) fn table() -> RuleTable<LeaseCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "tight",
                |c: &LeaseCtx| c.lease_pct > RED_LEASE_PCT,
                |c: &LeaseCtx| {
                    (
                        Signal::Red,
                        format!(
                            "implied lease rate {:.2}%/yr (risk-free {:.2}% minus carry {:+.2}%) is above 5%",
                            c.lease_pct, c.risk_free_pct, c.carry_pct
                        ),
                    )
                },
            ),
            Rule::new(
                "firm",
                |c: &LeaseCtx| c.lease_pct > YELLOW_LEASE_PCT,
                |c: &LeaseCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "implied lease rate {:.2}%/yr (risk-free {:.2}% minus carry {:+.2}%) is in the 2-5% band",
                            c.lease_pct, c.risk_free_pct, c.carry_pct
                        ),
                    )
                },
            ),
        ],
        "normal",
        |c: &LeaseCtx| {
            (
                Signal::Green,
                format!(
                    "implied lease rate {:.2}%/yr (risk-free {:.2}% minus carry {:+.2}%)",
                    c.lease_pct, c.risk_free_pct, c.carry_pct
                ),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::LeaseRate)?;
    let lease_pct = ctx.current.require_value()?;
    let raw = ctx.current.lease()?;

    Ok(table().evaluate(&LeaseCtx {
        lease_pct,
        carry_pct: raw.risk_free_pct - lease_pct,
        risk_free_pct: raw.risk_free_pct,
    }))
}
