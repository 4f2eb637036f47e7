// =============================================================================
// Delivery Scorers: delivery activity and the derived delivery-pressure ratio
// =============================================================================
//
// Delivery activity only means something inside the metal's delivery months;
// outside them the scorer answers GREEN "not active" and the display-state
// resolver shows the indicator as not applicable.
//
// Delivery pressure is derived: front-month open interest (roll payload)
// converted to ounces, over registered ounces (vault payload). The upstream
// observations are explicit parameters of `derive_delivery_pressure`.

use crate::calendar::in_delivery_window;
use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::observation::{DeliveryPressureRaw, Observation, RawPayload};
use crate::types::{Metal, Provenance, Signal};

use super::rules::{Rule, RuleTable, Verdict};
use super::ScoreContext;

// =============================================================================
// Delivery activity
// =============================================================================

const ACTIVITY_RED_PCT: f64 = 10.0;
const ACTIVITY_YELLOW_PCT: f64 = 5.0;

pub(crate) struct ActivityCtx {
    in_window: bool,
    contracts: f64,
    stopped_oz: f64,
    registered_oz: f64,
    month: String,
}

impl ActivityCtx {
    fn share_pct(&self) -> f64 {
        self.stopped_oz / self.registered_oz * 100.0
    }
}

pub(crate) fn activity_table() -> RuleTable<ActivityCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "not_active",
                |c: &ActivityCtx| !c.in_window,
                |c: &ActivityCtx| {
                    (
                        Signal::Green,
                        format!(
                            "not active: {} is outside the delivery months ({:.0} contracts stopped)",
                            c.month, c.contracts
                        ),
                    )
                },
            ),
            Rule::new(
                "heavy_stops",
                |c: &ActivityCtx| c.share_pct() > ACTIVITY_RED_PCT,
                |c: &ActivityCtx| {
                    (
                        Signal::Red,
                        format!(
                            "{:.0} contracts stopped ({:.0} oz) = {:.1}% of {:.0} oz registered (above 10%)",
                            c.contracts,
                            c.stopped_oz,
                            c.share_pct(),
                            c.registered_oz
                        ),
                    )
                },
            ),
            Rule::new(
                "elevated_stops",
                |c: &ActivityCtx| c.share_pct() > ACTIVITY_YELLOW_PCT,
                |c: &ActivityCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "{:.0} contracts stopped ({:.0} oz) = {:.1}% of {:.0} oz registered (5-10%)",
                            c.contracts,
                            c.stopped_oz,
                            c.share_pct(),
                            c.registered_oz
                        ),
                    )
                },
            ),
        ],
        "normal_stops",
        |c: &ActivityCtx| {
            (
                Signal::Green,
                format!(
                    "{:.0} contracts stopped ({:.0} oz) = {:.1}% of {:.0} oz registered",
                    c.contracts,
                    c.stopped_oz,
                    c.share_pct(),
                    c.registered_oz
                ),
            )
        },
    )
}

pub fn score_activity(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::DeliveryActivity)?;
    let contracts = ctx.current.require_value()?;
    let raw = ctx.current.delivery()?;
    let date = ctx.current.data_date;
    let in_window = in_delivery_window(ctx.metal, date);

    if in_window && raw.registered_oz <= 0.0 {
        return Err(ScoreError::InvalidField {
            indicator: IndicatorId::DeliveryActivity,
            field: "registered_oz",
            value: raw.registered_oz,
        });
    }

    Ok(activity_table().evaluate(&ActivityCtx {
        in_window,
        contracts,
        stopped_oz: contracts * ctx.metal.contract_size_oz(),
        registered_oz: raw.registered_oz,
        month: date.format("%B").to_string(),
    }))
}

// =============================================================================
// Delivery pressure (derived)
// =============================================================================

const PRESSURE_RED_RATIO: f64 = 1.0;
const PRESSURE_RISE_RED: f64 = 0.25;
const PRESSURE_YELLOW_RATIO: f64 = 0.5;

/// Upstream observations the delivery-pressure ratio is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryPressureUpstream<'a> {
    pub roll: Option<&'a Observation>,
    pub vault: Option<&'a Observation>,
}

impl<'a> DeliveryPressureUpstream<'a> {
    pub fn is_empty(&self) -> bool {
        self.roll.is_none() && self.vault.is_none()
    }
}

/// Check that an upstream observation exists and is usable.
pub(crate) fn require_upstream<'a>(
    indicator: IndicatorId,
    upstream: IndicatorId,
    obs: Option<&'a Observation>,
) -> Result<&'a Observation, ScoreError> {
    let obs = obs.ok_or(ScoreError::MissingUpstream { indicator, upstream })?;
    if !obs.is_success() {
        return Err(ScoreError::FailedUpstream {
            indicator,
            upstream,
            status: obs.fetch_status,
            data_date: obs.data_date,
        });
    }
    obs.require_value()?;
    Ok(obs)
}

/// Derived observation that takes the oldest date and timestamp of its
/// inputs, and is a fallback if any input is.
pub(crate) fn derived_observation(
    metal: Metal,
    indicator: IndicatorId,
    first: &Observation,
    rest: &[&Observation],
    raw: RawPayload,
) -> Observation {
    let data_date = rest.iter().map(|o| o.data_date).fold(first.data_date, Ord::min);
    let fetched_at = rest.iter().map(|o| o.fetched_at).fold(first.fetched_at, Ord::min);
    let mut obs = Observation::from_payload(metal, indicator, data_date, fetched_at, raw);
    let tainted = std::iter::once(first)
        .chain(rest.iter().copied())
        .any(|o| o.provenance == Provenance::Fallback);
    if tainted {
        obs.provenance = Provenance::Fallback;
    }
    obs
}

/// Build a delivery-pressure observation from roll and vault observations.
pub fn derive_delivery_pressure(
    metal: Metal,
    upstream: DeliveryPressureUpstream<'_>,
) -> Result<Observation, ScoreError> {
    let indicator = IndicatorId::DeliveryPressure;
    let roll = require_upstream(indicator, IndicatorId::RollPattern, upstream.roll)?;
    let vault = require_upstream(indicator, IndicatorId::VaultInventory, upstream.vault)?;

    let front_month_oi = roll.roll()?.front_month_oi;
    let registered_oz = vault.vault()?.registered_oz;
    if registered_oz <= 0.0 {
        return Err(ScoreError::InvalidField {
            indicator,
            field: "registered_oz",
            value: registered_oz,
        });
    }

    Ok(derived_observation(
        metal,
        indicator,
        roll,
        &[vault],
        RawPayload::DeliveryPressure(DeliveryPressureRaw {
            front_month_oi,
            contract_size_oz: metal.contract_size_oz(),
            registered_oz,
        }),
    ))
}

pub(crate) struct PressureCtx {
    ratio: f64,
    oi_oz: f64,
    registered_oz: f64,
    prior_ratio: Option<f64>,
}

impl PressureCtx {
    fn rise(&self) -> Option<f64> {
        self.prior_ratio.map(|p| self.ratio - p)
    }
}

pub(crate) fn pressure_table() -> RuleTable<PressureCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "oversubscribed",
                |c: &PressureCtx| c.ratio > PRESSURE_RED_RATIO,
                |c: &PressureCtx| {
                    (
                        Signal::Red,
                        format!(
                            "front-month OI of {:.0} oz exceeds {:.0} oz registered (ratio {:.2} > 1.00)",
                            c.oi_oz, c.registered_oz, c.ratio
                        ),
                    )
                },
            ),
            Rule::new(
                "rising_fast",
                |c: &PressureCtx| c.rise().map_or(false, |r| r >= PRESSURE_RISE_RED),
                |c: &PressureCtx| {
                    (
                        Signal::Red,
                        format!(
                            "delivery ratio rose {:+.2} week over week to {:.2} ({:.0} oz OI vs {:.0} oz registered)",
                            c.rise().unwrap_or_default(),
                            c.ratio,
                            c.oi_oz,
                            c.registered_oz
                        ),
                    )
                },
            ),
            Rule::new(
                "elevated",
                |c: &PressureCtx| c.ratio > PRESSURE_YELLOW_RATIO,
                |c: &PressureCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "front-month OI of {:.0} oz is {:.2}x the {:.0} oz registered (above 0.50)",
                            c.oi_oz, c.ratio, c.registered_oz
                        ),
                    )
                },
            ),
        ],
        "covered",
        |c: &PressureCtx| {
            (
                Signal::Green,
                format!(
                    "front-month OI of {:.0} oz is {:.2}x the {:.0} oz registered",
                    c.oi_oz, c.ratio, c.registered_oz
                ),
            )
        },
    )
}

pub fn score_pressure(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::DeliveryPressure)?;
    let ratio = ctx.current.require_value()?;
    let raw = ctx.current.delivery_pressure()?;

    Ok(pressure_table().evaluate(&PressureCtx {
        ratio,
        oi_oz: raw.front_month_oi * raw.contract_size_oz,
        registered_oz: raw.registered_oz,
        prior_ratio: ctx.prior_value(),
    }))
}
