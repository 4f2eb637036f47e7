// =============================================================================
// Observation: one measurement of one indicator at one point in time
// =============================================================================
//
// Observations are immutable once written. The `raw` payload is kept for audit
// and reprocessing; scorers read only the fields they need from it through
// the typed accessors below. `computed_value` is the single scalar every
// scoring rule operates on.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::{FetchStatus, Metal, Provenance, Signal};

// =============================================================================
// Raw payloads
// =============================================================================

/// Weekly Commitments of Traders positioning for one trader category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositioningRaw {
    pub long_contracts: f64,
    pub short_contracts: f64,
    #[serde(default)]
    pub open_interest: f64,
}

/// Exchange-approved vault stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultRaw {
    pub registered_oz: f64,
    pub eligible_oz: f64,
}

/// Daily delivery notices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRaw {
    pub contracts_stopped: f64,
    pub registered_oz: f64,
}

/// Inputs of the derived first-notice ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPressureRaw {
    pub front_month_oi: f64,
    pub contract_size_oz: f64,
    pub registered_oz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginRaw {
    pub initial_margin_usd: f64,
    pub contract_notional_usd: f64,
}

/// Front-month futures against spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadRaw {
    pub spot_usd: f64,
    pub futures_usd: f64,
    pub days_to_expiry: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollRaw {
    pub front_month_oi: f64,
    pub total_oi: f64,
    pub days_to_first_notice: u32,
}

/// Inputs of the derived lease-rate proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRaw {
    pub spot_usd: f64,
    pub futures_usd: f64,
    pub days_to_expiry: u32,
    pub risk_free_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumRaw {
    pub shanghai_usd_oz: f64,
    pub western_usd_oz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRaw {
    pub gold_usd: f64,
    pub silver_usd: f64,
}

/// Daily high/low/close used by the range proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRaw {
    pub high_usd: f64,
    pub low_usd: f64,
    pub close_usd: f64,
}

/// Indicator-specific structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawPayload {
    Positioning(PositioningRaw),
    Vault(VaultRaw),
    Delivery(DeliveryRaw),
    DeliveryPressure(DeliveryPressureRaw),
    Margin(MarginRaw),
    Spread(SpreadRaw),
    Roll(RollRaw),
    Lease(LeaseRaw),
    Premium(PremiumRaw),
    Ratio(RatioRaw),
    Range(RangeRaw),
    /// Failed fetches carry no payload.
    Empty,
}

impl Default for RawPayload {
    fn default() -> Self {
        Self::Empty
    }
}

impl RawPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Positioning(_) => "positioning",
            Self::Vault(_) => "vault",
            Self::Delivery(_) => "delivery",
            Self::DeliveryPressure(_) => "delivery_pressure",
            Self::Margin(_) => "margin",
            Self::Spread(_) => "spread",
            Self::Roll(_) => "roll",
            Self::Lease(_) => "lease",
            Self::Premium(_) => "premium",
            Self::Ratio(_) => "ratio",
            Self::Range(_) => "range",
            Self::Empty => "empty",
        }
    }

    /// Canonical computed value of this payload for `indicator`, or `None`
    /// when the payload does not belong to it or the division is undefined.
    pub fn natural_value(&self, indicator: IndicatorId) -> Option<f64> {
        let value = match (indicator, self) {
            (IndicatorId::SpeculatorPositioning, Self::Positioning(p)) => {
                p.long_contracts - p.short_contracts
            }
            (IndicatorId::CommercialPositioning, Self::Positioning(p)) => {
                p.short_contracts - p.long_contracts
            }
            (IndicatorId::VaultInventory, Self::Vault(v)) => {
                let total = v.registered_oz + v.eligible_oz;
                if total <= 0.0 {
                    return None;
                }
                v.registered_oz / total * 100.0
            }
            (IndicatorId::DeliveryActivity, Self::Delivery(d)) => d.contracts_stopped,
            (IndicatorId::DeliveryPressure, Self::DeliveryPressure(d)) => {
                if d.registered_oz <= 0.0 {
                    return None;
                }
                d.front_month_oi * d.contract_size_oz / d.registered_oz
            }
            (IndicatorId::MarginLevel, Self::Margin(m)) => {
                if m.contract_notional_usd <= 0.0 {
                    return None;
                }
                m.initial_margin_usd / m.contract_notional_usd * 100.0
            }
            (IndicatorId::Backwardation, Self::Spread(s)) => s.futures_usd - s.spot_usd,
            (IndicatorId::RollPattern, Self::Roll(r)) => {
                if r.total_oi <= 0.0 {
                    return None;
                }
                r.front_month_oi / r.total_oi * 100.0
            }
            (IndicatorId::LeaseRate, Self::Lease(l)) => {
                if l.spot_usd <= 0.0 || l.days_to_expiry == 0 {
                    return None;
                }
                let carry =
                    (l.futures_usd / l.spot_usd - 1.0) * (365.0 / l.days_to_expiry as f64) * 100.0;
                l.risk_free_pct - carry
            }
            (IndicatorId::ShanghaiPremium, Self::Premium(p)) => {
                p.shanghai_usd_oz - p.western_usd_oz
            }
            (IndicatorId::GoldSilverRatio, Self::Ratio(r)) => {
                if r.silver_usd <= 0.0 {
                    return None;
                }
                r.gold_usd / r.silver_usd
            }
            (IndicatorId::VolatilityRange, Self::Range(r)) => {
                if r.close_usd <= 0.0 {
                    return None;
                }
                (r.high_usd - r.low_usd) / r.close_usd * 100.0
            }
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

// =============================================================================
// Observation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Store-assigned id; increases with every append.
    #[serde(default)]
    pub id: u64,

    pub metal: Metal,

    pub indicator: IndicatorId,

    /// Calendar date the measurement represents.
    pub data_date: NaiveDate,

    /// When the value was obtained.
    pub fetched_at: DateTime<Utc>,

    #[serde(default)]
    pub raw: RawPayload,

    /// Scalar the scoring rules operate on. Required when the fetch succeeded.
    #[serde(default)]
    pub computed_value: Option<f64>,

    #[serde(default)]
    pub fetch_status: FetchStatus,

    #[serde(default)]
    pub provenance: Provenance,

    /// Persisted scorer output, if this row has been scored before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_reason: Option<String>,
}

macro_rules! payload_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Result<&$ty, ScoreError> {
            match &self.raw {
                RawPayload::$variant(p) => Ok(p),
                other => Err(ScoreError::PayloadMismatch {
                    indicator: self.indicator,
                    observation_id: self.id,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl Observation {
    /// Successful observation whose computed value is derived from `raw`.
    /// Falls back to NaN when the payload cannot produce a value, which
    /// `validate` then rejects.
    pub fn from_payload(
        metal: Metal,
        indicator: IndicatorId,
        data_date: NaiveDate,
        fetched_at: DateTime<Utc>,
        raw: RawPayload,
    ) -> Self {
        let computed_value = Some(raw.natural_value(indicator).unwrap_or(f64::NAN));
        Self {
            id: 0,
            metal,
            indicator,
            data_date,
            fetched_at,
            raw,
            computed_value,
            fetch_status: FetchStatus::Success,
            provenance: Provenance::Live,
            signal: None,
            signal_reason: None,
        }
    }

    /// Row recording a failed pull.
    pub fn failed(
        metal: Metal,
        indicator: IndicatorId,
        data_date: NaiveDate,
        fetched_at: DateTime<Utc>,
        status: FetchStatus,
    ) -> Self {
        Self {
            id: 0,
            metal,
            indicator,
            data_date,
            fetched_at,
            raw: RawPayload::Empty,
            computed_value: None,
            fetch_status: status,
            provenance: Provenance::Live,
            signal: Some(Signal::Error),
            signal_reason: None,
        }
    }

    /// Close-of-day timestamp for `date` (18:00 UTC), used where a source
    /// only reports a date.
    pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default();
        Utc.from_utc_datetime(&date.and_time(time))
    }

    pub fn is_success(&self) -> bool {
        self.fetch_status == FetchStatus::Success
    }

    /// Computed value when the observation is a usable reading.
    pub fn value(&self) -> Option<f64> {
        if !self.is_success() {
            return None;
        }
        self.computed_value.filter(|v| v.is_finite())
    }

    /// Check the caller contract: a successful row carries a finite value,
    /// and a persisted signal never contradicts the fetch status.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if let Some(signal) = self.signal {
            if !self.is_success() && signal != Signal::Error {
                return Err(ScoreError::ContradictorySignal {
                    indicator: self.indicator,
                    observation_id: self.id,
                    status: self.fetch_status,
                    signal,
                });
            }
        }
        if self.is_success() {
            self.require_value()?;
        }
        Ok(())
    }

    /// The computed value, or a contract-violation error.
    pub fn require_value(&self) -> Result<f64, ScoreError> {
        match self.computed_value {
            None => Err(ScoreError::MissingValue {
                indicator: self.indicator,
                observation_id: self.id,
            }),
            Some(v) if !v.is_finite() => Err(ScoreError::NonFiniteValue {
                indicator: self.indicator,
                observation_id: self.id,
                value: v,
            }),
            Some(v) => Ok(v),
        }
    }

    payload_accessor!(positioning, Positioning, PositioningRaw);
    payload_accessor!(vault, Vault, VaultRaw);
    payload_accessor!(delivery, Delivery, DeliveryRaw);
    payload_accessor!(delivery_pressure, DeliveryPressure, DeliveryPressureRaw);
    payload_accessor!(margin, Margin, MarginRaw);
    payload_accessor!(spread, Spread, SpreadRaw);
    payload_accessor!(roll, Roll, RollRaw);
    payload_accessor!(lease, Lease, LeaseRaw);
    payload_accessor!(premium, Premium, PremiumRaw);
    payload_accessor!(ratio, Ratio, RatioRaw);
    payload_accessor!(range, Range, RangeRaw);
}

/// Successful, finite computed values in iteration order.
pub fn success_values<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Vec<f64> {
    observations.into_iter().filter_map(Observation::value).collect()
}
