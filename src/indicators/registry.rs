// =============================================================================
// Indicator Registry: the twelve fixed indicators and their metadata
// =============================================================================
//
// Ids are stable and shared with the persistence layer. Each metal tracks the
// same twelve series; nothing in here is metal-specific.

use serde::{Deserialize, Serialize};

/// Expected update interval of a series, used by the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Daily,
    Weekly,
}

impl Cadence {
    pub fn hours(self) -> i64 {
        match self {
            Self::Daily => 24,
            Self::Weekly => 168,
        }
    }
}

/// Domain group, used for display grouping only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Positioning,
    Inventory,
    Delivery,
    Margin,
    Spread,
    Roll,
    Lease,
    Premium,
    Ratio,
    Volatility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorId {
    SpeculatorPositioning,
    CommercialPositioning,
    VaultInventory,
    DeliveryActivity,
    DeliveryPressure,
    MarginLevel,
    Backwardation,
    RollPattern,
    LeaseRate,
    ShanghaiPremium,
    GoldSilverRatio,
    VolatilityRange,
}

impl IndicatorId {
    pub const ALL: [IndicatorId; 12] = [
        Self::SpeculatorPositioning,
        Self::CommercialPositioning,
        Self::VaultInventory,
        Self::DeliveryActivity,
        Self::DeliveryPressure,
        Self::MarginLevel,
        Self::Backwardation,
        Self::RollPattern,
        Self::LeaseRate,
        Self::ShanghaiPremium,
        Self::GoldSilverRatio,
        Self::VolatilityRange,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Persistence id (1-based).
    pub fn id(self) -> u8 {
        match self {
            Self::SpeculatorPositioning => 1,
            Self::CommercialPositioning => 2,
            Self::VaultInventory => 3,
            Self::DeliveryActivity => 4,
            Self::DeliveryPressure => 5,
            Self::MarginLevel => 6,
            Self::Backwardation => 7,
            Self::RollPattern => 8,
            Self::LeaseRate => 9,
            Self::ShanghaiPremium => 10,
            Self::GoldSilverRatio => 11,
            Self::VolatilityRange => 12,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.id() == id)
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::SpeculatorPositioning => "speculator_positioning",
            Self::CommercialPositioning => "commercial_positioning",
            Self::VaultInventory => "vault_inventory",
            Self::DeliveryActivity => "delivery_activity",
            Self::DeliveryPressure => "delivery_pressure",
            Self::MarginLevel => "margin_level",
            Self::Backwardation => "backwardation",
            Self::RollPattern => "roll_pattern",
            Self::LeaseRate => "lease_rate",
            Self::ShanghaiPremium => "shanghai_premium",
            Self::GoldSilverRatio => "gold_silver_ratio",
            Self::VolatilityRange => "volatility_range",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SpeculatorPositioning => "Speculator Net Long",
            Self::CommercialPositioning => "Commercial Net Short",
            Self::VaultInventory => "Registered Vault Ratio",
            Self::DeliveryActivity => "Delivery Activity",
            Self::DeliveryPressure => "Delivery Pressure (FND Ratio)",
            Self::MarginLevel => "Margin Level",
            Self::Backwardation => "Futures/Spot Spread",
            Self::RollPattern => "Roll Pattern",
            Self::LeaseRate => "Lease Rate Proxy",
            Self::ShanghaiPremium => "Shanghai Premium",
            Self::GoldSilverRatio => "Gold/Silver Ratio",
            Self::VolatilityRange => "Volatility Range",
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            Self::SpeculatorPositioning | Self::CommercialPositioning => Domain::Positioning,
            Self::VaultInventory => Domain::Inventory,
            Self::DeliveryActivity | Self::DeliveryPressure => Domain::Delivery,
            Self::MarginLevel => Domain::Margin,
            Self::Backwardation => Domain::Spread,
            Self::RollPattern => Domain::Roll,
            Self::LeaseRate => Domain::Lease,
            Self::ShanghaiPremium => Domain::Premium,
            Self::GoldSilverRatio => Domain::Ratio,
            Self::VolatilityRange => Domain::Volatility,
        }
    }

    pub fn cadence(self) -> Cadence {
        match self {
            Self::SpeculatorPositioning | Self::CommercialPositioning => Cadence::Weekly,
            _ => Cadence::Daily,
        }
    }

    /// A RED reading on an override indicator forces a SELL posture.
    pub fn is_override(self) -> bool {
        matches!(self, Self::MarginLevel | Self::DeliveryPressure)
    }

    /// Derived indicators are computed from other indicators' payloads and
    /// never fetched on their own.
    pub fn is_derived(self) -> bool {
        matches!(self, Self::DeliveryPressure | Self::LeaseRate)
    }

    /// Upstream indicators a derived indicator reads. Empty for fetched ones.
    pub fn upstream(self) -> &'static [IndicatorId] {
        match self {
            Self::DeliveryPressure => &[Self::RollPattern, Self::VaultInventory],
            Self::LeaseRate => &[Self::Backwardation],
            _ => &[],
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::SpeculatorPositioning
            | Self::CommercialPositioning
            | Self::DeliveryActivity => "contracts",
            Self::VaultInventory
            | Self::MarginLevel
            | Self::RollPattern
            | Self::LeaseRate
            | Self::VolatilityRange => "%",
            Self::DeliveryPressure | Self::GoldSilverRatio => "x",
            Self::Backwardation | Self::ShanghaiPremium => "$/oz",
        }
    }
}

impl std::fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for IndicatorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u8>() {
            return Self::from_id(id).ok_or_else(|| format!("unknown indicator id {id}"));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.slug() == s)
            .ok_or_else(|| format!("unknown indicator '{s}'"))
    }
}

/// Serialisable metadata row, served to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorInfo {
    pub id: u8,
    pub slug: &'static str,
    pub name: &'static str,
    pub domain: Domain,
    pub cadence: Cadence,
    pub unit: &'static str,
    pub is_override: bool,
    pub is_derived: bool,
    pub upstream: Vec<IndicatorId>,
}

impl From<IndicatorId> for IndicatorInfo {
    fn from(id: IndicatorId) -> Self {
        Self {
            id: id.id(),
            slug: id.slug(),
            name: id.name(),
            domain: id.domain(),
            cadence: id.cadence(),
            unit: id.unit(),
            is_override: id.is_override(),
            is_derived: id.is_derived(),
            upstream: id.upstream().to_vec(),
        }
    }
}

pub fn catalogue() -> Vec<IndicatorInfo> {
    IndicatorId::ALL.iter().copied().map(IndicatorInfo::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_dense() {
        let mut ids: Vec<u8> = IndicatorId::ALL.iter().map(|i| i.id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=12).collect::<Vec<u8>>());
    }

    #[test]
    fn id_and_slug_round_trip_through_from_str() {
        for ind in IndicatorId::ALL {
            assert_eq!(IndicatorId::from_id(ind.id()), Some(ind));
            assert_eq!(ind.slug().parse::<IndicatorId>().unwrap(), ind);
            assert_eq!(ind.id().to_string().parse::<IndicatorId>().unwrap(), ind);
        }
        assert!("13".parse::<IndicatorId>().is_err());
    }

    #[test]
    fn overrides_are_margin_and_delivery_pressure() {
        let overrides: Vec<_> = IndicatorId::ALL.iter().filter(|i| i.is_override()).collect();
        assert_eq!(
            overrides,
            vec![&IndicatorId::DeliveryPressure, &IndicatorId::MarginLevel]
        );
    }

    #[test]
    fn derived_indicators_declare_upstream() {
        for ind in IndicatorId::ALL {
            assert_eq!(ind.is_derived(), !ind.upstream().is_empty());
            for up in ind.upstream() {
                assert!(!up.is_derived(), "{ind} depends on derived {up}");
            }
        }
    }

    #[test]
    fn positioning_is_weekly() {
        assert_eq!(IndicatorId::SpeculatorPositioning.cadence().hours(), 168);
        assert_eq!(IndicatorId::MarginLevel.cadence().hours(), 24);
    }
}
