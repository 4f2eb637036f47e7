// =============================================================================
// Engine Configuration: thresholds, windows and the key-date calendar
// =============================================================================
//
// Every tunable of an evaluation pass lives here. Persistence uses an atomic
// tmp + rename pattern. All fields carry `#[serde(default)]` so that adding
// new fields never breaks loading an older config file.
//
// Scorer bands are fixed in their modules; what is configurable here are the
// windows the engine reads history through and the aggregate thresholds.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calendar::{KeyCalendar, KeyDate};
use crate::types::Metal;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_metals() -> Vec<Metal> {
    Metal::ALL.to_vec()
}

fn default_min_percentile_history() -> usize {
    26
}

fn default_baseline_years() -> u32 {
    3
}

fn default_prior_week_days() -> i64 {
    7
}

fn default_prior_tolerance_days() -> i64 {
    3
}

fn default_risk_free_rate_pct() -> f64 {
    4.5
}

fn default_range_baseline_days() -> i64 {
    30
}

fn default_narration_days() -> i64 {
    90
}

fn default_stale_multiplier() -> f64 {
    2.0
}

fn default_min_available() -> usize {
    8
}

fn default_sell_red_count() -> usize {
    4
}

fn default_buy_green_count() -> usize {
    7
}

fn default_caution_red_count() -> usize {
    3
}

fn default_caution_green_floor() -> usize {
    5
}

fn default_oi_drop_pct() -> f64 {
    5.0
}

fn default_proximity_days() -> i64 {
    3
}

fn default_elevated_min_active() -> usize {
    3
}

// =============================================================================
// ScoringSettings
// =============================================================================

/// History windows the scorers are fed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// Minimum baseline length before percentile rules are trusted. Below
    /// it the positioning scorers run on absolute thresholds only.
    #[serde(default = "default_min_percentile_history")]
    pub min_percentile_history: usize,

    /// Years of history used as the percentile baseline.
    #[serde(default = "default_baseline_years")]
    pub baseline_years: u32,

    /// Target distance of the "prior week" observation.
    #[serde(default = "default_prior_week_days")]
    pub prior_week_days: i64,

    /// Allowed slack around `prior_week_days`, either side.
    #[serde(default = "default_prior_tolerance_days")]
    pub prior_tolerance_days: i64,

    /// Annualised risk-free rate fed into the lease-rate proxy (percent).
    #[serde(default = "default_risk_free_rate_pct")]
    pub risk_free_rate_pct: f64,

    /// Days of range history behind the volatility expansion rule.
    #[serde(default = "default_range_baseline_days")]
    pub range_baseline_days: i64,

    /// Days of computed values handed to the narration layer.
    #[serde(default = "default_narration_days")]
    pub narration_days: i64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            min_percentile_history: default_min_percentile_history(),
            baseline_years: default_baseline_years(),
            prior_week_days: default_prior_week_days(),
            prior_tolerance_days: default_prior_tolerance_days(),
            risk_free_rate_pct: default_risk_free_rate_pct(),
            range_baseline_days: default_range_baseline_days(),
            narration_days: default_narration_days(),
        }
    }
}

// =============================================================================
// FreshnessSettings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessSettings {
    /// An observation is stale once older than this many cadence periods.
    #[serde(default = "default_stale_multiplier")]
    pub stale_multiplier: f64,
}

impl Default for FreshnessSettings {
    fn default() -> Self {
        Self {
            stale_multiplier: default_stale_multiplier(),
        }
    }
}

// =============================================================================
// PostureThresholds
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureThresholds {
    /// Fewer available indicators than this yields INSUFFICIENT_DATA.
    #[serde(default = "default_min_available")]
    pub min_available: usize,

    #[serde(default = "default_sell_red_count")]
    pub sell_red_count: usize,

    /// BUY needs at least this many greens and no reds.
    #[serde(default = "default_buy_green_count")]
    pub buy_green_count: usize,

    #[serde(default = "default_caution_red_count")]
    pub caution_red_count: usize,

    /// Any red with fewer greens than this is CAUTION.
    #[serde(default = "default_caution_green_floor")]
    pub caution_green_floor: usize,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            min_available: default_min_available(),
            sell_red_count: default_sell_red_count(),
            buy_green_count: default_buy_green_count(),
            caution_red_count: default_caution_red_count(),
            caution_green_floor: default_caution_green_floor(),
        }
    }
}

// =============================================================================
// SlamRiskSettings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlamRiskSettings {
    /// Single-period open-interest decline (percent) that flags a drop.
    #[serde(default = "default_oi_drop_pct")]
    pub oi_drop_pct: f64,

    /// Days either side of a key date that count as "near".
    #[serde(default = "default_proximity_days")]
    pub proximity_days: i64,

    /// Active items needed for the checklist to read as elevated.
    #[serde(default = "default_elevated_min_active")]
    pub elevated_min_active: usize,
}

impl Default for SlamRiskSettings {
    fn default() -> Self {
        Self {
            oi_drop_pct: default_oi_drop_pct(),
            proximity_days: default_proximity_days(),
            elevated_min_active: default_elevated_min_active(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Metals evaluated on every pass.
    #[serde(default = "default_metals")]
    pub metals: Vec<Metal>,

    #[serde(default)]
    pub scoring: ScoringSettings,

    #[serde(default)]
    pub freshness: FreshnessSettings,

    #[serde(default)]
    pub posture: PostureThresholds,

    #[serde(default)]
    pub slam_risk: SlamRiskSettings,

    /// Flagged first-notice days, expiries and holidays.
    #[serde(default)]
    pub key_dates: Vec<KeyDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metals: default_metals(),
            scoring: ScoringSettings::default(),
            freshness: FreshnessSettings::default(),
            posture: PostureThresholds::default(),
            slam_risk: SlamRiskSettings::default(),
            key_dates: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            metals = ?config.metals,
            key_dates = config.key_dates.len(),
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    pub fn calendar(&self) -> KeyCalendar {
        KeyCalendar::new(self.key_dates.clone())
    }
}
