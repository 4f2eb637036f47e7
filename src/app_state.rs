// =============================================================================
// Central Application State: metal-pulse service
// =============================================================================
//
// Ties the observation store, the engine configuration and the latest
// evaluation report per metal together for the REST API.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
//   - The store manages its own interior mutability behind an Arc.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{EvaluationReport, Evaluator};
use crate::indicators::IndicatorId;
use crate::observation::{Observation, ObservationSource, ObservationStore, RawPayload, SeriesKey};
use crate::runtime_config::EngineConfig;
use crate::scoring::SignalRecord;
use crate::types::{FetchStatus, Metal, Posture, Provenance};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded scoring failure for the state endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// Rule that produced the error verdict, e.g. `contract_violation`.
    pub code: Option<String>,
    /// ISO 8601 timestamp.
    pub at: String,
}

const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Observation input
// =============================================================================

/// Wire shape of one observation pushed by the fetch layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationInput {
    pub metal: Metal,
    pub indicator: IndicatorId,
    pub data_date: NaiveDate,
    /// Defaults to close of day on `data_date`.
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default = "default_fetch_status")]
    pub fetch_status: FetchStatus,
    #[serde(default = "default_provenance")]
    pub provenance: Provenance,
    #[serde(default)]
    pub raw: RawPayload,
    /// Normalized value from the fetch layer. Must agree with `raw` when the
    /// payload can produce one.
    #[serde(default)]
    pub computed_value: Option<f64>,
}

/// Observation input rejected at the ingest boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("{metal} {indicator} {data_date}: computed_value {sent} disagrees with {computed} from the raw payload")]
    ValueMismatch {
        metal: Metal,
        indicator: IndicatorId,
        data_date: NaiveDate,
        sent: f64,
        computed: f64,
    },

    #[error("{metal} {indicator} {data_date}: successful fetch has no finite computed_value and the raw payload cannot produce one")]
    MissingValue {
        metal: Metal,
        indicator: IndicatorId,
        data_date: NaiveDate,
    },
}

/// Relative tolerance when comparing a sent value with the recomputed one.
const VALUE_TOLERANCE: f64 = 1e-6;

fn default_fetch_status() -> FetchStatus {
    FetchStatus::Success
}

fn default_provenance() -> Provenance {
    Provenance::Live
}

impl ObservationInput {
    pub fn into_observation(self) -> Result<Observation, InputError> {
        let fetched_at = self
            .fetched_at
            .unwrap_or_else(|| Observation::end_of_day(self.data_date));

        if self.fetch_status != FetchStatus::Success {
            let mut obs = Observation::failed(
                self.metal,
                self.indicator,
                self.data_date,
                fetched_at,
                self.fetch_status,
            );
            obs.provenance = self.provenance;
            return Ok(obs);
        }

        let computed = self.raw.natural_value(self.indicator);
        let sent = self.computed_value.filter(|v| v.is_finite());
        let value = match (sent, computed) {
            (Some(sent), Some(computed))
                if (sent - computed).abs() > VALUE_TOLERANCE * computed.abs().max(1.0) =>
            {
                return Err(InputError::ValueMismatch {
                    metal: self.metal,
                    indicator: self.indicator,
                    data_date: self.data_date,
                    sent,
                    computed,
                });
            }
            (_, Some(computed)) => computed,
            (Some(sent), None) => sent,
            (None, None) => {
                return Err(InputError::MissingValue {
                    metal: self.metal,
                    indicator: self.indicator,
                    data_date: self.data_date,
                })
            }
        };

        let mut obs =
            Observation::from_payload(self.metal, self.indicator, self.data_date, fetched_at, self.raw);
        obs.computed_value = Some(value);
        obs.provenance = self.provenance;
        Ok(obs)
    }
}

/// Same reading as an already stored row: date, fetch time and value match.
fn same_reading(stored: &Observation, row: &Observation) -> bool {
    stored.data_date == row.data_date
        && stored.fetched_at == row.fetched_at
        && stored.computed_value.map(f64::to_bits) == row.computed_value.map(f64::to_bits)
}

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    /// Incremented on every meaningful mutation.
    pub state_version: AtomicU64,

    pub config: RwLock<EngineConfig>,
    pub store: Arc<ObservationStore>,

    /// Latest report per metal.
    pub reports: RwLock<HashMap<Metal, EvaluationReport>>,
    /// Most recent signal per stored observation id.
    pub signals: RwLock<HashMap<u64, SignalRecord>>,

    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Bearer token for write endpoints; `None` rejects every write.
    admin_token: Option<String>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: EngineConfig, store: Arc<ObservationStore>, admin_token: Option<String>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config: RwLock::new(config),
            store,
            reports: RwLock::new(HashMap::new()),
            signals: RwLock::new(HashMap::new()),
            recent_errors: RwLock::new(Vec::new()),
            admin_token: admin_token.filter(|t| !t.is_empty()),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error. Capped at [`MAX_RECENT_ERRORS`], oldest evicted first.
    pub fn push_error(&self, msg: String, code: Option<String>) {
        let record = ErrorRecord {
            message: msg,
            code,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Ingest / Evaluate ───────────────────────────────────────────────

    /// Append observations to the store and return their assigned ids.
    /// The batch is checked first; one bad input rejects all of it.
    pub fn ingest(&self, inputs: Vec<ObservationInput>) -> Result<Vec<u64>, InputError> {
        let observations = inputs
            .into_iter()
            .map(ObservationInput::into_observation)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                warn!(error = %e, "observation batch rejected");
                e
            })?;
        let ids = self.store.append_all(observations);
        info!(count = ids.len(), total = self.store.total(), "observations ingested");
        self.increment_version();
        Ok(ids)
    }

    /// Run one pass for `metal`, persist its outputs and keep the report.
    pub fn evaluate_metal(&self, metal: Metal, now: DateTime<Utc>) -> EvaluationReport {
        let config = self.config.read().clone();
        let previous = self.reports.read().get(&metal).cloned();
        let report = Evaluator::new(&config).evaluate(self.store.as_ref(), metal, now, previous.as_ref());

        {
            let mut signals = self.signals.write();
            for record in &report.signal_records {
                signals.insert(record.observation_id, record.clone());
            }
            for row in &report.derived_observations {
                let key = SeriesKey::new(row.metal, row.indicator);
                let id = match self.store.latest(key) {
                    Some(stored) if same_reading(&stored, row) => stored.id,
                    _ => self.store.append(row.clone()),
                };
                if let (Some(signal), Some(reason)) = (row.signal, row.signal_reason.clone()) {
                    signals.insert(
                        id,
                        SignalRecord {
                            observation_id: id,
                            metal: row.metal,
                            indicator: row.indicator,
                            signal,
                            signal_reason: reason,
                        },
                    );
                }
            }
        }

        for r in &report.indicators {
            if matches!(r.rule, Some("contract_violation" | "derivation_failed")) {
                warn!(metal = %metal, indicator = %r.indicator, reason = %r.reason, "indicator errored");
                self.push_error(
                    format!("{metal} {}: {}", r.indicator, r.reason),
                    r.rule.map(str::to_string),
                );
            }
        }

        self.reports.write().insert(metal, report.clone());
        self.increment_version();
        report
    }

    /// Run a pass for every configured metal.
    pub fn evaluate_all(&self, now: DateTime<Utc>) -> Vec<EvaluationReport> {
        let metals = self.config.read().metals.clone();
        metals.into_iter().map(|m| self.evaluate_metal(m, now)).collect()
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    pub fn build_snapshot(&self) -> StateSnapshot {
        let reports = self.reports.read();
        let metals = self
            .config
            .read()
            .metals
            .iter()
            .map(|m| {
                let report = reports.get(m);
                MetalSummary {
                    metal: *m,
                    posture: report.map(|r| r.posture.posture),
                    available_count: report.map(|r| r.posture.available_count),
                    slam_risk_elevated: report.map(|r| r.slam_risk.elevated),
                    evaluated_at: report.map(|r| r.evaluated_at),
                }
            })
            .collect();

        StateSnapshot {
            state_version: self.current_state_version(),
            uptime_s: self.start_time.elapsed().as_secs(),
            observation_count: self.store.total(),
            metals,
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MetalSummary {
    pub metal: Metal,
    pub posture: Option<Posture>,
    pub available_count: Option<usize>,
    pub slam_risk_elevated: Option<bool>,
    pub evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub uptime_s: u64,
    pub observation_count: usize,
    pub metals: Vec<MetalSummary>,
    pub recent_errors: Vec<ErrorRecord>,
}
