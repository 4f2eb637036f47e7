// =============================================================================
// Observation Store: read-only history accessors plus an in-memory backend
// =============================================================================
//
// `ObservationSource` is the contract the evaluation engine reads history
// through. The persistence collaborator owns the real implementation; the
// in-memory `ObservationStore` backs the service binary and the tests.
//
// Thread safety: one `parking_lot::RwLock` over the series map, ids handed out
// from an atomic counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::indicators::IndicatorId;
use crate::observation::history::History;
use crate::observation::model::Observation;
use crate::types::Metal;

/// Identifies one (metal, indicator) series.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SeriesKey {
    pub metal: Metal,
    pub indicator: IndicatorId,
}

impl SeriesKey {
    pub fn new(metal: Metal, indicator: IndicatorId) -> Self {
        Self { metal, indicator }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.metal, self.indicator)
    }
}

/// Read-only history access, bounded by days or years. Nothing here mutates.
pub trait ObservationSource {
    fn latest(&self, key: SeriesKey) -> Option<Observation>;

    /// Observation about `days` before `anchor` (within `tolerance` days).
    fn about_days_before(
        &self,
        key: SeriesKey,
        anchor: NaiveDate,
        days: i64,
        tolerance: i64,
    ) -> Option<Observation>;

    /// Latest observation strictly before `date`.
    fn previous_before(&self, key: SeriesKey, date: NaiveDate) -> Option<Observation>;

    fn last_days(&self, key: SeriesKey, as_of: NaiveDate, days: i64) -> Vec<Observation>;

    fn last_years(&self, key: SeriesKey, as_of: NaiveDate, years: u32) -> Vec<Observation>;
}

/// Append-only in-memory store.
pub struct ObservationStore {
    series: RwLock<HashMap<SeriesKey, History>>,
    next_id: AtomicU64,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append `obs`, assigning it a fresh id. Returns the id.
    pub fn append(&self, mut obs: Observation) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        obs.id = id;
        let key = SeriesKey::new(obs.metal, obs.indicator);
        debug!(series = %key, id, data_date = %obs.data_date, "observation appended");
        self.series.write().entry(key).or_default().append(obs);
        id
    }

    pub fn append_all(&self, observations: impl IntoIterator<Item = Observation>) -> Vec<u64> {
        observations.into_iter().map(|o| self.append(o)).collect()
    }

    /// Number of stored rows for `key`, duplicates included.
    pub fn count(&self, key: SeriesKey) -> usize {
        self.series.read().get(&key).map_or(0, History::len)
    }

    pub fn total(&self) -> usize {
        self.series.read().values().map(History::len).sum()
    }

    fn with_history<T>(&self, key: SeriesKey, f: impl FnOnce(&History) -> T) -> Option<T> {
        self.series.read().get(&key).map(f)
    }
}

impl Default for ObservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationSource for ObservationStore {
    fn latest(&self, key: SeriesKey) -> Option<Observation> {
        self.with_history(key, |h| h.latest().cloned()).flatten()
    }

    fn about_days_before(
        &self,
        key: SeriesKey,
        anchor: NaiveDate,
        days: i64,
        tolerance: i64,
    ) -> Option<Observation> {
        self.with_history(key, |h| h.about_days_before(anchor, days, tolerance).cloned())
            .flatten()
    }

    fn previous_before(&self, key: SeriesKey, date: NaiveDate) -> Option<Observation> {
        self.with_history(key, |h| h.previous_before(date).cloned())
            .flatten()
    }

    fn last_days(&self, key: SeriesKey, as_of: NaiveDate, days: i64) -> Vec<Observation> {
        self.with_history(key, |h| h.last_days(as_of, days).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    fn last_years(&self, key: SeriesKey, as_of: NaiveDate, years: u32) -> Vec<Observation> {
        self.with_history(key, |h| h.last_years(as_of, years).into_iter().cloned().collect())
            .unwrap_or_default()
    }
}
