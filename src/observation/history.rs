// =============================================================================
// History: append-only, time-ordered sequence of observations for one series
// =============================================================================
//
// Rows are kept sorted by (data_date, fetched_at, id). Appending never
// replaces an existing row, even for the same data_date; the read views
// collapse duplicates to the most recently fetched row per date.

use chrono::{Duration, Months, NaiveDate};

use crate::observation::model::Observation;

#[derive(Debug, Clone, Default)]
pub struct History {
    items: Vec<Observation>,
}

fn order_key(o: &Observation) -> (NaiveDate, chrono::DateTime<chrono::Utc>, u64) {
    (o.data_date, o.fetched_at, o.id)
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let mut items: Vec<Observation> = observations.into_iter().collect();
        items.sort_by_key(order_key);
        Self { items }
    }

    /// Insert `obs` at its ordered position. Existing rows are untouched.
    pub fn append(&mut self, obs: Observation) {
        let key = order_key(&obs);
        let pos = self.items.partition_point(|o| order_key(o) <= key);
        self.items.insert(pos, obs);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every stored row, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.items.iter()
    }

    /// One row per data_date: the most recently fetched.
    pub fn deduped(&self) -> Vec<&Observation> {
        let mut out: Vec<&Observation> = Vec::with_capacity(self.items.len());
        for obs in &self.items {
            match out.last_mut() {
                Some(last) if last.data_date == obs.data_date => *last = obs,
                _ => out.push(obs),
            }
        }
        out
    }

    /// Most recent data_date, most recent fetch.
    pub fn latest(&self) -> Option<&Observation> {
        self.items.last()
    }

    /// Deduplicated rows with `as_of - days <= data_date <= as_of`.
    pub fn last_days(&self, as_of: NaiveDate, days: i64) -> Vec<&Observation> {
        let from = as_of - Duration::days(days.max(0));
        self.deduped()
            .into_iter()
            .filter(|o| o.data_date >= from && o.data_date <= as_of)
            .collect()
    }

    /// Deduplicated rows within the last `years` calendar years up to `as_of`.
    pub fn last_years(&self, as_of: NaiveDate, years: u32) -> Vec<&Observation> {
        let from = as_of
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);
        self.deduped()
            .into_iter()
            .filter(|o| o.data_date >= from && o.data_date <= as_of)
            .collect()
    }

    /// The row closest to `anchor - days`, searching `tolerance` days either
    /// side and only strictly before `anchor`. Equal distances prefer the
    /// later date.
    pub fn about_days_before(
        &self,
        anchor: NaiveDate,
        days: i64,
        tolerance: i64,
    ) -> Option<&Observation> {
        let target = anchor - Duration::days(days);
        self.deduped()
            .into_iter()
            .filter(|o| o.data_date < anchor)
            .filter(|o| (o.data_date - target).num_days().abs() <= tolerance)
            .min_by_key(|o| {
                let distance = (o.data_date - target).num_days().abs();
                (distance, std::cmp::Reverse(o.data_date))
            })
    }

    /// The most recent row whose data_date is strictly before `date`.
    pub fn previous_before(&self, date: NaiveDate) -> Option<&Observation> {
        self.deduped()
            .into_iter()
            .rev()
            .find(|o| o.data_date < date)
    }
}
