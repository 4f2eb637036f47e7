// =============================================================================
// Percentile Engine: empirical percentile rank within a historical set
// =============================================================================
//
//   rank(v, H) = |{h in H : h < v}| / |H| * 100
//
// Non-finite history values are ignored. An empty history ranks every value
// at 50 so that a missing baseline never reads as an extreme. The input is
// sorted internally; callers may pass history in any order.

use serde::Serialize;

/// Neutral rank returned when there is nothing to compare against.
pub const NEUTRAL_RANK: f64 = 50.0;

/// Percentile rank of `value` within `history`, in [0, 100].
pub fn percentile_rank(value: f64, history: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = history.iter().copied().filter(|h| h.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    rank_sorted(value, &sorted)
}

/// Rank against an already sorted, finite slice.
fn rank_sorted(value: f64, sorted: &[f64]) -> f64 {
    if sorted.is_empty() || value.is_nan() {
        return NEUTRAL_RANK;
    }
    let below = sorted.partition_point(|h| *h < value);
    below as f64 / sorted.len() as f64 * 100.0
}

/// Whether a baseline is large enough for percentile scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BaselineStatus {
    Sufficient { len: usize },
    Insufficient { len: usize, min: usize },
}

/// Sorted historical baseline with a minimum-size precondition.
#[derive(Debug, Clone)]
pub struct PercentileBaseline {
    sorted: Vec<f64>,
    min_history: usize,
}

impl PercentileBaseline {
    pub fn new(history: &[f64], min_history: usize) -> Self {
        let mut sorted: Vec<f64> = history.iter().copied().filter(|h| h.is_finite()).collect();
        sorted.sort_by(f64::total_cmp);
        Self {
            sorted,
            min_history,
        }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn status(&self) -> BaselineStatus {
        if self.sorted.len() >= self.min_history {
            BaselineStatus::Sufficient {
                len: self.sorted.len(),
            }
        } else {
            BaselineStatus::Insufficient {
                len: self.sorted.len(),
                min: self.min_history,
            }
        }
    }

    /// Rank of `value`, or `None` while the baseline is below the minimum.
    pub fn rank(&self, value: f64) -> Option<f64> {
        match self.status() {
            BaselineStatus::Sufficient { .. } => Some(rank_sorted(value, &self.sorted)),
            BaselineStatus::Insufficient { .. } => None,
        }
    }

    /// Median of the baseline, if any.
    pub fn median(&self) -> Option<f64> {
        let n = self.sorted.len();
        if n == 0 {
            return None;
        }
        Some(if n % 2 == 1 {
            self.sorted[n / 2]
        } else {
            (self.sorted[n / 2 - 1] + self.sorted[n / 2]) / 2.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_is_neutral() {
        assert!((percentile_rank(123.0, &[]) - 50.0).abs() < 1e-12);
        assert!((percentile_rank(1.0, &[f64::NAN]) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn counts_strictly_below() {
        let h: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        assert!((percentile_rank(86.0, &h) - 85.0).abs() < 1e-12);
        // Ties are not counted as below.
        assert!((percentile_rank(1.0, &h) - 0.0).abs() < 1e-12);
        assert!((percentile_rank(1_000.0, &h) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn order_of_history_does_not_matter() {
        let a = vec![5.0, 1.0, 9.0, 3.0, 7.0, 3.0];
        let mut b = a.clone();
        b.reverse();
        for v in [0.0, 3.0, 4.0, 9.0, 10.0] {
            assert_eq!(percentile_rank(v, &a), percentile_rank(v, &b));
        }
    }

    #[test]
    fn rank_is_bounded_and_monotonic() {
        let h: Vec<f64> = (0..57).map(|i| ((i * 37) % 101) as f64 - 20.0).collect();
        let mut prev = -1.0;
        let mut v = -50.0;
        while v <= 120.0 {
            let r = percentile_rank(v, &h);
            assert!((0.0..=100.0).contains(&r));
            assert!(r >= prev, "rank fell from {prev} to {r} at {v}");
            prev = r;
            v += 0.5;
        }
    }

    #[test]
    fn baseline_enforces_minimum_size() {
        let small = PercentileBaseline::new(&[1.0, 2.0, 3.0], 26);
        assert_eq!(small.status(), BaselineStatus::Insufficient { len: 3, min: 26 });
        assert!(small.rank(2.5).is_none());

        let full: Vec<f64> = (0..30).map(|x| x as f64).collect();
        let big = PercentileBaseline::new(&full, 26);
        assert_eq!(big.status(), BaselineStatus::Sufficient { len: 30 });
        assert!((big.rank(15.0).unwrap() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(PercentileBaseline::new(&[3.0, 1.0, 2.0], 0).median(), Some(2.0));
        assert_eq!(PercentileBaseline::new(&[4.0, 1.0, 2.0, 3.0], 0).median(), Some(2.5));
        assert_eq!(PercentileBaseline::new(&[], 0).median(), None);
    }
}
