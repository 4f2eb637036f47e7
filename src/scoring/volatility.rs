// =============================================================================
// Volatility Range Scorer: (high - low) / close
// =============================================================================
//
//   1. violent      range > 5%                                         RED
//   2. wide         range > 3%                                         YELLOW
//   3. expanding    >= 5 recent readings and range > 2x their median   YELLOW
//   4. calm                                                            GREEN

use crate::analytics::PercentileBaseline;
use crate::error::ScoreError;
use crate::indicators::IndicatorId;
use crate::types::Signal;

use super::rules::{Rule, RuleTable, Verdict};
use super::ScoreContext;

const RED_RANGE_PCT: f64 = 5.0;
const YELLOW_RANGE_PCT: f64 = 3.0;
const EXPANSION_MIN_READINGS: usize = 5;
const EXPANSION_MULTIPLE: f64 = 2.0;

pub(crate) struct RangeCtx {
    range_pct: f64,
    high_usd: f64,
    low_usd: f64,
    baseline_len: usize,
    median: Option<f64>,
}

impl RangeCtx {
    fn is_expanding(&self) -> bool {
        self.baseline_len >= EXPANSION_MIN_READINGS
            && self
                .median
                .map_or(false, |m| self.range_pct > EXPANSION_MULTIPLE * m)
    }
}

pub(crate) fn table() -> RuleTable<RangeCtx> {
    RuleTable::new(
        vec![
            Rule::new(
                "violent",
                |c: &RangeCtx| c.range_pct > RED_RANGE_PCT,
                |c: &RangeCtx| {
                    (
                        Signal::Red,
                        format!(
                            "daily range {:.2}% (${:.2}-${:.2}) is above 5%",
                            c.range_pct, c.low_usd, c.high_usd
                        ),
                    )
                },
            ),
            Rule::new(
                "wide",
                |c: &RangeCtx| c.range_pct > YELLOW_RANGE_PCT,
                |c: &RangeCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "daily range {:.2}% (${:.2}-${:.2}) is in the 3-5% band",
                            c.range_pct, c.low_usd, c.high_usd
                        ),
                    )
                },
            ),
            Rule::new(
                "expanding",
                |c: &RangeCtx| c.is_expanding(),
                |c: &RangeCtx| {
                    (
                        Signal::Yellow,
                        format!(
                            "daily range {:.2}% is more than twice the {:.2}% median of the last {} readings",
                            c.range_pct,
                            c.median.unwrap_or_default(),
                            c.baseline_len
                        ),
                    )
                },
            ),
        ],
        "calm",
        |c: &RangeCtx| {
            let context = match c.median {
                Some(m) => format!(", median {:.2}% over {} readings", m, c.baseline_len),
                None => String::new(),
            };
            (
                Signal::Green,
                format!("daily range {:.2}% (${:.2}-${:.2}){}", c.range_pct, c.low_usd, c.high_usd, context),
            )
        },
    )
}

pub fn score(ctx: &ScoreContext<'_>) -> Result<Verdict, ScoreError> {
    ctx.ensure(IndicatorId::VolatilityRange)?;
    let range_pct = ctx.current.require_value()?;
    let raw = ctx.current.range()?;
    let baseline = PercentileBaseline::new(
        &ctx.recent_baseline_values(ctx.settings.range_baseline_days),
        0,
    );

    Ok(table().evaluate(&RangeCtx {
        range_pct,
        high_usd: raw.high_usd,
        low_usd: raw.low_usd,
        baseline_len: baseline.len(),
        median: baseline.median(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Observation, RangeRaw, RawPayload};
    use crate::runtime_config::ScoringSettings;
    use crate::scoring::test_support::*;
    use crate::types::Metal;

    fn range(offset: i64, high: f64, low: f64) -> Observation {
        obs(
            IndicatorId::VolatilityRange,
            day(offset),
            RawPayload::Range(RangeRaw {
                high_usd: high,
                low_usd: low,
                close_usd: 100.0,
            }),
        )
    }

    fn run(cur: &Observation, history: &[Observation]) -> Verdict {
        let settings = ScoringSettings::default();
        score(&ScoreContext {
            metal: Metal::Silver,
            current: cur,
            prior: None,
            history,
            settings: &settings,
        })
        .unwrap()
    }

    #[test]
    fn absolute_bands() {
        let v = run(&range(0, 104.0, 98.0), &[]);
        assert_eq!((v.signal, v.rule), (Signal::Red, "violent"));
        assert!(v.reason.contains("6.00%"));
        assert_eq!(run(&range(0, 102.0, 98.0), &[]).rule, "wide");
        assert_eq!(run(&range(0, 101.0, 99.0), &[]).rule, "calm");
    }

    #[test]
    fn expansion_needs_enough_history() {
        let quiet: Vec<Observation> = (1..=6).map(|i| range(-i, 100.5, 99.5)).collect();
        let cur = range(0, 101.25, 98.75); // 2.5% vs 1.0% median
        let v = run(&cur, &quiet);
        assert_eq!((v.signal, v.rule), (Signal::Yellow, "expanding"));
        assert!(v.reason.contains("1.00% median"), "{}", v.reason);
        assert!(v.reason.contains("6 readings"), "{}", v.reason);

        let v = run(&cur, &quiet[..4]);
        assert_eq!((v.signal, v.rule), (Signal::Green, "calm"));
    }

    #[test]
    fn old_readings_fall_out_of_the_window() {
        let stale: Vec<Observation> = (40..46).map(|i| range(-i, 100.5, 99.5)).collect();
        let v = run(&range(0, 101.25, 98.75), &stale);
        assert_eq!(v.rule, "calm");
    }
}
