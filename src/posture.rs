// =============================================================================
// Posture Synthesizer: twelve resolved signals into one market posture
// =============================================================================
//
// Only indicators whose display state is `success` are available and tallied.
// Stale, error, awaiting and not-applicable readings are excluded from the
// counts but still count against the total.
//
// Rule order (first match wins):
//
//   1. insufficient_data   available < 8                             INSUFFICIENT_DATA
//   2. override_sell       margin or delivery pressure is RED        SELL
//   3. red_majority        red >= 4                                  SELL
//   4. broad_green         green >= 7 and red == 0                   BUY
//   5. caution             red >= 3, or red > 0 and green < 5        CAUTION
//   6. neutral                                                       NEUTRAL
//
// The override veto sits above every tally rule, so a single RED override
// indicator turns an otherwise-BUY board into SELL.

use serde::Serialize;
use tracing::info;

use crate::display_state::Resolution;
use crate::indicators::IndicatorId;
use crate::runtime_config::PostureThresholds;
use crate::scoring::{Rule, RuleTable};
use crate::types::{Posture, Signal};

/// One indicator's contribution to the posture.
#[derive(Debug, Clone, Copy)]
pub struct PostureInput {
    pub indicator: IndicatorId,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostureReport {
    pub posture: Posture,
    pub posture_reason: String,
    pub rule: &'static str,
    pub available_count: usize,
    pub total_count: usize,
    pub green_count: usize,
    pub yellow_count: usize,
    pub red_count: usize,
    /// Override indicator that forced SELL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_indicator: Option<IndicatorId>,
}

pub(crate) struct Tally {
    available: usize,
    total: usize,
    green: usize,
    yellow: usize,
    red: usize,
    override_red: Option<IndicatorId>,
    thresholds: PostureThresholds,
}

impl Tally {
    pub(crate) fn from_inputs(inputs: &[PostureInput], thresholds: &PostureThresholds) -> Self {
        let available: Vec<&PostureInput> = inputs
            .iter()
            .filter(|i| i.resolution.counts_toward_posture())
            .collect();
        let count = |s: Signal| {
            available
                .iter()
                .filter(|i| i.resolution.signal == Some(s))
                .count()
        };
        Self {
            available: available.len(),
            total: IndicatorId::COUNT.max(inputs.len()),
            green: count(Signal::Green),
            yellow: count(Signal::Yellow),
            red: count(Signal::Red),
            override_red: available
                .iter()
                .find(|i| i.indicator.is_override() && i.resolution.signal == Some(Signal::Red))
                .map(|i| i.indicator),
            thresholds: thresholds.clone(),
        }
    }

    fn counts(&self) -> String {
        format!(
            "{} green, {} yellow, {} red of {} available ({} total)",
            self.green, self.yellow, self.red, self.available, self.total
        )
    }
}

pub(crate) fn table() -> RuleTable<Tally, Posture> {
    RuleTable::new(
        vec![
            Rule::new(
                "insufficient_data",
                |t: &Tally| t.available < t.thresholds.min_available,
                |t: &Tally| {
                    (
                        Posture::InsufficientData,
                        format!(
                            "Only {} of {} indicators are available (need {}), so no posture is called.",
                            t.available, t.total, t.thresholds.min_available
                        ),
                    )
                },
            ),
            Rule::new(
                "override_sell",
                |t: &Tally| t.override_red.is_some(),
                |t: &Tally| {
                    let name = t.override_red.map(IndicatorId::name).unwrap_or_default();
                    (
                        Posture::Sell,
                        format!("{name} is RED and overrides the tally ({}).", t.counts()),
                    )
                },
            ),
            Rule::new(
                "red_majority",
                |t: &Tally| t.red >= t.thresholds.sell_red_count,
                |t: &Tally| {
                    (
                        Posture::Sell,
                        format!(
                            "{} indicators are RED (threshold {}): {}.",
                            t.red,
                            t.thresholds.sell_red_count,
                            t.counts()
                        ),
                    )
                },
            ),
            Rule::new(
                "broad_green",
                |t: &Tally| t.green >= t.thresholds.buy_green_count && t.red == 0,
                |t: &Tally| {
                    (
                        Posture::Buy,
                        format!(
                            "{} indicators are GREEN with none RED: {}.",
                            t.green,
                            t.counts()
                        ),
                    )
                },
            ),
            Rule::new(
                "caution",
                |t: &Tally| {
                    t.red >= t.thresholds.caution_red_count
                        || (t.red > 0 && t.green < t.thresholds.caution_green_floor)
                },
                |t: &Tally| {
                    (
                        Posture::Caution,
                        format!("{} RED against {} GREEN calls for caution: {}.", t.red, t.green, t.counts()),
                    )
                },
            ),
        ],
        "neutral",
        |t: &Tally| {
            (
                Posture::Neutral,
                format!("No decisive majority: {}.", t.counts()),
            )
        },
    )
}

/// Synthesize the posture for one evaluation pass.
pub fn synthesize(inputs: &[PostureInput], thresholds: &PostureThresholds) -> PostureReport {
    let tally = Tally::from_inputs(inputs, thresholds);
    let decision = table().decide(&tally);

    info!(
        posture = %decision.label,
        rule = decision.rule,
        available = tally.available,
        green = tally.green,
        yellow = tally.yellow,
        red = tally.red,
        "posture synthesized"
    );

    PostureReport {
        posture: decision.label,
        posture_reason: decision.reason,
        rule: decision.rule,
        available_count: tally.available,
        total_count: tally.total,
        green_count: tally.green,
        yellow_count: tally.yellow,
        red_count: tally.red,
        override_indicator: if decision.rule == "override_sell" {
            tally.override_red
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DisplayState;

    fn input(indicator: IndicatorId, state: DisplayState, signal: Signal) -> PostureInput {
        PostureInput {
            indicator,
            resolution: Resolution {
                state,
                signal: Some(signal),
                stale: state == DisplayState::Stale,
                age_hours: Some(1.0),
            },
        }
    }

    /// Twelve inputs: signals assigned in indicator order, all `success`.
    fn board(signals: &[Signal]) -> Vec<PostureInput> {
        IndicatorId::ALL
            .iter()
            .zip(signals)
            .map(|(id, s)| input(*id, DisplayState::Success, *s))
            .collect()
    }

    fn run(inputs: &[PostureInput]) -> PostureReport {
        synthesize(inputs, &PostureThresholds::default())
    }

    use Signal::{Green as G, Red as R, Yellow as Y};

    #[test]
    fn three_available_all_red_is_insufficient() {
        let mut inputs = board(&[R, R, R]);
        for id in &IndicatorId::ALL[3..] {
            inputs.push(PostureInput {
                indicator: *id,
                resolution: Resolution {
                    state: DisplayState::Awaiting,
                    signal: None,
                    stale: false,
                    age_hours: None,
                },
            });
        }
        let r = run(&inputs);
        assert_eq!(r.posture, Posture::InsufficientData);
        assert_eq!(r.available_count, 3);
        assert_eq!(r.total_count, 12);
        assert!(r.posture_reason.contains("Only 3 of 12"));
    }

    #[test]
    fn margin_red_overrides_a_buy_board() {
        // Indicator 6 is margin_level. Eleven greens plus a red margin.
        let signals = [G, G, G, G, G, R, G, G, G, G, G, G];
        let r = run(&board(&signals));
        assert_eq!(r.posture, Posture::Sell);
        assert_eq!(r.rule, "override_sell");
        assert_eq!(r.override_indicator, Some(IndicatorId::MarginLevel));
        assert!(r.posture_reason.contains("11 green"));
        assert!(r.posture_reason.contains("1 red"));
    }

    #[test]
    fn margin_red_overrides_a_neutral_board() {
        // By counts alone (1 red, 6 green, 5 yellow) this is NEUTRAL.
        let signals = [G, G, G, Y, Y, R, G, G, G, Y, Y, Y];
        let without_override = {
            let mut b = board(&signals);
            b[5].indicator = IndicatorId::VolatilityRange;
            b[11].indicator = IndicatorId::MarginLevel;
            b[11].resolution.signal = Some(Y);
            b[5].resolution.signal = Some(R);
            run(&b)
        };
        assert_eq!(without_override.posture, Posture::Neutral);

        let r = run(&board(&signals));
        assert_eq!(r.posture, Posture::Sell);
        assert_eq!(r.override_indicator, Some(IndicatorId::MarginLevel));
    }

    #[test]
    fn delivery_pressure_red_overrides() {
        // Indicator 5 is delivery_pressure.
        let signals = [G, G, G, G, R, G, G, G, G, G, G, G];
        let r = run(&board(&signals));
        assert_eq!(r.posture, Posture::Sell);
        assert_eq!(r.override_indicator, Some(IndicatorId::DeliveryPressure));
    }

    #[test]
    fn stale_override_does_not_veto() {
        let mut inputs = board(&[G, G, G, G, G, R, G, G, G, G, G, G]);
        inputs[5].resolution.state = DisplayState::Stale;
        inputs[5].resolution.stale = true;
        let r = run(&inputs);
        assert_eq!(r.posture, Posture::Buy);
        assert_eq!(r.available_count, 11);
    }

    #[test]
    fn red_majority_sells() {
        let signals = [R, R, G, G, G, G, G, R, R, G, G, G];
        let r = run(&board(&signals));
        assert_eq!((r.posture, r.rule), (Posture::Sell, "red_majority"));
        assert!(r.posture_reason.contains("4 indicators are RED"));
        assert!(r.override_indicator.is_none());
    }

    #[test]
    fn seven_green_one_stale_four_other() {
        // 7 green + 4 yellow available, one stale: 11 available -> BUY.
        let mut inputs = board(&[G, G, G, G, G, G, G, Y, Y, Y, Y, R]);
        inputs[11].resolution.state = DisplayState::Stale;
        let r = run(&inputs);
        assert_eq!(r.posture, Posture::Buy);
        assert_eq!(r.green_count, 7);

        // Only 7 available: the greens alone cannot call BUY.
        let mut inputs = board(&[G, G, G, G, G, G, G, Y, Y, Y, Y, Y]);
        for i in inputs.iter_mut().skip(7) {
            i.resolution.state = DisplayState::Error;
        }
        let r = run(&inputs);
        assert_eq!(r.posture, Posture::InsufficientData);
    }

    #[test]
    fn caution_and_neutral() {
        let r = run(&board(&[R, R, R, G, G, G, G, G, G, Y, Y, Y]));
        assert_eq!((r.posture, r.rule), (Posture::Caution, "caution"));

        let r = run(&board(&[R, G, G, G, Y, Y, Y, Y, Y, Y, Y, Y]));
        assert_eq!(r.posture, Posture::Caution);

        let r = run(&board(&[G, G, G, G, G, Y, Y, Y, Y, Y, Y, Y]));
        assert_eq!((r.posture, r.rule), (Posture::Neutral, "neutral"));
    }

    #[test]
    fn rule_precedence_is_fixed() {
        assert_eq!(
            table().names(),
            vec![
                "insufficient_data",
                "override_sell",
                "red_majority",
                "broad_green",
                "caution",
                "neutral"
            ]
        );
    }
}
