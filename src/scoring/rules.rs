// =============================================================================
// Rule Table: ordered first-match-wins decision lists
// =============================================================================
//
// Every scorer (and the posture synthesizer) is a list of named
// (predicate, outcome) pairs evaluated top-to-bottom plus a fallback. The
// order is data, so precedence can be tested without running the scorer:
// `matching()` lists every rule whose predicate holds, `evaluate()` applies
// only the first.

use serde::Serialize;

use crate::types::Signal;

/// Decision label plus its human-readable, number-bearing reason.
pub type Outcome<L = Signal> = (L, String);

/// Final verdict of one scorer for one observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub signal: Signal,
    pub reason: String,
    /// Name of the rule that fired.
    pub rule: &'static str,
}

impl Verdict {
    pub fn new(signal: Signal, reason: impl Into<String>, rule: &'static str) -> Self {
        Self {
            signal,
            reason: reason.into(),
            rule,
        }
    }

    pub fn error(reason: impl Into<String>, rule: &'static str) -> Self {
        Self::new(Signal::Error, reason, rule)
    }
}

/// Result of a table whose label is not a signal (e.g. a posture).
#[derive(Debug, Clone, PartialEq)]
pub struct Decision<L> {
    pub label: L,
    pub reason: String,
    pub rule: &'static str,
}

pub struct Rule<C, L = Signal> {
    pub name: &'static str,
    pub when: fn(&C) -> bool,
    pub then: fn(&C) -> Outcome<L>,
}

impl<C, L> Rule<C, L> {
    pub fn new(name: &'static str, when: fn(&C) -> bool, then: fn(&C) -> Outcome<L>) -> Self {
        Self { name, when, then }
    }
}

pub struct RuleTable<C, L = Signal> {
    rules: Vec<Rule<C, L>>,
    fallback_name: &'static str,
    fallback: fn(&C) -> Outcome<L>,
}

impl<C, L> RuleTable<C, L> {
    pub fn new(
        rules: Vec<Rule<C, L>>,
        fallback_name: &'static str,
        fallback: fn(&C) -> Outcome<L>,
    ) -> Self {
        Self {
            rules,
            fallback_name,
            fallback,
        }
    }

    /// Rule names in evaluation order, fallback last.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules
            .iter()
            .map(|r| r.name)
            .chain(std::iter::once(self.fallback_name))
            .collect()
    }

    /// Every rule whose predicate holds for `ctx`, in order. The fallback
    /// always matches and is listed last.
    pub fn matching(&self, ctx: &C) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| (r.when)(ctx))
            .map(|r| r.name)
            .chain(std::iter::once(self.fallback_name))
            .collect()
    }

    /// Apply the first matching rule.
    pub fn decide(&self, ctx: &C) -> Decision<L> {
        let (rule, then) = self
            .rules
            .iter()
            .find(|r| (r.when)(ctx))
            .map(|r| (r.name, r.then))
            .unwrap_or((self.fallback_name, self.fallback));
        let (label, reason) = then(ctx);
        Decision {
            label,
            reason,
            rule,
        }
    }
}

impl<C> RuleTable<C, Signal> {
    pub fn evaluate(&self, ctx: &C) -> Verdict {
        let d = self.decide(ctx);
        Verdict::new(d.label, d.reason, d.rule)
    }
}
