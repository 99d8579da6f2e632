//! Rule Evaluator
//!
//! Executes one rule against one run's data slice.

use tracing::debug;

use super::share::derived_ratio;
use crate::error::ClassifyError;
use crate::frame::{IamFrame, RunKey, Selector, TimeSeriesQuery};
use crate::rules::{Evaluation, RuleDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Satisfied,
    Violated,
}

impl Verdict {
    pub fn is_violated(self) -> bool {
        self == Verdict::Violated
    }

    fn from_violation(violated: bool) -> Self {
        if violated {
            Verdict::Violated
        } else {
            Verdict::Satisfied
        }
    }
}

/// Per-run inputs shared by every rule of a cluster
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub run: &'a RunKey,
    pub region: &'a str,
    /// Set when the run passed the gate only on alternate requirements
    pub use_substitutes: bool,
    /// Native year grid of the run
    pub time_grid: &'a [i32],
}

/// Decides a single rule for a single run
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, rule: &RuleDescriptor, slice: &IamFrame, ctx: &EvalContext<'_>) -> Result<Verdict, ClassifyError>;
}

/// Evaluates rules against the time-series query primitives
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEvaluator;

impl RuleEvaluator for StandardEvaluator {
    fn evaluate(&self, rule: &RuleDescriptor, slice: &IamFrame, ctx: &EvalContext<'_>) -> Result<Verdict, ClassifyError> {
        evaluate_rule(rule, slice, ctx)
    }
}

pub fn evaluate_rule<Q: TimeSeriesQuery>(
    rule: &RuleDescriptor,
    slice: &Q,
    ctx: &EvalContext<'_>,
) -> Result<Verdict, ClassifyError> {
    let scope = Selector::new().run(ctx.run).region(ctx.region);
    let criteria = rule.criteria();

    let verdict = match rule.evaluation {
        Evaluation::Absolute { year } => {
            let selector = scope.measurand(&rule.measurand()).year(year);
            Verdict::from_violation(slice.validate(&criteria, &selector).is_some())
        }
        Evaluation::Change { start, end } => {
            let selector = scope.measurand(&rule.measurand()).year(end);
            let rebased = slice.offset(start)?;
            Verdict::from_violation(rebased.validate(&criteria, &selector).is_some())
        }
        Evaluation::Share { year } => {
            let numerators = match (&rule.substitutes, ctx.use_substitutes) {
                (Some(substitutes), true) => substitutes.clone(),
                _ => vec![rule.variable().to_string()],
            };
            let selector = scope.year(year);
            let ratio = derived_ratio(slice, &numerators, rule.category(), &rule.unit, &selector)?;
            Verdict::from_violation(ratio.validate(&criteria, &selector).is_some())
        }
        Evaluation::Cumulative { start, end } => {
            let selector = scope.measurand(&rule.measurand()).year_range(start, end);
            let window = slice.filter(&selector).interpolate(ctx.time_grid)?;
            let negative: f64 = window
                .observations()
                .iter()
                .filter(|o| o.value < 0.0)
                .map(|o| -o.value)
                .sum();
            debug!("{}: cumulative negative magnitude {} over {}-{}", rule.key, negative, start, end);
            // Violated when the magnitude does not exceed the threshold
            Verdict::from_violation(negative <= rule.threshold)
        }
    };

    debug!(
        "{} [{}] {} {} for {}: {:?}",
        rule.key,
        rule.evaluation.kind(),
        rule.bound,
        rule.threshold,
        ctx.run,
        verdict
    );
    Ok(verdict)
}
