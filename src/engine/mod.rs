//! Classification Engine
//!
//! Decides, run by run, whether a scenario belongs to a cluster:
//!
//! 1. Required-data gate (with the alternate fallback when the cluster has one)
//! 2. Allow-list lookup, for clusters defined by a curated list
//! 3. Rules in catalog order, stopping at the first violation
//!
//! Every run in the frame receives exactly one 0/1 flag in the metadata
//! column named after the cluster.

mod evaluator;
mod share;

pub use evaluator::{evaluate_rule, EvalContext, RuleEvaluator, StandardEvaluator, Verdict};
pub use share::{derived_ratio, RATIO_UNIT};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::error::ClassifyError;
use crate::frame::{IamFrame, Measurand, RunKey, TimeSeriesQuery};
use crate::rules::RuleDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    NonMember,
    Member,
}

impl Membership {
    pub fn flag(self) -> u8 {
        match self {
            Membership::NonMember => 0,
            Membership::Member => 1,
        }
    }
}

impl From<bool> for Membership {
    fn from(member: bool) -> Self {
        if member {
            Membership::Member
        } else {
            Membership::NonMember
        }
    }
}

/// Why a run ended up with its flag
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Resolution {
    MissingData { missing: Vec<Measurand> },
    AllowList { listed: bool },
    RuleViolated { rule: String },
    AllRulesSatisfied { substitutes: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run: RunKey,
    pub cluster: String,
    pub membership: Membership,
    pub resolution: Resolution,
}

/// Result of the required-data gate
#[derive(Debug, Clone, PartialEq)]
enum Gate {
    Open { use_substitutes: bool },
    Closed { missing: Vec<Measurand> },
}

pub struct ClusterClassifier {
    config: ClusterConfig,
    evaluator: Arc<dyn RuleEvaluator>,
}

impl ClusterClassifier {
    pub fn new(config: ClusterConfig) -> Self {
        Self::with_evaluator(config, Arc::new(StandardEvaluator))
    }

    pub fn with_evaluator(config: ClusterConfig, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        Self { config, evaluator }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    fn gate(&self, slice: &IamFrame, run: &RunKey) -> Gate {
        let missing = self.config.requirements.missing_for_model(slice, &run.model);
        if missing.is_empty() {
            return Gate::Open { use_substitutes: false };
        }

        let Some(alternate) = &self.config.alternate_requirements else {
            return Gate::Closed { missing };
        };
        let missing_alt = alternate.missing_for_model(slice, &run.model);
        if missing_alt.is_empty() {
            debug!("{} passes '{}' gate on alternate requirements", run, self.config.name);
            Gate::Open { use_substitutes: true }
        } else {
            let mut all = missing;
            all.extend(missing_alt);
            all.sort();
            all.dedup();
            Gate::Closed { missing: all }
        }
    }

    fn first_violation<'r>(
        &'r self,
        slice: &IamFrame,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<&'r RuleDescriptor>, ClassifyError> {
        for rule in self.config.rules.iter() {
            if self.evaluator.evaluate(rule, slice, ctx)?.is_violated() {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    /// Classify one run of the frame
    pub fn classify_run(&self, frame: &IamFrame, run: &RunKey) -> Result<RunOutcome, ClassifyError> {
        self.classify_slice(run, &frame.run_slice(run))
    }

    /// Classify one run given only its own rows
    pub fn classify_slice(&self, run: &RunKey, slice: &IamFrame) -> Result<RunOutcome, ClassifyError> {
        let resolution = match self.gate(slice, run) {
            Gate::Closed { missing } => {
                info!(
                    "{} failed '{}' required variable check: missing {}",
                    run,
                    self.config.name,
                    missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                );
                Resolution::MissingData { missing }
            }
            Gate::Open { .. } if self.config.allow_list.is_some() => {
                let listed = self.config.allow_list.as_ref().map_or(false, |list| list.contains(run));
                info!("{} {} '{}' allow-list", run, if listed { "on" } else { "not on" }, self.config.name);
                Resolution::AllowList { listed }
            }
            Gate::Open { use_substitutes } => {
                let grid = slice.years();
                let ctx = EvalContext {
                    run,
                    region: &self.config.region,
                    use_substitutes,
                    time_grid: &grid,
                };
                match self.first_violation(slice, &ctx)? {
                    Some(rule) => {
                        info!("{} failed '{}' variable validation check (var: {})", run, self.config.name, rule.key);
                        Resolution::RuleViolated { rule: rule.key.clone() }
                    }
                    None => {
                        info!("{} accepted into '{}'", run, self.config.name);
                        Resolution::AllRulesSatisfied { substitutes: use_substitutes }
                    }
                }
            }
        };

        let membership = Membership::from(matches!(
            resolution,
            Resolution::AllowList { listed: true } | Resolution::AllRulesSatisfied { .. }
        ));

        Ok(RunOutcome {
            run: run.clone(),
            cluster: self.config.name.clone(),
            membership,
            resolution,
        })
    }

    /// Classify every run, in index order
    pub fn classify_runs(&self, frame: &IamFrame) -> Result<Vec<RunOutcome>, ClassifyError> {
        frame
            .split_runs()
            .iter()
            .map(|(run, slice)| self.classify_slice(run, slice))
            .collect()
    }

    /// Classify every run concurrently; outcomes come back in index order
    pub fn classify_runs_parallel(&self, frame: &IamFrame) -> Result<Vec<RunOutcome>, ClassifyError> {
        let slices: Vec<(RunKey, IamFrame)> = frame.split_runs().into_iter().collect();
        slices
            .par_iter()
            .map(|(run, slice)| self.classify_slice(run, slice))
            .collect()
    }

    /// Annotate the frame with this cluster's membership column
    pub fn apply(&self, mut frame: IamFrame) -> Result<IamFrame, ClassifyError> {
        let slices = frame.split_runs();
        let mut members = 0;
        for (run, slice) in &slices {
            let outcome = self.classify_slice(run, slice)?;
            frame.set_meta(&self.config.name, run, outcome.membership.flag());
            if outcome.membership == Membership::Member {
                members += 1;
            }
        }
        info!("Cluster '{}': {}/{} runs are members", self.config.name, members, slices.len());
        Ok(frame)
    }

    /// Same as [`apply`](Self::apply), with runs classified on the rayon pool
    pub fn apply_parallel(&self, frame: IamFrame) -> Result<IamFrame, ClassifyError> {
        let outcomes = self.classify_runs_parallel(&frame)?;
        Ok(self.annotate(frame, &outcomes))
    }

    fn annotate(&self, mut frame: IamFrame, outcomes: &[RunOutcome]) -> IamFrame {
        for outcome in outcomes {
            frame.set_meta(&self.config.name, &outcome.run, outcome.membership.flag());
        }
        let members = outcomes.iter().filter(|o| o.membership == Membership::Member).count();
        info!("Cluster '{}': {}/{} runs are members", self.config.name, members, outcomes.len());
        frame
    }
}

/// Apply several clusters in turn, each adding its own column
pub fn classify_all(frame: IamFrame, classifiers: &[ClusterClassifier]) -> Result<IamFrame, ClassifyError> {
    classifiers
        .iter()
        .try_fold(frame, |frame, classifier| classifier.apply(frame))
}
