//! Rule Catalog
//!
//! Declarative threshold rules that decide cluster membership. Each rule
//! names a variable, a one-sided bound and how the variable is read
//! (absolute level, change over a range, share of its parent category, or
//! cumulative negative excursion).

mod catalog;

pub use catalog::RuleCatalog;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::{Criteria, Measurand};

/// Separates a variable identifier from a disambiguating qualifier
pub const QUALIFIER_SEPARATOR: char = '@';
/// Separates levels of the variable hierarchy
pub const HIERARCHY_SEPARATOR: char = '|';

/// Direction of the inclusive threshold check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// value <= threshold
    Upper,
    /// value >= threshold
    Lower,
}

impl Bound {
    pub fn criteria(self, threshold: f64) -> Criteria {
        match self {
            Bound::Upper => Criteria::upper(threshold),
            Bound::Lower => Criteria::lower(threshold),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Upper => write!(f, "upper"),
            Bound::Lower => write!(f, "lower"),
        }
    }
}

/// How a rule reads its variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Absolute { year: i32 },
    /// Value at `end` relative to the value at `start`
    Change { start: i32, end: i32 },
    /// Value as a fraction of the variable's top-level category
    Share { year: i32 },
    /// Summed magnitude of negative values over `start <= year < end`
    Cumulative { start: i32, end: i32 },
}

impl Evaluation {
    pub fn kind(&self) -> &'static str {
        match self {
            Evaluation::Absolute { .. } => "abs",
            Evaluation::Change { .. } => "change",
            Evaluation::Share { .. } => "share",
            Evaluation::Cumulative { .. } => "cum",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDescriptor {
    /// Catalog key, possibly carrying an `@` qualifier
    pub key: String,
    pub bound: Bound,
    pub threshold: f64,
    pub evaluation: Evaluation,
    pub unit: String,
    /// Variables whose sum replaces this one when a run passed the gate on
    /// its alternate requirements
    pub substitutes: Option<Vec<String>>,
}

impl RuleDescriptor {
    pub fn new(key: impl Into<String>, unit: impl Into<String>, bound: Bound, threshold: f64, evaluation: Evaluation) -> Self {
        Self {
            key: key.into(),
            bound,
            threshold,
            evaluation,
            unit: unit.into(),
            substitutes: None,
        }
    }

    pub fn with_substitutes<I, S>(mut self, substitutes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.substitutes = Some(substitutes.into_iter().map(Into::into).collect());
        self
    }

    /// Variable name with any `@` qualifier stripped
    pub fn variable(&self) -> &str {
        self.key
            .split_once(QUALIFIER_SEPARATOR)
            .map_or(self.key.as_str(), |(base, _)| base)
    }

    /// Top level of the variable hierarchy, e.g. `Primary Energy`
    pub fn category(&self) -> &str {
        let variable = self.variable();
        variable
            .split_once(HIERARCHY_SEPARATOR)
            .map_or(variable, |(top, _)| top)
    }

    pub fn measurand(&self) -> Measurand {
        Measurand::new(self.variable(), &self.unit)
    }

    pub fn criteria(&self) -> Criteria {
        self.bound.criteria(self.threshold)
    }
}
