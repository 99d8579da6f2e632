//! Time-series query primitives consumed by the classification engine.

use std::collections::BTreeSet;
use tracing::debug;

use super::{IamFrame, Measurand, Observation, RunKey};
use crate::error::QueryError;

/// Which years a selector keeps
#[derive(Debug, Clone, Default, PartialEq)]
pub enum YearFilter {
    #[default]
    Any,
    Single(i32),
    /// Half-open: `start <= year < end`
    Range { start: i32, end: i32 },
}

impl YearFilter {
    pub fn matches(&self, year: i32) -> bool {
        match self {
            YearFilter::Any => true,
            YearFilter::Single(y) => *y == year,
            YearFilter::Range { start, end } => (*start..*end).contains(&year),
        }
    }
}

/// Row selector over the index columns; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub run: Option<RunKey>,
    pub region: Option<String>,
    pub variable: Option<String>,
    pub unit: Option<String>,
    pub years: YearFilter,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(mut self, run: &RunKey) -> Self {
        self.run = Some(run.clone());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn measurand(mut self, measurand: &Measurand) -> Self {
        self.variable = Some(measurand.variable.clone());
        self.unit = Some(measurand.unit.clone());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.years = YearFilter::Single(year);
        self
    }

    pub fn year_range(mut self, start: i32, end: i32) -> Self {
        self.years = YearFilter::Range { start, end };
        self
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        self.run
            .as_ref()
            .map_or(true, |r| r.model == obs.model && r.scenario == obs.scenario)
            && self.region.as_deref().map_or(true, |r| r == obs.region)
            && self.variable.as_deref().map_or(true, |v| v == obs.variable)
            && self.unit.as_deref().map_or(true, |u| u == obs.unit)
            && self.years.matches(obs.year)
    }
}

/// One-sided (or two-sided) inclusive bounds. NaN never violates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Criteria {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl Criteria {
    pub fn upper(threshold: f64) -> Self {
        Self { upper: Some(threshold), lower: None }
    }

    pub fn lower(threshold: f64) -> Self {
        Self { upper: None, lower: Some(threshold) }
    }

    pub fn is_violated_by(&self, value: f64) -> bool {
        self.upper.map_or(false, |u| value > u) || self.lower.map_or(false, |l| value < l)
    }
}

/// Query interface of the scenario data store
pub trait TimeSeriesQuery: Sized {
    fn observations(&self) -> &[Observation];

    fn from_observations(rows: Vec<Observation>) -> Self;

    /// Keep the rows matching every set field of the selector
    fn filter(&self, selector: &Selector) -> Self;

    /// Rebase every series on its value at `reference_year`
    fn offset(&self, reference_year: i32) -> Result<Self, QueryError>;

    /// Linearly fill `years` inside each series' observed span
    fn interpolate(&self, years: &[i32]) -> Result<Self, QueryError>;

    /// Rows of the selected slice that break the criteria, or `None` if all hold
    fn validate(&self, criteria: &Criteria, selector: &Selector) -> Option<Vec<Observation>> {
        let failing: Vec<Observation> = self
            .observations()
            .iter()
            .filter(|o| selector.matches(o) && criteria.is_violated_by(o.value))
            .cloned()
            .collect();
        if failing.is_empty() {
            None
        } else {
            Some(failing)
        }
    }

    /// Distinct years present, ascending
    fn years(&self) -> Vec<i32> {
        self.observations()
            .iter()
            .map(|o| o.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl TimeSeriesQuery for IamFrame {
    fn observations(&self) -> &[Observation] {
        &self.data
    }

    fn from_observations(rows: Vec<Observation>) -> Self {
        IamFrame::new(rows)
    }

    fn filter(&self, selector: &Selector) -> Self {
        self.data.iter().filter(|o| selector.matches(o)).cloned().collect()
    }

    fn offset(&self, reference_year: i32) -> Result<Self, QueryError> {
        let mut rebased = Vec::with_capacity(self.data.len());
        for (series, rows) in self.group_series() {
            let mut reference = rows.iter().filter(|o| o.year == reference_year);
            let base = match (reference.next(), reference.next()) {
                (Some(base), None) => base.value,
                (Some(_), Some(_)) => {
                    return Err(QueryError::DuplicateYear {
                        series: series.to_string(),
                        year: reference_year,
                    })
                }
                (None, _) => {
                    debug!("Series {} has no value in {}, dropped from offset view", series, reference_year);
                    continue;
                }
            };
            rebased.extend(rows.iter().map(|o| o.with_value(o.year, o.value - base)));
        }
        Ok(IamFrame::new(rebased))
    }

    fn interpolate(&self, years: &[i32]) -> Result<Self, QueryError> {
        let mut out = Vec::with_capacity(self.data.len());
        for (series, mut rows) in self.group_series() {
            rows.sort_by_key(|o| o.year);
            if let Some(pair) = rows.windows(2).find(|w| w[0].year == w[1].year) {
                return Err(QueryError::DuplicateYear {
                    series: series.to_string(),
                    year: pair[0].year,
                });
            }
            out.extend(rows.iter().map(|o| (*o).clone()));

            for pair in rows.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                for &year in years.iter().filter(|&&y| a.year < y && y < b.year) {
                    let t = f64::from(year - a.year) / f64::from(b.year - a.year);
                    out.push(series.observation(year, a.value + (b.value - a.value) * t));
                }
            }
        }
        out.sort_by(|a, b| a.series_key().cmp(&b.series_key()).then(a.year.cmp(&b.year)));
        out.dedup_by(|a, b| a.year == b.year && a.series_key() == b.series_key());
        Ok(IamFrame::new(out))
    }
}
