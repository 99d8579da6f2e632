//! Curated scenario list that replaces rule evaluation for one cluster.

use std::collections::HashSet;
use std::path::Path;

use crate::config::read_source;
use crate::error::ConfigError;
use crate::frame::RunKey;

/// Set of `model|scenario` strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_source(path)?;
        let entries: Vec<String> = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(entries))
    }

    pub fn contains(&self, run: &RunKey) -> bool {
        self.entries.contains(&run.pipe_joined())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
