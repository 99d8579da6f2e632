use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ClassifierSettings, DEFAULT_REGION};
use crate::allowlist::AllowList;
use crate::error::ConfigError;
use crate::requirements::RequiredDataSpec;
use crate::rules::RuleCatalog;

/// Everything needed to classify runs against one cluster.
///
/// Built once and never mutated; the classifier only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub name: String,
    pub region: String,
    pub rules: RuleCatalog,
    pub requirements: RequiredDataSpec,
    /// Fallback requirements; a run that only satisfies these is evaluated
    /// with substitute variables
    pub alternate_requirements: Option<RequiredDataSpec>,
    /// When set, replaces rule evaluation entirely
    pub allow_list: Option<AllowList>,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>, rules: RuleCatalog, requirements: RequiredDataSpec) -> Self {
        Self {
            name: name.into(),
            region: DEFAULT_REGION.to_string(),
            rules,
            requirements,
            alternate_requirements: None,
            allow_list: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_alternate_requirements(mut self, requirements: RequiredDataSpec) -> Self {
        self.alternate_requirements = Some(requirements);
        self
    }

    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    /// Load a cluster from a definitions directory laid out as
    ///
    /// ```text
    /// variable/*<cluster>*.yaml
    /// requirements/req_data_<cluster>.yaml
    /// requirements/req_data_<cluster>_alt.yaml   (optional)
    /// ```
    ///
    /// plus the allow-list configured for the cluster, if any.
    pub fn from_definitions(settings: &ClassifierSettings, name: &str) -> Result<Self, ConfigError> {
        let dir = &settings.definitions_dir;
        let lower = name.to_lowercase();

        let mut rules = RuleCatalog::default();
        for path in catalog_files(&dir.join("variable"), &lower)? {
            debug!("Reading rule catalog {}", path.display());
            rules.extend(RuleCatalog::from_file(&path)?);
        }

        let requirements_dir = dir.join("requirements");
        let requirements = RequiredDataSpec::from_file(&requirements_dir.join(format!("req_data_{}.yaml", lower)))?;

        let alt_path = requirements_dir.join(format!("req_data_{}_alt.yaml", lower));
        let alternate_requirements = if alt_path.is_file() {
            Some(RequiredDataSpec::from_file(&alt_path)?)
        } else {
            None
        };

        let allow_list = settings
            .allow_list_path(name)
            .map(|path| AllowList::from_file(&path))
            .transpose()?;

        if rules.is_empty() && allow_list.is_none() {
            return Err(ConfigError::MissingCatalog {
                cluster: name.to_string(),
                dir: dir.join("variable"),
            });
        }

        info!(
            "Loaded cluster '{}': {} rules, alternate requirements: {}, allow-list: {}",
            name,
            rules.len(),
            alternate_requirements.is_some(),
            allow_list.as_ref().map_or(0, AllowList::len)
        );

        Ok(Self {
            name: name.to_string(),
            region: settings.region.clone(),
            rules,
            requirements,
            alternate_requirements,
            allow_list,
        })
    }
}

/// YAML files whose name contains the cluster name, in file-name order
fn catalog_files(dir: &Path, cluster: &str) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
        let matches_cluster = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.to_lowercase().contains(cluster));
        if path.is_file() && is_yaml && matches_cluster {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
