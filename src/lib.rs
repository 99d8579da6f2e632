//! IMP Cluster Classifier
//!
//! Flags IAM scenario runs as members of archetypal mitigation-pathway
//! clusters (the IMP clusters) from declarative threshold rules:
//! - Required-data gate with an alternate fallback
//! - Absolute, change, share and cumulative rule evaluation
//! - Curated allow-list override
//! - In-memory time-series frame with filter/offset/interpolate/validate

pub mod allowlist;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod requirements;
pub mod rules;
pub mod utils;

// Re-exports for convenience
pub use allowlist::AllowList;
pub use config::{ClassifierSettings, ClusterConfig};
pub use engine::{classify_all, ClusterClassifier, Membership, RunOutcome};
pub use error::{ClassifyError, ConfigError, QueryError};
pub use frame::{IamFrame, Measurand, Observation, RunKey};
pub use requirements::RequiredDataSpec;
pub use rules::{Bound, Evaluation, RuleCatalog, RuleDescriptor};
