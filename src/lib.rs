//! GARP rule induction for presence/absence data, with a best-subsets
//! procedure that runs many searches in parallel and combines the
//! acceptable ones into a consensus model.

pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod persistence;
pub mod types;

pub use error::{GarpError, Result};
pub use types::{Label, Sample};

pub use config::{AppConfig, BestSubsetsConfig, ConfigManager, GarpConfig};
pub use data::{InMemorySampleProvider, SampleProvider};
pub use engines::generation::{CancellationToken, GeneticSearch, Rule, RuleKind, RuleSet, RunResult};
pub use engines::validation::{BestSubsetsOrchestrator, BestSubsetsResult, EnsembleModel};
