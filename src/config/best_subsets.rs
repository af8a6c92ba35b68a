use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GarpError;
use serde::{Deserialize, Serialize};

/// Parameters of the best-subsets procedure. Proportions and error limits are
/// expressed as fractions in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BestSubsetsConfig {
    /// Share of presences used for training each run; the rest is held out.
    pub training_proportion: f64,
    /// Maximum number of runs attempted.
    pub total_runs: usize,
    /// Omission limit used for early termination. `1.0` means soft omission only.
    pub hard_omission_threshold: f64,
    pub models_under_omission_threshold: usize,
    /// Share of the omission-selected runs kept around the commission median.
    pub commission_threshold: f64,
    pub commission_sample_size: usize,
    /// Concurrency budget: maximum simultaneously active runs.
    pub max_threads: usize,
    /// Hard acceptance limit on omission error.
    pub max_omission: f64,
    /// Hard acceptance limit on commission error.
    pub max_commission: f64,
    /// Stop launching once this many runs were accepted. `0` disables it.
    pub target_accepted_runs: usize,
    /// Value a member rule set must reach to count in the consensus.
    pub member_threshold: f64,
    /// Wall-clock budget per run, checked once per generation.
    pub run_timeout_ms: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for BestSubsetsConfig {
    fn default() -> Self {
        Self {
            training_proportion: 0.5,
            total_runs: 20,
            hard_omission_threshold: 1.0,
            models_under_omission_threshold: 20,
            commission_threshold: 0.5,
            commission_sample_size: 10_000,
            max_threads: 1,
            max_omission: 1.0,
            max_commission: 1.0,
            target_accepted_runs: 0,
            member_threshold: 0.5,
            run_timeout_ms: None,
            seed: None,
        }
    }
}

impl BestSubsetsConfig {
    pub fn with_training_proportion(mut self, proportion: f64) -> Self {
        self.training_proportion = proportion;
        self
    }

    pub fn with_total_runs(mut self, n: usize) -> Self {
        self.total_runs = n;
        self
    }

    pub fn with_hard_omission_threshold(mut self, threshold: f64) -> Self {
        self.hard_omission_threshold = threshold;
        self
    }

    pub fn with_models_under_omission_threshold(mut self, n: usize) -> Self {
        self.models_under_omission_threshold = n;
        self
    }

    pub fn with_commission_threshold(mut self, threshold: f64) -> Self {
        self.commission_threshold = threshold;
        self
    }

    pub fn with_commission_sample_size(mut self, n: usize) -> Self {
        self.commission_sample_size = n;
        self
    }

    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn with_error_limits(mut self, max_omission: f64, max_commission: f64) -> Self {
        self.max_omission = max_omission;
        self.max_commission = max_commission;
        self
    }

    pub fn with_target_accepted_runs(mut self, n: usize) -> Self {
        self.target_accepted_runs = n;
        self
    }

    pub fn with_member_threshold(mut self, threshold: f64) -> Self {
        self.member_threshold = threshold;
        self
    }

    pub fn with_run_timeout_ms(mut self, ms: u64) -> Self {
        self.run_timeout_ms = Some(ms);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Soft omission: no early termination on the omission count.
    pub fn soft_omission(&self) -> bool {
        self.hard_omission_threshold >= 1.0
    }

    /// Number of omission-selected runs, never above the run budget.
    pub fn effective_models_under_omission(&self) -> usize {
        self.models_under_omission_threshold.min(self.total_runs)
    }
}

impl ConfigSection for BestSubsetsConfig {
    fn section_name() -> &'static str {
        "best_subsets"
    }

    fn validate(&self) -> Result<(), GarpError> {
        let manifest = self.to_manifest();
        manifest.check("TrainingProportion", self.training_proportion)?;
        manifest.check("TotalRuns", self.total_runs as f64)?;
        manifest.check("HardOmissionThreshold", self.hard_omission_threshold)?;
        manifest.check(
            "ModelsUnderOmissionThreshold",
            self.models_under_omission_threshold as f64,
        )?;
        manifest.check("CommissionThreshold", self.commission_threshold)?;
        manifest.check("CommissionSampleSize", self.commission_sample_size as f64)?;
        manifest.check("MaxThreads", self.max_threads as f64)?;
        manifest.check("MaxOmission", self.max_omission)?;
        manifest.check("MaxCommission", self.max_commission)?;
        manifest.check("MemberThreshold", self.member_threshold)?;
        if self.target_accepted_runs > self.total_runs {
            return Err(GarpError::Configuration(format!(
                "target_accepted_runs ({}) exceeds total_runs ({})",
                self.target_accepted_runs, self.total_runs
            )));
        }
        if self.run_timeout_ms == Some(0) {
            return Err(GarpError::Configuration(
                "run_timeout_ms must be positive or unset".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = Self::default();
        ConfigManifest {
            section: "BestSubsets".to_string(),
            fields: vec![
                FieldManifest::real(
                    "TrainingProportion",
                    defaults.training_proportion,
                    Some(0.0),
                    Some(1.0),
                    "Proportion of the occurrence data used to train the models",
                ),
                FieldManifest::integer(
                    "TotalRuns",
                    defaults.total_runs as i64,
                    Some(1.0),
                    Some(10_000.0),
                    "Maximum number of GARP runs to be performed",
                ),
                FieldManifest::real(
                    "HardOmissionThreshold",
                    defaults.hard_omission_threshold,
                    Some(0.0),
                    Some(1.0),
                    "Maximum acceptable omission error; 1.0 uses soft omission only",
                ),
                FieldManifest::integer(
                    "ModelsUnderOmissionThreshold",
                    defaults.models_under_omission_threshold as i64,
                    Some(0.0),
                    Some(10_000.0),
                    "Minimum number of models below the omission threshold",
                ),
                FieldManifest::real(
                    "CommissionThreshold",
                    defaults.commission_threshold,
                    Some(0.0),
                    Some(1.0),
                    "Share of the model distribution taken regarding commission error",
                ),
                FieldManifest::integer(
                    "CommissionSampleSize",
                    defaults.commission_sample_size as i64,
                    Some(1.0),
                    None,
                    "Number of background samples used to calculate commission error",
                ),
                FieldManifest::integer(
                    "MaxThreads",
                    defaults.max_threads as i64,
                    Some(1.0),
                    Some(1024.0),
                    "Maximum number of runs executing simultaneously",
                ),
                FieldManifest::real(
                    "MaxOmission",
                    defaults.max_omission,
                    Some(0.0),
                    Some(1.0),
                    "Omission error above which a run is rejected",
                ),
                FieldManifest::real(
                    "MaxCommission",
                    defaults.max_commission,
                    Some(0.0),
                    Some(1.0),
                    "Commission error above which a run is rejected",
                ),
                FieldManifest::real(
                    "MemberThreshold",
                    defaults.member_threshold,
                    Some(0.0),
                    Some(1.0),
                    "Value a member model must reach to contribute to the consensus",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = BestSubsetsConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.soft_omission());
    }

    #[test]
    fn test_thread_budget_bounds() {
        assert!(BestSubsetsConfig::default().with_max_threads(0).validate().is_err());
        assert!(BestSubsetsConfig::default().with_max_threads(1025).validate().is_err());
        assert!(BestSubsetsConfig::default().with_max_threads(8).validate().is_ok());
    }

    #[test]
    fn test_models_under_omission_capped_by_total_runs() {
        let config = BestSubsetsConfig::default()
            .with_total_runs(5)
            .with_models_under_omission_threshold(12);
        assert_eq!(config.effective_models_under_omission(), 5);
    }

    #[test]
    fn test_target_cannot_exceed_total() {
        let config = BestSubsetsConfig::default()
            .with_total_runs(3)
            .with_target_accepted_runs(4);
        assert!(config.validate().is_err());
    }
}
