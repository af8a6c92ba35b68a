use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::GarpError;
use serde::{Deserialize, Serialize};

/// Parameters of a single genetic rule search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarpConfig {
    pub max_generations: usize,
    pub convergence_limit: f64,
    pub population_size: usize,
    pub resamples: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    /// Share of the next offspring population bred from the fittest set.
    pub gap_size: f64,
    /// Minimum significance a rule needs to survive the final filter.
    pub significance: f64,
    pub parallel_evaluation: bool,
    pub seed: Option<u64>,
    /// Optional wall-clock budget for one run, checked once per generation.
    pub time_limit_ms: Option<u64>,
}

impl Default for GarpConfig {
    fn default() -> Self {
        Self {
            max_generations: 100,
            convergence_limit: 0.05,
            population_size: 50,
            resamples: 2500,
            mutation_rate: 0.25,
            crossover_rate: 0.25,
            gap_size: 0.1,
            significance: 2.70,
            parallel_evaluation: false,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl GarpConfig {
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_convergence_limit(mut self, limit: f64) -> Self {
        self.convergence_limit = limit;
        self
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_resamples(mut self, n: usize) -> Self {
        self.resamples = n;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_gap_size(mut self, gap: f64) -> Self {
        self.gap_size = gap;
        self
    }

    pub fn with_significance(mut self, significance: f64) -> Self {
        self.significance = significance;
        self
    }

    pub fn with_parallel_evaluation(mut self, parallel: bool) -> Self {
        self.parallel_evaluation = parallel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }
}

impl ConfigSection for GarpConfig {
    fn section_name() -> &'static str {
        "garp"
    }

    fn validate(&self) -> Result<(), GarpError> {
        let manifest = self.to_manifest();
        manifest.check("MaxGenerations", self.max_generations as f64)?;
        manifest.check("ConvergenceLimit", self.convergence_limit)?;
        manifest.check("PopulationSize", self.population_size as f64)?;
        manifest.check("Resamples", self.resamples as f64)?;
        manifest.check("MutationRate", self.mutation_rate)?;
        manifest.check("CrossoverRate", self.crossover_rate)?;
        manifest.check("GapSize", self.gap_size)?;
        manifest.check("Significance", self.significance)?;
        if self.time_limit_ms == Some(0) {
            return Err(GarpError::Configuration(
                "time_limit_ms must be positive or unset".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = Self::default();
        ConfigManifest {
            section: "Garp".to_string(),
            fields: vec![
                FieldManifest::integer(
                    "MaxGenerations",
                    defaults.max_generations as i64,
                    Some(1.0),
                    None,
                    "Maximum number of generations run by the genetic algorithm",
                ),
                FieldManifest::real(
                    "ConvergenceLimit",
                    defaults.convergence_limit,
                    Some(0.0),
                    Some(1.0),
                    "Convergence value that stops the algorithm before MaxGenerations",
                ),
                FieldManifest::integer(
                    "PopulationSize",
                    defaults.population_size as i64,
                    Some(1.0),
                    Some(500.0),
                    "Maximum number of rules kept in the solution",
                ),
                FieldManifest::integer(
                    "Resamples",
                    defaults.resamples as i64,
                    Some(1.0),
                    Some(100_000.0),
                    "Number of points sampled with replacement to test rules",
                ),
                FieldManifest::real(
                    "MutationRate",
                    defaults.mutation_rate,
                    Some(0.0),
                    Some(1.0),
                    "Probability of mutating an offspring rule",
                ),
                FieldManifest::real(
                    "CrossoverRate",
                    defaults.crossover_rate,
                    Some(0.0),
                    Some(1.0),
                    "Share of offspring rules taking part in crossover",
                ),
                FieldManifest::real(
                    "GapSize",
                    defaults.gap_size,
                    Some(0.0),
                    Some(1.0),
                    "Share of the offspring bred from the fittest rules",
                ),
                FieldManifest::real(
                    "Significance",
                    defaults.significance,
                    Some(0.0),
                    None,
                    "Minimum significance of rules kept in the final model",
                ),
            ],
        }
    }
}
