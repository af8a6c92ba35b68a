use crate::config::{BestSubsetsConfig, GarpConfig};
use crate::data::SampleProvider;
use crate::engines::generation::{CancellationToken, GeneticSearch, RuleSet, SharedProgress};
use crate::error::{GarpError, Result};
use crate::types::Sample;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// A finished genetic search together with its validation errors.
#[derive(Debug, Clone)]
pub struct AlgorithmRun {
    pub run_id: usize,
    pub seed: u64,
    pub fittest: RuleSet,
    /// Fraction of held-out presences predicted absent.
    pub omission: f64,
    /// Mean prediction over background points.
    pub commission: f64,
    pub generations_run: usize,
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Accepted(AlgorithmRun),
    Rejected { run: AlgorithmRun, reason: String },
    Failed { run_id: usize, reason: String },
    Cancelled { run_id: usize },
}

impl RunOutcome {
    pub fn run_id(&self) -> usize {
        match self {
            RunOutcome::Accepted(run) => run.run_id,
            RunOutcome::Rejected { run, .. } => run.run_id,
            RunOutcome::Failed { run_id, .. } | RunOutcome::Cancelled { run_id } => *run_id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RunOutcome::Accepted(_))
    }

    pub fn run(&self) -> Option<&AlgorithmRun> {
        match self {
            RunOutcome::Accepted(run) | RunOutcome::Rejected { run, .. } => Some(run),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RunOutcome::Accepted(_) => None,
            RunOutcome::Rejected { reason, .. } | RunOutcome::Failed { reason, .. } => Some(reason),
            RunOutcome::Cancelled { .. } => Some("cancelled"),
        }
    }
}

/// Everything a worker needs to execute one run. Shared read-only between
/// the pool threads.
#[derive(Clone)]
pub struct RunContext {
    pub provider: Arc<dyn SampleProvider>,
    pub garp: GarpConfig,
    pub config: BestSubsetsConfig,
    pub base_seed: u64,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn seed_for(&self, run_id: usize) -> u64 {
        self.base_seed.wrapping_add(run_id as u64)
    }

    /// Execute run `run_id` and classify the result. Errors never escape:
    /// they become `Failed` or `Cancelled` outcomes.
    pub fn execute(&self, run_id: usize, progress: &mut SharedProgress) -> RunOutcome {
        match self.try_execute(run_id, progress) {
            Ok(run) => self.judge(run),
            Err(GarpError::Cancelled) => RunOutcome::Cancelled { run_id },
            Err(e) => RunOutcome::Failed {
                run_id,
                reason: e.to_string(),
            },
        }
    }

    fn try_execute(&self, run_id: usize, progress: &mut SharedProgress) -> Result<AlgorithmRun> {
        let seed = self.seed_for(run_id);
        let mut rng = StdRng::seed_from_u64(seed);

        let (train, test) = self.provider.split(self.config.training_proportion, &mut rng)?;

        let mut garp = self.garp.clone();
        garp.seed = Some(seed);
        if let Some(ms) = self.config.run_timeout_ms {
            garp.time_limit_ms = Some(ms);
        }

        let mut search = GeneticSearch::new(garp)?.with_cancellation(self.cancel.clone());
        let result = search.run(train.as_ref(), progress)?;

        let omission = omission_error(&result.fittest, &test, search.samples(), run_id);
        let background = train.background_samples(self.config.commission_sample_size, &mut rng);
        let commission = commission_error(&result.fittest, &background);

        Ok(AlgorithmRun {
            run_id,
            seed,
            fittest: result.fittest,
            omission,
            commission,
            generations_run: result.generations_run,
            converged: result.converged,
        })
    }

    fn judge(&self, run: AlgorithmRun) -> RunOutcome {
        if run.omission > self.config.max_omission {
            let reason = format!(
                "omission {:.4} above limit {:.4}",
                run.omission, self.config.max_omission
            );
            RunOutcome::Rejected { run, reason }
        } else if run.commission > self.config.max_commission {
            let reason = format!(
                "commission {:.4} above limit {:.4}",
                run.commission, self.config.max_commission
            );
            RunOutcome::Rejected { run, reason }
        } else {
            RunOutcome::Accepted(run)
        }
    }
}

/// Share of presences in `test` the rule set predicts absent. Falls back to
/// the training presences when nothing was held out.
pub fn omission_error(fittest: &RuleSet, test: &[Sample], training: &[Sample], run_id: usize) -> f64 {
    let held_out: Vec<&Sample> = test.iter().filter(|s| s.label().is_presence()).collect();
    let presences = if held_out.is_empty() {
        log::warn!(
            "Run {} has no held-out presences, computing omission on training presences",
            run_id
        );
        training.iter().filter(|s| s.label().is_presence()).collect()
    } else {
        held_out
    };

    if presences.is_empty() {
        return 0.0;
    }
    let omitted = presences.iter().filter(|s| fittest.get_value(s) < 0.5).count();
    omitted as f64 / presences.len() as f64
}

/// Mean predicted value over `background`, 0 for an empty draw.
pub fn commission_error(fittest: &RuleSet, background: &[Sample]) -> f64 {
    if background.is_empty() {
        return 0.0;
    }
    background.iter().map(|s| fittest.get_value(s)).sum::<f64>() / background.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::{Rule, RuleKind};
    use crate::types::Label;

    fn presence_box() -> RuleSet {
        let mut rs = RuleSet::new(4);
        rs.add(Rule::with_genes(RuleKind::Range, vec![0.0, 1.0], Label::Presence).unwrap());
        rs
    }

    #[test]
    fn test_omission_counts_missed_presences() {
        let test = vec![
            Sample::presence(vec![0.5]),
            Sample::presence(vec![-0.5]),
            Sample::presence(vec![0.9]),
            Sample::absence(vec![-0.9]),
        ];
        let omission = omission_error(&presence_box(), &test, &[], 0);
        assert!((omission - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_omission_falls_back_to_training() {
        let training = vec![Sample::presence(vec![-0.5]), Sample::absence(vec![0.5])];
        assert_eq!(omission_error(&presence_box(), &[], &training, 1), 1.0);
    }

    #[test]
    fn test_commission_is_mean_prediction() {
        let background = vec![Sample::absence(vec![0.5]), Sample::absence(vec![-0.5])];
        assert!((commission_error(&presence_box(), &background) - 0.5).abs() < 1e-12);
        assert_eq!(commission_error(&presence_box(), &[]), 0.0);
    }

    #[test]
    fn test_outcome_accessors() {
        let failed = RunOutcome::Failed {
            run_id: 3,
            reason: "no data".to_string(),
        };
        assert_eq!(failed.run_id(), 3);
        assert!(!failed.is_accepted());
        assert!(failed.run().is_none());
        assert_eq!(failed.reason(), Some("no data"));
    }
}
