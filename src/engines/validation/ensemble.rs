use super::run::AlgorithmRun;
use crate::engines::generation::RuleSet;
use crate::error::{GarpError, Result};
use crate::types::Sample;

/// One rule set taking part in the consensus.
#[derive(Debug, Clone)]
pub struct EnsembleMember {
    pub ruleset: RuleSet,
    pub weight: f64,
    /// Member values below this count as absence.
    pub threshold: f64,
    pub run_id: Option<usize>,
    pub omission: Option<f64>,
    pub commission: Option<f64>,
}

/// Weighted consensus of several rule sets.
#[derive(Debug, Clone, Default)]
pub struct EnsembleModel {
    members: Vec<EnsembleMember>,
}

impl EnsembleModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&mut self, ruleset: RuleSet, weight: f64, threshold: f64) -> Result<()> {
        self.push(EnsembleMember {
            ruleset,
            weight,
            threshold,
            run_id: None,
            omission: None,
            commission: None,
        })
    }

    /// Add a validated run, keeping its errors alongside the rule set.
    pub fn add_run(&mut self, run: &AlgorithmRun, weight: f64, threshold: f64) -> Result<()> {
        self.push(EnsembleMember {
            ruleset: run.fittest.clone(),
            weight,
            threshold,
            run_id: Some(run.run_id),
            omission: Some(run.omission),
            commission: Some(run.commission),
        })
    }

    pub fn push(&mut self, member: EnsembleMember) -> Result<()> {
        if !member.weight.is_finite() || member.weight < 0.0 {
            return Err(GarpError::Configuration(format!(
                "Ensemble weight must be finite and non-negative (got {})",
                member.weight
            )));
        }
        if !(0.0..=1.0).contains(&member.threshold) {
            return Err(GarpError::Configuration(format!(
                "Ensemble threshold must be within [0, 1] (got {})",
                member.threshold
            )));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn sum_weights(&self) -> f64 {
        self.members.iter().map(|m| m.weight).sum()
    }

    /// `Σ w·v / Σ w` over members, where a member value below its threshold
    /// counts as 0. Returns 0 when the weights sum to zero.
    pub fn get_value(&self, sample: &Sample) -> f64 {
        let total = self.sum_weights();
        if total <= 0.0 {
            return 0.0;
        }
        let votes: f64 = self
            .members
            .iter()
            .map(|m| {
                let v = m.ruleset.get_value(sample);
                if v >= m.threshold {
                    v * m.weight
                } else {
                    0.0
                }
            })
            .sum();
        (votes / total).clamp(0.0, 1.0)
    }
}
