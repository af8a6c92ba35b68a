//! Conversion between models and [`ModelTree`] documents.
//!
//! Layout:
//!
//! ```text
//! Garp        Generations Significance FinalCrossoverRate FinalMutationRate FinalGapSize Convergence
//!   FittestRules   Count
//!     Rule         Type Prediction Genes Performance [Dimension]
//! BestSubsets Count Weights Thresholds CreatedAt
//!   Run            [RunId] [Omission] [Commission]
//!     FittestRules ...
//! ```

use super::tree::{AttrValue, ModelTree};
use crate::config::GarpConfig;
use crate::engines::evaluation::performance::{Performance, PERF_SLOTS};
use crate::engines::generation::{Rule, RuleKind, RuleSet, RunResult};
use crate::engines::validation::{EnsembleMember, EnsembleModel};
use crate::error::{GarpError, Result};
use crate::types::Label;

pub const RULE_NODE: &str = "Rule";
pub const RULESET_NODE: &str = "FittestRules";
pub const GARP_NODE: &str = "Garp";
pub const ENSEMBLE_NODE: &str = "BestSubsets";
pub const RUN_NODE: &str = "Run";

pub fn encode_rule(rule: &Rule) -> ModelTree {
    let mut node = ModelTree::new(RULE_NODE)
        .with_attr("Type", AttrValue::Str(rule.kind().tag().to_string()))
        .with_attr("Prediction", AttrValue::Real(rule.prediction().value()))
        .with_attr("Genes", AttrValue::RealArray(rule.genes().to_vec()))
        .with_attr("Performance", AttrValue::RealArray(rule.performance().to_vec()));
    if let RuleKind::Atomic { dimension } = rule.kind() {
        node.set_attr("Dimension", AttrValue::Int(dimension as i64));
    }
    node
}

pub fn decode_rule(node: &ModelTree) -> Result<Rule> {
    expect_name(node, RULE_NODE)?;

    let kind = match node.attr_str("Type")? {
        "d" => RuleKind::Range,
        "!" => RuleKind::NegatedRange,
        "r" => RuleKind::Logit,
        "a" => RuleKind::Atomic {
            dimension: node.attr_usize("Dimension")?,
        },
        other => {
            return Err(GarpError::Serialization(format!("Unknown rule type '{}'", other)));
        }
    };
    let prediction = Label::from_value(node.attr_f64("Prediction")?);
    let genes = node.attr_f64_array("Genes")?.to_vec();

    let values = node.attr_f64_array("Performance")?;
    if values.len() != PERF_SLOTS {
        return Err(GarpError::Serialization(format!(
            "Rule performance needs {} values (got {})",
            PERF_SLOTS,
            values.len()
        )));
    }
    let mut performance: Performance = [0.0; PERF_SLOTS];
    performance.copy_from_slice(values);

    Rule::from_parts(kind, genes, prediction, performance)
        .map_err(|e| GarpError::Serialization(e.to_string()))
}

pub fn encode_ruleset(ruleset: &RuleSet) -> ModelTree {
    let mut node = ModelTree::new(RULESET_NODE)
        .with_attr("Count", AttrValue::Int(ruleset.num_rules() as i64));
    for rule in ruleset {
        node.add_subsection(encode_rule(rule));
    }
    node
}

/// Rebuild a rule set whose capacity equals its stored count.
pub fn decode_ruleset(node: &ModelTree) -> Result<RuleSet> {
    expect_name(node, RULESET_NODE)?;
    let count = node.attr_usize("Count")?;
    let rules: Vec<&ModelTree> = node.subsections_named(RULE_NODE).collect();
    if rules.len() != count {
        return Err(GarpError::Serialization(format!(
            "FittestRules declares {} rules but holds {}",
            count,
            rules.len()
        )));
    }

    let mut ruleset = RuleSet::new(count.max(1));
    for child in rules {
        if ruleset.add(decode_rule(child)?) == 0 {
            return Err(GarpError::Serialization("Stored rule has no genes".to_string()));
        }
    }
    Ok(ruleset)
}

/// A finished GARP search as stored on disk.
#[derive(Debug, Clone)]
pub struct GarpModel {
    pub generations: usize,
    pub significance: f64,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub gap_size: f64,
    pub convergence: f64,
    pub fittest: RuleSet,
}

impl GarpModel {
    pub fn from_result(result: &RunResult, config: &GarpConfig) -> Self {
        Self {
            generations: result.generations_run,
            significance: config.significance,
            crossover_rate: config.crossover_rate,
            mutation_rate: config.mutation_rate,
            gap_size: config.gap_size,
            convergence: result.convergence,
            fittest: result.fittest.clone(),
        }
    }

    pub fn to_tree(&self) -> ModelTree {
        let mut node = ModelTree::new(GARP_NODE)
            .with_attr("Generations", AttrValue::Int(self.generations as i64))
            .with_attr("Significance", AttrValue::Real(self.significance))
            .with_attr("FinalCrossoverRate", AttrValue::Real(self.crossover_rate))
            .with_attr("FinalMutationRate", AttrValue::Real(self.mutation_rate))
            .with_attr("FinalGapSize", AttrValue::Real(self.gap_size))
            .with_attr("Convergence", AttrValue::Real(self.convergence));
        node.add_subsection(encode_ruleset(&self.fittest));
        node
    }

    pub fn from_tree(node: &ModelTree) -> Result<Self> {
        expect_name(node, GARP_NODE)?;
        Ok(Self {
            generations: node.attr_usize("Generations")?,
            significance: node.attr_f64("Significance")?,
            crossover_rate: node.attr_f64("FinalCrossoverRate")?,
            mutation_rate: node.attr_f64("FinalMutationRate")?,
            gap_size: node.attr_f64("FinalGapSize")?,
            convergence: optional(node, "Convergence", ModelTree::attr_f64)?.unwrap_or(1.0),
            fittest: decode_ruleset(node.subsection(RULESET_NODE)?)?,
        })
    }
}

pub fn encode_ensemble(ensemble: &EnsembleModel) -> ModelTree {
    let members = ensemble.members();
    let mut node = ModelTree::new(ENSEMBLE_NODE)
        .with_attr("Count", AttrValue::Int(members.len() as i64))
        .with_attr("Weights", AttrValue::RealArray(members.iter().map(|m| m.weight).collect()))
        .with_attr(
            "Thresholds",
            AttrValue::RealArray(members.iter().map(|m| m.threshold).collect()),
        )
        .with_attr("CreatedAt", AttrValue::Str(chrono::Utc::now().to_rfc3339()));

    for member in members {
        let mut run = ModelTree::new(RUN_NODE);
        if let Some(id) = member.run_id {
            run.set_attr("RunId", AttrValue::Int(id as i64));
        }
        if let Some(omission) = member.omission {
            run.set_attr("Omission", AttrValue::Real(omission));
        }
        if let Some(commission) = member.commission {
            run.set_attr("Commission", AttrValue::Real(commission));
        }
        run.add_subsection(encode_ruleset(&member.ruleset));
        node.add_subsection(run);
    }
    node
}

pub fn decode_ensemble(node: &ModelTree) -> Result<EnsembleModel> {
    expect_name(node, ENSEMBLE_NODE)?;
    let count = node.attr_usize("Count")?;
    let weights = node.attr_f64_array("Weights")?;
    let thresholds = node.attr_f64_array("Thresholds")?;
    let runs: Vec<&ModelTree> = node.subsections_named(RUN_NODE).collect();

    if weights.len() != count || thresholds.len() != count || runs.len() != count {
        return Err(GarpError::Serialization(format!(
            "BestSubsets declares {} members but holds {} weights, {} thresholds and {} runs",
            count,
            weights.len(),
            thresholds.len(),
            runs.len()
        )));
    }

    let mut ensemble = EnsembleModel::new();
    for ((run, &weight), &threshold) in runs.into_iter().zip(weights).zip(thresholds) {
        let member = EnsembleMember {
            ruleset: decode_ruleset(run.subsection(RULESET_NODE)?)?,
            weight,
            threshold,
            run_id: optional(run, "RunId", ModelTree::attr_usize)?,
            omission: optional(run, "Omission", ModelTree::attr_f64)?,
            commission: optional(run, "Commission", ModelTree::attr_f64)?,
        };
        ensemble
            .push(member)
            .map_err(|e| GarpError::Serialization(e.to_string()))?;
    }
    Ok(ensemble)
}

fn optional<T>(node: &ModelTree, name: &str, get: fn(&ModelTree, &str) -> Result<T>) -> Result<Option<T>> {
    if node.has_attr(name) {
        get(node, name).map(Some)
    } else {
        Ok(None)
    }
}

fn expect_name(node: &ModelTree, name: &str) -> Result<()> {
    if node.name == name {
        Ok(())
    } else {
        Err(GarpError::Serialization(format!(
            "Expected a {} section, found {}",
            name, node.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::evaluation::performance::PerfIndex;

    #[test]
    fn test_atomic_rule_keeps_dimension() {
        let mut rule = Rule::new(RuleKind::Atomic { dimension: 1 }, 3, Label::Absence);
        rule.set_gene_pair(1, -0.2, 0.3);
        rule.set_performance(PerfIndex::Significance, 4.5);

        let node = encode_rule(&rule);
        assert_eq!(node.attr_str("Type").unwrap(), "a");
        assert_eq!(node.attr_usize("Dimension").unwrap(), 1);

        let back = decode_rule(&node).unwrap();
        assert_eq!(back.kind(), RuleKind::Atomic { dimension: 1 });
        assert_eq!(back.prediction(), Label::Absence);
        assert_eq!(back.genes(), rule.genes());
        assert_eq!(back.perf(PerfIndex::Significance), 4.5);
        assert!(!back.needs_evaluation());
    }

    #[test]
    fn test_unknown_type_is_serialization_error() {
        let node = encode_rule(&Rule::new(RuleKind::Range, 1, Label::Presence))
            .with_attr("Type", AttrValue::Str("x".into()));
        assert!(matches!(decode_rule(&node), Err(GarpError::Serialization(_))));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut rs = RuleSet::new(2);
        rs.add(Rule::new(RuleKind::Logit, 2, Label::Presence));
        let node = encode_ruleset(&rs).with_attr("Count", AttrValue::Int(2));
        assert!(decode_ruleset(&node).is_err());
    }

    #[test]
    fn test_garp_model_attributes() {
        let mut fittest = RuleSet::new(1);
        fittest.add(Rule::new(RuleKind::Range, 2, Label::Presence));
        let result = RunResult {
            fittest,
            generations_run: 17,
            converged: true,
            convergence: 0.04,
        };
        let tree = GarpModel::from_result(&result, &GarpConfig::default()).to_tree();
        assert_eq!(tree.attr_usize("Generations").unwrap(), 17);
        assert!((tree.attr_f64("Significance").unwrap() - 2.70).abs() < 1e-12);

        let model = GarpModel::from_tree(&tree).unwrap();
        assert_eq!(model.fittest.num_rules(), 1);
        assert!((model.convergence - 0.04).abs() < 1e-12);
    }
}
