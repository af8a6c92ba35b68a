use crate::engines::evaluation::performance::{self, PerfIndex, Performance, PERF_SLOTS};
use crate::error::{GarpError, Result};
use crate::types::{Label, Sample};
use rand::Rng;

/// Tolerance used when comparing genes against the "don't care" pair.
pub const GENE_EPSILON: f64 = 1e-6;

/// Logit coefficients at or below this magnitude are not part of a rule's
/// footprint when comparing niches.
pub const COEFFICIENT_THRESHOLD: f64 = 0.05;

/// The closed set of rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Applies inside a hyper-box.
    Range,
    /// Applies outside a hyper-box.
    NegatedRange,
    /// Applies when one designated dimension lies within its bounds.
    Atomic { dimension: usize },
    /// Applies when the logistic response reaches 0.5.
    Logit,
}

impl RuleKind {
    /// One-character tag used in persisted models.
    pub fn tag(&self) -> char {
        match self {
            RuleKind::Range => 'd',
            RuleKind::NegatedRange => '!',
            RuleKind::Atomic { .. } => 'a',
            RuleKind::Logit => 'r',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Range => "Range",
            RuleKind::NegatedRange => "NegatedRange",
            RuleKind::Atomic { .. } => "Atomic",
            RuleKind::Logit => "Logit",
        }
    }

    /// True for kinds whose genes are `(lower, upper)` bounds.
    pub fn is_box(&self) -> bool {
        !matches!(self, RuleKind::Logit)
    }

    /// Same variant, ignoring the Atomic designated dimension.
    pub fn same_variant(&self, other: &RuleKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleOrigin {
    Colonization,
    Mutation,
    Crossover,
}

/// A single classification hypothesis.
///
/// Genes are stored interleaved, two per dimension: `genes[2i]` and
/// `genes[2i + 1]`. For box kinds they are the lower and upper bound of
/// dimension `i`; for Logit they are the `b_i` and `c_i` coefficients. The
/// pair `(-1, +1)` marks a dimension the rule does not use.
///
/// The cached performance is only meaningful while `needs_evaluation` is
/// false; every gene change sets the flag again.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    kind: RuleKind,
    genes: Vec<f64>,
    prediction: Label,
    performance: Performance,
    needs_evaluation: bool,
    origin: RuleOrigin,
}

impl Rule {
    /// A rule over `dimension` features with every dimension unused. An
    /// Atomic kind must name one of those features.
    pub fn new(kind: RuleKind, dimension: usize, prediction: Label) -> Self {
        if let RuleKind::Atomic { dimension: d } = kind {
            debug_assert!(d < dimension, "atomic dimension {} outside {} features", d, dimension);
        }
        let genes = (0..dimension).flat_map(|_| [-1.0, 1.0]).collect();
        Self {
            kind,
            genes,
            prediction,
            performance: [0.0; PERF_SLOTS],
            needs_evaluation: true,
            origin: RuleOrigin::Colonization,
        }
    }

    /// A rule with explicit genes. The gene vector must hold two values per
    /// dimension and an Atomic dimension must exist.
    pub fn with_genes(kind: RuleKind, genes: Vec<f64>, prediction: Label) -> Result<Self> {
        check_genes(&kind, &genes)?;
        Ok(Self {
            kind,
            genes,
            prediction,
            performance: [0.0; PERF_SLOTS],
            needs_evaluation: true,
            origin: RuleOrigin::Colonization,
        })
    }

    /// Rebuild an already evaluated rule, e.g. from a persisted model.
    pub fn from_parts(
        kind: RuleKind,
        genes: Vec<f64>,
        prediction: Label,
        performance: Performance,
    ) -> Result<Self> {
        check_genes(&kind, &genes)?;
        Ok(Self {
            kind,
            genes,
            prediction,
            performance,
            needs_evaluation: false,
            origin: RuleOrigin::Colonization,
        })
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    pub fn dimension(&self) -> usize {
        self.genes.len() / 2
    }

    /// A rule without genes cannot take part in a rule set.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn prediction(&self) -> Label {
        self.prediction
    }

    pub fn set_prediction(&mut self, prediction: Label) {
        if self.prediction != prediction {
            self.prediction = prediction;
            self.needs_evaluation = true;
        }
    }

    pub fn origin(&self) -> RuleOrigin {
        self.origin
    }

    pub fn needs_evaluation(&self) -> bool {
        self.needs_evaluation
    }

    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    pub fn perf(&self, index: PerfIndex) -> f64 {
        self.performance[index.index()]
    }

    /// Overwrite one cached statistic. The rule is then treated as evaluated.
    pub fn set_performance(&mut self, index: PerfIndex, value: f64) {
        self.performance[index.index()] = value;
        self.needs_evaluation = false;
    }

    pub fn force_evaluation(&mut self) {
        self.needs_evaluation = true;
    }

    /// Set the gene pair of dimension `i`.
    pub fn set_gene_pair(&mut self, i: usize, first: f64, second: f64) {
        self.genes[2 * i] = first;
        self.genes[2 * i + 1] = second;
        self.needs_evaluation = true;
    }

    /// True if dimension `i` holds the `(-1, +1)` "don't care" pair.
    pub fn is_unused(&self, i: usize) -> bool {
        equal_eps(self.genes[2 * i], -1.0) && equal_eps(self.genes[2 * i + 1], 1.0)
    }

    /// Whether the sample falls in the rule's region, regardless of the
    /// prediction.
    ///
    /// # Panics
    ///
    /// Panics if the sample dimension differs from the rule dimension.
    pub fn applies(&self, sample: &Sample) -> bool {
        let x = sample.features();
        assert_eq!(
            x.len(),
            self.dimension(),
            "sample has {} features but the rule has {} dimensions",
            x.len(),
            self.dimension()
        );

        match self.kind {
            RuleKind::Range => self.inside_box(x),
            RuleKind::NegatedRange => !self.inside_box(x),
            RuleKind::Atomic { dimension } => {
                between(x[dimension], self.genes[2 * dimension], self.genes[2 * dimension + 1])
            }
            RuleKind::Logit => self.logit_probability(x) >= 0.5,
        }
    }

    /// The rule's prediction if it applies, the complementary label otherwise.
    pub fn evaluate(&self, sample: &Sample) -> Label {
        if self.applies(sample) {
            self.prediction
        } else {
            self.prediction.complement()
        }
    }

    /// Continuous strength in `[0, 1]`: the logistic response for Logit
    /// rules, crisp membership for box kinds.
    ///
    /// Exposed for callers ranking samples by a single rule. Model output
    /// goes through [`RuleSet::get_value`](super::RuleSet::get_value), which
    /// stays crisp so ensemble member thresholds keep their meaning.
    pub fn get_value(&self, sample: &Sample) -> f64 {
        match self.kind {
            RuleKind::Logit => {
                assert_eq!(sample.dimension(), self.dimension(), "sample dimension mismatch");
                self.logit_probability(sample.features())
            }
            _ => {
                if self.applies(sample) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Evaluate against `samples` unless the cached performance is valid.
    pub fn ensure_evaluated(&mut self, samples: &[Sample]) -> Result<&Performance> {
        if self.needs_evaluation {
            let prediction = self.prediction;
            let perf = performance::evaluate(|s| self.applies(s), prediction, samples)?;
            self.performance = perf;
            self.needs_evaluation = false;
        }
        Ok(&self.performance)
    }

    /// Perturb genes with an amplitude set by `temperature`.
    ///
    /// Each dimension is perturbed with probability `min(1, t) / 2` and one
    /// dimension always is. The lower gene moves by `-U(-t, t)` and the upper
    /// by `+U(-t, t)`; box genes are then clamped to `[-1, 1]` and ordered.
    pub fn mutate<R: Rng>(&mut self, temperature: f64, rng: &mut R) {
        let d = self.dimension();
        if d == 0 {
            return;
        }
        let t = if temperature.is_finite() { temperature.max(0.0) } else { 0.0 };
        let p = t.min(1.0) / 2.0;
        let forced = match self.kind {
            RuleKind::Atomic { dimension } => dimension,
            _ => rng.gen_range(0..d),
        };

        for j in 0..d {
            if j != forced && rng.gen::<f64>() >= p {
                continue;
            }
            if t > 0.0 {
                self.genes[2 * j] -= rng.gen_range(-t..=t);
                self.genes[2 * j + 1] += rng.gen_range(-t..=t);
            }
            let (lo, hi) = (self.genes[2 * j], self.genes[2 * j + 1]);
            let (lo, hi) = if self.kind.is_box() {
                adjust_range(lo, hi)
            } else {
                (lo.clamp(-1.0, 1.0), hi.clamp(-1.0, 1.0))
            };
            self.genes[2 * j] = lo;
            self.genes[2 * j + 1] = hi;
        }

        self.needs_evaluation = true;
        self.origin = RuleOrigin::Mutation;
    }

    /// Exchange the gene pairs of dimensions `[locus1, locus2)` with `other`.
    ///
    /// Loci are swapped if given in reverse and clamped to the dimension.
    /// Returns whether any gene changed; both rules are then marked for
    /// re-evaluation.
    pub fn crossover(&mut self, other: &mut Rule, locus1: usize, locus2: usize) -> Result<bool> {
        if !self.kind.same_variant(&other.kind) {
            return Err(GarpError::Algorithm(format!(
                "Cannot cross a {} rule with a {} rule",
                self.kind.name(),
                other.kind.name()
            )));
        }
        if self.dimension() != other.dimension() {
            return Err(GarpError::Algorithm(format!(
                "Cannot cross rules of dimension {} and {}",
                self.dimension(),
                other.dimension()
            )));
        }

        let (l1, l2) = if locus1 > locus2 { (locus2, locus1) } else { (locus1, locus2) };
        let l1 = l1.min(self.dimension());
        let l2 = l2.min(self.dimension());

        let mut changed = false;
        for g in 2 * l1..2 * l2 {
            if self.genes[g] != other.genes[g] {
                std::mem::swap(&mut self.genes[g], &mut other.genes[g]);
                changed = true;
            }
        }

        if changed {
            self.origin = RuleOrigin::Crossover;
            self.needs_evaluation = true;
            other.origin = RuleOrigin::Crossover;
            other.needs_evaluation = true;
        }
        Ok(changed)
    }

    /// Niche overlap: same kind, same prediction and same footprint.
    pub fn similar(&self, other: &Rule) -> bool {
        if self.kind != other.kind || self.prediction != other.prediction {
            return false;
        }
        if self.dimension() != other.dimension() {
            return false;
        }

        match self.kind {
            // designated dimension already compared through the kind
            RuleKind::Atomic { .. } => true,
            RuleKind::Logit => (0..self.dimension()).all(|k| {
                let a = self.genes[2 * k].abs() > COEFFICIENT_THRESHOLD;
                let b = other.genes[2 * k].abs() > COEFFICIENT_THRESHOLD;
                a == b
            }),
            RuleKind::Range | RuleKind::NegatedRange => {
                (0..self.dimension()).all(|i| self.is_unused(i) == other.is_unused(i))
            }
        }
    }

    fn inside_box(&self, x: &[f64]) -> bool {
        (0..self.dimension()).all(|i| {
            self.is_unused(i) || between(x[i], self.genes[2 * i], self.genes[2 * i + 1])
        })
    }

    fn logit_probability(&self, x: &[f64]) -> f64 {
        let sum: f64 = (0..self.dimension())
            .filter(|&i| !equal_eps(self.genes[2 * i], -1.0))
            .map(|i| {
                let b = self.genes[2 * i];
                let c = self.genes[2 * i + 1];
                x[i] * b + x[i] * c * c
            })
            .sum();
        1.0 / (1.0 + (-sum).exp())
    }
}

fn check_genes(kind: &RuleKind, genes: &[f64]) -> Result<()> {
    if genes.len() % 2 != 0 {
        return Err(GarpError::Data(format!(
            "Rule genes must come in pairs (got {} values)",
            genes.len()
        )));
    }
    if let RuleKind::Atomic { dimension } = kind {
        if *dimension >= genes.len() / 2 {
            return Err(GarpError::Data(format!(
                "Atomic dimension {} is outside a {}-dimensional rule",
                dimension,
                genes.len() / 2
            )));
        }
    }
    Ok(())
}

pub(crate) fn equal_eps(a: f64, b: f64) -> bool {
    (a - b).abs() < GENE_EPSILON
}

fn between(v: f64, lo: f64, hi: f64) -> bool {
    lo <= v && v <= hi
}

/// Clamp both bounds to `[-1, 1]` and put them in order.
fn adjust_range(lo: f64, hi: f64) -> (f64, f64) {
    let lo = lo.clamp(-1.0, 1.0);
    let hi = hi.clamp(-1.0, 1.0);
    if lo > hi {
        (hi, lo)
    } else {
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_rule_is_all_dont_care() {
        let rule = Rule::new(RuleKind::Range, 3, Label::Presence);
        assert_eq!(rule.genes(), &[-1.0, 1.0, -1.0, 1.0, -1.0, 1.0]);
        assert!((0..3).all(|i| rule.is_unused(i)));
        assert!(rule.needs_evaluation());
    }

    #[test]
    fn test_atomic_dimension_checked() {
        let result = Rule::with_genes(RuleKind::Atomic { dimension: 2 }, vec![0.0; 4], Label::Presence);
        assert!(result.is_err());
    }

    #[test]
    fn test_adjust_range_orders_and_clamps() {
        assert_eq!(adjust_range(0.4, -0.2), (-0.2, 0.4));
        assert_eq!(adjust_range(-3.0, 2.0), (-1.0, 1.0));
    }

    #[test]
    fn test_mutation_keeps_box_genes_valid() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut rule =
            Rule::with_genes(RuleKind::Range, vec![-0.2, 0.3, 0.1, 0.2], Label::Presence).unwrap();
        rule.set_performance(PerfIndex::Significance, 4.0);
        for _ in 0..200 {
            rule.mutate(2.0, &mut rng);
            for pair in rule.genes().chunks(2) {
                assert!(pair[0] <= pair[1]);
                assert!(pair[0] >= -1.0 && pair[1] <= 1.0);
            }
        }
        assert!(rule.needs_evaluation());
        assert_eq!(rule.origin(), RuleOrigin::Mutation);
    }

    #[test]
    fn test_mutate_at_zero_temperature_still_invalidates() {
        let mut rng = StdRng::seed_from_u64(1);
        let genes = vec![-0.5, 0.5];
        let mut rule = Rule::from_parts(RuleKind::Range, genes.clone(), Label::Presence, [0.0; PERF_SLOTS]).unwrap();
        assert!(!rule.needs_evaluation());
        rule.mutate(0.0, &mut rng);
        assert_eq!(rule.genes(), genes.as_slice());
        assert!(rule.needs_evaluation());
    }
}
