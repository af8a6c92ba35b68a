//! Priors used to seed new rules from the training samples: a per-label
//! histogram of every dimension, and per-dimension linear and quadratic
//! regressions of the label on each feature.

use super::rule::{Rule, RuleKind};
use crate::types::{Label, Sample};
use rand::Rng;

const BINS: usize = 256;

/// Histogram of feature values per label and dimension over 256 bins.
#[derive(Debug, Clone)]
pub struct BioclimHistogram {
    /// `matrix[label][dimension][bin]`
    matrix: [Vec<[u32; BINS]>; 2],
    depend: [usize; 2],
}

impl BioclimHistogram {
    pub fn new(samples: &[Sample], dimension: usize) -> Self {
        let mut matrix = [vec![[0u32; BINS]; dimension], vec![[0u32; BINS]; dimension]];
        let mut depend = [0usize; 2];

        for sample in samples {
            let label = label_index(sample.label());
            depend[label] += 1;
            for (layer, value) in sample.features().iter().enumerate().take(dimension) {
                matrix[label][layer][bin_of(*value)] += 1;
            }
        }

        Self { matrix, depend }
    }

    pub fn count(&self, label: Label) -> usize {
        self.depend[label_index(label)]
    }

    /// Range of dimension `layer` for samples labeled `label`, excluding a
    /// random share below 10% of those samples at each tail.
    pub fn bioclim_range<R: Rng>(&self, label: Label, layer: usize, rng: &mut R) -> (f64, f64) {
        let idx = label_index(label);
        let level = rng.gen_range(0.0..0.1);
        self.cut_levels(idx, layer, level)
    }

    fn cut_levels(&self, idx: usize, layer: usize, level: f64) -> (f64, f64) {
        let excluded = (self.depend[idx] as f64 * level) as u32;
        let bins = &self.matrix[idx][layer];

        let mut lower = 0usize;
        let mut sum = 0u32;
        for (n, count) in bins.iter().enumerate() {
            sum += count;
            if sum > excluded {
                lower = n;
                break;
            }
        }

        let mut upper = BINS - 1;
        sum = 0;
        for (n, count) in bins.iter().enumerate().rev() {
            sum += count;
            if sum > excluded {
                upper = n;
                break;
            }
        }

        (
            lower as f64 / 255.0 * 2.0 - 1.0,
            upper as f64 / 255.0 * 2.0 - 1.0,
        )
    }
}

/// Per-dimension regression coefficients of the label on each feature.
#[derive(Debug, Clone, Default)]
pub struct Regression {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl Regression {
    /// Coefficients are 0 wherever a denominator vanishes.
    pub fn new(samples: &[Sample], dimension: usize) -> Self {
        let n = samples.len() as f64;
        let mut s_y = 0.0;
        let mut s_x = vec![0.0; dimension];
        let mut s_xx = vec![0.0; dimension];
        let mut s_xy = vec![0.0; dimension];
        let mut s_xxy = vec![0.0; dimension];
        let mut s_x4 = vec![0.0; dimension];

        for sample in samples {
            let y = sample.label().value();
            s_y += y;
            for (i, xi) in sample.features().iter().enumerate().take(dimension) {
                let xx = xi * xi;
                s_x[i] += xi;
                s_xx[i] += xx;
                s_xy[i] += xi * y;
                s_xxy[i] += xx * y;
                s_x4[i] += xx * xx;
            }
        }

        let mut reg = Regression {
            a: vec![0.0; dimension],
            b: vec![0.0; dimension],
            c: vec![0.0; dimension],
        };
        if samples.is_empty() {
            return reg;
        }
        for i in 0..dimension {
            reg.c[i] = safe_div(n * s_xxy[i] - s_xx[i] * s_y, n * s_x4[i] - s_xx[i] * s_xx[i]);
            reg.b[i] = safe_div(n * s_xy[i] - s_x[i] * s_y, n * s_xx[i] - s_x[i] * s_x[i]);
            reg.a[i] = s_y / n - reg.b[i] * s_x[i] / n;
        }
        reg
    }
}

/// Priors computed once per run from the resampled training set.
#[derive(Debug, Clone)]
pub struct SeedingPriors {
    pub histogram: BioclimHistogram,
    pub regression: Regression,
    dimension: usize,
}

impl SeedingPriors {
    pub fn new(samples: &[Sample], dimension: usize) -> Self {
        Self {
            histogram: BioclimHistogram::new(samples, dimension),
            regression: Regression::new(samples, dimension),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// A new presence Range rule built from presence value ranges.
    pub fn range_rule<R: Rng>(&self, rng: &mut R) -> Rule {
        self.box_rule(RuleKind::Range, Label::Presence, rng)
    }

    /// A new absence Negated-Range rule built from absence value ranges.
    pub fn negated_rule<R: Rng>(&self, rng: &mut R) -> Rule {
        self.box_rule(RuleKind::NegatedRange, Label::Absence, rng)
    }

    /// A new Atomic rule on a random dimension with a random prediction.
    pub fn atomic_rule<R: Rng>(&self, rng: &mut R) -> Rule {
        let dimension = rng.gen_range(0..self.dimension);
        let prediction = random_label(rng);
        let mut rule = Rule::new(RuleKind::Atomic { dimension }, self.dimension, prediction);
        let (lo, hi) = self.histogram.bioclim_range(prediction, dimension, rng);
        rule.set_gene_pair(dimension, lo, hi);
        rule
    }

    /// A new Logit rule seeded with regression coefficients.
    pub fn logit_rule<R: Rng>(&self, rng: &mut R) -> Rule {
        let prediction = random_label(rng);
        let mut rule = Rule::new(RuleKind::Logit, self.dimension, prediction);
        for _ in 0..self.dimension {
            let j = rng.gen_range(0..self.dimension);
            rule.set_gene_pair(j, self.regression.b[j], self.regression.c[j]);
        }
        rule
    }

    fn box_rule<R: Rng>(&self, kind: RuleKind, prediction: Label, rng: &mut R) -> Rule {
        let mut rule = Rule::new(kind, self.dimension, prediction);
        for _ in 0..self.dimension {
            let j = rng.gen_range(0..self.dimension);
            let (lo, hi) = self.histogram.bioclim_range(prediction, j, rng);
            rule.set_gene_pair(j, lo, hi);
        }
        rule
    }
}

fn label_index(label: Label) -> usize {
    match label {
        Label::Absence => 0,
        Label::Presence => 1,
    }
}

fn bin_of(value: f64) -> usize {
    let bin = ((value + 1.0) / 2.0 * 253.0) as i64 + 1;
    bin.clamp(0, (BINS - 1) as i64) as usize
}

fn safe_div(num: f64, den: f64) -> f64 {
    let q = num / den;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}

fn random_label<R: Rng>(rng: &mut R) -> Label {
    if rng.gen::<f64>() > 0.5 {
        Label::Presence
    } else {
        Label::Absence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn samples() -> Vec<Sample> {
        let mut v: Vec<Sample> = (0..20).map(|i| Sample::presence(vec![0.5 + i as f64 * 0.01])).collect();
        v.extend((0..20).map(|i| Sample::absence(vec![-0.9 + i as f64 * 0.01])));
        v
    }

    #[test]
    fn test_bins_cover_domain() {
        assert_eq!(bin_of(-1.0), 1);
        assert_eq!(bin_of(1.0), 254);
        assert_eq!(bin_of(-5.0), 0);
        assert_eq!(bin_of(5.0), 255);
    }

    #[test]
    fn test_presence_range_brackets_presences() {
        let hist = BioclimHistogram::new(&samples(), 1);
        let (lo, hi) = hist.cut_levels(1, 0, 0.0);
        assert!(lo <= 0.5 && lo > 0.4);
        assert!(hi > 0.66 && hi < 0.72);
        assert_eq!(hist.count(Label::Presence), 20);
    }

    #[test]
    fn test_regression_slope_sign() {
        let reg = Regression::new(&samples(), 1);
        assert!(reg.b[0] > 0.0);
    }

    #[test]
    fn test_regression_degenerate_is_zero() {
        let flat = vec![Sample::presence(vec![0.2]), Sample::absence(vec![0.2])];
        let reg = Regression::new(&flat, 1);
        assert_eq!(reg.b[0], 0.0);
        assert_eq!(reg.c[0], 0.0);
    }

    #[test]
    fn test_seeded_rules_have_expected_predictions() {
        let priors = SeedingPriors::new(&samples(), 1);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(priors.range_rule(&mut rng).prediction(), Label::Presence);
        assert_eq!(priors.negated_rule(&mut rng).prediction(), Label::Absence);
        let atomic = priors.atomic_rule(&mut rng);
        assert_eq!(atomic.kind(), RuleKind::Atomic { dimension: 0 });
    }
}
