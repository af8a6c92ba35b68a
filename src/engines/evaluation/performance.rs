use crate::error::{GarpError, Result};
use crate::types::{Label, Sample};
use serde::{Deserialize, Serialize};

/// Value stored in a performance slot whose denominator is zero.
pub const PERF_UNDEFINED: f64 = -1000.0;

/// Number of slots in a performance vector.
pub const PERF_SLOTS: usize = 10;

/// Minimum number of selected samples before significance is computed.
pub const MIN_SIGNIFICANCE_SAMPLES: usize = 10;

pub type Performance = [f64; PERF_SLOTS];

/// Named indices into a [`Performance`] vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerfIndex {
    Utility = 0,
    PriorStrength = 1,
    PriorProbability = 2,
    PriorDistance = 3,
    PosteriorStrength = 4,
    PosteriorProbability = 5,
    PosteriorDistance = 6,
    Coverage = 7,
    Significance = 8,
    Error = 9,
}

impl PerfIndex {
    pub const ALL: [PerfIndex; PERF_SLOTS] = [
        PerfIndex::Utility,
        PerfIndex::PriorStrength,
        PerfIndex::PriorProbability,
        PerfIndex::PriorDistance,
        PerfIndex::PosteriorStrength,
        PerfIndex::PosteriorProbability,
        PerfIndex::PosteriorDistance,
        PerfIndex::Coverage,
        PerfIndex::Significance,
        PerfIndex::Error,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PerfIndex::Utility => "utility",
            PerfIndex::PriorStrength => "prior_strength",
            PerfIndex::PriorProbability => "prior_probability",
            PerfIndex::PriorDistance => "prior_distance",
            PerfIndex::PosteriorStrength => "posterior_strength",
            PerfIndex::PosteriorProbability => "posterior_probability",
            PerfIndex::PosteriorDistance => "posterior_distance",
            PerfIndex::Coverage => "coverage",
            PerfIndex::Significance => "significance",
            PerfIndex::Error => "error",
        }
    }
}

/// Raw sums gathered over a sample batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceCounts {
    pub n: usize,
    /// Samples the rule applies to.
    pub p_xs: usize,
    /// Samples whose label equals the rule prediction.
    pub p_ys: usize,
    /// Samples the rule applies to and predicts correctly.
    pub p_xys: usize,
    /// Samples selected by the rule. Always equal to `p_xs` for crisp rules.
    pub no: usize,
    pub p_ycs: f64,
    pub p_ycxs: f64,
}

impl PerformanceCounts {
    /// Accumulate the statistics of one sample.
    pub fn record(&mut self, applies: bool, prediction: Label, label: Label) {
        let point_value = label.value();
        let certainty = prediction == label;
        let error = point_value.abs();

        self.n += 1;
        self.p_ycs += error;
        if certainty {
            self.p_ys += 1;
        }
        if applies {
            self.p_xs += 1;
            self.no += 1;
            if certainty {
                self.p_xys += 1;
            }
            self.p_ycxs += (error - point_value).abs();
        }
    }

    pub fn merge(mut self, other: PerformanceCounts) -> Self {
        self.n += other.n;
        self.p_xs += other.p_xs;
        self.p_ys += other.p_ys;
        self.p_xys += other.p_xys;
        self.no += other.no;
        self.p_ycs += other.p_ycs;
        self.p_ycxs += other.p_ycxs;
        self
    }

    /// Derive the 10-slot vector.
    pub fn to_performance(&self) -> Result<Performance> {
        if self.n == 0 {
            return Err(GarpError::Data(
                "Cannot evaluate a rule against an empty sample batch".to_string(),
            ));
        }

        let n = self.n as f64;
        let no = self.no as f64;
        let mut perf = [0.0; PERF_SLOTS];

        perf[PerfIndex::PriorStrength.index()] = self.p_xs as f64 / n;
        perf[PerfIndex::PriorProbability.index()] = self.p_ys as f64 / n;
        perf[PerfIndex::PriorDistance.index()] = self.p_ycs / n;
        perf[PerfIndex::PosteriorStrength.index()] = no / n;
        perf[PerfIndex::Coverage.index()] = no / n;

        let prior = perf[PerfIndex::PriorProbability.index()];
        let significance = if self.no >= MIN_SIGNIFICANCE_SAMPLES && prior > 0.0 && prior < 1.0 {
            (self.p_xys as f64 - prior * no) / (no * prior * (1.0 - prior)).sqrt()
        } else {
            0.0
        };
        perf[PerfIndex::Significance.index()] = significance;

        if self.no > 0 {
            let posterior = self.p_xys as f64 / no;
            perf[PerfIndex::PosteriorProbability.index()] = posterior;
            perf[PerfIndex::PosteriorDistance.index()] = self.p_ycxs / no;
            perf[PerfIndex::Utility.index()] = posterior * significance;
            perf[PerfIndex::Error.index()] =
                significance * (posterior * (1.0 - posterior)).sqrt() / no;
        } else {
            perf[PerfIndex::PosteriorProbability.index()] = PERF_UNDEFINED;
            perf[PerfIndex::PosteriorDistance.index()] = PERF_UNDEFINED;
            perf[PerfIndex::Utility.index()] = PERF_UNDEFINED;
            perf[PerfIndex::Error.index()] = PERF_UNDEFINED;
        }

        Ok(perf)
    }
}

/// Count agreement between a rule's region and a batch of labeled samples.
///
/// `applies` decides whether the rule's precondition holds for a sample.
/// The reduction is a plain sum, so the result depends only on the multiset
/// of samples.
pub fn count<F>(applies: F, prediction: Label, samples: &[Sample]) -> PerformanceCounts
where
    F: Fn(&Sample) -> bool,
{
    samples.iter().fold(PerformanceCounts::default(), |mut acc, sample| {
        acc.record(applies(sample), prediction, sample.label());
        acc
    })
}

/// Evaluate a rule precondition against a batch and return its performance.
pub fn evaluate<F>(applies: F, prediction: Label, samples: &[Sample]) -> Result<Performance>
where
    F: Fn(&Sample) -> bool,
{
    count(applies, prediction, samples).to_performance()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(presences: usize, absences: usize) -> Vec<Sample> {
        let mut v: Vec<Sample> = (0..presences).map(|i| Sample::presence(vec![i as f64])).collect();
        v.extend((0..absences).map(|i| Sample::absence(vec![-(i as f64) - 1.0])));
        v
    }

    #[test]
    fn test_empty_batch_is_data_error() {
        let result = evaluate(|_| true, Label::Presence, &[]);
        assert!(matches!(result, Err(GarpError::Data(_))));
    }

    #[test]
    fn test_no_selection_maps_to_sentinel() {
        let perf = evaluate(|_| false, Label::Presence, &batch(5, 5)).unwrap();
        assert_eq!(perf[PerfIndex::PosteriorProbability.index()], PERF_UNDEFINED);
        assert_eq!(perf[PerfIndex::Significance.index()], 0.0);
        assert_eq!(perf[PerfIndex::PriorStrength.index()], 0.0);
    }

    #[test]
    fn test_perfect_rule_is_significant() {
        let samples = batch(20, 20);
        let perf = evaluate(|s| s.features()[0] >= 0.0, Label::Presence, &samples).unwrap();
        assert!((perf[PerfIndex::PosteriorProbability.index()] - 1.0).abs() < 1e-12);
        // (20 - 0.5 * 20) / sqrt(20 * 0.25)
        let expected = 10.0 / 5.0_f64.sqrt();
        assert!((perf[PerfIndex::Significance.index()] - expected).abs() < 1e-9);
        assert!((perf[PerfIndex::Utility.index()] - expected).abs() < 1e-9);
        assert_eq!(perf[PerfIndex::Error.index()], 0.0);
    }

    #[test]
    fn test_order_independent() {
        let mut samples = batch(13, 7);
        let f = |s: &Sample| s.features()[0] > 3.0 || s.features()[0] < -5.0;
        let a = evaluate(f, Label::Presence, &samples).unwrap();
        samples.reverse();
        let b = evaluate(f, Label::Presence, &samples).unwrap();
        assert_eq!(a, b);
    }
}
