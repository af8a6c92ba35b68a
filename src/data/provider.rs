use super::validator::SampleValidator;
use crate::error::{GarpError, Result};
use crate::types::{Label, Sample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Source of labeled samples for rule search and run validation.
///
/// Implementations are shared read-only between concurrent runs; every draw
/// takes the caller's generator so results depend only on the run seed.
pub trait SampleProvider: Send + Sync {
    /// Number of features per sample.
    fn dimension(&self) -> usize;

    /// Draw `n` training samples with replacement. Each draw is a presence
    /// with probability 0.5, otherwise an absence (or a background point
    /// relabeled as absence when no absences are known).
    ///
    /// Fails with `GarpError::Data` when either pool is empty; the result
    /// always holds exactly `n` samples.
    fn draw_resamples(&self, n: usize, rng: &mut StdRng) -> Result<Vec<Sample>>;

    /// Held-out samples used to compute omission error. Samples supplied by
    /// the caller are carried into every split.
    fn test_samples(&self) -> Vec<Sample>;

    /// Draw `n` background points labeled as absences.
    fn background_samples(&self, n: usize, rng: &mut StdRng) -> Vec<Sample>;

    /// Split the occurrences into a training provider and held-out samples.
    /// `proportion` of the presences (and absences) go to training.
    fn split(&self, proportion: f64, rng: &mut StdRng) -> Result<(Arc<dyn SampleProvider>, Vec<Sample>)>;

    fn num_presences(&self) -> usize;
}

/// Sample provider backed by in-memory vectors.
#[derive(Debug, Clone)]
pub struct InMemorySampleProvider {
    presences: Vec<Sample>,
    absences: Vec<Sample>,
    background: Arc<Vec<Sample>>,
    test: Vec<Sample>,
    dimension: usize,
}

impl InMemorySampleProvider {
    /// Build a provider from presence and absence occurrences. Labels are
    /// normalized to the group they are passed in.
    pub fn new(presences: Vec<Sample>, absences: Vec<Sample>) -> Result<Self> {
        let dimension = SampleValidator::infer_dimension(&[&presences, &absences])?;
        Ok(Self {
            presences: relabel(presences, Label::Presence),
            absences: relabel(absences, Label::Absence),
            background: Arc::new(Vec::new()),
            test: Vec::new(),
            dimension,
        })
    }

    /// Build a provider from a labeled batch, partitioning by label.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let (presences, absences): (Vec<_>, Vec<_>) =
            samples.into_iter().partition(|s| s.label().is_presence());
        Self::new(presences, absences)
    }

    /// Environmental background used for pseudo-absences and commission.
    pub fn with_background(mut self, background: Vec<Sample>) -> Result<Self> {
        SampleValidator::validate(&background, self.dimension)?;
        self.background = Arc::new(relabel(background, Label::Absence));
        Ok(self)
    }

    pub fn with_test_samples(mut self, test: Vec<Sample>) -> Result<Self> {
        SampleValidator::validate(&test, self.dimension)?;
        self.test = test;
        Ok(self)
    }

    pub fn presences(&self) -> &[Sample] {
        &self.presences
    }

    pub fn absences(&self) -> &[Sample] {
        &self.absences
    }

    pub fn background(&self) -> &[Sample] {
        &self.background
    }

    fn pseudo_absence_pool(&self) -> &[Sample] {
        if self.absences.is_empty() {
            &self.background
        } else {
            &self.absences
        }
    }
}

impl SampleProvider for InMemorySampleProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn draw_resamples(&self, n: usize, rng: &mut StdRng) -> Result<Vec<Sample>> {
        if self.presences.is_empty() {
            return Err(GarpError::Data(
                "Cannot draw resamples without presence points".to_string(),
            ));
        }
        let pseudo_absences = self.pseudo_absence_pool();
        if pseudo_absences.is_empty() {
            return Err(GarpError::Data(
                "Cannot draw resamples without absence or background points".to_string(),
            ));
        }

        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            let pool: &[Sample] = if rng.gen::<f64>() < 0.5 {
                &self.presences
            } else {
                pseudo_absences
            };
            if let Some(sample) = pool.choose(rng) {
                samples.push(sample.clone());
            }
        }
        if samples.len() < n {
            return Err(GarpError::Data(format!(
                "Drew {} of {} requested resamples",
                samples.len(),
                n
            )));
        }
        Ok(samples)
    }

    fn test_samples(&self) -> Vec<Sample> {
        self.test.clone()
    }

    fn background_samples(&self, n: usize, rng: &mut StdRng) -> Vec<Sample> {
        let pool: &[Sample] = if self.background.is_empty() {
            &self.absences
        } else {
            &self.background
        };
        if pool.is_empty() {
            return Vec::new();
        }
        (0..n)
            .filter_map(|_| pool.choose(rng).cloned())
            .collect()
    }

    fn split(&self, proportion: f64, rng: &mut StdRng) -> Result<(Arc<dyn SampleProvider>, Vec<Sample>)> {
        if !(0.0..=1.0).contains(&proportion) {
            return Err(GarpError::Configuration(format!(
                "Training proportion must be within [0, 1] (got {})",
                proportion
            )));
        }

        let (train_presences, mut test) = split_group(&self.presences, proportion, rng);
        let (train_absences, test_absences) = split_group(&self.absences, proportion, rng);
        test.extend(test_absences);
        test.extend(self.test.iter().cloned());

        log::debug!(
            "Split presences {} -> train {}, absences {} -> train {}, held out {} ({} supplied)",
            self.presences.len(),
            train_presences.len(),
            self.absences.len(),
            train_absences.len(),
            test.len(),
            self.test.len()
        );

        let train = InMemorySampleProvider {
            presences: train_presences,
            absences: train_absences,
            background: Arc::clone(&self.background),
            test: test.clone(),
            dimension: self.dimension,
        };
        Ok((Arc::new(train), test))
    }

    fn num_presences(&self) -> usize {
        self.presences.len()
    }
}

fn relabel(samples: Vec<Sample>, label: Label) -> Vec<Sample> {
    samples
        .into_iter()
        .map(|s| {
            if s.label() == label {
                s
            } else {
                Sample::new(s.features().to_vec(), label)
            }
        })
        .collect()
}

/// The first `floor(n * proportion)` shuffled samples train, the rest test.
fn split_group(samples: &[Sample], proportion: f64, rng: &mut StdRng) -> (Vec<Sample>, Vec<Sample>) {
    let k = (samples.len() as f64 * proportion) as usize;
    let mut to_train: Vec<bool> = (0..samples.len()).map(|i| i < k).collect();
    to_train.shuffle(rng);

    let mut train = Vec::with_capacity(k);
    let mut test = Vec::with_capacity(samples.len() - k);
    for (sample, goes_to_train) in samples.iter().zip(to_train) {
        if goes_to_train {
            train.push(sample.clone());
        } else {
            test.push(sample.clone());
        }
    }
    (train, test)
}
