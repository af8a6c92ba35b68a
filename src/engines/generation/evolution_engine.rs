use crate::config::{ConfigSection, GarpConfig};
use crate::data::SampleProvider;
use crate::engines::evaluation::performance::PerfIndex;
use crate::engines::generation::{
    operators::{colonize, crossover_population, evaluate_population, keep_fittest, mutate_population, select},
    progress::{GenerationStatus, ProgressCallback},
    ruleset::RuleSet,
    seeding::SeedingPriors,
};
use crate::error::{GarpError, Result};
use crate::types::Sample;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Statistic rules are ranked and filtered on.
pub const RANKING_INDEX: PerfIndex = PerfIndex::Significance;

/// Shared flag used to stop searches from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Initializing,
    Evolving,
    Converged,
    Exhausted,
    Cancelled,
}

impl SearchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SearchState::Initializing | SearchState::Evolving)
    }
}

/// Final rule set of a finished search.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub fittest: RuleSet,
    pub generations_run: usize,
    pub converged: bool,
    pub convergence: f64,
}

/// One GARP rule search.
///
/// The search owns its random generator, its resampled training set and its
/// two rule sets, so independent searches can run on separate threads.
pub struct GeneticSearch {
    config: GarpConfig,
    rng: StdRng,
    samples: Vec<Sample>,
    priors: Option<SeedingPriors>,
    offspring: RuleSet,
    fittest: RuleSet,
    generation: usize,
    convergence: f64,
    improvements: usize,
    max_progress: f64,
    state: SearchState,
    cancel: Option<CancellationToken>,
}

impl GeneticSearch {
    /// Validate `config` and create an idle search.
    pub fn new(config: GarpConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let capacity = 2 * config.population_size;

        Ok(Self {
            rng,
            samples: Vec::new(),
            priors: None,
            offspring: RuleSet::new(capacity),
            fittest: RuleSet::new(capacity),
            generation: 0,
            convergence: 1.0,
            improvements: 0,
            max_progress: 0.0,
            state: SearchState::Initializing,
            cancel: None,
            config,
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Draw the training resamples, build the seeding priors and colonize
    /// the first offspring population.
    pub fn initialize(&mut self, provider: &dyn SampleProvider) -> Result<()> {
        let dimension = provider.dimension();
        if dimension == 0 {
            return Err(GarpError::Data("Samples have no features".to_string()));
        }

        self.samples = provider.draw_resamples(self.config.resamples, &mut self.rng)?;
        if self.samples.is_empty() {
            return Err(GarpError::Data("No samples could be drawn".to_string()));
        }
        let presences = self.samples.iter().filter(|s| s.label().is_presence()).count();

        let priors = SeedingPriors::new(&self.samples, dimension);
        self.offspring.clear();
        self.fittest.clear();
        colonize(&mut self.offspring, self.config.population_size, &priors, &mut self.rng);
        self.priors = Some(priors);

        self.generation = 0;
        self.convergence = 1.0;
        self.improvements = 0;
        self.max_progress = 0.0;
        self.state = SearchState::Evolving;

        log::debug!(
            "Search initialized: {} resamples ({} presences), {} dimensions, {} rules",
            self.samples.len(),
            presences,
            dimension,
            self.offspring.num_rules()
        );
        Ok(())
    }

    /// Advance one generation.
    pub fn iterate(&mut self) -> Result<()> {
        if self.state != SearchState::Evolving {
            return Err(GarpError::Algorithm(format!(
                "Cannot iterate a search in state {:?}",
                self.state
            )));
        }

        self.generation += 1;

        evaluate_population(&mut self.offspring, &self.samples, self.config.parallel_evaluation)?;
        let hits = keep_fittest(&self.offspring, &mut self.fittest, RANKING_INDEX)?;
        self.update_convergence(hits);
        self.fittest.trim(self.config.population_size);
        self.update_progress();

        if self.done() {
            self.fittest.filter(RANKING_INDEX, self.config.significance);
            self.state = if self.convergence < self.config.convergence_limit {
                SearchState::Converged
            } else {
                SearchState::Exhausted
            };
            log::debug!(
                "Search finished at generation {} ({:?}) with {} rules",
                self.generation,
                self.state,
                self.fittest.num_rules()
            );
            return Ok(());
        }

        let priors = self
            .priors
            .as_ref()
            .ok_or_else(|| GarpError::Algorithm("Search was not initialized".to_string()))?;

        let pop = self.config.population_size;
        let temperature = self.temperature();
        select(&self.fittest, &mut self.offspring, RANKING_INDEX, pop, self.config.gap_size, &mut self.rng)?;
        colonize(&mut self.offspring, pop, priors, &mut self.rng);
        self.offspring.trim(pop);
        mutate_population(&mut self.offspring, temperature, self.config.mutation_rate, &mut self.rng);
        crossover_population(&mut self.offspring, self.config.crossover_rate, &mut self.rng)?;

        Ok(())
    }

    /// Run to completion, reporting each generation to `callback`.
    pub fn run<C: ProgressCallback + ?Sized>(
        &mut self,
        provider: &dyn SampleProvider,
        callback: &mut C,
    ) -> Result<RunResult> {
        let started = Instant::now();
        let limit = self.config.time_limit_ms.map(Duration::from_millis);

        self.initialize(provider)?;

        while !self.state.is_terminal() {
            if self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false) {
                self.state = SearchState::Cancelled;
                return Err(GarpError::Cancelled);
            }
            if let Some(limit) = limit {
                if started.elapsed() > limit {
                    return Err(GarpError::Timeout(limit.as_millis() as u64));
                }
            }

            callback.on_generation_start(self.generation + 1);
            self.iterate()?;
            callback.on_generation_complete(&self.status());
        }

        Ok(self.result())
    }

    /// Current state packaged as a result. The rule set is only final once
    /// the search reached a terminal state.
    pub fn result(&self) -> RunResult {
        RunResult {
            fittest: self.fittest.clone(),
            generations_run: self.generation,
            converged: self.state == SearchState::Converged,
            convergence: self.convergence,
        }
    }

    pub fn status(&self) -> GenerationStatus {
        let summary = self.fittest.performance_summary(RANKING_INDEX);
        GenerationStatus {
            generation: self.generation,
            best: summary.best,
            worst: summary.worst,
            avg: summary.avg,
            convergence: self.convergence,
            progress: self.get_progress(),
            fittest_size: self.fittest.num_rules(),
        }
    }

    pub fn done(&self) -> bool {
        self.generation >= self.config.max_generations
            || self.convergence < self.config.convergence_limit
    }

    pub fn get_convergence(&self) -> f64 {
        self.convergence
    }

    /// Fraction of work done, never decreasing between calls.
    pub fn get_progress(&self) -> f64 {
        if self.state.is_terminal() && self.state != SearchState::Cancelled {
            1.0
        } else {
            self.max_progress.min(1.0)
        }
    }

    /// Prediction of the fittest rules for `sample`.
    pub fn get_value(&self, sample: &Sample) -> f64 {
        self.fittest.get_value(sample)
    }

    pub fn fittest(&self) -> &RuleSet {
        &self.fittest
    }

    pub fn offspring(&self) -> &RuleSet {
        &self.offspring
    }

    /// Resampled training set drawn by `initialize`.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn config(&self) -> &GarpConfig {
        &self.config
    }

    /// Mutation amplitude, annealed from 2 toward 0 over the generations.
    pub fn temperature(&self) -> f64 {
        let elapsed = self.generation.saturating_sub(1) as f64;
        2.0 * (1.0 - elapsed / self.config.max_generations as f64)
    }

    fn update_convergence(&mut self, hits: usize) {
        self.improvements += hits;
        if self.improvements > 0 {
            self.convergence = (self.convergence + hits as f64 / self.improvements as f64) / 2.0;
        } else {
            self.convergence = 1.0;
        }
    }

    fn update_progress(&mut self) {
        let by_generations = self.generation as f64 / self.config.max_generations as f64;
        let by_convergence = if self.convergence > 0.0 {
            self.config.convergence_limit / self.convergence
        } else {
            1.0
        };
        let progress = by_generations.max(by_convergence);
        if progress > self.max_progress {
            self.max_progress = progress;
        }
    }
}
