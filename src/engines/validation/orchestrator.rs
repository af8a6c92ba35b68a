use super::ensemble::EnsembleModel;
use super::run::{AlgorithmRun, RunContext, RunOutcome};
use crate::config::{BestSubsetsConfig, ConfigSection, GarpConfig};
use crate::data::SampleProvider;
use crate::engines::generation::{CancellationToken, ProgressCallback, RunEvent, SharedProgress};
use crate::error::{GarpError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex, MutexGuard};

/// Counters of a finished best-subsets procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestSubsetsReport {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Ids of the runs combined into the ensemble.
    pub selected: Vec<usize>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct BestSubsetsResult {
    pub report: BestSubsetsReport,
    pub ensemble: EnsembleModel,
    /// Selected runs, ordered by commission.
    pub runs: Vec<AlgorithmRun>,
}

/// Point-in-time view of an orchestration, safe to take from any thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestratorProgress {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub active: usize,
    pub peak_active: usize,
    pub under_omission: usize,
    pub fraction: f64,
    pub done: bool,
}

#[derive(Default)]
struct Tracker {
    snapshot: OrchestratorProgress,
    active: BTreeMap<usize, SharedProgress>,
}

/// Runs many independent genetic searches on a bounded pool and combines
/// the acceptable ones.
pub struct BestSubsetsOrchestrator {
    garp: GarpConfig,
    config: BestSubsetsConfig,
    cancel: CancellationToken,
    tracker: Mutex<Tracker>,
}

impl BestSubsetsOrchestrator {
    pub fn new(garp: GarpConfig, config: BestSubsetsConfig) -> Result<Self> {
        garp.validate()?;
        config.validate()?;
        Ok(Self {
            garp,
            config,
            cancel: CancellationToken::new(),
            tracker: Mutex::new(Tracker::default()),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn config(&self) -> &BestSubsetsConfig {
        &self.config
    }

    pub fn garp_config(&self) -> &GarpConfig {
        &self.garp
    }

    /// Current counters plus the overall fraction of work done. The fraction
    /// never decreases within a call to `run`.
    pub fn progress(&self) -> OrchestratorProgress {
        let mut tracker = self.lock();
        if !tracker.snapshot.done {
            let running: f64 = tracker.active.values().map(|p| p.get().clamp(0.0, 1.0)).sum();
            let s = &tracker.snapshot;
            let finished = (s.accepted + s.rejected + s.failed + s.cancelled) as f64;
            let mut fraction = (finished + running) / self.config.total_runs as f64;

            let models = self.config.effective_models_under_omission();
            if !self.config.soft_omission() && models > 0 {
                fraction = fraction.max(s.under_omission as f64 / models as f64);
            }
            let fraction = fraction.clamp(0.0, 1.0).max(s.fraction);
            tracker.snapshot.fraction = fraction;
        }
        tracker.snapshot.clone()
    }

    /// Execute runs until a stop criterion is met, wait for every active run,
    /// then select and combine the best subset.
    pub fn run<C: ProgressCallback + ?Sized>(
        &self,
        provider: Arc<dyn SampleProvider>,
        callback: &mut C,
    ) -> Result<BestSubsetsResult> {
        *self.lock() = Tracker::default();

        let base_seed = self
            .config
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen::<u64>());
        let context = Arc::new(RunContext {
            provider,
            garp: self.garp.clone(),
            config: self.config.clone(),
            base_seed,
            cancel: self.cancel.clone(),
        });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_threads)
            .thread_name(|i| format!("nichegarp-run-{}", i))
            .build()
            .map_err(|e| GarpError::Algorithm(format!("Failed to build worker pool: {}", e)))?;

        log::info!(
            "Starting best subsets: {} runs on {} threads (base seed {})",
            self.config.total_runs,
            self.config.max_threads,
            base_seed
        );

        let (tx, rx) = channel::<RunOutcome>();
        let mut next_id = 0;
        let mut active = 0;
        let mut accepted_runs: Vec<AlgorithmRun> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();

        loop {
            while active < self.config.max_threads
                && next_id < self.config.total_runs
                && !self.should_stop()
            {
                let run_id = next_id;
                next_id += 1;
                active += 1;

                let mut progress = SharedProgress::new();
                {
                    let mut tracker = self.lock();
                    tracker.active.insert(run_id, progress.clone());
                    tracker.snapshot.attempted += 1;
                    tracker.snapshot.active = active;
                    tracker.snapshot.peak_active = tracker.snapshot.peak_active.max(active);
                }
                callback.on_run_started(run_id);

                let tx = tx.clone();
                let context = Arc::clone(&context);
                pool.spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| context.execute(run_id, &mut progress)))
                        .unwrap_or_else(|payload| RunOutcome::Failed {
                            run_id,
                            reason: format!("run panicked: {}", panic_message(payload.as_ref())),
                        });
                    let _ = tx.send(outcome);
                });
            }

            if active == 0 {
                break;
            }

            let outcome = rx
                .recv()
                .map_err(|_| GarpError::Algorithm("Run completion channel closed".to_string()))?;
            active -= 1;

            let event = self.record(&outcome, active);
            callback.on_run_finished(&event);
            match outcome {
                RunOutcome::Accepted(run) => accepted_runs.push(run),
                other => {
                    if let Some(reason) = other.reason() {
                        reasons.push(format!("run {}: {}", other.run_id(), reason));
                    }
                }
            }
        }

        let mut report = {
            let mut tracker = self.lock();
            tracker.active.clear();
            tracker.snapshot.active = 0;
            tracker.snapshot.done = true;
            tracker.snapshot.fraction = 1.0;
            let s = &tracker.snapshot;
            BestSubsetsReport {
                attempted: s.attempted,
                accepted: s.accepted,
                rejected: s.rejected,
                failed: s.failed,
                cancelled: s.cancelled,
                selected: Vec::new(),
                created_at: chrono::Utc::now().to_rfc3339(),
            }
        };

        if self.cancel.is_cancelled() {
            log::warn!(
                "Best subsets cancelled after {} attempted runs",
                report.attempted
            );
            return Err(GarpError::Cancelled);
        }

        if accepted_runs.is_empty() {
            return Err(GarpError::NoAcceptedRuns {
                attempted: report.attempted,
                reasons: reasons.join("; "),
            });
        }

        let runs = select_best_subset(accepted_runs, &self.config);
        let mut ensemble = EnsembleModel::new();
        for run in &runs {
            ensemble.add_run(run, 1.0, self.config.member_threshold)?;
        }
        report.selected = runs.iter().map(|r| r.run_id).collect();

        log::info!(
            "Best subsets finished: {} attempted, {} accepted, {} selected {:?}",
            report.attempted,
            report.accepted,
            report.selected.len(),
            report.selected
        );

        Ok(BestSubsetsResult {
            report,
            ensemble,
            runs,
        })
    }

    fn should_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        let tracker = self.lock();
        let s = &tracker.snapshot;
        let target = self.config.target_accepted_runs;
        if target > 0 && s.accepted >= target {
            return true;
        }
        let models = self.config.effective_models_under_omission();
        !self.config.soft_omission() && models > 0 && s.under_omission >= models
    }

    fn record(&self, outcome: &RunOutcome, active: usize) -> RunEvent {
        let mut tracker = self.lock();
        tracker.active.remove(&outcome.run_id());
        let s = &mut tracker.snapshot;
        s.active = active;
        match outcome {
            RunOutcome::Accepted(run) => {
                s.accepted += 1;
                if run.omission <= self.config.hard_omission_threshold {
                    s.under_omission += 1;
                }
            }
            RunOutcome::Rejected { .. } => s.rejected += 1,
            RunOutcome::Failed { .. } => s.failed += 1,
            RunOutcome::Cancelled { .. } => s.cancelled += 1,
        }

        if let RunOutcome::Failed { run_id, reason } = outcome {
            log::warn!("Run {} failed: {}", run_id, reason);
        }

        RunEvent {
            run_id: outcome.run_id(),
            accepted: outcome.is_accepted(),
            omission: outcome.run().map(|r| r.omission),
            commission: outcome.run().map(|r| r.commission),
            reason: outcome.reason().map(str::to_string),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Keep the runs with the lowest omission, then the `commission_threshold`
/// share of those centred on the median commission.
pub fn select_best_subset(mut runs: Vec<AlgorithmRun>, config: &BestSubsetsConfig) -> Vec<AlgorithmRun> {
    if runs.is_empty() {
        return runs;
    }

    runs.sort_by(|a, b| a.omission.total_cmp(&b.omission));
    let models = config.effective_models_under_omission();
    let m = if models == 0 { runs.len() } else { models.min(runs.len()) };
    runs.truncate(m);

    runs.sort_by(|a, b| a.commission.total_cmp(&b.commission));
    let num_best = ((config.commission_threshold * m as f64).round() as usize).clamp(1, m);
    let median = (m / 2) as f64;
    let first = ((median - num_best as f64 / 2.0).ceil().max(0.0) as usize).min(m - num_best);

    runs.into_iter().skip(first).take(num_best).collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::RuleSet;

    fn run(run_id: usize, omission: f64, commission: f64) -> AlgorithmRun {
        AlgorithmRun {
            run_id,
            seed: run_id as u64,
            fittest: RuleSet::new(1),
            omission,
            commission,
            generations_run: 1,
            converged: false,
        }
    }

    #[test]
    fn test_selection_centres_on_median_commission() {
        let config = BestSubsetsConfig::default()
            .with_total_runs(6)
            .with_models_under_omission_threshold(4)
            .with_commission_threshold(0.5);
        let runs = vec![
            run(0, 0.0, 0.9),
            run(1, 0.1, 0.1),
            run(2, 0.0, 0.5),
            run(3, 0.5, 0.0),
            run(4, 0.05, 0.3),
            run(5, 0.4, 0.05),
        ];
        // lowest omission: 0, 2, 4, 1; by commission: 1, 4, 2, 0
        let selected: Vec<usize> = select_best_subset(runs, &config).iter().map(|r| r.run_id).collect();
        assert_eq!(selected, vec![4, 2]);
    }

    #[test]
    fn test_selection_keeps_at_least_one() {
        let config = BestSubsetsConfig::default()
            .with_total_runs(3)
            .with_commission_threshold(0.0);
        let selected = select_best_subset(vec![run(0, 0.0, 0.2), run(1, 0.0, 0.4), run(2, 0.0, 0.6)], &config);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].run_id, 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
