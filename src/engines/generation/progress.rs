use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Snapshot of a search after one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStatus {
    pub generation: usize,
    pub best: f64,
    pub worst: f64,
    pub avg: f64,
    pub convergence: f64,
    pub progress: f64,
    pub fittest_size: usize,
}

/// Outcome of one best-subsets run as seen by observers.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    pub run_id: usize,
    pub accepted: bool,
    pub omission: Option<f64>,
    pub commission: Option<f64>,
    /// Why the run was rejected, if it was.
    pub reason: Option<String>,
}

/// Observer of search and orchestration progress. Every hook has an empty
/// default so implementors pick the events they care about.
pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, _generation: usize) {}
    fn on_generation_complete(&mut self, _status: &GenerationStatus) {}
    fn on_run_started(&mut self, _run_id: usize) {}
    fn on_run_finished(&mut self, _event: &RunEvent) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {}

/// Reports progress through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressCallback;

impl ProgressCallback for LogProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::trace!("Generation {} starting", generation);
    }

    fn on_generation_complete(&mut self, status: &GenerationStatus) {
        log::debug!(
            "Generation {:4} [{:3} rules] conv={:+7.4} | sig best={:+8.3} worst={:+8.3} avg={:+8.3}",
            status.generation,
            status.fittest_size,
            status.convergence,
            status.best,
            status.worst,
            status.avg
        );
    }

    fn on_run_started(&mut self, run_id: usize) {
        log::info!("Run {} started", run_id);
    }

    fn on_run_finished(&mut self, event: &RunEvent) {
        if event.accepted {
            log::info!(
                "Run {} accepted (omission={:.4}, commission={:.4})",
                event.run_id,
                event.omission.unwrap_or_default(),
                event.commission.unwrap_or_default()
            );
        } else {
            log::warn!(
                "Run {} rejected: {}",
                event.run_id,
                event.reason.as_deref().unwrap_or("unknown reason")
            );
        }
    }
}

// For reporting to another thread
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete(GenerationStatus),
    RunStarted(usize),
    RunFinished(RunEvent),
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, status: &GenerationStatus) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete(status.clone()));
    }

    fn on_run_started(&mut self, run_id: usize) {
        let _ = self.sender.send(ProgressMessage::RunStarted(run_id));
    }

    fn on_run_finished(&mut self, event: &RunEvent) {
        let _ = self.sender.send(ProgressMessage::RunFinished(event.clone()));
    }
}

/// Publishes the latest progress fraction of a search so another thread can
/// read it without locking.
#[derive(Debug, Clone, Default)]
pub struct SharedProgress {
    bits: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl ProgressCallback for SharedProgress {
    fn on_generation_complete(&mut self, status: &GenerationStatus) {
        self.set(status.progress);
    }
}
