pub mod ensemble;
pub mod orchestrator;
pub mod run;

pub use ensemble::{EnsembleMember, EnsembleModel};
pub use orchestrator::{
    select_best_subset, BestSubsetsOrchestrator, BestSubsetsReport, BestSubsetsResult, OrchestratorProgress,
};
pub use run::{AlgorithmRun, RunContext, RunOutcome};
