pub mod rule;
pub mod ruleset;
pub mod seeding;
pub mod operators;
pub mod evolution_engine;
pub mod progress;

pub use rule::{Rule, RuleKind, RuleOrigin};
pub use ruleset::{PerformanceSummary, RuleSet};
pub use seeding::{BioclimHistogram, Regression, SeedingPriors};
pub use evolution_engine::{CancellationToken, GeneticSearch, RunResult, SearchState, RANKING_INDEX};
pub use progress::{
    ChannelProgressCallback, GenerationStatus, LogProgressCallback, NoProgress, ProgressCallback,
    ProgressMessage, RunEvent, SharedProgress,
};
