pub mod performance;

pub use performance::{PerfIndex, Performance, PerformanceCounts, PERF_SLOTS, PERF_UNDEFINED};
