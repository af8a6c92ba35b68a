pub mod traits;
pub mod garp;
pub mod best_subsets;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use garp::GarpConfig;
pub use best_subsets::BestSubsetsConfig;
pub use traits::{ConfigManifest, ConfigSection, FieldManifest};
