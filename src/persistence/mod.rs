pub mod codec;
pub mod sink;
pub mod tree;

pub use codec::{decode_ensemble, decode_rule, decode_ruleset, encode_ensemble, encode_rule, encode_ruleset, GarpModel};
pub use sink::{JsonFileSink, MemorySink, PersistenceSink};
pub use tree::{AttrValue, ModelTree};
