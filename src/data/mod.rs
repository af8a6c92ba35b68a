pub mod provider;
pub mod validator;

pub use provider::{InMemorySampleProvider, SampleProvider};
pub use validator::SampleValidator;
