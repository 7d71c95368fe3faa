//! Intent classification: free text in, [`foreman_core::ParsedTask`] out.

pub mod classifier;
pub mod llm;
pub mod prompt;

pub use classifier::IntentClassifier;
pub use llm::{Completion, LlmClient, LlmError, OpenAiClient};
