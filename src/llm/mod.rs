//! Chat-completion access for the LLM-assisted classifier.
//!
//! [`ChatModel`] is the seam the classifier depends on; [`OpenAiChatClient`]
//! implements it over any endpoint speaking the OpenAI chat format.

mod error;
mod openai;

pub use error::{LlmError, Result};
pub use openai::OpenAiChatClient;

use async_trait::async_trait;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier recorded alongside each classification.
    fn model_name(&self) -> &str;

    /// Sends one system+user prompt pair and returns the assistant's text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
