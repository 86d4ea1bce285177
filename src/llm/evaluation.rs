use super::prompts::{self, EVALUATION_SYSTEM_ROLE};
use super::{ChatMessage, ChatOptions, LLMError, LLM};
use std::sync::Arc;
use tracing::debug;

/// Asks the model to grade a summary against the frame evidence.
///
/// The result is free text for operators; nothing downstream parses it.
#[derive(Clone)]
pub struct AccuracyEvaluator {
    llm: Arc<dyn LLM>,
    template: String,
}

impl AccuracyEvaluator {
    pub fn new(llm: Arc<dyn LLM>, template: String) -> Self {
        Self { llm, template }
    }

    pub async fn evaluate(&self, question: &str, summary: &str, evidence: &str) -> Result<String, LLMError> {
        let prompt = prompts::render(
            &self.template,
            &[("question", question), ("summary", summary), ("evidence", evidence)],
        );

        let messages = vec![ChatMessage::system(EVALUATION_SYSTEM_ROLE), ChatMessage::user(prompt)];

        let response = self.llm.chat(messages, ChatOptions::EVALUATION).await?;
        debug!("Evaluation completed (tokens: {:?})", response.tokens_used);

        Ok(response.content.trim().to_string())
    }
}
