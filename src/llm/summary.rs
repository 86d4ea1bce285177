use super::prompts::{self, SUMMARY_SYSTEM_ROLE};
use super::{ChatMessage, ChatOptions, LLMError, LLM};
use crate::product_name::{find_marker, strip_marker_lines};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Synthesized answer for the whole video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    /// Model output as returned (trimmed), marker line included
    pub raw: String,
    /// Value of the `product_name = ...` line, if the model emitted one
    pub product_name: Option<String>,
}

impl Summary {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let product_name = find_marker(&raw);
        Self { raw, product_name }
    }

    /// Summary text safe to show a user: marker lines removed, blank runs collapsed
    pub fn display_text(&self) -> String {
        strip_marker_lines(&self.raw)
    }

    /// Whether the summary says the product could not be seen
    pub fn reports_not_visible(&self) -> bool {
        self.raw.to_lowercase().contains("not visible")
    }
}

/// Turns the evidence document into one natural-language answer
#[derive(Clone)]
pub struct SummarySynthesizer {
    llm: Arc<dyn LLM>,
    template: String,
}

impl SummarySynthesizer {
    pub fn new(llm: Arc<dyn LLM>, template: String) -> Self {
        Self { llm, template }
    }

    pub async fn summarize(&self, question: &str, evidence: &str) -> Result<Summary, LLMError> {
        let prompt = prompts::render(&self.template, &[("question", question), ("evidence", evidence)]);

        let messages = vec![ChatMessage::system(SUMMARY_SYSTEM_ROLE), ChatMessage::user(prompt)];

        debug!("Requesting summary over {} chars of evidence", evidence.len());
        let response = self.llm.chat(messages, ChatOptions::SUMMARY).await?;

        let summary = Summary::parse(&response.content);
        info!(
            "📝 Summary generated ({} chars, tokens: {:?})",
            summary.raw.len(),
            response.tokens_used
        );

        Ok(summary)
    }
}
