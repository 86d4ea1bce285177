//! Prompt templates for frame analysis, summarization and evaluation.
//!
//! Templates use `{question}`, `{frame_context}`, `{evidence}` and `{summary}`
//! placeholders. Any template can be overridden by a file in `prompt_dir`.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const FRAME_SYSTEM_ROLE: &str =
    "You are an expert retail shelf analyst that provides accurate, image-based product insights from shelf photos.";

pub const SUMMARY_SYSTEM_ROLE: &str =
    "You are a summarization expert for retail shelf video analytics.";

pub const EVALUATION_SYSTEM_ROLE: &str =
    "You are an unbiased evaluator that assesses summary quality based on provided evidence.";

const FRAME_ANALYSIS_TEMPLATE: &str = r#"You are a helpful assistant that analyzes retail shelf images taken from video frames. Each image is from a different time and angle in the store video. The user will ask a question about products on the shelf. Your job is to analyze **only this single image/frame**, and return a clear and factual answer.

General Instructions:
- Use only the visible contents of this frame to answer the user's question.
- Frame context: {frame_context}
- Do not assume what's outside the frame or in other frames.
- Be concise, courteous, and specific to the query.
- If the requested product or detail is **not visible**, state that clearly.
- If the query refers to a **specific product**, then at the end of the summary add a new line in this format exactly:
  `product_name = <Product Name>`
- If no product is mentioned, skip this line.

Return ONLY the summary and the product name line if applicable.

User Query: {question}"#;

const SUMMARY_TEMPLATE: &str = r#"You are a summarization assistant. Based on the following frame-wise analysis of a shelf video, write a summary of where the requested product(s) appear.
- Combine the information from all frames into one holistic answer.
- If the query refers to a **specific product**, then at the end of the summary add a new line in this format exactly:
  `product_name = <Product Name>`
- If no product is mentioned, skip this line.

Return ONLY the summary and the product name line if applicable.

User Query: {question}

Frame Responses:
{evidence}

Return a helpful, natural language summary for the user. Do not include any extra information (about frames and frame numbers) other than the answer to the asked query."#;

const EVALUATION_TEMPLATE: &str = r#"You are an evaluation assistant. Your job is to evaluate the quality of the generated summary based on the provided supporting frame analysis.

Guidelines:
- The frame responses may each contain partial or new information.
- The final summary is expected to combine this information holistically.
- Do NOT compare each line of the summary with each frame.
- Instead, check if the facts stated in the summary are **generally supported** by at least one of the frames.
- The summary should not contradict the evidence.
- Do NOT penalize the summary for not including every frame.
- Only judge whether the included information is accurate and relevant to the user's question.

Additional Rule:
- If the summary is **not 100% accurate**, list exactly what information is **incorrect**, **unsupported**, or **missing** based on the frame responses.

User Question:
{question}

Generated Summary:
{summary}

Supporting Frame Responses:
{evidence}

Please return your evaluation in the following format:

Accuracy Score (0-100)%: <score>
Evaluation Summary: <brief explanation of factual correctness and completeness>"#;

/// Configuration for all LLM prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Directory holding prompt overrides (unset = built-in prompts only)
    pub prompt_dir: Option<PathBuf>,

    /// Per-frame analysis prompt file
    pub frame_analysis_file: String,

    /// Summary prompt file
    pub summary_file: String,

    /// Evaluation prompt file
    pub evaluation_file: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompt_dir: None,
            frame_analysis_file: "frame_analysis.txt".to_string(),
            summary_file: "summary.txt".to_string(),
            evaluation_file: "evaluation.txt".to_string(),
        }
    }
}

/// Resolved prompt templates
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub frame_analysis: String,
    pub summary: String,
    pub evaluation: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            frame_analysis: FRAME_ANALYSIS_TEMPLATE.to_string(),
            summary: SUMMARY_TEMPLATE.to_string(),
            evaluation: EVALUATION_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    /// Load every template, falling back to the built-in text per file
    pub async fn load(&self) -> PromptSet {
        PromptSet {
            frame_analysis: self.load_or_default(&self.frame_analysis_file, FRAME_ANALYSIS_TEMPLATE).await,
            summary: self.load_or_default(&self.summary_file, SUMMARY_TEMPLATE).await,
            evaluation: self.load_or_default(&self.evaluation_file, EVALUATION_TEMPLATE).await,
        }
    }

    async fn load_or_default(&self, filename: &str, default: &str) -> String {
        let Some(dir) = &self.prompt_dir else {
            return default.to_string();
        };

        let path = dir.join(filename);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => {
                debug!("Loaded prompt override from {}", path.display());
                content.trim().to_string()
            }
            Ok(_) => {
                warn!("Prompt file {} is empty, using default prompt", path.display());
                default.to_string()
            }
            Err(e) => {
                debug!("No prompt override at {} ({}), using default prompt", path.display(), e);
                default.to_string()
            }
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder regex"))
}

/// Fill `{name}` placeholders in one pass. Inserted values are never
/// rescanned; unknown placeholders are left as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
