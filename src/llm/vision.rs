use super::prompts::{self, FRAME_SYSTEM_ROLE};
use super::{ChatMessage, ChatOptions, LLMError, LLM};
use crate::video::timestamp_ms;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for one vision call
pub const VISION_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a single frame produced no analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameErrorKind {
    CredentialsMissing,
    Timeout,
    Connectivity,
    Other,
}

/// A per-frame failure, absorbed by the pipeline instead of aborting it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameFailure {
    pub kind: FrameErrorKind,
    pub frame_index: Option<u64>,
    /// Error type name, shown for unclassified failures
    pub error_type: String,
    pub detail: String,
}

impl FrameFailure {
    pub fn new(kind: FrameErrorKind, frame_index: Option<u64>, error_type: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            frame_index,
            error_type: error_type.into(),
            detail: detail.into(),
        }
    }

    /// Classify an LLM error; untyped errors fall back to message inspection
    pub fn from_llm_error(error: &LLMError, frame_index: Option<u64>) -> Self {
        let message = error.to_string();
        let kind = match error {
            LLMError::CredentialsMissing(_) => FrameErrorKind::CredentialsMissing,
            LLMError::Timeout => FrameErrorKind::Timeout,
            LLMError::Connection(_) => FrameErrorKind::Connectivity,
            _ => classify_message(&message),
        };
        Self::new(kind, frame_index, error.type_name(), message)
    }

    /// Human-readable text that stands in for the frame's answer
    pub fn placeholder(&self) -> String {
        let frame = match self.frame_index {
            Some(index) => format!("frame {}", index),
            None => "image".to_string(),
        };

        match self.kind {
            FrameErrorKind::CredentialsMissing => {
                "Error: vision model API credentials are missing. Please check your .env file.".to_string()
            }
            FrameErrorKind::Timeout => format!("[Skipped {} due to timeout. Try again later.]", frame),
            FrameErrorKind::Connectivity => format!(
                "[Skipped {} due to connection error. Check your internet connection.]",
                frame
            ),
            FrameErrorKind::Other => format!("[Skipped {} due to error: {}]", frame, self.error_type),
        }
    }
}

impl fmt::Display for FrameFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.placeholder())
    }
}

fn classify_message(message: &str) -> FrameErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        FrameErrorKind::Timeout
    } else if ["connection", "network", "connect"].iter().any(|needle| lower.contains(needle)) {
        FrameErrorKind::Connectivity
    } else {
        FrameErrorKind::Other
    }
}

/// Frame number and timestamp lines embedded in the prompt
pub fn frame_context(frame_index: Option<u64>, fps: Option<f64>) -> String {
    match (frame_index, fps) {
        (Some(index), Some(fps)) if fps > 0.0 => format!(
            "\nFrame Number: {}\nTimestamp (ms): {}",
            index,
            timestamp_ms(index, fps)
        ),
        _ => String::new(),
    }
}

/// Encode image bytes as a JPEG data URL
pub fn encode_data_url(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(bytes))
}

/// Asks the vision model one question about one image
#[derive(Clone)]
pub struct VisionClient {
    llm: Arc<dyn LLM>,
    template: String,
    timeout: Duration,
}

impl VisionClient {
    pub fn new(llm: Arc<dyn LLM>, template: String) -> Self {
        Self {
            llm,
            template,
            timeout: VISION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyze one image file; every failure comes back as a classified `FrameFailure`
    pub async fn analyze(
        &self,
        image_path: &Path,
        question: &str,
        frame_index: Option<u64>,
        fps: Option<f64>,
    ) -> Result<String, FrameFailure> {
        let bytes = tokio::fs::read(image_path).await.map_err(|e| {
            FrameFailure::new(FrameErrorKind::Other, frame_index, "IoError", e.to_string())
        })?;

        let context = frame_context(frame_index, fps);
        let prompt = prompts::render(
            &self.template,
            &[("frame_context", context.as_str()), ("question", question)],
        );

        let messages = vec![
            ChatMessage::system(FRAME_SYSTEM_ROLE),
            ChatMessage::user_with_image(prompt, encode_data_url(&bytes)),
        ];

        debug!("Querying vision model for {} ({} bytes)", image_path.display(), bytes.len());

        let result = match tokio::time::timeout(self.timeout, self.llm.chat(messages, ChatOptions::FRAME_ANALYSIS)).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout),
        };

        match result {
            Ok(response) => Ok(response.content.trim().to_string()),
            Err(e) => {
                let failure = FrameFailure::from_llm_error(&e, frame_index);
                warn!(
                    "⚠️ Skipping {} due to error: {}: {}",
                    frame_index.map(|i| format!("frame {}", i)).unwrap_or_else(|| "image".to_string()),
                    failure.error_type,
                    failure.detail
                );
                Err(failure)
            }
        }
    }
}
