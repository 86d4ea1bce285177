/// Planogram Vision - Rust Implementation
///
/// Retail shelf video analysis: samples frames, asks a vision model where products sit,
/// summarizes the evidence, and compares prices for the product that was asked about.

pub mod video;
pub mod config;
pub mod llm;
pub mod evidence;
pub mod product_name;
pub mod pipeline;
pub mod shopping;
pub mod presentation;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::video::{Frame, FrameSampler, MediaKind, VideoGeometry, VideoInfo, VideoProcessor};
pub use crate::llm::{create_llm, ChatOptions, LLMConfig, LLMError, LLMProvider, LLM};
pub use crate::llm::vision::{FrameErrorKind, FrameFailure, VisionClient};
pub use crate::llm::summary::{Summary, SummarySynthesizer};
pub use crate::llm::evaluation::AccuracyEvaluator;
pub use crate::evidence::{EvidenceAggregator, EvidenceReport, FrameAnalysis, FrameOutcome};
pub use crate::product_name::extract_product_name;
pub use crate::pipeline::{analyze_with_config, AnalysisReport, ShelfAnalyzer};
pub use crate::shopping::{ProductQuery, ProductRecord, ShoppingError, ShoppingSearch, SortBy};
