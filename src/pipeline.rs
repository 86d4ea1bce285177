use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::config::{Config, SamplingConfig};
use crate::evidence::{EvidenceAggregator, FrameAnalysis, FrameOutcome};
use crate::llm::evaluation::AccuracyEvaluator;
use crate::llm::prompts::PromptSet;
use crate::llm::summary::SummarySynthesizer;
use crate::llm::vision::{FrameErrorKind, FrameFailure, VisionClient};
use crate::llm::{create_llm, LLMError, LLM};
use crate::presentation::format_timestamp;
use crate::product_name::resolve_product_name;
use crate::video::{Frame, FrameSampler, MediaKind};

/// Everything one analysis run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub source: String,
    pub question: String,
    /// Summary with marker lines removed
    pub summary: String,
    pub raw_summary: String,
    pub product_name: String,
    /// Positive-evidence timestamps, empty when the product was not seen
    pub timestamps_ms: Vec<u64>,
    /// Same timestamps as `mm:ss.cc`
    pub formatted_timestamps: Vec<String>,
    pub duration_ms: f64,
    pub frames: Vec<FrameAnalysis>,
    pub frames_answered: usize,
    pub frames_skipped: usize,
    pub processing_time: Duration,
    /// User-visible failure of the run as a whole
    pub error: Option<String>,
}

impl AnalysisReport {
    fn failed(source: &str, question: &str, error: String) -> Self {
        Self {
            source: source.to_string(),
            question: question.to_string(),
            product_name: crate::product_name::UNKNOWN_PRODUCT.to_string(),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Sequential frame -> vision -> evidence -> summary -> product name pipeline
pub struct ShelfAnalyzer {
    vision: VisionClient,
    summarizer: SummarySynthesizer,
    evaluator: Option<AccuracyEvaluator>,
    sampling: SamplingConfig,
}

impl ShelfAnalyzer {
    pub fn new(llm: Arc<dyn LLM>, prompts: PromptSet, sampling: SamplingConfig) -> Self {
        Self {
            vision: VisionClient::new(llm.clone(), prompts.frame_analysis)
                .with_timeout(Duration::from_secs(sampling.vision_timeout_seconds)),
            summarizer: SummarySynthesizer::new(llm.clone(), prompts.summary),
            evaluator: Some(AccuracyEvaluator::new(llm, prompts.evaluation)),
            sampling,
        }
    }

    /// Build from configuration; fails fast when model credentials are missing
    pub async fn from_config(config: &Config) -> Result<Self, LLMError> {
        let llm = create_llm(&config.llm)?;
        let prompts = config.llm.prompts.load().await;
        Ok(Self::new(llm, prompts, config.sampling.clone()).with_evaluation(config.output.run_evaluation))
    }

    pub fn with_evaluation(mut self, enabled: bool) -> Self {
        if !enabled {
            self.evaluator = None;
        }
        self
    }

    /// Analyze a video or still image, picked by extension
    pub async fn analyze_path(&self, path: &Path, question: &str, frame_interval: Option<u64>) -> AnalysisReport {
        match MediaKind::from_path(path) {
            Some(MediaKind::Video) => self.analyze_video(path, question, frame_interval).await,
            Some(MediaKind::Image) => self.analyze_image(path, question).await,
            None => AnalysisReport::failed(
                &path.display().to_string(),
                question,
                format!("Unsupported file type: {}", path.display()),
            ),
        }
    }

    pub async fn analyze_video(&self, path: &Path, question: &str, frame_interval: Option<u64>) -> AnalysisReport {
        let interval = frame_interval.unwrap_or(self.sampling.frame_interval);
        info!("🎬 Analyzing video {} (every {} frames)", path.display(), interval);

        let sampler = FrameSampler::open(path, interval).await;
        self.analyze_frames(sampler, &path.display().to_string(), question).await
    }

    /// Run the pipeline over any frame stream
    pub async fn analyze_frames<R>(&self, mut sampler: FrameSampler<R>, source: &str, question: &str) -> AnalysisReport
    where
        R: AsyncRead + Unpin,
    {
        let start_time = Instant::now();
        let fps = sampler.fps();
        let aggregator = EvidenceAggregator::new(fps, sampler.total_frames());

        let mut frames = Vec::new();
        while let Some(frame) = sampler.next_frame().await {
            debug!("Analyzing frame {} at {} ms", frame.index, frame.timestamp_ms);
            let outcome = self.analyze_frame(&frame, question, Some(frame.index), Some(fps)).await;
            frames.push(FrameAnalysis {
                index: frame.index,
                timestamp_ms: frame.timestamp_ms,
                outcome,
            });
        }

        if frames.is_empty() {
            warn!("No frames sampled from {}", source);
        } else {
            info!("🖼️ Analyzed {} sampled frames", frames.len());
        }

        let mut report = self.finish(source, question, frames, aggregator, true).await;
        report.processing_time = start_time.elapsed();
        report
    }

    /// A still image is one frame with no timeline
    pub async fn analyze_image(&self, path: &Path, question: &str) -> AnalysisReport {
        let start_time = Instant::now();
        let source = path.display().to_string();
        info!("🖼️ Analyzing image {}", source);

        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => return AnalysisReport::failed(&source, question, format!("Cannot read image {}: {}", source, e)),
        };

        let frame = Frame {
            index: 0,
            timestamp_ms: 0,
            image,
        };
        let outcome = self.analyze_frame(&frame, question, None, None).await;
        let frames = vec![FrameAnalysis {
            index: 0,
            timestamp_ms: 0,
            outcome,
        }];

        let mut report = self
            .finish(&source, question, frames, EvidenceAggregator::new(0.0, 0), false)
            .await;
        report.processing_time = start_time.elapsed();
        report
    }

    /// The temporary JPEG lives only for this call
    async fn analyze_frame(&self, frame: &Frame, question: &str, index: Option<u64>, fps: Option<f64>) -> FrameOutcome {
        let jpeg = match frame.to_temp_jpeg(self.sampling.jpeg_quality) {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to encode frame {}: {}", frame.index, e);
                return FrameOutcome::Skipped(FrameFailure::new(
                    FrameErrorKind::Other,
                    index,
                    "EncodeError",
                    e.to_string(),
                ));
            }
        };

        match self.vision.analyze(jpeg.path(), question, index, fps).await {
            Ok(text) => FrameOutcome::Answered(text),
            Err(failure) => FrameOutcome::Skipped(failure),
        }
    }

    async fn finish(
        &self,
        source: &str,
        question: &str,
        frames: Vec<FrameAnalysis>,
        aggregator: EvidenceAggregator,
        timeline: bool,
    ) -> AnalysisReport {
        let evidence = aggregator.aggregate(&frames);
        debug!(
            "Evidence: {} answered, {} skipped, {} positive",
            evidence.frames_answered,
            evidence.frames_skipped,
            evidence.timestamps.len()
        );

        let mut report = AnalysisReport {
            source: source.to_string(),
            question: question.to_string(),
            duration_ms: aggregator.duration_ms(),
            frames_answered: evidence.frames_answered,
            frames_skipped: evidence.frames_skipped,
            frames,
            ..AnalysisReport::default()
        };

        let summary = match self.summarizer.summarize(question, &evidence.document).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("❌ Summary generation failed: {}", e);
                report.product_name = resolve_product_name("", question);
                report.error = Some(summary_error_message(&e));
                return report;
            }
        };

        if let Some(evaluator) = &self.evaluator {
            match evaluator.evaluate(question, &summary.raw, &evidence.document).await {
                Ok(evaluation) => info!("🎯 Accuracy evaluation:\n{}", evaluation),
                Err(e) => warn!("Accuracy evaluation failed: {}", e),
            }
        }

        report.product_name = resolve_product_name(&summary.raw, question);
        info!("🏷️ Product name: {}", report.product_name);

        if timeline && !evidence.timestamps.is_empty() && !summary.reports_not_visible() {
            report.formatted_timestamps = evidence.timestamps.iter().map(|&ts| format_timestamp(ts)).collect();
            report.timestamps_ms = evidence.timestamps;
        }

        report.summary = summary.display_text();
        report.raw_summary = summary.raw;
        report
    }
}

fn summary_error_message(error: &LLMError) -> String {
    match error {
        LLMError::CredentialsMissing(_) => {
            FrameFailure::new(FrameErrorKind::CredentialsMissing, None, error.type_name(), error.to_string()).placeholder()
        }
        _ => format!("Summary generation failed: {}", error),
    }
}

/// Build an analyzer from `config` and run it. Configuration failures come
/// back as the report's `error`.
pub async fn analyze_with_config(config: &Config, path: &Path, question: &str, frame_interval: Option<u64>) -> AnalysisReport {
    match ShelfAnalyzer::from_config(config).await {
        Ok(analyzer) => analyzer.analyze_path(path, question, frame_interval).await,
        Err(e) => {
            warn!("❌ Cannot create vision client: {}", e);
            AnalysisReport::failed(&path.display().to_string(), question, summary_error_message(&e))
        }
    }
}
