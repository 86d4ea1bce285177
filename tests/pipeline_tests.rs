use async_trait::async_trait;
use planogram_vision::config::SamplingConfig;
use planogram_vision::llm::prompts::PromptSet;
use planogram_vision::llm::{ChatMessage, ChatOptions, LLMError, LLMProvider, LLMResponse, LLM};
use planogram_vision::{FrameOutcome, FrameSampler, ShelfAnalyzer, VideoGeometry};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TIDE_SUMMARY: &str = "Tide is on the top shelf near the entrance.\nproduct_name = Tide Detergent";

/// Answers frames by number: frames below `visible_until` see the product.
struct ShelfLLM {
    visible_until: u64,
    timeout_frame: Option<u64>,
    summary_reply: Result<String, ()>,
    frame_calls: Mutex<Vec<Option<u64>>>,
    summary_prompts: Mutex<Vec<String>>,
    evaluation_calls: Mutex<usize>,
}

impl ShelfLLM {
    fn new(visible_until: u64) -> Self {
        Self {
            visible_until,
            timeout_frame: None,
            summary_reply: Ok(TIDE_SUMMARY.to_string()),
            frame_calls: Mutex::new(Vec::new()),
            summary_prompts: Mutex::new(Vec::new()),
            evaluation_calls: Mutex::new(0),
        }
    }

    fn with_timeout_at(mut self, frame: u64) -> Self {
        self.timeout_frame = Some(frame);
        self
    }

    fn with_summary(mut self, reply: Result<&str, ()>) -> Self {
        self.summary_reply = reply.map(str::to_string);
        self
    }
}

fn frame_number(prompt: &str) -> Option<u64> {
    let rest = prompt.split("Frame Number: ").nth(1)?;
    rest.chars().take_while(|c| c.is_ascii_digit()).collect::<String>().parse().ok()
}

#[async_trait]
impl LLM for ShelfLLM {
    async fn chat(&self, messages: Vec<ChatMessage>, _options: ChatOptions) -> Result<LLMResponse, LLMError> {
        let user = messages.last().expect("user message");
        let text = user.content.text();

        let content = if user.content.has_image() {
            let frame = frame_number(&text);
            self.frame_calls.lock().unwrap().push(frame);

            if frame.is_some() && frame == self.timeout_frame {
                return Err(LLMError::Timeout);
            }
            match frame {
                Some(index) if index >= self.visible_until => "Tide is not visible in this frame.".to_string(),
                _ => "Tide is located on the top shelf.".to_string(),
            }
        } else if text.contains("Accuracy Score") {
            *self.evaluation_calls.lock().unwrap() += 1;
            "Accuracy Score (0-100)%: 95\nEvaluation Summary: Supported by the frames.".to_string()
        } else {
            self.summary_prompts.lock().unwrap().push(text);
            self.summary_reply
                .clone()
                .map_err(|_| LLMError::Api { status: 500, body: "internal error".to_string() })?
        };

        Ok(LLMResponse {
            content,
            tokens_used: Some(42),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::LMStudio
    }
}

fn analyzer(llm: Arc<ShelfLLM>) -> ShelfAnalyzer {
    ShelfAnalyzer::new(llm, PromptSet::default(), SamplingConfig::default())
}

/// Raw rgb24 stream of `frames` 2x2 frames
fn synthetic_video(frames: u64, fps: f64, interval: u64) -> FrameSampler<Cursor<Vec<u8>>> {
    let bytes: Vec<u8> = (0..frames).flat_map(|i| std::iter::repeat(i as u8).take(12)).collect();
    let geometry = VideoGeometry {
        width: 2,
        height: 2,
        fps,
        total_frames: frames,
    };
    FrameSampler::from_reader(Cursor::new(bytes), geometry, interval)
}

#[tokio::test]
async fn test_ten_second_video_timeline() {
    let llm = Arc::new(ShelfLLM::new(5));
    let report = analyzer(llm.clone())
        .analyze_frames(synthetic_video(10, 1.0, 1), "aisle.mp4", "Where is Tide detergent?")
        .await;

    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    assert_eq!(report.timestamps_ms, vec![0, 1000, 2000, 3000, 4000]);
    assert_eq!(
        report.formatted_timestamps,
        vec!["00:00.00", "00:01.00", "00:02.00", "00:03.00", "00:04.00"]
    );
    assert_eq!(report.frames.len(), 10);
    assert_eq!(report.duration_ms, 10_000.0);

    let prompts = llm.summary_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].matches(" ms):\n").count(), 10);
    assert!(prompts[0].contains("Frame 9 (9000 ms):\nTide is not visible in this frame."));

    assert_eq!(report.product_name, "Tide Detergent");
    assert_eq!(report.summary, "Tide is on the top shelf near the entrance.");
    assert!(report.raw_summary.contains("product_name = Tide Detergent"));
    assert_eq!(*llm.evaluation_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_timeout_frame_is_skipped_and_loop_continues() {
    let llm = Arc::new(ShelfLLM::new(100).with_timeout_at(42));
    let report = analyzer(llm.clone())
        .analyze_frames(synthetic_video(70, 23.0, 21), "aisle.mp4", "Where is Tide?")
        .await;

    let calls = llm.frame_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![Some(0), Some(21), Some(42), Some(63)]);

    let skipped = &report.frames[2];
    assert_eq!(skipped.index, 42);
    match &skipped.outcome {
        FrameOutcome::Skipped(failure) => assert_eq!(
            failure.placeholder(),
            "[Skipped frame 42 due to timeout. Try again later.]"
        ),
        other => panic!("expected skipped frame, got {:?}", other),
    }

    assert_eq!(report.frames_skipped, 1);
    assert!(!report.timestamps_ms.contains(&skipped.timestamp_ms));
    assert_eq!(report.timestamps_ms.len(), 3);

    let prompts = llm.summary_prompts.lock().unwrap();
    assert!(prompts[0].contains("[Skipped frame 42 due to timeout. Try again later.]"));
}

#[tokio::test]
async fn test_not_visible_summary_clears_timeline() {
    let llm = Arc::new(ShelfLLM::new(5).with_summary(Ok("Tide is not visible anywhere in this video.")));
    let report = analyzer(llm)
        .analyze_frames(synthetic_video(10, 1.0, 1), "aisle.mp4", "Where is Tide?")
        .await;

    assert!(report.timestamps_ms.is_empty());
    assert!(report.formatted_timestamps.is_empty());
    assert_eq!(report.product_name, "Tide");
}

#[tokio::test]
async fn test_empty_video_still_requests_summary() {
    let llm = Arc::new(ShelfLLM::new(0).with_summary(Ok("No frames could be analyzed.")));
    let report = analyzer(llm.clone())
        .analyze_frames(synthetic_video(0, 30.0, 23), "empty.mp4", "What is on the shelf?")
        .await;

    assert!(report.frames.is_empty());
    assert!(report.timestamps_ms.is_empty());
    assert!(llm.frame_calls.lock().unwrap().is_empty());
    assert_eq!(llm.summary_prompts.lock().unwrap().len(), 1);
    assert_eq!(report.product_name, "unknown");
}

#[tokio::test]
async fn test_summary_failure_surfaces_as_error() {
    let llm = Arc::new(ShelfLLM::new(5).with_summary(Err(())));
    let report = analyzer(llm.clone())
        .analyze_frames(synthetic_video(3, 1.0, 1), "aisle.mp4", "Where is Vim bar located?")
        .await;

    assert!(!report.is_success());
    assert!(report.error.as_deref().unwrap().starts_with("Summary generation failed"));
    assert_eq!(report.frames.len(), 3);
    assert_eq!(report.product_name, "Vim bar");
    assert_eq!(*llm.evaluation_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_evaluation_can_be_disabled() {
    let llm = Arc::new(ShelfLLM::new(5));
    let report = analyzer(llm.clone())
        .with_evaluation(false)
        .analyze_frames(synthetic_video(2, 1.0, 1), "aisle.mp4", "Where is Tide?")
        .await;

    assert!(report.is_success());
    assert_eq!(*llm.evaluation_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_still_image_has_no_timeline() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("shelf.png");
    image::RgbImage::from_pixel(8, 8, image::Rgb([10, 120, 200])).save(&path).unwrap();

    let llm = Arc::new(ShelfLLM::new(5));
    let report = analyzer(llm.clone())
        .analyze_path(&path, "Where is Tide detergent?", None)
        .await;

    assert!(report.is_success(), "unexpected error: {:?}", report.error);
    assert_eq!(report.frames.len(), 1);
    assert!(report.timestamps_ms.is_empty());
    assert_eq!(report.duration_ms, 0.0);
    assert_eq!(llm.frame_calls.lock().unwrap().clone(), vec![None]);
    assert_eq!(report.product_name, "Tide Detergent");
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let llm = Arc::new(ShelfLLM::new(5));
    let report = analyzer(llm.clone())
        .analyze_path(std::path::Path::new("notes.txt"), "Where is Tide?", None)
        .await;

    assert!(report.error.as_deref().unwrap().contains("Unsupported file type"));
    assert!(llm.summary_prompts.lock().unwrap().is_empty());
}
