use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout};
use tracing::{debug, info, warn};

/// Millisecond timestamp of a frame: `floor(index / fps * 1000)`
pub fn timestamp_ms(frame_index: u64, fps: f64) -> u64 {
    if fps <= 0.0 || !fps.is_finite() {
        return 0;
    }
    ((frame_index as f64 / fps) * 1000.0).floor() as u64
}

/// Kind of media a path points at, judged by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    pub const VIDEO_EXTENSIONS: &'static [&'static str] = &["mp4", "mov", "avi", "mkv"];
    pub const IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png"];

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// Video information extracted from file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub filename: String,
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    pub format: String,
    pub file_size: u64,
}

/// Dimensions and timing needed to cut a raw frame stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
}

impl VideoGeometry {
    pub fn duration_ms(&self) -> f64 {
        if self.fps > 0.0 {
            (self.total_frames as f64 / self.fps) * 1000.0
        } else {
            0.0
        }
    }

    fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl From<&VideoInfo> for VideoGeometry {
    fn from(info: &VideoInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            fps: info.fps,
            total_frames: info.frame_count,
        }
    }
}

/// One decoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub timestamp_ms: u64,
    pub image: RgbImage,
}

impl Frame {
    /// Encode to a temporary JPEG; the file is removed when the handle drops
    pub fn to_temp_jpeg(&self, quality: u8) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("planogram-frame-")
            .suffix(".jpg")
            .tempfile()?;

        encode_jpeg(&self.image, file.as_file_mut(), quality)?;
        Ok(file)
    }
}

fn encode_jpeg<W: Write>(image: &RgbImage, out: W, quality: u8) -> Result<()> {
    let mut writer = BufWriter::new(out);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(image)?;
    writer.flush()?;
    Ok(())
}

/// Write `image` as a JPEG file at `path`
pub fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let file = std::fs::File::create(path)?;
    encode_jpeg(image, file, quality)
}

/// File name for a saved frame, e.g. `frame_01-23.45.jpg` for 83456 ms
pub fn frame_filename(timestamp_ms: u64) -> String {
    format!("frame_{}.jpg", crate::presentation::format_timestamp(timestamp_ms).replace(':', "-"))
}

/// `-ss` argument for a millisecond offset
fn seek_position(timestamp_ms: u64) -> String {
    format!("{}.{:03}", timestamp_ms / 1000, timestamp_ms % 1000)
}

/// Lazily yields every Nth frame of a raw `rgb24` stream.
///
/// Single pass: once the stream ends the sampler stays exhausted.
pub struct FrameSampler<R> {
    reader: Option<R>,
    child: Option<Child>,
    geometry: VideoGeometry,
    interval: u64,
    next_index: u64,
    buffer: Vec<u8>,
}

impl FrameSampler<ChildStdout> {
    /// Decode `video_path` with ffmpeg. A source that cannot be opened
    /// yields an empty sampler rather than an error.
    pub async fn open(video_path: &Path, interval: u64) -> Self {
        let processor = VideoProcessor::new();

        let info = match processor.get_video_info(video_path).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Cannot open video {}: {}", video_path.display(), e);
                return Self::empty(interval);
            }
        };

        let spawned = tokio::process::Command::new("ffmpeg")
            .arg("-v")
            .arg("error")
            .arg("-noautorotate")
            .arg("-i")
            .arg(video_path)
            .args(["-vsync", "0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start ffmpeg for {}: {}", video_path.display(), e);
                return Self::empty(interval);
            }
        };

        let Some(stdout) = child.stdout.take() else {
            warn!("ffmpeg stdout unavailable for {}", video_path.display());
            return Self::empty(interval);
        };

        let mut sampler = Self::from_reader(stdout, VideoGeometry::from(&info), interval);
        sampler.child = Some(child);
        sampler
    }
}

impl<R: AsyncRead + Unpin> FrameSampler<R> {
    /// Sample frames from an already-decoded raw stream
    pub fn from_reader(reader: R, geometry: VideoGeometry, interval: u64) -> Self {
        let frame_bytes = geometry.frame_bytes();
        Self {
            reader: (frame_bytes > 0).then_some(reader),
            child: None,
            geometry,
            interval: interval.max(1),
            next_index: 0,
            buffer: vec![0; frame_bytes],
        }
    }

    /// A sampler that produces no frames
    pub fn empty(interval: u64) -> Self {
        Self {
            reader: None,
            child: None,
            geometry: VideoGeometry {
                width: 0,
                height: 0,
                fps: 0.0,
                total_frames: 0,
            },
            interval: interval.max(1),
            next_index: 0,
            buffer: Vec::new(),
        }
    }

    pub fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    pub fn fps(&self) -> f64 {
        self.geometry.fps
    }

    pub fn total_frames(&self) -> u64 {
        self.geometry.total_frames
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Next sampled frame, or `None` once the stream is exhausted
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let reader = self.reader.as_mut()?;
            let index = self.next_index;

            if let Err(e) = reader.read_exact(&mut self.buffer).await {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    warn!("Frame stream read failed at frame {}: {}", index, e);
                }
                debug!("Frame stream exhausted after {} frames", index);
                self.finish().await;
                return None;
            }
            self.next_index += 1;

            if index % self.interval != 0 {
                continue;
            }

            let Some(image) = RgbImage::from_raw(self.geometry.width, self.geometry.height, self.buffer.clone()) else {
                warn!("Frame {} has an unexpected buffer size", index);
                self.finish().await;
                return None;
            };

            return Some(Frame {
                index,
                timestamp_ms: timestamp_ms(index, self.geometry.fps),
                image,
            });
        }
    }

    async fn finish(&mut self) {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.wait().await {
                debug!("ffmpeg exit status unavailable: {}", e);
            }
        }
    }
}

/// Video probing via ffprobe
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoProcessor;

impl VideoProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Decode the single frame shown at `timestamp_ms`
    pub async fn extract_frame_at(&self, video_path: &Path, timestamp_ms: u64) -> Result<RgbImage> {
        let output = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-ss"])
            .arg(seek_position(timestamp_ms))
            .arg("-i")
            .arg(video_path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(anyhow!(
                "No frame at {} ms in {}: {}",
                timestamp_ms,
                video_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(image::load_from_memory(&output.stdout)?.to_rgb8())
    }

    /// Save the frame at each timestamp as a JPEG in `dir`. Frames that cannot
    /// be decoded are logged and left out.
    pub async fn save_frames_at(
        &self,
        video_path: &Path,
        timestamps: &[u64],
        dir: &Path,
        quality: u8,
    ) -> Result<Vec<(u64, PathBuf)>> {
        tokio::fs::create_dir_all(dir).await?;

        let mut saved = Vec::new();
        for &timestamp in timestamps {
            let image = match self.extract_frame_at(video_path, timestamp).await {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping frame at {} ms: {}", timestamp, e);
                    continue;
                }
            };

            let path = dir.join(frame_filename(timestamp));
            save_jpeg(&image, &path, quality)?;
            debug!("Saved frame at {} ms to {}", timestamp, path.display());
            saved.push((timestamp, path));
        }

        info!("🖼️ Saved {} of {} frames to {}", saved.len(), timestamps.len(), dir.display());
        Ok(saved)
    }

    /// Extract video information using ffprobe
    pub async fn get_video_info(&self, video_path: &Path) -> Result<VideoInfo> {
        let output = tokio::process::Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(video_path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", video_path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        let ffprobe_data: serde_json::Value = serde_json::from_str(&json_str)?;

        let info = parse_ffprobe_output(video_path, &ffprobe_data)?;
        let file_size = tokio::fs::metadata(video_path).await.map(|m| m.len()).unwrap_or(0);
        let info = VideoInfo { file_size, ..info };

        info!(
            "📹 Analyzed video: {} ({}x{}, {:.1}fps, {} frames, {:.1}s)",
            info.filename,
            info.width,
            info.height,
            info.fps,
            info.frame_count,
            info.duration.as_secs_f64()
        );

        Ok(info)
    }
}

fn parse_frame_rate(value: &str) -> Option<f64> {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        (den != 0.0).then(|| num / den)
    } else {
        value.parse().ok()
    }
}

/// Build `VideoInfo` from ffprobe's JSON (file size filled by the caller)
fn parse_ffprobe_output(video_path: &Path, data: &serde_json::Value) -> Result<VideoInfo> {
    let format = &data["format"];
    let streams = data["streams"]
        .as_array()
        .ok_or_else(|| anyhow!("ffprobe output has no streams"))?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let fps = video_stream["avg_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .filter(|fps| *fps > 0.0)
        .or_else(|| video_stream["r_frame_rate"].as_str().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let duration_seconds: f64 = video_stream["duration"]
        .as_str()
        .or_else(|| format["duration"].as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    let frame_count = video_stream["nb_frames"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| (duration_seconds * fps).round() as u64);

    Ok(VideoInfo {
        path: video_path.to_path_buf(),
        filename: video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        duration: Duration::from_secs_f64(duration_seconds.max(0.0)),
        width: video_stream["width"].as_u64().unwrap_or(0) as u32,
        height: video_stream["height"].as_u64().unwrap_or(0) as u32,
        fps,
        frame_count,
        format: format["format_name"].as_str().unwrap_or("unknown").to_string(),
        file_size: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_stream(frames: u64, width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        for index in 0..frames {
            bytes.extend(std::iter::repeat(index as u8).take((width * height * 3) as usize));
        }
        bytes
    }

    fn geometry(total_frames: u64, fps: f64) -> VideoGeometry {
        VideoGeometry {
            width: 2,
            height: 2,
            fps,
            total_frames,
        }
    }

    #[test]
    fn test_timestamp_floor() {
        assert_eq!(timestamp_ms(0, 30.0), 0);
        assert_eq!(timestamp_ms(1, 30.0), 33);
        assert_eq!(timestamp_ms(23, 23.976), 959);
        assert_eq!(timestamp_ms(7, 1.0), 7000);
        assert_eq!(timestamp_ms(10, 0.0), 0);
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(MediaKind::from_path(Path::new("shelf.MP4")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("shelf.jpeg")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
    }

    #[tokio::test]
    async fn test_sampler_yields_multiples_of_interval() {
        let bytes = raw_stream(50, 2, 2);
        let mut sampler = FrameSampler::from_reader(Cursor::new(bytes), geometry(50, 23.0), 23);

        let mut indices = Vec::new();
        while let Some(frame) = sampler.next_frame().await {
            assert_eq!(frame.timestamp_ms, timestamp_ms(frame.index, 23.0));
            assert_eq!(frame.image.get_pixel(0, 0)[0], frame.index as u8);
            indices.push(frame.index);
        }

        assert_eq!(indices, vec![0, 23, 46]);
        assert!(sampler.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_sampler_truncated_frame_ends_stream() {
        let mut bytes = raw_stream(3, 2, 2);
        bytes.truncate(bytes.len() - 5);
        let mut sampler = FrameSampler::from_reader(Cursor::new(bytes), geometry(3, 1.0), 1);

        assert_eq!(sampler.next_frame().await.map(|f| f.index), Some(0));
        assert_eq!(sampler.next_frame().await.map(|f| f.index), Some(1));
        assert!(sampler.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let sampler = FrameSampler::from_reader(Cursor::new(Vec::new()), geometry(0, 1.0), 0);
        assert_eq!(sampler.interval(), 1);
    }

    #[tokio::test]
    async fn test_unopenable_source_is_empty() {
        let mut sampler = FrameSampler::open(Path::new("/nonexistent/shelf.mp4"), 23).await;
        assert!(sampler.next_frame().await.is_none());
        assert_eq!(sampler.total_frames(), 0);
    }

    #[test]
    fn test_frame_to_temp_jpeg_is_removed_on_drop() {
        let frame = Frame {
            index: 0,
            timestamp_ms: 0,
            image: RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10])),
        };
        let file = frame.to_temp_jpeg(85).unwrap();
        let path = file.path().to_path_buf();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_frame_filename_and_seek_position() {
        assert_eq!(frame_filename(83_456), "frame_01-23.45.jpg");
        assert_eq!(frame_filename(0), "frame_00-00.00.jpg");
        assert_eq!(seek_position(83_456), "83.456");
        assert_eq!(seek_position(40), "0.040");
    }

    #[test]
    fn test_save_jpeg() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join(frame_filename(1500));
        save_jpeg(&RgbImage::from_pixel(6, 4, image::Rgb([0, 90, 180])), &path, 80).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[tokio::test]
    async fn test_extract_frame_from_missing_video_fails() {
        let processor = VideoProcessor::new();
        assert!(processor.extract_frame_at(Path::new("/nonexistent/aisle.mp4"), 1000).await.is_err());
    }

    #[tokio::test]
    async fn test_save_frames_skips_undecodable_frames() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path().join("frames");

        let saved = VideoProcessor::new()
            .save_frames_at(Path::new("/nonexistent/aisle.mp4"), &[0, 1000], &dir, 85)
            .await
            .unwrap();

        assert!(saved.is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_parse_ffprobe_output() {
        let data = serde_json::json!({
            "format": { "duration": "10.000000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2" },
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                { "codec_type": "video", "width": 1280, "height": 720,
                  "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001", "nb_frames": "300" }
            ]
        });

        let info = parse_ffprobe_output(Path::new("/videos/aisle.mp4"), &data).unwrap();
        assert_eq!(info.filename, "aisle.mp4");
        assert_eq!((info.width, info.height), (1280, 720));
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, 300);
    }

    #[test]
    fn test_parse_ffprobe_estimates_missing_frame_count() {
        let data = serde_json::json!({
            "format": { "duration": "10.0", "format_name": "matroska" },
            "streams": [ { "codec_type": "video", "width": 640, "height": 360, "avg_frame_rate": "0/0", "r_frame_rate": "25/1" } ]
        });

        let info = parse_ffprobe_output(Path::new("aisle.mkv"), &data).unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, 250);
    }
}
