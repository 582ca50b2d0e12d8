//! capture-webcam-frame：抓取一帧摄像头画面并生成文字摘要（尺寸 + 平均亮度）
//!
//! 默认 ffmpeg + v4l2；人脸检测等视觉分析不在此处做。
//! 未配置 output_dir 时帧只是临时文件，摘要生成后即删除。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::config::WebcamSection;
use crate::intent::ToolArgs;
use crate::tools::command::run_command;
use crate::tools::{Tool, ToolResult};

/// 平均亮度低于此值视为暗
const DARK_BELOW: f64 = 50.0;
/// 平均亮度高于此值视为亮
const BRIGHT_ABOVE: f64 = 200.0;

#[async_trait]
pub trait WebcamCapture: Send + Sync {
    /// 抓一帧，返回图片路径
    async fn capture_frame(&self) -> Result<PathBuf, String>;

    /// 摘要生成后是否保留图片文件
    fn keeps_frames(&self) -> bool {
        false
    }
}

pub struct CommandWebcam {
    capture_command: Vec<String>,
    device: String,
    output_dir: PathBuf,
    keep_frames: bool,
    timeout: Duration,
}

impl CommandWebcam {
    pub fn new(cfg: &WebcamSection, timeout_secs: u64) -> Self {
        Self {
            capture_command: cfg.capture_command.clone(),
            device: cfg.device.clone(),
            output_dir: cfg
                .output_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("jarvis-webcam")),
            keep_frames: cfg.output_dir.is_some(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl WebcamCapture for CommandWebcam {
    async fn capture_frame(&self) -> Result<PathBuf, String> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| format!("Cannot create {}: {e}", self.output_dir.display()))?;
        let path = self
            .output_dir
            .join(format!("frame-{}.jpg", Utc::now().format("%Y%m%d-%H%M%S%.3f")));
        let path_str = path.to_string_lossy().to_string();
        run_command(
            &self.capture_command,
            &[("device", &self.device), ("path", &path_str)],
            self.timeout,
        )
        .await?;
        if !path.exists() {
            return Err("Webcam command finished but no frame was written".to_string());
        }
        Ok(path)
    }

    fn keeps_frames(&self) -> bool {
        self.keep_frames
    }
}

/// 一帧画面的摘要
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    pub width: u32,
    pub height: u32,
    /// 灰度均值，0-255
    pub mean_luminance: f64,
}

impl FrameSummary {
    pub fn lighting(&self) -> &'static str {
        if self.mean_luminance < DARK_BELOW {
            "dark"
        } else if self.mean_luminance > BRIGHT_ABOVE {
            "bright"
        } else {
            "normal"
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "Webcam frame {}x{}, mean brightness {:.0}/255: {} lighting.",
            self.width,
            self.height,
            self.mean_luminance,
            self.lighting()
        )
    }
}

/// 解码图片并计算尺寸与平均亮度
pub fn summarize_frame(path: &Path) -> Result<FrameSummary, String> {
    let img = image::open(path).map_err(|e| format!("Cannot decode webcam frame: {e}"))?;
    let luma = img.to_luma8();
    let (width, height) = luma.dimensions();
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 {
        return Err("Webcam frame is empty".to_string());
    }
    let total: u64 = luma.pixels().map(|p| u64::from(p.0[0])).sum();
    Ok(FrameSummary {
        width,
        height,
        mean_luminance: total as f64 / pixels as f64,
    })
}

pub struct WebcamTool {
    camera: Arc<dyn WebcamCapture>,
}

impl WebcamTool {
    pub fn new(camera: Arc<dyn WebcamCapture>) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl Tool for WebcamTool {
    fn name(&self) -> &str {
        "capture-webcam-frame"
    }

    fn description(&self) -> &str {
        "Capture a single webcam frame and describe its size and lighting."
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, String> {
        let path = self.camera.capture_frame().await?;
        let decode_path = path.clone();
        let summary = tokio::task::spawn_blocking(move || summarize_frame(&decode_path))
            .await
            .map_err(|e| format!("Webcam frame analysis failed: {e}"))?;

        let keep = self.camera.keeps_frames();
        if !keep {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), "failed to remove webcam frame: {}", e);
            }
        }
        let summary = summary?;

        let mut payload = json!({
            "width": summary.width,
            "height": summary.height,
            "mean_luminance": summary.mean_luminance,
            "lighting": summary.lighting(),
        });
        if keep {
            payload["path"] = json!(path);
        }
        Ok(ToolResult::ok(summary.describe()).with_payload(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCamera;

    #[async_trait]
    impl WebcamCapture for FailingCamera {
        async fn capture_frame(&self) -> Result<PathBuf, String> {
            Err("Webcam is not available".to_string())
        }
    }

    /// 每次抓帧写一张纯色 PNG
    struct SolidCamera {
        path: PathBuf,
        level: u8,
        keep: bool,
    }

    #[async_trait]
    impl WebcamCapture for SolidCamera {
        async fn capture_frame(&self) -> Result<PathBuf, String> {
            image::GrayImage::from_pixel(8, 6, image::Luma([self.level]))
                .save(&self.path)
                .map_err(|e| e.to_string())?;
            Ok(self.path.clone())
        }

        fn keeps_frames(&self) -> bool {
            self.keep
        }
    }

    #[tokio::test]
    async fn test_webcam_failure_propagates() {
        let tool = WebcamTool::new(Arc::new(FailingCamera));
        let err = tool.execute(&ToolArgs::new()).await.unwrap_err();
        assert!(err.contains("not available"));
    }

    #[tokio::test]
    async fn test_webcam_summary_describes_frame_and_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.png");
        let tool = WebcamTool::new(Arc::new(SolidCamera {
            path: path.clone(),
            level: 20,
            keep: false,
        }));
        let result = tool.execute(&ToolArgs::new()).await.unwrap();
        assert_eq!(result.summary, "Webcam frame 8x6, mean brightness 20/255: dark lighting.");
        let payload = result.payload.unwrap();
        assert_eq!(payload["lighting"], "dark");
        assert!(payload.get("path").is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_webcam_keeps_frame_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.png");
        let tool = WebcamTool::new(Arc::new(SolidCamera {
            path: path.clone(),
            level: 230,
            keep: true,
        }));
        let result = tool.execute(&ToolArgs::new()).await.unwrap();
        assert!(result.summary.ends_with("bright lighting."));
        assert!(path.exists());
        assert!(result.payload.unwrap()["path"].is_string());
    }

    #[test]
    fn test_undecodable_frame_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        assert!(summarize_frame(&path).unwrap_err().contains("Cannot decode"));
    }

    #[test]
    fn test_lighting_thresholds() {
        let frame = |mean_luminance| FrameSummary {
            width: 1,
            height: 1,
            mean_luminance,
        };
        assert_eq!(frame(49.0).lighting(), "dark");
        assert_eq!(frame(128.0).lighting(), "normal");
        assert_eq!(frame(201.0).lighting(), "bright");
    }

    #[test]
    fn test_output_dir_controls_frame_retention() {
        let mut cfg = WebcamSection::default();
        assert!(!CommandWebcam::new(&cfg, 5).keeps_frames());
        cfg.output_dir = Some(PathBuf::from("/tmp/frames"));
        assert!(CommandWebcam::new(&cfg, 5).keeps_frames());
    }
}
