//! Face detection through an external helper process.
//!
//! Detection is a best-effort privacy enhancement, not a requirement. The
//! [`FaceDetector`] capability returns `None` whenever no answer is
//! available, and callers treat that exactly like "zero faces".
//!
//! ## Helper protocol
//!
//! The helper receives the absolute image path as its last argument and
//! prints one JSON object on stdout:
//!
//! ```json
//! {"width": 1200, "height": 800, "faces": [{"x": 0.41, "y": 0.18, "width": 0.12, "height": 0.2}]}
//! ```
//!
//! Face coordinates are fractions of the image size with a top-left origin.
//! Any of {spawn failure, timeout, non-zero exit, oversized output,
//! malformed JSON, missing `faces`} collapses to `None`. A helper that
//! outlives its timeout is killed.
//!
//! ## Selection
//!
//! [`select_detector`] picks the implementation once at startup, so the
//! pipelines never check the platform themselves:
//!
//! | mode | platform | result |
//! |---|---|---|
//! | `auto` | macOS, script present | [`HelperFaceDetector`] |
//! | `auto` | anything else | [`NoFaceDetector`] |
//! | `helper` | any | [`HelperFaceDetector`] |
//! | `disabled` | any | [`NoFaceDetector`] |

use crate::config::{DetectorConfig, DetectorMode};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// A face bounding box, normalized to `[0, 1]` of image width/height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Helper output: the image size the helper saw and every face it found.
///
/// Only `faces` is required. The size is informational; a missing or
/// unusable value reads as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub width: u32,
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub height: u32,
    pub faces: Vec<FaceBox>,
}

/// Any non-negative number, rounded; everything else is 0.
fn lenient_dimension<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|v| v.is_finite() && (0.0..=f64::from(u32::MAX)).contains(v))
        .map(|v| v.round() as u32)
        .unwrap_or(0))
}

/// Capability interface for face detection.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detect faces in the image at `image`. `None` means "no answer".
    async fn detect(&self, image: &Path) -> Option<Detection>;
}

/// Detector for platforms without a helper. Always answers `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaceDetector;

#[async_trait]
impl FaceDetector for NoFaceDetector {
    async fn detect(&self, _image: &Path) -> Option<Detection> {
        None
    }
}

/// Runs `<program> [<script>] <image>` and parses its stdout.
#[derive(Debug, Clone)]
pub struct HelperFaceDetector {
    program: PathBuf,
    script: Option<PathBuf>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl HelperFaceDetector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: None,
            timeout: Duration::from_millis(7000),
            max_output_bytes: 1024 * 1024,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            program: config.program.clone(),
            script: config.script.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Script passed to the program before the image path. A configured
    /// script that does not exist disables detection.
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    /// Spawn the helper and collect its stdout, bounded by size. `None` on
    /// any failure.
    async fn run(&self, image: &Path) -> Option<Vec<u8>> {
        let mut command = Command::new(&self.program);
        if let Some(script) = &self.script {
            command.arg(script);
        }
        let mut child = command
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| debug!(program = %self.program.display(), "face helper failed to start: {e}"))
            .ok()?;

        let stdout = child.stdout.take()?;
        // One extra byte distinguishes "exactly at the limit" from "over it".
        let mut limited = stdout.take(self.max_output_bytes as u64 + 1);
        let mut output = Vec::new();
        limited.read_to_end(&mut output).await.ok()?;
        if output.len() > self.max_output_bytes {
            debug!("face helper output exceeds {} bytes", self.max_output_bytes);
            return None;
        }

        let status = child.wait().await.ok()?;
        if !status.success() {
            debug!(%status, "face helper exited unsuccessfully");
            return None;
        }
        Some(output)
    }
}

#[async_trait]
impl FaceDetector for HelperFaceDetector {
    async fn detect(&self, image: &Path) -> Option<Detection> {
        if let Some(script) = &self.script {
            if !tokio::fs::try_exists(script).await.unwrap_or(false) {
                debug!(script = %script.display(), "face helper script missing");
                return None;
            }
        }
        // Dropping the run future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, self.run(image)).await {
            Ok(output) => output?,
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis() as u64, "face helper timed out");
                return None;
            }
        };
        parse_detection(&output)
    }
}

/// Parse helper stdout. Surrounding whitespace is ignored; anything that is
/// not a single object with a `faces` array is `None`.
pub fn parse_detection(stdout: &[u8]) -> Option<Detection> {
    let text = std::str::from_utf8(stdout).ok()?.trim();
    serde_json::from_str(text)
        .map_err(|e| debug!("face helper output is not a detection: {e}"))
        .ok()
}

/// Pick the detector implementation for this process.
pub fn select_detector(config: &DetectorConfig) -> Arc<dyn FaceDetector> {
    match config.mode {
        DetectorMode::Disabled => Arc::new(NoFaceDetector),
        DetectorMode::Helper => Arc::new(HelperFaceDetector::from_config(config)),
        DetectorMode::Auto => {
            let script_present = config.script.as_deref().is_none_or(Path::exists);
            if cfg!(target_os = "macos") && script_present {
                Arc::new(HelperFaceDetector::from_config(config))
            } else {
                Arc::new(NoFaceDetector)
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Detector double that returns a canned answer and counts calls.
    #[derive(Default)]
    pub struct CountingDetector {
        pub answer: Mutex<Option<Detection>>,
        pub calls: AtomicUsize,
    }

    impl CountingDetector {
        pub fn answering(answer: Option<Detection>) -> Self {
            Self {
                answer: Mutex::new(answer),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FaceDetector for CountingDetector {
        async fn detect(&self, _image: &Path) -> Option<Detection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.lock().unwrap().clone()
        }
    }

    // =========================================================================
    // Output parsing
    // =========================================================================

    #[test]
    fn parses_helper_output() {
        let d = parse_detection(
            br#"  {"width":100,"height":50,"faces":[{"x":0.1,"y":0.2,"width":0.3,"height":0.4}]}
"#,
        )
        .unwrap();
        assert_eq!((d.width, d.height), (100, 50));
        assert_eq!(
            d.faces,
            vec![FaceBox {
                x: 0.1,
                y: 0.2,
                width: 0.3,
                height: 0.4
            }]
        );
    }

    #[test]
    fn empty_faces_is_a_valid_answer() {
        let d = parse_detection(br#"{"width":10,"height":10,"faces":[]}"#).unwrap();
        assert!(d.faces.is_empty());
    }

    #[test]
    fn odd_sizes_keep_the_faces() {
        for size in ["1200.0", "-1", "\"big\"", "null", "1e40"] {
            let text = format!(
                r#"{{"width":{size},"height":{size},"faces":[{{"x":0.1,"y":0.1,"width":0.2,"height":0.2}}]}}"#
            );
            let d = parse_detection(text.as_bytes())
                .unwrap_or_else(|| panic!("size {size} dropped the answer"));
            assert_eq!(d.faces.len(), 1, "size {size}");
        }
        let d = parse_detection(br#"{"width":1200.0,"height":799.6,"faces":[]}"#).unwrap();
        assert_eq!((d.width, d.height), (1200, 800));
        let d = parse_detection(br#"{"width":-1,"faces":[]}"#).unwrap();
        assert_eq!((d.width, d.height), (0, 0));
    }

    #[test]
    fn missing_faces_is_no_answer() {
        assert_eq!(parse_detection(br#"{"width":10,"height":10}"#), None);
    }

    #[test]
    fn non_array_faces_is_no_answer() {
        assert_eq!(parse_detection(br#"{"faces":"none"}"#), None);
    }

    #[test]
    fn garbage_is_no_answer() {
        assert_eq!(parse_detection(b"Segmentation fault"), None);
        assert_eq!(parse_detection(b""), None);
        assert_eq!(parse_detection(&[0xff, 0xfe]), None);
    }

    // =========================================================================
    // Helper process
    // =========================================================================

    #[tokio::test]
    async fn null_detector_never_answers() {
        assert_eq!(NoFaceDetector.detect(Path::new("/x.jpg")).await, None);
    }

    #[tokio::test]
    async fn missing_program_is_no_answer() {
        let d = HelperFaceDetector::new("/nonexistent/face-helper");
        assert_eq!(d.detect(Path::new("/x.jpg")).await, None);
    }

    #[tokio::test]
    async fn missing_script_is_no_answer() {
        let d = HelperFaceDetector::new("sh").with_script("/nonexistent/detect.sh");
        assert_eq!(d.detect(Path::new("/x.jpg")).await, None);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("detect.sh");
            fs::write(&path, body).unwrap();
            path
        }

        #[tokio::test]
        async fn helper_answer_is_parsed() {
            let tmp = TempDir::new().unwrap();
            let s = script(
                &tmp,
                r#"echo '{"width":640,"height":480,"faces":[{"x":0.5,"y":0.5,"width":0.1,"height":0.1}]}'"#,
            );
            let d = HelperFaceDetector::new("sh").with_script(s);
            let detection = d.detect(Path::new("/any.jpg")).await.unwrap();
            assert_eq!(detection.width, 640);
            assert_eq!(detection.faces.len(), 1);
        }

        #[tokio::test]
        async fn image_path_is_last_argument() {
            let tmp = TempDir::new().unwrap();
            let s = script(
                &tmp,
                r#"if [ "$1" = "/photos/a b.jpg" ]; then echo '{"width":1,"height":1,"faces":[]}'; else exit 9; fi"#,
            );
            let d = HelperFaceDetector::new("sh").with_script(s);
            assert!(d.detect(Path::new("/photos/a b.jpg")).await.is_some());
        }

        #[tokio::test]
        async fn nonzero_exit_is_no_answer() {
            let tmp = TempDir::new().unwrap();
            let s = script(&tmp, r#"echo '{"width":1,"height":1,"faces":[]}'; exit 3"#);
            let d = HelperFaceDetector::new("sh").with_script(s);
            assert_eq!(d.detect(Path::new("/any.jpg")).await, None);
        }

        #[tokio::test]
        async fn timeout_is_no_answer() {
            let tmp = TempDir::new().unwrap();
            let s = script(&tmp, "sleep 5; echo '{\"faces\":[]}'");
            let d = HelperFaceDetector::new("sh")
                .with_script(s)
                .with_timeout(Duration::from_millis(200));
            let started = std::time::Instant::now();
            assert_eq!(d.detect(Path::new("/any.jpg")).await, None);
            assert!(started.elapsed() < Duration::from_secs(4));
        }

        #[tokio::test]
        async fn oversized_output_is_no_answer() {
            let tmp = TempDir::new().unwrap();
            let s = script(&tmp, r#"echo '{"width":1,"height":1,"faces":[]}'"#);
            let d = HelperFaceDetector::new("sh")
                .with_script(s)
                .with_max_output_bytes(8);
            assert_eq!(d.detect(Path::new("/any.jpg")).await, None);
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    #[tokio::test]
    async fn disabled_mode_never_answers() {
        let config = DetectorConfig {
            mode: DetectorMode::Disabled,
            program: PathBuf::from("sh"),
            script: None,
            ..DetectorConfig::default()
        };
        let detector = select_detector(&config);
        assert_eq!(detector.detect(Path::new("/x.jpg")).await, None);
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn auto_mode_is_inert_off_macos() {
        let config = DetectorConfig {
            mode: DetectorMode::Auto,
            program: PathBuf::from("/bin/echo"),
            script: None,
            ..DetectorConfig::default()
        };
        let detector = select_detector(&config);
        assert_eq!(detector.detect(Path::new("/x.jpg")).await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn helper_mode_runs_on_any_platform() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("detect.sh");
        std::fs::write(&path, r#"echo '{"width":2,"height":2,"faces":[]}'"#).unwrap();
        let config = DetectorConfig {
            mode: DetectorMode::Helper,
            program: PathBuf::from("sh"),
            script: Some(path),
            ..DetectorConfig::default()
        };
        let detector = select_detector(&config);
        let d = detector.detect(Path::new("/x.jpg")).await.unwrap();
        assert_eq!((d.width, d.height), (2, 2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn relative_script_is_found_outside_working_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("helpers")).unwrap();
        std::fs::write(
            tmp.path().join("helpers/detect.sh"),
            r#"echo '{"width":3,"height":3,"faces":[{"x":0.1,"y":0.1,"width":0.2,"height":0.2}]}'"#,
        )
        .unwrap();
        let config_path = tmp.path().join("studio-refs.toml");
        std::fs::write(
            &config_path,
            "[detector]\nmode = \"helper\"\nprogram = \"sh\"\nscript = \"helpers/detect.sh\"\n",
        )
        .unwrap();
        assert!(!Path::new("helpers/detect.sh").exists());

        let config = crate::config::load_config(Some(&config_path)).unwrap();
        let selected = select_detector(&config.detector);
        assert_eq!(selected.detect(Path::new("/x.jpg")).await.unwrap().faces.len(), 1);

        let helper = HelperFaceDetector::from_config(&config.detector);
        assert_eq!(helper.detect(Path::new("/x.jpg")).await.unwrap().width, 3);
    }
}
