//! Single-frame extraction through the `ffmpeg` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

/// Arguments for grabbing one frame out of a video into an image file.
#[derive(Debug, Clone)]
pub struct FrameGrabCommand {
    video: PathBuf,
    image: PathBuf,
    seek: Option<f64>,
}

impl FrameGrabCommand {
    pub fn new(video: impl AsRef<Path>, image: impl AsRef<Path>) -> Self {
        Self {
            video: video.as_ref().to_path_buf(),
            image: image.as_ref().to_path_buf(),
            seek: None,
        }
    }

    /// Seek before opening the input, so ffmpeg jumps to the nearest
    /// keyframe and decodes forward to `seconds`.
    pub fn at(mut self, seconds: f64) -> Self {
        self.seek = Some(seconds.max(0.0));
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        if let Some(seek) = self.seek {
            args.extend(["-ss".to_string(), seek_arg(seek)]);
        }
        args.extend(["-i".to_string(), self.video.to_string_lossy().into_owned()]);
        args.extend(["-an", "-frames:v", "1"].map(String::from));
        args.push(self.image.to_string_lossy().into_owned());
        args
    }
}

/// Runs ffmpeg with an optional wall-clock limit.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a frame grab. A timed-out process is killed.
    pub async fn run(&self, cmd: &FrameGrabCommand) -> MediaResult<()> {
        let program = check_ffmpeg()?;
        let args = cmd.to_args();
        debug!(args = %args.join(" "), "Running ffmpeg");

        let pending = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            None => pending.await?,
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                warn!(limit_secs = limit.as_secs(), "ffmpeg timed out");
                MediaError::Timeout(limit.as_secs())
            })??,
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr_tail(&stderr, STDERR_TAIL_LINES);
        Err(MediaError::ffmpeg_failed(
            "ffmpeg did not produce a frame",
            (!tail.is_empty()).then_some(tail),
            output.status.code(),
        ))
    }
}

/// Seek position floored to the millisecond. Rounding up would land past
/// the start of the wanted frame and ffmpeg would skip to the next one.
fn seek_arg(seconds: f64) -> String {
    // Absorb float noise so exact millisecond values are kept
    let millis = (seconds * 1000.0 + 1e-6).floor() as u64;
    format!("{}.{:03}", millis / 1000, millis % 1000)
}

/// Last `lines` non-empty lines of process output.
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let kept: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    kept[kept.len().saturating_sub(lines)..].join("\n")
}

/// Locate the ffmpeg binary.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Locate the ffprobe binary.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
