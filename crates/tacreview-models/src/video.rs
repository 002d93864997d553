//! Video metadata models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported input container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Mov,
    Avi,
    Mkv,
    Wmv,
}

impl ContainerFormat {
    /// All supported formats, in display order.
    pub const ALL: [ContainerFormat; 5] = [
        ContainerFormat::Mp4,
        ContainerFormat::Mov,
        ContainerFormat::Avi,
        ContainerFormat::Mkv,
        ContainerFormat::Wmv,
    ];

    /// Returns the canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
            Self::Wmv => "wmv",
        }
    }

    /// Parse a file extension, case-insensitively. A leading dot is accepted.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(ext))
    }

    /// Detect the container format from a path's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Comma-separated list of supported extensions, for error messages.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|f| format!(".{}", f.extension()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the longer side.
    pub fn longer_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Metadata for a validated input video.
///
/// Produced once by the validator and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Path of the probed file
    pub path: PathBuf,

    /// File name used for report titles and export directories
    pub file_name: String,

    /// Duration in seconds
    pub duration_secs: f64,

    /// Native resolution of the video stream
    pub resolution: Resolution,

    /// Frame rate (fps)
    pub fps: f64,

    /// File size in bytes
    pub size_bytes: u64,

    /// Container format (from the file extension)
    pub format: ContainerFormat,

    /// Video codec reported by the prober
    #[serde(default)]
    pub codec: String,
}

impl VideoMetadata {
    /// Duration of one frame in seconds.
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.fps.max(1.0)
    }

    /// File size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// File name without extension, used to name export directories.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.file_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ContainerFormat::from_extension("MP4"), Some(ContainerFormat::Mp4));
        assert_eq!(ContainerFormat::from_extension(".mkv"), Some(ContainerFormat::Mkv));
        assert_eq!(ContainerFormat::from_extension("webm"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ContainerFormat::from_path("/tmp/drill.MOV"),
            Some(ContainerFormat::Mov)
        );
        assert_eq!(ContainerFormat::from_path("/tmp/drill"), None);
    }

    #[test]
    fn test_supported_list() {
        assert_eq!(
            ContainerFormat::supported_list(),
            ".mp4, .mov, .avi, .mkv, .wmv"
        );
    }

    #[test]
    fn test_metadata_helpers() {
        let meta = VideoMetadata {
            path: PathBuf::from("/videos/room_clear.mp4"),
            file_name: "room_clear.mp4".to_string(),
            duration_secs: 37.7,
            resolution: Resolution::new(1920, 1080),
            fps: 25.0,
            size_bytes: 10 * 1024 * 1024,
            format: ContainerFormat::Mp4,
            codec: "h264".to_string(),
        };

        assert_eq!(meta.stem(), "room_clear");
        assert!((meta.frame_interval() - 0.04).abs() < 1e-9);
        assert!((meta.size_mb() - 10.0).abs() < 1e-9);
        assert_eq!(meta.resolution.longer_side(), 1920);
    }
}
