//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tacreview_media::{SamplerConfig, ValidationLimits, DEFAULT_POSITIONS};
use tacreview_vision::{GeminiConfig, PromptTemplate, RetryConfig, VisionResult, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Placeholder shipped in sample env files; treated as unset.
const API_KEY_PLACEHOLDER: &str = "your_gemini_api_key_here";

/// Smallest accepted resize bound, in pixels.
const MIN_RESIZE_MAX: u32 = 100;

/// Worker configuration.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Vision API credential
    pub api_key: Option<String>,
    /// Analysis model id
    pub model: String,
    /// Vision API base URL
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output tokens per response
    pub max_tokens: u32,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Maximum input duration in seconds
    pub max_video_duration_secs: f64,
    /// Maximum input size in megabytes
    pub max_file_size_mb: u64,
    /// Sampling ratios
    pub frame_positions: Vec<f64>,
    /// Longer side of normalized frames
    pub resize_max: u32,
    /// JPEG quality of normalized frames
    pub jpeg_quality: u8,
    /// Decode probing window around each position
    pub decode_tolerance_secs: f64,
    /// Concurrent vision requests
    pub max_concurrent_requests: usize,
    /// Attempts per vision request, including the first
    pub analysis_max_attempts: u32,
    /// Base backoff delay
    pub retry_base_ms: u64,
    /// Backoff delay cap
    pub retry_max_ms: u64,
    /// Time budget for the analysis stage
    pub analysis_timeout: Duration,
    /// Ranked strengths/errors kept in the report
    pub top_findings: usize,
    /// Overall score below which fundamentals training is recommended
    pub benchmark_threshold: u8,
    /// Export root directory
    pub output_dir: PathBuf,
    /// Analysis prompt template file; the built-in template when unset
    pub prompt_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            request_timeout: Duration::from_secs(60),
            max_video_duration_secs: 120.0,
            max_file_size_mb: 100,
            frame_positions: DEFAULT_POSITIONS.to_vec(),
            resize_max: 720,
            jpeg_quality: 85,
            decode_tolerance_secs: 0.5,
            max_concurrent_requests: 3,
            analysis_max_attempts: 3,
            retry_base_ms: 500,
            retry_max_ms: 8000,
            analysis_timeout: Duration::from_secs(300),
            top_findings: 5,
            benchmark_threshold: 70,
            output_dir: PathBuf::from("outputs"),
            prompt_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Self {
            api_key: resolve_api_key(&lookup),
            model: text("GEMINI_ANALYSIS_MODEL").unwrap_or(defaults.model),
            base_url: text("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            temperature: parse_var(&lookup, "TEMPERATURE").unwrap_or(defaults.temperature),
            max_tokens: parse_var(&lookup, "MAX_TOKENS").unwrap_or(defaults.max_tokens),
            request_timeout: parse_var(&lookup, "GEMINI_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_video_duration_secs: parse_var(&lookup, "MAX_VIDEO_DURATION")
                .unwrap_or(defaults.max_video_duration_secs),
            max_file_size_mb: parse_var(&lookup, "MAX_FILE_SIZE_MB").unwrap_or(defaults.max_file_size_mb),
            frame_positions: text("FRAME_EXTRACTION_POSITIONS")
                .map(|s| parse_positions(&s))
                .unwrap_or(defaults.frame_positions),
            resize_max: parse_var(&lookup, "FRAME_RESIZE_MAX").unwrap_or(defaults.resize_max),
            jpeg_quality: parse_var(&lookup, "FRAME_QUALITY").unwrap_or(defaults.jpeg_quality),
            decode_tolerance_secs: parse_var(&lookup, "FRAME_DECODE_TOLERANCE_SECS")
                .unwrap_or(defaults.decode_tolerance_secs),
            max_concurrent_requests: parse_var(&lookup, "MAX_CONCURRENT_REQUESTS")
                .unwrap_or(defaults.max_concurrent_requests),
            analysis_max_attempts: parse_var(&lookup, "ANALYSIS_MAX_ATTEMPTS")
                .unwrap_or(defaults.analysis_max_attempts),
            retry_base_ms: parse_var(&lookup, "ANALYSIS_RETRY_BASE_MS").unwrap_or(defaults.retry_base_ms),
            retry_max_ms: parse_var(&lookup, "ANALYSIS_RETRY_MAX_MS").unwrap_or(defaults.retry_max_ms),
            analysis_timeout: parse_var(&lookup, "TACREVIEW_ANALYSIS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_timeout),
            top_findings: parse_var(&lookup, "TOP_FINDINGS").unwrap_or(defaults.top_findings),
            benchmark_threshold: parse_var(&lookup, "BENCHMARK_THRESHOLD")
                .unwrap_or(defaults.benchmark_threshold),
            output_dir: text("TACREVIEW_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            prompt_path: text("ANALYSIS_PROMPT_PATH").map(PathBuf::from),
        }
    }

    /// Check the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_none() {
            return Err("GEMINI_API_KEY (or GOOGLE_API_KEY) must be set".to_string());
        }

        if self.frame_positions.is_empty() {
            return Err("FRAME_EXTRACTION_POSITIONS must contain at least one ratio".to_string());
        }

        if let Some(bad) = self
            .frame_positions
            .iter()
            .find(|r| !(**r > 0.0 && **r < 1.0))
        {
            return Err(format!(
                "FRAME_EXTRACTION_POSITIONS values must be between 0 and 1 (exclusive), got {}",
                bad
            ));
        }

        if self.resize_max < MIN_RESIZE_MAX {
            return Err(format!(
                "FRAME_RESIZE_MAX must be at least {}, got {}",
                MIN_RESIZE_MAX, self.resize_max
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err("MAX_CONCURRENT_REQUESTS must be at least 1".to_string());
        }

        if self.analysis_max_attempts == 0 {
            return Err("ANALYSIS_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "FRAME_QUALITY must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }

        Ok(())
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits::new(self.max_video_duration_secs, self.max_file_size_mb)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            resize_max: self.resize_max,
            jpeg_quality: self.jpeg_quality,
            tolerance_secs: self.decode_tolerance_secs,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(self.analysis_max_attempts)
            .with_base_delay_ms(self.retry_base_ms)
            .with_max_delay_ms(self.retry_max_ms)
    }

    /// Gemini transport settings; `None` without a credential.
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let api_key = self.api_key.as_ref()?;
        let mut config = GeminiConfig::new(api_key.clone())
            .with_model(self.model.clone())
            .with_base_url(self.base_url.clone());
        config.temperature = self.temperature;
        config.max_output_tokens = self.max_tokens;
        config.timeout = self.request_timeout;
        Some(config)
    }

    /// Load the analysis prompt template.
    pub fn load_prompt(&self) -> VisionResult<PromptTemplate> {
        match &self.prompt_path {
            Some(path) => PromptTemplate::from_file(path),
            None => PromptTemplate::analysis_default(),
        }
    }
}

// Keep the credential out of logs.
impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("frame_positions", &self.frame_positions)
            .field("resize_max", &self.resize_max)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .field("analysis_max_attempts", &self.analysis_max_attempts)
            .field("analysis_timeout", &self.analysis_timeout)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

/// `GOOGLE_API_KEY` wins over `GEMINI_API_KEY`; blanks and the sample
/// placeholder count as unset.
fn resolve_api_key<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    ["GOOGLE_API_KEY", "GEMINI_API_KEY"].into_iter().find_map(|key| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && v != API_KEY_PLACEHOLDER)
    })
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}

/// Parse a comma-separated ratio list. Unparsable entries become NaN so
/// validation reports them.
fn parse_positions(value: &str) -> Vec<f64> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(f64::NAN))
        .collect()
}
