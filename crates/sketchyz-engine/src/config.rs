use std::path::{Path, PathBuf};
use std::time::Duration;

use sketchyz_contracts::quota::MAX_GENERATIONS;

use crate::non_empty_env;

/// Checked in order; the first non-empty value wins.
pub const API_KEY_ENV_NAMES: &[&str] = &[
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
    "API_KEY",
    "VITE_GEMINI_API_KEY",
];

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_DATA_DIR: &str = ".sketchyz";
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_BRAIN_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_PRIMARY_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_FALLBACK_IMAGE_MODEL: &str = "gemini-2.0-flash-exp";

const DEFAULT_REQUEST_TIMEOUT_S: f64 = 120.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub vision: String,
    pub brain: String,
    pub primary_image: String,
    pub fallback_image: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vision: DEFAULT_VISION_MODEL.to_string(),
            brain: DEFAULT_BRAIN_MODEL.to_string(),
            primary_image: DEFAULT_PRIMARY_IMAGE_MODEL.to_string(),
            fallback_image: DEFAULT_FALLBACK_IMAGE_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub api_base: String,
    pub models: ModelConfig,
    pub request_timeout: Duration,
    pub max_generations: u64,
    /// Swap the hosted API for the offline deterministic transport.
    pub dryrun: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_base: DEFAULT_API_BASE.to_string(),
            models: ModelConfig::default(),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_S),
            max_generations: MAX_GENERATIONS,
            dryrun: false,
        }
    }
}

impl EngineConfig {
    /// Loads `.env` (if present) and overlays `SKETCHYZ_*` / `GEMINI_API_BASE`
    /// variables on top of the defaults.
    pub fn from_env() -> Self {
        load_dotenv();
        let defaults = Self::default();
        let models = ModelConfig {
            vision: non_empty_env("SKETCHYZ_VISION_MODEL").unwrap_or(defaults.models.vision),
            brain: non_empty_env("SKETCHYZ_BRAIN_MODEL").unwrap_or(defaults.models.brain),
            primary_image: non_empty_env("SKETCHYZ_PRIMARY_IMAGE_MODEL")
                .unwrap_or(defaults.models.primary_image),
            fallback_image: non_empty_env("SKETCHYZ_FALLBACK_IMAGE_MODEL")
                .unwrap_or(defaults.models.fallback_image),
        };
        Self {
            data_dir: non_empty_env("SKETCHYZ_HOME")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            api_base: non_empty_env("GEMINI_API_BASE")
                .map(|value| normalize_api_base(&value))
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            models,
            request_timeout: request_timeout_from(
                non_empty_env("SKETCHYZ_REQUEST_TIMEOUT").as_deref(),
            ),
            max_generations: non_empty_env("SKETCHYZ_MAX_GENERATIONS")
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(defaults.max_generations),
            dryrun: non_empty_env("SKETCHYZ_DRYRUN")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn gallery_path(&self) -> PathBuf {
        self.data_dir.join("gallery.json")
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.data_dir.join("local_storage.json")
    }

    pub fn events_path(&self, session_id: &str) -> PathBuf {
        self.data_dir
            .join("sessions")
            .join(session_id)
            .join("events.jsonl")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.data_dir.join("outbox")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

pub fn load_dotenv() {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();
}

pub fn resolve_api_key() -> Option<String> {
    API_KEY_ENV_NAMES.iter().find_map(|name| non_empty_env(name))
}

pub(crate) fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub(crate) fn request_timeout_from(raw: Option<&str>) -> Duration {
    let seconds = raw
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
        .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);
    Duration::from_secs_f64(seconds)
}
