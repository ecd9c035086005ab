use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

pub mod broker;
pub mod camera;
pub mod config;
pub mod content;
pub mod controller;
pub mod errors;
pub mod export;
pub mod identify;
pub mod keys;
pub mod styler;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use broker::PromptBroker;
pub use camera::{
    CameraDevice, CameraFacing, CameraSession, CameraStream, NoCamera, StillImageCamera,
};
pub use config::{EngineConfig, ModelConfig};
pub use controller::{build_transport, AppState, Controller, ControllerParts, GeneratedResult, Screen};
pub use errors::{
    classify_failure, AttemptFailure, FailureKind, HostedError, StyleFailure, TransitionError,
};
pub use export::{OutboxShareSheet, ShareOutcome, ShareRequest, ShareSheet, UnsupportedShareSheet};
pub use identify::SubjectIdentifier;
pub use keys::{EnvKeySelector, KeySelector, OfflineKeySelector};
pub use styler::{ImageStyler, OutputShape, StyledImage, StylerStrategy};
pub use transport::{ContentTransport, DryrunTransport, GeminiTransport};

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Flattens an error chain into one line, skipping repeated causes.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing: &String| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub(crate) fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
