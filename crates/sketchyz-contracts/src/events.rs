use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// What a drawing session records. A run reads roughly top to bottom:
/// screens change, the subject is identified, a prompt is chosen, the image
/// model succeeds or fails, and results land in or leave the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    SessionStarted,
    ScreenChanged,
    CameraReleased,
    SubjectIdentified,
    StylePromptReady,
    GenerationSucceeded,
    GenerationFailed,
    QuotaExhausted,
    GallerySaved,
    GalleryDeleted,
}

impl SessionEvent {
    pub const ALL: [SessionEvent; 10] = [
        Self::SessionStarted,
        Self::ScreenChanged,
        Self::CameraReleased,
        Self::SubjectIdentified,
        Self::StylePromptReady,
        Self::GenerationSucceeded,
        Self::GenerationFailed,
        Self::QuotaExhausted,
        Self::GallerySaved,
        Self::GalleryDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::ScreenChanged => "screen_changed",
            Self::CameraReleased => "camera_released",
            Self::SubjectIdentified => "subject_identified",
            Self::StylePromptReady => "style_prompt_ready",
            Self::GenerationSucceeded => "generation_succeeded",
            Self::GenerationFailed => "generation_failed",
            Self::QuotaExhausted => "quota_exhausted",
            Self::GallerySaved => "gallery_saved",
            Self::GalleryDeleted => "gallery_deleted",
        }
    }
}

/// Per-session JSONL log at `<data_dir>/sessions/<session_id>/events.jsonl`.
///
/// Each line is `{type, session_id, ts, ...payload}`; payload keys win on
/// collision. One-shot CLI runs and most tests use [`EventWriter::disabled`],
/// which stamps events but never opens a file.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: Option<PathBuf>,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: Some(path.into()),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: None,
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn record(&self, event: SessionEvent, payload: EventPayload) -> anyhow::Result<Value> {
        self.emit(event.as_str(), payload)
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        let Some(path) = self.inner.path.as_ref() else {
            return Ok(Value::Object(event));
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
