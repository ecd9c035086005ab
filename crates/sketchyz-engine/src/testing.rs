use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use sketchyz_contracts::image_data::ImageData;

use crate::camera::{CameraDevice, CameraFacing, CameraStream};
use crate::config::API_KEY_ENV_NAMES;
use crate::errors::HostedError;
use crate::keys::KeySelector;
use crate::transport::ContentTransport;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub model: String,
    pub payload: Value,
}

enum Scripted {
    Reply(Value),
    Fail(String),
    MissingKey,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: Value) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Scripted::Reply(response));
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push_response(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }));
    }

    pub fn push_image(&self, bytes: &[u8]) {
        self.push_response(json!({
            "candidates": [{"content": {"role": "model", "parts": [{
                "inlineData": {"mimeType": "image/png", "data": BASE64.encode(bytes)}
            }]}}]
        }));
    }

    pub fn push_error(&self, message: &str) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Scripted::Fail(message.to_string()));
        }
    }

    /// Fails the next call the way the hosted transport does without a key.
    pub fn push_missing_key(&self) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Scripted::MissingKey);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl ContentTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("call log poisoned"))?
            .push(RecordedCall {
                model: model.to_string(),
                payload: payload.clone(),
            });
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("response queue poisoned"))?
            .pop_front();
        match next {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(anyhow!(message)),
            Some(Scripted::MissingKey) => Err(HostedError::MissingApiKey {
                checked: API_KEY_ENV_NAMES.join(", "),
            }
            .into()),
            None => bail!("no scripted response left for {model}"),
        }
    }
}

#[derive(Debug, Default)]
struct CameraLedger {
    opened: usize,
    stopped: usize,
    facings: Vec<CameraFacing>,
}

/// Camera double that counts opened and stopped streams.
#[derive(Clone)]
pub(crate) struct TrackingCamera {
    frame: Option<Vec<u8>>,
    fail_open: bool,
    ledger: Arc<Mutex<CameraLedger>>,
}

impl TrackingCamera {
    pub fn with_frame(frame: &[u8]) -> Self {
        Self {
            frame: Some(frame.to_vec()),
            fail_open: false,
            ledger: Arc::default(),
        }
    }

    pub fn without_frame() -> Self {
        Self {
            frame: None,
            fail_open: false,
            ledger: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            frame: None,
            fail_open: true,
            ledger: Arc::default(),
        }
    }

    pub fn opened(&self) -> usize {
        self.ledger.lock().map(|ledger| ledger.opened).unwrap_or(0)
    }

    pub fn stopped(&self) -> usize {
        self.ledger.lock().map(|ledger| ledger.stopped).unwrap_or(0)
    }

    pub fn open_streams(&self) -> usize {
        self.opened().saturating_sub(self.stopped())
    }

    pub fn facings(&self) -> Vec<CameraFacing> {
        self.ledger
            .lock()
            .map(|ledger| ledger.facings.clone())
            .unwrap_or_default()
    }
}

impl CameraDevice for TrackingCamera {
    fn open(&self, facing: CameraFacing) -> Result<Box<dyn CameraStream>> {
        if self.fail_open {
            bail!("permission denied");
        }
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.opened += 1;
            ledger.facings.push(facing);
        }
        Ok(Box::new(TrackingStream {
            frame: self.frame.clone(),
            ledger: self.ledger.clone(),
        }))
    }
}

struct TrackingStream {
    frame: Option<Vec<u8>>,
    ledger: Arc<Mutex<CameraLedger>>,
}

impl CameraStream for TrackingStream {
    fn capture_frame(&mut self) -> Result<Option<ImageData>> {
        Ok(self
            .frame
            .clone()
            .map(|bytes| ImageData::new("image/jpeg", bytes)))
    }

    fn stop(&mut self) {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.stopped += 1;
        }
    }
}

/// Key selector whose answer flips to `true` once the user is prompted.
#[derive(Debug, Default)]
pub(crate) struct StaticKeySelector {
    selected: AtomicBool,
}

impl StaticKeySelector {
    pub fn new(selected: bool) -> Self {
        Self {
            selected: AtomicBool::new(selected),
        }
    }
}

impl KeySelector for StaticKeySelector {
    fn has_selected_key(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }

    fn open_select_key(&self) -> Result<()> {
        self.selected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
