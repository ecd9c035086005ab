use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sketchyz_contracts::brain::{BrainContext, BrainMode, BrainRequest};
use sketchyz_contracts::events::{EventWriter, SessionEvent};
use sketchyz_contracts::gallery::{GalleryItem, GalleryStore, NewGalleryItem};
use sketchyz_contracts::image_data::ImageData;
use sketchyz_contracts::quota::{GenerationQuota, JsonScalarStore};
use sketchyz_contracts::styles::{StyleCatalog, StyleOption};
use uuid::Uuid;

use crate::broker::PromptBroker;
use crate::camera::{CameraDevice, CameraFacing, CameraSession, NoCamera};
use crate::config::EngineConfig;
use crate::errors::{classify_failure, FailureKind, TransitionError};
use crate::export::{download_png, OutboxShareSheet, ShareOutcome, ShareRequest, ShareSheet};
use crate::identify::{strip_leading_article, SubjectIdentifier};
use crate::keys::{EnvKeySelector, KeySelector, OfflineKeySelector};
use crate::styler::ImageStyler;
use crate::transport::{ContentTransport, DryrunTransport, GeminiTransport};
use crate::{error_chain_text, map_object};

pub const MISSING_KEY_MESSAGE: &str = "Please unlock the pro magic with a key first!";
pub const CAMERA_ERROR_MESSAGE: &str = "We couldn't open your camera. Try uploading a file instead!";
pub const KEY_ISSUE_MESSAGE: &str = "Magic key issue! Please select your key again.";
pub const FIZZLE_MESSAGE: &str = "Oh no! The magic spell fizzled out. Please try again!";
pub const STORAGE_FULL_MESSAGE: &str = "Oops! Your device storage might be full.";
pub const SHARE_UNSUPPORTED_MESSAGE: &str =
    "Sharing isn't supported on this device. Try downloading it instead!";
pub const DEFAULT_RESULT_MESSAGE: &str = "Wow! You made art!";

const ANALYZING_MESSAGE: &str = "Looking at your drawing...";
const CREATING_MESSAGE: &str = "Creating your masterpiece...";
const GALLERY_LOADING_MESSAGE: &str = "Opening your gallery...";

fn quota_message(limit: u64) -> String {
    format!(
        "You've used all {limit} free generations! Share the app to unlock more \
(just kidding, that's the limit for now!)."
    )
}

fn fun_phrases(subject: &str) -> [String; 5] {
    [
        format!("Teaching the pixels to draw your {subject}..."),
        format!("Mixing up magic colors for your {subject}!"),
        format!("Sprinkling creative dust on your {subject}..."),
        format!("Dreaming up a wild {subject} for you..."),
        format!("Asking the art wizard about your {subject}!"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Welcome,
    CameraChoice,
    LiveCamera,
    ContextInput,
    Analyzing,
    StyleSelect,
    Processing,
    Result,
    Gallery,
}

impl Screen {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::CameraChoice => "camera_choice",
            Self::LiveCamera => "live_camera",
            Self::ContextInput => "context_input",
            Self::Analyzing => "analyzing",
            Self::StyleSelect => "style_select",
            Self::Processing => "processing",
            Self::Result => "result",
            Self::Gallery => "gallery",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The generation currently on screen. `subject` is empty when resumed from
/// the gallery, which does not store it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedResult {
    pub original_image: ImageData,
    pub styled_image: ImageData,
    pub style_id: String,
    pub message: String,
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub original_image: Option<ImageData>,
    pub drawing_subject: String,
    pub user_context: String,
    pub selected_style: Option<String>,
    pub result: Option<GeneratedResult>,
    pub loading_message: Option<String>,
    /// Every loading message shown during the last long-running operation.
    pub loading_history: Vec<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub gallery_items: Vec<GalleryItem>,
    pub has_saved: bool,
    pub has_api_key: bool,
    pub current_prompt: String,
    pub use_result_as_input: bool,
    pub facing: CameraFacing,
}

impl AppState {
    fn new(has_api_key: bool) -> Self {
        Self {
            screen: Screen::Welcome,
            original_image: None,
            drawing_subject: String::new(),
            user_context: String::new(),
            selected_style: None,
            result: None,
            loading_message: None,
            loading_history: Vec::new(),
            error: None,
            notice: None,
            gallery_items: Vec::new(),
            has_saved: false,
            has_api_key,
            current_prompt: String::new(),
            use_result_as_input: false,
            facing: CameraFacing::default(),
        }
    }
}

/// Collaborators the controller drives; swap any of them in tests.
pub struct ControllerParts {
    pub catalog: StyleCatalog,
    pub identifier: SubjectIdentifier,
    pub broker: PromptBroker,
    pub styler: ImageStyler,
    pub gallery: GalleryStore,
    pub quota: GenerationQuota,
    pub camera: Box<dyn CameraDevice>,
    pub keys: Box<dyn KeySelector>,
    pub share: Box<dyn ShareSheet>,
    pub events: EventWriter,
    pub downloads_dir: PathBuf,
}

impl ControllerParts {
    /// File-backed stores under the configured data dir, no camera, env keys
    /// (none needed in dry-run), outbox sharing and a disabled event log.
    pub fn from_config(config: &EngineConfig, transport: Arc<dyn ContentTransport>) -> Self {
        let keys: Box<dyn KeySelector> = if config.dryrun {
            Box::new(OfflineKeySelector)
        } else {
            Box::new(EnvKeySelector)
        };
        Self {
            catalog: StyleCatalog::default(),
            identifier: SubjectIdentifier::new(transport.clone(), config.models.vision.clone()),
            broker: PromptBroker::new(transport.clone(), config.models.brain.clone()),
            styler: ImageStyler::from_models(transport, &config.models),
            gallery: GalleryStore::new(config.gallery_path()),
            quota: GenerationQuota::new(
                Box::new(JsonScalarStore::new(config.local_storage_path())),
                config.max_generations,
            ),
            camera: Box::new(NoCamera),
            keys,
            share: Box::new(OutboxShareSheet::new(config.outbox_dir())),
            events: EventWriter::disabled("detached"),
            downloads_dir: config.downloads_dir(),
        }
    }
}

pub fn build_transport(config: &EngineConfig) -> Arc<dyn ContentTransport> {
    if config.dryrun {
        Arc::new(DryrunTransport)
    } else {
        Arc::new(GeminiTransport::new(
            config.api_base.clone(),
            config.request_timeout,
        ))
    }
}

/// Owns the application state and walks it through the screen sequence.
///
/// Every operation checks the current screen first and returns
/// [`TransitionError`] when it does not apply. Hosted failures never escape
/// as errors; they are routed through [`Controller::handle_api_error`] and
/// surface in `state.error`.
pub struct Controller {
    state: AppState,
    catalog: StyleCatalog,
    identifier: SubjectIdentifier,
    broker: PromptBroker,
    styler: ImageStyler,
    gallery: GalleryStore,
    quota: GenerationQuota,
    camera: Box<dyn CameraDevice>,
    camera_session: CameraSession,
    keys: Box<dyn KeySelector>,
    share: Box<dyn ShareSheet>,
    events: EventWriter,
    downloads_dir: PathBuf,
}

impl Controller {
    pub fn new(parts: ControllerParts) -> Self {
        let has_api_key = parts.keys.has_selected_key();
        let controller = Self {
            state: AppState::new(has_api_key),
            catalog: parts.catalog,
            identifier: parts.identifier,
            broker: parts.broker,
            styler: parts.styler,
            gallery: parts.gallery,
            quota: parts.quota,
            camera: parts.camera,
            camera_session: CameraSession::new(),
            keys: parts.keys,
            share: parts.share,
            events: parts.events,
            downloads_dir: parts.downloads_dir,
        };
        controller.emit(
            SessionEvent::SessionStarted,
            json!({
                "has_api_key": has_api_key,
                "generations_used": controller.quota.used(),
                "generation_limit": controller.quota.limit(),
            }),
        );
        controller
    }

    /// Hosted or dry-run transport per `config`, with the session log under
    /// `<data_dir>/sessions/<session_id>/events.jsonl`.
    pub fn from_config(
        config: &EngineConfig,
        session_id: &str,
        camera: Box<dyn CameraDevice>,
        share: Box<dyn ShareSheet>,
    ) -> Self {
        let mut parts = ControllerParts::from_config(config, build_transport(config));
        parts.camera = camera;
        parts.share = share;
        parts.events = EventWriter::new(config.events_path(session_id), session_id);
        Self::new(parts)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn screen(&self) -> Screen {
        self.state.screen
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn gallery(&self) -> &GalleryStore {
        &self.gallery
    }

    pub fn quota(&self) -> &GenerationQuota {
        &self.quota
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    pub fn camera_active(&self) -> bool {
        self.camera_session.is_active()
    }

    /// Clears one-shot feedback after the front end has shown it.
    pub fn clear_feedback(&mut self) {
        self.state.error = None;
        self.state.notice = None;
    }

    pub fn open_select_key(&mut self) -> Result<()> {
        self.keys.open_select_key()?;
        self.state.has_api_key = true;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.expect_screen("start", &[Screen::Welcome, Screen::Gallery])?;
        if !self.state.has_api_key {
            self.state.error = Some(MISSING_KEY_MESSAGE.to_string());
            return Ok(());
        }
        self.state.error = None;
        self.set_screen(Screen::CameraChoice);
        Ok(())
    }

    pub fn start_live_camera(&mut self) -> Result<()> {
        self.expect_screen("start the live camera", &[Screen::CameraChoice])?;
        self.state.error = None;
        if self.open_camera() {
            self.set_screen(Screen::LiveCamera);
        }
        Ok(())
    }

    pub fn toggle_camera(&mut self) -> Result<()> {
        self.expect_screen("flip the camera", &[Screen::LiveCamera])?;
        self.release_camera();
        self.state.facing = self.state.facing.flip();
        if !self.open_camera() {
            self.set_screen(Screen::CameraChoice);
        }
        Ok(())
    }

    /// Without a ready frame the screen stays on the live camera.
    pub fn capture_photo(&mut self) -> Result<()> {
        self.expect_screen("capture a photo", &[Screen::LiveCamera])?;
        match self.camera_session.capture() {
            Ok(Some(frame)) => {
                self.accept_new_image(frame);
                self.set_screen(Screen::ContextInput);
            }
            Ok(None) => {
                tracing::debug!("camera frame not ready yet");
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "camera capture failed");
                self.state.error = Some(CAMERA_ERROR_MESSAGE.to_string());
                self.set_screen(Screen::CameraChoice);
            }
        }
        Ok(())
    }

    pub fn upload_image(&mut self, image: ImageData) -> Result<()> {
        self.expect_screen(
            "upload a drawing",
            &[Screen::CameraChoice, Screen::LiveCamera],
        )?;
        self.state.error = None;
        self.accept_new_image(image);
        self.set_screen(Screen::ContextInput);
        Ok(())
    }

    pub fn back(&mut self) -> Result<()> {
        let target = match self.state.screen {
            Screen::LiveCamera | Screen::ContextInput | Screen::StyleSelect => Screen::CameraChoice,
            Screen::CameraChoice | Screen::Gallery => Screen::Welcome,
            screen => {
                return Err(TransitionError::InvalidScreen {
                    action: "go back",
                    screen,
                }
                .into())
            }
        };
        self.set_screen(target);
        Ok(())
    }

    pub fn set_context_input(&mut self, text: &str) -> Result<()> {
        self.expect_screen("describe the drawing", &[Screen::ContextInput])?;
        self.state.user_context = text.to_string();
        Ok(())
    }

    /// A typed description becomes the subject; otherwise the drawing is analyzed.
    pub fn accept_context(&mut self) -> Result<()> {
        self.expect_screen("accept the description", &[Screen::ContextInput])?;
        let typed = self.state.user_context.trim().to_string();
        if typed.is_empty() {
            return self.analyze();
        }
        self.state.drawing_subject = typed;
        self.set_screen(Screen::StyleSelect);
        Ok(())
    }

    pub fn analyze(&mut self) -> Result<()> {
        self.expect_screen("analyze the drawing", &[Screen::ContextInput])?;
        let image = self
            .state
            .original_image
            .clone()
            .ok_or(TransitionError::MissingImage)?;
        self.set_screen(Screen::Analyzing);
        self.begin_loading(ANALYZING_MESSAGE);
        let subject = strip_leading_article(&self.identifier.identify(&image));
        self.emit(SessionEvent::SubjectIdentified, json!({ "subject": subject }));
        self.state.drawing_subject = subject;
        self.state.loading_message = None;
        self.set_screen(Screen::StyleSelect);
        Ok(())
    }

    pub fn select_style(&mut self, style_id: &str) -> Result<()> {
        self.expect_screen("pick a style", &[Screen::StyleSelect, Screen::Result])?;
        let style = self.lookup_style(style_id)?;
        let original = self
            .state
            .original_image
            .clone()
            .ok_or(TransitionError::MissingImage)?;
        self.state.selected_style = Some(style.id.clone());
        if self.quota_exhausted() {
            return Ok(());
        }

        self.set_screen(Screen::Processing);
        self.begin_loading(CREATING_MESSAGE);
        self.state.has_saved = false;

        let raw_subject = if self.state.drawing_subject.trim().is_empty() {
            self.identifier.identify(&original)
        } else {
            self.state.drawing_subject.clone()
        };
        let subject = strip_leading_article(&raw_subject);
        self.state.drawing_subject = subject.clone();
        self.push_loading(format!("I spy with my robot eye... a {subject}!"));

        let brain = self.broker.ask(&BrainRequest::new(
            BrainMode::StyleDescription,
            Some(&style.id),
            &subject,
            BrainContext::AfterGeneration,
        ));
        let prompt = brain
            .style_prompt
            .clone()
            .unwrap_or_else(|| style.description.clone());
        self.state.current_prompt = prompt.clone();
        self.emit(
            SessionEvent::StylePromptReady,
            json!({
                "style_id": style.id,
                "subject": subject,
                "from_brain": brain.style_prompt.is_some(),
            }),
        );
        let loading = brain
            .loading_message
            .clone()
            .unwrap_or_else(|| pick_fun_phrase(&subject));
        self.push_loading(loading);

        match self.styler.style(&original, &prompt, Some(&style.id)) {
            Ok(styled) => {
                self.record_generation();
                self.emit(
                    SessionEvent::GenerationSucceeded,
                    json!({
                        "kind": "style",
                        "style_id": style.id,
                        "model": styled.model,
                        "failed_attempts": styled.attempts.len(),
                    }),
                );
                self.state.result = Some(GeneratedResult {
                    original_image: original,
                    styled_image: styled.image,
                    style_id: style.id.clone(),
                    message: brain
                        .kid_message
                        .unwrap_or_else(|| DEFAULT_RESULT_MESSAGE.to_string()),
                    subject,
                });
                self.state.loading_message = None;
                self.set_screen(Screen::Result);
            }
            Err(failure) => {
                self.emit(
                    SessionEvent::GenerationFailed,
                    json!({"kind": "style", "style_id": style.id, "error": failure.to_string()}),
                );
                self.handle_api_error(&anyhow::Error::new(failure));
            }
        }
        Ok(())
    }

    /// Re-runs the styler with the edited prompt on the original drawing, or
    /// on the last result when iterating.
    pub fn regenerate(&mut self) -> Result<()> {
        self.expect_screen("regenerate", &[Screen::Result])?;
        let result = self.state.result.clone().ok_or(TransitionError::NoResult)?;
        let prompt = self.state.current_prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(TransitionError::NothingToRegenerate.into());
        }
        if self.quota_exhausted() {
            return Ok(());
        }
        let input = if self.state.use_result_as_input {
            result.styled_image.clone()
        } else {
            self.state
                .original_image
                .clone()
                .unwrap_or_else(|| result.original_image.clone())
        };
        let style_id = self
            .state
            .selected_style
            .clone()
            .unwrap_or_else(|| result.style_id.clone());

        self.set_screen(Screen::Processing);
        self.begin_loading(CREATING_MESSAGE);
        self.state.has_saved = false;

        match self.styler.style(&input, &prompt, Some(&style_id)) {
            Ok(styled) => {
                self.record_generation();
                self.emit(
                    SessionEvent::GenerationSucceeded,
                    json!({
                        "kind": "regenerate",
                        "style_id": style_id,
                        "model": styled.model,
                        "from_result": self.state.use_result_as_input,
                        "failed_attempts": styled.attempts.len(),
                    }),
                );
                if let Some(current) = self.state.result.as_mut() {
                    current.styled_image = styled.image;
                    current.style_id = style_id;
                }
                self.state.loading_message = None;
                self.set_screen(Screen::Result);
            }
            Err(failure) => {
                self.emit(
                    SessionEvent::GenerationFailed,
                    json!({"kind": "regenerate", "style_id": style_id, "error": failure.to_string()}),
                );
                self.handle_api_error(&anyhow::Error::new(failure));
            }
        }
        Ok(())
    }

    pub fn set_prompt(&mut self, prompt: &str) -> Result<()> {
        self.expect_screen("edit the prompt", &[Screen::Result])?;
        self.state.current_prompt = prompt.to_string();
        Ok(())
    }

    /// Picks another style for the next regeneration and resets the prompt.
    pub fn switch_style(&mut self, style_id: &str) -> Result<()> {
        self.expect_screen("switch styles", &[Screen::Result])?;
        let style = self.lookup_style(style_id)?;
        self.state.current_prompt = format!("{} style of {}", style.name, self.state.drawing_subject)
            .trim_end()
            .to_string();
        self.state.selected_style = Some(style.id);
        Ok(())
    }

    pub fn set_use_result_as_input(&mut self, enabled: bool) -> Result<()> {
        self.expect_screen("toggle editing the result", &[Screen::Result])?;
        self.state.use_result_as_input = enabled;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.set_screen(Screen::Welcome);
        self.state.original_image = None;
        self.state.result = None;
        self.state.selected_style = None;
        self.state.drawing_subject.clear();
        self.state.user_context.clear();
        self.state.current_prompt.clear();
        self.state.has_saved = false;
        self.state.use_result_as_input = false;
        self.state.loading_message = None;
        self.state.loading_history.clear();
        self.clear_feedback();
    }

    /// Saves the current result once; storage failures become a notice.
    pub fn save_to_gallery(&mut self) -> Result<()> {
        self.expect_screen("save", &[Screen::Result])?;
        let result = self.state.result.as_ref().ok_or(TransitionError::NoResult)?;
        if self.state.has_saved {
            return Ok(());
        }
        let record = NewGalleryItem {
            original_image: result.original_image.to_data_url(),
            styled_image: result.styled_image.to_data_url(),
            style_id: result.style_id.clone(),
            message: result.message.clone(),
        };
        match self.gallery.insert(record) {
            Ok(item) => {
                self.emit(
                    SessionEvent::GallerySaved,
                    json!({"id": item.id, "style_id": item.style_id}),
                );
                self.state.has_saved = true;
                self.state.gallery_items = self.gallery.list();
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "gallery save failed");
                self.state.notice = Some(STORAGE_FULL_MESSAGE.to_string());
            }
        }
        Ok(())
    }

    /// Available from every screen; an unreadable store shows an empty gallery.
    pub fn open_gallery(&mut self) -> Result<()> {
        self.begin_loading(GALLERY_LOADING_MESSAGE);
        self.state.gallery_items = match self.gallery.try_list() {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "gallery list failed");
                Vec::new()
            }
        };
        self.state.loading_message = None;
        self.set_screen(Screen::Gallery);
        Ok(())
    }

    pub fn resume_result(&mut self) -> Result<()> {
        self.expect_screen("return to the result", &[Screen::Gallery])?;
        if self.state.result.is_none() {
            return Err(TransitionError::NoResult.into());
        }
        self.set_screen(Screen::Result);
        Ok(())
    }

    pub fn resume_from_gallery(&mut self, id: &str) -> Result<()> {
        self.expect_screen("open a saved drawing", &[Screen::Gallery])?;
        let item = self.find_gallery_item(id)?;
        let original = ImageData::from_data_url(&item.original_image)
            .with_context(|| format!("gallery item {id} has an unreadable original image"))?;
        let styled = ImageData::from_data_url(&item.styled_image)
            .with_context(|| format!("gallery item {id} has an unreadable styled image"))?;
        let style = self.catalog.get(&item.style_id).cloned();
        self.state.original_image = Some(original.clone());
        self.state.selected_style = style.as_ref().map(|style| style.id.clone());
        self.state.current_prompt = style.map(|style| style.description).unwrap_or_default();
        self.state.drawing_subject.clear();
        self.state.result = Some(GeneratedResult {
            original_image: original,
            styled_image: styled,
            style_id: item.style_id,
            message: item.message,
            subject: String::new(),
        });
        self.state.has_saved = true;
        self.set_screen(Screen::Result);
        Ok(())
    }

    pub fn delete_gallery_item(&mut self, id: &str) -> Result<()> {
        self.expect_screen("delete a saved drawing", &[Screen::Gallery])?;
        let removed = self.gallery.delete(id)?;
        self.state.gallery_items.retain(|item| item.id != id);
        self.emit(SessionEvent::GalleryDeleted, json!({"id": id, "removed": removed}));
        Ok(())
    }

    /// Debug affordance: zeroes the persisted generation counter.
    pub fn refill_credits(&mut self) -> Result<()> {
        self.quota.reset()?;
        self.state.notice = None;
        Ok(())
    }

    pub fn download_result(&mut self, dir: Option<&Path>) -> Result<PathBuf> {
        self.expect_screen("download", &[Screen::Result])?;
        let result = self.state.result.as_ref().ok_or(TransitionError::NoResult)?;
        let dir = dir.unwrap_or(self.downloads_dir.as_path());
        download_png(&result.styled_image, dir, &result.style_id)
    }

    pub fn download_gallery_item(&mut self, id: &str, dir: Option<&Path>) -> Result<PathBuf> {
        self.expect_screen("download", &[Screen::Gallery])?;
        let item = self.find_gallery_item(id)?;
        let styled = ImageData::from_data_url(&item.styled_image)
            .with_context(|| format!("gallery item {id} has an unreadable styled image"))?;
        let dir = dir.unwrap_or(self.downloads_dir.as_path());
        download_png(&styled, dir, &item.style_id)
    }

    pub fn share_result(&mut self) -> Result<Option<ShareOutcome>> {
        self.expect_screen("share", &[Screen::Result])?;
        let result = self.state.result.clone().ok_or(TransitionError::NoResult)?;
        self.share_image(&result.styled_image, &result.style_id)
    }

    pub fn share_gallery_item(&mut self, id: &str) -> Result<Option<ShareOutcome>> {
        self.expect_screen("share", &[Screen::Gallery])?;
        let item = self.find_gallery_item(id)?;
        let styled = ImageData::from_data_url(&item.styled_image)
            .with_context(|| format!("gallery item {id} has an unreadable styled image"))?;
        self.share_image(&styled, &item.style_id)
    }

    /// Credential failures send the user back to key selection; anything else
    /// back to the capture choice.
    pub fn handle_api_error(&mut self, err: &anyhow::Error) {
        let kind = classify_failure(err);
        tracing::error!(
            kind = ?kind,
            error = %error_chain_text(err, 600),
            "hosted request failed"
        );
        self.state.loading_message = None;
        match kind {
            FailureKind::Credential => {
                self.state.has_api_key = false;
                self.state.error = Some(KEY_ISSUE_MESSAGE.to_string());
                self.set_screen(Screen::Welcome);
            }
            FailureKind::Transient => {
                self.state.error = Some(FIZZLE_MESSAGE.to_string());
                self.set_screen(Screen::CameraChoice);
            }
        }
    }

    fn share_image(&mut self, image: &ImageData, style_id: &str) -> Result<Option<ShareOutcome>> {
        if !self.share.is_supported() {
            self.state.notice = Some(SHARE_UNSUPPORTED_MESSAGE.to_string());
            return Ok(None);
        }
        let request = ShareRequest::new(image, self.catalog.display_name(style_id))?;
        match self.share.share(&request) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "share failed");
                Ok(None)
            }
        }
    }

    fn find_gallery_item(&self, id: &str) -> Result<GalleryItem> {
        self.state
            .gallery_items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .or_else(|| self.gallery.get(id))
            .ok_or_else(|| TransitionError::UnknownGalleryItem(id.to_string()).into())
    }

    fn lookup_style(&self, style_id: &str) -> Result<StyleOption> {
        self.catalog
            .get(style_id.trim())
            .cloned()
            .ok_or_else(|| TransitionError::UnknownStyle(style_id.to_string()).into())
    }

    fn accept_new_image(&mut self, image: ImageData) {
        self.state.original_image = Some(image);
        self.state.user_context.clear();
        self.state.drawing_subject.clear();
    }

    fn quota_exhausted(&mut self) -> bool {
        if !self.quota.is_exhausted() {
            return false;
        }
        let limit = self.quota.limit();
        self.state.notice = Some(quota_message(limit));
        self.emit(
            SessionEvent::QuotaExhausted,
            json!({"used": self.quota.used(), "limit": limit}),
        );
        true
    }

    fn record_generation(&mut self) {
        if let Err(err) = self.quota.record_generation() {
            tracing::warn!(error = %format!("{err:#}"), "generation counter not persisted");
        }
    }

    fn open_camera(&mut self) -> bool {
        match self.camera.open(self.state.facing) {
            Ok(stream) => {
                self.camera_session.attach(stream, self.state.facing);
                true
            }
            Err(err) => {
                tracing::warn!(
                    facing = %self.state.facing,
                    error = %format!("{err:#}"),
                    "camera open failed"
                );
                self.state.error = Some(CAMERA_ERROR_MESSAGE.to_string());
                false
            }
        }
    }

    fn release_camera(&mut self) {
        if self.camera_session.release() {
            self.emit(
                SessionEvent::CameraReleased,
                json!({"facing": self.camera_session.facing().as_str()}),
            );
        }
    }

    fn set_screen(&mut self, next: Screen) {
        let previous = self.state.screen;
        if next != Screen::LiveCamera {
            self.release_camera();
        }
        if previous == next {
            return;
        }
        self.state.screen = next;
        self.emit(
            SessionEvent::ScreenChanged,
            json!({"from": previous.as_str(), "to": next.as_str()}),
        );
    }

    fn expect_screen(&self, action: &'static str, allowed: &[Screen]) -> Result<()> {
        if allowed.contains(&self.state.screen) {
            return Ok(());
        }
        Err(TransitionError::InvalidScreen {
            action,
            screen: self.state.screen,
        }
        .into())
    }

    fn begin_loading(&mut self, message: &str) {
        self.state.loading_history.clear();
        self.push_loading(message.to_string());
    }

    fn push_loading(&mut self, message: String) {
        self.state.loading_history.push(message.clone());
        self.state.loading_message = Some(message);
    }

    fn emit(&self, event: SessionEvent, payload: Value) {
        if let Err(err) = self.events.record(event, map_object(payload)) {
            tracing::warn!(
                event_type = event.as_str(),
                error = %format!("{err:#}"),
                "event log write failed"
            );
        }
    }
}

fn pick_fun_phrase(subject: &str) -> String {
    fun_phrase(subject, Uuid::new_v4().as_u128())
}

fn fun_phrase(subject: &str, seed: u128) -> String {
    let phrases = fun_phrases(subject);
    let index = (seed % phrases.len() as u128) as usize;
    phrases[index].clone()
}
