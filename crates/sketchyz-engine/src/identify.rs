use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sketchyz_contracts::image_data::ImageData;

use crate::content::{extract_text, inline_image_part, text_part, user_contents};
use crate::transport::ContentTransport;

pub const SUBJECT_PROMPT: &str = "Identify the main subject of this child's drawing. \
Answer in 2-4 simple words (e.g., 'happy dragon', 'racecar'). \
Do NOT include 'a', 'an', or 'the'. Do not add punctuation.";

/// Returned when the model answers with blank text.
pub const EMPTY_SUBJECT: &str = "a masterpiece";
/// Returned when the request itself fails.
pub const FAILED_SUBJECT: &str = "a creative drawing";

pub struct SubjectIdentifier {
    transport: Arc<dyn ContentTransport>,
    model: String,
}

impl SubjectIdentifier {
    pub fn new(transport: Arc<dyn ContentTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn payload(image: &ImageData) -> Value {
        json!({
            "contents": user_contents(vec![inline_image_part(image), text_part(SUBJECT_PROMPT)]),
        })
    }

    /// Never fails; hosted errors degrade to a generic phrase.
    pub fn identify(&self, image: &ImageData) -> String {
        match self.try_identify(image) {
            Ok(Some(subject)) => subject,
            Ok(None) => EMPTY_SUBJECT.to_string(),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "subject identification failed");
                FAILED_SUBJECT.to_string()
            }
        }
    }

    pub fn try_identify(&self, image: &ImageData) -> Result<Option<String>> {
        let response = self
            .transport
            .generate_content(&self.model, &Self::payload(image))
            .context("subject identification request failed")?;
        Ok(extract_text(&response))
    }
}

/// Drops one leading `a`/`an`/`the` (any case) so the phrase reads after "a ".
pub fn strip_leading_article(subject: &str) -> String {
    let trimmed = subject.trim();
    for article in ["a", "an", "the"] {
        let Some(head) = trimmed.get(..article.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(article) {
            continue;
        }
        let rest = &trimmed[article.len()..];
        if rest.starts_with(char::is_whitespace) {
            return rest.trim_start().to_string();
        }
    }
    trimmed.to_string()
}
