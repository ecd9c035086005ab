use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use sketchyz_contracts::image_data::ImageData;

use crate::config::ModelConfig;
use crate::content::{
    candidates, first_inline_image, first_part_image, inline_image_part, text_part, user_contents,
};
use crate::errors::{classify_failure, AttemptFailure, HostedError, StyleFailure};
use crate::error_chain_text;
use crate::transport::ContentTransport;

pub const REALISM_STYLE_ID: &str = "realism";

const RERENDER_CONSTRAINT: &str = "\n\nIMPORTANT: IGNORE the photorealism, texture, and lighting \
of the input image. You MUST completely re-render the subject in the requested style. If the \
style is cartoon/3D/drawing, the output must NOT look like a photo.";

const REALISM_CONSTRAINT: &str = "\n\nIMPORTANT: PRESERVE and ENHANCE the photorealism. Do NOT \
turn this into a drawing or painting. Output must look like a high-end RAW photograph taken with \
a DSLR camera. Improve texture, lighting, and detail to 8k quality.";

/// How a strategy asks for image output and which part of the reply it trusts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    /// `imageConfig`; only the first part of the first candidate is read.
    ImageConfig {
        aspect_ratio: String,
        image_size: String,
    },
    /// `responseModalities`; any inline part of the first candidate is read.
    Modalities(Vec<String>),
}

impl OutputShape {
    fn generation_config(&self) -> Value {
        match self {
            Self::ImageConfig {
                aspect_ratio,
                image_size,
            } => json!({
                "imageConfig": {"aspectRatio": aspect_ratio, "imageSize": image_size}
            }),
            Self::Modalities(modalities) => json!({ "responseModalities": modalities }),
        }
    }

    fn extract(&self, model: &str, response: &Value) -> Result<ImageData> {
        let found = match self {
            Self::ImageConfig { .. } => first_part_image(response)?,
            Self::Modalities(_) => {
                if candidates(response).is_empty() {
                    bail!("No candidates returned from fallback.");
                }
                first_inline_image(response)?
            }
        };
        found.ok_or_else(|| {
            HostedError::NoImage {
                model: model.to_string(),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylerStrategy {
    pub label: String,
    pub model: String,
    pub shape: OutputShape,
}

impl StylerStrategy {
    pub fn primary(model: impl Into<String>) -> Self {
        Self {
            label: "Primary".to_string(),
            model: model.into(),
            shape: OutputShape::ImageConfig {
                aspect_ratio: "1:1".to_string(),
                image_size: "1K".to_string(),
            },
        }
    }

    pub fn fallback(model: impl Into<String>) -> Self {
        Self {
            label: "Fallback".to_string(),
            model: model.into(),
            shape: OutputShape::Modalities(vec!["TEXT".to_string(), "IMAGE".to_string()]),
        }
    }

    pub fn payload(&self, parts: Vec<Value>) -> Value {
        json!({
            "contents": user_contents(parts),
            "generationConfig": self.shape.generation_config(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StyledImage {
    pub image: ImageData,
    pub model: String,
    /// Failures of strategies tried before the one that succeeded.
    pub attempts: Vec<AttemptFailure>,
}

pub fn compose_instruction(prompt: &str, style_id: Option<&str>) -> String {
    let constraint = if style_id == Some(REALISM_STYLE_ID) {
        REALISM_CONSTRAINT
    } else {
        RERENDER_CONSTRAINT
    };
    format!(
        "Generate an image based on this input. RENDER STYLE: {prompt}\n\nINPUT IMAGE REFERENCE: \
Use the attached image ONLY for composition and pose. {constraint}"
    )
}

pub fn face_fix_instruction(style_context: &str) -> String {
    format!(
        "CRITICAL OBJECTIVE: High-Fidelity Identity Transfer (Face Swap) in specific art style.\n\
Source 1: A {style_context} artwork (Target Body/Composition).\n\
Source 2: A photo of a person (Source Identity/Face).\n\n\
Instructions:\n\
1. REPLACE the face in Source 1 with the precise identity from Source 2.\n\
2. TARGET STYLE: The new face MUST be rendered in the style of '{style_context}'. match the texture, lighting, and shading of Source 1 perfectly.\n\
3. PRESERVE STRICT IDENTITY: The facial features (eyes, nose, mouth structure) must represent the person in Source 2.\n\
4. SEAMLESS COMPOSITION: Keep the exact head angle, lighting direction, and neck connection of Source 1.\n\
5. IGNORE the photo-realism of Source 2 if the target style is not realistic. Adapt the identity to the style."
    )
}

/// Walks the strategy list in order and stops at the first image.
pub struct ImageStyler {
    transport: Arc<dyn ContentTransport>,
    strategies: Vec<StylerStrategy>,
}

impl ImageStyler {
    pub fn new(transport: Arc<dyn ContentTransport>, strategies: Vec<StylerStrategy>) -> Self {
        Self {
            transport,
            strategies,
        }
    }

    pub fn from_models(transport: Arc<dyn ContentTransport>, models: &ModelConfig) -> Self {
        Self::new(
            transport,
            vec![
                StylerStrategy::primary(models.primary_image.clone()),
                StylerStrategy::fallback(models.fallback_image.clone()),
            ],
        )
    }

    pub fn strategies(&self) -> &[StylerStrategy] {
        &self.strategies
    }

    pub fn style(
        &self,
        source: &ImageData,
        prompt: &str,
        style_id: Option<&str>,
    ) -> Result<StyledImage, StyleFailure> {
        let instruction = compose_instruction(prompt, style_id);
        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            let payload =
                strategy.payload(vec![inline_image_part(source), text_part(&instruction)]);
            match self.attempt(strategy, &payload) {
                Ok(image) => {
                    return Ok(StyledImage {
                        image,
                        model: strategy.model.clone(),
                        attempts,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        strategy = %strategy.label,
                        model = %strategy.model,
                        error = %format!("{err:#}"),
                        "image model attempt failed"
                    );
                    attempts.push(AttemptFailure {
                        label: strategy.label.clone(),
                        model: strategy.model.clone(),
                        message: error_chain_text(&err, 400),
                        kind: classify_failure(&err),
                    });
                }
            }
        }
        Err(StyleFailure { attempts })
    }

    fn attempt(&self, strategy: &StylerStrategy, payload: &Value) -> Result<ImageData> {
        let response = self.transport.generate_content(&strategy.model, payload)?;
        strategy.shape.extract(&strategy.model, &response)
    }

    /// Re-renders the face in `styled` with the identity from `original`.
    /// Uses the first strategy only and propagates its error.
    pub fn fix_face(
        &self,
        styled: &ImageData,
        original: &ImageData,
        style_context: Option<&str>,
    ) -> Result<ImageData> {
        let strategy = self
            .strategies
            .first()
            .ok_or_else(|| anyhow!("no image models configured"))?;
        let context = style_context
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("photorealistic");
        let payload = strategy.payload(vec![
            inline_image_part(styled),
            inline_image_part(original),
            text_part(&face_fix_instruction(context)),
        ]);
        let response = self
            .transport
            .generate_content(&strategy.model, &payload)
            .context("face fix request failed")?;
        if candidates(&response).is_empty() {
            bail!("No candidates returned");
        }
        first_inline_image(&response)?.ok_or_else(|| anyhow!("Model returned no image for Face Fix."))
    }
}
