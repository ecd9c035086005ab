use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sketchyz_contracts::brain::{BrainMode, BrainRequest};
use sketchyz_contracts::image_data::ImageData;

use crate::config::{resolve_api_key, API_KEY_ENV_NAMES, DEFAULT_API_BASE};
use crate::content::inline_image;
use crate::errors::HostedError;
use crate::truncate_text;

/// One `generateContent` round trip: request payload in, response JSON out.
pub trait ContentTransport: Send + Sync {
    fn name(&self) -> &str;
    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value>;
}

pub struct GeminiTransport {
    api_base: String,
    http: HttpClient,
    timeout: Duration,
}

impl GeminiTransport {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        let api_base = api_base.into();
        let api_base = api_base.trim().trim_end_matches('/');
        Self {
            api_base: if api_base.is_empty() {
                DEFAULT_API_BASE.to_string()
            } else {
                api_base.to_string()
            },
            http: HttpClient::new(),
            timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Resolved on every call so a key picked mid-session takes effect.
    fn api_key() -> Result<String> {
        resolve_api_key().ok_or_else(|| {
            HostedError::MissingApiKey {
                checked: API_KEY_ENV_NAMES.join(", "),
            }
            .into()
        })
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl ContentTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let api_key = Self::api_key()?;
        let endpoint = self.endpoint_for_model(model);
        tracing::debug!(model, endpoint = %endpoint, "sending generateContent request");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(self.timeout)
            .json(payload)
            .send()
            .with_context(|| format!("{model} request failed ({endpoint})"))?;
        response_json_or_error(model, response)
    }
}

fn response_json_or_error(model: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{model} response body read failed"))?;
    if !status.is_success() {
        return Err(HostedError::Status {
            model: model.to_string(),
            status: code,
            message: hosted_error_message(&body),
        }
        .into());
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{model} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Prefers `error.message` from a JSON error body over the raw text.
fn hosted_error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    truncate_text(from_json.as_deref().unwrap_or(body).trim(), 512)
}

const DRYRUN_IMAGE_SIDE: u32 = 256;
const DRYRUN_SUBJECTS: &[&str] = &[
    "happy dragon",
    "racecar",
    "smiling sun",
    "rocket ship",
    "friendly robot",
    "flower garden",
];

/// Offline stand-in for the hosted API with deterministic answers.
///
/// - JSON-mode requests get a brain reply built from the request fields
/// - image requests get a PNG tinted by a hash of the prompt
/// - anything else gets a subject phrase picked by hashing the input image
#[derive(Debug, Default, Clone, Copy)]
pub struct DryrunTransport;

impl ContentTransport for DryrunTransport {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(&self, model: &str, payload: &Value) -> Result<Value> {
        let config = payload.get("generationConfig");
        let wants_json = config
            .and_then(|cfg| cfg.get("responseMimeType"))
            .and_then(Value::as_str)
            == Some("application/json");
        let wants_image = config
            .map(|cfg| {
                cfg.get("imageConfig").is_some()
                    || cfg
                        .get("responseModalities")
                        .and_then(Value::as_array)
                        .map(|items| items.iter().any(|item| item == "IMAGE"))
                        .unwrap_or(false)
            })
            .unwrap_or(false);

        let parts = request_parts(payload);
        let prompt = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("\n");

        if wants_json {
            return Ok(text_response(&dryrun_brain_reply(&prompt)?));
        }
        let mut source = None;
        for part in &parts {
            if let Some(image) = inline_image(part)? {
                source = Some(image);
                break;
            }
        }
        if wants_image {
            let png = write_dryrun_png(source.as_ref(), &prompt, model)?;
            return Ok(json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{
                            "inlineData": {"mimeType": "image/png", "data": png.base64_payload()}
                        }]
                    }
                }]
            }));
        }
        let seed = source.map(|image| image.bytes).unwrap_or_default();
        let digest = Sha256::digest(&seed);
        let subject = DRYRUN_SUBJECTS[digest[0] as usize % DRYRUN_SUBJECTS.len()];
        Ok(text_response(subject))
    }
}

fn request_parts(payload: &Value) -> Vec<Value> {
    payload
        .get("contents")
        .and_then(Value::as_array)
        .map(|contents| {
            contents
                .iter()
                .filter_map(|content| content.get("parts").and_then(Value::as_array))
                .flatten()
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]}
        }]
    })
}

fn dryrun_brain_reply(prompt: &str) -> Result<String> {
    let request: BrainRequest =
        serde_json::from_str(prompt).context("dryrun brain request is not valid JSON")?;
    let subject = if request.drawing_subject.trim().is_empty() {
        "your drawing"
    } else {
        request.drawing_subject.trim()
    };
    let reply = match request.mode {
        BrainMode::StyleDescription => json!({
            "style_prompt": format!(
                "A bright, playful {} rendition of {subject} with bold shapes and cheerful colors.",
                request.style_id
            ),
            "loading_message": format!("Painting your {subject}..."),
        }),
        BrainMode::KidMessage => json!({
            "kid_message": format!("Your {subject} looks awesome!"),
        }),
    };
    Ok(reply.to_string())
}

fn color_from_prompt(prompt: &str, model: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(model.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

/// Blends the source drawing (when decodable) with a prompt-derived color.
fn write_dryrun_png(source: Option<&ImageData>, prompt: &str, model: &str) -> Result<ImageData> {
    let (r, g, b) = color_from_prompt(prompt, model);
    let decoded = source.and_then(|image| image::load_from_memory(&image.bytes).ok());
    let canvas = match decoded {
        Some(base) => {
            let mut rgb = base.to_rgb8();
            for pixel in rgb.pixels_mut() {
                let Rgb([pr, pg, pb]) = *pixel;
                *pixel = Rgb([
                    ((pr as u16 + r as u16) / 2) as u8,
                    ((pg as u16 + g as u16) / 2) as u8,
                    ((pb as u16 + b as u16) / 2) as u8,
                ]);
            }
            rgb
        }
        None => RgbImage::from_pixel(DRYRUN_IMAGE_SIDE, DRYRUN_IMAGE_SIDE, Rgb([r, g, b])),
    };
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("dryrun PNG encode failed")?;
    Ok(ImageData::new("image/png", bytes))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use sketchyz_contracts::brain::{BrainContext, BrainMode, BrainRequest, BrainResponse};

    use super::*;
    use crate::content::{extract_text, first_part_image, inline_image_part, text_part, user_contents};

    #[test]
    fn endpoint_for_model_adds_models_prefix_once() {
        let transport = GeminiTransport::new("https://example.test/v1beta/", Duration::from_secs(30));
        assert_eq!(
            transport.endpoint_for_model("gemini-2.0-flash-exp"),
            "https://example.test/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
        assert_eq!(
            transport.endpoint_for_model("models/custom"),
            "https://example.test/v1beta/models/custom:generateContent"
        );
        let blank = GeminiTransport::new("  ", Duration::from_secs(30));
        assert_eq!(blank.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn hosted_error_message_prefers_json_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found."}}"#;
        assert_eq!(hosted_error_message(body), "Requested entity was not found.");
        assert_eq!(hosted_error_message(" upstream down "), "upstream down");
    }

    #[test]
    fn dryrun_answers_brain_requests_with_json() -> anyhow::Result<()> {
        let request = BrainRequest::new(
            BrainMode::StyleDescription,
            Some("comic"),
            "dog",
            BrainContext::AfterGeneration,
        );
        let payload = json!({
            "contents": user_contents(vec![text_part(&serde_json::to_string(&request)?)]),
            "generationConfig": {"responseMimeType": "application/json"},
        });
        let response = DryrunTransport.generate_content("brain", &payload)?;
        let text = extract_text(&response).unwrap_or_default();
        let parsed: BrainResponse = serde_json::from_str(&text)?;
        assert!(parsed.style_prompt.unwrap_or_default().contains("comic rendition of dog"));
        assert_eq!(parsed.loading_message.as_deref(), Some("Painting your dog..."));
        Ok(())
    }

    #[test]
    fn dryrun_image_requests_return_deterministic_png() -> anyhow::Result<()> {
        let payload = json!({
            "contents": user_contents(vec![text_part("RENDER STYLE: clay")]),
            "generationConfig": {"imageConfig": {"aspectRatio": "1:1", "imageSize": "1K"}},
        });
        let first = first_part_image(&DryrunTransport.generate_content("img", &payload)?)?;
        let second = first_part_image(&DryrunTransport.generate_content("img", &payload)?)?;
        let first = first.ok_or_else(|| anyhow::anyhow!("missing image"))?;
        assert_eq!(first.mime_type, "image/png");
        assert_eq!(Some(first.clone()), second);
        let decoded = image::load_from_memory(&first.bytes)?;
        assert_eq!(decoded.width(), DRYRUN_IMAGE_SIDE);
        Ok(())
    }

    #[test]
    fn dryrun_tints_decodable_source_images() -> anyhow::Result<()> {
        let source = write_dryrun_png(None, "source", "seed")?;
        let payload = json!({
            "contents": user_contents(vec![inline_image_part(&source), text_part("go")]),
            "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]},
        });
        let response = DryrunTransport.generate_content("img", &payload)?;
        let styled = first_part_image(&response)?.ok_or_else(|| anyhow::anyhow!("no image"))?;
        assert_ne!(styled.bytes, source.bytes);
        Ok(())
    }

    #[test]
    fn dryrun_vision_requests_return_a_subject() -> anyhow::Result<()> {
        let image = ImageData::new("image/png", b"doodle".to_vec());
        let payload = json!({
            "contents": user_contents(vec![inline_image_part(&image), text_part("Identify")]),
        });
        let text = extract_text(&DryrunTransport.generate_content("vision", &payload)?);
        assert!(text.map(|value| DRYRUN_SUBJECTS.contains(&value.as_str())).unwrap_or(false));
        Ok(())
    }
}
