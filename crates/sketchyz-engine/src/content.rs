//! Request parts and response extraction for `generateContent` payloads.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sketchyz_contracts::image_data::ImageData;

pub fn inline_image_part(image: &ImageData) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.base64_payload(),
        }
    })
}

pub fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub fn user_contents(parts: Vec<Value>) -> Value {
    json!([{ "role": "user", "parts": parts }])
}

fn candidate_parts(candidate: &Value) -> Vec<Value> {
    candidate
        .get("content")
        .and_then(Value::as_object)
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub fn candidates(response: &Value) -> Vec<Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Concatenated text of the first candidate, trimmed; `None` when blank.
pub fn extract_text(response: &Value) -> Option<String> {
    let first = candidates(response).into_iter().next()?;
    let text = candidate_parts(&first)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn inline_image(part: &Value) -> Result<Option<ImageData>> {
    let Some(inline) = part
        .get("inlineData")
        .or_else(|| part.get("inline_data"))
        .and_then(Value::as_object)
    else {
        return Ok(None);
    };
    let data = inline
        .get("data")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if data.is_empty() {
        return Ok(None);
    }
    let mime_type = inline
        .get("mimeType")
        .or_else(|| inline.get("mime_type"))
        .and_then(Value::as_str)
        .or(Some("image/png"));
    let image =
        ImageData::from_base64(mime_type, data).context("inline image base64 decode failed")?;
    Ok(Some(image))
}

/// Only the very first part of the first candidate counts.
pub fn first_part_image(response: &Value) -> Result<Option<ImageData>> {
    let Some(first) = candidates(response).into_iter().next() else {
        return Ok(None);
    };
    match candidate_parts(&first).first() {
        Some(part) => inline_image(part),
        None => Ok(None),
    }
}

/// First inline image anywhere in the first candidate.
pub fn first_inline_image(response: &Value) -> Result<Option<ImageData>> {
    let Some(first) = candidates(response).into_iter().next() else {
        return Ok(None);
    };
    for part in candidate_parts(&first) {
        if let Some(image) = inline_image(&part)? {
            return Ok(Some(image));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sketchyz_contracts::image_data::ImageData;

    use super::*;

    #[test]
    fn extract_text_joins_parts_of_first_candidate() {
        let response = json!({
            "candidates": [
                {"content": {"parts": [{"text": " happy "}, {"text": "dragon\n"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        });
        assert_eq!(extract_text(&response).as_deref(), Some("happy dragon"));
        assert_eq!(extract_text(&json!({"candidates": []})), None);
        assert_eq!(
            extract_text(&json!({"candidates": [{"content": {"parts": [{"text": "  "}]}}]})),
            None
        );
    }

    #[test]
    fn first_part_image_ignores_images_after_text() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [{"content": {"parts": [
                {"text": "here you go"},
                {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
            ]}}]
        });
        assert!(first_part_image(&response)?.is_none());
        let found = first_inline_image(&response)?;
        assert_eq!(found, Some(ImageData::new("image/png", b"hello".to_vec())));
        Ok(())
    }

    #[test]
    fn inline_image_accepts_snake_case_keys() -> anyhow::Result<()> {
        let part = json!({"inline_data": {"mime_type": "image/jpeg", "data": "aGVsbG8="}});
        let image = inline_image(&part)?;
        assert_eq!(image.map(|img| img.mime_type), Some("image/jpeg".to_string()));
        Ok(())
    }

    #[test]
    fn request_parts_use_inline_data_shape() {
        let image = ImageData::new("image/png", b"hello".to_vec());
        let contents = user_contents(vec![inline_image_part(&image), text_part("go")]);
        assert_eq!(contents[0]["role"], json!("user"));
        assert_eq!(contents[0]["parts"][0]["inlineData"]["data"], json!("aGVsbG8="));
        assert_eq!(contents[0]["parts"][1]["text"], json!("go"));
    }
}
