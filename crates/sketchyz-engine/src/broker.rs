use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use sketchyz_contracts::brain::{BrainRequest, BrainResponse, BRAIN_SYSTEM_INSTRUCTION};

use crate::content::{extract_text, text_part, user_contents};
use crate::transport::ContentTransport;

/// Asks the text model for style prompts and kid-facing copy.
pub struct PromptBroker {
    transport: Arc<dyn ContentTransport>,
    model: String,
}

impl PromptBroker {
    pub fn new(transport: Arc<dyn ContentTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
        }
    }

    pub fn payload(request: &BrainRequest) -> Result<Value> {
        let input = serde_json::to_string(request).context("brain request encode failed")?;
        Ok(json!({
            "systemInstruction": {"parts": [text_part(BRAIN_SYSTEM_INSTRUCTION)]},
            "contents": user_contents(vec![text_part(&input)]),
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "style_prompt": {"type": "STRING"},
                        "kid_message": {"type": "STRING"},
                        "loading_message": {"type": "STRING"},
                    }
                }
            }
        }))
    }

    /// Falls back to [`BrainRequest::fallback_response`] on any failure.
    pub fn ask(&self, request: &BrainRequest) -> BrainResponse {
        match self.try_ask(request) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    mode = request.mode.as_str(),
                    error = %format!("{err:#}"),
                    "brain request failed; using fallback"
                );
                request.fallback_response()
            }
        }
    }

    pub fn try_ask(&self, request: &BrainRequest) -> Result<BrainResponse> {
        let payload = Self::payload(request)?;
        let response = self
            .transport
            .generate_content(&self.model, &payload)
            .context("brain request failed")?;
        let text = extract_text(&response).unwrap_or_else(|| "{}".to_string());
        let parsed: BrainResponse =
            serde_json::from_str(&text).context("brain returned invalid JSON")?;
        Ok(parsed.normalized())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use sketchyz_contracts::brain::{
        BrainContext, BrainMode, BrainRequest, BRAIN_SYSTEM_INSTRUCTION, FALLBACK_KID_MESSAGE,
    };

    use super::PromptBroker;
    use crate::testing::ScriptedTransport;

    #[test]
    fn payload_carries_policy_schema_and_request_json() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text(r#"{"style_prompt": "bold comic ink", "loading_message": "Inking..."}"#);
        let broker = PromptBroker::new(transport.clone(), "brain-model");
        let request = BrainRequest::new(
            BrainMode::StyleDescription,
            Some("comic"),
            "dog",
            BrainContext::AfterGeneration,
        );
        let response = broker.try_ask(&request)?;
        assert_eq!(response.style_prompt.as_deref(), Some("bold comic ink"));
        assert_eq!(response.loading_message.as_deref(), Some("Inking..."));

        let calls = transport.calls();
        assert_eq!(calls[0].model, "brain-model");
        let payload = &calls[0].payload;
        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            json!(BRAIN_SYSTEM_INSTRUCTION)
        );
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(
            payload["generationConfig"]["responseSchema"]["properties"]["kid_message"]["type"],
            json!("STRING")
        );
        let sent: serde_json::Value = serde_json::from_str(
            payload["contents"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default(),
        )?;
        assert_eq!(
            sent,
            json!({
                "mode": "style_description",
                "style_id": "comic",
                "drawing_subject": "dog",
                "context": "after_generation",
            })
        );
        Ok(())
    }

    #[test]
    fn transport_failure_uses_mode_fallback() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_error("boom");
        transport.push_error("boom");
        let broker = PromptBroker::new(transport, "brain-model");

        let kid = broker.ask(&BrainRequest::new(
            BrainMode::KidMessage,
            Some("clay"),
            "cat",
            BrainContext::AfterGeneration,
        ));
        assert_eq!(kid.kid_message.as_deref(), Some(FALLBACK_KID_MESSAGE));

        let style = broker.ask(&BrainRequest::new(
            BrainMode::StyleDescription,
            None,
            "cat",
            BrainContext::AfterGeneration,
        ));
        assert_eq!(
            style.style_prompt.as_deref(),
            Some("A unknown style version of cat, appropriate for kids.")
        );
    }

    #[test]
    fn invalid_json_uses_fallback_and_empty_text_is_empty_response() -> anyhow::Result<()> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("not json");
        transport.push_text("   ");
        let broker = PromptBroker::new(transport, "brain-model");
        let request = BrainRequest::new(
            BrainMode::KidMessage,
            Some("pixel"),
            "robot",
            BrainContext::Stats,
        );
        assert_eq!(
            broker.ask(&request).kid_message.as_deref(),
            Some(FALLBACK_KID_MESSAGE)
        );
        let empty = broker.try_ask(&request)?;
        assert!(empty.kid_message.is_none());
        Ok(())
    }
}
