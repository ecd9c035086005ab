use thiserror::Error;

use crate::controller::Screen;

/// Text the hosted API returns when the key's project cannot see the model.
pub const ENTITY_NOT_FOUND_SIGNATURE: &str = "Requested entity was not found";

#[derive(Debug, Error)]
pub enum HostedError {
    #[error("API key not set (checked {checked})")]
    MissingApiKey { checked: String },
    #[error("{model} request failed ({status}): {message}")]
    Status {
        model: String,
        status: u16,
        message: String,
    },
    #[error("{model} returned no image")]
    NoImage { model: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub label: String,
    pub model: String,
    pub message: String,
    /// Classified before the error is flattened into `message`.
    pub kind: FailureKind,
}

/// Every configured image model failed; one entry per attempt, in order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_attempts(.attempts))]
pub struct StyleFailure {
    pub attempts: Vec<AttemptFailure>,
}

impl StyleFailure {
    pub fn kind(&self) -> FailureKind {
        if self
            .attempts
            .iter()
            .any(|attempt| attempt.kind == FailureKind::Credential)
        {
            FailureKind::Credential
        } else {
            FailureKind::Transient
        }
    }
}

fn describe_attempts(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "Generation failed. No image models configured.".to_string();
    }
    let mut text = "Generation failed.".to_string();
    for attempt in attempts {
        text.push_str(&format!(
            " {}: {}.",
            attempt.label,
            attempt.message.trim_end_matches('.')
        ));
    }
    text
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} from the {screen} screen")]
    InvalidScreen { action: &'static str, screen: Screen },
    #[error("no drawing has been captured yet")]
    MissingImage,
    #[error("unknown style '{0}'")]
    UnknownStyle(String),
    #[error("no gallery item with id '{0}'")]
    UnknownGalleryItem(String),
    #[error("there is no result to show")]
    NoResult,
    #[error("nothing to regenerate yet")]
    NothingToRegenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or rejected key: the user must pick a key again.
    Credential,
    Transient,
}

pub fn classify_failure(err: &anyhow::Error) -> FailureKind {
    let credential = err.chain().any(|cause| {
        if let Some(HostedError::MissingApiKey { .. }) = cause.downcast_ref::<HostedError>() {
            return true;
        }
        if let Some(failure) = cause.downcast_ref::<StyleFailure>() {
            if failure.kind() == FailureKind::Credential {
                return true;
            }
        }
        cause.to_string().contains(ENTITY_NOT_FOUND_SIGNATURE)
    });
    if credential {
        FailureKind::Credential
    } else {
        FailureKind::Transient
    }
}
