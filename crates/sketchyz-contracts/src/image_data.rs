use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// MIME type assumed for payloads that arrive without a data-URL header.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// An encoded still image (JPEG, PNG, WebP) plus its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Parses `data:image/png;base64,...`; a bare base64 payload is accepted
    /// and tagged with [`DEFAULT_MIME_TYPE`].
    pub fn from_data_url(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (mime_type, payload) = match split_data_url(trimmed) {
            Some((mime, payload)) => (mime.to_string(), payload),
            None if trimmed.starts_with("data:") => bail!("unsupported data URL header"),
            None => (DEFAULT_MIME_TYPE.to_string(), trimmed),
        };
        let bytes = BASE64
            .decode(payload.as_bytes())
            .context("image base64 decode failed")?;
        if bytes.is_empty() {
            bail!("image payload is empty");
        }
        Ok(Self { mime_type, bytes })
    }

    pub fn from_base64(mime_type: Option<&str>, payload: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(payload.trim().as_bytes())
            .context("image base64 decode failed")?;
        Ok(Self {
            mime_type: mime_type
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string(),
            bytes,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        if bytes.is_empty() {
            bail!("{} is empty", path.display());
        }
        let mime_type = mime_for_path(path).unwrap_or(DEFAULT_MIME_TYPE);
        Ok(Self::new(mime_type, bytes))
    }

    pub fn base64_payload(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_payload())
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "jpg",
        }
    }
}

fn split_data_url(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    if !mime.starts_with("image/") || mime.len() <= "image/".len() {
        return None;
    }
    Some((mime, payload))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{mime_for_path, ImageData, DEFAULT_MIME_TYPE};

    #[test]
    fn parses_data_url_header() -> anyhow::Result<()> {
        let image = ImageData::from_data_url("data:image/webp;base64,aGVsbG8=")?;
        assert_eq!(image.mime_type, "image/webp");
        assert_eq!(image.bytes, b"hello");
        assert_eq!(image.to_data_url(), "data:image/webp;base64,aGVsbG8=");
        Ok(())
    }

    #[test]
    fn bare_payload_defaults_to_jpeg() -> anyhow::Result<()> {
        let image = ImageData::from_data_url("aGVsbG8=")?;
        assert_eq!(image.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(image.extension(), "jpg");
        Ok(())
    }

    #[test]
    fn rejects_non_image_and_empty_payloads() {
        assert!(ImageData::from_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(ImageData::from_data_url("data:image/png;base64,").is_err());
        assert!(ImageData::from_data_url("not base64 !!").is_err());
    }

    #[test]
    fn from_path_guesses_mime_from_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("drawing.PNG");
        fs::write(&path, b"png-bytes")?;
        let image = ImageData::from_path(&path)?;
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(mime_for_path(Path::new("a.tiff")), None);
        Ok(())
    }
}
