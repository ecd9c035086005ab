use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use sketchyz_contracts::image_data::ImageData;

use crate::timestamp_millis;

pub const SHARE_TITLE: &str = "My Sketchyz Masterpiece";
pub const SHARE_FILE_NAME: &str = "sketchyz-art.png";

pub fn download_file_name(style_id: &str, millis: u128) -> String {
    format!("sketchyz-{style_id}-{millis}.png")
}

/// Re-encodes as PNG; bytes that do not decode are written unchanged.
pub fn png_bytes(image: &ImageData) -> Result<Vec<u8>> {
    if image.mime_type == "image/png" {
        return Ok(image.bytes.clone());
    }
    match image::load_from_memory(&image.bytes) {
        Ok(decoded) => {
            let mut bytes = Vec::new();
            decoded
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .context("PNG encode failed")?;
            Ok(bytes)
        }
        Err(err) => {
            tracing::debug!(error = %err, "image did not decode; exporting raw bytes");
            Ok(image.bytes.clone())
        }
    }
}

pub fn download_png(image: &ImageData, dir: &Path, style_id: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    let path = dir.join(download_file_name(style_id, timestamp_millis()));
    fs::write(&path, png_bytes(image)?)
        .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(path)
}

pub fn share_caption(style_name: &str) -> String {
    let tag: String = style_name.split_whitespace().collect();
    format!(
        "Check out this masterpiece I brought to life with Sketchyz! ✨🎨 #sketchyz #{tag}\n\nTry 5 free generations yourself!"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub title: String,
    pub text: String,
    pub file_name: String,
    pub png_bytes: Vec<u8>,
}

impl ShareRequest {
    pub fn new(image: &ImageData, style_name: &str) -> Result<Self> {
        Ok(Self {
            title: SHARE_TITLE.to_string(),
            text: share_caption(style_name),
            file_name: SHARE_FILE_NAME.to_string(),
            png_bytes: png_bytes(image)?,
        })
    }
}

/// Where the shared attachment ended up, when the sheet can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareOutcome {
    pub location: Option<PathBuf>,
}

pub trait ShareSheet: Send + Sync {
    fn is_supported(&self) -> bool;
    fn share(&self, request: &ShareRequest) -> Result<ShareOutcome>;
}

/// Drops each share as a PNG plus caption file into an outbox directory.
#[derive(Debug, Clone)]
pub struct OutboxShareSheet {
    dir: PathBuf,
}

impl OutboxShareSheet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ShareSheet for OutboxShareSheet {
    fn is_supported(&self) -> bool {
        true
    }

    fn share(&self, request: &ShareRequest) -> Result<ShareOutcome> {
        let stamp = timestamp_millis();
        let dir = self.dir.join(stamp.to_string());
        fs::create_dir_all(&dir).with_context(|| format!("failed creating {}", dir.display()))?;
        let image_path = dir.join(&request.file_name);
        fs::write(&image_path, &request.png_bytes)
            .with_context(|| format!("failed writing {}", image_path.display()))?;
        let caption = format!("{}\n\n{}\n", request.title, request.text);
        fs::write(dir.join("caption.txt"), caption)
            .with_context(|| format!("failed writing caption in {}", dir.display()))?;
        Ok(ShareOutcome {
            location: Some(image_path),
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedShareSheet;

impl ShareSheet for UnsupportedShareSheet {
    fn is_supported(&self) -> bool {
        false
    }

    fn share(&self, _request: &ShareRequest) -> Result<ShareOutcome> {
        bail!("sharing is not supported")
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{Rgb, RgbImage};
    use sketchyz_contracts::image_data::ImageData;

    use super::*;

    fn jpeg_image() -> anyhow::Result<ImageData> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 200, 30])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
        Ok(ImageData::new("image/jpeg", bytes))
    }

    #[test]
    fn caption_hashtag_drops_spaces() {
        let caption = share_caption("3D Toy");
        assert!(caption.contains("#sketchyz #3DToy\n\nTry 5 free generations yourself!"));
        assert!(caption.starts_with("Check out this masterpiece I brought to life with Sketchyz!"));
    }

    #[test]
    fn download_writes_png_named_after_style() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = download_png(&jpeg_image()?, temp.path(), "comic")?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        assert!(name.starts_with("sketchyz-comic-"));
        assert!(name.ends_with(".png"));
        let written = fs::read(&path)?;
        assert_eq!(image::guess_format(&written)?, ImageFormat::Png);
        Ok(())
    }

    #[test]
    fn undecodable_bytes_are_exported_as_is() -> anyhow::Result<()> {
        let raw = ImageData::new("image/jpeg", b"not really a jpeg".to_vec());
        assert_eq!(png_bytes(&raw)?, b"not really a jpeg");
        Ok(())
    }

    #[test]
    fn outbox_share_writes_attachment_and_caption() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let sheet = OutboxShareSheet::new(temp.path());
        let request = ShareRequest::new(&jpeg_image()?, "Clay World")?;
        assert_eq!(request.title, SHARE_TITLE);
        let Some(path) = sheet.share(&request)?.location else {
            anyhow::bail!("expected a shared attachment");
        };
        assert!(path.ends_with(SHARE_FILE_NAME));
        let caption = fs::read_to_string(path.with_file_name("caption.txt"))?;
        assert!(caption.starts_with("My Sketchyz Masterpiece"));
        assert!(caption.contains("#ClayWorld"));
        Ok(())
    }

    #[test]
    fn unsupported_sheet_reports_so() {
        assert!(!UnsupportedShareSheet.is_supported());
    }
}
