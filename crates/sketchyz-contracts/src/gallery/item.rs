use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved generation. Images are base64 data URLs, exactly as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    pub timestamp: i64,
    pub original_image: String,
    pub styled_image: String,
    pub style_id: String,
    pub message: String,
}

/// Insert payload; the store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGalleryItem {
    pub original_image: String,
    pub styled_image: String,
    pub style_id: String,
    pub message: String,
}

impl NewGalleryItem {
    pub fn into_item(self, id: String, timestamp: i64) -> GalleryItem {
        GalleryItem {
            id,
            timestamp,
            original_image: self.original_image,
            styled_image: self.styled_image,
            style_id: self.style_id,
            message: self.message,
        }
    }
}

/// Base36 millisecond clock followed by a random base36 suffix.
///
/// Collisions need the same millisecond and the same 11-char suffix.
pub fn generate_id(timestamp_millis: i64) -> String {
    let random = Uuid::new_v4().as_u128() as u64;
    let mut suffix = to_base36(random);
    suffix.truncate(11);
    format!("{}{}", to_base36(timestamp_millis.max(0) as u64), suffix)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
