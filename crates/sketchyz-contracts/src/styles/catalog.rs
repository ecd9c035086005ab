use indexmap::IndexMap;

pub const FALLBACK_STYLE_NAME: &str = "Magic";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOption {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    /// Default style-rendering instruction when the broker has nothing better.
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: IndexMap<String, StyleOption>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StyleCatalog {
    pub fn new(styles: Option<IndexMap<String, StyleOption>>) -> Self {
        Self {
            styles: styles.unwrap_or_else(default_styles),
        }
    }

    pub fn get(&self, id: &str) -> Option<&StyleOption> {
        self.styles.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &StyleOption> {
        self.styles.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.keys().cloned().collect()
    }

    pub fn display_name(&self, id: &str) -> &str {
        self.get(id)
            .map(|style| style.name.as_str())
            .unwrap_or(FALLBACK_STYLE_NAME)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

fn default_styles() -> IndexMap<String, StyleOption> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, name: &str, icon: &str, color: &str, description: &str| {
        map.insert(
            id.to_string(),
            StyleOption {
                id: id.to_string(),
                name: name.to_string(),
                icon: icon.to_string(),
                color: color.to_string(),
                description: description.to_string(),
            },
        );
    };

    insert(
        "comic",
        "Comic Book",
        "💥",
        "#FFD93D",
        "Professional comic book art, Marvel/DC style. Dynamic action framing, bold ink outlines, \
         cross-hatching, dramatic chiaroscuro lighting, vibrant CMYK coloring, Ben-Day dots texture. \
         Masterpiece quality, detailed background, heroic proportions, high contrast.",
    );
    insert(
        "toy3d",
        "3D Render",
        "🧊",
        "#FF66C4",
        "Pixar-style 3D animation render. Disney/Pixar movie still. High-end CGI character design. \
         smooth, cute, expressive, volumetric lighting, redshift, 4k. Looks like a 3D movie frame. \
         3D solid geometry, depth of field. Subsurface scattering. Solid shapes. NOT a 2D drawing, \
         NOT a comic, NOT a sketch, NOT a pencil drawing. No outlines, no strokes.",
    );
    insert(
        "watercolor",
        "Watercolor",
        "🎨",
        "#FF6B6B",
        "Master watercolor painting on cold-press paper. Wet-on-wet technique, pigment bleeding, \
         visible paper grain, organic brushstrokes, soft edges, ethereal lighting, pastel color \
         palette. Traditional media masterpiece, fluid and dreamy.",
    );
    insert(
        "sketch",
        "Pencil Sketch",
        "✏️",
        "#E2E8F0",
        "Courtroom sketch artist style. Strictly black and white graphite on paper. Rough, quick \
         gestural lines. Heavy charcoal shading. NOT photorealistic. Visible pencil strokes. \
         Monochrome. Sketchy, loose, hand-drawn aesthetic.",
    );
    insert(
        "clay",
        "Claymation",
        "🏺",
        "#F39C12",
        "Stop-motion claymation feature film still, Wes Anderson style. Plasticine texture, visible \
         fingerprints, handmade props, miniature set design, soft studio lighting, symmetrical \
         framing, pastel colors, tactile, photorealistic macro photography.",
    );
    insert(
        "pixel",
        "Pixel Art",
        "👾",
        "#FFD93D",
        "Retro 8-bit video game pixel art. SNES/Gameboy aesthetic. Low resolution, blocky pixels, \
         limited color palette, clean crisp edges. Nostalgic arcade style. NOT vector, NOT smooth, \
         NOT high definition. Visible individual square pixels.",
    );
    insert(
        "lucky",
        "Feeling Lucky",
        "🍀",
        "#4DE1C1",
        "Surprise me! Pick a highly distinct, non-standard visual style (e.g., Ukiyo-e, Cyberpunk, \
         Stained Glass, 8-bit, Origami, Synthwave) and describe it with professional \
         detail/modifiers.",
    );

    map
}

#[cfg(test)]
mod tests {
    use super::{StyleCatalog, FALLBACK_STYLE_NAME};

    #[test]
    fn default_catalog_keeps_declared_order() {
        let catalog = StyleCatalog::default();
        assert_eq!(
            catalog.ids(),
            vec!["comic", "toy3d", "watercolor", "sketch", "clay", "pixel", "lucky"]
        );
    }

    #[test]
    fn every_style_has_a_rendering_instruction() {
        let catalog = StyleCatalog::default();
        for style in catalog.list() {
            assert!(!style.description.trim().is_empty(), "{}", style.id);
            assert!(!style.name.is_empty());
            assert!(!style.description.contains("  "), "{}", style.id);
        }
    }

    #[test]
    fn display_name_falls_back_for_unknown_ids() {
        let catalog = StyleCatalog::default();
        assert_eq!(catalog.display_name("clay"), "Claymation");
        assert_eq!(catalog.display_name("realism"), FALLBACK_STYLE_NAME);
    }
}
