mod catalog;

pub use catalog::{StyleCatalog, StyleOption, FALLBACK_STYLE_NAME};
