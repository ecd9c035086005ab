mod item;
mod store;

pub use item::{generate_id, GalleryItem, NewGalleryItem};
pub use store::GalleryStore;
