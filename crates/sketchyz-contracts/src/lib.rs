pub mod brain;
pub mod events;
pub mod gallery;
pub mod image_data;
pub mod quota;
pub mod session;
pub mod styles;
