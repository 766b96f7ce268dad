pub mod directory_photo_source;
pub mod photo_item;
pub mod photo_source;
