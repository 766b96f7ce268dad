use crate::clustering::domain::distance::Embedding;
use crate::input::photo_item::PhotoItem;

/// Domain interface for turning a photo into a face embedding.
///
/// Returns `Ok(None)` when the photo holds no usable face; that is a normal
/// outcome, not an error. `Err` is reserved for failures such as an
/// unreadable file. Implementations may hold inference sessions, hence
/// `&mut self`.
pub trait EmbeddingSource: Send {
    fn embed(&mut self, item: &PhotoItem) -> Result<Option<Embedding>, Box<dyn std::error::Error>>;
}
