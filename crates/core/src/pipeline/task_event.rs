use crate::clustering::domain::cluster_store::Label;
use crate::input::photo_item::PhotoItem;

/// Notifications sent from the processing worker to its listener.
///
/// A run emits `Started` (unless setup fails), then per item any number of
/// `Skipped`/`ItemError` followed by exactly one `Progress`, and finally
/// exactly one terminal event: `Completed`, `Cancelled` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Started {
        total: usize,
    },
    /// Emitted after every attempted item. `label` is `None` when the item
    /// was skipped or failed before classification.
    Progress {
        done: usize,
        total: usize,
        label: Option<Label>,
    },
    /// No face embedding could be obtained for the item.
    Skipped {
        item: PhotoItem,
    },
    ItemError {
        item: PhotoItem,
        message: String,
    },
    Completed,
    Cancelled,
    Failed {
        message: String,
    },
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::Completed | TaskEvent::Cancelled | TaskEvent::Failed { .. }
        )
    }
}
