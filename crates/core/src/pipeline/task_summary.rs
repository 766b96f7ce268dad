use crate::clustering::domain::cluster_store::Label;
use crate::input::photo_item::PhotoItem;
use crate::pipeline::task_event::TaskEvent;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

impl TaskOutcome {
    pub fn to_event(&self) -> TaskEvent {
        match self {
            TaskOutcome::Completed => TaskEvent::Completed,
            TaskOutcome::Cancelled => TaskEvent::Cancelled,
            TaskOutcome::Failed(message) => TaskEvent::Failed {
                message: message.clone(),
            },
        }
    }
}

/// A photo that received a cluster label.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub item: PhotoItem,
    pub label: Label,
    /// `false` when the sink failed to place the photo.
    pub routed: bool,
}

/// Totals for one run, returned by the worker when it exits.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub outcome: TaskOutcome,
    pub total: usize,
    /// Items attempted, whatever their fate.
    pub processed: usize,
    pub routed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub clusters: usize,
    /// Labelled items in processing order.
    pub assignments: Vec<Assignment>,
}

impl TaskSummary {
    pub fn new(outcome: TaskOutcome) -> Self {
        Self {
            outcome,
            total: 0,
            processed: 0,
            routed: 0,
            skipped: 0,
            errors: 0,
            clusters: 0,
            assignments: Vec::new(),
        }
    }

    pub fn label_of(&self, item: &PhotoItem) -> Option<Label> {
        self.assignments
            .iter()
            .find(|a| &a.item == item)
            .map(|a| a.label)
    }
}
