use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::clustering::domain::cluster_store::Label;
use crate::input::photo_item::PhotoItem;
use crate::routing::domain::routing_sink::{bucket_name, RouteError, RoutingSink};

/// Shared list of `(item, label)` pairs in routing order.
pub type RoutedLog = Arc<Mutex<Vec<(PhotoItem, Label)>>>;

/// Records assignments without touching the filesystem.
///
/// Backs `--dry-run`. The log is shared so the caller can inspect it after
/// the sink has been moved onto the worker thread.
#[derive(Default)]
pub struct RecordingRoutingSink {
    routed: RoutedLog,
}

impl RecordingRoutingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> RoutedLog {
        self.routed.clone()
    }
}

impl RoutingSink for RecordingRoutingSink {
    fn route(&mut self, item: &PhotoItem, label: Label) -> Result<PathBuf, RouteError> {
        if let Ok(mut routed) = self.routed.lock() {
            routed.push((item.clone(), label));
        }
        Ok(PathBuf::from(bucket_name(label)).join(item.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut sink = RecordingRoutingSink::new();
        let log = sink.log();

        sink.route(&PhotoItem::new("x/a.jpg"), 1).unwrap();
        sink.route(&PhotoItem::new("x/b.jpg"), 2).unwrap();

        let routed = log.lock().unwrap();
        assert_eq!(routed.len(), 2);
        assert_eq!(routed[0].0.name(), "a.jpg");
        assert_eq!(routed[1].1, 2);
    }

    #[test]
    fn test_reports_virtual_destination() {
        let mut sink = RecordingRoutingSink::new();
        let dest = sink.route(&PhotoItem::new("x/a.jpg"), 7).unwrap();
        assert_eq!(dest, PathBuf::from("person_7").join("a.jpg"));
    }
}
