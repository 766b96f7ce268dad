use crossbeam_channel::Sender;

use crate::clustering::domain::cluster_store::Label;
use crate::clustering::domain::clustering_engine::ClusteringEngine;
use crate::clustering::domain::distance::Metric;
use crate::embedding::domain::embedding_source::EmbeddingSource;
use crate::input::photo_item::PhotoItem;
use crate::input::photo_source::PhotoSource;
use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::task_event::TaskEvent;
use crate::pipeline::task_summary::{Assignment, TaskOutcome, TaskSummary};
use crate::routing::domain::routing_sink::RoutingSink;

/// Batch pipeline: enumerate → (embed → classify → route) per photo.
///
/// Photos are processed strictly in enumeration order on the calling thread.
/// Every per-item failure is reported as an event and the run moves on; only
/// setup failures (bad tolerance, unreadable input) end the run as `Failed`.
/// A fresh [`ClusteringEngine`] is built for each call to `execute`.
pub struct ClassifyPhotosUseCase {
    embedder: Box<dyn EmbeddingSource>,
    sink: Box<dyn RoutingSink>,
    tolerance: f64,
    metric: Metric,
}

impl ClassifyPhotosUseCase {
    pub fn new(
        embedder: Box<dyn EmbeddingSource>,
        sink: Box<dyn RoutingSink>,
        tolerance: f64,
        metric: Metric,
    ) -> Self {
        Self {
            embedder,
            sink,
            tolerance,
            metric,
        }
    }

    /// Runs one batch, streaming events to `events`.
    ///
    /// `cancel` is checked before each item; items already routed stay
    /// routed. Sends never block, and a dropped receiver is ignored.
    pub fn execute(
        &mut self,
        source: &dyn PhotoSource,
        events: &Sender<TaskEvent>,
        cancel: &CancellationToken,
    ) -> TaskSummary {
        let mut engine = match ClusteringEngine::new(self.tolerance, self.metric) {
            Ok(engine) => engine,
            Err(e) => return fail(events, e.to_string()),
        };
        let items = match source.photos() {
            Ok(items) => items,
            Err(e) => return fail(events, e.to_string()),
        };

        let total = items.len();
        let mut summary = TaskSummary::new(TaskOutcome::Completed);
        summary.total = total;
        log::info!(
            "Classifying {total} photos (tolerance {}, {} distance)",
            self.tolerance,
            self.metric
        );
        let _ = events.send(TaskEvent::Started { total });

        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Cancelled after {index}/{total} photos");
                summary.outcome = TaskOutcome::Cancelled;
                break;
            }

            let label = self.process_item(&mut engine, item, events, &mut summary);
            summary.processed = index + 1;
            let _ = events.send(TaskEvent::Progress {
                done: index + 1,
                total,
                label,
            });
        }

        summary.clusters = engine.cluster_count();
        if summary.outcome == TaskOutcome::Completed {
            log::info!(
                "Sorted {} of {total} photos into {} people ({} skipped, {} errors)",
                summary.routed,
                summary.clusters,
                summary.skipped,
                summary.errors
            );
        }
        let _ = events.send(summary.outcome.to_event());
        summary
    }

    /// Embeds, classifies and routes one photo. Returns its label if it got one.
    fn process_item(
        &mut self,
        engine: &mut ClusteringEngine,
        item: &PhotoItem,
        events: &Sender<TaskEvent>,
        summary: &mut TaskSummary,
    ) -> Option<Label> {
        let embedding = match self.embedder.embed(item) {
            Ok(Some(embedding)) => embedding,
            Ok(None) => {
                log::info!("No face found: {}", item.name());
                summary.skipped += 1;
                let _ = events.send(TaskEvent::Skipped { item: item.clone() });
                return None;
            }
            Err(e) => {
                report_item_error(events, summary, item, format!("embedding failed: {e}"));
                return None;
            }
        };

        let label = match engine.classify(embedding) {
            Ok(label) => label,
            Err(e) => {
                report_item_error(events, summary, item, e.to_string());
                return None;
            }
        };

        let routed = match self.sink.route(item, label) {
            Ok(dest) => {
                log::debug!("{} -> {}", item.name(), dest.display());
                summary.routed += 1;
                true
            }
            Err(e) => {
                report_item_error(events, summary, item, e.to_string());
                false
            }
        };
        summary.assignments.push(Assignment {
            item: item.clone(),
            label,
            routed,
        });
        Some(label)
    }
}

fn report_item_error(
    events: &Sender<TaskEvent>,
    summary: &mut TaskSummary,
    item: &PhotoItem,
    message: String,
) {
    log::warn!("Skipping {}: {message}", item.name());
    summary.errors += 1;
    let _ = events.send(TaskEvent::ItemError {
        item: item.clone(),
        message,
    });
}

fn fail(events: &Sender<TaskEvent>, message: String) -> TaskSummary {
    log::error!("Classification failed: {message}");
    let outcome = TaskOutcome::Failed(message);
    let _ = events.send(outcome.to_event());
    TaskSummary::new(outcome)
}
