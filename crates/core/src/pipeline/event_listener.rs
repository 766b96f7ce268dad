use std::collections::BTreeMap;
use std::time::Instant;

use crate::clustering::domain::cluster_store::Label;
use crate::pipeline::task_event::TaskEvent;
use crate::routing::domain::routing_sink::bucket_name;

/// Consumer side of the event channel.
///
/// Decouples the worker from how progress is shown (log lines, a GUI,
/// nothing at all) so the pipeline does not change per front end.
pub trait EventListener: Send {
    fn on_event(&mut self, event: &TaskEvent);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Listener that discards all events.
pub struct NullEventListener;

impl EventListener for NullEventListener {
    fn on_event(&mut self, _event: &TaskEvent) {}
}

/// CLI-oriented listener that logs progress through `log` and keeps the
/// tallies needed for a closing report.
///
/// Progress lines are throttled to every `throttle_items` photos.
pub struct LogEventListener {
    throttle_items: usize,
    start_time: Instant,
    done: usize,
    total: usize,
    per_label: BTreeMap<Label, usize>,
    skipped: Vec<String>,
    errors: Vec<(String, String)>,
    outcome: Option<String>,
}

impl LogEventListener {
    pub fn new(throttle_items: usize) -> Self {
        Self {
            throttle_items: throttle_items.max(1),
            start_time: Instant::now(),
            done: 0,
            total: 0,
            per_label: BTreeMap::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            outcome: None,
        }
    }

    /// Photos classified into each bucket so far.
    pub fn label_counts(&self) -> &BTreeMap<Label, usize> {
        &self.per_label
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn errors(&self) -> &[(String, String)] {
        &self.errors
    }

    /// Returns the formatted report, or `None` before the run has ended.
    pub fn summary_string(&self) -> Option<String> {
        let outcome = self.outcome.as_ref()?;
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Run {outcome}: {}/{} photos, {} people, {elapsed:.1}s",
            self.done,
            self.total,
            self.per_label.len()
        )];

        for (label, count) in &self.per_label {
            lines.push(format!("  {:12}: {count} photos", bucket_name(*label)));
        }
        if !self.skipped.is_empty() {
            lines.push(format!("  No face found: {}", self.skipped.len()));
        }
        if !self.errors.is_empty() {
            lines.push(format!("  Errors: {}", self.errors.len()));
            for (name, message) in &self.errors {
                lines.push(format!("    {name}: {message}"));
            }
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogEventListener {
    fn default() -> Self {
        Self::new(10)
    }
}

impl EventListener for LogEventListener {
    fn on_event(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { total } => {
                self.total = *total;
                log::info!("Found {total} photos");
            }
            TaskEvent::Progress { done, total, label } => {
                self.done = *done;
                self.total = *total;
                if let Some(label) = label {
                    *self.per_label.entry(*label).or_default() += 1;
                }
                if *total > 0 && (*done % self.throttle_items == 0 || done == total) {
                    let pct = *done as f64 / *total as f64 * 100.0;
                    log::info!("Processing: {done}/{total} photos ({pct:.1}%)");
                }
            }
            TaskEvent::Skipped { item } => self.skipped.push(item.name().to_string()),
            TaskEvent::ItemError { item, message } => {
                self.errors
                    .push((item.name().to_string(), message.clone()));
            }
            TaskEvent::Completed => self.outcome = Some("completed".into()),
            TaskEvent::Cancelled => self.outcome = Some("cancelled".into()),
            TaskEvent::Failed { message } => {
                log::error!("{message}");
                self.outcome = Some(format!("failed ({message})"));
            }
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
