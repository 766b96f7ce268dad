use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use thiserror::Error;

use crate::input::photo_source::PhotoSource;
use crate::pipeline::cancellation::CancellationToken;
use crate::pipeline::classify_photos_use_case::ClassifyPhotosUseCase;
use crate::pipeline::task_event::TaskEvent;
use crate::pipeline::task_summary::TaskSummary;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("a classification run is already in progress")]
    AlreadyRunning,
    #[error("no classification run has been started")]
    NotStarted,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct TaskReport {
    /// Events not yet consumed through `poll`/`next_event` when `wait` ran.
    pub events: Vec<TaskEvent>,
    pub summary: TaskSummary,
}

/// Controller for background classification runs.
///
/// Owns the worker thread, its event receiver and its cancellation token.
/// The controller's view of progress comes only from events; it never reads
/// worker state directly. Only one run may be active at a time, but a
/// finished task can be started again.
pub struct ProcessingTask {
    state: TaskState,
    done: usize,
    total: usize,
    cancel: CancellationToken,
    events: Option<Receiver<TaskEvent>>,
    worker: Option<JoinHandle<TaskSummary>>,
}

impl ProcessingTask {
    pub fn new() -> Self {
        Self {
            state: TaskState::Idle,
            done: 0,
            total: 0,
            cancel: CancellationToken::new(),
            events: None,
            worker: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// `(done, total)` as last reported by the worker.
    pub fn progress(&self) -> (usize, usize) {
        (self.done, self.total)
    }

    /// Token for the current run; cancelling it is the same as [`Self::cancel`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns a worker running `use_case` over the photos from `source`.
    pub fn start(
        &mut self,
        mut use_case: ClassifyPhotosUseCase,
        source: Box<dyn PhotoSource>,
    ) -> Result<(), TaskError> {
        if self.state == TaskState::Running {
            return Err(TaskError::AlreadyRunning);
        }
        // Reap a previous run that finished but was never waited on.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let (tx, rx) = crossbeam_channel::unbounded::<TaskEvent>();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("facesort-worker".into())
            .spawn(move || use_case.execute(source.as_ref(), &tx, &worker_cancel))
            .map_err(TaskError::Spawn)?;

        self.state = TaskState::Running;
        self.done = 0;
        self.total = 0;
        self.cancel = cancel;
        self.events = Some(rx);
        self.worker = Some(handle);
        Ok(())
    }

    /// Requests a stop at the next photo boundary. Never blocks.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drains every event already queued, without blocking.
    pub fn poll(&mut self) -> Vec<TaskEvent> {
        let mut drained = Vec::new();
        while let Some(rx) = &self.events {
            match rx.try_recv() {
                Ok(event) => {
                    self.observe(&event);
                    drained.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    drained.extend(self.on_disconnect());
                    break;
                }
            }
        }
        drained
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_event(&mut self, timeout: Duration) -> Option<TaskEvent> {
        let rx = self.events.as_ref()?;
        match rx.recv_timeout(timeout) {
            Ok(event) => {
                self.observe(&event);
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.on_disconnect(),
        }
    }

    /// Blocks until the run ends and joins the worker.
    pub fn wait(&mut self) -> Result<TaskReport, TaskError> {
        if self.worker.is_none() {
            return Err(TaskError::NotStarted);
        }

        let mut events = Vec::new();
        while self.state == TaskState::Running {
            let Some(rx) = &self.events else {
                break;
            };
            match rx.recv() {
                Ok(event) => {
                    self.observe(&event);
                    events.push(event);
                }
                Err(_) => events.extend(self.on_disconnect()),
            }
        }

        let handle = self.worker.take().ok_or(TaskError::NotStarted)?;
        let summary = handle.join().map_err(|_| TaskError::WorkerPanicked)?;
        Ok(TaskReport { events, summary })
    }

    fn observe(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { total } => self.total = *total,
            TaskEvent::Progress { done, total, .. } => {
                self.done = *done;
                self.total = *total;
            }
            TaskEvent::Completed => self.state = TaskState::Completed,
            TaskEvent::Cancelled => self.state = TaskState::Cancelled,
            TaskEvent::Failed { .. } => self.state = TaskState::Failed,
            TaskEvent::Skipped { .. } | TaskEvent::ItemError { .. } => {}
        }
    }

    /// The channel closed. If no terminal event arrived first, the worker
    /// died; report that as the run's single terminal event.
    fn on_disconnect(&mut self) -> Option<TaskEvent> {
        self.events = None;
        if self.state != TaskState::Running {
            return None;
        }
        log::error!("Worker exited without reporting an outcome");
        self.state = TaskState::Failed;
        Some(TaskEvent::Failed {
            message: "worker exited without reporting an outcome".into(),
        })
    }
}

impl Default for ProcessingTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessingTask {
    fn drop(&mut self) {
        if self.state == TaskState::Running {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::domain::distance::{Embedding, Metric};
    use crate::embedding::domain::embedding_source::EmbeddingSource;
    use crate::input::photo_item::PhotoItem;
    use crate::pipeline::task_summary::TaskOutcome;
    use crate::routing::infrastructure::recording_routing_sink::RecordingRoutingSink;
    use crossbeam_channel::{Receiver, Sender};

    /// Embeds each photo as `[index]`, so every photo becomes its own cluster
    /// at tolerance 0.4.
    struct IndexEmbedder;

    impl EmbeddingSource for IndexEmbedder {
        fn embed(
            &mut self,
            item: &PhotoItem,
        ) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
            let index: f32 = item
                .name()
                .trim_end_matches(".jpg")
                .parse()
                .map_err(|_| "bad name")?;
            Ok(Some(vec![index]))
        }
    }

    /// Blocks on each photo until the test hands out a permit.
    struct GatedEmbedder {
        entered: Sender<()>,
        permits: Receiver<()>,
    }

    impl EmbeddingSource for GatedEmbedder {
        fn embed(
            &mut self,
            _item: &PhotoItem,
        ) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
            let _ = self.entered.send(());
            self.permits.recv().map_err(|_| "gate closed")?;
            Ok(Some(vec![0.0]))
        }
    }

    struct PanickingEmbedder;

    impl EmbeddingSource for PanickingEmbedder {
        fn embed(
            &mut self,
            _item: &PhotoItem,
        ) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
            panic!("model crashed");
        }
    }

    fn photos(n: usize) -> Box<dyn PhotoSource> {
        Box::new(
            (0..n)
                .map(|i| PhotoItem::new(format!("/in/{i}.jpg")))
                .collect::<Vec<_>>(),
        )
    }

    fn use_case(embedder: impl EmbeddingSource + 'static) -> ClassifyPhotosUseCase {
        ClassifyPhotosUseCase::new(
            Box::new(embedder),
            Box::new(RecordingRoutingSink::new()),
            0.4,
            Metric::Euclidean,
        )
    }

    #[test]
    fn test_new_task_is_idle() {
        let task = ProcessingTask::new();
        assert_eq!(task.state(), TaskState::Idle);
        assert_eq!(task.progress(), (0, 0));
    }

    #[test]
    fn test_wait_without_start_is_error() {
        let mut task = ProcessingTask::new();
        assert!(matches!(task.wait(), Err(TaskError::NotStarted)));
    }

    #[test]
    fn test_run_to_completion() {
        let mut task = ProcessingTask::new();
        task.start(use_case(IndexEmbedder), photos(3)).unwrap();

        let report = task.wait().unwrap();

        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.progress(), (3, 3));
        assert_eq!(report.summary.outcome, TaskOutcome::Completed);
        assert_eq!(report.summary.clusters, 3);
        assert_eq!(report.events.first(), Some(&TaskEvent::Started { total: 3 }));
        assert_eq!(report.events.last(), Some(&TaskEvent::Completed));
        assert_eq!(report.events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_events_arrive_in_order() {
        let mut task = ProcessingTask::new();
        task.start(use_case(IndexEmbedder), photos(5)).unwrap();

        let report = task.wait().unwrap();
        let done: Vec<usize> = report
            .events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Progress { done, .. } => Some(*done),
                _ => None,
            })
            .collect();
        assert_eq!(done, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_start_while_running_is_rejected() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (permit_tx, permit_rx) = crossbeam_channel::unbounded();
        let mut task = ProcessingTask::new();
        task.start(
            use_case(GatedEmbedder {
                entered: entered_tx,
                permits: permit_rx,
            }),
            photos(1),
        )
        .unwrap();
        entered_rx.recv().unwrap();

        let second = task.start(use_case(IndexEmbedder), photos(1));
        assert!(matches!(second, Err(TaskError::AlreadyRunning)));

        permit_tx.send(()).unwrap();
        let report = task.wait().unwrap();
        assert_eq!(report.summary.outcome, TaskOutcome::Completed);
    }

    #[test]
    fn test_cancel_stops_at_next_boundary() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (permit_tx, permit_rx) = crossbeam_channel::unbounded();
        let mut task = ProcessingTask::new();
        task.start(
            use_case(GatedEmbedder {
                entered: entered_tx,
                permits: permit_rx,
            }),
            photos(10),
        )
        .unwrap();

        // First photo is in flight; cancel, then let it finish.
        entered_rx.recv().unwrap();
        task.cancel();
        permit_tx.send(()).unwrap();

        let report = task.wait().unwrap();
        assert_eq!(task.state(), TaskState::Cancelled);
        assert_eq!(report.summary.outcome, TaskOutcome::Cancelled);
        assert_eq!(report.summary.processed, 1);
        assert_eq!(report.summary.routed, 1);
        assert_eq!(task.progress(), (1, 10));
        assert_eq!(report.events.last(), Some(&TaskEvent::Cancelled));
    }

    #[test]
    fn test_cancel_through_shared_token() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (permit_tx, permit_rx) = crossbeam_channel::unbounded();
        let mut task = ProcessingTask::new();
        task.start(
            use_case(GatedEmbedder {
                entered: entered_tx,
                permits: permit_rx,
            }),
            photos(5),
        )
        .unwrap();

        // The token is handed to another thread, as a signal handler would be.
        let token = task.cancellation_token();
        entered_rx.recv().unwrap();
        std::thread::spawn(move || token.cancel()).join().unwrap();
        permit_tx.send(()).unwrap();

        let mut last = None;
        while !task.state().is_terminal() {
            if let Some(event) = task.next_event(Duration::from_millis(50)) {
                last = Some(event);
            }
        }
        assert_eq!(task.state(), TaskState::Cancelled);
        assert_eq!(last, Some(TaskEvent::Cancelled));
        assert_eq!(task.wait().unwrap().summary.outcome, TaskOutcome::Cancelled);
    }

    #[test]
    fn test_poll_drains_without_blocking() {
        let mut task = ProcessingTask::new();
        task.start(use_case(IndexEmbedder), photos(2)).unwrap();

        let mut seen = Vec::new();
        while !task.state().is_terminal() {
            seen.extend(task.poll());
            std::thread::yield_now();
        }
        assert_eq!(seen.last(), Some(&TaskEvent::Completed));
        assert!(task.poll().is_empty());

        let report = task.wait().unwrap();
        assert!(report.events.is_empty());
        assert_eq!(report.summary.routed, 2);
    }

    #[test]
    fn test_next_event_times_out_when_idle() {
        let mut task = ProcessingTask::new();
        assert_eq!(task.next_event(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_next_event_streams_until_terminal() {
        let mut task = ProcessingTask::new();
        task.start(use_case(IndexEmbedder), photos(2)).unwrap();

        let mut terminal = None;
        while terminal.is_none() {
            if let Some(event) = task.next_event(Duration::from_millis(50)) {
                if event.is_terminal() {
                    terminal = Some(event);
                }
            }
        }
        assert_eq!(terminal, Some(TaskEvent::Completed));
        assert!(task.wait().is_ok());
    }

    #[test]
    fn test_task_can_be_restarted_after_finishing() {
        let mut task = ProcessingTask::new();
        task.start(use_case(IndexEmbedder), photos(2)).unwrap();
        task.wait().unwrap();

        task.start(use_case(IndexEmbedder), photos(1)).unwrap();
        let report = task.wait().unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.progress(), (1, 1));
        assert_eq!(report.summary.clusters, 1);
    }

    #[test]
    fn test_worker_panic_becomes_failed() {
        let mut task = ProcessingTask::new();
        task.start(use_case(PanickingEmbedder), photos(1)).unwrap();

        let result = task.wait();
        assert!(matches!(result, Err(TaskError::WorkerPanicked)));
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[test]
    fn test_failed_setup_reports_failed_state() {
        let mut task = ProcessingTask::new();
        let uc = ClassifyPhotosUseCase::new(
            Box::new(IndexEmbedder),
            Box::new(RecordingRoutingSink::new()),
            f64::NAN,
            Metric::Euclidean,
        );
        task.start(uc, photos(1)).unwrap();

        let report = task.wait().unwrap();
        assert_eq!(task.state(), TaskState::Failed);
        assert!(matches!(report.events.as_slice(), [TaskEvent::Failed { .. }]));
    }
}
