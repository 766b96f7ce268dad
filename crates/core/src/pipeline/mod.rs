pub mod cancellation;
pub mod classify_photos_use_case;
pub mod event_listener;
pub mod processing_task;
pub mod task_event;
pub mod task_summary;
