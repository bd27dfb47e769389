use crate::models::{BatchProgress, ItemStatus};

/// Receives one update per attempted item, in enumeration order.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &BatchProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    fn report(&self, progress: &BatchProgress) {
        self(progress)
    }
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _progress: &BatchProgress) {}
}

/// Logs progress through `tracing`.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, progress: &BatchProgress) {
        let percent = (progress.fraction() * 100.0).round() as u32;
        match progress.status {
            ItemStatus::Succeeded => tracing::info!(
                image = %progress.image_name,
                "[{}/{}] {}% processed",
                progress.completed,
                progress.total,
                percent
            ),
            ItemStatus::Failed(stage) => tracing::info!(
                image = %progress.image_name,
                %stage,
                "[{}/{}] {}% processed (failed)",
                progress.completed,
                progress.total,
                percent
            ),
        }
    }
}
