//! Cancellable fixed-interval background task.
//!
//! Used for the tracking poll (consumer) and the delivery partner's location
//! push (producer). The first tick runs immediately; later ticks follow the
//! fixed cadence with no jitter or backoff. A tick still in flight when the
//! task is stopped is dropped, so nothing fires after `stop()` returns.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct PeriodicTask {
    name: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn on the current tokio runtime.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            info!(task = %task_name, interval_ms = period.as_millis() as u64, "periodic task started");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(task = %task_name, "in-flight tick dropped on stop");
                        break;
                    }
                    _ = tick() => {}
                }
            }

            info!(task = %task_name, "periodic task stopped");
        });

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the task. Stopping an already-stopped task is a no-op.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .as_ref()
                .map(|h| !h.is_finished())
                .unwrap_or(false)
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
