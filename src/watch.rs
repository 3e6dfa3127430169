//! Background output watching.
//!
//! Polls a container's output on a fixed interval and hands the delta since
//! the previous snapshot to a callback. Errors during a polling cycle are
//! logged and swallowed so a transient runtime hiccup does not kill the
//! watcher; everything else in the crate propagates errors.

use crate::client::ContainerClient;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default polling interval for attached watchers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a spawned output watcher.
///
/// The watcher runs until [`OutputWatcher::stop`] is called or the handle is
/// dropped; the container stops it on `stop()`/`destroy()`.
pub struct OutputWatcher {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl OutputWatcher {
    /// Spawn a watcher polling the container's output every `interval`.
    ///
    /// The callback receives only the output produced since the previous
    /// cycle, never the full stream twice.
    pub fn spawn<F>(
        client: ContainerClient,
        container_id: String,
        interval: Duration,
        mut callback: F,
    ) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut seen = String::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = rx.changed() => break,
                    _ = ticker.tick() => {
                        match client.logs(&container_id, None).await {
                            Ok(current) => {
                                if let Some(delta) = current.strip_prefix(seen.as_str()) {
                                    if !delta.is_empty() {
                                        callback(delta);
                                    }
                                } else {
                                    // stream restarted, hand over everything again
                                    callback(&current);
                                }
                                seen = current;
                            }
                            Err(e) => {
                                warn!("Output poll failed for {}: {}", container_id, e);
                            }
                        }
                    }
                }
            }

            debug!("Output watcher for {} stopped", container_id);
        });

        Self { shutdown, task }
    }

    /// Signal the watcher to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the watcher task has finished on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
