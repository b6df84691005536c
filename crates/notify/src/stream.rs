// Copyright 2024 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Durable replay: drains a target's queue store into its sink in key order.
//!
//! Each target with a queue store gets two tasks. The lister walks the store and feeds
//! keys, oldest first, into a channel of capacity one; the sender delivers them one at a
//! time and retries a key with growing pauses until it goes through, so a failure never
//! lets a later entry overtake an earlier one.

use crate::integration::NotificationMetrics;
use crate::notifier::SharedTarget;
use rustfs_targets::store::Key;
use rustfs_targets::{TargetError, TargetID};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pacing of a replay task.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// First pause after a failed delivery
    pub retry_interval: Duration,
    /// Cap of the doubling pause
    pub max_backoff: Duration,
    /// How often the lister rescans the store once it is drained
    pub poll_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            retry_interval: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// Controls the replay tasks of one target.
pub struct ReplayHandle {
    target_id: TargetID,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ReplayHandle {
    pub fn target_id(&self) -> &TargetID {
        &self.target_id
    }

    /// Signals the tasks to stop without waiting for them.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Stops the tasks and waits until they exit. An in-flight send finishes first.
    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(target_id = %self.target_id, error = %e, "Replay task failed");
            }
        }
        debug!(target_id = %self.target_id, "Replay stopped");
    }
}

/// Starts replaying the queue store of `target`. Returns `None` for targets without one.
///
/// The tasks stop when `shutdown` or the returned handle is cancelled, or once the target
/// reports that it is closed.
pub fn start_replay(
    target: SharedTarget,
    config: ReplayConfig,
    metrics: Arc<NotificationMetrics>,
    shutdown: &CancellationToken,
) -> Option<ReplayHandle> {
    if !target.has_queue_store() {
        return None;
    }

    let target_id = target.id();
    let cancel = shutdown.child_token();
    let (tx, rx) = mpsc::channel::<Key>(1);
    info!(target_id = %target_id, "Starting replay");

    let lister = tokio::spawn(list_keys(Arc::clone(&target), tx, config.poll_interval, cancel.clone()));
    let sender = tokio::spawn(send_keys(target, rx, config, metrics, cancel.clone()));

    Some(ReplayHandle {
        target_id,
        cancel,
        tasks: vec![lister, sender],
    })
}

async fn list_keys(target: SharedTarget, tx: mpsc::Sender<Key>, poll_interval: Duration, cancel: CancellationToken) {
    let mut last_fed: Option<Key> = None;

    loop {
        let keys = match target.store() {
            Some(store) => store.list(),
            None => return,
        };

        for key in keys {
            if last_fed.as_ref().is_some_and(|last| &key <= last) {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                sent = tx.send(key.clone()) => {
                    if sent.is_err() {
                        // sender is gone
                        return;
                    }
                }
            }
            last_fed = Some(key);
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(poll_interval) => {}
        }
    }
}

async fn send_keys(
    target: SharedTarget,
    mut rx: mpsc::Receiver<Key>,
    config: ReplayConfig,
    metrics: Arc<NotificationMetrics>,
    cancel: CancellationToken,
) {
    let target_id = target.id();

    loop {
        let key = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            key = rx.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };

        let mut backoff = config.retry_interval;
        loop {
            if cancel.is_cancelled() {
                return;
            }

            metrics.increment_processing();
            match target.send_from_store(key.clone()).await {
                Ok(()) => {
                    metrics.increment_processed();
                    debug!(target_id = %target_id, key = %key, "Replayed event");
                    break;
                }
                Err(TargetError::Closed) => {
                    metrics.increment_failed();
                    info!(target_id = %target_id, "Target closed, stopping replay");
                    cancel.cancel();
                    return;
                }
                Err(e) => {
                    metrics.increment_failed();
                    if e.is_unreachable() {
                        warn!(target_id = %target_id, key = %key, error = %e, retry_in = ?backoff, "Sink unreachable");
                    } else {
                        error!(target_id = %target_id, key = %key, error = %e, retry_in = ?backoff, "Replay failed");
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(config.max_backoff);
                }
            }
        }
    }
}
