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

use crate::Event;
use crate::config::EnvSnapshot;
use crate::error::NotificationError;
use crate::notifier::TargetList;
use crate::registry::TargetRegistry;
use crate::stream::{ReplayConfig, ReplayHandle, start_replay};
use rustfs_config::Config;
use rustfs_targets::{TargetError, TargetID, TargetStatus};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Notify the system of monitoring indicators
pub struct NotificationMetrics {
    /// Deliveries currently in progress
    processing_events: AtomicUsize,
    /// Events delivered
    processed_events: AtomicUsize,
    /// Failed delivery attempts
    failed_events: AtomicUsize,
    start_time: Instant,
}

impl Default for NotificationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationMetrics {
    pub fn new() -> Self {
        NotificationMetrics {
            processing_events: AtomicUsize::new(0),
            processed_events: AtomicUsize::new(0),
            failed_events: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_processing(&self) {
        self.processing_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_processed(&self) {
        self.processing_events.fetch_sub(1, Ordering::Relaxed);
        self.processed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.processing_events.fetch_sub(1, Ordering::Relaxed);
        self.failed_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processing_count(&self) -> usize {
        self.processing_events.load(Ordering::Relaxed)
    }

    pub fn processed_count(&self) -> usize {
        self.processed_events.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed_events.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Point-in-time view of one target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub id: TargetID,
    pub status: TargetStatus,
    /// Entries waiting in the queue store, if the target has one
    pub queued: Option<usize>,
}

/// Point-in-time view of the notification system.
#[derive(Debug, Clone)]
pub struct NotificationStatus {
    pub targets: Vec<TargetReport>,
    pub processing: usize,
    pub processed: usize,
    pub failed: usize,
    pub uptime: Duration,
}

/// Owns the live targets and their replay tasks.
pub struct NotificationSystem {
    registry: TargetRegistry,
    targets: RwLock<Arc<TargetList>>,
    replays: Mutex<Vec<ReplayHandle>>,
    replay_config: ReplayConfig,
    metrics: Arc<NotificationMetrics>,
    shutdown: CancellationToken,
    initialized: AtomicBool,
}

impl Default for NotificationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSystem {
    pub fn new() -> Self {
        Self::with_registry(TargetRegistry::new())
    }

    pub fn with_registry(registry: TargetRegistry) -> Self {
        NotificationSystem {
            registry,
            targets: RwLock::new(Arc::new(TargetList::new())),
            replays: Mutex::new(Vec::new()),
            replay_config: ReplayConfig::default(),
            metrics: Arc::new(NotificationMetrics::new()),
            shutdown: CancellationToken::new(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_replay_config(mut self, replay_config: ReplayConfig) -> Self {
        self.replay_config = replay_config;
        self
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<NotificationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Builds the configured targets and starts replaying their queues.
    ///
    /// Can be called once. A failed call leaves no target running and may be retried.
    #[instrument(skip_all)]
    pub async fn init(&self, config: &Config, env: &EnvSnapshot) -> Result<(), NotificationError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(NotificationError::AlreadyInitialized);
        }

        let list = match self.registry.get_notification_targets(config, env).await {
            Ok(list) => list,
            Err(e) => {
                self.initialized.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let mut replays = self.replays.lock().await;
        for target in list.values() {
            if let Some(handle) = start_replay(target, self.replay_config.clone(), self.metrics(), &self.shutdown) {
                replays.push(handle);
            }
        }

        info!(targets = list.len(), replays = replays.len(), "Notification system initialized");
        *self.targets.write().await = Arc::new(list);
        Ok(())
    }

    /// Checks that the given configuration can be brought up, without keeping anything.
    pub async fn test_targets(
        &self,
        config: &Config,
        env: &EnvSnapshot,
        disabled: &[TargetID],
    ) -> Result<(), NotificationError> {
        self.registry.test_notification_targets(config, env, disabled).await
    }

    /// Hands an event to every active target. Returns the targets that refused it.
    pub async fn deliver(&self, event: &Event) -> Vec<(TargetID, TargetError)> {
        let list = Arc::clone(&*self.targets.read().await);
        if list.is_empty() {
            return Vec::new();
        }
        list.send(Arc::new(event.to_entity())).await
    }

    pub async fn active_targets(&self) -> Vec<TargetID> {
        self.targets.read().await.keys()
    }

    pub async fn get_status(&self) -> NotificationStatus {
        let list = Arc::clone(&*self.targets.read().await);
        let targets = list
            .values()
            .iter()
            .map(|target| TargetReport {
                id: target.id(),
                status: target.state().status(),
                queued: target.store().map(|store| store.len()),
            })
            .collect();

        NotificationStatus {
            targets,
            processing: self.metrics.processing_count(),
            processed: self.metrics.processed_count(),
            failed: self.metrics.failed_count(),
            uptime: self.metrics.uptime(),
        }
    }

    /// Stops replay, then closes every target. Queued entries stay on disk.
    #[instrument(skip_all)]
    pub async fn shutdown(&self) -> Vec<(TargetID, TargetError)> {
        self.shutdown.cancel();

        let replays: Vec<ReplayHandle> = self.replays.lock().await.drain(..).collect();
        for handle in replays {
            handle.stop().await;
        }

        let list = std::mem::replace(&mut *self.targets.write().await, Arc::new(TargetList::new()));
        let failures = list.close_all().await;
        for (id, e) in &failures {
            warn!(target_id = %id, error = %e, "Target did not close cleanly");
        }
        info!(closed = list.len(), "Notification system shut down");
        failures
    }
}

/// Reads a configuration document from disk.
pub async fn load_config_from_file(path: impl AsRef<Path>) -> Result<Config, NotificationError> {
    let data = tokio::fs::read(path).await?;
    Ok(Config::unmarshal(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfs_config::KVS;
    use rustfs_config::notify::{ENABLE_KEY, NATS_ADDRESS, NATS_SUBJECT, NOTIFY_NATS_SUB_SYS};
    use rustfs_targets::EventName;

    #[test]
    fn test_metrics_counters() {
        let metrics = NotificationMetrics::new();
        metrics.increment_processing();
        metrics.increment_processing();
        metrics.increment_processed();
        metrics.increment_failed();
        assert_eq!(metrics.processing_count(), 0);
        assert_eq!(metrics.processed_count(), 1);
        assert_eq!(metrics.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_system_lifecycle() {
        let system = NotificationSystem::new();
        system.init(&Config::new(), &EnvSnapshot::new()).await.unwrap();
        assert!(matches!(
            system.init(&Config::new(), &EnvSnapshot::new()).await,
            Err(NotificationError::AlreadyInitialized)
        ));

        let event = Event::new_test_event("bucket", "key", EventName::ObjectCreatedPut);
        assert!(system.deliver(&event).await.is_empty());
        assert!(system.active_targets().await.is_empty());
        assert!(system.shutdown().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_init_can_be_retried() {
        let mut bad = Config::new();
        bad.set(
            NOTIFY_NATS_SUB_SYS,
            "primary",
            KVS::from_iter([(ENABLE_KEY, "on"), (NATS_ADDRESS, ""), (NATS_SUBJECT, "events")]),
        );

        let system = NotificationSystem::new();
        assert!(system.init(&bad, &EnvSnapshot::new()).await.is_err());
        system.init(&Config::new(), &EnvSnapshot::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::new();
        config.set(NOTIFY_NATS_SUB_SYS, "primary", KVS::from_iter([(ENABLE_KEY, "off")]));
        tokio::fs::write(&path, config.marshal().unwrap()).await.unwrap();

        let loaded = load_config_from_file(&path).await.unwrap();
        assert_eq!(loaded, config);

        let missing = load_config_from_file(dir.path().join("absent.json")).await;
        assert!(matches!(missing, Err(NotificationError::ReadConfig(_))));
    }
}
