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
use crate::error::NotificationError;
use futures::future::join_all;
use rustfs_targets::target::EntityTarget;
use rustfs_targets::{Target, TargetError, TargetID};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// A live target shared between the list, its replay task and in-flight deliveries.
pub type SharedTarget = Arc<dyn Target<Event> + Send + Sync>;

/// The set of active targets, keyed by ID.
#[derive(Default)]
pub struct TargetList {
    targets: HashMap<TargetID, SharedTarget>,
}

impl std::fmt::Debug for TargetList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetList").field("targets", &self.targets.keys().collect::<Vec<_>>()).finish()
    }
}

impl TargetList {
    pub fn new() -> Self {
        TargetList { targets: HashMap::new() }
    }

    /// Adds a target. An ID may only be registered once.
    pub fn add(&mut self, target: SharedTarget) -> Result<(), NotificationError> {
        let id = target.id();
        if self.targets.contains_key(&id) {
            return Err(NotificationError::DuplicateTarget(id));
        }
        self.targets.insert(id, target);
        Ok(())
    }

    pub fn exists(&self, id: &TargetID) -> bool {
        self.targets.contains_key(id)
    }

    pub fn get(&self, id: &TargetID) -> Option<SharedTarget> {
        self.targets.get(id).cloned()
    }

    /// Returns all target IDs, sorted
    pub fn keys(&self) -> Vec<TargetID> {
        let mut keys: Vec<TargetID> = self.targets.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns all targets, ordered by ID
    pub fn values(&self) -> Vec<SharedTarget> {
        self.keys().iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Hands one event to every target concurrently and collects the failures.
    ///
    /// One slow or failing target does not hold back the others.
    #[instrument(skip_all, fields(bucket = %entity.bucket_name, event = %entity.event_name))]
    pub async fn send(&self, entity: Arc<EntityTarget<Event>>) -> Vec<(TargetID, TargetError)> {
        let handles: Vec<_> = self
            .values()
            .into_iter()
            .map(|target| {
                let id = target.id();
                let entity = Arc::clone(&entity);
                (id, tokio::spawn(async move { target.save(entity).await }))
            })
            .collect();

        let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let mut failures = Vec::new();
        for (id, joined) in ids.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => debug!(target_id = %id, "Event accepted"),
                Ok(Err(e)) => {
                    warn!(target_id = %id, error = %e, "Failed to save event");
                    failures.push((id, e));
                }
                Err(e) => {
                    error!(target_id = %id, error = %e, "Delivery task failed");
                    failures.push((id, TargetError::Request(format!("delivery task failed: {e}"))));
                }
            }
        }
        failures
    }

    /// Closes every target once and reports the ones that failed to release.
    pub async fn close_all(&self) -> Vec<(TargetID, TargetError)> {
        let mut failures = Vec::new();
        for target in self.values() {
            let id = target.id();
            if let Err(e) = target.close().await {
                error!(target_id = %id, error = %e, "Failed to close target");
                failures.push((id, e));
            }
        }
        failures
    }
}
