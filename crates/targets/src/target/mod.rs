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

use crate::error::{StoreError, TargetError};
use crate::event_name::EventName;
use crate::store::{Key, QueueStore, Store};
use crate::target_id::TargetID;
use async_trait::async_trait;
use rustfs_config::notify::{FORMAT_ACCESS, FORMAT_NAMESPACE, STORE_EXTENSION, STORE_PREFIX};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

pub mod elasticsearch;
pub mod kafka;
pub mod mqtt;
pub mod nats;

/// Queue store handle held by a target.
pub type TargetStore<E> = dyn Store<EntityTarget<E>, Error = StoreError, Key = Key> + Send + Sync;

/// The sink kinds this crate can deliver to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Nats,
    Elasticsearch,
    Mqtt,
    Kafka,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Nats => "nats",
            TargetKind::Elasticsearch => "elasticsearch",
            TargetKind::Mqtt => "mqtt",
            TargetKind::Kafka => "kafka",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a search-index sink lays out documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFormat {
    /// One document per object, updated in place and removed with the object.
    #[default]
    Namespace,
    /// One document per event, appended.
    Access,
}

impl EventFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFormat::Namespace => FORMAT_NAMESPACE,
            EventFormat::Access => FORMAT_ACCESS,
        }
    }
}

impl FromStr for EventFormat {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            FORMAT_NAMESPACE => Ok(EventFormat::Namespace),
            FORMAT_ACCESS => Ok(EventFormat::Access),
            other => Err(TargetError::Configuration(format!(
                "unrecognized format '{other}', expected '{FORMAT_NAMESPACE}' or '{FORMAT_ACCESS}'"
            ))),
        }
    }
}

/// The unit a target queues and transmits: one event plus the object it concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTarget<E> {
    /// URL-encoded object name
    pub object_name: String,
    pub bucket_name: String,
    pub event_name: EventName,
    pub data: E,
}

impl<E> EntityTarget<E> {
    /// Decoded `bucket/object` key.
    pub fn key(&self) -> Result<String, TargetError> {
        let object_name = urlencoding::decode(&self.object_name)
            .map_err(|e| TargetError::Encoding(format!("Failed to decode object key: {e}")))?;
        Ok(format!("{}/{}", self.bucket_name, object_name))
    }
}

/// Envelope published to broker sinks.
#[derive(Debug, Serialize)]
pub struct TargetLog<'a, E> {
    #[serde(rename = "EventName")]
    pub event_name: EventName,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Records")]
    pub records: Vec<&'a E>,
}

impl<'a, E: Serialize> TargetLog<'a, E> {
    pub fn from_entity(entity: &'a EntityTarget<E>) -> Result<Self, TargetError> {
        Ok(TargetLog {
            event_name: entity.event_name,
            key: entity.key()?,
            records: vec![&entity.data],
        })
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, TargetError> {
        serde_json::to_vec(self).map_err(|e| TargetError::Serialization(format!("Failed to serialize event: {e}")))
    }
}

/// Observable lifecycle of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Constructed,
    Idle,
    Sending,
    Closed,
}

/// Lifecycle bookkeeping shared by every adapter.
///
/// `Constructed` lasts until the first save or replay; afterwards the target moves between
/// `Idle` and `Sending`. `Closed` is terminal.
#[derive(Debug, Default)]
pub struct TargetState {
    started: AtomicBool,
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TargetStatus {
        if self.closed.load(Ordering::SeqCst) {
            TargetStatus::Closed
        } else if self.in_flight.load(Ordering::SeqCst) > 0 {
            TargetStatus::Sending
        } else if self.started.load(Ordering::SeqCst) {
            TargetStatus::Idle
        } else {
            TargetStatus::Constructed
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fails with [`TargetError::Closed`] once the target is closed.
    pub fn ensure_open(&self) -> Result<(), TargetError> {
        if self.is_closed() {
            return Err(TargetError::Closed);
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Marks a transmission as in flight until the guard is dropped.
    pub fn begin_send(&self) -> Result<SendGuard<'_>, TargetError> {
        self.ensure_open()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(SendGuard { state: self })
    }

    /// Moves to `Closed`. Returns true only for the call that performed the transition.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

pub struct SendGuard<'a> {
    state: &'a TargetState,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opens the queue store of a target under `<queue_dir>/rustfs-<kind>-<id>`.
///
/// An empty `queue_dir` means the target runs without a durable queue.
pub fn open_queue_store<E>(
    queue_dir: &str,
    queue_limit: u64,
    kind: TargetKind,
    id: &TargetID,
) -> Result<Option<Box<TargetStore<E>>>, TargetError>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    if queue_dir.is_empty() {
        return Ok(None);
    }

    let dir_name = format!("{STORE_PREFIX}-{}-{}", kind.as_str(), id.id).replace(':', "_");
    let path = PathBuf::from(queue_dir).join(dir_name);
    debug!(target_id = %id, path = %path.display(), "Initializing queue store");

    let store = QueueStore::<EntityTarget<E>>::new(path, queue_limit, STORE_EXTENSION);
    store.open()?;
    Ok(Some(Box::new(store)))
}

/// Validates that a configured queue directory is absolute.
pub(crate) fn validate_queue_dir(kind: TargetKind, queue_dir: &str) -> Result<(), TargetError> {
    if !queue_dir.is_empty() && !std::path::Path::new(queue_dir).is_absolute() {
        return Err(TargetError::Configuration(format!("{kind} queue_dir path should be absolute")));
    }
    Ok(())
}

/// A notification sink.
///
/// Adapters implement the transport (`is_active`, `send`, `release`); the delivery policy
/// (`save`, `send_from_store`, `close`) is shared and provided here.
#[async_trait]
pub trait Target<E>: Send + Sync + 'static
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    /// Returns the ID of the target
    fn id(&self) -> TargetID;

    /// Returns the name of the target
    fn name(&self) -> String {
        self.id().to_string()
    }

    /// Probes the sink. Must return within a bounded time.
    async fn is_active(&self) -> Result<bool, TargetError>;

    /// Transmits one entity to the sink.
    async fn send(&self, entity: &EntityTarget<E>) -> Result<(), TargetError>;

    /// Returns the store associated with the target (if any)
    fn store(&self) -> Option<&TargetStore<E>>;

    fn state(&self) -> &TargetState;

    /// Releases sink connections. Called at most once, by `close`.
    async fn release(&self) -> Result<(), TargetError> {
        Ok(())
    }

    fn has_queue_store(&self) -> bool {
        self.store().is_some()
    }

    /// Maps a negative probe to [`TargetError::NotConnected`].
    async fn ensure_active(&self) -> Result<(), TargetError> {
        match self.is_active().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TargetError::NotConnected),
            Err(e) => Err(e),
        }
    }

    /// Accepts an event for eventual delivery.
    ///
    /// With a queue store the event is always persisted and left to replay. Without one the
    /// sink is probed and the event is sent immediately.
    async fn save(&self, entity: Arc<EntityTarget<E>>) -> Result<(), TargetError> {
        self.state().ensure_open()?;

        if let Some(store) = self.store() {
            return match store.put(entity) {
                Ok(()) => {
                    debug!(target_id = %self.id(), "Event saved to store");
                    Ok(())
                }
                Err(e) => {
                    warn!(target_id = %self.id(), error = %e, "Failed to save event to store");
                    Err(TargetError::Storage(e))
                }
            };
        }

        self.ensure_active().await?;
        let _guard = self.state().begin_send()?;
        self.send(&entity).await
    }

    /// Delivers one queued entry and removes it once the sink accepted it.
    ///
    /// An entry that is already gone counts as delivered. An entry that can no longer be
    /// decoded is dropped so it cannot block the queue.
    async fn send_from_store(&self, key: Key) -> Result<(), TargetError> {
        self.state().ensure_open()?;
        let store = self
            .store()
            .ok_or_else(|| TargetError::Configuration(format!("target {} has no queue store", self.id())))?;

        let entity = match store.get(&key) {
            Ok(entity) => entity,
            Err(StoreError::NotFound) => {
                debug!(target_id = %self.id(), key = %key, "Entry already delivered");
                return Ok(());
            }
            Err(e) if e.is_corrupt_entry() => {
                warn!(target_id = %self.id(), key = %key, error = %e, "Dropping undecodable entry");
                store.del(&key)?;
                return Ok(());
            }
            Err(e) => return Err(TargetError::Storage(e)),
        };

        self.ensure_active().await?;
        {
            let _guard = self.state().begin_send()?;
            self.send(&entity).await?;
        }
        store.del(&key)?;
        debug!(target_id = %self.id(), key = %key, "Event sent from store and deleted");
        Ok(())
    }

    /// Closes the target. Later calls are no-ops.
    async fn close(&self) -> Result<(), TargetError> {
        if !self.state().close() {
            return Ok(());
        }
        info!(target_id = %self.id(), "Closing target");
        self.release().await
    }
}
