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

#![allow(dead_code)]

use async_trait::async_trait;
use rustfs_config::notify::{ENABLE_KEY, STORE_EXTENSION};
use rustfs_config::{DEFAULT_LIMIT, KVS, parse_bool};
use rustfs_notify::{Event, Target, TargetError, TargetFactory, TargetID};
use rustfs_targets::TargetState;
use rustfs_targets::store::{QueueStore, Store};
use rustfs_targets::target::{EntityTarget, TargetStore};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MOCK_SUB_SYS: &str = "notify_mock";
pub const MOCK_KIND: &str = "mock";
pub const ONLINE_KEY: &str = "online";
pub const QUEUE_DIR_KEY: &str = "queue_dir";
pub const QUEUE_LIMIT_KEY: &str = "queue_limit";

/// Shared handle on a mock target, kept by tests after the target moved into a list.
#[derive(Default)]
pub struct MockProbe {
    pub online: AtomicBool,
    /// Fail this many sends before succeeding
    pub fail_sends: AtomicUsize,
    /// Panic inside `send`
    pub panic_on_send: AtomicBool,
    pub releases: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
}

impl MockProbe {
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub struct MockTarget {
    id: TargetID,
    probe: Arc<MockProbe>,
    store: Option<Box<TargetStore<Event>>>,
    state: TargetState,
}

impl MockTarget {
    pub fn new(id: &str, probe: Arc<MockProbe>, queue_dir: Option<&Path>) -> Result<Self, TargetError> {
        let id = TargetID::new(id, MOCK_KIND);
        let store = match queue_dir {
            Some(dir) => {
                let store = QueueStore::<EntityTarget<Event>>::new(
                    dir.join(format!("rustfs-{MOCK_KIND}-{}", id.id)),
                    DEFAULT_LIMIT,
                    STORE_EXTENSION,
                );
                store.open()?;
                Some(Box::new(store) as Box<TargetStore<Event>>)
            }
            None => None,
        };
        Ok(MockTarget {
            id,
            probe,
            store,
            state: TargetState::new(),
        })
    }
}

#[async_trait]
impl Target<Event> for MockTarget {
    fn id(&self) -> TargetID {
        self.id.clone()
    }

    async fn is_active(&self) -> Result<bool, TargetError> {
        Ok(self.probe.online.load(Ordering::SeqCst))
    }

    async fn send(&self, entity: &EntityTarget<Event>) -> Result<(), TargetError> {
        if self.probe.panic_on_send.load(Ordering::SeqCst) {
            panic!("sink {} crashed", self.id);
        }
        let pending = self.probe.fail_sends.load(Ordering::SeqCst);
        if pending > 0 {
            self.probe.fail_sends.store(pending - 1, Ordering::SeqCst);
            return Err(TargetError::Network("injected failure".to_string()));
        }
        self.probe.sent.lock().unwrap().push(entity.key()?);
        Ok(())
    }

    fn store(&self) -> Option<&TargetStore<Event>> {
        self.store.as_deref()
    }

    fn state(&self) -> &TargetState {
        &self.state
    }

    async fn release(&self) -> Result<(), TargetError> {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds mock targets and remembers them by instance.
#[derive(Default, Clone)]
pub struct MockFactory {
    /// Instances whose construction fails
    pub failing: Arc<HashSet<String>>,
    pub probes: Arc<Mutex<HashMap<String, Arc<MockProbe>>>>,
    /// Instances in construction order, failed ones included
    pub attempts: Arc<Mutex<Vec<String>>>,
}

impl MockFactory {
    pub fn failing(instances: &[&str]) -> Self {
        MockFactory {
            failing: Arc::new(instances.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn probe(&self, instance: &str) -> Arc<MockProbe> {
        self.probes.lock().unwrap()[instance].clone()
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TargetFactory for MockFactory {
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError> {
        self.attempts.lock().unwrap().push(id.clone());
        if self.failing.contains(&id) {
            return Err(TargetError::Network(format!("cannot reach sink for {id}")));
        }

        let probe = Arc::new(MockProbe::default());
        probe.set_online(parse_bool(&config.get(ONLINE_KEY)).unwrap_or(false));
        let queue_dir = config.get(QUEUE_DIR_KEY);
        let queue_dir = (!queue_dir.is_empty()).then(|| PathBuf::from(queue_dir));
        let target = MockTarget::new(&id, Arc::clone(&probe), queue_dir.as_deref())?;

        self.probes.lock().unwrap().insert(id, probe);
        Ok(Box::new(target))
    }

    fn validate_config(&self, _id: &str, config: &KVS) -> Result<(), TargetError> {
        let queue_dir = config.get(QUEUE_DIR_KEY);
        if !queue_dir.is_empty() && !Path::new(&queue_dir).is_absolute() {
            return Err(TargetError::Configuration("queue_dir path should be absolute".to_string()));
        }
        Ok(())
    }

    fn default_kvs(&self) -> KVS {
        KVS::from_iter([
            (ENABLE_KEY, "off"),
            (ONLINE_KEY, "on"),
            (QUEUE_DIR_KEY, ""),
            (QUEUE_LIMIT_KEY, "0"),
        ])
    }
}

pub fn mock_instance(online: bool, queue_dir: Option<&Path>) -> KVS {
    let mut kvs = KVS::from_iter([(ENABLE_KEY, "on"), (ONLINE_KEY, if online { "on" } else { "off" })]);
    if let Some(dir) = queue_dir {
        kvs.insert(QUEUE_DIR_KEY, dir.to_string_lossy());
    }
    kvs
}

/// Polls `check` until it holds or five seconds pass.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
