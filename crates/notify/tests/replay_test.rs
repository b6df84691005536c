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

mod common;

use common::{MOCK_SUB_SYS, MockFactory, MockProbe, MockTarget, mock_instance, wait_until};
use rustfs_config::Config;
use rustfs_config::notify::{ENABLE_KEY, NATS_ADDRESS, NATS_QUEUE_DIR, NATS_SUBJECT};
use rustfs_notify::factory::NATSTargetFactory;
use rustfs_notify::{
    EnvSnapshot, Event, EventName, NotificationMetrics, NotificationSystem, ReplayConfig, SharedTarget, Target, TargetError,
    TargetFactory, TargetRegistry, start_replay,
};
use rustfs_targets::TargetStatus;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn fast_replay() -> ReplayConfig {
    ReplayConfig {
        retry_interval: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        poll_interval: Duration::from_millis(20),
    }
}

fn event(key: &str) -> Arc<rustfs_targets::target::EntityTarget<Event>> {
    Arc::new(Event::new_test_event("bucket", key, EventName::ObjectCreatedPut).to_entity())
}

fn queued(target: &SharedTarget) -> usize {
    target.store().map(|s| s.len()).unwrap_or_default()
}

#[tokio::test]
async fn test_offline_target_without_store_is_unreachable() {
    let factory = MockFactory::default();
    let target = factory
        .create_target("direct".to_string(), &mock_instance(false, None))
        .await
        .unwrap();
    assert!(target.store().is_none());

    let err = target.save(event("a.txt")).await.unwrap_err();
    assert!(matches!(err, TargetError::NotConnected));
    assert!(factory.probe("direct").sent().is_empty());
}

#[tokio::test]
async fn test_empty_queue_dir_never_touches_disk() {
    let dir = tempfile::tempdir().unwrap();
    let factory = NATSTargetFactory;
    let kvs = |queue_dir: &str| {
        let mut kvs = factory.default_kvs();
        kvs.insert(ENABLE_KEY, "on");
        kvs.insert(NATS_ADDRESS, "127.0.0.1:1");
        kvs.insert(NATS_SUBJECT, "events");
        kvs.insert(NATS_QUEUE_DIR, queue_dir);
        kvs
    };

    let direct = factory.create_target("direct".to_string(), &kvs("")).await.unwrap();
    assert!(direct.store().is_none());
    assert!(direct.save(event("a.txt")).await.is_err());
    assert!(!std::path::Path::new("rustfs-nats-direct").exists());

    let queued = factory
        .create_target("queued".to_string(), &kvs(&dir.path().to_string_lossy().into_owned()))
        .await
        .unwrap();
    assert!(queued.store().is_some());
    queued.save(event("b.txt")).await.unwrap();

    let entries: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["rustfs-nats-queued".to_string()]);
}

#[tokio::test]
async fn test_replay_delivers_once_sink_comes_back() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(MockProbe::default());
    let target: SharedTarget = Arc::new(MockTarget::new("queued", Arc::clone(&probe), Some(dir.path())).unwrap());

    target.save(event("a.txt")).await.unwrap();
    assert_eq!(queued(&target), 1);

    let shutdown = CancellationToken::new();
    let metrics = Arc::new(NotificationMetrics::new());
    let handle = start_replay(Arc::clone(&target), fast_replay(), Arc::clone(&metrics), &shutdown).unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(queued(&target), 1, "entry must stay queued while the sink is down");
    assert!(metrics.failed_count() > 0);

    probe.set_online(true);
    let t = &target;
    assert!(wait_until(|| async move { queued(t) == 0 }).await);
    assert_eq!(probe.sent(), vec!["bucket/a.txt"]);
    assert_eq!(metrics.processed_count(), 1);

    handle.stop().await;
    target.close().await.unwrap();
}

#[tokio::test]
async fn test_replay_preserves_order_across_failures() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(MockProbe::default());
    probe.set_online(true);
    probe.fail_sends.store(3, Ordering::SeqCst);
    let target: SharedTarget = Arc::new(MockTarget::new("ordered", Arc::clone(&probe), Some(dir.path())).unwrap());

    let keys = ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"];
    for key in keys {
        target.save(event(key)).await.unwrap();
    }

    let shutdown = CancellationToken::new();
    let handle = start_replay(Arc::clone(&target), fast_replay(), Arc::new(NotificationMetrics::new()), &shutdown).unwrap();

    let t = &target;
    assert!(wait_until(|| async move { queued(t) == 0 }).await);
    let expected: Vec<String> = keys.iter().map(|k| format!("bucket/{k}")).collect();
    assert_eq!(probe.sent(), expected);

    shutdown.cancel();
    handle.stop().await;
}

#[tokio::test]
async fn test_replay_skips_entries_removed_behind_its_back() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(MockProbe::default());
    let target: SharedTarget = Arc::new(MockTarget::new("pruned", Arc::clone(&probe), Some(dir.path())).unwrap());

    for key in ["1.txt", "2.txt", "3.txt"] {
        target.save(event(key)).await.unwrap();
    }
    let store = target.store().unwrap();
    let middle = store.list()[1].clone();
    store.del(&middle).unwrap();

    // a key the store never issued is treated as delivered
    target.send_from_store(middle).await.unwrap();

    probe.set_online(true);
    let shutdown = CancellationToken::new();
    let handle = start_replay(Arc::clone(&target), fast_replay(), Arc::new(NotificationMetrics::new()), &shutdown).unwrap();

    let t = &target;
    assert!(wait_until(|| async move { queued(t) == 0 }).await);
    assert_eq!(probe.sent(), vec!["bucket/1.txt", "bucket/3.txt"]);
    handle.stop().await;
}

#[tokio::test]
async fn test_replay_stops_when_target_closes() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(MockProbe::default());
    let target: SharedTarget = Arc::new(MockTarget::new("closing", Arc::clone(&probe), Some(dir.path())).unwrap());
    target.save(event("a.txt")).await.unwrap();

    let shutdown = CancellationToken::new();
    let handle = start_replay(Arc::clone(&target), fast_replay(), Arc::new(NotificationMetrics::new()), &shutdown).unwrap();
    target.close().await.unwrap();

    let h = &handle;
    assert!(wait_until(|| async move { h.is_finished() }).await);
    assert_eq!(queued(&target), 1, "closing must not drop queued entries");
    assert!(probe.sent().is_empty());
}

#[tokio::test]
async fn test_target_without_store_has_no_replay() {
    let probe = Arc::new(MockProbe::default());
    let target: SharedTarget = Arc::new(MockTarget::new("direct", probe, None).unwrap());
    let shutdown = CancellationToken::new();
    assert!(start_replay(target, fast_replay(), Arc::new(NotificationMetrics::new()), &shutdown).is_none());
}

#[tokio::test]
async fn test_system_delivers_replays_and_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MockFactory::default();
    let mut registry = TargetRegistry::empty();
    registry.register(MOCK_SUB_SYS, Box::new(factory.clone()));

    let mut config = Config::new();
    config.set(MOCK_SUB_SYS, "durable", mock_instance(false, Some(dir.path())));
    config.set(MOCK_SUB_SYS, "direct", mock_instance(false, None));

    let system = NotificationSystem::with_registry(registry).with_replay_config(fast_replay());
    system.init(&config, &EnvSnapshot::new()).await.unwrap();
    assert_eq!(system.active_targets().await.len(), 2);

    let failures = system
        .deliver(&Event::new_test_event("bucket", "photo.jpg", EventName::ObjectCreatedPut))
        .await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0.id, "direct");
    assert!(failures[0].1.is_unreachable());

    let status = system.get_status().await;
    let durable = status.targets.iter().find(|t| t.id.id == "durable").unwrap();
    assert_eq!(durable.queued, Some(1));
    assert_ne!(durable.status, TargetStatus::Closed);

    factory.probe("durable").set_online(true);
    let sys = &system;
    assert!(
        wait_until(|| async move {
            let status = sys.get_status().await;
            status.targets.iter().any(|t| t.id.id == "durable" && t.queued == Some(0))
        })
        .await
    );
    assert_eq!(factory.probe("durable").sent(), vec!["bucket/photo.jpg"]);

    assert!(system.shutdown().await.is_empty());
    assert_eq!(factory.probe("durable").releases(), 1);
    assert_eq!(factory.probe("direct").releases(), 1);
    assert!(system.active_targets().await.is_empty());
}
