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

use crate::check::{DEFAULT_PROBE_TIMEOUT, check_tcp_reachable, url_host_port};
use crate::target::{
    EntityTarget, Target, TargetKind, TargetLog, TargetState, TargetStore, open_queue_store, validate_queue_dir,
};
use crate::{TargetError, TargetID};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

const CONNECTION_WAIT: Duration = Duration::from_secs(5);
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);
const ACK_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTTS_PORT: u16 = 8883;

/// Arguments for configuring an MQTT target
#[derive(Debug, Clone)]
pub struct MQTTArgs {
    /// Whether the target is enabled
    pub enable: bool,
    /// The broker URL
    pub broker: Url,
    /// The topic to publish to
    pub topic: String,
    /// The quality of service level
    pub qos: QoS,
    pub username: String,
    pub password: String,
    /// Pause between reconnection attempts
    pub max_reconnect_interval: Duration,
    /// The keep alive interval
    pub keep_alive: Duration,
    /// The directory to store events in case of failure
    pub queue_dir: String,
    /// The maximum number of events to store
    pub queue_limit: u64,
}

impl MQTTArgs {
    pub fn validate(&self) -> Result<(), TargetError> {
        if !self.enable {
            return Ok(());
        }

        match self.broker.scheme() {
            "tcp" | "mqtt" | "ssl" | "tls" | "tcps" | "mqtts" => {}
            _ => {
                return Err(TargetError::Configuration("unknown protocol in broker address".to_string()));
            }
        }

        if self.broker.host_str().is_none_or(str::is_empty) {
            return Err(TargetError::Configuration("MQTT broker has no host".to_string()));
        }

        if self.topic.is_empty() {
            return Err(TargetError::Configuration("MQTT topic cannot be empty".to_string()));
        }

        validate_queue_dir(TargetKind::Mqtt, &self.queue_dir)?;
        if !self.queue_dir.is_empty() && self.qos == QoS::AtMostOnce {
            return Err(TargetError::Configuration(
                "QoS should be AtLeastOnce (1) or ExactlyOnce (2) if queue_dir is set".to_string(),
            ));
        }
        Ok(())
    }

    fn uses_tls(&self) -> bool {
        matches!(self.broker.scheme(), "ssl" | "tls" | "tcps" | "mqtts")
    }

    fn default_port(&self) -> u16 {
        if self.uses_tls() { DEFAULT_MQTTS_PORT } else { DEFAULT_MQTT_PORT }
    }
}

/// Parses a configured QoS level.
pub fn parse_qos(value: &str) -> Result<QoS, TargetError> {
    match value.trim() {
        "0" => Ok(QoS::AtMostOnce),
        "1" => Ok(QoS::AtLeastOnce),
        "2" => Ok(QoS::ExactlyOnce),
        other => Err(TargetError::Configuration(format!("QoS must be 0, 1, or 2, got '{other}'"))),
    }
}

/// Pairs publish requests with the broker acknowledgements seen by the event loop.
///
/// rumqttc writes publishes in request order, so a sender is bound to a packet id when
/// its `Outgoing::Publish` event arrives. A QoS 0 publish completes once written; QoS 1
/// and 2 complete on PUBACK and PUBCOMP.
#[derive(Default)]
struct AckTracker {
    /// Requested publishes not yet written, oldest first
    queued: VecDeque<(QoS, oneshot::Sender<()>)>,
    /// Written publishes awaiting their acknowledgement, by packet id
    in_flight: HashMap<u16, oneshot::Sender<()>>,
    /// Publishes dropped by a lost connection that the client will still write
    abandoned_queued: usize,
    /// Packet ids the client retransmits after reconnecting
    abandoned_in_flight: HashSet<u16>,
}

impl AckTracker {
    fn enqueue(&mut self, qos: QoS) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.queued.push_back((qos, tx));
        rx
    }

    /// Forgets the newest request after the client refused it.
    fn discard_last(&mut self) {
        self.queued.pop_back();
    }

    fn on_publish_sent(&mut self, pkid: u16) {
        if self.abandoned_in_flight.remove(&pkid) {
            return;
        }
        if self.abandoned_queued > 0 {
            self.abandoned_queued -= 1;
            return;
        }
        match self.queued.pop_front() {
            Some((QoS::AtMostOnce, tx)) => {
                let _ = tx.send(());
            }
            Some((_, tx)) => {
                self.in_flight.insert(pkid, tx);
            }
            None => {}
        }
    }

    fn on_ack(&mut self, pkid: u16) {
        if let Some(tx) = self.in_flight.remove(&pkid) {
            let _ = tx.send(());
        }
    }

    /// Fails every waiting sender. Their publishes stay in the client and are skipped when written.
    fn connection_lost(&mut self) {
        self.abandoned_queued += self.queued.len();
        self.queued.clear();
        let pkids: Vec<u16> = self.in_flight.drain().map(|(pkid, _)| pkid).collect();
        self.abandoned_in_flight.extend(pkids);
    }
}

/// A target that publishes events to an MQTT broker
pub struct MQTTTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    id: TargetID,
    args: MQTTArgs,
    addr: String,
    client: Mutex<Option<AsyncClient>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
    acks: Arc<std::sync::Mutex<AckTracker>>,
    /// Keeps tracker order equal to request order
    publish_lock: Mutex<()>,
    cancel: CancellationToken,
    store: Option<Box<TargetStore<E>>>,
    state: TargetState,
}

impl<E> MQTTTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    /// Creates a new MQTTTarget. The broker connection is established lazily.
    #[instrument(skip(args), fields(target_id = %id))]
    pub fn new(id: String, args: MQTTArgs) -> Result<Self, TargetError> {
        args.validate()?;
        let target_id = TargetID::new(id, TargetKind::Mqtt.as_str());
        let store = open_queue_store(&args.queue_dir, args.queue_limit, TargetKind::Mqtt, &target_id)?;
        let addr = url_host_port(&args.broker, args.default_port())?;

        info!(target_id = %target_id, topic = %args.topic, "MQTT target created");
        Ok(MQTTTarget {
            id: target_id,
            args,
            addr,
            client: Mutex::new(None),
            event_loop: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            acks: Arc::new(std::sync::Mutex::new(AckTracker::default())),
            publish_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
            store,
            state: TargetState::new(),
        })
    }

    fn mqtt_options(&self) -> Result<MqttOptions, TargetError> {
        let host = self
            .args
            .broker
            .host_str()
            .ok_or_else(|| TargetError::Configuration("MQTT broker has no host".to_string()))?;
        let port = self.args.broker.port().unwrap_or(self.args.default_port());

        let mut options = MqttOptions::new(format!("rustfs_notify_{}", uuid::Uuid::new_v4()), host, port);
        options
            .set_keep_alive(self.args.keep_alive.max(MIN_KEEP_ALIVE))
            .set_clean_session(true);
        if !self.args.username.is_empty() {
            options.set_credentials(self.args.username.clone(), self.args.password.clone());
        }
        if self.args.uses_tls() {
            options.set_transport(Transport::tls_with_default_config());
        }
        Ok(options)
    }

    /// Returns the client, spawning the event loop on first use.
    async fn init(&self) -> Result<AsyncClient, TargetError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        if self.cancel.is_cancelled() {
            return Err(TargetError::Closed);
        }

        let (client, eventloop) = AsyncClient::new(self.mqtt_options()?, 10);
        let handle = tokio::spawn(run_mqtt_event_loop(
            eventloop,
            Arc::clone(&self.connected),
            Arc::clone(&self.acks),
            self.id.clone(),
            self.cancel.clone(),
            self.args.max_reconnect_interval,
        ));
        *self.event_loop.lock().await = Some(handle);
        *guard = Some(client.clone());
        debug!(target_id = %self.id, "MQTT event loop spawned");
        Ok(client)
    }

    fn acks(&self) -> MutexGuard<'_, AckTracker> {
        self.acks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_connected(&self, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        while !self.connected.load(Ordering::SeqCst) {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }
}

async fn run_mqtt_event_loop(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    acks: Arc<std::sync::Mutex<AckTracker>>,
    target_id: TargetID,
    cancel: CancellationToken,
    reconnect_interval: Duration,
) {
    let tracker = || acks.lock().unwrap_or_else(PoisonError::into_inner);
    info!(target_id = %target_id, "MQTT event loop task started.");
    loop {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(rumqttc::Event::Incoming(Packet::ConnAck(_))) => {
                info!(target_id = %target_id, "MQTT connected (ConnAck).");
                connected.store(true, Ordering::SeqCst);
            }
            Ok(rumqttc::Event::Incoming(Packet::Disconnect)) | Ok(rumqttc::Event::Outgoing(Outgoing::Disconnect)) => {
                info!(target_id = %target_id, "MQTT connection closed.");
                connected.store(false, Ordering::SeqCst);
                tracker().connection_lost();
            }
            Ok(rumqttc::Event::Outgoing(Outgoing::Publish(pkid))) => tracker().on_publish_sent(pkid),
            Ok(rumqttc::Event::Incoming(Packet::PubAck(ack))) => tracker().on_ack(ack.pkid),
            Ok(rumqttc::Event::Incoming(Packet::PubComp(comp))) => tracker().on_ack(comp.pkid),
            Ok(event) => trace!(target_id = %target_id, event = ?event, "MQTT event"),
            Err(ConnectionError::RequestsDone) => {
                debug!(target_id = %target_id, "MQTT client dropped, stopping event loop.");
                break;
            }
            Err(e) => {
                connected.store(false, Ordering::SeqCst);
                tracker().connection_lost();
                warn!(target_id = %target_id, error = %e, "MQTT connection error, reconnecting.");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(reconnect_interval) => {}
                }
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    *tracker() = AckTracker::default();
    info!(target_id = %target_id, "MQTT event loop task finished.");
}

#[async_trait]
impl<E> Target<E> for MQTTTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    fn id(&self) -> TargetID {
        self.id.clone()
    }

    async fn is_active(&self) -> Result<bool, TargetError> {
        check_tcp_reachable(&self.addr, DEFAULT_PROBE_TIMEOUT).await?;
        self.init().await?;
        Ok(self.wait_connected(CONNECTION_WAIT).await)
    }

    #[instrument(skip(self, entity), fields(target_id = %self.id))]
    async fn send(&self, entity: &EntityTarget<E>) -> Result<(), TargetError> {
        let payload = TargetLog::from_entity(entity)?.to_vec()?;
        let client = self.init().await?;
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TargetError::NotConnected);
        }

        let ack = {
            let _ordered = self.publish_lock.lock().await;
            let ack = self.acks().enqueue(self.args.qos);
            if let Err(e) = client.publish(&self.args.topic, self.args.qos, false, payload).await {
                self.acks().discard_last();
                return Err(TargetError::Request(format!("Failed to publish message: {e}")));
            }
            ack
        };

        match tokio::time::timeout(ACK_TIMEOUT, ack).await {
            Ok(Ok(())) => {
                debug!(target_id = %self.id, topic = %self.args.topic, "Event acknowledged by MQTT broker");
                Ok(())
            }
            // The connection dropped before the broker confirmed the publish.
            Ok(Err(_)) => Err(TargetError::NotConnected),
            Err(_) => Err(TargetError::Timeout(format!(
                "no acknowledgement for publish to '{}' within {ACK_TIMEOUT:?}",
                self.args.topic
            ))),
        }
    }

    fn store(&self) -> Option<&TargetStore<E>> {
        self.store.as_deref()
    }

    fn state(&self) -> &TargetState {
        &self.state
    }

    async fn release(&self) -> Result<(), TargetError> {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.disconnect().await {
                debug!(target_id = %self.id, error = %e, "MQTT disconnect request failed");
            }
        }
        self.cancel.cancel();
        if let Some(handle) = self.event_loop.lock().await.take() {
            if tokio::time::timeout(SHUTDOWN_WAIT, handle).await.is_err() {
                error!(target_id = %self.id, "MQTT event loop did not stop in time");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> MQTTArgs {
        MQTTArgs {
            enable: true,
            broker: Url::parse("mqtt://localhost:1883").unwrap(),
            topic: "rustfs/events".to_string(),
            qos: QoS::AtLeastOnce,
            username: String::new(),
            password: String::new(),
            max_reconnect_interval: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            queue_dir: String::new(),
            queue_limit: 0,
        }
    }

    #[test]
    fn test_validate() {
        assert!(args().validate().is_ok());

        let mut a = args();
        a.broker = Url::parse("ws://localhost:8080").unwrap();
        assert!(a.validate().is_err());

        let mut a = args();
        a.topic.clear();
        assert!(a.validate().is_err());

        let mut a = args();
        a.queue_dir = "/var/lib/rustfs/queue".to_string();
        a.qos = QoS::AtMostOnce;
        assert!(a.validate().is_err());
        a.qos = QoS::ExactlyOnce;
        assert!(a.validate().is_ok());

        let mut a = args();
        a.queue_dir = "queue".to_string();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_parse_qos() {
        assert_eq!(parse_qos("0").unwrap(), QoS::AtMostOnce);
        assert_eq!(parse_qos(" 2 ").unwrap(), QoS::ExactlyOnce);
        assert!(parse_qos("3").is_err());
    }

    #[test]
    fn test_tls_schemes_use_secure_port() {
        let mut a = args();
        a.broker = Url::parse("mqtts://broker.local").unwrap();
        let target = MQTTTarget::<String>::new("1".to_string(), a).unwrap();
        assert_eq!(target.addr, "broker.local:8883");
    }

    #[test]
    fn test_ack_waits_for_broker_confirmation() {
        let mut acks = AckTracker::default();
        let mut rx = acks.enqueue(QoS::AtLeastOnce);
        acks.on_publish_sent(7);
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
        acks.on_ack(8);
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
        acks.on_ack(7);
        assert!(rx.try_recv().is_ok());

        let mut rx = acks.enqueue(QoS::AtMostOnce);
        acks.on_publish_sent(0);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_lost_connection_fails_pending_publishes() {
        let mut acks = AckTracker::default();
        let mut written = acks.enqueue(QoS::ExactlyOnce);
        acks.on_publish_sent(1);
        let mut waiting = acks.enqueue(QoS::ExactlyOnce);
        acks.connection_lost();
        assert!(matches!(written.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
        assert!(matches!(waiting.try_recv(), Err(oneshot::error::TryRecvError::Closed)));

        // Retransmission of 1 and the late write of the abandoned request come first.
        let mut next = acks.enqueue(QoS::ExactlyOnce);
        acks.on_publish_sent(1);
        acks.on_publish_sent(2);
        acks.on_ack(1);
        acks.on_ack(2);
        assert!(matches!(next.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
        acks.on_publish_sent(3);
        acks.on_ack(3);
        assert!(next.try_recv().is_ok());
    }

    #[test]
    fn test_refused_publish_is_forgotten() {
        let mut acks = AckTracker::default();
        let _refused = acks.enqueue(QoS::AtLeastOnce);
        acks.discard_last();
        let mut rx = acks.enqueue(QoS::AtLeastOnce);
        acks.on_publish_sent(4);
        acks.on_ack(4);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let target = MQTTTarget::<String>::new("1".to_string(), args()).unwrap();
        target.close().await.unwrap();
        assert!(target.state().is_closed());
        assert!(target.cancel.is_cancelled());
    }
}
