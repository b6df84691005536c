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

//! Kafka sink.
//!
//! Argument parsing, validation and the broker probe are always available so a
//! `notify_kafka` section is checked in every build. The producer itself needs the
//! `kafka` feature, which links librdkafka.

use crate::TargetError;
use crate::check::{DEFAULT_PROBE_TIMEOUT, check_any_reachable};
use crate::target::{TargetKind, validate_queue_dir};
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "kafka")]
use crate::TargetID;
#[cfg(feature = "kafka")]
use crate::target::{EntityTarget, Target, TargetLog, TargetState, TargetStore, open_queue_store};
#[cfg(feature = "kafka")]
use async_trait::async_trait;
#[cfg(feature = "kafka")]
use rdkafka::config::ClientConfig;
#[cfg(feature = "kafka")]
use rdkafka::error::KafkaError;
#[cfg(feature = "kafka")]
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
#[cfg(feature = "kafka")]
use rdkafka::types::RDKafkaErrorCode;
#[cfg(feature = "kafka")]
use rdkafka::util::Timeout;
#[cfg(feature = "kafka")]
use serde::Serialize;
#[cfg(feature = "kafka")]
use serde::de::DeserializeOwned;
#[cfg(feature = "kafka")]
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_KAFKA_PORT: u16 = 9092;
/// How long a produced message may wait for its delivery report.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
#[cfg(feature = "kafka")]
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// Highest `tls_client_auth` level accepted (require and verify a client certificate).
const MAX_TLS_CLIENT_AUTH: u8 = 4;

/// SASL mechanisms understood by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaslMechanism {
    #[default]
    Plain,
    ScramSha256,
    ScramSha512,
}

impl SaslMechanism {
    /// Name as the client library expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl FromStr for SaslMechanism {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "plain" => Ok(SaslMechanism::Plain),
            "sha256" | "scram-sha-256" => Ok(SaslMechanism::ScramSha256),
            "sha512" | "scram-sha-512" => Ok(SaslMechanism::ScramSha512),
            other => Err(TargetError::Configuration(format!(
                "unknown sasl mechanism '{other}', expected plain, sha256 or sha512"
            ))),
        }
    }
}

/// Splits a comma separated broker list, adding the default port where none is given.
pub fn parse_brokers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| {
            let has_port = match b.rsplit_once(':') {
                // A bare IPv6 address has colons but no port.
                Some((host, _)) => !host.contains(':') || host.ends_with(']'),
                None => false,
            };
            if has_port { b.to_string() } else { format!("{b}:{DEFAULT_KAFKA_PORT}") }
        })
        .collect()
}

/// Arguments for configuring a Kafka target
#[derive(Debug, Clone, Default)]
pub struct KafkaArgs {
    pub enable: bool,
    /// `host:port` of every bootstrap broker
    pub brokers: Vec<String>,
    pub topic: String,
    pub tls: bool,
    pub tls_skip_verify: bool,
    /// Client certificate policy, 0 (none) to 4 (require and verify)
    pub tls_client_auth: u8,
    pub client_tls_cert: String,
    pub client_tls_key: String,
    pub sasl: bool,
    pub sasl_username: String,
    pub sasl_password: String,
    pub sasl_mechanism: SaslMechanism,
    /// Broker protocol version used until the broker reports its own
    pub version: String,
    /// The directory to store events in case of failure
    pub queue_dir: String,
    /// The maximum number of events to store
    pub queue_limit: u64,
}

impl KafkaArgs {
    pub fn validate(&self) -> Result<(), TargetError> {
        if !self.enable {
            return Ok(());
        }

        if self.brokers.is_empty() {
            return Err(TargetError::Configuration("no broker address found".to_string()));
        }
        for broker in &self.brokers {
            match broker.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
                _ => {
                    return Err(TargetError::Configuration(format!(
                        "invalid broker '{broker}', expected host:port"
                    )));
                }
            }
        }

        if self.topic.is_empty() {
            return Err(TargetError::Configuration("empty topic".to_string()));
        }

        if self.client_tls_cert.is_empty() != self.client_tls_key.is_empty() {
            return Err(TargetError::Configuration(
                "client_tls_cert and client_tls_key must be specified as a pair".to_string(),
            ));
        }
        if !self.client_tls_cert.is_empty() && !self.tls {
            return Err(TargetError::Configuration("client certificate requires tls".to_string()));
        }
        if self.tls_client_auth > MAX_TLS_CLIENT_AUTH {
            return Err(TargetError::Configuration(format!(
                "tls_client_auth must be between 0 and {MAX_TLS_CLIENT_AUTH}"
            )));
        }
        if self.tls_client_auth > 0 && self.client_tls_cert.is_empty() {
            return Err(TargetError::Configuration(
                "tls_client_auth requires client_tls_cert and client_tls_key".to_string(),
            ));
        }

        if self.sasl && self.sasl_username.is_empty() {
            return Err(TargetError::Configuration("sasl is enabled but sasl_username is empty".to_string()));
        }

        validate_queue_dir(TargetKind::Kafka, &self.queue_dir)
    }

    fn security_protocol(&self) -> &'static str {
        match (self.tls, self.sasl) {
            (false, false) => "plaintext",
            (true, false) => "ssl",
            (false, true) => "sasl_plaintext",
            (true, true) => "sasl_ssl",
        }
    }

    /// Producer settings derived from the arguments.
    pub fn client_settings(&self) -> Vec<(&'static str, String)> {
        let mut settings = vec![
            ("bootstrap.servers", self.brokers.join(",")),
            ("message.timeout.ms", DELIVERY_TIMEOUT.as_millis().to_string()),
            ("security.protocol", self.security_protocol().to_string()),
        ];
        if self.tls {
            if self.tls_skip_verify {
                settings.push(("enable.ssl.certificate.verification", "false".to_string()));
            }
            if !self.client_tls_cert.is_empty() {
                settings.push(("ssl.certificate.location", self.client_tls_cert.clone()));
                settings.push(("ssl.key.location", self.client_tls_key.clone()));
            }
        }
        if self.sasl {
            settings.push(("sasl.mechanism", self.sasl_mechanism.as_str().to_string()));
            settings.push(("sasl.username", self.sasl_username.clone()));
            settings.push(("sasl.password", self.sasl_password.clone()));
        }
        if !self.version.is_empty() {
            settings.push(("broker.version.fallback", self.version.clone()));
        }
        settings
    }

    /// Succeeds once any broker accepts a TCP connection.
    pub async fn ping_brokers(&self) -> Result<(), TargetError> {
        check_any_reachable(&self.brokers, DEFAULT_PROBE_TIMEOUT).await
    }
}

/// A target that produces events to a Kafka topic
#[cfg(feature = "kafka")]
pub struct KafkaTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    id: TargetID,
    args: KafkaArgs,
    producer: FutureProducer,
    store: Option<Box<TargetStore<E>>>,
    state: TargetState,
}

#[cfg(feature = "kafka")]
impl<E> KafkaTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    /// Creates a new KafkaTarget. Brokers are contacted in the background by the producer.
    #[instrument(skip(args), fields(target_id = %id))]
    pub fn new(id: String, args: KafkaArgs) -> Result<Self, TargetError> {
        args.validate()?;
        let target_id = TargetID::new(id, TargetKind::Kafka.as_str());

        let mut config = ClientConfig::new();
        for (key, value) in args.client_settings() {
            config.set(key, value);
        }
        let producer = config
            .create::<FutureProducer>()
            .map_err(|e| TargetError::Configuration(format!("Failed to create Kafka producer: {e}")))?;

        let store = open_queue_store(&args.queue_dir, args.queue_limit, TargetKind::Kafka, &target_id)?;

        info!(target_id = %target_id, topic = %args.topic, brokers = %args.brokers.join(","), "Kafka target created");
        Ok(KafkaTarget {
            id: target_id,
            args,
            producer,
            store,
            state: TargetState::new(),
        })
    }
}

#[cfg(feature = "kafka")]
fn map_kafka_error(e: KafkaError) -> TargetError {
    match e.rdkafka_error_code() {
        Some(RDKafkaErrorCode::MessageTimedOut) | Some(RDKafkaErrorCode::QueueFull) => TargetError::Timeout(e.to_string()),
        Some(RDKafkaErrorCode::AllBrokersDown) | Some(RDKafkaErrorCode::BrokerTransportFailure) => TargetError::NotConnected,
        Some(RDKafkaErrorCode::Authentication) | Some(RDKafkaErrorCode::SaslAuthenticationFailed) => {
            TargetError::Authentication(e.to_string())
        }
        _ => TargetError::Request(format!("Kafka produce failed: {e}")),
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl<E> Target<E> for KafkaTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    fn id(&self) -> TargetID {
        self.id.clone()
    }

    async fn is_active(&self) -> Result<bool, TargetError> {
        self.args.ping_brokers().await?;
        Ok(true)
    }

    /// Resolves once the broker acknowledged the record.
    #[instrument(skip(self, entity), fields(target_id = %self.id))]
    async fn send(&self, entity: &EntityTarget<E>) -> Result<(), TargetError> {
        let key = entity.key()?;
        let payload = TargetLog::from_entity(entity)?.to_vec()?;
        let record = FutureRecord::to(&self.args.topic).key(key.as_str()).payload(payload.as_slice());

        match self.producer.send(record, Timeout::After(DELIVERY_TIMEOUT)).await {
            Ok(_) => {
                debug!(target_id = %self.id, topic = %self.args.topic, key = %key, "Event produced to Kafka topic");
                Ok(())
            }
            Err((e, _)) => {
                warn!(target_id = %self.id, error = %e, "Kafka delivery failed");
                Err(map_kafka_error(e))
            }
        }
    }

    fn store(&self) -> Option<&TargetStore<E>> {
        self.store.as_deref()
    }

    fn state(&self) -> &TargetState {
        &self.state
    }

    async fn release(&self) -> Result<(), TargetError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
            .await
            .map_err(|e| TargetError::Request(format!("Kafka flush task failed: {e}")))?
            .map_err(|e| TargetError::Timeout(format!("Kafka flush did not finish: {e}")))
    }
}
