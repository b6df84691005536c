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
use crate::config::is_enabled;
use async_trait::async_trait;
use rustfs_config::notify::{
    COMMENT_KEY, ELASTICSEARCH_FORMAT, ELASTICSEARCH_INDEX, ELASTICSEARCH_PASSWORD, ELASTICSEARCH_QUEUE_DIR,
    ELASTICSEARCH_QUEUE_LIMIT, ELASTICSEARCH_URL, ELASTICSEARCH_USERNAME, ENABLE_KEY, FORMAT_NAMESPACE, KAFKA_BROKERS,
    KAFKA_CLIENT_TLS_CERT, KAFKA_CLIENT_TLS_KEY, KAFKA_QUEUE_DIR, KAFKA_QUEUE_LIMIT, KAFKA_SASL, KAFKA_SASL_MECHANISM,
    KAFKA_SASL_PASSWORD, KAFKA_SASL_USERNAME, KAFKA_TLS, KAFKA_TLS_CLIENT_AUTH, KAFKA_TLS_SKIP_VERIFY, KAFKA_TOPIC, KAFKA_VERSION,
    MQTT_BROKER, MQTT_KEEP_ALIVE_INTERVAL, MQTT_PASSWORD, MQTT_QOS, MQTT_QUEUE_DIR, MQTT_QUEUE_LIMIT, MQTT_RECONNECT_INTERVAL,
    MQTT_TOPIC, MQTT_USERNAME, NATS_ADDRESS, NATS_CERT_AUTHORITY, NATS_CLIENT_CERT, NATS_CLIENT_KEY, NATS_PASSWORD,
    NATS_PING_INTERVAL, NATS_QUEUE_DIR, NATS_QUEUE_LIMIT, NATS_STREAMING, NATS_STREAMING_ASYNC, NATS_STREAMING_CLUSTER_ID,
    NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT, NATS_SUBJECT, NATS_TLS, NATS_TOKEN, NATS_USERNAME,
};
use rustfs_config::{DEFAULT_DIR, DEFAULT_LIMIT, ENABLE_OFF, KVS, parse_bool};
use rustfs_targets::target::elasticsearch::{ElasticsearchArgs, ElasticsearchTarget};
#[cfg(feature = "kafka")]
use rustfs_targets::target::kafka::KafkaTarget;
use rustfs_targets::target::kafka::{KafkaArgs, SaslMechanism, parse_brokers};
use rustfs_targets::target::mqtt::{MQTTArgs, MQTTTarget, parse_qos};
use rustfs_targets::target::nats::{NATSArgs, NATSStreamingArgs, NATSTarget};
use rustfs_targets::{EventFormat, Target, TargetError};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Trait for creating targets from configuration
#[async_trait]
pub trait TargetFactory: Send + Sync {
    /// Creates a target from its merged configuration
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError>;

    /// Validates target configuration without touching the network or the disk
    fn validate_config(&self, id: &str, config: &KVS) -> Result<(), TargetError>;

    /// Every key this target kind accepts, with its default value.
    fn default_kvs(&self) -> KVS;
}

fn lookup_bool(config: &KVS, key: &str) -> Result<bool, TargetError> {
    match config.lookup(key) {
        Some(v) if !v.trim().is_empty() => parse_bool(&v).map_err(|e| TargetError::Configuration(format!("{key}: {e}"))),
        _ => Ok(false),
    }
}

fn lookup_u64(config: &KVS, key: &str, default: u64) -> Result<u64, TargetError> {
    match config.lookup(key) {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<u64>()
            .map_err(|_| TargetError::Configuration(format!("{key}: invalid number '{v}'"))),
        _ => Ok(default),
    }
}

/// Parses `500ms`, `10s`, `2m`, `1h` or a bare number of seconds.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => value.split_at(pos),
        None => (value, "s"),
    };
    let n = digits.parse::<u64>().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" => Some(Duration::from_secs(n)),
        "m" => n.checked_mul(60).map(Duration::from_secs),
        "h" => n.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

fn lookup_duration(config: &KVS, key: &str, default: Duration) -> Result<Duration, TargetError> {
    match config.lookup(key) {
        Some(v) if !v.trim().is_empty() => {
            parse_duration(&v).ok_or_else(|| TargetError::Configuration(format!("{key}: invalid duration '{v}'")))
        }
        _ => Ok(default),
    }
}

fn lookup_queue_limit(config: &KVS, key: &str) -> Result<u64, TargetError> {
    let limit = lookup_u64(config, key, DEFAULT_LIMIT)?;
    Ok(if limit == 0 { DEFAULT_LIMIT } else { limit })
}

pub fn nats_args_from(config: &KVS) -> Result<NATSArgs, TargetError> {
    Ok(NATSArgs {
        enable: enabled(config)?,
        address: config.get(NATS_ADDRESS),
        subject: config.get(NATS_SUBJECT),
        username: config.get(NATS_USERNAME),
        password: config.get(NATS_PASSWORD),
        token: config.get(NATS_TOKEN),
        tls: lookup_bool(config, NATS_TLS)?,
        cert_authority: config.get(NATS_CERT_AUTHORITY),
        client_cert: config.get(NATS_CLIENT_CERT),
        client_key: config.get(NATS_CLIENT_KEY),
        ping_interval: lookup_duration(config, NATS_PING_INTERVAL, Duration::ZERO)?,
        streaming: NATSStreamingArgs {
            enable: lookup_bool(config, NATS_STREAMING)?,
            cluster_id: config.get(NATS_STREAMING_CLUSTER_ID),
            r#async: lookup_bool(config, NATS_STREAMING_ASYNC)?,
            max_pub_acks_in_flight: usize::try_from(lookup_u64(config, NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT, 0)?).map_err(|_| {
                TargetError::Configuration(format!("{NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT}: value out of range"))
            })?,
        },
        queue_dir: config.lookup(NATS_QUEUE_DIR).unwrap_or(DEFAULT_DIR.to_string()),
        queue_limit: lookup_queue_limit(config, NATS_QUEUE_LIMIT)?,
    })
}

pub fn elasticsearch_args_from(config: &KVS) -> Result<ElasticsearchArgs, TargetError> {
    let url = config.get(ELASTICSEARCH_URL);
    let url = Url::parse(url.trim())
        .map_err(|e| TargetError::Configuration(format!("Invalid Elasticsearch URL: {e} (value: '{url}')")))?;
    let format = match config.lookup(ELASTICSEARCH_FORMAT) {
        Some(v) if !v.trim().is_empty() => v.trim().parse::<EventFormat>()?,
        _ => EventFormat::default(),
    };

    Ok(ElasticsearchArgs {
        enable: enabled(config)?,
        format,
        url,
        index: config.get(ELASTICSEARCH_INDEX),
        username: config.get(ELASTICSEARCH_USERNAME),
        password: config.get(ELASTICSEARCH_PASSWORD),
        queue_dir: config.lookup(ELASTICSEARCH_QUEUE_DIR).unwrap_or(DEFAULT_DIR.to_string()),
        queue_limit: lookup_queue_limit(config, ELASTICSEARCH_QUEUE_LIMIT)?,
    })
}

pub fn mqtt_args_from(config: &KVS) -> Result<MQTTArgs, TargetError> {
    let broker = config.get(MQTT_BROKER);
    let broker = Url::parse(broker.trim())
        .map_err(|e| TargetError::Configuration(format!("Invalid broker URL: {e} (value: '{broker}')")))?;
    let qos = match config.lookup(MQTT_QOS) {
        Some(v) if !v.trim().is_empty() => parse_qos(&v)?,
        _ => parse_qos("0")?,
    };

    Ok(MQTTArgs {
        enable: enabled(config)?,
        broker,
        topic: config.get(MQTT_TOPIC),
        qos,
        username: config.get(MQTT_USERNAME),
        password: config.get(MQTT_PASSWORD),
        max_reconnect_interval: lookup_duration(config, MQTT_RECONNECT_INTERVAL, Duration::from_secs(5))?,
        keep_alive: lookup_duration(config, MQTT_KEEP_ALIVE_INTERVAL, Duration::from_secs(10))?,
        queue_dir: config.lookup(MQTT_QUEUE_DIR).unwrap_or(DEFAULT_DIR.to_string()),
        queue_limit: lookup_queue_limit(config, MQTT_QUEUE_LIMIT)?,
    })
}

pub fn kafka_args_from(config: &KVS) -> Result<KafkaArgs, TargetError> {
    let tls_client_auth = lookup_u64(config, KAFKA_TLS_CLIENT_AUTH, 0)?;
    let sasl_mechanism = match config.lookup(KAFKA_SASL_MECHANISM) {
        Some(v) => v.parse::<SaslMechanism>()?,
        None => SaslMechanism::default(),
    };

    Ok(KafkaArgs {
        enable: enabled(config)?,
        brokers: parse_brokers(&config.get(KAFKA_BROKERS)),
        topic: config.get(KAFKA_TOPIC),
        tls: lookup_bool(config, KAFKA_TLS)?,
        tls_skip_verify: lookup_bool(config, KAFKA_TLS_SKIP_VERIFY)?,
        tls_client_auth: u8::try_from(tls_client_auth)
            .map_err(|_| TargetError::Configuration(format!("{KAFKA_TLS_CLIENT_AUTH}: value out of range")))?,
        client_tls_cert: config.get(KAFKA_CLIENT_TLS_CERT),
        client_tls_key: config.get(KAFKA_CLIENT_TLS_KEY),
        sasl: lookup_bool(config, KAFKA_SASL)?,
        sasl_username: config.get(KAFKA_SASL_USERNAME),
        sasl_password: config.get(KAFKA_SASL_PASSWORD),
        sasl_mechanism,
        version: config.get(KAFKA_VERSION),
        queue_dir: config.lookup(KAFKA_QUEUE_DIR).unwrap_or(DEFAULT_DIR.to_string()),
        queue_limit: lookup_queue_limit(config, KAFKA_QUEUE_LIMIT)?,
    })
}

fn with_common_defaults<const N: usize>(pairs: [(&str, &str); N], queue_dir_key: &str, queue_limit_key: &str) -> KVS {
    let mut kvs = KVS::from_iter([(ENABLE_KEY, ENABLE_OFF)]);
    kvs.extend(KVS::from_iter(pairs));
    kvs.insert(queue_dir_key, DEFAULT_DIR);
    kvs.insert(queue_limit_key, DEFAULT_LIMIT.to_string());
    kvs.insert(COMMENT_KEY, "");
    kvs
}

fn enabled(config: &KVS) -> Result<bool, TargetError> {
    is_enabled(config).map_err(|e| TargetError::Configuration(e.to_string()))
}

/// Factory for creating NATS targets
pub struct NATSTargetFactory;

#[async_trait]
impl TargetFactory for NATSTargetFactory {
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError> {
        let args = nats_args_from(config)?;
        let target = NATSTarget::<Event>::new(id, args)?;
        Ok(Box::new(target))
    }

    fn validate_config(&self, id: &str, config: &KVS) -> Result<(), TargetError> {
        if !enabled(config)? {
            return Ok(());
        }
        let args = nats_args_from(config)?;
        debug!(target_id = id, address = %args.address, "Validating NATS target");
        args.validate()
    }

    fn default_kvs(&self) -> KVS {
        with_common_defaults(
            [
                (NATS_ADDRESS, ""),
                (NATS_SUBJECT, ""),
                (NATS_USERNAME, ""),
                (NATS_PASSWORD, ""),
                (NATS_TOKEN, ""),
                (NATS_TLS, ENABLE_OFF),
                (NATS_CERT_AUTHORITY, ""),
                (NATS_CLIENT_CERT, ""),
                (NATS_CLIENT_KEY, ""),
                (NATS_PING_INTERVAL, "0"),
                (NATS_STREAMING, ENABLE_OFF),
                (NATS_STREAMING_CLUSTER_ID, ""),
                (NATS_STREAMING_ASYNC, ENABLE_OFF),
                (NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT, "0"),
            ],
            NATS_QUEUE_DIR,
            NATS_QUEUE_LIMIT,
        )
    }
}

/// Factory for creating Elasticsearch targets
pub struct ElasticsearchTargetFactory;

#[async_trait]
impl TargetFactory for ElasticsearchTargetFactory {
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError> {
        let args = elasticsearch_args_from(config)?;
        let target = ElasticsearchTarget::<Event>::new(id, args)?;
        Ok(Box::new(target))
    }

    fn validate_config(&self, id: &str, config: &KVS) -> Result<(), TargetError> {
        if !enabled(config)? {
            return Ok(());
        }
        let args = elasticsearch_args_from(config)?;
        debug!(target_id = id, url = %args.url, "Validating Elasticsearch target");
        args.validate()
    }

    fn default_kvs(&self) -> KVS {
        with_common_defaults(
            [
                (ELASTICSEARCH_URL, ""),
                (ELASTICSEARCH_INDEX, ""),
                (ELASTICSEARCH_FORMAT, FORMAT_NAMESPACE),
                (ELASTICSEARCH_USERNAME, ""),
                (ELASTICSEARCH_PASSWORD, ""),
            ],
            ELASTICSEARCH_QUEUE_DIR,
            ELASTICSEARCH_QUEUE_LIMIT,
        )
    }
}

/// Factory for creating MQTT targets
pub struct MQTTTargetFactory;

#[async_trait]
impl TargetFactory for MQTTTargetFactory {
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError> {
        let args = mqtt_args_from(config)?;
        let target = MQTTTarget::<Event>::new(id, args)?;
        Ok(Box::new(target))
    }

    fn validate_config(&self, id: &str, config: &KVS) -> Result<(), TargetError> {
        if !enabled(config)? {
            return Ok(());
        }
        let args = mqtt_args_from(config)?;
        debug!(target_id = id, broker = %args.broker, "Validating MQTT target");
        args.validate()
    }

    fn default_kvs(&self) -> KVS {
        with_common_defaults(
            [
                (MQTT_BROKER, ""),
                (MQTT_TOPIC, ""),
                (MQTT_QOS, "0"),
                (MQTT_USERNAME, ""),
                (MQTT_PASSWORD, ""),
                (MQTT_RECONNECT_INTERVAL, "5s"),
                (MQTT_KEEP_ALIVE_INTERVAL, "10s"),
            ],
            MQTT_QUEUE_DIR,
            MQTT_QUEUE_LIMIT,
        )
    }
}

/// Factory for creating Kafka targets
pub struct KafkaTargetFactory;

#[async_trait]
impl TargetFactory for KafkaTargetFactory {
    #[cfg(feature = "kafka")]
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError> {
        let args = kafka_args_from(config)?;
        let target = KafkaTarget::<Event>::new(id, args)?;
        Ok(Box::new(target))
    }

    #[cfg(not(feature = "kafka"))]
    async fn create_target(&self, id: String, config: &KVS) -> Result<Box<dyn Target<Event> + Send + Sync>, TargetError> {
        kafka_args_from(config)?.validate()?;
        debug!(target_id = %id, "Kafka support is not compiled in");
        Err(TargetError::FeatureDisabled("kafka"))
    }

    fn validate_config(&self, id: &str, config: &KVS) -> Result<(), TargetError> {
        if !enabled(config)? {
            return Ok(());
        }
        let args = kafka_args_from(config)?;
        debug!(target_id = id, brokers = %args.brokers.join(","), "Validating Kafka target");
        args.validate()
    }

    fn default_kvs(&self) -> KVS {
        with_common_defaults(
            [
                (KAFKA_BROKERS, ""),
                (KAFKA_TOPIC, ""),
                (KAFKA_TLS, ENABLE_OFF),
                (KAFKA_TLS_SKIP_VERIFY, ENABLE_OFF),
                (KAFKA_TLS_CLIENT_AUTH, "0"),
                (KAFKA_SASL, ENABLE_OFF),
                (KAFKA_SASL_USERNAME, ""),
                (KAFKA_SASL_PASSWORD, ""),
                (KAFKA_SASL_MECHANISM, "plain"),
                (KAFKA_CLIENT_TLS_CERT, ""),
                (KAFKA_CLIENT_TLS_KEY, ""),
                (KAFKA_VERSION, ""),
            ],
            KAFKA_QUEUE_DIR,
            KAFKA_QUEUE_LIMIT,
        )
    }
}
