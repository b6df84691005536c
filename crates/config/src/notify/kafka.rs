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

use crate::notify::{COMMENT_KEY, ENABLE_KEY, ENV_NOTIFY_PREFIX};

// Kafka Keys
pub const KAFKA_BROKERS: &str = "brokers";
pub const KAFKA_TOPIC: &str = "topic";
pub const KAFKA_TLS: &str = "tls";
pub const KAFKA_TLS_SKIP_VERIFY: &str = "tls_skip_verify";
pub const KAFKA_TLS_CLIENT_AUTH: &str = "tls_client_auth";
pub const KAFKA_SASL: &str = "sasl";
pub const KAFKA_SASL_USERNAME: &str = "sasl_username";
pub const KAFKA_SASL_PASSWORD: &str = "sasl_password";
pub const KAFKA_SASL_MECHANISM: &str = "sasl_mechanism";
pub const KAFKA_CLIENT_TLS_CERT: &str = "client_tls_cert";
pub const KAFKA_CLIENT_TLS_KEY: &str = "client_tls_key";
pub const KAFKA_VERSION: &str = "version";
pub const KAFKA_QUEUE_DIR: &str = "queue_dir";
pub const KAFKA_QUEUE_LIMIT: &str = "queue_limit";

/// A list of all valid configuration keys for a Kafka target.
pub const NOTIFY_KAFKA_KEYS: &[&str] = &[
    ENABLE_KEY,
    KAFKA_BROKERS,
    KAFKA_TOPIC,
    KAFKA_TLS,
    KAFKA_TLS_SKIP_VERIFY,
    KAFKA_TLS_CLIENT_AUTH,
    KAFKA_SASL,
    KAFKA_SASL_USERNAME,
    KAFKA_SASL_PASSWORD,
    KAFKA_SASL_MECHANISM,
    KAFKA_CLIENT_TLS_CERT,
    KAFKA_CLIENT_TLS_KEY,
    KAFKA_VERSION,
    KAFKA_QUEUE_DIR,
    KAFKA_QUEUE_LIMIT,
    COMMENT_KEY,
];

// Kafka Environment Variables
pub const ENV_KAFKA_PREFIX: &str = const_str::concat!(ENV_NOTIFY_PREFIX, "KAFKA_");
pub const ENV_KAFKA_ENABLE: &str = const_str::concat!(ENV_KAFKA_PREFIX, "ENABLE");
pub const ENV_KAFKA_BROKERS: &str = const_str::concat!(ENV_KAFKA_PREFIX, "BROKERS");
pub const ENV_KAFKA_TOPIC: &str = const_str::concat!(ENV_KAFKA_PREFIX, "TOPIC");
pub const ENV_KAFKA_TLS: &str = const_str::concat!(ENV_KAFKA_PREFIX, "TLS");
pub const ENV_KAFKA_TLS_SKIP_VERIFY: &str = const_str::concat!(ENV_KAFKA_PREFIX, "TLS_SKIP_VERIFY");
pub const ENV_KAFKA_TLS_CLIENT_AUTH: &str = const_str::concat!(ENV_KAFKA_PREFIX, "TLS_CLIENT_AUTH");
pub const ENV_KAFKA_SASL: &str = const_str::concat!(ENV_KAFKA_PREFIX, "SASL");
pub const ENV_KAFKA_SASL_USERNAME: &str = const_str::concat!(ENV_KAFKA_PREFIX, "SASL_USERNAME");
pub const ENV_KAFKA_SASL_PASSWORD: &str = const_str::concat!(ENV_KAFKA_PREFIX, "SASL_PASSWORD");
pub const ENV_KAFKA_SASL_MECHANISM: &str = const_str::concat!(ENV_KAFKA_PREFIX, "SASL_MECHANISM");
pub const ENV_KAFKA_CLIENT_TLS_CERT: &str = const_str::concat!(ENV_KAFKA_PREFIX, "CLIENT_TLS_CERT");
pub const ENV_KAFKA_CLIENT_TLS_KEY: &str = const_str::concat!(ENV_KAFKA_PREFIX, "CLIENT_TLS_KEY");
pub const ENV_KAFKA_VERSION: &str = const_str::concat!(ENV_KAFKA_PREFIX, "VERSION");
pub const ENV_KAFKA_QUEUE_DIR: &str = const_str::concat!(ENV_KAFKA_PREFIX, "QUEUE_DIR");
pub const ENV_KAFKA_QUEUE_LIMIT: &str = const_str::concat!(ENV_KAFKA_PREFIX, "QUEUE_LIMIT");
