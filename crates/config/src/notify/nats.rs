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

// NATS Keys
pub const NATS_ADDRESS: &str = "address";
pub const NATS_SUBJECT: &str = "subject";
pub const NATS_USERNAME: &str = "username";
pub const NATS_PASSWORD: &str = "password";
pub const NATS_TOKEN: &str = "token";
pub const NATS_TLS: &str = "tls";
pub const NATS_CERT_AUTHORITY: &str = "cert_authority";
pub const NATS_CLIENT_CERT: &str = "client_cert";
pub const NATS_CLIENT_KEY: &str = "client_key";
pub const NATS_PING_INTERVAL: &str = "ping_interval";
pub const NATS_STREAMING: &str = "streaming";
pub const NATS_STREAMING_CLUSTER_ID: &str = "streaming_cluster_id";
pub const NATS_STREAMING_ASYNC: &str = "streaming_async";
pub const NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT: &str = "streaming_max_pub_acks_in_flight";
pub const NATS_QUEUE_DIR: &str = "queue_dir";
pub const NATS_QUEUE_LIMIT: &str = "queue_limit";

/// A list of all valid configuration keys for a NATS target.
pub const NOTIFY_NATS_KEYS: &[&str] = &[
    ENABLE_KEY,
    NATS_ADDRESS,
    NATS_SUBJECT,
    NATS_USERNAME,
    NATS_PASSWORD,
    NATS_TOKEN,
    NATS_TLS,
    NATS_CERT_AUTHORITY,
    NATS_CLIENT_CERT,
    NATS_CLIENT_KEY,
    NATS_PING_INTERVAL,
    NATS_STREAMING,
    NATS_STREAMING_CLUSTER_ID,
    NATS_STREAMING_ASYNC,
    NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT,
    NATS_QUEUE_DIR,
    NATS_QUEUE_LIMIT,
    COMMENT_KEY,
];

// NATS Environment Variables
pub const ENV_NATS_PREFIX: &str = const_str::concat!(ENV_NOTIFY_PREFIX, "NATS_");
pub const ENV_NATS_ENABLE: &str = const_str::concat!(ENV_NATS_PREFIX, "ENABLE");
pub const ENV_NATS_ADDRESS: &str = const_str::concat!(ENV_NATS_PREFIX, "ADDRESS");
pub const ENV_NATS_SUBJECT: &str = const_str::concat!(ENV_NATS_PREFIX, "SUBJECT");
pub const ENV_NATS_USERNAME: &str = const_str::concat!(ENV_NATS_PREFIX, "USERNAME");
pub const ENV_NATS_PASSWORD: &str = const_str::concat!(ENV_NATS_PREFIX, "PASSWORD");
pub const ENV_NATS_TOKEN: &str = const_str::concat!(ENV_NATS_PREFIX, "TOKEN");
pub const ENV_NATS_TLS: &str = const_str::concat!(ENV_NATS_PREFIX, "TLS");
pub const ENV_NATS_CERT_AUTHORITY: &str = const_str::concat!(ENV_NATS_PREFIX, "CERT_AUTHORITY");
pub const ENV_NATS_CLIENT_CERT: &str = const_str::concat!(ENV_NATS_PREFIX, "CLIENT_CERT");
pub const ENV_NATS_CLIENT_KEY: &str = const_str::concat!(ENV_NATS_PREFIX, "CLIENT_KEY");
pub const ENV_NATS_PING_INTERVAL: &str = const_str::concat!(ENV_NATS_PREFIX, "PING_INTERVAL");
pub const ENV_NATS_STREAMING: &str = const_str::concat!(ENV_NATS_PREFIX, "STREAMING");
pub const ENV_NATS_STREAMING_CLUSTER_ID: &str = const_str::concat!(ENV_NATS_PREFIX, "STREAMING_CLUSTER_ID");
pub const ENV_NATS_STREAMING_ASYNC: &str = const_str::concat!(ENV_NATS_PREFIX, "STREAMING_ASYNC");
pub const ENV_NATS_STREAMING_MAX_PUB_ACKS_IN_FLIGHT: &str =
    const_str::concat!(ENV_NATS_PREFIX, "STREAMING_MAX_PUB_ACKS_IN_FLIGHT");
pub const ENV_NATS_QUEUE_DIR: &str = const_str::concat!(ENV_NATS_PREFIX, "QUEUE_DIR");
pub const ENV_NATS_QUEUE_LIMIT: &str = const_str::concat!(ENV_NATS_PREFIX, "QUEUE_LIMIT");
