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

//! Keys, sub-system names and environment variable names for event notification targets.

pub mod elasticsearch;
pub mod kafka;
pub mod mqtt;
pub mod nats;
pub mod store;

pub use elasticsearch::*;
pub use kafka::*;
pub use mqtt::*;
pub use nats::*;
pub use store::*;

use crate::ENV_PREFIX;

/// Key that switches a target instance on or off.
pub const ENABLE_KEY: &str = "enable";
/// Free-form operator comment, accepted by every sub-system.
pub const COMMENT_KEY: &str = "comment";

pub const NOTIFY_PREFIX: &str = "notify";
pub const NOTIFY_ROUTE_PREFIX: &str = "notify_";

pub const NOTIFY_NATS_SUB_SYS: &str = "notify_nats";
pub const NOTIFY_ES_SUB_SYS: &str = "notify_elasticsearch";
pub const NOTIFY_MQTT_SUB_SYS: &str = "notify_mqtt";
pub const NOTIFY_KAFKA_SUB_SYS: &str = "notify_kafka";

pub const NOTIFY_SUB_SYSTEMS: &[&str] = &[
    NOTIFY_NATS_SUB_SYS,
    NOTIFY_ES_SUB_SYS,
    NOTIFY_MQTT_SUB_SYS,
    NOTIFY_KAFKA_SUB_SYS,
];

/// Every notification environment variable starts with this prefix.
pub const ENV_NOTIFY_PREFIX: &str = const_str::concat!(ENV_PREFIX, "NOTIFY_");
