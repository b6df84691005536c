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

//! Environment overlay for notification target configuration.
//!
//! Every key of a sub-system instance can be set through
//! `RUSTFS_<SUB_SYS>_<KEY>[_<INSTANCE>]`, e.g. `RUSTFS_NOTIFY_NATS_ADDRESS_PRIMARY`. The
//! default instance (`_`) has no suffix. Instances can be declared from the environment
//! alone through their enable variable.

use rustfs_config::notify::{ENABLE_KEY, ENV_NOTIFY_PREFIX};
use rustfs_config::{ConfigError, DEFAULT_DELIMITER, DEFAULT_TARGET, ENV_PREFIX, KVS, parse_bool};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A frozen copy of the notification-related environment.
///
/// Resolution reads from a snapshot rather than the live process environment so one
/// bootstrap sees one consistent view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures every `RUSTFS_NOTIFY_*` variable of the current process.
    pub fn from_process() -> Self {
        std::env::vars().filter(|(k, _)| k.starts_with(ENV_NOTIFY_PREFIX)).collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Instances declared through `enable_env` or `enable_env_<INSTANCE>`, lowercased.
    pub fn instances(&self, enable_env: &str) -> BTreeSet<String> {
        self.vars
            .keys()
            .filter_map(|name| {
                if name == enable_env {
                    return Some(DEFAULT_TARGET.to_string());
                }
                name.strip_prefix(enable_env)
                    .and_then(|rest| rest.strip_prefix(DEFAULT_DELIMITER))
                    .filter(|instance| !instance.is_empty())
                    .map(str::to_lowercase)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EnvSnapshot {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// `RUSTFS_<SUB_SYS>_<KEY>`, e.g. `RUSTFS_NOTIFY_MQTT_BROKER`.
pub fn env_name(sub_sys: &str, key: &str) -> String {
    format!("{ENV_PREFIX}{}{DEFAULT_DELIMITER}{}", sub_sys.to_uppercase(), key.to_uppercase())
}

/// Variable name of `key` for one instance of `sub_sys`.
pub fn env_key(sub_sys: &str, key: &str, instance: &str) -> String {
    let base = env_name(sub_sys, key);
    if instance == DEFAULT_TARGET {
        base
    } else {
        format!("{base}{DEFAULT_DELIMITER}{}", instance.to_uppercase())
    }
}

/// Whether an instance is switched on. A missing or empty value means off.
pub fn is_enabled(kvs: &KVS) -> Result<bool, ConfigError> {
    match kvs.lookup(ENABLE_KEY) {
        Some(v) if !v.trim().is_empty() => parse_bool(&v),
        _ => Ok(false),
    }
}

/// Effective configuration of every instance of one sub-system.
///
/// Instances are those of the config document plus those declared in the environment.
/// Each key takes the environment value first, then the document value, then the default.
pub fn merge_targets(
    sub_sys: &str,
    configured: Option<&HashMap<String, KVS>>,
    defaults: &KVS,
    env: &EnvSnapshot,
) -> BTreeMap<String, KVS> {
    let mut instances: BTreeSet<String> = configured.map(|m| m.keys().cloned().collect()).unwrap_or_default();
    instances.extend(env.instances(&env_name(sub_sys, ENABLE_KEY)));

    instances
        .into_iter()
        .map(|instance| {
            let mut kvs = defaults.clone();
            if let Some(doc) = configured.and_then(|m| m.get(&instance)) {
                kvs.extend(doc.clone());
            }
            for key in defaults.keys() {
                if let Some(value) = env.get(&env_key(sub_sys, &key, &instance)) {
                    kvs.insert(key, value);
                }
            }
            (instance, kvs)
        })
        .collect()
}
