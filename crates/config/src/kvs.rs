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

use crate::notify::COMMENT_KEY;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while reading or validating notification configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("found invalid keys ({keys}) for '{sub_sys}' sub-system")]
    InvalidKeys { sub_sys: String, keys: String },

    #[error("invalid boolean value '{0}', expected one of on/off/true/false/yes/no/1/0")]
    InvalidBool(String),

    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct KV {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub hidden_if_empty: bool,
}

/// An ordered list of key/value pairs describing one sub-system instance.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct KVS(pub Vec<KV>);

impl KVS {
    pub fn new() -> Self {
        KVS(Vec::new())
    }

    /// Returns the value for `key`, or an empty string.
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        self.0.iter().find(|kv| kv.key == key).map(|kv| kv.value.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|kv| kv.key.clone()).collect()
    }

    /// Insert or update a pair of key/values in KVS
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(kv) = self.0.iter_mut().find(|kv| kv.key == key) {
            kv.value = value;
            return;
        }
        self.0.push(KV {
            key,
            value,
            hidden_if_empty: false,
        });
    }

    /// Merge all entries from another KVS to the current instance, overriding existing keys.
    pub fn extend(&mut self, other: KVS) {
        for KV { key, value, .. } in other.0 {
            self.insert(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KVS {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut kvs = KVS::new();
        for (k, v) in iter {
            kvs.insert(k, v);
        }
        kvs
    }
}

/// Read-only table of default key/values, keyed by sub-system name.
pub type DefaultKvs = HashMap<String, KVS>;

/// Server configuration document: sub-system -> instance -> key/values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Config(pub HashMap<String, HashMap<String, KVS>>);

impl Config {
    pub fn new() -> Self {
        Config(HashMap::new())
    }

    pub fn get_value(&self, sub_sys: &str, instance: &str) -> Option<KVS> {
        self.0.get(sub_sys).and_then(|m| m.get(instance)).cloned()
    }

    /// Returns every configured instance of `sub_sys`.
    pub fn targets(&self, sub_sys: &str) -> Option<&HashMap<String, KVS>> {
        self.0.get(sub_sys)
    }

    pub fn set(&mut self, sub_sys: impl Into<String>, instance: impl Into<String>, kvs: KVS) {
        self.0.entry(sub_sys.into()).or_default().insert(instance.into(), kvs);
    }

    pub fn unmarshal(data: &[u8]) -> Result<Config, ConfigError> {
        let m: HashMap<String, HashMap<String, KVS>> = serde_json::from_slice(data)?;
        Ok(Config(m))
    }

    pub fn marshal(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

/// Checks that every key of `kvs` is known to the sub-system's default table.
///
/// `sub_sys_target` only names the instance in the error, e.g. `notify_nats:primary`.
pub fn check_valid_keys(sub_sys_target: &str, kvs: &KVS, valid: &KVS) -> Result<(), ConfigError> {
    let unknown: Vec<&str> = kvs
        .0
        .iter()
        .map(|kv| kv.key.as_str())
        .filter(|key| *key != COMMENT_KEY && valid.lookup(key).is_none())
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }
    Err(ConfigError::InvalidKeys {
        sub_sys: sub_sys_target.to_string(),
        keys: unknown.join(","),
    })
}

pub fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_overrides_existing_key() {
        let mut kvs = KVS::new();
        kvs.insert("enable", "off");
        kvs.insert("address", "localhost:4222");
        kvs.insert("enable", "on");

        assert_eq!(kvs.len(), 2);
        assert_eq!(kvs.get("enable"), "on");
        assert_eq!(kvs.keys(), vec!["enable".to_string(), "address".to_string()]);
        assert_eq!(kvs.lookup("missing"), None);
    }

    #[test]
    fn test_extend_prefers_other() {
        let mut base: KVS = [("enable", "off"), ("queue_limit", "100000")].into_iter().collect();
        base.extend([("enable", "on")].into_iter().collect());
        assert_eq!(base.get("enable"), "on");
        assert_eq!(base.get("queue_limit"), "100000");
    }

    #[test]
    fn test_check_valid_keys() {
        let valid: KVS = [("enable", "off"), ("subject", "")].into_iter().collect();
        let ok: KVS = [("enable", "on"), ("subject", "events"), (COMMENT_KEY, "primary bus")]
            .into_iter()
            .collect();
        assert!(check_valid_keys("notify_nats", &ok, &valid).is_ok());

        let bad: KVS = [("enable", "on"), ("subjct", "events"), ("foo", "bar")].into_iter().collect();
        let err = check_valid_keys("notify_nats:primary", &bad, &valid).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("subjct,foo"), "{msg}");
        assert!(msg.contains("notify_nats:primary"), "{msg}");
    }

    #[test]
    fn test_parse_bool() {
        for v in ["on", "TRUE", "yes", "1"] {
            assert!(parse_bool(v).unwrap());
        }
        for v in ["off", "false", "No", "0"] {
            assert!(!parse_bool(v).unwrap());
        }
        assert!(matches!(parse_bool("maybe"), Err(ConfigError::InvalidBool(_))));
    }

    #[test]
    fn test_unmarshal_config_document() {
        let doc = br#"{
            "notify_nats": {
                "_": [{"key": "enable", "value": "on"}, {"key": "address", "value": "localhost:4222"}]
            }
        }"#;
        let cfg = Config::unmarshal(doc).unwrap();
        let kvs = cfg.get_value("notify_nats", "_").unwrap();
        assert_eq!(kvs.get("address"), "localhost:4222");
        assert!(cfg.get_value("notify_mqtt", "_").is_none());
    }
}
