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

use crate::config::{EnvSnapshot, is_enabled, merge_targets};
use crate::error::{BootstrapFailures, NotificationError};
use crate::factory::{ElasticsearchTargetFactory, KafkaTargetFactory, MQTTTargetFactory, NATSTargetFactory, TargetFactory};
use crate::notifier::{SharedTarget, TargetList};
use rustfs_config::notify::{
    NOTIFY_ES_SUB_SYS, NOTIFY_KAFKA_SUB_SYS, NOTIFY_MQTT_SUB_SYS, NOTIFY_NATS_SUB_SYS, NOTIFY_ROUTE_PREFIX,
};
use rustfs_config::{Config, DEFAULT_TARGET, DefaultKvs, KVS, SUB_SYSTEM_SEPARATOR, check_valid_keys};
use rustfs_targets::{TargetError, TargetID};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// What registration does with the targets it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapMode {
    /// Stop at the first failure; on success hand the targets to the caller.
    Start,
    /// Attempt every target, report all failures, close everything afterwards.
    Test,
}

/// An enabled instance with its effective configuration.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub sub_sys: String,
    pub instance: String,
    pub id: TargetID,
    pub config: KVS,
}

/// Registry for managing target factories
pub struct TargetRegistry {
    factories: BTreeMap<String, Box<dyn TargetFactory>>,
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetRegistry {
    /// Creates a registry with the built-in NATS, Elasticsearch, MQTT and Kafka factories.
    pub fn new() -> Self {
        let mut registry = TargetRegistry::empty();
        registry.register(NOTIFY_NATS_SUB_SYS, Box::new(NATSTargetFactory));
        registry.register(NOTIFY_ES_SUB_SYS, Box::new(ElasticsearchTargetFactory));
        registry.register(NOTIFY_MQTT_SUB_SYS, Box::new(MQTTTargetFactory));
        registry.register(NOTIFY_KAFKA_SUB_SYS, Box::new(KafkaTargetFactory));
        registry
    }

    pub fn empty() -> Self {
        TargetRegistry {
            factories: BTreeMap::new(),
        }
    }

    /// Registers a factory for a sub-system such as `notify_nats`.
    pub fn register(&mut self, sub_sys: &str, factory: Box<dyn TargetFactory>) {
        self.factories.insert(sub_sys.to_string(), factory);
    }

    /// Default key/values of every registered sub-system.
    pub fn default_kvs(&self) -> DefaultKvs {
        self.factories
            .iter()
            .map(|(sub_sys, factory)| (sub_sys.clone(), factory.default_kvs()))
            .collect()
    }

    /// Resolves every enabled instance across all registered sub-systems, ordered by
    /// sub-system then instance.
    ///
    /// Enabled instances of the config document must only use known keys.
    pub fn resolve_targets(&self, config: &Config, env: &EnvSnapshot) -> Result<Vec<ResolvedTarget>, NotificationError> {
        let mut resolved = Vec::new();

        for (sub_sys, factory) in &self.factories {
            let defaults = factory.default_kvs();
            let configured = config.targets(sub_sys);

            if let Some(instances) = configured {
                for (instance, kvs) in instances {
                    if is_enabled(kvs)? {
                        check_valid_keys(&sub_sys_target(sub_sys, instance), kvs, &defaults)?;
                    }
                }
            }

            for (instance, kvs) in merge_targets(sub_sys, configured, &defaults, env) {
                if !is_enabled(&kvs)? {
                    continue;
                }
                resolved.push(ResolvedTarget {
                    id: TargetID::new(instance.clone(), target_kind(sub_sys)),
                    sub_sys: sub_sys.clone(),
                    instance,
                    config: kvs,
                });
            }
        }

        Ok(resolved)
    }

    /// Builds every enabled target.
    ///
    /// `disabled` names targets the caller wants left out; each of them must exist in the
    /// configuration, otherwise nothing is built. Configuration problems are reported before
    /// any target is constructed. If a target fails to construct, every target built so
    /// far is closed before the error is returned.
    #[instrument(skip(self, config, env))]
    pub async fn register_notification_targets(
        &self,
        config: &Config,
        env: &EnvSnapshot,
        disabled: &[TargetID],
        mode: BootstrapMode,
    ) -> Result<TargetList, NotificationError> {
        let resolved = self.resolve_targets(config, env)?;

        let known: HashSet<&TargetID> = resolved.iter().map(|r| &r.id).collect();
        let unknown: Vec<String> = disabled
            .iter()
            .filter(|id| !known.contains(id))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(NotificationError::UnknownTargets(unknown.join(", ")));
        }

        let selected: Vec<&ResolvedTarget> = resolved.iter().filter(|r| !disabled.contains(&r.id)).collect();

        for target in &selected {
            let factory = self.factory(&target.sub_sys)?;
            factory
                .validate_config(&target.instance, &target.config)
                .map_err(|e| NotificationError::Configuration(format!("{}: {e}", target.id)))?;
        }

        let mut list = TargetList::new();
        let mut failures = BootstrapFailures::default();

        for target in selected {
            match self.build(target).await {
                Ok(built) => {
                    if let Err(e) = list.add(Arc::clone(&built)) {
                        warn!(target_id = %target.id, error = %e, "Refusing duplicate target");
                        if let Err(close_err) = built.close().await {
                            warn!(target_id = %target.id, error = %close_err, "Failed to close duplicate target");
                        }
                        failures.push(target.id.clone(), TargetError::Configuration(e.to_string()));
                    } else {
                        info!(target_id = %target.id, "Target initialized");
                    }
                }
                Err(e) => {
                    error!(target_id = %target.id, error = %e, "Failed to initialize target");
                    failures.push(target.id.clone(), e);
                }
            }

            if mode == BootstrapMode::Start && !failures.is_empty() {
                break;
            }
        }

        if !failures.is_empty() {
            let closed = list.len();
            for (id, e) in list.close_all().await {
                warn!(target_id = %id, error = %e, "Failed to close target during rollback");
            }
            warn!(closed, failed = failures.len(), "Target registration rolled back");
            return Err(NotificationError::Bootstrap(failures));
        }

        if mode == BootstrapMode::Test {
            for (id, e) in list.close_all().await {
                warn!(target_id = %id, error = %e, "Failed to close tested target");
            }
        }

        Ok(list)
    }

    /// Builds the live target set.
    pub async fn get_notification_targets(&self, config: &Config, env: &EnvSnapshot) -> Result<TargetList, NotificationError> {
        self.register_notification_targets(config, env, &[], BootstrapMode::Start)
            .await
    }

    /// Checks that every enabled target except `disabled` can be built, then closes them.
    pub async fn test_notification_targets(
        &self,
        config: &Config,
        env: &EnvSnapshot,
        disabled: &[TargetID],
    ) -> Result<(), NotificationError> {
        self.register_notification_targets(config, env, disabled, BootstrapMode::Test)
            .await
            .map(|_| ())
    }

    fn factory(&self, sub_sys: &str) -> Result<&dyn TargetFactory, NotificationError> {
        self.factories
            .get(sub_sys)
            .map(|f| f.as_ref())
            .ok_or_else(|| NotificationError::Configuration(format!("unknown sub-system '{sub_sys}'")))
    }

    async fn build(&self, target: &ResolvedTarget) -> Result<SharedTarget, TargetError> {
        let factory = self
            .factories
            .get(&target.sub_sys)
            .ok_or_else(|| TargetError::Configuration(format!("unknown sub-system '{}'", target.sub_sys)))?;
        let built = factory.create_target(target.instance.clone(), &target.config).await?;
        Ok(Arc::from(built))
    }
}

/// `nats` for `notify_nats`.
fn target_kind(sub_sys: &str) -> &str {
    sub_sys.strip_prefix(NOTIFY_ROUTE_PREFIX).unwrap_or(sub_sys)
}

/// Names an instance in diagnostics, e.g. `notify_nats:primary`.
fn sub_sys_target(sub_sys: &str, instance: &str) -> String {
    if instance == DEFAULT_TARGET {
        sub_sys.to_string()
    } else {
        format!("{sub_sys}{SUB_SYSTEM_SEPARATOR}{instance}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfs_config::ConfigError;
    use rustfs_config::notify::{ENABLE_KEY, NATS_ADDRESS, NATS_SUBJECT};

    fn nats(enable: &str) -> KVS {
        KVS::from_iter([(ENABLE_KEY, enable), (NATS_ADDRESS, "127.0.0.1:4222"), (NATS_SUBJECT, "events")])
    }

    #[test]
    fn test_target_kind_and_diagnostic_name() {
        assert_eq!(target_kind(NOTIFY_NATS_SUB_SYS), "nats");
        assert_eq!(target_kind(NOTIFY_ES_SUB_SYS), "elasticsearch");
        assert_eq!(sub_sys_target(NOTIFY_NATS_SUB_SYS, "_"), "notify_nats");
        assert_eq!(sub_sys_target(NOTIFY_NATS_SUB_SYS, "primary"), "notify_nats:primary");
    }

    #[test]
    fn test_default_kvs_per_sub_system() {
        let defaults = TargetRegistry::new().default_kvs();
        assert_eq!(defaults.len(), 4);
        assert_eq!(defaults[NOTIFY_NATS_SUB_SYS].get(ENABLE_KEY), "off");
        assert!(defaults[NOTIFY_MQTT_SUB_SYS].lookup("broker").is_some());
        assert!(defaults[NOTIFY_KAFKA_SUB_SYS].lookup("brokers").is_some());
    }

    #[test]
    fn test_resolve_only_enabled_in_order() {
        let mut config = Config::new();
        config.set(NOTIFY_NATS_SUB_SYS, "zeta", nats("on"));
        config.set(NOTIFY_NATS_SUB_SYS, "alpha", nats("on"));
        config.set(NOTIFY_NATS_SUB_SYS, "off", nats("off"));

        let resolved = TargetRegistry::new().resolve_targets(&config, &EnvSnapshot::new()).unwrap();
        let ids: Vec<String> = resolved.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["alpha:nats", "zeta:nats"]);
        assert_eq!(resolved[0].config.get(NATS_SUBJECT), "events");
    }

    #[test]
    fn test_resolve_rejects_unknown_keys_on_enabled_instances() {
        let mut config = Config::new();
        let mut kvs = nats("on");
        kvs.insert("adress", "typo");
        config.set(NOTIFY_NATS_SUB_SYS, "primary", kvs);

        let err = TargetRegistry::new()
            .resolve_targets(&config, &EnvSnapshot::new())
            .unwrap_err();
        match err {
            NotificationError::Config(ConfigError::InvalidKeys { sub_sys, keys }) => {
                assert_eq!(sub_sys, "notify_nats:primary");
                assert_eq!(keys, "adress");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_keys_on_disabled_instances_are_tolerated() {
        let mut config = Config::new();
        let mut kvs = nats("off");
        kvs.insert("legacy_field", "x");
        config.set(NOTIFY_NATS_SUB_SYS, "old", kvs);

        let resolved = TargetRegistry::new().resolve_targets(&config, &EnvSnapshot::new()).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_env_enables_instance() {
        let env: EnvSnapshot = [
            ("RUSTFS_NOTIFY_NATS_ENABLE_EDGE", "on"),
            ("RUSTFS_NOTIFY_NATS_ADDRESS_EDGE", "127.0.0.1:4222"),
            ("RUSTFS_NOTIFY_NATS_SUBJECT_EDGE", "edge"),
        ]
        .into_iter()
        .collect();

        let resolved = TargetRegistry::new().resolve_targets(&Config::new(), &env).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, TargetID::new("edge", "nats"));
        assert_eq!(resolved[0].config.get(NATS_SUBJECT), "edge");
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_construction() {
        let mut config = Config::new();
        config.set(
            NOTIFY_NATS_SUB_SYS,
            "primary",
            KVS::from_iter([(ENABLE_KEY, "on"), (NATS_ADDRESS, "no-port"), (NATS_SUBJECT, "events")]),
        );

        let err = TargetRegistry::new()
            .get_notification_targets(&config, &EnvSnapshot::new())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Configuration(ref msg) if msg.starts_with("primary:nats")), "{err}");
    }
}
