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

use crate::check::{DEFAULT_PROBE_TIMEOUT, check_tcp_reachable};
use crate::target::{
    EntityTarget, Target, TargetKind, TargetLog, TargetState, TargetStore, open_queue_store, validate_queue_dir,
};
use crate::{TargetError, TargetID};
use async_nats::connection::State;
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_PUB_ACKS_IN_FLIGHT: usize = 256;

/// Settings for publishing through the persistent stream layer (JetStream).
#[derive(Debug, Clone, Default)]
pub struct NATSStreamingArgs {
    pub enable: bool,
    /// Identifies this publisher to the cluster
    pub cluster_id: String,
    /// Wait for publish acknowledgements in the background
    pub r#async: bool,
    /// Upper bound on unacknowledged publishes in async mode
    pub max_pub_acks_in_flight: usize,
}

/// Arguments for configuring a NATS target
#[derive(Debug, Clone)]
pub struct NATSArgs {
    pub enable: bool,
    /// `host:port` of the NATS server
    pub address: String,
    pub subject: String,
    pub username: String,
    pub password: String,
    pub token: String,
    /// Require TLS on the connection
    pub tls: bool,
    /// PEM file of the CA used to verify the server
    pub cert_authority: String,
    pub client_cert: String,
    pub client_key: String,
    /// Zero keeps the client default
    pub ping_interval: Duration,
    pub streaming: NATSStreamingArgs,
    /// The directory to store events in case of failure
    pub queue_dir: String,
    /// The maximum number of events to store
    pub queue_limit: u64,
}

impl NATSArgs {
    pub fn validate(&self) -> Result<(), TargetError> {
        if !self.enable {
            return Ok(());
        }

        if self.address.is_empty() {
            return Err(TargetError::Configuration("empty address".to_string()));
        }
        match self.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(TargetError::Configuration(format!(
                    "invalid address '{}', expected host:port",
                    self.address
                )));
            }
        }

        if self.subject.is_empty() {
            return Err(TargetError::Configuration("empty subject".to_string()));
        }

        if self.client_cert.is_empty() != self.client_key.is_empty() {
            return Err(TargetError::Configuration("cert and key must be specified as a pair".to_string()));
        }

        if self.username.is_empty() != self.password.is_empty() {
            return Err(TargetError::Configuration(
                "username and password must be specified as a pair".to_string(),
            ));
        }

        if self.streaming.enable && self.streaming.cluster_id.is_empty() {
            return Err(TargetError::Configuration("empty cluster id".to_string()));
        }

        if self.streaming.max_pub_acks_in_flight > Semaphore::MAX_PERMITS {
            return Err(TargetError::Configuration(format!(
                "max pub acks in flight must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }

        validate_queue_dir(TargetKind::Nats, &self.queue_dir)
    }

    fn connect_options(&self) -> ConnectOptions {
        let mut opts = ConnectOptions::new().connection_timeout(CONNECT_TIMEOUT);
        if !self.ping_interval.is_zero() {
            opts = opts.ping_interval(self.ping_interval);
        }
        if !self.username.is_empty() {
            opts = opts.user_and_password(self.username.clone(), self.password.clone());
        }
        if !self.token.is_empty() {
            opts = opts.token(self.token.clone());
        }
        if self.tls {
            opts = opts.require_tls(true);
        }
        if !self.cert_authority.is_empty() {
            opts = opts.add_root_certificates(PathBuf::from(&self.cert_authority));
        }
        if !self.client_cert.is_empty() {
            opts = opts.add_client_certificate(PathBuf::from(&self.client_cert), PathBuf::from(&self.client_key));
        }
        if self.streaming.enable {
            opts = opts.name(self.streaming.cluster_id.clone());
        }
        opts
    }
}

/// A target that publishes events to a NATS subject
pub struct NATSTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    id: TargetID,
    args: NATSArgs,
    client: Mutex<Option<Client>>,
    ack_limiter: Arc<Semaphore>,
    store: Option<Box<TargetStore<E>>>,
    state: TargetState,
}

impl<E> NATSTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    /// Creates a new NATSTarget. The connection is established lazily.
    #[instrument(skip(args), fields(target_id = %id))]
    pub fn new(id: String, args: NATSArgs) -> Result<Self, TargetError> {
        args.validate()?;
        let target_id = TargetID::new(id, TargetKind::Nats.as_str());
        let store = open_queue_store(&args.queue_dir, args.queue_limit, TargetKind::Nats, &target_id)?;

        let max_acks = match args.streaming.max_pub_acks_in_flight {
            0 => DEFAULT_MAX_PUB_ACKS_IN_FLIGHT,
            n => n.min(Semaphore::MAX_PERMITS),
        };

        info!(target_id = %target_id, subject = %args.subject, streaming = args.streaming.enable, "NATS target created");
        Ok(NATSTarget {
            id: target_id,
            args,
            client: Mutex::new(None),
            ack_limiter: Arc::new(Semaphore::new(max_acks)),
            store,
            state: TargetState::new(),
        })
    }

    async fn client(&self) -> Result<Client, TargetError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        debug!(target_id = %self.id, address = %self.args.address, "Connecting to NATS");
        let client = tokio::time::timeout(CONNECT_TIMEOUT, self.args.connect_options().connect(self.args.address.as_str()))
            .await
            .map_err(|_| TargetError::Timeout(format!("connecting to {} timed out", self.args.address)))?
            .map_err(|e| TargetError::Network(format!("failed to connect to {}: {e}", self.args.address)))?;

        info!(target_id = %self.id, "NATS connection established");
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn publish_streaming(&self, client: Client, payload: Vec<u8>) -> Result<(), TargetError> {
        let jetstream = async_nats::jetstream::new(client);
        let ack = jetstream
            .publish(self.args.subject.clone(), payload.into())
            .await
            .map_err(|e| TargetError::Request(format!("JetStream publish failed: {e}")))?;

        if !self.args.streaming.r#async {
            ack.await
                .map_err(|e| TargetError::Request(format!("JetStream ack failed: {e}")))?;
            return Ok(());
        }

        let permit = Arc::clone(&self.ack_limiter)
            .acquire_owned()
            .await
            .map_err(|e| TargetError::Request(format!("ack limiter closed: {e}")))?;
        let target_id = self.id.clone();
        tokio::spawn(async move {
            if let Err(e) = ack.await {
                warn!(target_id = %target_id, error = %e, "JetStream publish was not acknowledged");
            }
            drop(permit);
        });
        Ok(())
    }
}

#[async_trait]
impl<E> Target<E> for NATSTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    fn id(&self) -> TargetID {
        self.id.clone()
    }

    async fn is_active(&self) -> Result<bool, TargetError> {
        check_tcp_reachable(&self.args.address, DEFAULT_PROBE_TIMEOUT).await?;
        let client = self.client().await?;
        Ok(matches!(client.connection_state(), State::Connected))
    }

    #[instrument(skip(self, entity), fields(target_id = %self.id))]
    async fn send(&self, entity: &EntityTarget<E>) -> Result<(), TargetError> {
        let payload = TargetLog::from_entity(entity)?.to_vec()?;
        let client = self.client().await?;

        if self.args.streaming.enable {
            self.publish_streaming(client, payload).await?;
        } else {
            client
                .publish(self.args.subject.clone(), payload.into())
                .await
                .map_err(|e| TargetError::Request(format!("NATS publish failed: {e}")))?;
            client
                .flush()
                .await
                .map_err(|e| TargetError::Request(format!("NATS flush failed: {e}")))?;
        }

        debug!(target_id = %self.id, subject = %self.args.subject, "Event published to NATS");
        Ok(())
    }

    fn store(&self) -> Option<&TargetStore<E>> {
        self.store.as_deref()
    }

    fn state(&self) -> &TargetState {
        &self.state
    }

    async fn release(&self) -> Result<(), TargetError> {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(e) = client.flush().await {
                warn!(target_id = %self.id, error = %e, "Failed to flush NATS connection on close");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args() -> NATSArgs {
        NATSArgs {
            enable: true,
            address: "localhost:4222".to_string(),
            subject: "bucketevents".to_string(),
            username: String::new(),
            password: String::new(),
            token: String::new(),
            tls: false,
            cert_authority: String::new(),
            client_cert: String::new(),
            client_key: String::new(),
            ping_interval: Duration::ZERO,
            streaming: NATSStreamingArgs::default(),
            queue_dir: String::new(),
            queue_limit: 0,
        }
    }

    #[test]
    fn test_validate() {
        assert!(args().validate().is_ok());

        for address in ["", "localhost", ":4222", "localhost:port"] {
            let mut a = args();
            a.address = address.to_string();
            assert!(a.validate().is_err(), "{address}");
        }

        let mut a = args();
        a.subject.clear();
        assert!(a.validate().is_err());

        let mut a = args();
        a.client_cert = "/etc/nats/client.pem".to_string();
        assert!(a.validate().is_err());

        let mut a = args();
        a.password = "secret".to_string();
        assert!(a.validate().is_err());

        let mut a = args();
        a.streaming.enable = true;
        assert!(a.validate().is_err());
        a.streaming.cluster_id = "rustfs".to_string();
        assert!(a.validate().is_ok());

        let mut a = args();
        a.subject.clear();
        a.enable = false;
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_oversized_ack_window_is_rejected() {
        let mut a = args();
        a.streaming.max_pub_acks_in_flight = usize::MAX;
        assert!(matches!(a.validate(), Err(TargetError::Configuration(_))));
        assert!(NATSTarget::<String>::new("1".to_string(), a).is_err());

        let mut a = args();
        a.enable = false;
        a.streaming.max_pub_acks_in_flight = usize::MAX;
        let target = NATSTarget::<String>::new("1".to_string(), a).unwrap();
        assert_eq!(target.ack_limiter.available_permits(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn test_new_opens_queue_store() {
        let dir = TempDir::new().unwrap();
        let mut a = args();
        a.queue_dir = dir.path().to_string_lossy().into_owned();
        let target = NATSTarget::<String>::new("primary".to_string(), a).unwrap();
        assert!(target.has_queue_store());
        assert!(dir.path().join("rustfs-nats-primary").is_dir());

        // No connection was ever made, close only flips the state.
        target.close().await.unwrap();
        assert!(target.state().is_closed());
    }
}
