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

//! Liveness probes shared by the sink adapters.
//!
//! A probe only answers "can a TCP connection be opened right now". It never blocks longer
//! than the given timeout, and the outcome is reported in terms the replay loop understands:
//! a refused connection is [`TargetError::NotConnected`], an expired probe is
//! [`TargetError::Timeout`].

use crate::error::TargetError;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Upper bound on a single liveness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves `addr` (`host:port`) and tries every resolved address until one accepts.
pub async fn check_tcp_reachable(addr: &str, probe_timeout: Duration) -> Result<(), TargetError> {
    let resolved = timeout(probe_timeout, lookup_host(addr))
        .await
        .map_err(|_| TargetError::Timeout(format!("resolving {addr} timed out")))?
        .map_err(|e| TargetError::Network(format!("failed to resolve {addr}: {e}")))?;

    let mut last_err = TargetError::Network(format!("no address resolved for {addr}"));
    for socket_addr in resolved {
        match timeout(probe_timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_)) => {
                debug!(address = %addr, resolved = %socket_addr, "probe connected");
                return Ok(());
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(address = %addr, resolved = %socket_addr, "probe refused");
                last_err = TargetError::NotConnected;
            }
            Ok(Err(e)) => {
                last_err = TargetError::Network(format!("failed to connect to {socket_addr}: {e}"));
            }
            Err(_) => {
                last_err = TargetError::Timeout(format!("connecting to {socket_addr} timed out"));
            }
        }
    }
    Err(last_err)
}

/// Succeeds as soon as any address in `addrs` is reachable, reporting the last failure otherwise.
pub async fn check_any_reachable<S: AsRef<str>>(addrs: &[S], probe_timeout: Duration) -> Result<(), TargetError> {
    let mut last_err = TargetError::Configuration("no address to probe".to_string());
    for addr in addrs {
        match check_tcp_reachable(addr.as_ref(), probe_timeout).await {
            Ok(()) => return Ok(()),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Returns `host:port` for a URL, falling back to `default_port` when the URL has none.
pub fn url_host_port(url: &Url, default_port: u16) -> Result<String, TargetError> {
    let host = url
        .host_str()
        .ok_or_else(|| TargetError::Configuration(format!("URL '{url}' has no host")))?;
    // IPv6 hosts keep their brackets in `host_str`.
    let port = url.port_or_known_default().unwrap_or(default_port);
    Ok(format!("{host}:{port}"))
}
