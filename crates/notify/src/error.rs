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

use rustfs_config::ConfigError;
use rustfs_targets::{TargetError, TargetID};
use std::fmt;
use thiserror::Error;

/// Error types for the notification system
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unable to disable configured targets '{0}'")]
    UnknownTargets(String),

    #[error("{0}")]
    Bootstrap(BootstrapFailures),

    #[error("Target {0} is already registered")]
    DuplicateTarget(TargetID),

    #[error("Notification system is already initialized")]
    AlreadyInitialized,

    #[error("Failed to read configuration: {0}")]
    ReadConfig(#[from] std::io::Error),
}

/// Targets that could not be constructed during registration, with their causes.
#[derive(Debug, Default)]
pub struct BootstrapFailures(pub Vec<(TargetID, TargetError)>);

impl BootstrapFailures {
    pub fn push(&mut self, id: TargetID, err: TargetError) {
        self.0.push((id, err));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, id: &TargetID) -> bool {
        self.0.iter().any(|(failed, _)| failed == id)
    }

    pub fn ids(&self) -> Vec<TargetID> {
        self.0.iter().map(|(id, _)| id.clone()).collect()
    }
}

impl fmt::Display for BootstrapFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to initialize {} target(s): ", self.0.len())?;
        for (i, (id, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{id}: {err}")?;
        }
        Ok(())
    }
}
