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

//! Event notification for RustFS.
//!
//! Configured sinks are built by the [`TargetRegistry`], collected in a [`TargetList`] and
//! fed by [`NotificationSystem::deliver`]. Targets with a queue directory persist every
//! event first; a replay task per target drains the queue in order once the sink is
//! reachable.

pub mod config;
pub mod error;
pub mod event;
pub mod factory;
pub mod integration;
pub mod notifier;
pub mod registry;
pub mod stream;

pub use config::EnvSnapshot;
pub use error::{BootstrapFailures, NotificationError};
pub use event::{Event, EventArgs, EventObject};
pub use factory::TargetFactory;
pub use integration::{NotificationMetrics, NotificationStatus, NotificationSystem, TargetReport, load_config_from_file};
pub use notifier::{SharedTarget, TargetList};
pub use registry::{BootstrapMode, ResolvedTarget, TargetRegistry};
pub use rustfs_targets::{EventName, Target, TargetError, TargetID};
pub use stream::{ReplayConfig, ReplayHandle, start_replay};
