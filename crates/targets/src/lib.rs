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

pub mod check;
pub mod error;
mod event_name;
pub mod store;
pub mod target;
mod target_id;

pub use check::{DEFAULT_PROBE_TIMEOUT, check_any_reachable, check_tcp_reachable};
pub use error::{StoreError, TargetError};
pub use event_name::{EventName, ParseEventNameError};
pub use target::{EntityTarget, EventFormat, Target, TargetKind, TargetLog, TargetState, TargetStatus};
pub use target_id::{TargetID, TargetIDError};
