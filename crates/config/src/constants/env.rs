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

/// Prefix shared by every RustFS environment variable.
pub const ENV_PREFIX: &str = "RUSTFS_";

/// Separator between the parts of an environment variable name,
/// also used to attach an instance suffix to a key.
pub const DEFAULT_DELIMITER: &str = "_";

/// Instance name used when a sub-system is configured without a suffix.
pub const DEFAULT_TARGET: &str = "_";

/// Separator between a sub-system and an instance in diagnostic names, e.g. `notify_nats:primary`.
pub const SUB_SYSTEM_SEPARATOR: &str = ":";

pub const ENABLE_ON: &str = "on";
pub const ENABLE_OFF: &str = "off";
