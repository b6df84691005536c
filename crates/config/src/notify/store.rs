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

/// Queue directory used when none is configured. Empty disables the durable queue.
pub const DEFAULT_DIR: &str = "";

/// Default upper bound on pending entries in a queue store.
pub const DEFAULT_LIMIT: u64 = 100000;

/// Queue directories are named `<STORE_PREFIX>-<kind>-<id>`.
pub const STORE_PREFIX: &str = "rustfs";

/// Extension of a queued notification event.
pub const STORE_EXTENSION: &str = ".event";

/// Suffix appended to entries written with snappy compression.
pub const COMPRESS_EXT: &str = ".snappy";

/// Extension used when a store is created without one.
pub const DEFAULT_EXT: &str = ".unknown";

/// Suffix of entries that are still being written.
pub const TMP_EXT: &str = ".tmp";
