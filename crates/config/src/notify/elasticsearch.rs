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

use crate::notify::{COMMENT_KEY, ENABLE_KEY, ENV_NOTIFY_PREFIX};

// Elasticsearch Keys
pub const ELASTICSEARCH_URL: &str = "url";
pub const ELASTICSEARCH_INDEX: &str = "index";
pub const ELASTICSEARCH_FORMAT: &str = "format";
pub const ELASTICSEARCH_USERNAME: &str = "username";
pub const ELASTICSEARCH_PASSWORD: &str = "password";
pub const ELASTICSEARCH_QUEUE_DIR: &str = "queue_dir";
pub const ELASTICSEARCH_QUEUE_LIMIT: &str = "queue_limit";

/// Documents are keyed by object and track its latest state.
pub const FORMAT_NAMESPACE: &str = "namespace";
/// Every event is appended as a new document.
pub const FORMAT_ACCESS: &str = "access";

/// A list of all valid configuration keys for an Elasticsearch target.
pub const NOTIFY_ELASTICSEARCH_KEYS: &[&str] = &[
    ENABLE_KEY,
    ELASTICSEARCH_URL,
    ELASTICSEARCH_INDEX,
    ELASTICSEARCH_FORMAT,
    ELASTICSEARCH_USERNAME,
    ELASTICSEARCH_PASSWORD,
    ELASTICSEARCH_QUEUE_DIR,
    ELASTICSEARCH_QUEUE_LIMIT,
    COMMENT_KEY,
];

// Elasticsearch Environment Variables
pub const ENV_ELASTICSEARCH_PREFIX: &str = const_str::concat!(ENV_NOTIFY_PREFIX, "ELASTICSEARCH_");
pub const ENV_ELASTICSEARCH_ENABLE: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "ENABLE");
pub const ENV_ELASTICSEARCH_URL: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "URL");
pub const ENV_ELASTICSEARCH_INDEX: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "INDEX");
pub const ENV_ELASTICSEARCH_FORMAT: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "FORMAT");
pub const ENV_ELASTICSEARCH_USERNAME: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "USERNAME");
pub const ENV_ELASTICSEARCH_PASSWORD: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "PASSWORD");
pub const ENV_ELASTICSEARCH_QUEUE_DIR: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "QUEUE_DIR");
pub const ENV_ELASTICSEARCH_QUEUE_LIMIT: &str = const_str::concat!(ENV_ELASTICSEARCH_PREFIX, "QUEUE_LIMIT");
