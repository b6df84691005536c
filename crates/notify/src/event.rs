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

use chrono::{DateTime, Utc};
use rustfs_targets::{EntityTarget, EventName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const EVENT_VERSION: &str = "2.1";
const EVENT_SOURCE: &str = "rustfs:s3";
const SCHEMA_VERSION: &str = "1.0";

/// Metadata prefix reserved for server internals, never published.
const INTERNAL_META_PREFIX: &str = "x-amz-meta-internal-";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub principal_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub name: String,
    pub owner_identity: Identity,
    pub arn: String,
}

/// The object an event refers to. `key` is URL-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub sequencer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(rename = "s3SchemaVersion")]
    pub schema_version: String,
    pub configuration_id: String,
    pub bucket: Bucket,
    pub object: Object,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub host: String,
    pub port: String,
    pub user_agent: String,
}

/// An S3-compatible bucket notification record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    pub event_time: DateTime<Utc>,
    pub event_name: EventName,
    pub user_identity: Identity,
    pub request_parameters: HashMap<String, String>,
    pub response_elements: HashMap<String, String>,
    pub s3: Metadata,
    pub source: Source,
}

/// The object as seen by the request that produced the event.
#[derive(Debug, Clone, Default)]
pub struct EventObject {
    pub name: String,
    pub size: i64,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub version_id: Option<String>,
    pub mod_time: Option<DateTime<Utc>>,
    pub user_defined: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct EventArgs {
    pub event_name: EventName,
    pub bucket_name: String,
    pub object: EventObject,
    pub req_params: HashMap<String, String>,
    pub resp_elements: HashMap<String, String>,
    pub host: String,
    pub user_agent: String,
}

impl Event {
    pub fn new(args: EventArgs) -> Self {
        let event_time = Utc::now();
        let sequencer_time = args.object.mod_time.unwrap_or(event_time);
        let sequencer = format!("{:X}", sequencer_time.timestamp_nanos_opt().unwrap_or_default());

        let mut response_elements = args.resp_elements;
        for key in ["x-amz-request-id", "x-amz-id-2"] {
            response_elements.entry(key.to_string()).or_default();
        }

        let principal_id = args.req_params.get("principalId").cloned().unwrap_or_default();

        let mut object = Object {
            key: urlencoding::encode(&args.object.name).into_owned(),
            version_id: args.object.version_id,
            sequencer,
            ..Default::default()
        };

        if !args.event_name.is_removal() {
            object.size = Some(args.object.size);
            object.etag = args.object.etag;
            object.content_type = args.object.content_type;
            object.user_metadata = Some(
                args.object
                    .user_defined
                    .into_iter()
                    .filter(|(k, _)| !k.to_lowercase().starts_with(INTERNAL_META_PREFIX))
                    .collect(),
            );
        }

        Event {
            event_version: EVENT_VERSION.to_string(),
            event_source: EVENT_SOURCE.to_string(),
            aws_region: args.req_params.get("region").cloned().unwrap_or_default(),
            event_time,
            event_name: args.event_name,
            user_identity: Identity {
                principal_id: principal_id.clone(),
            },
            request_parameters: args.req_params,
            response_elements,
            s3: Metadata {
                schema_version: SCHEMA_VERSION.to_string(),
                configuration_id: "Config".to_string(),
                bucket: Bucket {
                    name: args.bucket_name.clone(),
                    owner_identity: Identity { principal_id },
                    arn: format!("arn:aws:s3:::{}", args.bucket_name),
                },
                object,
            },
            source: Source {
                host: args.host,
                port: String::new(),
                user_agent: args.user_agent,
            },
        }
    }

    /// Builds a minimal event, used to exercise targets.
    pub fn new_test_event(bucket: &str, key: &str, event_name: EventName) -> Self {
        Event::new(EventArgs {
            event_name,
            bucket_name: bucket.to_string(),
            object: EventObject {
                name: key.to_string(),
                size: 1024,
                etag: Some("etag123".to_string()),
                content_type: Some("application/octet-stream".to_string()),
                version_id: Some("1".to_string()),
                ..Default::default()
            },
            req_params: HashMap::from([("region".to_string(), "us-east-1".to_string())]),
            resp_elements: HashMap::new(),
            host: "127.0.0.1".to_string(),
            user_agent: "rustfs".to_string(),
        })
    }

    /// Wraps the event into the unit that targets persist and send.
    pub fn to_entity(&self) -> EntityTarget<Event> {
        EntityTarget {
            object_name: self.s3.object.key.clone(),
            bucket_name: self.s3.bucket.name.clone(),
            event_name: self.event_name,
            data: self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_encodes_key_and_filters_internal_metadata() {
        let event = Event::new(EventArgs {
            event_name: EventName::ObjectCreatedPut,
            bucket_name: "photos".to_string(),
            object: EventObject {
                name: "2024/summer beach.jpg".to_string(),
                size: 42,
                user_defined: HashMap::from([
                    ("x-amz-meta-camera".to_string(), "x100".to_string()),
                    ("X-Amz-Meta-Internal-Hash".to_string(), "abc".to_string()),
                ]),
                ..Default::default()
            },
            req_params: HashMap::new(),
            resp_elements: HashMap::new(),
            host: "10.0.0.1".to_string(),
            user_agent: "aws-cli".to_string(),
        });

        assert_eq!(event.s3.object.key, "2024%2Fsummer%20beach.jpg");
        assert_eq!(event.s3.object.size, Some(42));
        let meta = event.s3.object.user_metadata.as_ref().unwrap();
        assert_eq!(meta.len(), 1);
        assert!(meta.contains_key("x-amz-meta-camera"));
        assert!(event.response_elements.contains_key("x-amz-request-id"));
    }

    #[test]
    fn test_removal_event_carries_no_object_details() {
        let event = Event::new_test_event("b", "k", EventName::ObjectRemovedDelete);
        assert!(event.s3.object.size.is_none());
        assert!(event.s3.object.user_metadata.is_none());
    }

    #[test]
    fn test_entity_key_round_trips_object_name() {
        let event = Event::new_test_event("photos", "a b/c.txt", EventName::ObjectCreatedPut);
        let entity = event.to_entity();
        assert_eq!(entity.key().unwrap(), "photos/a b/c.txt");
        assert_eq!(entity.event_name, EventName::ObjectCreatedPut);
    }

    #[test]
    fn test_serialized_field_names() {
        let event = Event::new_test_event("b", "k", EventName::ObjectCreatedPut);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventName"], "s3:ObjectCreated:Put");
        assert_eq!(json["s3"]["s3SchemaVersion"], "1.0");
        assert_eq!(json["s3"]["object"]["eTag"], "etag123");
    }
}
