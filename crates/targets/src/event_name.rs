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

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid event name: {0}")]
pub struct ParseEventNameError(pub String);

/// The kind of storage mutation (or access) an event reports, named after the S3 event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ObjectAccessedGet,
    ObjectAccessedHead,
    ObjectCreatedCompleteMultipartUpload,
    ObjectCreatedCopy,
    ObjectCreatedPost,
    ObjectCreatedPut,
    ObjectCreatedPutTagging,
    ObjectCreatedDeleteTagging,
    ObjectRemovedDelete,
    ObjectRemovedDeleteMarkerCreated,
    ObjectRemovedDeleteAllVersions,
    BucketCreated,
    BucketRemoved,
}

const EVENT_NAMES: &[(EventName, &str)] = &[
    (EventName::ObjectAccessedGet, "s3:ObjectAccessed:Get"),
    (EventName::ObjectAccessedHead, "s3:ObjectAccessed:Head"),
    (EventName::ObjectCreatedCompleteMultipartUpload, "s3:ObjectCreated:CompleteMultipartUpload"),
    (EventName::ObjectCreatedCopy, "s3:ObjectCreated:Copy"),
    (EventName::ObjectCreatedPost, "s3:ObjectCreated:Post"),
    (EventName::ObjectCreatedPut, "s3:ObjectCreated:Put"),
    (EventName::ObjectCreatedPutTagging, "s3:ObjectCreated:PutTagging"),
    (EventName::ObjectCreatedDeleteTagging, "s3:ObjectCreated:DeleteTagging"),
    (EventName::ObjectRemovedDelete, "s3:ObjectRemoved:Delete"),
    (EventName::ObjectRemovedDeleteMarkerCreated, "s3:ObjectRemoved:DeleteMarkerCreated"),
    (EventName::ObjectRemovedDeleteAllVersions, "s3:ObjectRemoved:DeleteAllVersions"),
    (EventName::BucketCreated, "s3:BucketCreated:*"),
    (EventName::BucketRemoved, "s3:BucketRemoved:*"),
];

impl EventName {
    pub fn parse(s: &str) -> Result<Self, ParseEventNameError> {
        EVENT_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(event, _)| *event)
            .ok_or_else(|| ParseEventNameError(s.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        EVENT_NAMES
            .iter()
            .find(|(event, _)| event == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// Whether the event reports that an object is gone.
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            EventName::ObjectRemovedDelete | EventName::ObjectRemovedDeleteMarkerCreated | EventName::ObjectRemovedDeleteAllVersions
        )
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = ParseEventNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventName::parse(s)
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EventName::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_parses_back() {
        for (event, name) in EVENT_NAMES {
            assert_eq!(EventName::parse(name).unwrap(), *event);
            assert_eq!(event.as_str(), *name);
        }
        assert!(EventName::parse("s3:ObjectCreated:*").is_err());
    }

    #[test]
    fn test_removal_events() {
        assert!(EventName::ObjectRemovedDelete.is_removal());
        assert!(EventName::ObjectRemovedDeleteMarkerCreated.is_removal());
        assert!(!EventName::ObjectCreatedPut.is_removal());
        assert!(!EventName::BucketRemoved.is_removal());
    }

    #[test]
    fn test_serde_uses_s3_name() {
        let json = serde_json::to_string(&EventName::ObjectCreatedPut).unwrap();
        assert_eq!(json, "\"s3:ObjectCreated:Put\"");
        let back: EventName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventName::ObjectCreatedPut);
    }
}
