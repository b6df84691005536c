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

use crate::check::{DEFAULT_PROBE_TIMEOUT, check_tcp_reachable, url_host_port};
use crate::target::{EntityTarget, EventFormat, Target, TargetKind, TargetState, TargetStore, open_queue_store, validate_queue_dir};
use crate::{TargetError, TargetID};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ELASTICSEARCH_PORT: u16 = 9200;

/// Arguments for configuring an Elasticsearch target
#[derive(Debug, Clone)]
pub struct ElasticsearchArgs {
    /// Whether the target is enabled
    pub enable: bool,
    /// Document layout in the index
    pub format: EventFormat,
    /// Base URL of the cluster, e.g. `http://localhost:9200`
    pub url: Url,
    /// The index documents are written to
    pub index: String,
    pub username: String,
    pub password: String,
    /// The directory to store events in case of failure
    pub queue_dir: String,
    /// The maximum number of events to store
    pub queue_limit: u64,
}

impl ElasticsearchArgs {
    pub fn validate(&self) -> Result<(), TargetError> {
        if !self.enable {
            return Ok(());
        }
        if self.url.host_str().is_none_or(str::is_empty) {
            return Err(TargetError::Configuration("elasticsearch url has no host".to_string()));
        }
        if self.index.is_empty() {
            return Err(TargetError::Configuration("empty index value".to_string()));
        }
        if self.username.is_empty() != self.password.is_empty() {
            return Err(TargetError::Configuration(
                "username and password should be set in pairs".to_string(),
            ));
        }
        validate_queue_dir(TargetKind::Elasticsearch, &self.queue_dir)
    }
}

/// The index operation an event maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DocumentRequest {
    pub method: Method,
    /// Path relative to the cluster URL
    pub path: String,
    /// Whether the request carries the event document
    pub with_body: bool,
}

impl DocumentRequest {
    /// Namespace format keeps one document per object key; access format appends.
    pub(crate) fn for_event(format: EventFormat, index: &str, key: &str, removal: bool) -> Self {
        match format {
            EventFormat::Namespace => {
                let path = format!("{index}/_doc/{}", urlencoding::encode(key));
                if removal {
                    DocumentRequest {
                        method: Method::DELETE,
                        path,
                        with_body: false,
                    }
                } else {
                    DocumentRequest {
                        method: Method::PUT,
                        path,
                        with_body: true,
                    }
                }
            }
            EventFormat::Access => DocumentRequest {
                method: Method::POST,
                path: format!("{index}/_doc"),
                with_body: true,
            },
        }
    }
}

#[derive(Serialize)]
struct Document<'a, E> {
    #[serde(rename = "Records")]
    records: [&'a E; 1],
}

/// A target that indexes events into Elasticsearch
pub struct ElasticsearchTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    id: TargetID,
    args: ElasticsearchArgs,
    http_client: Client,
    addr: String,
    index_ready: OnceCell<()>,
    store: Option<Box<TargetStore<E>>>,
    state: TargetState,
}

impl<E> ElasticsearchTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    #[instrument(skip(args), fields(target_id = %id))]
    pub fn new(id: String, args: ElasticsearchArgs) -> Result<Self, TargetError> {
        args.validate()?;
        let target_id = TargetID::new(id, TargetKind::Elasticsearch.as_str());

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TargetError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let store = open_queue_store(&args.queue_dir, args.queue_limit, TargetKind::Elasticsearch, &target_id)?;
        let addr = url_host_port(&args.url, DEFAULT_ELASTICSEARCH_PORT)?;

        info!(target_id = %target_id, index = %args.index, format = args.format.as_str(), "Elasticsearch target created");
        Ok(ElasticsearchTarget {
            id: target_id,
            args,
            http_client,
            addr,
            index_ready: OnceCell::new(),
            store,
            state: TargetState::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.args.url.as_str().trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http_client.request(method, self.endpoint(path));
        if self.args.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.args.username, Some(&self.args.password))
        }
    }

    /// Creates the index on first use when the cluster does not have it yet.
    async fn ensure_index(&self) -> Result<(), TargetError> {
        self.index_ready
            .get_or_try_init(|| async {
                let resp = self
                    .request(Method::HEAD, &self.args.index)
                    .send()
                    .await
                    .map_err(map_request_error)?;
                match resp.status() {
                    s if s.is_success() => Ok(()),
                    StatusCode::NOT_FOUND => {
                        let resp = self
                            .request(Method::PUT, &self.args.index)
                            .send()
                            .await
                            .map_err(map_request_error)?;
                        // Another writer may have created it in between.
                        if resp.status().is_success() || resp.status() == StatusCode::BAD_REQUEST {
                            info!(target_id = %self.id, index = %self.args.index, "Created index");
                            Ok(())
                        } else {
                            Err(status_error(&self.args.index, resp.status()))
                        }
                    }
                    s => Err(status_error(&self.args.index, s)),
                }
            })
            .await
            .map(|_| ())
    }
}

fn map_request_error(e: reqwest::Error) -> TargetError {
    if e.is_timeout() {
        TargetError::Timeout(e.to_string())
    } else if e.is_connect() {
        TargetError::NotConnected
    } else {
        TargetError::Request(format!("Failed to send request: {e}"))
    }
}

fn status_error(what: &str, status: StatusCode) -> TargetError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TargetError::Authentication(format!("{what} returned '{status}', please check username and password"))
        }
        _ => TargetError::Request(format!("{what} returned '{status}'")),
    }
}

#[async_trait]
impl<E> Target<E> for ElasticsearchTarget<E>
where
    E: Send + Sync + 'static + Clone + Serialize + DeserializeOwned,
{
    fn id(&self) -> TargetID {
        self.id.clone()
    }

    async fn is_active(&self) -> Result<bool, TargetError> {
        check_tcp_reachable(&self.addr, DEFAULT_PROBE_TIMEOUT).await?;
        Ok(true)
    }

    #[instrument(skip(self, entity), fields(target_id = %self.id))]
    async fn send(&self, entity: &EntityTarget<E>) -> Result<(), TargetError> {
        self.ensure_index().await?;

        let key = entity.key()?;
        let doc = DocumentRequest::for_event(self.args.format, &self.args.index, &key, entity.event_name.is_removal());
        let mut req = self.request(doc.method.clone(), &doc.path);
        if doc.with_body {
            req = req.json(&Document { records: [&entity.data] });
        }

        let resp = req.send().await.map_err(map_request_error)?;
        let status = resp.status();
        // Removing a document that was never indexed is fine.
        if status.is_success() || (doc.method == Method::DELETE && status == StatusCode::NOT_FOUND) {
            debug!(target_id = %self.id, method = %doc.method, key = %key, "Event indexed");
            Ok(())
        } else {
            Err(status_error(&doc.path, status))
        }
    }

    fn store(&self) -> Option<&TargetStore<E>> {
        self.store.as_deref()
    }

    fn state(&self) -> &TargetState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ElasticsearchArgs {
        ElasticsearchArgs {
            enable: true,
            format: EventFormat::Namespace,
            url: Url::parse("http://localhost:9200").unwrap(),
            index: "bucketevents".to_string(),
            username: String::new(),
            password: String::new(),
            queue_dir: String::new(),
            queue_limit: 0,
        }
    }

    #[test]
    fn test_validate() {
        assert!(args().validate().is_ok());

        let mut a = args();
        a.index.clear();
        assert!(a.validate().is_err());

        let mut a = args();
        a.username = "elastic".to_string();
        assert!(a.validate().is_err());
        a.password = "changeme".to_string();
        assert!(a.validate().is_ok());

        let mut a = args();
        a.queue_dir = "relative/dir".to_string();
        assert!(a.validate().is_err());

        let mut a = args();
        a.index.clear();
        a.enable = false;
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_namespace_documents_follow_the_object() {
        let put = DocumentRequest::for_event(EventFormat::Namespace, "idx", "media/a b.png", false);
        assert_eq!(put.method, Method::PUT);
        assert_eq!(put.path, "idx/_doc/media%2Fa%20b.png");
        assert!(put.with_body);

        let del = DocumentRequest::for_event(EventFormat::Namespace, "idx", "media/a b.png", true);
        assert_eq!(del.method, Method::DELETE);
        assert_eq!(del.path, put.path);
        assert!(!del.with_body);
    }

    #[test]
    fn test_access_documents_are_appended() {
        for removal in [false, true] {
            let doc = DocumentRequest::for_event(EventFormat::Access, "idx", "media/a.png", removal);
            assert_eq!(doc.method, Method::POST);
            assert_eq!(doc.path, "idx/_doc");
        }
    }

    #[test]
    fn test_new_resolves_probe_address() {
        let target = ElasticsearchTarget::<String>::new("1".to_string(), args()).unwrap();
        assert_eq!(target.id().to_string(), "1:elasticsearch");
        assert_eq!(target.addr, "localhost:9200");
        assert_eq!(target.endpoint("idx/_doc"), "http://localhost:9200/idx/_doc");
        assert!(!target.has_queue_store());
    }
}
