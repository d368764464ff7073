//! Firestore REST client
//!
//! Point queries page through `documents.list`. The change feed is a polling
//! watcher: each tick lists the collection, diffs it against the previous
//! listing and emits the differences as one batch. Listing failures are
//! delivered on the feed and the watcher keeps polling, so the feed recovers
//! on its own once the store is reachable again.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::document::{Document, DocumentChange, Fields};
use types::errors::StoreError;

use super::{FeedMessage, FeedSender, FeedSubscription, StoreClient};
use crate::config::StoreProfile;

/// Documents requested per page
const PAGE_SIZE: u32 = 300;

/// Connection settings shared by every Firestore instance
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    /// REST root, e.g. `https://firestore.googleapis.com/v1`
    pub base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

/// `StoreClient` backed by one Firestore project
#[derive(Clone)]
pub struct FirestoreStore {
    label: String,
    http: Client,
    documents_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl FirestoreStore {
    pub fn new(
        label: impl Into<String>,
        profile: &StoreProfile,
        settings: &FirestoreSettings,
        shutdown: CancellationToken,
    ) -> Result<Self, StoreError> {
        let label = label.into();
        let project_id = profile
            .project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| StoreError::Config(format!("{} store has no project id", label)))?;

        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            settings.base_url.trim_end_matches('/'),
            project_id
        );

        info!(store = %label, project_id, "Firestore store configured");

        Ok(Self {
            label,
            http,
            documents_url,
            api_key: profile.api_key.clone(),
            poll_interval: settings.poll_interval,
            shutdown,
        })
    }

    fn page_url(&self, collection: &str, page_token: Option<&str>) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}/{}", self.documents_url, collection))
            .map_err(|e| StoreError::Config(format!("invalid collection url: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &PAGE_SIZE.to_string());
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    async fn list_page(
        &self,
        collection: &str,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, StoreError> {
        let url = self.page_url(collection, page_token)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                code: status.as_u16(),
                message,
            });
        }

        response
            .json::<ListDocumentsResponse>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(collection, page_token.as_deref()).await?;
            for raw in page.documents {
                documents.push(raw.into_document()?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    /// Poll loop behind a subscription. Ends on shutdown or when the
    /// subscriber goes away.
    async fn watch(self, collection: String, sender: FeedSender) {
        let mut known: Option<BTreeMap<String, Fields>> = None;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sender.closed() => break,
                _ = ticker.tick() => {}
            }

            let listing = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                listing = self.list_all(&collection) => listing,
            };

            let message = match listing {
                Ok(documents) => {
                    let first = known.is_none();
                    let previous = known.take().unwrap_or_default();
                    let changes = diff_listing(&previous, &documents);
                    known = Some(
                        documents
                            .into_iter()
                            .map(|doc| (doc.id, doc.data))
                            .collect(),
                    );
                    if !first && changes.is_empty() {
                        continue;
                    }
                    debug!(store = %self.label, collection = %collection, changes = changes.len(), "Listing changed");
                    FeedMessage::Batch(changes)
                }
                Err(err) => {
                    warn!(
                        store = %self.label,
                        collection = %collection,
                        transient = err.is_transient(),
                        error = %err,
                        "Listing failed"
                    );
                    FeedMessage::Error(err)
                }
            };

            if sender.send(message).is_err() {
                break;
            }
        }

        debug!(store = %self.label, collection = %collection, "Watcher stopped");
    }
}

#[async_trait]
impl StoreClient for FirestoreStore {
    async fn query_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(StoreError::Unavailable("shutting down".into())),
            documents = self.list_all(collection) => documents,
        }
    }

    async fn subscribe(&self, collection: &str) -> Result<FeedSubscription, StoreError> {
        let (sender, subscription) = FeedSubscription::channel(collection);
        tokio::spawn(self.clone().watch(collection.to_string(), sender));
        Ok(subscription)
    }
}

/// Changes turning `previous` into `current`
///
/// Additions and modifications follow the order of `current`; removals
/// follow in id order and carry the last known data.
pub fn diff_listing(previous: &BTreeMap<String, Fields>, current: &[Document]) -> Vec<DocumentChange> {
    let mut changes = Vec::new();

    for doc in current {
        match previous.get(&doc.id) {
            None => changes.push(DocumentChange::added(doc.clone())),
            Some(data) if *data != doc.data => changes.push(DocumentChange::modified(doc.clone())),
            Some(_) => {}
        }
    }

    let present: HashSet<&str> = current.iter().map(|d| d.id.as_str()).collect();
    for (id, data) in previous {
        if !present.contains(id.as_str()) {
            changes.push(DocumentChange::removed(Document::new(id.clone(), data.clone())));
        }
    }

    changes
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    /// Full resource name; the document id is the last path segment
    name: String,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

impl RawDocument {
    fn into_document(self) -> Result<Document, StoreError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::Decode(format!("bad document name: {}", self.name)))?
            .to_string();

        let mut data = Map::new();
        for (key, value) in self.fields {
            data.insert(key, value.into_json()?);
        }
        Ok(Document::new(id, data))
    }
}

/// Firestore typed value, as encoded by the REST API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum FieldValue {
    NullValue(()),
    BooleanValue(bool),
    /// int64 values are sent as decimal strings
    IntegerValue(String),
    /// Finite doubles are numbers; NaN and infinities are strings
    DoubleValue(Value),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Deserialize)]
struct GeoPoint {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ArrayValue {
    #[serde(default)]
    values: Vec<FieldValue>,
}

#[derive(Debug, Deserialize)]
struct MapValue {
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

impl FieldValue {
    fn into_json(self) -> Result<Value, StoreError> {
        Ok(match self {
            FieldValue::NullValue(()) => Value::Null,
            FieldValue::BooleanValue(b) => Value::Bool(b),
            FieldValue::IntegerValue(raw) => {
                let n: i64 = raw
                    .parse()
                    .map_err(|_| StoreError::Decode(format!("bad integerValue: {}", raw)))?;
                Value::Number(Number::from(n))
            }
            // Non-finite doubles have no JSON representation
            FieldValue::DoubleValue(raw) => match raw {
                Value::Number(n) => Value::Number(n),
                _ => Value::Null,
            },
            FieldValue::TimestampValue(s)
            | FieldValue::StringValue(s)
            | FieldValue::BytesValue(s)
            | FieldValue::ReferenceValue(s) => Value::String(s),
            FieldValue::GeoPointValue(point) => {
                let mut map = Map::new();
                map.insert("latitude".into(), Number::from_f64(point.latitude).map_or(Value::Null, Value::Number));
                map.insert("longitude".into(), Number::from_f64(point.longitude).map_or(Value::Null, Value::Number));
                Value::Object(map)
            }
            FieldValue::ArrayValue(array) => Value::Array(
                array
                    .values
                    .into_iter()
                    .map(FieldValue::into_json)
                    .collect::<Result<_, _>>()?,
            ),
            FieldValue::MapValue(map) => {
                let mut object = Map::new();
                for (key, value) in map.fields {
                    object.insert(key, value.into_json()?);
                }
                Value::Object(object)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use types::document::{fields_from, ChangeKind};

    fn settings() -> FirestoreSettings {
        FirestoreSettings {
            base_url: "https://firestore.googleapis.com/v1/".to_string(),
            poll_interval: Duration::from_millis(100),
            request_timeout: Duration::from_secs(1),
        }
    }

    fn profile(project: Option<&str>) -> StoreProfile {
        StoreProfile {
            api_key: Some("k3y".to_string()),
            project_id: project.map(str::to_string),
            ..StoreProfile::default()
        }
    }

    #[test]
    fn test_decode_list_response() {
        let body = json!({
            "documents": [{
                "name": "projects/p/databases/(default)/documents/items/apple",
                "fields": {
                    "quantity": {"integerValue": "12"},
                    "price": {"doubleValue": 1.5},
                    "label": {"stringValue": "fresh"},
                    "gone": {"nullValue": null},
                    "tags": {"arrayValue": {"values": [{"booleanValue": true}]}},
                    "meta": {"mapValue": {"fields": {"score": {"integerValue": "-3"}}}},
                    "empty": {"arrayValue": {}}
                },
                "createTime": "2024-01-01T00:00:00Z",
                "updateTime": "2024-01-01T00:00:00Z"
            }],
            "nextPageToken": "abc"
        });

        let page: ListDocumentsResponse = serde_json::from_value(body).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let doc = page.documents.into_iter().next().unwrap().into_document().unwrap();
        assert_eq!(doc.id, "apple");
        assert_eq!(
            Value::Object(doc.data),
            json!({
                "quantity": 12,
                "price": 1.5,
                "label": "fresh",
                "gone": null,
                "tags": [true],
                "meta": {"score": -3},
                "empty": []
            })
        );
    }

    #[test]
    fn test_empty_collection_response() {
        let page: ListDocumentsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_bad_integer_is_decode_error() {
        let value: FieldValue = serde_json::from_value(json!({"integerValue": "twelve"})).unwrap();
        assert!(matches!(value.into_json(), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_non_finite_double_becomes_null() {
        let value: FieldValue = serde_json::from_value(json!({"doubleValue": "NaN"})).unwrap();
        assert_eq!(value.into_json().unwrap(), Value::Null);
    }

    #[test]
    fn test_diff_listing() {
        let mut previous = BTreeMap::new();
        previous.insert("A".to_string(), fields_from(json!({"balance": 1})));
        previous.insert("B".to_string(), fields_from(json!({"balance": 2})));
        previous.insert("C".to_string(), fields_from(json!({"balance": 3})));

        let current = vec![
            Document::new("A", fields_from(json!({"balance": 1}))),
            Document::new("B", fields_from(json!({"balance": 5}))),
            Document::new("D", fields_from(json!({"balance": 4}))),
        ];

        let changes = diff_listing(&previous, &current);
        let summary: Vec<(&str, ChangeKind)> =
            changes.iter().map(|c| (c.id.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("B", ChangeKind::Modified),
                ("D", ChangeKind::Added),
                ("C", ChangeKind::Removed),
            ]
        );
        assert_eq!(changes[2].data, fields_from(json!({"balance": 3})));
    }

    #[test]
    fn test_diff_against_empty_is_all_added() {
        let current = vec![Document::new("A", Fields::new())];
        let changes = diff_listing(&BTreeMap::new(), &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_page_url() {
        let store = FirestoreStore::new("primary", &profile(Some("proj")), &settings(), CancellationToken::new()).unwrap();
        let url = store.page_url("items", Some("tok")).unwrap();
        assert_eq!(url.path(), "/v1/projects/proj/databases/(default)/documents/items");

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["pageSize"], "300");
        assert_eq!(query["key"], "k3y");
        assert_eq!(query["pageToken"], "tok");
    }

    #[test]
    fn test_missing_project_id_rejected() {
        let result = FirestoreStore::new("hangman", &profile(None), &settings(), CancellationToken::new());
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_watcher_reports_errors_and_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let mut unreachable = settings();
        // Nothing listens on port 9; every listing fails fast
        unreachable.base_url = "http://127.0.0.1:9/v1".to_string();

        let store = FirestoreStore::new("primary", &profile(Some("proj")), &unreachable, shutdown.clone()).unwrap();
        let mut feed = store.subscribe("approved_buyers").await.unwrap();

        match feed.recv().await {
            Some(FeedMessage::Error(err)) => assert!(matches!(err, StoreError::Transport(_))),
            other => panic!("Expected feed error, got {:?}", other),
        }

        shutdown.cancel();
        while feed.recv().await.is_some() {}
    }
}
