use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
    auth::{AuthError, IdTokenSource},
    config::PlannerConfig,
    http::{FetchError, HttpRequest, HttpTransport},
    models::types::UtcDateTime,
};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Invalid document database URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Unreadable value in field {field}: {reason}")]
    Value { field: String, reason: String },
}

/// A field value as stored in the document database.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(UtcDateTime),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Document {
        Document {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: Value) -> Document {
        self.fields.insert(field.to_owned(), value);
        self
    }

    /// A non-empty string field.
    pub fn string(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .filter(|string| !string.is_empty())
            .map(str::to_owned)
    }

    pub fn unsigned(&self, field: &str) -> Option<u32> {
        match self.fields.get(field)? {
            Value::Integer(number) => u32::try_from(*number).ok(),
            Value::Double(number) if *number >= 0.0 => Some(*number as u32),
            Value::String(string) => string.trim().parse().ok(),
            _ => None,
        }
    }

    /// Timestamps are normally stored natively, but older documents hold
    /// ISO strings, epoch milliseconds or `{seconds}` maps.
    pub fn timestamp(&self, field: &str) -> Option<UtcDateTime> {
        match self.fields.get(field)? {
            Value::Timestamp(timestamp) => Some(*timestamp),
            Value::String(string) => UtcDateTime::parse_rfc3339(string).ok(),
            Value::Integer(millis) => UtcDateTime::from_unix_millis(*millis),
            Value::Map(map) => match map.get("seconds")? {
                Value::Integer(seconds) => UtcDateTime::from_unix_millis(seconds.checked_mul(1000)?),
                _ => None,
            },
            _ => None,
        }
    }

    /// The string elements of an array field. Anything else in the array is skipped.
    pub fn strings(&self, field: &str) -> Vec<String> {
        self.array(field)
            .iter()
            .filter_map(|value| value.as_str().map(str::to_owned))
            .collect()
    }

    /// A string field of each map element of an array field.
    pub fn nested_strings(&self, field: &str, key: &str) -> Vec<String> {
        self.array(field)
            .iter()
            .filter_map(|value| match value {
                Value::Map(map) => map.get(key).and_then(Value::as_str),
                _ => None,
            })
            .filter(|string| !string.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn array(&self, field: &str) -> &[Value] {
        match self.fields.get(field) {
            Some(Value::Array(values)) => values,
            _ => Default::default(),
        }
    }
}

/// A single-collection query with an optional equality filter and one ascending order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentQuery {
    /// Path of the parent document for subcollections, e.g. `gamedays/abc`.
    pub parent: Option<String>,
    pub collection: String,
    pub where_equal: Option<(String, String)>,
    pub order_by: String,
}

impl DocumentQuery {
    pub fn collection(collection: &str) -> DocumentQuery {
        DocumentQuery {
            parent: None,
            collection: collection.to_owned(),
            where_equal: None,
            order_by: "__name__".to_owned(),
        }
    }

    pub fn under(mut self, parent: String) -> DocumentQuery {
        self.parent = Some(parent);
        self
    }

    pub fn where_equal(mut self, field: &str, value: &str) -> DocumentQuery {
        self.where_equal = Some((field.to_owned(), value.to_owned()));
        self
    }

    pub fn order_by(mut self, field: &str) -> DocumentQuery {
        self.order_by = field.to_owned();
        self
    }

    fn structured_query(&self) -> serde_json::Value {
        let mut query = json!({
            "from": [{ "collectionId": self.collection }],
            "orderBy": [{ "field": { "fieldPath": self.order_by }, "direction": "ASCENDING" }],
        });

        if let Some((field, value)) = &self.where_equal {
            query["where"] = json!({
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": { "stringValue": value },
                }
            });
        }

        json!({ "structuredQuery": query })
    }
}

/// Where live queries read from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn run_query(&self, query: &DocumentQuery) -> Result<Vec<Document>, SourceError>;
}

/// The document database's REST `runQuery`, read as the signed-in user.
pub struct FirestoreSource {
    transport: Arc<dyn HttpTransport>,
    documents_url: String,
    tokens: Arc<dyn IdTokenSource>,
}

impl FirestoreSource {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: &PlannerConfig,
        tokens: Arc<dyn IdTokenSource>,
    ) -> FirestoreSource {
        FirestoreSource {
            transport,
            documents_url: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_base_url.trim_end_matches('/'),
                config.firebase_project_id
            ),
            tokens,
        }
    }
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, RawValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum RawValue {
    NullValue(serde_json::Value),
    BooleanValue(bool),
    IntegerValue(serde_json::Value),
    DoubleValue(f64),
    StringValue(String),
    TimestampValue(String),
    ReferenceValue(String),
    BytesValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(RawArray),
    MapValue(RawMap),
}

#[derive(Deserialize)]
struct RawArray {
    #[serde(default)]
    values: Vec<RawValue>,
}

#[derive(Deserialize)]
struct RawMap {
    #[serde(default)]
    fields: BTreeMap<String, RawValue>,
}

impl RawValue {
    fn decode(self, field: &str) -> Result<Value, SourceError> {
        let invalid = |reason: String| SourceError::Value {
            field: field.to_owned(),
            reason,
        };

        Ok(match self {
            RawValue::NullValue(_) | RawValue::GeoPointValue(_) => Value::Null,
            RawValue::BooleanValue(boolean) => Value::Boolean(boolean),
            // 64-bit integers travel as strings.
            RawValue::IntegerValue(number) => {
                let parsed = match &number {
                    serde_json::Value::String(string) => string.parse().ok(),
                    serde_json::Value::Number(number) => number.as_i64(),
                    _ => None,
                };
                Value::Integer(parsed.ok_or_else(|| invalid(format!("not an integer: {number}")))?)
            }
            RawValue::DoubleValue(number) => Value::Double(number),
            RawValue::StringValue(string)
            | RawValue::ReferenceValue(string)
            | RawValue::BytesValue(string) => Value::String(string),
            RawValue::TimestampValue(timestamp) => Value::Timestamp(
                UtcDateTime::parse_rfc3339(&timestamp).map_err(|err| invalid(err.to_string()))?,
            ),
            RawValue::ArrayValue(array) => Value::Array(
                array
                    .values
                    .into_iter()
                    .map(|value| value.decode(field))
                    .collect::<Result<_, _>>()?,
            ),
            RawValue::MapValue(map) => Value::Map(decode_fields(map.fields)?),
        })
    }
}

fn decode_fields(fields: BTreeMap<String, RawValue>) -> Result<BTreeMap<String, Value>, SourceError> {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = value.decode(&name)?;
            Ok((name, value))
        })
        .collect()
}

impl RawDocument {
    fn decode(self) -> Result<Document, SourceError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();

        Ok(Document {
            id,
            fields: decode_fields(self.fields)?,
        })
    }
}

#[async_trait]
impl DocumentSource for FirestoreSource {
    #[tracing::instrument(skip(self), fields(collection = %query.collection))]
    async fn run_query(&self, query: &DocumentQuery) -> Result<Vec<Document>, SourceError> {
        let parent = match &query.parent {
            Some(parent) => format!("{}/{parent}", self.documents_url),
            None => self.documents_url.clone(),
        };
        let url = Url::parse(&format!("{parent}:runQuery"))?;

        let id_token = self.tokens.id_token().await?;
        let request =
            HttpRequest::post_json(url, query.structured_query()).bearer(Some(&id_token));
        let response = self.transport.send(request).await?.ensure_success()?;

        // Results without a document only carry a read time.
        let results: Vec<QueryResult> = response.json()?;
        let documents: Vec<Document> = results
            .into_iter()
            .filter_map(|result| result.document)
            .filter_map(|raw| {
                let name = raw.name.clone();
                match raw.decode() {
                    Ok(document) => Some(document),
                    Err(err) => {
                        warn!("Skipping document {name}: {err}");
                        None
                    }
                }
            })
            .collect();

        debug!("{} documents", documents.len());
        Ok(documents)
    }
}

#[cfg(test)]
pub mod fake {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{Document, DocumentQuery, DocumentSource, SourceError};
    use crate::http::FetchError;

    /// Serves whatever documents are currently set for a collection, counting queries.
    #[derive(Default)]
    pub struct FakeSource {
        collections: Mutex<HashMap<(Option<String>, String), Vec<Document>>>,
        failing: Mutex<bool>,
        queries: Mutex<Vec<DocumentQuery>>,
    }

    impl FakeSource {
        pub fn set(&self, parent: Option<&str>, collection: &str, documents: Vec<Document>) {
            self.collections.lock().insert(
                (parent.map(str::to_owned), collection.to_owned()),
                documents,
            );
        }

        pub fn fail(&self, failing: bool) {
            *self.failing.lock() = failing;
        }

        pub fn queries(&self) -> Vec<DocumentQuery> {
            self.queries.lock().clone()
        }
    }

    #[async_trait]
    impl DocumentSource for FakeSource {
        async fn run_query(&self, query: &DocumentQuery) -> Result<Vec<Document>, SourceError> {
            self.queries.lock().push(query.clone());

            if *self.failing.lock() {
                return Err(SourceError::Fetch(FetchError::Status {
                    status: 403,
                    body: "Missing or insufficient permissions.".to_owned(),
                }));
            }

            Ok(self
                .collections
                .lock()
                .get(&(query.parent.clone(), query.collection.clone()))
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::{
        auth::{AuthGateway, AuthSession, MemorySessionStore, SessionState, SessionStore},
        config::tests::planner_config,
        http::fake::ScriptedTransport,
    };

    #[tokio::test]
    async fn run_query_decodes_typed_values() {
        let body = json!([
            {
                "document": {
                    "name": "projects/planner/databases/(default)/documents/gamedays/gd1",
                    "fields": {
                        "title": { "stringValue": "January Game Day" },
                        "status": { "stringValue": "published" },
                        "startsAt": { "timestampValue": "2026-01-10T18:00:00.123Z" },
                        "capacity": { "integerValue": "5" },
                        "rating": { "doubleValue": 7.5 },
                        "open": { "booleanValue": true },
                        "cancelled": { "nullValue": null },
                        "expansions": { "arrayValue": { "values": [
                            { "mapValue": { "fields": { "name": { "stringValue": "Seafarers" } } } }
                        ] } },
                        "waitlistNames": { "arrayValue": {} },
                    },
                    "createTime": "2026-01-01T00:00:00Z",
                    "updateTime": "2026-01-01T00:00:00Z",
                },
                "readTime": "2026-01-02T00:00:00Z",
            },
            { "readTime": "2026-01-02T00:00:00Z" },
        ]);
        let transport = Arc::new(ScriptedTransport::new().respond(200, body.to_string()));
        let source = FirestoreSource::new(transport.clone(), &planner_config(), Arc::new("token".to_owned()));

        let query = DocumentQuery::collection("gamedays")
            .where_equal("status", "published")
            .order_by("startsAt");
        let documents = source.run_query(&query).await.unwrap();

        assert_eq!(documents.len(), 1);
        let document = &documents[0];
        assert_eq!(document.id, "gd1");
        assert_eq!(document.string("title").as_deref(), Some("January Game Day"));
        assert_eq!(document.unsigned("capacity"), Some(5));
        assert_eq!(document.fields.get("rating"), Some(&Value::Double(7.5)));
        assert_eq!(document.fields.get("open"), Some(&Value::Boolean(true)));
        assert_eq!(document.fields.get("cancelled"), Some(&Value::Null));
        assert_eq!(document.nested_strings("expansions", "name"), vec!["Seafarers"]);
        assert!(document.strings("waitlistNames").is_empty());
        assert_eq!(
            document.timestamp("startsAt"),
            Some(UtcDateTime::from(datetime!(2026-01-10 18:00:00.123 UTC)))
        );

        let request = &transport.requests()[0];
        assert_eq!(
            request.url.as_str(),
            "https://firestore.googleapis.com/v1/projects/planner/databases/(default)/documents:runQuery"
        );
        assert_eq!(request.bearer.as_deref(), Some("token"));
        assert_eq!(
            request.json,
            Some(json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "gamedays" }],
                    "orderBy": [{ "field": { "fieldPath": "startsAt" }, "direction": "ASCENDING" }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "status" },
                            "op": "EQUAL",
                            "value": { "stringValue": "published" },
                        }
                    },
                }
            }))
        );
    }

    #[tokio::test]
    async fn subcollection_queries_use_the_parent_path() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, "[]"));
        let source = FirestoreSource::new(transport.clone(), &planner_config(), Arc::new("token".to_owned()));

        let query = DocumentQuery::collection("tables")
            .under("gamedays/gd1".to_owned())
            .order_by("startTime");
        assert!(source.run_query(&query).await.unwrap().is_empty());

        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://firestore.googleapis.com/v1/projects/planner/databases/(default)/documents/gamedays/gd1:runQuery"
        );
    }

    #[tokio::test]
    async fn permission_errors_are_fetch_errors() {
        let transport = Arc::new(ScriptedTransport::new().respond(403, "denied"));
        let source = FirestoreSource::new(transport, &planner_config(), Arc::new("token".to_owned()));

        let result = source.run_query(&DocumentQuery::collection("gamedays")).await;
        assert!(matches!(
            result,
            Err(SourceError::Fetch(FetchError::Status { status: 403, .. }))
        ));
    }

    #[test_log::test(tokio::test)]
    async fn unreadable_documents_are_skipped() {
        let body = json!([
            { "document": {
                "name": "projects/planner/databases/(default)/documents/gamedays/good",
                "fields": { "startsAt": { "timestampValue": "2026-01-10T18:00:00Z" } },
            } },
            { "document": {
                "name": "projects/planner/databases/(default)/documents/gamedays/bad",
                "fields": { "startsAt": { "timestampValue": "not-a-time" } },
            } },
        ]);
        let transport = Arc::new(ScriptedTransport::new().respond(200, body.to_string()));
        let source = FirestoreSource::new(transport, &planner_config(), Arc::new("token".to_owned()));

        let documents = source
            .run_query(&DocumentQuery::collection("gamedays"))
            .await
            .unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "good");
    }

    #[tokio::test]
    async fn expired_sessions_are_refreshed_between_polls() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, "[]")
                .respond(
                    200,
                    json!({
                        "id_token": "fresh",
                        "refresh_token": "refresh-2",
                        "expires_in": "3600",
                        "user_id": "u1",
                    })
                    .to_string(),
                )
                .respond(200, "[]"),
        );
        let sessions = Arc::new(MemorySessionStore::default());
        let config = planner_config();
        let gateway = Arc::new(AuthGateway::new(transport.clone(), sessions.clone(), &config));
        let signed_in = |id_token: &str, expires_at: UtcDateTime| SessionState {
            pending_sign_in: None,
            session: Some(AuthSession {
                uid: "u1".to_owned(),
                id_token: id_token.to_owned(),
                refresh_token: "refresh-1".to_owned(),
                expires_at,
                email: None,
            }),
        };
        let source = FirestoreSource::new(transport.clone(), &config, gateway);
        let query = DocumentQuery::collection("gamedays");

        sessions
            .save(&signed_in("first", UtcDateTime::now() + Duration::hours(1)))
            .await
            .unwrap();
        source.run_query(&query).await.unwrap();

        sessions
            .save(&signed_in("first", UtcDateTime::now() + Duration::minutes(-1)))
            .await
            .unwrap();
        source.run_query(&query).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].bearer.as_deref(), Some("first"));
        assert!(requests[1].url.as_str().starts_with("https://securetoken.googleapis.com/"));
        assert_eq!(requests[2].bearer.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn signed_out_sources_fail() {
        let transport = Arc::new(ScriptedTransport::new());
        let gateway = AuthGateway::new(
            transport.clone(),
            Arc::new(MemorySessionStore::default()),
            &planner_config(),
        );
        let source = FirestoreSource::new(transport.clone(), &planner_config(), Arc::new(gateway));

        let result = source.run_query(&DocumentQuery::collection("gamedays")).await;

        assert!(matches!(result, Err(SourceError::Auth(AuthError::NotSignedIn))));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn legacy_timestamps() {
        let expected = Some(UtcDateTime::from(datetime!(2026-01-10 18:00 UTC)));
        let document = Document::new("t1")
            .with("iso", Value::String("2026-01-10T18:00:00Z".to_owned()))
            .with("millis", Value::Integer(1_768_068_000_000))
            .with(
                "seconds",
                Value::Map(BTreeMap::from([(
                    "seconds".to_owned(),
                    Value::Integer(1_768_068_000),
                )])),
            );

        assert_eq!(document.timestamp("iso"), expected);
        assert_eq!(document.timestamp("millis"), expected);
        assert_eq!(document.timestamp("seconds"), expected);
        assert_eq!(document.timestamp("missing"), None);
    }
}
