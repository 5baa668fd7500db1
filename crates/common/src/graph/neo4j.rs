//! Neo4j client over the HTTP transactional endpoint
//!
//! Every call is a single auto-commit transaction:
//! `POST {url}/db/{database}/tx/commit`
//!
//! Entity lookups always match on label plus key property so they hit
//! the per-label index and never cross categories that share an id.

use super::GraphStore;
use crate::config::GraphConfig;
use crate::errors::{AppError, Result};
use crate::models::{Answer, Direction, Entity, EntityId, EntityKey, EntityKind, Question, RelationType, Tag, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const SEARCH_QUERY: &str = "CALL db.index.vector.queryNodes($index, $k, $embedding) \
     YIELD node, score \
     RETURN coalesce(toString(node.id), node.name) AS id, score";

const KEYWORD_QUERY: &str = "CALL db.index.fulltext.queryNodes($index, $query, {limit: $k}) \
     YIELD node, score \
     RETURN coalesce(toString(node.id), node.name) AS id, score";

pub struct Neo4jHttpStore {
    client: reqwest::Client,
    endpoint: String,
    username: String,
    password: Option<String>,
    timeout_ms: u64,
    permits: Arc<Semaphore>,
}

#[derive(Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: Value,
}

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: Vec<Statement<'a>>,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl Neo4jHttpStore {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_max_idle_per_host(config.max_connections)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout_ms: config.timeout_ms,
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Run one statement and return its rows
    async fn run(&self, operation: &str, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>> {
        let _permit = self.permits.acquire().await.map_err(|_| AppError::StoreUnavailable {
            message: "connection pool closed".to_string(),
        })?;

        let body = TxRequest {
            statements: vec![Statement { statement, parameters }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, self.password.as_deref())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, format!("{} returned {}: {}", operation, status, text)));
        }

        let parsed: TxResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(cypher_error(operation, &err));
        }

        Ok(parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .unwrap_or_default())
    }

    fn transport_error(&self, operation: &str, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::StoreTimeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            AppError::StoreUnavailable {
                message: format!("{}: {}", operation, err),
            }
        }
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<Vec<(EntityId, f32)>> {
        let rows = self
            .run(
                "search",
                SEARCH_QUERY,
                json!({ "index": index, "k": k, "embedding": vector }),
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = value_as_id(row.first()?)?;
                let score = row.get(1)?.as_f64()? as f32;
                Some((id, score))
            })
            .collect())
    }

    async fn keyword_search(&self, index: &str, query: &str, k: usize) -> Result<Vec<(EntityId, f32)>> {
        let rows = self
            .run(
                "keyword_search",
                KEYWORD_QUERY,
                json!({ "index": index, "query": query, "k": k }),
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = value_as_id(row.first()?)?;
                let score = row.get(1)?.as_f64()? as f32;
                Some((id, score))
            })
            .collect())
    }

    async fn fetch_entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
        let statement = format!(
            "MATCH {} RETURN labels(n) AS labels, n {{.*, embedding: null}} AS props LIMIT 1",
            node_pattern("n", key.kind)
        );
        let rows = self
            .run("fetch_entity", &statement, json!({ "id": id_param(key) }))
            .await?;

        Ok(rows.into_iter().next().and_then(|row| entity_from_row(&row)))
    }

    async fn fetch_related(
        &self,
        key: &EntityKey,
        relation: RelationType,
        direction: Direction,
    ) -> Result<Vec<Entity>> {
        let statement = related_statement(key.kind, relation, direction);
        let rows = self
            .run("fetch_related", &statement, json!({ "id": id_param(key) }))
            .await?;

        Ok(rows.iter().filter_map(|row| entity_from_row(row)).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.run("ping", "RETURN 1", json!({})).await.map(|_| ())
    }
}

/// `(var:Label {key: $id})`
fn node_pattern(var: &str, kind: EntityKind) -> String {
    format!("({}:{} {{{}: $id}})", var, kind.label(), kind.key_property())
}

fn related_statement(kind: EntityKind, relation: RelationType, direction: Direction) -> String {
    let start = node_pattern("n", kind);
    let far = relation.far_end(direction).label();
    let pattern = match direction {
        Direction::Outgoing => format!("{}-[:{}]->(m:{})", start, relation.as_str(), far),
        Direction::Incoming => format!("{}<-[:{}]-(m:{})", start, relation.as_str(), far),
    };
    format!(
        "MATCH {} RETURN labels(m) AS labels, m {{.*, embedding: null}} AS props",
        pattern
    )
}

/// Numeric ids are stored as integers; tag names and anything else as strings
fn id_param(key: &EntityKey) -> Value {
    match key.kind {
        EntityKind::Tag => json!(key.id.as_str()),
        _ => key
            .id
            .as_str()
            .parse::<i64>()
            .map(|n| json!(n))
            .unwrap_or_else(|_| json!(key.id.as_str())),
    }
}

/// Client errors will fail the same way on retry
fn status_error(status: reqwest::StatusCode, message: String) -> AppError {
    let retryable = status == reqwest::StatusCode::REQUEST_TIMEOUT || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
    if status.is_client_error() && !retryable {
        AppError::StoreRejected { message }
    } else {
        AppError::StoreUnavailable { message }
    }
}

fn cypher_error(operation: &str, err: &TxError) -> AppError {
    let message = format!("{} failed: {} {}", operation, err.code, err.message);
    if err.code.starts_with("Neo.ClientError.") {
        AppError::StoreRejected { message }
    } else {
        AppError::StoreUnavailable { message }
    }
}

fn value_as_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(s) => Some(EntityId::new(s.clone())),
        Value::Number(n) => Some(EntityId::new(n.to_string())),
        _ => None,
    }
}

/// Decode a `[labels, props]` row into a typed entity
fn entity_from_row(row: &[Value]) -> Option<Entity> {
    let kind = row
        .first()?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find_map(EntityKind::from_label)?;
    let props = row.get(1)?.as_object()?;
    entity_from_props(kind, props)
}

fn entity_from_props(kind: EntityKind, props: &Map<String, Value>) -> Option<Entity> {
    let text = |key: &str| props.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let int = |key: &str| props.get(key).and_then(Value::as_i64).unwrap_or_default();
    let created_at = props
        .get("creation_date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let communities = match props.get("communityId") {
        Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_i64).collect(),
        Some(value) => value.as_i64().into_iter().collect(),
        None => Vec::new(),
    };

    let entity = match kind {
        EntityKind::Question => Entity::Question(Question {
            id: value_as_id(props.get("id")?)?,
            title: text("title"),
            body: text("body"),
            link: props.get("link").and_then(Value::as_str).map(str::to_string),
            score: int("score"),
            favorite_count: int("favorite_count"),
            created_at,
            communities,
        }),
        EntityKind::Answer => Entity::Answer(Answer {
            id: value_as_id(props.get("id")?)?,
            body: text("body"),
            score: int("score"),
            is_accepted: props.get("is_accepted").and_then(Value::as_bool).unwrap_or(false),
            created_at,
            communities,
        }),
        EntityKind::User => Entity::User(User {
            id: value_as_id(props.get("id")?)?,
            display_name: text("display_name"),
            reputation: int("reputation"),
            communities,
        }),
        EntityKind::Tag => {
            let name = text("name");
            Entity::Tag(Tag {
                id: EntityId::new(name.clone()),
                name,
                communities,
            })
        }
    };
    Some(entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_row_decoding() {
        let row = vec![
            json!(["Question"]),
            json!({
                "id": 77,
                "title": "How to delete points?",
                "body": "I need to remove vectors",
                "link": "https://example.com/q/77",
                "score": 12,
                "favorite_count": 3,
                "creation_date": "2024-03-01T10:00:00Z",
                "communityId": [4, 9],
                "embedding": null
            }),
        ];

        match entity_from_row(&row) {
            Some(Entity::Question(q)) => {
                assert_eq!(q.id.as_str(), "77");
                assert_eq!(q.score, 12);
                assert!(q.created_at.is_some());
                assert_eq!(q.communities, vec![4, 9]);
            }
            other => panic!("unexpected entity: {:?}", other),
        }
    }

    #[test]
    fn test_tag_uses_name_as_id() {
        let row = vec![json!(["Tag"]), json!({ "name": "qdrant" })];
        let entity = entity_from_row(&row).unwrap();
        assert_eq!(entity.id().as_str(), "qdrant");
        assert_eq!(entity.kind(), EntityKind::Tag);
    }

    #[test]
    fn test_unknown_label_is_skipped() {
        let row = vec![json!(["Paper"]), json!({ "id": 1 })];
        assert!(entity_from_row(&row).is_none());
    }

    #[test]
    fn test_scalar_community_id() {
        let row = vec![json!(["User"]), json!({ "id": 5, "communityId": 3 })];
        assert_eq!(entity_from_row(&row).unwrap().communities(), &[3]);
    }

    #[test]
    fn test_lookups_are_labelled() {
        assert_eq!(node_pattern("n", EntityKind::Question), "(n:Question {id: $id})");
        assert_eq!(node_pattern("n", EntityKind::Tag), "(n:Tag {name: $id})");

        let asked = related_statement(EntityKind::User, RelationType::Asked, Direction::Outgoing);
        assert!(asked.starts_with("MATCH (n:User {id: $id})-[:ASKED]->(m:Question) "));

        let answers = related_statement(EntityKind::Question, RelationType::Answers, Direction::Incoming);
        assert!(answers.starts_with("MATCH (n:Question {id: $id})<-[:ANSWERS]-(m:Answer) "));
    }

    #[test]
    fn test_id_param_types() {
        assert_eq!(id_param(&EntityKey::new(EntityKind::User, "42")), json!(42));
        assert_eq!(id_param(&EntityKey::new(EntityKind::Question, "q-1")), json!("q-1"));
        assert_eq!(id_param(&EntityKey::new(EntityKind::Tag, "42")), json!("42"));
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let syntax = TxError {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "Invalid input".into(),
        };
        let deadlock = TxError {
            code: "Neo.TransientError.Transaction.DeadlockDetected".into(),
            message: "retry".into(),
        };
        assert!(!cypher_error("search", &syntax).is_transient());
        assert!(cypher_error("search", &deadlock).is_transient());

        let unauthorized = status_error(reqwest::StatusCode::UNAUTHORIZED, "401".into());
        assert!(matches!(unauthorized, AppError::StoreRejected { .. }));
        assert!(!unauthorized.is_transient());
        assert!(status_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "503".into()).is_transient());
        assert!(status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "429".into()).is_transient());
    }

    #[test]
    fn test_endpoint_layout() {
        let config = GraphConfig {
            url: "http://graph:7474/".into(),
            database: "qa".into(),
            ..GraphConfig::default()
        };
        let store = Neo4jHttpStore::new(&config).unwrap();
        assert_eq!(store.endpoint, "http://graph:7474/db/qa/tx/commit");
    }
}
