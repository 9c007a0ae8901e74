//! HTTP fetch utilities + per-entity relational storage for tagpulse.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use tagpulse_core::{EntityKey, ItemKind, QaReply, QaThread, RepoItem};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

pub mod memory;

pub use memory::MemoryStore;

pub const CRATE_NAME: &str = "tagpulse-storage";

#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
    pub default_headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("credential rejected (http 401) for {url}")]
    Unauthorized { url: String },
    /// GitHub answers 403 both for missing scopes and for an exhausted rate limit.
    #[error("access forbidden or rate limited (http 403) for {url}")]
    Forbidden { url: String },
    #[error("unexpected response shape from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name}"))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .default_headers(headers);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    /// Single GET decoded as JSON. Any transport error, non-2xx status or shape
    /// mismatch is returned as-is; there is no retry.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> Result<T, FetchError> {
        let span = info_span!("http_fetch", url);
        async move {
            let mut request = self.client.get(url).query(query);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let resp = request.send().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            let status = resp.status();
            let final_url = resp.url().to_string();

            if status == StatusCode::UNAUTHORIZED {
                return Err(FetchError::Unauthorized { url: final_url });
            }
            if status == StatusCode::FORBIDDEN {
                return Err(FetchError::Forbidden { url: final_url });
            }
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.bytes().await.map_err(|source| FetchError::Request {
                url: final_url.clone(),
                source,
            })?;
            debug!(status = status.as_u16(), bytes = body.len(), "response received");
            serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
                url: final_url,
                source,
            })
        }
        .instrument(span)
        .await
    }
}

/// Question/answer table pair for one entity. Only constructible from a sanitized key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaTables {
    questions: String,
    answers: String,
}

impl QaTables {
    pub fn for_entity(key: &EntityKey) -> Self {
        Self {
            questions: format!("so_{key}_questions"),
            answers: format!("so_{key}_answers"),
        }
    }

    pub fn questions(&self) -> &str {
        &self.questions
    }

    pub fn answers(&self) -> &str {
        &self.answers
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTable {
    name: String,
}

impl RepoTable {
    pub fn for_entity(key: &EntityKey) -> Self {
        Self {
            name: format!("github_{key}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("{table} references missing question_id {question_id} in {parent}")]
    ForeignKey {
        table: String,
        parent: String,
        question_id: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key was already present; nothing was written.
    AlreadyPresent,
}

/// Backend seam for the provisioner and writer.
#[async_trait]
pub trait IngestStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn create_questions_table(&self, tables: &QaTables) -> Result<(), StoreError>;

    async fn create_answers_table(&self, tables: &QaTables) -> Result<(), StoreError>;

    async fn create_repo_table(&self, table: &RepoTable) -> Result<(), StoreError>;

    async fn insert_question_if_absent(
        &self,
        tables: &QaTables,
        thread: &QaThread,
        link: &str,
    ) -> Result<InsertOutcome, StoreError>;

    async fn insert_answer_if_absent(
        &self,
        tables: &QaTables,
        question_id: i64,
        reply: &QaReply,
    ) -> Result<InsertOutcome, StoreError>;

    async fn insert_repo_item(&self, table: &RepoTable, item: &RepoItem) -> Result<(), StoreError>;
}

fn questions_ddl(tables: &QaTables) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            question_id INTEGER PRIMARY KEY,
            title TEXT,
            body TEXT,
            link TEXT
        )",
        tables.questions()
    )
}

fn answers_ddl(tables: &QaTables) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            answer_id INTEGER PRIMARY KEY,
            question_id INTEGER REFERENCES {}(question_id),
            body TEXT
        )",
        tables.answers(),
        tables.questions()
    )
}

fn repo_ddl(table: &RepoTable) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id SERIAL PRIMARY KEY,
            title TEXT,
            body TEXT,
            labels TEXT[]
        )",
        table.name()
    )
}

fn outcome_from_rows(rows_affected: u64) -> InsertOutcome {
    if rows_affected == 0 {
        InsertOutcome::AlreadyPresent
    } else {
        InsertOutcome::Inserted
    }
}

/// PostgreSQL backend. The pool is opened once and reused for the process lifetime.
#[derive(Debug, Clone)]
pub struct PgIngestStore {
    pool: PgPool,
}

impl PgIngestStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IngestStore for PgIngestStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn create_questions_table(&self, tables: &QaTables) -> Result<(), StoreError> {
        sqlx::query(&questions_ddl(tables)).execute(&self.pool).await?;
        Ok(())
    }

    async fn create_answers_table(&self, tables: &QaTables) -> Result<(), StoreError> {
        sqlx::query(&answers_ddl(tables)).execute(&self.pool).await?;
        Ok(())
    }

    async fn create_repo_table(&self, table: &RepoTable) -> Result<(), StoreError> {
        sqlx::query(&repo_ddl(table)).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_question_if_absent(
        &self,
        tables: &QaTables,
        thread: &QaThread,
        link: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let sql = format!(
            "INSERT INTO {} (question_id, title, body, link) VALUES ($1, $2, $3, $4)
             ON CONFLICT (question_id) DO NOTHING",
            tables.questions()
        );
        let result = sqlx::query(&sql)
            .bind(thread.question_id)
            .bind(&thread.title)
            .bind(&thread.body)
            .bind(link)
            .execute(&self.pool)
            .await?;
        Ok(outcome_from_rows(result.rows_affected()))
    }

    async fn insert_answer_if_absent(
        &self,
        tables: &QaTables,
        question_id: i64,
        reply: &QaReply,
    ) -> Result<InsertOutcome, StoreError> {
        let sql = format!(
            "INSERT INTO {} (answer_id, question_id, body) VALUES ($1, $2, $3)
             ON CONFLICT (answer_id) DO NOTHING",
            tables.answers()
        );
        let result = sqlx::query(&sql)
            .bind(reply.answer_id)
            .bind(question_id)
            .bind(&reply.body)
            .execute(&self.pool)
            .await?;
        Ok(outcome_from_rows(result.rows_affected()))
    }

    async fn insert_repo_item(&self, table: &RepoTable, item: &RepoItem) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (title, body, labels) VALUES ($1, $2, $3)",
            table.name()
        );
        sqlx::query(&sql)
            .bind(&item.body)
            .bind(&item.body)
            .bind(vec![item.kind.as_str().to_string()])
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("ensuring table {table}: {source}")]
pub struct SchemaError {
    pub table: String,
    #[source]
    pub source: StoreError,
}

/// Ensure the entity's question and answer tables exist. Safe to call on every pass.
pub async fn ensure_qa_schema(
    store: &dyn IngestStore,
    key: &EntityKey,
) -> Result<QaTables, SchemaError> {
    let tables = QaTables::for_entity(key);
    store
        .create_questions_table(&tables)
        .await
        .map_err(|source| SchemaError {
            table: tables.questions().to_string(),
            source,
        })?;
    store
        .create_answers_table(&tables)
        .await
        .map_err(|source| SchemaError {
            table: tables.answers().to_string(),
            source,
        })?;
    Ok(tables)
}

pub async fn ensure_repo_schema(
    store: &dyn IngestStore,
    key: &EntityKey,
) -> Result<RepoTable, SchemaError> {
    let table = RepoTable::for_entity(key);
    store
        .create_repo_table(&table)
        .await
        .map_err(|source| SchemaError {
            table: table.name().to_string(),
            source,
        })?;
    Ok(table)
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("inserting question {question_id} into {table}: {source}")]
    Question {
        table: String,
        question_id: i64,
        #[source]
        source: StoreError,
    },
    #[error("inserting answer {answer_id} (question {question_id}) into {table}: {source}")]
    Answer {
        table: String,
        question_id: i64,
        answer_id: i64,
        #[source]
        source: StoreError,
    },
    #[error("inserting {kind} item #{index} into {table}: {source}")]
    RepoItem {
        table: String,
        index: usize,
        kind: ItemKind,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QaWriteSummary {
    pub questions_inserted: usize,
    pub questions_skipped: usize,
    pub answers_inserted: usize,
    pub answers_skipped: usize,
}

/// Provision then insert threads and replies, skipping keys already stored.
///
/// The first failing insert aborts the batch; rows written before it stay committed.
pub async fn write_qa_data(
    store: &dyn IngestStore,
    threads: &[QaThread],
    key: &EntityKey,
) -> Result<QaWriteSummary, WriteError> {
    let tables = ensure_qa_schema(store, key).await?;
    let mut summary = QaWriteSummary::default();

    for thread in threads {
        let outcome = store
            .insert_question_if_absent(&tables, thread, &thread.permalink())
            .await
            .map_err(|source| WriteError::Question {
                table: tables.questions().to_string(),
                question_id: thread.question_id,
                source,
            })?;
        match outcome {
            InsertOutcome::Inserted => summary.questions_inserted += 1,
            InsertOutcome::AlreadyPresent => summary.questions_skipped += 1,
        }

        for reply in &thread.replies {
            let outcome = store
                .insert_answer_if_absent(&tables, thread.question_id, reply)
                .await
                .map_err(|source| WriteError::Answer {
                    table: tables.answers().to_string(),
                    question_id: thread.question_id,
                    answer_id: reply.answer_id,
                    source,
                })?;
            match outcome {
                InsertOutcome::Inserted => summary.answers_inserted += 1,
                InsertOutcome::AlreadyPresent => summary.answers_skipped += 1,
            }
        }
    }

    debug!(
        entity = %key,
        backend = store.backend(),
        questions_inserted = summary.questions_inserted,
        questions_skipped = summary.questions_skipped,
        answers_inserted = summary.answers_inserted,
        answers_skipped = summary.answers_skipped,
        "qa data written"
    );
    Ok(summary)
}

/// Provision then append every item. There is no de-duplication key, so repeated
/// passes accumulate duplicate rows.
pub async fn write_repo_data(
    store: &dyn IngestStore,
    items: &[RepoItem],
    key: &EntityKey,
) -> Result<usize, WriteError> {
    let table = ensure_repo_schema(store, key).await?;

    for (index, item) in items.iter().enumerate() {
        store
            .insert_repo_item(&table, item)
            .await
            .map_err(|source| WriteError::RepoItem {
                table: table.name().to_string(),
                index,
                kind: item.kind,
                source,
            })?;
    }

    debug!(entity = %key, backend = store.backend(), rows = items.len(), "repo data written");
    Ok(items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde::Deserialize;
    use tokio::net::TcpListener;

    fn key(name: &str) -> EntityKey {
        EntityKey::parse(name).expect("valid key")
    }

    fn thread(question_id: i64, replies: &[i64]) -> QaThread {
        QaThread {
            question_id,
            title: format!("title {question_id}"),
            body: format!("body {question_id}"),
            replies: replies
                .iter()
                .map(|answer_id| QaReply {
                    answer_id: *answer_id,
                    body: format!("answer {answer_id}"),
                })
                .collect(),
        }
    }

    async fn spawn_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        tagged: String,
        auth: Option<String>,
    }

    fn echo_router() -> Router {
        Router::new()
            .route(
                "/echo",
                get(
                    |Query(q): Query<HashMap<String, String>>, headers: AxumHeaders| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        Json(serde_json::json!({
                            "tagged": q.get("tagged").cloned().unwrap_or_default(),
                            "auth": auth,
                        }))
                    },
                ),
            )
            .route("/denied", get(|| async { AxumStatus::UNAUTHORIZED }))
            .route("/forbidden", get(|| async { AxumStatus::FORBIDDEN }))
            .route("/broken", get(|| async { AxumStatus::BAD_GATEWAY }))
            .route("/garbage", get(|| async { "not json" }))
    }

    #[tokio::test]
    async fn get_json_sends_query_and_bearer() {
        let base = spawn_server(echo_router()).await;
        let fetcher = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let echo: Echo = fetcher
            .get_json(
                &format!("{base}/echo"),
                &[("tagged", "go".to_string())],
                Some("secret"),
            )
            .await
            .unwrap();
        assert_eq!(
            echo,
            Echo {
                tagged: "go".into(),
                auth: Some("Bearer secret".into()),
            }
        );
    }

    #[tokio::test]
    async fn get_json_classifies_failures() {
        let base = spawn_server(echo_router()).await;
        let fetcher = HttpFetcher::new(HttpClientConfig::default()).unwrap();

        let denied = fetcher
            .get_json::<Echo>(&format!("{base}/denied"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(denied, FetchError::Unauthorized { .. }));

        let forbidden = fetcher
            .get_json::<Echo>(&format!("{base}/forbidden"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(forbidden, FetchError::Forbidden { .. }));
        assert!(forbidden.to_string().contains("rate limited"));

        let broken = fetcher
            .get_json::<Echo>(&format!("{base}/broken"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(broken, FetchError::HttpStatus { status: 502, .. }));

        let garbage = fetcher
            .get_json::<Echo>(&format!("{base}/garbage"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(garbage, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn get_json_reports_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let fetcher = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let err = fetcher
            .get_json::<Echo>(&format!("http://{addr}/echo"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[test]
    fn invalid_default_header_is_rejected() {
        let err = HttpFetcher::new(HttpClientConfig {
            default_headers: vec![("accept", "bad\nvalue".to_string())],
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("accept"));
    }

    #[test]
    fn table_names_are_namespaced_by_key() {
        let tables = QaTables::for_entity(&key("Prometheus"));
        assert_eq!(tables.questions(), "so_prometheus_questions");
        assert_eq!(tables.answers(), "so_prometheus_answers");
        assert_eq!(RepoTable::for_entity(&key("milvus-io")).name(), "github_milvus_io");
    }

    #[test]
    fn ddl_matches_persisted_shapes() {
        let tables = QaTables::for_entity(&key("go"));
        let answers = answers_ddl(&tables);
        assert!(questions_ddl(&tables).starts_with("CREATE TABLE IF NOT EXISTS so_go_questions"));
        assert!(answers.contains("question_id INTEGER REFERENCES so_go_questions(question_id)"));
        assert!(repo_ddl(&RepoTable::for_entity(&key("go"))).contains("labels TEXT[]"));
    }

    #[tokio::test]
    async fn ensuring_schema_twice_is_a_no_op() {
        let store = MemoryStore::new();
        let go = key("go");
        ensure_qa_schema(&store, &go).await.unwrap();
        ensure_repo_schema(&store, &go).await.unwrap();
        write_qa_data(&store, &[thread(1, &[11])], &go).await.unwrap();

        ensure_qa_schema(&store, &go).await.unwrap();
        ensure_repo_schema(&store, &go).await.unwrap();

        assert_eq!(
            store.table_names().await,
            vec!["github_go", "so_go_answers", "so_go_questions"]
        );
        assert_eq!(store.questions("so_go_questions").await.len(), 1);
        assert_eq!(store.answers("so_go_answers").await.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_question_ids_keep_first_row() {
        let store = MemoryStore::new();
        let go = key("go");
        write_qa_data(&store, &[thread(7, &[70])], &go).await.unwrap();

        let mut changed = thread(7, &[70]);
        changed.title = "rewritten".into();
        let summary = write_qa_data(&store, &[changed], &go).await.unwrap();

        assert_eq!(summary.questions_skipped, 1);
        assert_eq!(summary.answers_skipped, 1);
        let rows = store.questions("so_go_questions").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "title 7");
        assert_eq!(rows[0].link, "https://stackoverflow.com/q/7");
    }

    #[tokio::test]
    async fn orphan_reply_is_rejected() {
        let store = MemoryStore::new();
        let tables = ensure_qa_schema(&store, &key("go")).await.unwrap();
        let err = store
            .insert_answer_if_absent(
                &tables,
                404,
                &QaReply {
                    answer_id: 1,
                    body: "orphan".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { question_id: 404, .. }));
        assert!(store.answers("so_go_answers").await.is_empty());
    }

    #[tokio::test]
    async fn two_threads_yield_two_questions_and_one_answer() {
        let store = MemoryStore::new();
        let summary = write_qa_data(&store, &[thread(1001, &[]), thread(1002, &[5001])], &key("go"))
            .await
            .unwrap();
        assert_eq!(summary.questions_inserted, 2);
        assert_eq!(summary.answers_inserted, 1);

        let questions = store.questions("so_go_questions").await;
        let answers = store.answers("so_go_answers").await;
        assert_eq!(questions.len(), 2);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_id, 1002);
    }

    #[tokio::test]
    async fn repo_items_are_appended_with_kind_labels() {
        let store = MemoryStore::new();
        let items = vec![
            RepoItem::question("A"),
            RepoItem::answer("B"),
            RepoItem::answer("C"),
        ];
        let written = write_repo_data(&store, &items, &key("docker")).await.unwrap();
        assert_eq!(written, 3);

        let rows = store.repo_rows("github_docker").await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].labels, vec!["Question"]);
        assert_eq!(rows[1].labels, vec!["Answer"]);
        assert_eq!(rows[2].labels, vec!["Answer"]);
        assert_eq!((rows[0].title.as_str(), rows[0].body.as_str()), ("A", "A"));

        write_repo_data(&store, &items, &key("docker")).await.unwrap();
        assert_eq!(store.repo_rows("github_docker").await.len(), 6);
    }

    /// Delegates to a `MemoryStore` but fails inserts for one question id.
    struct FailingStore {
        inner: MemoryStore,
        fail_question: i64,
    }

    #[async_trait]
    impl IngestStore for FailingStore {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn create_questions_table(&self, tables: &QaTables) -> Result<(), StoreError> {
            self.inner.create_questions_table(tables).await
        }

        async fn create_answers_table(&self, tables: &QaTables) -> Result<(), StoreError> {
            self.inner.create_answers_table(tables).await
        }

        async fn create_repo_table(&self, table: &RepoTable) -> Result<(), StoreError> {
            Err(StoreError::MissingTable(table.name().to_string()))
        }

        async fn insert_question_if_absent(
            &self,
            tables: &QaTables,
            thread: &QaThread,
            link: &str,
        ) -> Result<InsertOutcome, StoreError> {
            if thread.question_id == self.fail_question {
                return Err(StoreError::MissingTable(tables.questions().to_string()));
            }
            self.inner.insert_question_if_absent(tables, thread, link).await
        }

        async fn insert_answer_if_absent(
            &self,
            tables: &QaTables,
            question_id: i64,
            reply: &QaReply,
        ) -> Result<InsertOutcome, StoreError> {
            self.inner.insert_answer_if_absent(tables, question_id, reply).await
        }

        async fn insert_repo_item(
            &self,
            table: &RepoTable,
            item: &RepoItem,
        ) -> Result<(), StoreError> {
            self.inner.insert_repo_item(table, item).await
        }
    }

    #[tokio::test]
    async fn first_failure_aborts_but_keeps_earlier_rows() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            fail_question: 2,
        };
        let err = write_qa_data(
            &store,
            &[thread(1, &[10]), thread(2, &[20]), thread(3, &[])],
            &key("go"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WriteError::Question { question_id: 2, .. }));
        assert!(err.to_string().contains("question 2"));
        let ids: Vec<i64> = store
            .inner
            .questions("so_go_questions")
            .await
            .iter()
            .map(|q| q.question_id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn schema_failure_surfaces_through_repo_write() {
        let store = FailingStore {
            inner: MemoryStore::new(),
            fail_question: 0,
        };
        let err = write_repo_data(&store, &[RepoItem::question("A")], &key("go"))
            .await
            .unwrap_err();
        match err {
            WriteError::Schema(schema) => assert_eq!(schema.table, "github_go"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
