//! In-memory `IngestStore` for dry runs and tests. Mirrors the primary-key and
//! foreign-key behavior of the PostgreSQL schema.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tagpulse_core::{QaReply, QaThread, RepoItem};
use tokio::sync::Mutex;

use crate::{IngestStore, InsertOutcome, QaTables, RepoTable, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuestion {
    pub question_id: i64,
    pub title: String,
    pub body: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAnswer {
    pub answer_id: i64,
    pub question_id: i64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRepoRow {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug)]
enum Table {
    Questions(BTreeMap<i64, StoredQuestion>),
    Answers {
        parent: String,
        rows: BTreeMap<i64, StoredAnswer>,
    },
    Repo {
        next_id: i64,
        rows: Vec<StoredRepoRow>,
    },
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn questions(&self, table: &str) -> Vec<StoredQuestion> {
        match self.tables.lock().await.get(table) {
            Some(Table::Questions(rows)) => rows.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub async fn answers(&self, table: &str) -> Vec<StoredAnswer> {
        match self.tables.lock().await.get(table) {
            Some(Table::Answers { rows, .. }) => rows.values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub async fn repo_rows(&self, table: &str) -> Vec<StoredRepoRow> {
        match self.tables.lock().await.get(table) {
            Some(Table::Repo { rows, .. }) => rows.clone(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_questions_table(&self, tables: &QaTables) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .entry(tables.questions().to_string())
            .or_insert_with(|| Table::Questions(BTreeMap::new()));
        Ok(())
    }

    async fn create_answers_table(&self, tables: &QaTables) -> Result<(), StoreError> {
        let mut guard = self.tables.lock().await;
        if !matches!(guard.get(tables.questions()), Some(Table::Questions(_))) {
            return Err(StoreError::MissingTable(tables.questions().to_string()));
        }
        guard
            .entry(tables.answers().to_string())
            .or_insert_with(|| Table::Answers {
                parent: tables.questions().to_string(),
                rows: BTreeMap::new(),
            });
        Ok(())
    }

    async fn create_repo_table(&self, table: &RepoTable) -> Result<(), StoreError> {
        self.tables
            .lock()
            .await
            .entry(table.name().to_string())
            .or_insert_with(|| Table::Repo {
                next_id: 1,
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn insert_question_if_absent(
        &self,
        tables: &QaTables,
        thread: &QaThread,
        link: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let mut guard = self.tables.lock().await;
        let Some(Table::Questions(rows)) = guard.get_mut(tables.questions()) else {
            return Err(StoreError::MissingTable(tables.questions().to_string()));
        };
        if rows.contains_key(&thread.question_id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        rows.insert(
            thread.question_id,
            StoredQuestion {
                question_id: thread.question_id,
                title: thread.title.clone(),
                body: thread.body.clone(),
                link: link.to_string(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_answer_if_absent(
        &self,
        tables: &QaTables,
        question_id: i64,
        reply: &QaReply,
    ) -> Result<InsertOutcome, StoreError> {
        let mut guard = self.tables.lock().await;
        let parent = match guard.get(tables.answers()) {
            Some(Table::Answers { parent, rows }) => {
                // ON CONFLICT DO NOTHING wins before the foreign key is checked.
                if rows.contains_key(&reply.answer_id) {
                    return Ok(InsertOutcome::AlreadyPresent);
                }
                parent.clone()
            }
            _ => return Err(StoreError::MissingTable(tables.answers().to_string())),
        };

        let parent_has_row = matches!(
            guard.get(&parent),
            Some(Table::Questions(rows)) if rows.contains_key(&question_id)
        );
        if !parent_has_row {
            return Err(StoreError::ForeignKey {
                table: tables.answers().to_string(),
                parent,
                question_id,
            });
        }

        if let Some(Table::Answers { rows, .. }) = guard.get_mut(tables.answers()) {
            rows.insert(
                reply.answer_id,
                StoredAnswer {
                    answer_id: reply.answer_id,
                    question_id,
                    body: reply.body.clone(),
                },
            );
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn insert_repo_item(&self, table: &RepoTable, item: &RepoItem) -> Result<(), StoreError> {
        let mut guard = self.tables.lock().await;
        let Some(Table::Repo { next_id, rows }) = guard.get_mut(table.name()) else {
            return Err(StoreError::MissingTable(table.name().to_string()));
        };
        rows.push(StoredRepoRow {
            id: *next_id,
            title: item.body.clone(),
            body: item.body.clone(),
            labels: vec![item.kind.as_str().to_string()],
        });
        *next_id += 1;
        Ok(())
    }
}
