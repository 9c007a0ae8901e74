//! Core domain model for tagpulse: tracked entities, fetched records and lookback windows.

use std::fmt;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "tagpulse-core";

/// Longest entity key accepted. `so_<key>_questions` must stay under the
/// 63-byte PostgreSQL identifier limit.
pub const MAX_ENTITY_KEY_LEN: usize = 48;

pub const STACKOVERFLOW_PERMALINK_BASE: &str = "https://stackoverflow.com/q/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("entity name is empty")]
    Empty,
    #[error("entity name {name:?} has no alphanumeric characters")]
    NoAlphanumeric { name: String },
    #[error("entity name {name:?} is {len} characters long (max {max})")]
    TooLong { name: String, len: usize, max: usize },
    #[error("entity name {name:?} contains disallowed character {ch:?}")]
    InvalidChar { name: String, ch: char },
    #[error("repository coordinate {value:?} contains disallowed character {ch:?}")]
    InvalidRepoCoordinate { value: String, ch: char },
}

/// Sanitized token derived from an entity name, safe to splice into table names.
///
/// Only `[a-z0-9_]` survives construction: ASCII letters are lowercased and `-`/`.`
/// fold to `_`. Anything else (quotes, semicolons, whitespace, non-ASCII) is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }

        let mut key = String::with_capacity(trimmed.len());
        for ch in trimmed.chars() {
            match ch {
                'a'..='z' | '0'..='9' | '_' => key.push(ch),
                'A'..='Z' => key.push(ch.to_ascii_lowercase()),
                '-' | '.' => key.push('_'),
                other => {
                    return Err(IdentifierError::InvalidChar {
                        name: raw.to_string(),
                        ch: other,
                    })
                }
            }
        }

        if !key.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(IdentifierError::NoAlphanumeric {
                name: raw.to_string(),
            });
        }
        if key.len() > MAX_ENTITY_KEY_LEN {
            return Err(IdentifierError::TooLong {
                name: raw.to_string(),
                len: key.len(),
                max: MAX_ENTITY_KEY_LEN,
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_repo_coordinate(value: &str) -> Result<String, IdentifierError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if let Some(ch) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(IdentifierError::InvalidRepoCoordinate {
            value: value.to_string(),
            ch,
        });
    }
    Ok(value.to_string())
}

/// A tracked project: the Q&A tag it is known by and the repository it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedEntity {
    name: String,
    key: EntityKey,
    owner: String,
    repo: String,
}

impl TrackedEntity {
    pub fn new(
        name: impl Into<String>,
        owner: &str,
        repo: &str,
    ) -> Result<Self, IdentifierError> {
        let name = name.into();
        let key = EntityKey::parse(&name)?;
        Ok(Self {
            name,
            key,
            owner: validate_repo_coordinate(owner)?,
            repo: validate_repo_coordinate(repo)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Tag used when querying the Q&A site. Tags there are lowercase.
    pub fn qa_tag(&self) -> String {
        self.name.trim().to_ascii_lowercase()
    }
}

/// Built-in roster of tracked projects.
pub fn default_roster() -> Result<Vec<TrackedEntity>, IdentifierError> {
    [
        ("Prometheus", "prometheus", "prometheus"),
        ("Selenium", "SeleniumHQ", "selenium"),
        ("OpenAI", "openai", "gym"),
        ("Docker", "docker", "docker"),
        ("Milvus", "milvus-io", "milvus"),
        ("Go", "golang", "go"),
    ]
    .into_iter()
    .map(|(name, owner, repo)| TrackedEntity::new(name, owner, repo))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaReply {
    pub answer_id: i64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaThread {
    pub question_id: i64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub replies: Vec<QaReply>,
}

impl QaThread {
    pub fn permalink(&self) -> String {
        format!("{STACKOVERFLOW_PERMALINK_BASE}{}", self.question_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Question,
    Answer,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Question => "Question",
            ItemKind::Answer => "Answer",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue (`Question`) or one of its comments (`Answer`). Carries no identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoItem {
    pub kind: ItemKind,
    pub body: String,
}

impl RepoItem {
    pub fn question(body: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Question,
            body: body.into(),
        }
    }

    pub fn answer(body: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Answer,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    StackOverflow,
    Github,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::StackOverflow, SourceKind::Github];

    /// Label value for the per-call rate summaries.
    pub fn endpoint_label(self) -> &'static str {
        match self {
            SourceKind::StackOverflow => "stackoverflow_endpoint",
            SourceKind::Github => "github_endpoint",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::StackOverflow => "stackoverflow",
            SourceKind::Github => "github",
        }
    }
}

/// The three lookback durations that own a bucketed counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookbackWindow {
    Short,
    Medium,
    Long,
}

impl LookbackWindow {
    pub const ALL: [LookbackWindow; 3] = [
        LookbackWindow::Short,
        LookbackWindow::Medium,
        LookbackWindow::Long,
    ];

    pub fn days(self) -> i64 {
        match self {
            LookbackWindow::Short => 2,
            LookbackWindow::Medium => 7,
            LookbackWindow::Long => 45,
        }
    }

    pub fn duration(self) -> TimeDelta {
        TimeDelta::days(self.days())
    }

    /// Exact match only; 3 days or 2 days plus a second map to `None`.
    pub fn from_duration(lookback: TimeDelta) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.duration() == lookback)
    }
}
