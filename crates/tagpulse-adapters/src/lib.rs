//! Source client contracts + the Stack Exchange and GitHub implementations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tagpulse_core::{QaReply, QaThread, RepoItem, SourceKind};
use tagpulse_storage::{FetchError, HttpClientConfig, HttpFetcher};
use tracing::info;

pub const CRATE_NAME: &str = "tagpulse-adapters";

pub const STACKEXCHANGE_BASE_URL: &str = "https://api.stackexchange.com/2.2";
pub const STACKEXCHANGE_SITE: &str = "stackoverflow";
pub const GITHUB_BASE_URL: &str = "https://api.github.com";

/// Threads per tag and replies per thread requested from the Q&A site.
pub const QA_PAGE_SIZE: u32 = 5;

/// Receives one observation per successful fetch.
pub trait CallObserver: Send + Sync {
    fn observe_call(&self, source: SourceKind, rate_per_second: f64);
}

/// Instantaneous call rate for one fetch. A zero elapsed time counts as one second.
pub fn call_rate(elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        1.0
    } else {
        1.0 / secs
    }
}

#[async_trait]
pub trait QaSource: Send + Sync {
    async fn fetch_threads(
        &self,
        tag: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<QaThread>, FetchError>;
}

#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch_items(
        &self,
        owner: &str,
        repo: &str,
        credential: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RepoItem>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct QuestionItem {
    question_id: i64,
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct AnswerItem {
    answer_id: i64,
    body: String,
}

pub struct StackExchangeClient {
    http: HttpFetcher,
    base_url: String,
    site: String,
    observer: Arc<dyn CallObserver>,
}

impl StackExchangeClient {
    pub fn new(
        config: HttpClientConfig,
        base_url: impl Into<String>,
        site: impl Into<String>,
        observer: Arc<dyn CallObserver>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            site: site.into(),
            observer,
        })
    }

    fn questions_query(&self, tag: &str, since: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("order", "desc".to_string()),
            ("sort", "activity".to_string()),
            ("tagged", tag.to_string()),
            ("site", self.site.clone()),
            ("filter", "withbody".to_string()),
            ("pagesize", QA_PAGE_SIZE.to_string()),
        ];
        if let Some(since) = since {
            query.push(("fromdate", since.timestamp().to_string()));
        }
        query
    }

    fn answers_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("order", "desc".to_string()),
            ("sort", "activity".to_string()),
            ("site", self.site.clone()),
            ("filter", "withbody".to_string()),
            ("pagesize", QA_PAGE_SIZE.to_string()),
        ]
    }
}

#[async_trait]
impl QaSource for StackExchangeClient {
    async fn fetch_threads(
        &self,
        tag: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<QaThread>, FetchError> {
        let start = Instant::now();
        let questions: ItemsEnvelope<QuestionItem> = self
            .http
            .get_json(
                &format!("{}/questions", self.base_url),
                &self.questions_query(tag, since),
                None,
            )
            .await?;

        let mut threads = Vec::with_capacity(questions.items.len());
        for question in questions.items {
            let answers: ItemsEnvelope<AnswerItem> = self
                .http
                .get_json(
                    &format!("{}/questions/{}/answers", self.base_url, question.question_id),
                    &self.answers_query(),
                    None,
                )
                .await?;
            threads.push(QaThread {
                question_id: question.question_id,
                title: question.title,
                body: question.body,
                replies: answers
                    .items
                    .into_iter()
                    .map(|a| QaReply {
                        answer_id: a.answer_id,
                        body: a.body,
                    })
                    .collect(),
            });
        }

        self.observer
            .observe_call(SourceKind::StackOverflow, call_rate(start.elapsed()));
        info!(
            tag,
            threads = threads.len(),
            replies = threads.iter().map(|t| t.replies.len()).sum::<usize>(),
            "fetched qa threads"
        );
        Ok(threads)
    }
}

#[derive(Debug, Deserialize)]
struct IssueItem {
    number: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentItem {
    #[serde(default)]
    body: Option<String>,
}

pub struct GithubClient {
    http: HttpFetcher,
    base_url: String,
    observer: Arc<dyn CallObserver>,
}

impl GithubClient {
    pub fn new(
        mut config: HttpClientConfig,
        base_url: impl Into<String>,
        observer: Arc<dyn CallObserver>,
    ) -> anyhow::Result<Self> {
        config
            .default_headers
            .push(("accept", "application/vnd.github+json".to_string()));
        config
            .default_headers
            .push(("x-github-api-version", "2022-11-28".to_string()));
        Ok(Self {
            http: HttpFetcher::new(config)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            observer,
        })
    }
}

#[async_trait]
impl RepoSource for GithubClient {
    async fn fetch_items(
        &self,
        owner: &str,
        repo: &str,
        credential: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RepoItem>, FetchError> {
        let start = Instant::now();
        let mut query = vec![("state", "open".to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let issues: Vec<IssueItem> = self
            .http
            .get_json(
                &format!("{}/repos/{owner}/{repo}/issues", self.base_url),
                &query,
                Some(credential),
            )
            .await?;

        let mut items = Vec::new();
        for issue in issues {
            let comments: Vec<CommentItem> = self
                .http
                .get_json(
                    &format!(
                        "{}/repos/{owner}/{repo}/issues/{}/comments",
                        self.base_url, issue.number
                    ),
                    &[],
                    Some(credential),
                )
                .await?;

            items.push(RepoItem::question(issue.body.unwrap_or_default()));
            items.extend(
                comments
                    .into_iter()
                    .map(|c| RepoItem::answer(c.body.unwrap_or_default())),
            );
        }

        self.observer
            .observe_call(SourceKind::Github, call_rate(start.elapsed()));
        info!(owner, repo, items = items.len(), "fetched repository items");
        Ok(items)
    }
}
