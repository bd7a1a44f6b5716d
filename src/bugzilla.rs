/// Bugzilla REST client: bug list queries and per-bug comment history.
use crate::config::BugzillaConfig;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Fields requested for every bug list query.
const BUG_FIELDS: &str = "id,summary,flags,assigned_to";

/// One bug as returned by a list query.
#[derive(Debug, Clone, Deserialize)]
pub struct Bug {
    pub id: u64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub flags: Vec<Flag>,
    #[serde(default)]
    pub assigned_to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Flag {
    pub name: String,
    #[serde(default)]
    pub requestee: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub setter: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub creation_time: String,
    pub author: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct BugList {
    bugs: Vec<Bug>,
}

#[derive(Debug, Deserialize)]
struct CommentBlock {
    bugs: HashMap<String, CommentEntry>,
}

#[derive(Debug, Deserialize)]
struct CommentEntry {
    #[serde(default)]
    comments: Vec<Comment>,
}

impl Bug {
    /// Requestee of the first `needinfo` flag that names one.
    pub fn needinfo(&self) -> Option<&str> {
        self.flags
            .iter()
            .filter(|f| f.name == "needinfo")
            .find_map(|f| f.requestee.as_deref().filter(|r| !r.is_empty()))
    }

    /// Assignee, or `None` when empty or equal to the `unassigned` sentinel.
    pub fn assignee(&self, unassigned: &str) -> Option<&str> {
        let who = self.assigned_to.as_str();
        if who.is_empty() || who == unassigned {
            None
        } else {
            Some(who)
        }
    }
}

/// Errors produced by Bugzilla requests.
#[derive(Debug)]
pub enum BugzillaError {
    /// Failed to build the HTTP client.
    Client(reqwest::Error),
    /// Transport failure or unreadable body.
    Http { url: String, source: reqwest::Error },
    /// Non-success status code.
    Status { url: String, status: u16 },
    /// Body was not the expected JSON shape.
    Decode {
        url: String,
        source: serde_json::Error,
    },
    /// Comment response had no entry for the requested bug.
    MissingBug(u64),
}

impl std::fmt::Display for BugzillaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BugzillaError::Client(e) => write!(f, "failed to build http client: {e}"),
            BugzillaError::Http { url, source } => write!(f, "request to {url} failed: {source}"),
            BugzillaError::Status { url, status } => {
                write!(f, "request to {url} returned status {status}")
            }
            BugzillaError::Decode { url, source } => {
                write!(f, "bad JSON from {url}: {source}")
            }
            BugzillaError::MissingBug(id) => {
                write!(f, "comment response has no entry for bug {id}")
            }
        }
    }
}

impl std::error::Error for BugzillaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BugzillaError::Client(e) => Some(e),
            BugzillaError::Http { source, .. } => Some(source),
            BugzillaError::Decode { source, .. } => Some(source),
            BugzillaError::Status { .. } | BugzillaError::MissingBug(_) => None,
        }
    }
}

/// Supplies the comment history of a bug.
///
/// The aggregator only needs this one call, so tests can swap in a fake
/// without running an HTTP server.
pub trait BugSource: Send + Sync + 'static {
    fn comments(&self, bug_id: u64)
        -> impl Future<Output = Result<Vec<Comment>, BugzillaError>> + Send;
}

/// Async client for the Bugzilla REST API.
#[derive(Debug, Clone)]
pub struct BugzillaClient {
    http: reqwest::Client,
    config: BugzillaConfig,
}

impl BugzillaClient {
    pub fn new(config: &BugzillaConfig) -> Result<Self, BugzillaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("orange-triage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BugzillaError::Client)?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Open bugs carrying the intermittent-failure keyword.
    pub async fn intermittent_bugs(&self) -> Result<Vec<Bug>, BugzillaError> {
        let mut params = self.common_params();
        params.push(("keywords", self.config.keywords.clone()));
        params.push(("keywords_type", "allwords".to_string()));
        self.list(params).await
    }

    /// Open bugs whose summary contains the perma marker and that changed
    /// on or after `since`.
    pub async fn perma_bugs(&self, since: NaiveDate) -> Result<Vec<Bug>, BugzillaError> {
        let mut params = self.common_params();
        params.push(("short_desc", self.config.perma_marker.clone()));
        params.push(("short_desc_type", "allwordssubstr".to_string()));
        params.push(("last_change_time", since.format("%Y-%m-%d").to_string()));
        self.list(params).await
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("product", self.config.product.clone()),
            ("resolution", "---".to_string()),
            ("include_fields", BUG_FIELDS.to_string()),
        ];
        for component in &self.config.components {
            params.push(("component", component.clone()));
        }
        params
    }

    async fn list(&self, params: Vec<(&'static str, String)>) -> Result<Vec<Bug>, BugzillaError> {
        let url = self.config.base_url.clone();
        let body = self.get_text(&url, &params).await?;
        let list: BugList =
            serde_json::from_str(&body).map_err(|e| BugzillaError::Decode { url, source: e })?;
        tracing::info!(count = list.bugs.len(), "fetched bug list");
        Ok(list.bugs)
    }

    async fn get_text(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<String, BugzillaError> {
        tracing::debug!(url, ?params, "GET");
        let resp = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| BugzillaError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BugzillaError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| BugzillaError::Http {
            url: url.to_string(),
            source: e,
        })
    }
}

impl BugSource for BugzillaClient {
    async fn comments(&self, bug_id: u64) -> Result<Vec<Comment>, BugzillaError> {
        let url = format!(
            "{}/{}/comment",
            self.config.base_url.trim_end_matches('/'),
            bug_id
        );
        let body = self.get_text(&url, &[]).await?;
        let mut block: CommentBlock =
            serde_json::from_str(&body).map_err(|e| BugzillaError::Decode { url, source: e })?;
        block
            .bugs
            .remove(&bug_id.to_string())
            .map(|entry| entry.comments)
            .ok_or(BugzillaError::MissingBug(bug_id))
    }
}
