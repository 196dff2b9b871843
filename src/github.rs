use std::sync::Arc;

use arrayvec::ArrayString;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://api.github.com";
/// Github answers this status when the rate limit is exceeded.
pub const RATE_LIMIT_STATUS: u16 = 403;

pub type BoxedGithubClient = Arc<dyn GithubClient>;
/// Trait defining the Github API operations we need.
/// This allows for both real API calls and mock implementations for testing.
#[async_trait]
pub trait GithubClient: Send + Sync {
	/// Create a new issue. One call is one attempt; retrying is up to the caller.
	async fn create_issue(&self, repo: RepoInfo, issue: &NewIssue) -> Result<CreatedIssue, CreateIssueError>;
}

/// Target repository of the migration.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RepoInfo {
	/// Repository owner (Github caps owners at 39 characters)
	owner: ArrayString<39>,
	/// Repository name (Github caps repository names at 100 characters)
	repo: ArrayString<100>,
}

impl RepoInfo {
	pub fn new(owner: &str, repo: &str) -> Result<Self, RepoInfoError> {
		let owner = owner.trim();
		let repo = repo.trim();
		if owner.is_empty() || repo.is_empty() {
			return Err(RepoInfoError::Empty);
		}
		Ok(Self {
			owner: ArrayString::from(owner).map_err(|_| RepoInfoError::OwnerTooLong(owner.to_string()))?,
			repo: ArrayString::from(repo).map_err(|_| RepoInfoError::RepoTooLong(repo.to_string()))?,
		})
	}

	pub fn owner(&self) -> &str {
		self.owner.as_str()
	}

	pub fn repo(&self) -> &str {
		self.repo.as_str()
	}
}

impl std::fmt::Display for RepoInfo {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.owner, self.repo)
	}
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum RepoInfoError {
	#[error("owner and repo must be non-empty")]
	Empty,
	#[error("owner name too long (max 39 chars): {0}")]
	OwnerTooLong(String),
	#[error("repo name too long (max 100 chars): {0}")]
	RepoTooLong(String),
}

/// Request body for issue creation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewIssue {
	pub title: String,
	pub body: String,
	pub labels: Vec<String>,
}

/// Response from Github when creating an issue
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CreatedIssue {
	pub id: u64,
	pub number: u64,
	/// API url of the issue.
	pub url: String,
	pub html_url: String,
}

/// Structured error body Github attaches to failed requests.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ErrorPayload {
	pub message: String,
	pub documentation_url: String,
}
impl ErrorPayload {
	pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(body)
	}
}

/// Why a single issue creation attempt failed.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CreateIssueError {
	/// Github answered with a non-success status.
	#[error("Failed to create issue: {status} - {body}")]
	Api { status: u16, body: String },
	/// The request never got a usable answer.
	#[error("Failed to create issue: {0}")]
	Transport(String),
}
impl CreateIssueError {
	/// Decode the structured error body, if there is one.
	pub fn payload(&self) -> Result<ErrorPayload, PayloadError> {
		match self {
			Self::Api { body, .. } => ErrorPayload::parse(body).map_err(PayloadError::Malformed),
			Self::Transport(_) => Err(PayloadError::NoResponse),
		}
	}

	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api { status, .. } => Some(*status),
			Self::Transport(_) => None,
		}
	}

	pub fn is_rate_limited(&self) -> bool {
		self.status() == Some(RATE_LIMIT_STATUS)
	}
}

/// The failure could not be decoded into an [`ErrorPayload`].
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
	#[error("no response body to decode")]
	NoResponse,
	#[error("malformed error body: {0}")]
	Malformed(#[source] serde_json::Error),
}

//==============================================================================
// Real Github Client Implementation
//==============================================================================

/// Real Github API client that makes HTTP requests
pub struct RealGithubClient {
	http_client: Client,
	github_token: Option<String>,
}

impl RealGithubClient {
	pub fn new(github_token: Option<String>) -> Self {
		Self {
			http_client: Client::new(),
			github_token,
		}
	}

	fn post(&self, url: &str) -> reqwest::RequestBuilder {
		let req = self
			.http_client
			.post(url)
			.header("User-Agent", concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.header("Accept", "application/vnd.github+json");
		match &self.github_token {
			Some(token) => req.header("Authorization", format!("token {token}")),
			None => req,
		}
	}
}

#[async_trait]
impl GithubClient for RealGithubClient {
	async fn create_issue(&self, repo: RepoInfo, issue: &NewIssue) -> Result<CreatedIssue, CreateIssueError> {
		let url = format!("{API_BASE}/repos/{}/{}/issues", repo.owner(), repo.repo());
		let res = self.post(&url).json(issue).send().await.map_err(|e| CreateIssueError::Transport(e.to_string()))?;

		if !res.status().is_success() {
			let status = res.status().as_u16();
			let body = res.text().await.unwrap_or_default();
			return Err(CreateIssueError::Api { status, body });
		}

		res.json::<CreatedIssue>().await.map_err(|e| CreateIssueError::Transport(e.to_string()))
	}
}
