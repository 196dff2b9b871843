//! Mock Github client for testing purposes.
//!
//! Stores created issues in memory and can be scripted to fail the next N
//! attempts, so retry behavior can be exercised without hitting the real API.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use async_trait::async_trait;
use tracing::instrument;

use crate::github::{CreateIssueError, CreatedIssue, GithubClient, NewIssue, RepoInfo};

/// Body Github sends along with a rate-limit 403.
pub const RATE_LIMIT_BODY: &str = r#"{"message":"API rate limit exceeded for user ID 1.","documentation_url":"https://docs.github.com/rest/overview/resources-in-the-rest-api#rate-limiting"}"#;

/// Mock Github client that stores all state in memory.
/// Thread-safe for use in async contexts.
pub struct MockGithubClient {
	/// Counter for generating unique issue IDs
	next_issue_id: AtomicU64,

	/// Per-repo issue number counters
	next_numbers: Mutex<HashMap<RepoInfo, u64>>,

	/// Created issues, in creation order
	issues: Mutex<Vec<(RepoInfo, NewIssue, CreatedIssue)>>,

	/// Failures handed out by the next attempts, front first
	scripted_failures: Mutex<VecDeque<CreateIssueError>>,

	/// Fail every attempt once the scripted failures are used up
	always_fail: Mutex<Option<CreateIssueError>>,

	/// Call log for debugging
	call_log: Mutex<Vec<String>>,
}
impl Default for MockGithubClient {
	fn default() -> Self {
		Self::new()
	}
}

impl MockGithubClient {
	pub fn new() -> Self {
		Self {
			next_issue_id: AtomicU64::new(1000),
			next_numbers: Mutex::new(HashMap::new()),
			issues: Mutex::new(Vec::new()),
			scripted_failures: Mutex::new(VecDeque::new()),
			always_fail: Mutex::new(None),
			call_log: Mutex::new(Vec::new()),
		}
	}

	/// Make the next attempt fail with `err`. Calls queue up.
	pub fn fail_next(&self, err: CreateIssueError) {
		self.scripted_failures.lock().unwrap().push_back(err);
	}

	/// Make the next `n` attempts fail with a rate-limit 403.
	pub fn rate_limit_next(&self, n: usize) {
		for _ in 0..n {
			self.fail_next(CreateIssueError::Api {
				status: 403,
				body: RATE_LIMIT_BODY.to_string(),
			});
		}
	}

	/// Fail every attempt from now on.
	pub fn fail_always(&self, err: CreateIssueError) {
		*self.always_fail.lock().unwrap() = Some(err);
	}

	/// Issues created so far, in creation order.
	pub fn created(&self) -> Vec<(NewIssue, CreatedIssue)> {
		self.issues.lock().unwrap().iter().map(|(_, new, created)| (new.clone(), created.clone())).collect()
	}

	/// Get the call log for debugging
	pub fn get_call_log(&self) -> Vec<String> {
		self.call_log.lock().unwrap().clone()
	}

	/// Clear the call log
	pub fn clear_call_log(&self) {
		self.call_log.lock().unwrap().clear();
	}

	fn log_call(&self, call: &str) {
		self.call_log.lock().unwrap().push(call.to_string());
	}

	fn next_failure(&self) -> Option<CreateIssueError> {
		if let Some(err) = self.scripted_failures.lock().unwrap().pop_front() {
			return Some(err);
		}
		self.always_fail.lock().unwrap().clone()
	}
}

#[async_trait]
impl GithubClient for MockGithubClient {
	#[instrument(skip(self, issue), fields(title = %issue.title))]
	async fn create_issue(&self, repo: RepoInfo, issue: &NewIssue) -> Result<CreatedIssue, CreateIssueError> {
		self.log_call(&format!("create_issue({repo}, {:?})", issue.title));

		if let Some(err) = self.next_failure() {
			tracing::debug!(?err, "[mock] failing create_issue");
			return Err(err);
		}

		let number = {
			let mut numbers = self.next_numbers.lock().unwrap();
			let next = numbers.entry(repo).or_insert(1);
			let number = *next;
			*next += 1;
			number
		};
		let created = CreatedIssue {
			id: self.next_issue_id.fetch_add(1, Ordering::SeqCst),
			number,
			url: format!("https://api.github.com/repos/{}/{}/issues/{number}", repo.owner(), repo.repo()),
			html_url: format!("https://github.com/{}/{}/issues/{number}", repo.owner(), repo.repo()),
		};
		self.issues.lock().unwrap().push((repo, issue.clone(), created.clone()));

		Ok(created)
	}
}
