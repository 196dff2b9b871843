//! Issue creation with bounded retries.
//!
//! Every attempt yields an explicit `Result<CreatedIssue, CreateIssueError>`.
//! The loop inspects it:
//! - success returns immediately, so at most one issue is created per call;
//! - a failure with a decodable error body is logged, and a rate-limit (403)
//!   additionally waits `retry_delay` before the next attempt;
//! - a failure without a decodable body is logged generically and retried
//!   right away.
//!
//! Running out of attempts is not an error: the item is skipped and `None` returned.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::{
	github::{BoxedGithubClient, CreatedIssue, NewIssue, RepoInfo},
	record::BacklogRecord,
	sleep::BoxedSleeper,
};

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
	/// Total number of attempts.
	pub max_retries: u32,
	/// Wait after a rate-limited attempt.
	pub retry_delay: Duration,
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: DEFAULT_MAX_RETRIES,
			retry_delay: DEFAULT_RETRY_DELAY,
		}
	}
}

pub struct Publisher {
	client: BoxedGithubClient,
	repo: RepoInfo,
	policy: RetryPolicy,
	sleeper: BoxedSleeper,
}

impl Publisher {
	pub fn new(client: BoxedGithubClient, repo: RepoInfo, policy: RetryPolicy, sleeper: BoxedSleeper) -> Self {
		Self { client, repo, policy, sleeper }
	}

	pub fn repo(&self) -> RepoInfo {
		self.repo
	}

	pub async fn publish_record(&self, record: &BacklogRecord) -> Option<CreatedIssue> {
		self.publish(&record.title, &record.body, &record.labels).await
	}

	/// Create the issue, retrying per the policy. `None` once all attempts failed.
	#[instrument(skip(self, body, labels), fields(repo = %self.repo))]
	pub async fn publish(&self, title: &str, body: &str, labels: &[String]) -> Option<CreatedIssue> {
		let issue = NewIssue {
			title: title.to_string(),
			body: body.to_string(),
			labels: labels.to_vec(),
		};

		for attempt in 1..=self.policy.max_retries {
			let err = match self.client.create_issue(self.repo, &issue).await {
				Ok(created) => {
					info!(attempt, url = %created.html_url, "created issue");
					return Some(created);
				}
				Err(e) => e,
			};

			let is_last = attempt == self.policy.max_retries;
			match err.payload() {
				Ok(payload) => {
					warn!(
						attempt,
						status = ?err.status(),
						"Error calling Github API: {}; {}",
						payload.message,
						payload.documentation_url
					);
					if err.is_rate_limited() && !is_last {
						warn!("rate limited, retrying in {} seconds", self.policy.retry_delay.as_secs_f64());
						self.sleeper.sleep(self.policy.retry_delay).await;
					}
				}
				Err(decode_err) => {
					warn!(attempt, error = %err, "Tried to get result body from Github, but was unsuccessful: {decode_err}");
				}
			}
		}

		warn!("Unable to create issue with title {title:?}. Skipping creation of issue.");
		None
	}
}
