//! Shared test infrastructure for integration tests.
//!
//! `TestContext` wires mock Notion, Github and sleep backends into a real
//! publisher and backlog config, so a whole migration runs in-process.

use std::{sync::Arc, time::Duration};

use notion2github::{
	MigrationStats, Publisher, RepoInfo, RetryPolicy, RunOptions, SourceError,
	mock_github::MockGithubClient,
	mock_notion::MockNotionClient,
	mocks::MockSleeper,
	record::PropertyValue,
	run,
	source::{BodyStrategy, DEFAULT_ROW_LIMIT, SourceConfig},
};

pub const VIEW_URL: &str = "https://www.notion.so/acme/0f1e2d3c4b5a69788796a5b4c3d2e1f0?v=8e7d6c5b4a3928170f1e2d3c4b5a6978";
pub const THROTTLE: Duration = Duration::from_millis(250);
pub const RETRY_DELAY: Duration = Duration::from_secs(7);

pub fn text(s: &str) -> PropertyValue {
	PropertyValue::Text(s.to_string())
}

pub struct TestContext {
	pub notion: Arc<MockNotionClient>,
	pub github: Arc<MockGithubClient>,
	pub sleeper: Arc<MockSleeper>,
	pub config: SourceConfig,
	pub retry: RetryPolicy,
	pub options: RunOptions,
}

impl TestContext {
	pub fn new() -> Self {
		Self {
			notion: Arc::new(MockNotionClient::new("Product backlog")),
			github: Arc::new(MockGithubClient::new()),
			sleeper: Arc::new(MockSleeper::new()),
			config: SourceConfig {
				credential: Some("secret_test_token".to_string()),
				view: VIEW_URL.parse().unwrap(),
				row_limit: Some(DEFAULT_ROW_LIMIT),
				body: BodyStrategy::Export,
			},
			retry: RetryPolicy {
				max_retries: 3,
				retry_delay: RETRY_DELAY,
			},
			options: RunOptions {
				throttle_delay: THROTTLE,
				dry_run: false,
			},
		}
	}

	/// Add a row in the Backlog status.
	pub fn backlog_row(&self, id: &str, title: &str, functionality: &str) {
		self.notion.add_row(id, title, &[
			("Status", "status", text("Backlog")),
			("Functionality", "select", text(functionality)),
			("Github issue url", "url", PropertyValue::Empty),
		]);
	}

	pub async fn run(&self) -> Result<MigrationStats, SourceError> {
		let publisher = Publisher::new(self.github.clone(), RepoInfo::new("acme", "app").unwrap(), self.retry, self.sleeper.clone());
		let notion = self.notion.clone();
		run::run(&self.config, move |_| notion, &publisher, self.sleeper.as_ref(), self.options).await
	}
}
