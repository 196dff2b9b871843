use std::{fs, path::PathBuf};

use insta::assert_snapshot;
use notion2github::{
	BlockKind, ContentBlock, MigrationStats, NotionId, SourceError,
	github::CreateIssueError,
	mock_github::RATE_LIMIT_BODY,
	source::{BodyStrategy, NOTION_TOKEN_ENV},
};

use crate::common::{RETRY_DELAY, THROTTLE, TestContext, text};

const LOGIN: &str = "0b5e7c1a-93d4-4f2e-8a61-2c7d9e0f1a01";
const SEARCH: &str = "0b5e7c1a-93d4-4f2e-8a61-2c7d9e0f1a02";
const DONE: &str = "0b5e7c1a-93d4-4f2e-8a61-2c7d9e0f1a03";
const POST_ALPHA: &str = "0b5e7c1a-93d4-4f2e-8a61-2c7d9e0f1a04";

/// Two backlog entries, one finished row and one post-alpha placeholder.
fn seeded() -> TestContext {
	let ctx = TestContext::new();
	ctx.backlog_row(LOGIN, "Login page", "auth");
	ctx.notion.add_row(DONE, "Dark mode", &[("Status", "status", text("Done")), ("Functionality", "select", text("ui"))]);
	ctx.notion.add_row(POST_ALPHA, "Post-alpha", &[("Status", "status", text("Backlog")), ("Name", "select", text("Post-alpha"))]);
	ctx.backlog_row(SEARCH, "Search", "discovery");

	ctx.notion.set_page_blocks(&NotionId::new(LOGIN), vec![
		ContentBlock::new(BlockKind::Heading2, "Acceptance"),
		ContentBlock::new(BlockKind::BulletedListItem, "email and password"),
		ContentBlock::new(BlockKind::Paragraph, "Notes").with_children(vec![ContentBlock::new(BlockKind::NumberedListItem, "rate limit attempts")]),
	]);
	ctx
}

fn rate_limited() -> CreateIssueError {
	CreateIssueError::Api {
		status: 403,
		body: RATE_LIMIT_BODY.to_string(),
	}
}

#[tokio::test]
async fn migrates_backlog_entries_and_writes_urls_back() {
	let ctx = seeded();

	let stats = ctx.run().await.unwrap();
	assert_eq!(stats, MigrationStats {
		processed: 2,
		created: 2,
		skipped: 0,
		written_back: 2,
	});

	let created = ctx.github.created();
	assert_eq!(created.len(), 2);
	assert_eq!(created[0].0.title, "Login page");
	assert_eq!(created[0].0.labels, vec!["auth".to_string()]);
	assert_snapshot!(created[0].0.body, @r"
	## Acceptance
	- email and password
	1. rate limit attempts
	");
	assert_eq!(created[1].0.title, "Search");
	assert_eq!(created[1].0.body, "");

	assert_eq!(ctx.notion.issue_url(&NotionId::new(LOGIN)).as_deref(), Some("https://api.github.com/repos/acme/app/issues/1"));
	assert_eq!(ctx.notion.issue_url(&NotionId::new(SEARCH)).as_deref(), Some("https://api.github.com/repos/acme/app/issues/2"));
	// the API url is written back, not the browser one
	for (new, issue) in &created {
		let row = if new.title == "Login page" { LOGIN } else { SEARCH };
		assert_eq!(ctx.notion.issue_url(&NotionId::new(row)), Some(issue.url.clone()));
	}
	assert_eq!(ctx.notion.issue_url(&NotionId::new(DONE)), None);
	assert!(ctx.notion.issue_urls().iter().all(|(_, property, _)| property == "Github issue url"));

	assert_eq!(ctx.sleeper.recorded(), vec![THROTTLE, THROTTLE]);
}

#[tokio::test]
async fn rate_limited_item_is_retried_then_published() {
	let ctx = seeded();
	ctx.github.rate_limit_next(2);

	let stats = ctx.run().await.unwrap();
	assert_eq!(stats.created, 2);
	assert_eq!(ctx.github.get_call_log().len(), 4);
	assert_eq!(ctx.sleeper.recorded(), vec![RETRY_DELAY, RETRY_DELAY, THROTTLE, THROTTLE]);
}

#[tokio::test]
async fn exhausted_retries_skip_the_item_without_write_back() {
	let ctx = TestContext::new();
	ctx.backlog_row(LOGIN, "Login page", "auth");
	ctx.github.fail_always(rate_limited());

	let stats = ctx.run().await.unwrap();
	assert_eq!(stats, MigrationStats {
		processed: 1,
		created: 0,
		skipped: 1,
		written_back: 0,
	});
	assert_eq!(ctx.github.get_call_log().len(), 3);
	assert!(ctx.notion.issue_urls().is_empty());
	assert!(!ctx.notion.get_call_log().iter().any(|c| c.starts_with("set_issue_url(")));
	// no wait after the final attempt, the throttle still applies
	assert_eq!(ctx.sleeper.recorded(), vec![RETRY_DELAY, RETRY_DELAY, THROTTLE]);
}

#[tokio::test]
async fn failed_write_back_does_not_stop_the_run() {
	let ctx = seeded();
	ctx.notion.fail_write_back(LOGIN);

	let stats = ctx.run().await.unwrap();
	assert_eq!(stats.created, 2);
	assert_eq!(stats.written_back, 1);
	assert_eq!(ctx.notion.issue_url(&NotionId::new(LOGIN)), None);
	assert!(ctx.notion.issue_url(&NotionId::new(SEARCH)).is_some());
}

#[tokio::test]
async fn dry_run_publishes_nothing() {
	let mut ctx = seeded();
	ctx.options.dry_run = true;

	let stats = ctx.run().await.unwrap();
	assert_eq!(stats.processed, 2);
	assert_eq!(stats.created, 0);
	assert!(ctx.github.get_call_log().is_empty());
	assert!(ctx.notion.issue_urls().is_empty());
	assert_eq!(ctx.sleeper.count(THROTTLE), 2);
}

#[tokio::test]
async fn missing_token_fails_without_touching_either_service() {
	let mut ctx = seeded();
	ctx.config.credential = None;

	let err = ctx.run().await.unwrap_err();
	assert!(matches!(err, SourceError::AuthenticationMissing { .. }));
	assert!(err.render().contains(NOTION_TOKEN_ENV));
	assert!(ctx.notion.get_call_log().is_empty());
	assert!(ctx.github.get_call_log().is_empty());
}

#[tokio::test]
async fn unreachable_view_fails_the_run() {
	let ctx = seeded();
	ctx.notion.fail_resolve("Could not find database");

	let err = ctx.run().await.unwrap_err();
	assert!(matches!(err, SourceError::SourceConnectionFailure { .. }));
	assert!(ctx.github.get_call_log().is_empty());
	assert!(ctx.sleeper.recorded().is_empty());
}

#[tokio::test]
async fn markdown_directory_bodies() {
	let dir = tempfile::tempdir().unwrap();
	let compact = |id: &str| id.replace('-', "");
	fs::write(dir.path().join(format!("Login page {}.md", compact(LOGIN))), "# Login page\n\nUsers sign in with email.\nSee Login page mockups.\n- remember me").unwrap();
	fs::write(dir.path().join(format!("Search {}.md", compact(SEARCH))), "# Search\nFull text over titles").unwrap();

	let mut ctx = seeded();
	ctx.config.body = BodyStrategy::MarkdownDir(PathBuf::from(dir.path()));

	ctx.run().await.unwrap();
	let created = ctx.github.created();
	// the blank line after the heading survives, only title lines go
	assert_eq!(created[0].0.body, "\nUsers sign in with email.\n- remember me");
	assert_eq!(created[1].0.body, "Full text over titles");
	assert!(!ctx.notion.get_call_log().iter().any(|c| c.starts_with("fetch_children(")));
}

#[tokio::test]
async fn missing_markdown_file_is_fatal() {
	let dir = tempfile::tempdir().unwrap();
	let mut ctx = seeded();
	ctx.config.body = BodyStrategy::MarkdownDir(PathBuf::from(dir.path()));

	let err = ctx.run().await.unwrap_err();
	assert!(matches!(err, SourceError::MarkdownNotFound { .. }));
	assert!(ctx.github.get_call_log().is_empty());
}
