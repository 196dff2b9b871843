//! Run orchestration: pull records from the backlog, publish each, write the result back.

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::{
	error::SourceError,
	notion::BoxedNotionClient,
	publish::Publisher,
	sleep::Sleeper,
	source::{BacklogReader, NotionToken, SourceConfig},
};

pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunOptions {
	/// Pause after every processed item, whatever its outcome.
	pub throttle_delay: Duration,
	/// Log records instead of publishing them.
	pub dry_run: bool,
}
impl Default for RunOptions {
	fn default() -> Self {
		Self {
			throttle_delay: DEFAULT_THROTTLE_DELAY,
			dry_run: false,
		}
	}
}

/// Per-run counters. Returned to callers; the CLI doesn't print them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MigrationStats {
	/// Backlog entries pulled from the source.
	pub processed: usize,
	/// Issues created.
	pub created: usize,
	/// Entries given up on after exhausting retries.
	pub skipped: usize,
	/// Issue URLs successfully written back onto their rows.
	pub written_back: usize,
}

/// Open the backlog and migrate it.
pub async fn run<F>(config: &SourceConfig, connect: F, publisher: &Publisher, sleeper: &dyn Sleeper, options: RunOptions) -> Result<MigrationStats, SourceError>
where
	F: FnOnce(NotionToken) -> BoxedNotionClient, {
	let mut reader = BacklogReader::open(config, connect).await?;
	migrate(&mut reader, publisher, sleeper, options).await
}

/// Drive `reader` to the end, publishing every entry.
///
/// Only source errors end the run. A failed publish or write-back is logged
/// and the loop moves on to the next entry.
#[instrument(skip_all, fields(repo = %publisher.repo(), dry_run = options.dry_run))]
pub async fn migrate(reader: &mut BacklogReader, publisher: &Publisher, sleeper: &dyn Sleeper, options: RunOptions) -> Result<MigrationStats, SourceError> {
	let mut stats = MigrationStats::default();

	while let Some((record, handle)) = reader.next_entry().await? {
		stats.processed += 1;
		info!(n = stats.processed, title = %record.title, labels = ?record.labels, "processing backlog item");

		if options.dry_run {
			info!(body_len = record.body.len(), "dry run, not publishing");
		} else {
			match publisher.publish_record(&record).await {
				Some(issue) => {
					stats.created += 1;
					match reader.write_back(&handle, &issue.url).await {
						Ok(()) => {
							stats.written_back += 1;
							info!(url = %issue.url, "wrote issue url back onto row");
						}
						Err(e) => warn!(row = %handle.row_id(), url = %issue.url, "failed to write issue url back: {e}"),
					}
				}
				None => stats.skipped += 1,
			}
		}

		sleeper.sleep(options.throttle_delay).await;
	}

	Ok(stats)
}
