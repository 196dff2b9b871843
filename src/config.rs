//! Command-line arguments and the settings resolved from them.
//!
//! Everything is read once at process start. Credentials come from the
//! environment and are handed to the components that need them, nothing
//! reads the environment later on.

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser};
use color_eyre::eyre::{Result, WrapErr, eyre};

use crate::{
	github::RepoInfo,
	notion::ViewRef,
	publish::{DEFAULT_MAX_RETRIES, RetryPolicy},
	run::RunOptions,
	source::{BodyStrategy, DEFAULT_MARKDOWN_DIR, DEFAULT_ROW_LIMIT, NOTION_TOKEN_ENV, SourceConfig},
};

/// Environment variable holding the optional Github token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
/// Environment variable holding tracing filter directives.
pub const LOG_DIRECTIVES_ENV: &str = "LOG_DIRECTIVES";

#[derive(Clone, Debug, Parser)]
#[command(name = "notion2github", author, version, about = "Create Github issues from the backlog entries of a Notion collection view", long_about = None)]
pub struct Cli {
	#[clap(flatten)]
	pub args: MigrationArgs,
}

#[derive(Args, Clone, Debug)]
pub struct MigrationArgs {
	/// URL to notion collection view containing backlog
	pub backlog_view_url: String,
	/// Github owner of repo to use
	pub github_owner: String,
	/// Name of github repo in which to create issues
	pub github_repo: String,
	#[clap(flatten)]
	pub settings_flags: SettingsFlags,
}

#[derive(Args, Clone, Debug)]
pub struct SettingsFlags {
	/// Specifies the number of seconds to wait between each github request.
	#[arg(long = "throttle_delay", default_value_t = 1.0)]
	pub throttle_delay: f64,
	/// Attempts per issue before giving up on it.
	#[arg(long = "max_retries", default_value_t = DEFAULT_MAX_RETRIES)]
	pub max_retries: u32,
	/// Seconds to wait after Github reports a rate limit (403).
	#[arg(long = "retry_delay", default_value_t = 60.0)]
	pub retry_delay: f64,
	/// Maximum number of rows read from the view.
	#[arg(long = "row_limit", default_value_t = DEFAULT_ROW_LIMIT, conflicts_with = "all_rows")]
	pub row_limit: usize,
	/// Read every row of the view.
	#[arg(long = "all_rows")]
	pub all_rows: bool,
	/// Take bodies from exported markdown files in this directory instead of rendering pages.
	#[arg(long = "markdown_dir", conflicts_with = "markdown")]
	pub markdown_dir: Option<PathBuf>,
	/// Take bodies from exported markdown files in ./data/markdown.
	#[arg(long)]
	pub markdown: bool,
	/// Read and log backlog entries without creating issues or writing back.
	#[arg(long = "dry_run")]
	pub dry_run: bool,
	/// Log debug output.
	#[arg(short, long)]
	pub verbose: bool,
}

/// Fully resolved settings for one run.
#[derive(Clone, Debug)]
pub struct Settings {
	pub source: SourceConfig,
	pub repo: RepoInfo,
	pub github_token: Option<String>,
	pub retry: RetryPolicy,
	pub run: RunOptions,
}

fn seconds(flag: &str, secs: f64) -> Result<Duration> {
	Duration::try_from_secs_f64(secs).map_err(|_| eyre!("--{flag} must be a non-negative number of seconds, got {secs}"))
}

impl Settings {
	/// Resolve `args`, reading credentials through `env`.
	///
	/// A missing Notion token is not an error here: the source reader reports it
	/// before touching the network.
	pub fn resolve(args: MigrationArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let flags = args.settings_flags;

		let view: ViewRef = args.backlog_view_url.parse().wrap_err("invalid backlog view url")?;
		let repo = RepoInfo::new(&args.github_owner, &args.github_repo)?;

		let body = match (flags.markdown_dir, flags.markdown) {
			(Some(dir), _) => BodyStrategy::MarkdownDir(dir),
			(None, true) => BodyStrategy::MarkdownDir(PathBuf::from(DEFAULT_MARKDOWN_DIR)),
			(None, false) => BodyStrategy::Export,
		};

		Ok(Self {
			source: SourceConfig {
				credential: env(NOTION_TOKEN_ENV),
				view,
				row_limit: (!flags.all_rows).then_some(flags.row_limit),
				body,
			},
			repo,
			github_token: env(GITHUB_TOKEN_ENV).filter(|t| !t.trim().is_empty()),
			retry: RetryPolicy {
				max_retries: flags.max_retries,
				retry_delay: seconds("retry_delay", flags.retry_delay)?,
			},
			run: RunOptions {
				throttle_delay: seconds("throttle_delay", flags.throttle_delay)?,
				dry_run: flags.dry_run,
			},
		})
	}
}
