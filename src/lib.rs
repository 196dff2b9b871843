//! Migrate backlog entries from a Notion collection view into Github issues.
//!
//! The flow is linear: [`BacklogReader`] pulls rows from the view and builds a
//! [`BacklogRecord`] per backlog entry, [`Publisher`] creates the issue (retrying
//! on failures), and [`run::migrate`] writes the created issue's URL back onto
//! the originating row before moving on.

pub mod block;
pub mod config;
pub mod error;
pub mod github;
pub mod mock_github;
pub mod mock_notion;
pub mod mocks;
pub mod notion;
pub mod publish;
pub mod record;
pub mod run;
pub mod sleep;
pub mod source;

pub use block::{BlockKind, ContentBlock, Flattened, flatten, render_block};
pub use error::SourceError;
pub use github::{BoxedGithubClient, CreateIssueError, CreatedIssue, GithubClient, RealGithubClient, RepoInfo};
pub use notion::{BoxedNotionClient, NotionClient, RealNotionClient, ViewRef};
pub use publish::{Publisher, RetryPolicy};
pub use record::{BacklogRecord, BacklogRow, NotionId, RowHandle};
pub use run::{MigrationStats, RunOptions};
pub use sleep::{BoxedSleeper, Sleeper, TokioSleeper};
pub use source::{BacklogReader, BodyStrategy, NotionToken, SourceConfig};
