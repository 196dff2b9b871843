//! Errors that end a run.
//!
//! Publish failures never show up here: they are contained per item by the publisher.

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use std::path::PathBuf;

/// Underlying cause. `eyre::Report` converts into this with `.into()`.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of the backlog source. Every variant is fatal to the run.
#[derive(Debug, miette::Diagnostic, thiserror::Error)]
pub enum SourceError {
	#[error("No Notion token given in environment variable {var}")]
	#[diagnostic(code(notion2github::source::authentication_missing), help("export {var}=<token> before running"))]
	AuthenticationMissing { var: &'static str },

	#[error("Error occurred reading from Notion: could not open backlog view {view}")]
	#[diagnostic(
		code(notion2github::source::connection),
		help("check that the view URL is correct and that the token has access to the database")
	)]
	SourceConnectionFailure {
		view: String,
		#[source]
		source: BoxedError,
	},

	#[error("failed to read backlog row {row_id}")]
	#[diagnostic(code(notion2github::source::row))]
	RowRead {
		row_id: String,
		#[source]
		source: BoxedError,
	},

	#[error("no exported markdown file for row {row_id} in {}", dir.display())]
	#[diagnostic(code(notion2github::source::markdown_not_found), help("expected a file whose name contains the row id without dashes"))]
	MarkdownNotFound { row_id: String, dir: PathBuf },
}

impl SourceError {
	/// Render with miette's handler, as shown to the user.
	pub fn render(self) -> String {
		format!("{:?}", miette::Report::new(self))
	}
}
