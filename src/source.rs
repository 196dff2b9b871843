//! Backlog source: reads the backlog view and yields records to publish.
//!
//! [`BacklogReader`] is a lazy, pull-based sequence. Rows are fetched a page at
//! a time and only one record is built per [`next_entry`](BacklogReader::next_entry)
//! call, so memory stays bounded by one page of rows plus one body.
//!
//! Bodies come from one of two interchangeable strategies (see [`BodyStrategy`]).

use std::{
	collections::VecDeque,
	future::Future,
	path::{Path, PathBuf},
	pin::Pin,
};

use color_eyre::eyre::Result;
use tracing::{debug, info, instrument};

use crate::{
	block::{BlockKind, ContentBlock, flatten},
	error::SourceError,
	notion::{BoxedNotionClient, Collection, MAX_PAGE_SIZE, NotionClient, ViewRef},
	record::{BacklogRecord, BacklogRow, NotionId, RowHandle},
};

/// Environment variable holding the Notion credential.
pub const NOTION_TOKEN_ENV: &str = "NOTION_USER_TOKEN";
/// Default bound on the number of rows read from the view.
pub const DEFAULT_ROW_LIMIT: usize = 500;
/// Where exported markdown files are looked up by default.
pub const DEFAULT_MARKDOWN_DIR: &str = "./data/markdown";

/// Where record bodies come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BodyStrategy {
	/// Render the page's block tree through the API.
	Export,
	/// Read a pre-exported markdown file whose name contains the row id.
	MarkdownDir(PathBuf),
}

#[derive(Clone, Debug)]
pub struct SourceConfig {
	/// Raw credential, as read from the environment at process start.
	pub credential: Option<String>,
	pub view: ViewRef,
	/// `None` sweeps every row of the view.
	pub row_limit: Option<usize>,
	pub body: BodyStrategy,
}

/// Non-blank Notion credential.
#[derive(Clone)]
pub struct NotionToken(String);
impl NotionToken {
	pub fn new(raw: Option<&str>) -> Result<Self, SourceError> {
		match raw.map(str::trim) {
			Some(token) if !token.is_empty() => Ok(Self(token.to_string())),
			_ => Err(SourceError::AuthenticationMissing { var: NOTION_TOKEN_ENV }),
		}
	}

	pub fn into_inner(self) -> String {
		self.0
	}
}
impl std::fmt::Debug for NotionToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("NotionToken(***)")
	}
}

pub struct BacklogReader {
	client: BoxedNotionClient,
	view: ViewRef,
	collection: Collection,
	row_limit: Option<usize>,
	body: BodyStrategy,
	buffered: VecDeque<BacklogRow>,
	cursor: Option<String>,
	fetched: usize,
	exhausted: bool,
}

impl BacklogReader {
	/// Validate the credential, connect, resolve the view and fetch the first page of rows.
	///
	/// `connect` is only called once the credential is known to be present.
	#[instrument(skip_all, fields(view = config.view.as_str()))]
	pub async fn open<F>(config: &SourceConfig, connect: F) -> Result<Self, SourceError>
	where
		F: FnOnce(NotionToken) -> BoxedNotionClient, {
		let token = NotionToken::new(config.credential.as_deref())?;
		let client = connect(token);

		let collection = client.resolve_view(&config.view).await.map_err(|source| SourceError::SourceConnectionFailure {
			view: config.view.as_str().to_string(),
			source: source.into(),
		})?;
		info!(collection = %collection.title, id = %collection.id, view_id = ?config.view.view_id, "opened backlog view");

		let mut reader = Self {
			client,
			view: config.view.clone(),
			collection,
			row_limit: config.row_limit,
			body: config.body.clone(),
			buffered: VecDeque::new(),
			cursor: None,
			fetched: 0,
			exhausted: false,
		};
		reader.fill().await?;
		Ok(reader)
	}

	/// Next backlog entry, or `None` once the view is exhausted.
	///
	/// Rows that aren't backlog entries are skipped without producing anything.
	pub async fn next_entry(&mut self) -> Result<Option<(BacklogRecord, RowHandle)>, SourceError> {
		loop {
			if let Some(row) = self.buffered.pop_front() {
				if !row.is_backlog_entry() {
					debug!(row = %row.id, title = %row.title, status = ?row.status(), "skipping row");
					continue;
				}
				let body = self.body_for(&row).await?;
				return Ok(Some((BacklogRecord::from_row(&row, body), row.handle())));
			}
			if !self.fill().await? {
				return Ok(None);
			}
		}
	}

	/// Start over from the first row of the view.
	pub fn restart(&mut self) {
		self.buffered.clear();
		self.cursor = None;
		self.fetched = 0;
		self.exhausted = false;
	}

	/// Write the created issue's URL onto the originating row.
	#[instrument(skip(self))]
	pub async fn write_back(&self, handle: &RowHandle, issue_url: &str) -> Result<()> {
		self.client.set_issue_url(handle, issue_url).await
	}

	/// Fetch the next page of rows into the buffer. `false` once nothing is left to fetch.
	async fn fill(&mut self) -> Result<bool, SourceError> {
		if self.exhausted {
			return Ok(false);
		}
		let remaining = self.row_limit.map(|limit| limit.saturating_sub(self.fetched));
		if remaining == Some(0) {
			self.exhausted = true;
			return Ok(false);
		}
		let page_size = remaining.map_or(MAX_PAGE_SIZE, |r| r.min(MAX_PAGE_SIZE));

		let page = self
			.client
			.query_rows(&self.collection, self.cursor.as_deref(), page_size)
			.await
			.map_err(|source| SourceError::SourceConnectionFailure {
				view: self.view.as_str().to_string(),
				source: source.into(),
			})?;

		let mut rows = page.rows;
		if let Some(r) = remaining {
			rows.truncate(r);
		}
		debug!(rows = rows.len(), has_more = page.next_cursor.is_some(), "fetched page of rows");
		self.fetched += rows.len();
		self.buffered.extend(rows);
		self.cursor = page.next_cursor;
		if self.cursor.is_none() {
			self.exhausted = true;
		}
		Ok(true)
	}

	async fn body_for(&self, row: &BacklogRow) -> Result<String, SourceError> {
		match &self.body {
			BodyStrategy::Export => export_page_markdown(self.client.as_ref(), &row.id, &row.title).await.map_err(|source| SourceError::RowRead {
				row_id: row.id.to_string(),
				source: source.into(),
			}),
			BodyStrategy::MarkdownDir(dir) => read_markdown_body(dir, &row.id, &row.title),
		}
	}
}

/// Fetch `block_id`'s descendants as a block tree.
fn fetch_tree<'a>(client: &'a dyn NotionClient, block_id: &'a NotionId) -> Pin<Box<dyn Future<Output = Result<Vec<ContentBlock>>> + Send + 'a>> {
	Box::pin(async move {
		let mut blocks = Vec::new();
		for fetched in client.fetch_children(block_id).await? {
			let children = if fetched.has_children { fetch_tree(client, &fetched.id).await? } else { Vec::new() };
			blocks.push(ContentBlock::new(fetched.kind, fetched.text).with_children(children));
		}
		Ok(blocks)
	})
}

/// Render a page body as markdown: the page's block tree, flattened.
#[instrument(skip(client))]
pub async fn export_page_markdown(client: &dyn NotionClient, page_id: &NotionId, title: &str) -> Result<String> {
	let children = fetch_tree(client, page_id).await?;
	let page = ContentBlock::new(BlockKind::Other("page".to_string()), title).with_children(children);
	Ok(flatten(&page).to_markdown())
}

/// First `*.md` file in `dir` (by name) whose file name contains `compact_id`.
pub fn find_markdown_file(dir: &Path, compact_id: &str) -> std::io::Result<Option<PathBuf>> {
	let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
		.filter_map(|entry| entry.ok().map(|e| e.path()))
		.filter(|path| path.extension().is_some_and(|ext| ext == "md"))
		.filter(|path| path.file_name().is_some_and(|name| name.to_string_lossy().contains(compact_id)))
		.collect();
	matches.sort();
	Ok(matches.into_iter().next())
}

/// Read the exported markdown for a row, dropping every line that contains the title.
pub fn read_markdown_body(dir: &Path, row_id: &NotionId, title: &str) -> Result<String, SourceError> {
	let row_err = |e: std::io::Error| SourceError::RowRead {
		row_id: row_id.to_string(),
		source: e.into(),
	};

	let path = find_markdown_file(dir, &row_id.compact()).map_err(row_err)?.ok_or_else(|| SourceError::MarkdownNotFound {
		row_id: row_id.to_string(),
		dir: dir.to_path_buf(),
	})?;
	debug!(path = %path.display(), "reading exported markdown");

	let content = std::fs::read_to_string(&path).map_err(row_err)?;
	// An empty title would match every line; it strips nothing instead of emptying the body.
	let body = content.lines().filter(|line| title.is_empty() || !line.contains(title)).collect::<Vec<_>>().join("\n");
	Ok(body)
}
