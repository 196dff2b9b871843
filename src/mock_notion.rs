//! Mock Notion client for testing purposes.
//!
//! Holds one collection with its rows, page bodies and written-back issue URLs
//! in memory. Queries are paginated like the real API, with a configurable page size.

use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use async_trait::async_trait;
use color_eyre::eyre::{Result, bail, eyre};
use tracing::instrument;

use crate::{
	block::ContentBlock,
	notion::{Collection, FetchedBlock, MAX_PAGE_SIZE, NotionClient, RowPage, ViewRef},
	record::{BacklogRow, NotionId, Property, PropertyValue, RowHandle, slugify},
};

/// Mock Notion client that stores all state in memory.
/// Thread-safe for use in async contexts.
pub struct MockNotionClient {
	/// Title of the single collection behind any view
	title: String,

	/// Largest page handed out by `query_rows`
	page_size: usize,

	/// Counter for generating block IDs
	next_block_id: AtomicU64,

	/// Rows in view order
	rows: Mutex<Vec<BacklogRow>>,

	/// Direct children of each page/block
	children: Mutex<HashMap<NotionId, Vec<FetchedBlock>>>,

	/// Written-back issue URLs: row -> (property, url)
	issue_urls: Mutex<HashMap<NotionId, (String, String)>>,

	/// Error returned by `resolve_view`, if set
	resolve_failure: Mutex<Option<String>>,

	/// Rows whose write-back fails
	write_back_failures: Mutex<Vec<NotionId>>,

	/// Call log for debugging
	call_log: Mutex<Vec<String>>,
}
impl MockNotionClient {
	pub fn new(title: &str) -> Self {
		Self {
			title: title.to_string(),
			page_size: MAX_PAGE_SIZE,
			next_block_id: AtomicU64::new(1),
			rows: Mutex::new(Vec::new()),
			children: Mutex::new(HashMap::new()),
			issue_urls: Mutex::new(HashMap::new()),
			resolve_failure: Mutex::new(None),
			write_back_failures: Mutex::new(Vec::new()),
			call_log: Mutex::new(Vec::new()),
		}
	}

	/// Hand out at most `page_size` rows per query.
	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.max(1);
		self
	}

	/// Append a row. `props` are `(name, remote type, value)`.
	pub fn add_row(&self, id: &str, title: &str, props: &[(&str, &str, PropertyValue)]) {
		let properties = props
			.iter()
			.map(|(name, kind, value)| {
				(slugify(name), Property {
					name: name.to_string(),
					kind: kind.to_string(),
					value: value.clone(),
				})
			})
			.collect();
		self.rows.lock().unwrap().push(BacklogRow {
			id: NotionId::new(id),
			title: title.to_string(),
			properties,
		});
	}

	/// Set the body of a page as a block tree.
	pub fn set_page_blocks(&self, page: &NotionId, blocks: Vec<ContentBlock>) {
		let mut children = self.children.lock().unwrap();
		self.register_children(&mut children, page.clone(), blocks);
	}

	fn register_children(&self, map: &mut HashMap<NotionId, Vec<FetchedBlock>>, parent: NotionId, blocks: Vec<ContentBlock>) {
		let mut listed = Vec::with_capacity(blocks.len());
		for block in blocks {
			let id = NotionId::new(format!("block-{}", self.next_block_id.fetch_add(1, Ordering::SeqCst)));
			listed.push(FetchedBlock {
				id: id.clone(),
				kind: block.kind,
				text: block.text,
				has_children: !block.children.is_empty(),
			});
			if !block.children.is_empty() {
				self.register_children(map, id, block.children);
			}
		}
		map.insert(parent, listed);
	}

	/// Make `resolve_view` fail with `reason`.
	pub fn fail_resolve(&self, reason: &str) {
		*self.resolve_failure.lock().unwrap() = Some(reason.to_string());
	}

	/// Make write-back onto `row` fail.
	pub fn fail_write_back(&self, row: &str) {
		self.write_back_failures.lock().unwrap().push(NotionId::new(row));
	}

	/// Issue URL written back onto `row`, if any.
	pub fn issue_url(&self, row: &NotionId) -> Option<String> {
		self.issue_urls.lock().unwrap().get(row).map(|(_, url)| url.clone())
	}

	/// All written-back URLs as `(row, property, url)`, sorted by row.
	pub fn issue_urls(&self) -> Vec<(NotionId, String, String)> {
		let mut all: Vec<_> = self.issue_urls.lock().unwrap().iter().map(|(row, (prop, url))| (row.clone(), prop.clone(), url.clone())).collect();
		all.sort();
		all
	}

	/// Get the call log for debugging
	pub fn get_call_log(&self) -> Vec<String> {
		self.call_log.lock().unwrap().clone()
	}

	fn log_call(&self, call: &str) {
		self.call_log.lock().unwrap().push(call.to_string());
	}
}

#[async_trait]
impl NotionClient for MockNotionClient {
	async fn resolve_view(&self, view: &ViewRef) -> Result<Collection> {
		self.log_call(&format!("resolve_view({})", view.database_id));
		if let Some(reason) = self.resolve_failure.lock().unwrap().clone() {
			bail!("Failed to resolve backlog view: 404 Not Found - {reason}");
		}
		Ok(Collection {
			id: view.database_id.clone(),
			title: self.title.clone(),
		})
	}

	#[instrument(skip(self, collection))]
	async fn query_rows(&self, collection: &Collection, cursor: Option<&str>, page_size: usize) -> Result<RowPage> {
		self.log_call(&format!("query_rows({}, {cursor:?}, {page_size})", collection.id));

		let start: usize = match cursor {
			Some(c) => c.parse().map_err(|_| eyre!("invalid cursor: {c}"))?,
			None => 0,
		};
		let rows = self.rows.lock().unwrap();
		let end = (start + page_size.min(self.page_size)).min(rows.len());
		let page = rows.get(start..end).map(<[BacklogRow]>::to_vec).unwrap_or_default();

		Ok(RowPage {
			rows: page,
			next_cursor: (end < rows.len()).then(|| end.to_string()),
		})
	}

	async fn fetch_children(&self, block_id: &NotionId) -> Result<Vec<FetchedBlock>> {
		self.log_call(&format!("fetch_children({block_id})"));
		Ok(self.children.lock().unwrap().get(block_id).cloned().unwrap_or_default())
	}

	async fn set_issue_url(&self, handle: &RowHandle, url: &str) -> Result<()> {
		self.log_call(&format!("set_issue_url({}, {url})", handle.row_id()));
		if self.write_back_failures.lock().unwrap().contains(handle.row_id()) {
			bail!("Failed to write issue url: 409 Conflict - row {} is locked", handle.row_id());
		}
		self.issue_urls.lock().unwrap().insert(handle.row_id().clone(), (handle.property().to_string(), url.to_string()));
		Ok(())
	}
}
