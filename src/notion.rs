use std::{collections::BTreeMap, str::FromStr, sync::Arc, sync::LazyLock};

use async_trait::async_trait;
use color_eyre::eyre::{Result, bail, eyre};
use regex::Regex;
use reqwest::Client;
use serde::{
	Deserialize,
	de::{DeserializeOwned, IgnoredAny},
};
use serde_json::{Number, Value, json};
use tracing::instrument;

use crate::{
	block::BlockKind,
	record::{BacklogRow, NotionId, Property, PropertyValue, RowHandle, UrlPropertyKind, slugify},
};

const API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
/// Largest page the API hands out for queries and block listings.
pub const MAX_PAGE_SIZE: usize = 100;

pub type BoxedNotionClient = Arc<dyn NotionClient>;
/// Operations on the workspace holding the backlog.
/// Implemented by the real API client and by the in-memory mock.
#[async_trait]
pub trait NotionClient: Send + Sync {
	/// Resolve the collection behind a view reference.
	async fn resolve_view(&self, view: &ViewRef) -> Result<Collection>;

	/// Fetch one page of rows, starting at `cursor` (or the first row).
	async fn query_rows(&self, collection: &Collection, cursor: Option<&str>, page_size: usize) -> Result<RowPage>;

	/// Fetch all direct children of a block (or page).
	async fn fetch_children(&self, block_id: &NotionId) -> Result<Vec<FetchedBlock>>;

	/// Set the issue URL property referenced by `handle`.
	async fn set_issue_url(&self, handle: &RowHandle, url: &str) -> Result<()>;
}

/// Locator of the backlog view, usually copied from the browser.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ViewRef {
	pub database_id: NotionId,
	/// `v=` query parameter, if present. Not used by the API; kept for diagnostics.
	pub view_id: Option<String>,
	raw: String,
}
impl ViewRef {
	pub fn as_str(&self) -> &str {
		&self.raw
	}
}

static ID_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|[0-9a-f]{32}").expect("static regex"));

impl FromStr for ViewRef {
	type Err = color_eyre::Report;

	/// Accepts `https://www.notion.so/ws/Backlog-<id>?v=<view>`, the same without scheme, or a bare id.
	fn from_str(s: &str) -> Result<Self> {
		let raw = s.trim();
		let (path, view_id) = match url::Url::parse(raw) {
			Ok(url) => {
				let view_id = url.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.into_owned());
				(url.path().to_string(), view_id)
			}
			Err(_) => {
				let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
				let view_id = query.split('&').find_map(|kv| kv.strip_prefix("v=")).map(str::to_string);
				(path.to_string(), view_id)
			}
		};

		let id = ID_RE
			.find_iter(&path)
			.last()
			.ok_or_else(|| eyre!("no workspace id found in view reference: {raw}"))?
			.as_str()
			.replace('-', "")
			.to_lowercase();

		Ok(Self {
			database_id: NotionId::new(id),
			view_id,
			raw: raw.to_string(),
		})
	}
}

/// A resolved backlog collection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Collection {
	pub id: NotionId,
	pub title: String,
}

/// One page of a row query.
#[derive(Clone, Debug, Default)]
pub struct RowPage {
	pub rows: Vec<BacklogRow>,
	pub next_cursor: Option<String>,
}

/// A block as listed by the API, without its descendants.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedBlock {
	pub id: NotionId,
	pub kind: BlockKind,
	pub text: String,
	pub has_children: bool,
}

//==============================================================================
// Response decoding
//==============================================================================

/// Envelope of every paginated list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
	pub results: Vec<T>,
	#[serde(default)]
	pub has_more: bool,
	#[serde(default)]
	pub next_cursor: Option<String>,
}
impl<T> ListResponse<T> {
	/// Cursor of the following page, only while the API reports more.
	pub fn continuation(&self) -> Option<String> {
		if self.has_more { self.next_cursor.clone() } else { None }
	}
}

/// Fragment of a rich-text array. Only the rendered text matters here.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RichText {
	#[serde(default)]
	pub plain_text: String,
}

fn concat(parts: &[RichText]) -> String {
	parts.iter().map(|p| p.plain_text.as_str()).collect()
}

#[derive(Debug, Deserialize)]
pub struct DatabaseObject {
	#[serde(default)]
	pub title: Vec<RichText>,
}

/// Page as returned by a database query.
#[derive(Debug, Deserialize)]
pub struct PageObject {
	pub id: String,
	pub properties: BTreeMap<String, PropertyObject>,
}

/// A property keeps its value under a key named after its own `type`.
#[derive(Debug, Deserialize)]
pub struct PropertyObject {
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(flatten)]
	pub payload: serde_json::Map<String, Value>,
}

/// Block from a children listing; its content sits under a key named after `type`.
#[derive(Debug, Deserialize)]
pub struct BlockObject {
	pub id: String,
	#[serde(rename = "type", default)]
	pub kind: String,
	#[serde(default)]
	pub has_children: bool,
	#[serde(flatten)]
	pub content: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct BlockContent {
	#[serde(default)]
	rich_text: Vec<RichText>,
}

#[derive(Debug, Deserialize)]
struct SelectOption {
	name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Formula {
	String { string: Option<String> },
	Number { number: Option<Number> },
	#[serde(other)]
	Other,
}

fn text_or_empty(s: String) -> PropertyValue {
	if s.is_empty() { PropertyValue::Empty } else { PropertyValue::Text(s) }
}

/// Decode the value of a property. Kinds without a text form come out as [`PropertyValue::Empty`].
pub fn decode_property_value(prop: &PropertyObject) -> PropertyValue {
	let Some(inner) = prop.payload.get(&prop.kind) else {
		return PropertyValue::Empty;
	};
	match prop.kind.as_str() {
		"title" | "rich_text" => Vec::<RichText>::deserialize(inner).map_or(PropertyValue::Empty, |parts| text_or_empty(concat(&parts))),
		"select" | "status" => Option::<SelectOption>::deserialize(inner).ok().flatten().map_or(PropertyValue::Empty, |o| PropertyValue::Text(o.name)),
		"multi_select" => PropertyValue::Options(Vec::<SelectOption>::deserialize(inner).map(|opts| opts.into_iter().map(|o| o.name).collect()).unwrap_or_default()),
		"url" | "email" | "phone_number" => Option::<String>::deserialize(inner).ok().flatten().map_or(PropertyValue::Empty, text_or_empty),
		"number" => Option::<Number>::deserialize(inner).ok().flatten().map_or(PropertyValue::Empty, |n| PropertyValue::Text(n.to_string())),
		"checkbox" => bool::deserialize(inner).map_or(PropertyValue::Empty, |b| PropertyValue::Text(b.to_string())),
		"formula" => match Formula::deserialize(inner) {
			Ok(Formula::String { string: Some(s) }) => text_or_empty(s),
			Ok(Formula::Number { number: Some(n) }) => PropertyValue::Text(n.to_string()),
			_ => PropertyValue::Empty,
		},
		_ => PropertyValue::Empty,
	}
}

pub fn decode_row(page: PageObject) -> BacklogRow {
	let mut title = String::new();
	let properties = page
		.properties
		.into_iter()
		.map(|(name, prop)| {
			let value = decode_property_value(&prop);
			if prop.kind == "title" {
				title = value.as_text().unwrap_or_default();
			}
			(slugify(&name), Property { name, kind: prop.kind, value })
		})
		.collect();

	BacklogRow {
		id: NotionId::new(page.id),
		title,
		properties,
	}
}

pub fn decode_block(block: BlockObject) -> FetchedBlock {
	let text = block
		.content
		.get(&block.kind)
		.and_then(|inner| BlockContent::deserialize(inner).ok())
		.map(|c| concat(&c.rich_text))
		.unwrap_or_default();

	FetchedBlock {
		id: NotionId::new(block.id),
		kind: BlockKind::from_type_name(&block.kind),
		text,
		has_children: block.has_children,
	}
}

/// Property payload for writing an issue URL.
pub fn issue_url_payload(handle: &RowHandle, url: &str) -> Value {
	let value = match handle.kind() {
		UrlPropertyKind::Url => json!({ "url": url }),
		UrlPropertyKind::RichText => json!({ "rich_text": [{ "type": "text", "text": { "content": url, "link": { "url": url } } }] }),
	};
	let mut properties = serde_json::Map::new();
	properties.insert(handle.property().to_string(), value);
	json!({ "properties": properties })
}

//==============================================================================
// Real Notion Client Implementation
//==============================================================================

/// Notion API client that makes HTTP requests.
pub struct RealNotionClient {
	http_client: Client,
	token: String,
}

impl RealNotionClient {
	pub fn new(token: String) -> Self {
		Self {
			http_client: Client::new(),
			token,
		}
	}

	fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
		self.http_client
			.request(method, format!("{API_BASE}{path}"))
			.header("Authorization", format!("Bearer {}", self.token))
			.header("Notion-Version", NOTION_VERSION)
	}

	/// Send a request, returning the decoded body or an error on non-success status.
	async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder, error_context: &str) -> Result<T> {
		let res = req.send().await?;

		if !res.status().is_success() {
			let status = res.status();
			let body = res.text().await.unwrap_or_default();
			bail!("{error_context}: {status} - {body}");
		}

		Ok(res.json::<T>().await?)
	}
}

#[async_trait]
impl NotionClient for RealNotionClient {
	#[instrument(skip_all, fields(view = view.as_str()))]
	async fn resolve_view(&self, view: &ViewRef) -> Result<Collection> {
		let req = self.request(reqwest::Method::GET, &format!("/databases/{}", view.database_id));
		let db: DatabaseObject = self.send_json(req, "Failed to resolve backlog view").await?;

		Ok(Collection {
			id: view.database_id.clone(),
			title: concat(&db.title),
		})
	}

	async fn query_rows(&self, collection: &Collection, cursor: Option<&str>, page_size: usize) -> Result<RowPage> {
		let mut body = json!({ "page_size": page_size.min(MAX_PAGE_SIZE) });
		if let Some(cursor) = cursor {
			body["start_cursor"] = json!(cursor);
		}

		let req = self.request(reqwest::Method::POST, &format!("/databases/{}/query", collection.id)).json(&body);
		let response: ListResponse<PageObject> = self.send_json(req, "Failed to query backlog rows").await?;

		let next_cursor = response.continuation();
		Ok(RowPage {
			rows: response.results.into_iter().map(decode_row).collect(),
			next_cursor,
		})
	}

	#[instrument(skip(self))]
	async fn fetch_children(&self, block_id: &NotionId) -> Result<Vec<FetchedBlock>> {
		let mut blocks = Vec::new();
		let mut cursor: Option<String> = None;

		loop {
			let mut req = self
				.request(reqwest::Method::GET, &format!("/blocks/{block_id}/children"))
				.query(&[("page_size", MAX_PAGE_SIZE.to_string())]);
			if let Some(c) = &cursor {
				req = req.query(&[("start_cursor", c)]);
			}
			let response: ListResponse<BlockObject> = self.send_json(req, "Failed to fetch block children").await?;

			cursor = response.continuation();
			blocks.extend(response.results.into_iter().map(decode_block));
			if cursor.is_none() {
				break;
			}
		}

		Ok(blocks)
	}

	async fn set_issue_url(&self, handle: &RowHandle, url: &str) -> Result<()> {
		let req = self
			.request(reqwest::Method::PATCH, &format!("/pages/{}", handle.row_id()))
			.json(&issue_url_payload(handle, url));
		self.send_json::<IgnoredAny>(req, "Failed to write issue url").await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_view_url() {
		let view: ViewRef = "https://www.notion.so/acme/0f1e2d3c4b5a69788796a5b4c3d2e1f0?v=aaaabbbbccccddddeeeeffff00001111".parse().unwrap();
		assert_eq!(view.database_id.as_str(), "0f1e2d3c4b5a69788796a5b4c3d2e1f0");
		assert_eq!(view.view_id.as_deref(), Some("aaaabbbbccccddddeeeeffff00001111"));
	}

	#[test]
	fn parses_slugged_and_dashed_references() {
		let view: ViewRef = "notion.so/acme/Backlog-0F1E2D3C4B5A69788796A5B4C3D2E1F0".parse().unwrap();
		assert_eq!(view.database_id.as_str(), "0f1e2d3c4b5a69788796a5b4c3d2e1f0");
		assert_eq!(view.view_id, None);

		let view: ViewRef = "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0".parse().unwrap();
		assert_eq!(view.database_id.as_str(), "0f1e2d3c4b5a69788796a5b4c3d2e1f0");
	}

	#[test]
	fn rejects_reference_without_id() {
		assert!("https://www.notion.so/acme/Backlog".parse::<ViewRef>().is_err());
	}

	#[test]
	fn decodes_page_into_row() {
		let page = json!({
			"id": "row-1",
			"properties": {
				"Task": { "type": "title", "title": [{ "plain_text": "Fix " }, { "plain_text": "login" }] },
				"Status": { "type": "status", "status": { "name": "Backlog" } },
				"Name": { "type": "select", "select": null },
				"Functionality": { "type": "multi_select", "multi_select": [{ "name": "auth" }, { "name": "ui" }] },
				"GitHub Issue URL": { "type": "url", "url": null },
				"Estimate": { "type": "number", "number": 3 },
				"Owner": { "type": "people", "people": [] }
			}
		});

		let row = decode_row(serde_json::from_value(page).unwrap());
		assert_eq!(row.title, "Fix login");
		assert_eq!(row.status().as_deref(), Some("Backlog"));
		assert_eq!(row.name(), None);
		assert_eq!(row.functionality(), vec!["auth", "ui"]);
		assert_eq!(row.property("estimate").unwrap().value, PropertyValue::Text("3".into()));
		assert_eq!(row.property("owner").unwrap().value, PropertyValue::Empty);
		assert_eq!(row.handle().property(), "GitHub Issue URL");
		assert!(row.is_backlog_entry());
	}

	#[test]
	fn decodes_query_envelope() {
		let response: ListResponse<PageObject> = serde_json::from_value(json!({
			"object": "list",
			"results": [
				{ "object": "page", "id": "row-1", "archived": false, "properties": { "Task": { "id": "title", "type": "title", "title": [{ "type": "text", "plain_text": "One" }] } } },
				{ "object": "page", "id": "row-2", "properties": {} }
			],
			"has_more": true,
			"next_cursor": "row-3",
			"type": "page_or_database"
		}))
		.unwrap();

		assert_eq!(response.continuation().as_deref(), Some("row-3"));
		let rows: Vec<_> = response.results.into_iter().map(decode_row).collect();
		assert_eq!(rows[0].title, "One");
		assert_eq!(rows[1].title, "");
		assert!(serde_json::from_value::<ListResponse<PageObject>>(json!({ "results": [{ "properties": {} }] })).is_err());
	}

	#[test]
	fn decodes_formula_strings() {
		let prop: PropertyObject = serde_json::from_value(json!({ "id": "f", "type": "formula", "formula": { "type": "string", "string": "Backlog" } })).unwrap();
		assert_eq!(decode_property_value(&prop), PropertyValue::Text("Backlog".into()));

		let prop: PropertyObject = serde_json::from_value(json!({ "type": "formula", "formula": { "type": "boolean", "boolean": true } })).unwrap();
		assert_eq!(decode_property_value(&prop), PropertyValue::Empty);
	}

	#[test]
	fn decodes_blocks() {
		let block = json!({
			"id": "b1",
			"type": "heading_2",
			"has_children": true,
			"heading_2": { "rich_text": [{ "plain_text": "Hello" }] }
		});
		let fetched = decode_block(serde_json::from_value(block).unwrap());
		assert_eq!(fetched.kind, BlockKind::Heading2);
		assert_eq!(fetched.text, "Hello");
		assert!(fetched.has_children);

		let divider = json!({ "id": "b2", "type": "divider", "divider": {} });
		let fetched = decode_block(serde_json::from_value(divider).unwrap());
		assert_eq!(fetched.kind, BlockKind::Other("divider".into()));
		assert_eq!(fetched.text, "");
		assert!(!fetched.has_children);
	}

	#[test]
	fn cursor_only_when_more_pages() {
		let more: ListResponse<BlockObject> = serde_json::from_value(json!({ "object": "list", "results": [], "has_more": true, "next_cursor": "abc" })).unwrap();
		assert_eq!(more.continuation().as_deref(), Some("abc"));

		let last: ListResponse<BlockObject> = serde_json::from_value(json!({ "results": [], "has_more": false, "next_cursor": "abc" })).unwrap();
		assert_eq!(last.continuation(), None);
	}

	#[test]
	fn issue_url_payload_follows_property_kind() {
		let row = crate::record::tests::row("r", "t", &[("GitHub Issue URL", "rich_text", PropertyValue::Empty)]);
		let payload = issue_url_payload(&row.handle(), "https://github.com/o/r/issues/1");
		assert_eq!(
			payload["properties"]["GitHub Issue URL"]["rich_text"][0]["text"]["content"],
			json!("https://github.com/o/r/issues/1")
		);

		let row = crate::record::tests::row("r", "t", &[]);
		let payload = issue_url_payload(&row.handle(), "https://github.com/o/r/issues/1");
		assert_eq!(payload, json!({ "properties": { "github_issue_url": { "url": "https://github.com/o/r/issues/1" } } }));
	}
}
