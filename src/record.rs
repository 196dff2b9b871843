//! Backlog rows as read from the workspace, and the records built from them.

use std::collections::BTreeMap;

/// Only rows with this status are migrated.
pub const BACKLOG_STATUS: &str = "Backlog";
/// Rows with this name are never migrated, whatever their status.
pub const EXCLUDED_NAME: &str = "Post-alpha";
/// Slug of the property the created issue's URL is written to.
pub const ISSUE_URL_SLUG: &str = "github_issue_url";

/// Identifier of a workspace object (page, block, database), as returned by the API.
#[derive(Clone, Debug, derive_more::Deref, derive_more::Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NotionId(String);
impl NotionId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// The id with separators removed, as it appears in exported file names.
	pub fn compact(&self) -> String {
		self.0.chars().filter(|c| *c != '-').collect()
	}
}

/// Reduce a property name to its attribute-style slug: `"GitHub Issue URL"` → `"github_issue_url"`.
pub fn slugify(name: &str) -> String {
	let mut slug = String::with_capacity(name.len());
	let mut pending_sep = false;
	for c in name.chars() {
		if c.is_alphanumeric() {
			if pending_sep && !slug.is_empty() {
				slug.push('_');
			}
			pending_sep = false;
			slug.extend(c.to_lowercase());
		} else {
			pending_sep = true;
		}
	}
	slug
}

/// Decoded value of a single row property.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum PropertyValue {
	Text(String),
	/// Multi-select option names, in their stored order.
	Options(Vec<String>),
	#[default]
	Empty,
}
impl PropertyValue {
	pub fn as_text(&self) -> Option<String> {
		match self {
			Self::Text(s) => Some(s.clone()),
			Self::Options(opts) if !opts.is_empty() => Some(opts.join(", ")),
			Self::Options(_) | Self::Empty => None,
		}
	}
}

/// How the issue URL property is stored on the row.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UrlPropertyKind {
	#[default]
	Url,
	RichText,
}

/// One property of a row, keyed by slug in [`BacklogRow::properties`].
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
	/// Name as shown in the workspace.
	pub name: String,
	/// Remote type name (`select`, `rich_text`, ...).
	pub kind: String,
	pub value: PropertyValue,
}

/// A raw row of the backlog collection.
#[derive(Clone, Debug, PartialEq)]
pub struct BacklogRow {
	pub id: NotionId,
	pub title: String,
	pub properties: BTreeMap<String, Property>,
}
impl BacklogRow {
	pub fn property(&self, slug: &str) -> Option<&Property> {
		self.properties.get(slug)
	}

	fn text(&self, slug: &str) -> Option<String> {
		self.property(slug).and_then(|p| p.value.as_text())
	}

	pub fn status(&self) -> Option<String> {
		self.text("status")
	}

	pub fn name(&self) -> Option<String> {
		self.text("name")
	}

	/// Labels derived from the `functionality` property.
	pub fn functionality(&self) -> Vec<String> {
		match self.property("functionality").map(|p| &p.value) {
			Some(PropertyValue::Text(s)) => vec![s.clone()],
			Some(PropertyValue::Options(opts)) => opts.clone(),
			Some(PropertyValue::Empty) | None => Vec::new(),
		}
	}

	/// Whether this row is an actionable backlog entry. The only selection criterion.
	pub fn is_backlog_entry(&self) -> bool {
		self.status().as_deref() == Some(BACKLOG_STATUS) && self.name().as_deref() != Some(EXCLUDED_NAME)
	}

	/// Handle used to write the issue URL back onto this row.
	pub fn handle(&self) -> RowHandle {
		let (property, kind) = match self.property(ISSUE_URL_SLUG) {
			Some(p) => (p.name.clone(), if p.kind == "rich_text" { UrlPropertyKind::RichText } else { UrlPropertyKind::Url }),
			None => (ISSUE_URL_SLUG.to_string(), UrlPropertyKind::Url),
		};
		RowHandle {
			row_id: self.id.clone(),
			property,
			kind,
		}
	}
}

/// Opaque reference back to the originating row. Only used for write-back.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowHandle {
	row_id: NotionId,
	property: String,
	kind: UrlPropertyKind,
}
impl RowHandle {
	pub fn row_id(&self) -> &NotionId {
		&self.row_id
	}

	pub fn property(&self) -> &str {
		&self.property
	}

	pub fn kind(&self) -> UrlPropertyKind {
		self.kind
	}
}

/// Normalized backlog entry, ready to be published.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BacklogRecord {
	pub title: String,
	pub labels: Vec<String>,
	pub body: String,
}
impl BacklogRecord {
	pub fn from_row(row: &BacklogRow, body: String) -> Self {
		Self {
			title: row.title.clone(),
			labels: row.functionality(),
			body,
		}
	}
}
