//! Content blocks and their markdown rendering.
//!
//! A page body in the workspace is a tree of blocks. Rendering is done one
//! block at a time ([`render_block`]); [`flatten`] walks a whole tree and
//! mirrors its shape in a [`Flattened`] value.
//!
//! # Quirks
//!
//! Both quirks below are relied upon by existing exports and are kept as is:
//! - Numbered items always render with index `1.`; the counter lives in a
//!   single call and never sees siblings.
//! - Once a block has children, its own line is dropped from the flattened
//!   output. A heading with nested bullets only contributes the bullets.

/// Kind tag of a content block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockKind {
	Paragraph,
	Heading1,
	Heading2,
	Heading3,
	BulletedListItem,
	NumberedListItem,
	/// Anything we don't render. Holds the remote type name for diagnostics.
	Other(String),
}
impl BlockKind {
	/// Map a remote block type name (`heading_2`, `bulleted_list_item`, ...) onto a kind.
	pub fn from_type_name(name: &str) -> Self {
		match name {
			"paragraph" | "text" => Self::Paragraph,
			"heading_1" | "header" => Self::Heading1,
			"heading_2" | "sub_header" => Self::Heading2,
			"heading_3" | "sub_sub_header" => Self::Heading3,
			"bulleted_list_item" | "bulleted_list" => Self::BulletedListItem,
			"numbered_list_item" | "numbered_list" => Self::NumberedListItem,
			other => Self::Other(other.to_string()),
		}
	}
}

/// A node of the page body tree.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentBlock {
	pub kind: BlockKind,
	pub text: String,
	pub children: Vec<ContentBlock>,
}
impl ContentBlock {
	pub fn new(kind: BlockKind, text: impl Into<String>) -> Self {
		Self {
			kind,
			text: text.into(),
			children: Vec::new(),
		}
	}

	pub fn with_children(mut self, children: Vec<ContentBlock>) -> Self {
		self.children = children;
		self
	}
}

/// Render a single block as one line of markdown.
///
/// Returns `None` for kinds without a markdown form.
pub fn render_block(block: &ContentBlock) -> Option<String> {
	let mut list_idx = 0_usize;
	let text = &block.text;

	match &block.kind {
		BlockKind::Paragraph => Some(text.clone()),
		BlockKind::Heading1 => Some(format!("# {text}")),
		BlockKind::Heading2 => Some(format!("## {text}")),
		BlockKind::Heading3 => Some(format!("### {text}")),
		BlockKind::BulletedListItem => Some(format!("- {text}")),
		BlockKind::NumberedListItem => {
			list_idx += 1;
			Some(format!("{list_idx}. {text}"))
		}
		BlockKind::Other(_) => None,
	}
}

/// Result of [`flatten`]: mirrors the block tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Flattened {
	/// Rendered line of a childless block (`None` if its kind doesn't render).
	Leaf(Option<String>),
	/// Flattened children of a block that has any.
	Branch(Vec<Flattened>),
}
impl Flattened {
	/// Rendered lines in depth-first order, skipping non-rendering leaves.
	pub fn lines(&self) -> Vec<&str> {
		let mut out = Vec::new();
		self.collect_lines(&mut out);
		out
	}

	fn collect_lines<'a>(&'a self, out: &mut Vec<&'a str>) {
		match self {
			Self::Leaf(Some(line)) => out.push(line),
			Self::Leaf(None) => {}
			Self::Branch(children) =>
				for child in children {
					child.collect_lines(out);
				},
		}
	}

	/// Join [`lines`](Self::lines) into a markdown document.
	pub fn to_markdown(&self) -> String {
		self.lines().join("\n")
	}
}

/// Walk `block` and its descendants.
pub fn flatten(block: &ContentBlock) -> Flattened {
	if block.children.is_empty() {
		return Flattened::Leaf(render_block(block));
	}
	Flattened::Branch(block.children.iter().map(flatten).collect())
}
