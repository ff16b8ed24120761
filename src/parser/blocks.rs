use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static BLOCK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, li, h1, h2, h3, h4, h5, h6, b, strong").unwrap());

/// Markup role of a block, derived from its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Heading(u8),
    Paragraph,
    ListItem,
    Strong,
    Other,
}

impl Role {
    pub fn from_tag(tag: &str) -> Role {
        match tag.to_ascii_lowercase().as_str() {
            "p" => Role::Paragraph,
            "li" => Role::ListItem,
            "b" | "strong" => Role::Strong,
            t => match t.strip_prefix('h').and_then(|n| n.parse::<u8>().ok()) {
                Some(level @ 1..=6) => Role::Heading(level),
                _ => Role::Other,
            },
        }
    }

    /// Headings and bold spans always open a new question.
    pub fn starts_question(self) -> bool {
        matches!(self, Role::Heading(_) | Role::Strong)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub role: Role,
    pub text: String,
}

impl Block {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Walk the document and yield classified blocks in document order.
///
/// Nested matches are all yielded: a `<strong>` inside a `<p>` produces the
/// paragraph block followed by the strong block.
pub fn extract_blocks(document: &Html) -> impl Iterator<Item = Block> + '_ {
    document
        .select(&BLOCK_SELECTOR)
        .map(|el| Block::new(Role::from_tag(el.value().name()), element_text(el)))
}

/// All descendant text, whitespace runs collapsed, ends trimmed.
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
