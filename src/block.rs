use std::path::{Path, PathBuf};

use crate::style::BODY_ROLE;

/// A run of paragraph text with inline emphasis. `\n` is a line break.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: false, italic: false }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: true, italic: false }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: false, italic: true }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Presence {
    #[default]
    Required,
    /// A missing optional asset renders nothing and is not reported.
    Optional,
}

/// An external file a block needs. Resolved at render time, not when the
/// block is built.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetReference {
    pub path: PathBuf,
    pub presence: Presence,
}

impl AssetReference {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), presence: Presence::Required }
    }

    pub fn optional(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), presence: Presence::Optional }
    }
}

/// One unit of document content, in document order.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    /// Level 0 is the document title.
    Heading { level: u8, text: String },
    Paragraph { spans: Vec<Span>, style: String },
    ListItem { text: String },
    Image {
        asset: AssetReference,
        caption: String,
        width_hint: Option<f32>, // points
    },
    PageBreak,
    TableOfContents,
}

impl ContentBlock {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        ContentBlock::Heading { level, text: text.into() }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::styled(text, BODY_ROLE)
    }

    pub fn styled(text: impl Into<String>, style: &str) -> Self {
        ContentBlock::Paragraph { spans: vec![Span::plain(text)], style: style.to_string() }
    }

    pub fn spans(spans: Vec<Span>, style: &str) -> Self {
        ContentBlock::Paragraph { spans, style: style.to_string() }
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        ContentBlock::ListItem { text: text.into() }
    }

    pub fn image(path: impl AsRef<Path>, caption: impl Into<String>) -> Self {
        ContentBlock::Image {
            asset: AssetReference::new(path),
            caption: caption.into(),
            width_hint: None,
        }
    }

    /// The style role this block renders with, if it has text of its own.
    pub fn role(&self) -> Option<String> {
        match self {
            ContentBlock::Heading { level: 0, .. } => Some("title".to_string()),
            ContentBlock::Heading { level, .. } => Some(format!("heading-{level}")),
            ContentBlock::Paragraph { style, .. } => Some(style.clone()),
            ContentBlock::ListItem { .. } => Some("list-item".to_string()),
            ContentBlock::Image { .. } => Some("caption".to_string()),
            ContentBlock::TableOfContents => Some("toc".to_string()),
            ContentBlock::PageBreak => None,
        }
    }
}
