//! Stack frames for the currently open source elements.

use scriven_style::resolver::CELL_CONTENT_STYLE;
use scriven_style::AttrMap;

use crate::tags::{elem_kind, odf_tag, ElemKind};

/// One currently open source-markup element. Frames live in the
/// converter's stack; a frame's parent is the stack index it saw on top
/// when it was created, never a live reference.
#[derive(Debug, Clone)]
pub struct ElementFrame {
    pub tag: String,
    pub kind: ElemKind,
    pub parent: Option<usize>,
    /// The raw `class` attribute, kept for late style lookups.
    pub class_attr: Option<String>,
    /// For `ol` only: the `start` attribute, consumed by the first item.
    pub list_start: Option<u32>,
    /// Elements force-closed to make room for this one, to be reopened
    /// once this element closes.
    pub tags_to_reopen: Vec<ElementFrame>,
    /// Synthesized elements (inner paragraphs) that must close before
    /// this element's own closing tag.
    pub tags_to_close: Vec<ElementFrame>,
    /// Set when this element had to be force-closed around an
    /// incompatible child.
    pub conflictual: bool,
    /// The list style resolved for this element (lists only).
    pub list_style: Option<String>,
    /// Style for a synthesized inner paragraph, when this element hosts
    /// text directly.
    pub inner_style: Option<String>,
    /// Keep the content but emit no wrapper tags for this element.
    pub remove_tag: bool,
    /// Whether any character data was dumped from inside this element.
    pub content_dumped: bool,
    /// The exact start markup emitted for this element, for empty-wrapper
    /// elision.
    pub emitted_start: Option<String>,
}

impl ElementFrame {
    pub fn new(tag: &str, attrs: &AttrMap, parent: Option<usize>) -> ElementFrame {
        let list_start = if tag == "ol" {
            attrs.get("start").and_then(|s| s.parse().ok())
        } else {
            None
        };
        ElementFrame {
            kind: elem_kind(tag),
            parent,
            class_attr: attrs.get("class").cloned(),
            list_start,
            tags_to_reopen: Vec::new(),
            tags_to_close: Vec::new(),
            conflictual: false,
            list_style: None,
            inner_style: (tag == "td").then(|| CELL_CONTENT_STYLE.to_string()),
            remove_tag: false,
            content_dumped: false,
            emitted_start: None,
            tag: tag.to_string(),
        }
    }

    pub fn odf_tag(&self) -> Option<&'static str> {
        odf_tag(&self.tag)
    }

    /// Renders this frame's closing markup, inner synthesized elements
    /// closing first.
    pub fn render_close(&self) -> String {
        let mut tag = self
            .odf_tag()
            .map(|t| format!("</{t}>"))
            .unwrap_or_default();
        for sub in &self.tags_to_close {
            tag = format!("{}{}", sub.render_close(), tag);
        }
        tag
    }
}
