//! The source-markup tag vocabulary, grouped by the structural role each
//! tag plays in the target schema.

/// Block-level text containers mapping to a plain target paragraph.
pub const PARA_TAGS: &[&str] = &["p", "div", "blockquote"];

pub const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

pub const LIST_TAGS: &[&str] = &["ul", "ol"];

/// Run-level tags that carry character formatting of their own.
pub const STYLED_INNER_TAGS: &[&str] = &[
    "b", "i", "strong", "strike", "s", "u", "em", "sub", "sup", "span", "a", "q", "code",
];

/// All run-level tags, styled or not.
pub const INNER_TAGS: &[&str] = &[
    "b", "i", "strong", "strike", "s", "u", "em", "sub", "sup", "span", "a", "q", "code", "br",
    "acronym",
];

/// Tags whose direct text content must be hosted by a synthesized inner
/// paragraph in the target schema.
pub const OUTER_TAGS: &[&str] = &["td", "th", "li"];

pub const TABLE_CELL_TAGS: &[&str] = &["td", "th"];
pub const TABLE_COL_TAGS: &[&str] = &["td", "th", "col"];
pub const TABLE_ROW_TAGS: &[&str] = &["tr", "colgroup"];

/// Tags whose entire content is dropped from the output.
pub const IGNORABLE_TAGS: &[&str] = &["meta", "title", "style", "script"];

/// Tags that cannot carry a style reference in the target schema, and are
/// therefore rejected as styles-mapping keys.
pub const UNSTYLABLE_TAGS: &[&str] = &["br", "hr", "thead", "tbody", "tr", "colgroup", "col", "img"];

pub fn is_heading(tag: &str) -> bool {
    HEADING_TAGS.contains(&tag)
}

/// Outline level of a heading tag (`h3` -> 3).
pub fn heading_level(tag: &str) -> Option<u8> {
    if is_heading(tag) {
        tag[1..].parse().ok()
    } else {
        None
    }
}

pub fn is_list(tag: &str) -> bool {
    LIST_TAGS.contains(&tag)
}

pub fn is_inner(tag: &str) -> bool {
    INNER_TAGS.contains(&tag)
}

pub fn is_styled_inner(tag: &str) -> bool {
    STYLED_INNER_TAGS.contains(&tag)
}

/// Whether a whole-paragraph style may be attached to this tag.
pub fn is_paragraph_wide(tag: &str) -> bool {
    PARA_TAGS.contains(&tag) || is_heading(tag) || tag == "li"
}
