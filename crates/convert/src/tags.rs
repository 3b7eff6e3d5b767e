//! Converter-side tag knowledge: the XHTML to ODT tag table and the
//! structural element kinds driving conflict detection.

pub use scriven_style::tags::*;

/// The structural kind of an open element, as far as nesting rules are
/// concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemKind {
    /// A paragraph-like text container (`p`, `div`, `blockquote`, `li`).
    Para,
    /// A list container (`ul`, `ol`).
    List,
    Other,
}

pub fn elem_kind(tag: &str) -> ElemKind {
    match tag {
        "p" | "div" | "blockquote" | "li" => ElemKind::Para,
        "ul" | "ol" => ElemKind::List,
        _ => ElemKind::Other,
    }
}

/// The target tag for a source tag, when a direct equivalent exists.
pub fn odf_tag(tag: &str) -> Option<&'static str> {
    Some(match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "text:h",
        "p" | "div" | "blockquote" => "text:p",
        "b" | "i" | "strong" | "strike" | "s" | "u" | "em" | "sub" | "sup" | "span" | "code"
        | "font" => "text:span",
        "br" => "text:line-break",
        "a" => "text:a",
        "ul" | "ol" => "text:list",
        "li" => "text:list-item",
        "td" | "th" => "table:table-cell",
        "table" => "table:table",
        "thead" => "table:table-header-rows",
        "tr" => "table:table-row",
        _ => return None,
    })
}

/// Tags the target schema cannot host inside a paragraph.
pub fn not_inside_para(tag: &str) -> bool {
    is_heading(tag) || is_list(tag) || tag == "table"
}

pub fn not_inside_para_or_para(tag: &str) -> bool {
    not_inside_para(tag) || PARA_TAGS.contains(&tag)
}

/// Tags the target schema cannot host inside a list.
pub fn not_inside_list(tag: &str) -> bool {
    tag == "table"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odf_tag() {
        assert_eq!(odf_tag("p"), Some("text:p"));
        assert_eq!(odf_tag("h3"), Some("text:h"));
        assert_eq!(odf_tag("strong"), Some("text:span"));
        assert_eq!(odf_tag("img"), None);
        assert_eq!(odf_tag("q"), None);
    }

    #[test]
    fn test_elem_kind() {
        assert_eq!(elem_kind("li"), ElemKind::Para);
        assert_eq!(elem_kind("ol"), ElemKind::List);
        assert_eq!(elem_kind("b"), ElemKind::Other);
    }

    #[test]
    fn test_nesting_rules() {
        assert!(not_inside_para("table"));
        assert!(not_inside_para("ul"));
        assert!(!not_inside_para("span"));
        assert!(not_inside_para_or_para("blockquote"));
        assert!(not_inside_list("table"));
        assert!(!not_inside_list("ul"));
    }
}
