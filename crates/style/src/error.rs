use crate::mapping::MappingError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("XML error in styles stream: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute in styles stream: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("UTF-8 error in styles stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid value for '{property}': {value}")]
    InvalidValue { property: String, value: String },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// A paragraph-wide element was mapped onto a text style. Text styles
    /// only apply to a chunk of text within a paragraph.
    #[error("element '{tag}' needs a paragraph-wide style, but '{style}' is a text style")]
    TextStyleOnParagraph { tag: String, style: String },

    /// A text-level element was mapped onto a paragraph-wide style.
    #[error("element '{tag}' needs a text style, but '{style}' is a paragraph-wide style")]
    ParagraphStyleOnText { tag: String, style: String },
}
