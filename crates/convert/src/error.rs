use scriven_style::StyleError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    #[error("UTF-8 error in source markup: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("style resolution error: {0}")]
    Style(#[from] StyleError),

    #[error("resource import failed: {0}")]
    Resource(String),
}
