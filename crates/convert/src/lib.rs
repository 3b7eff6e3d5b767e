//! The XHTML to OpenDocument tag-structure converter.
//!
//! A single forward pass over the source markup, reconciling nesting rules
//! the target schema cannot represent: block content inside paragraphs,
//! paragraphs inside character runs, tables inside lists. Styling
//! decisions are delegated per element to a
//! [`StylesManager`](scriven_style::StylesManager), and embedded resources
//! to a [`ResourceImporter`] implementation.

pub mod converter;
pub mod element;
pub mod error;
pub mod importer;
pub mod table;
pub mod tags;
pub mod whitespace;

pub use converter::{convert, Converter};
pub use element::ElementFrame;
pub use error::ConvertError;
pub use importer::{ResourceImporter, SequentialNamer, StyleNamer};
pub use table::TableBuffer;
