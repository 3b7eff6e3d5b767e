//! Resource importers for the conversion engine.
//!
//! Stages external content (images, other documents, PDFs) into the
//! target document's namespaces and produces the markup referencing it.
//! Identical resources are staged once and shared; a remote image that
//! cannot be retrieved degrades to a visible placeholder instead of
//! failing the whole document.

pub mod document;
pub mod error;
pub mod image;
pub mod probe;

pub use document::{import_odt, import_pdf, import_template, import_via_pdf, OdtImportOptions,
    TemplateRenderer};
pub use error::ImportError;
pub use image::{
    Anchor, ConvertOptions, ImageOptions, ImageResolver, ImportContext, SizeUnit, WrapInPara,
};
pub use probe::{probe, ImageFormat, ImageInfo};
