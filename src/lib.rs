//! scriven: an XHTML to OpenDocument conversion engine.
//!
//! Takes an office-document template's styles, a styles mapping, and
//! XHTML fragments, and produces schema-valid content-stream markup plus
//! the generated style declarations and staged resources the target
//! document needs.
//!
//! ```no_run
//! use scriven::{DocumentContext, ImporterConfig, StylesMapping};
//!
//! # fn main() -> Result<(), scriven::ScrivenError> {
//! let styles_xml = std::fs::read_to_string("styles.xml")?;
//! let mut doc = DocumentContext::new(&styles_xml, ImporterConfig::new("out/Pictures"))?;
//! doc.set_styles_mapping(&StylesMapping::new().map("p", "Body"))?;
//!
//! let markup = doc.convert_xhtml("<p>Hello</p>", None, false)?;
//! let output = doc.finish();
//! # let _ = (markup, output);
//! # Ok(())
//! # }
//! ```

mod context;
mod error;

pub use context::{ConversionOutput, DocumentContext, ImporterConfig, UniqueNamer};
pub use error::ScrivenError;

pub use scriven_convert::{convert, ConvertError, ResourceImporter, SequentialNamer, StyleNamer};
pub use scriven_import::{
    Anchor, ConvertOptions, ImageOptions, ImageResolver, ImportContext, ImportError,
    OdtImportOptions, SizeUnit, TemplateRenderer, WrapInPara,
};
pub use scriven_style::{
    ListKind, ListProperties, PageLayout, Style, StyleError, StyleFamily, StyleRegistry,
    StylesManager, StylesMapping, TableProperties, ValidatedMapping,
};
pub use scriven_types::{Color, Length, LengthUnit};
