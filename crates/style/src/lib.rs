//! Style resolution for the XHTML to OpenDocument conversion engine.
//!
//! This crate owns everything style-shaped: parsing CSS-like declarations,
//! reading a template's style registry, validating styles mappings, and
//! resolving or synthesizing the style to apply to a converted element.

pub mod css;
pub mod error;
pub mod generator;
pub mod mapping;
pub mod parsers;
pub mod properties;
pub mod registry;
pub mod resolver;
pub mod tags;

pub use css::{parse_style_attribute, AttrMap, CssDeclarations, CssValue};
pub use error::StyleError;
pub use generator::{DynamicStyles, StyleGenerator};
pub use mapping::{MappingError, StylesMapping, ValidatedMapping};
pub use properties::{ListKind, ListProperties, TableProperties};
pub use registry::{parse_styles, PageLayout, Style, StyleFamily, StyleRegistry, TemplateStyles};
pub use resolver::{ResolvedStyle, StylesManager};
