//! Seams between the converter and its collaborators.

use crate::error::ConvertError;

/// Imports an embedded resource and returns the markup fragment to splice
/// into the output in its place. Implemented by the resource-importer
/// layer; the converter itself never touches the filesystem or network.
pub trait ResourceImporter {
    fn import_image(&mut self, src: &str, style_attr: Option<&str>)
        -> Result<String, ConvertError>;
}

/// Source of unique style names for generated table and list styles.
/// Names must stay unique across every conversion feeding the same
/// document, so the document context usually provides the implementation.
pub trait StyleNamer {
    fn unique_name(&mut self, kind: &str) -> String;
}

/// A deterministic namer: `Table1`, `List2`, ... Suitable for a single
/// conversion or for tests.
#[derive(Debug, Default)]
pub struct SequentialNamer {
    counter: u32,
}

impl SequentialNamer {
    pub fn new() -> SequentialNamer {
        SequentialNamer::default()
    }
}

impl StyleNamer for SequentialNamer {
    fn unique_name(&mut self, kind: &str) -> String {
        self.counter += 1;
        format!("{kind}{}", self.counter)
    }
}
