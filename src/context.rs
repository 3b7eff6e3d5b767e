//! Per-document pipeline state: the styles manager, the resource staging
//! context, and the unique-name source shared by every conversion that
//! feeds the same document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use scriven_convert::{ConvertError, ResourceImporter, StyleNamer};
use scriven_import::{ImageOptions, ImageResolver, ImportContext, OdtImportOptions,
    TemplateRenderer};
use scriven_style::{DynamicStyles, StylesManager, StylesMapping, ValidatedMapping};

use crate::error::ScrivenError;

/// Generates document-unique style names: time-based with a random
/// suffix, so concurrent conversions sharing a temp namespace cannot
/// collide, plus a serial for sub-microsecond bursts within one context.
#[derive(Debug, Default)]
pub struct UniqueNamer {
    serial: u32,
}

impl StyleNamer for UniqueNamer {
    fn unique_name(&mut self, kind: &str) -> String {
        self.serial += 1;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        format!(
            "{kind}{}{}_{}_{}",
            now.as_secs(),
            now.subsec_micros(),
            rand::rng().random_range(1..=100),
            self.serial
        )
    }
}

/// Where the resource importer stages content and how it resolves remote
/// images.
pub struct ImporterConfig {
    /// Directory, inside the document package, receiving staged images.
    pub pictures_dir: PathBuf,
    /// Working area for staged documents; a collision-resistant
    /// directory under the system temp dir when not given.
    pub temp_dir: Option<PathBuf>,
    /// Fallback resolver consulted when a remote image cannot be fetched.
    pub resolver: Option<Box<dyn ImageResolver>>,
}

impl ImporterConfig {
    pub fn new(pictures_dir: impl Into<PathBuf>) -> ImporterConfig {
        ImporterConfig {
            pictures_dir: pictures_dir.into(),
            temp_dir: None,
            resolver: None,
        }
    }
}

/// Everything produced by the conversions run against one document.
#[derive(Debug, Default)]
pub struct ConversionOutput {
    /// Style declarations for the content stream's automatic styles.
    pub content_styles: Vec<String>,
    /// Style declarations for the document-wide styles area.
    pub document_styles: Vec<String>,
    /// Staged resources: original locator -> package-relative path.
    pub staged_resources: HashMap<String, String>,
}

/// The pipeline entry point: owns the template's styles, the global
/// mapping, and the resource staging state for one target document.
pub struct DocumentContext {
    manager: StylesManager,
    import: ImportContext,
    namer: UniqueNamer,
}

impl DocumentContext {
    /// Builds a context from the template's styles stream and the
    /// importer configuration.
    pub fn new(styles_xml: &str, config: ImporterConfig) -> Result<DocumentContext, ScrivenError> {
        let manager = StylesManager::new(styles_xml)?;
        let temp_dir = match config.temp_dir {
            Some(dir) => dir,
            None => {
                let mut namer = UniqueNamer::default();
                std::env::temp_dir().join(namer.unique_name("scriven"))
            }
        };
        let mut import = ImportContext::new(config.pictures_dir, temp_dir)?;
        if let Some(resolver) = config.resolver {
            import = import.with_resolver(resolver);
        }
        Ok(DocumentContext {
            manager,
            import,
            namer: UniqueNamer::default(),
        })
    }

    /// Validates and installs the document-wide styles mapping. Fails
    /// before any conversion when the mapping is defective.
    pub fn set_styles_mapping(&mut self, mapping: &StylesMapping) -> Result<(), ScrivenError> {
        self.manager.set_global_mapping(mapping)?;
        Ok(())
    }

    pub fn styles_manager(&self) -> &StylesManager {
        &self.manager
    }

    /// Converts one XHTML fragment against this document's styles.
    /// `local_mapping` applies to this call only and takes priority over
    /// the global mapping.
    pub fn convert_xhtml(
        &mut self,
        xhtml: &str,
        local_mapping: Option<&StylesMapping>,
        keep_with_next: bool,
    ) -> Result<String, ScrivenError> {
        let local = match local_mapping {
            Some(mapping) => self.manager.validate_mapping(mapping)?,
            None => ValidatedMapping::default(),
        };
        log::debug!(
            "converting {} bytes of markup (local mapping: {})",
            xhtml.len(),
            local_mapping.is_some()
        );
        let mut importer = MarkupImageImporter {
            ctx: &mut self.import,
        };
        let markup = scriven_convert::convert(
            xhtml,
            &mut self.manager,
            &local,
            keep_with_next,
            Some(&mut importer),
            &mut self.namer,
        )?;
        Ok(markup)
    }

    /// Imports an image outside the XHTML flow (a template field
    /// producing an image directly).
    pub fn import_image(
        &mut self,
        at: &str,
        options: &ImageOptions,
    ) -> Result<String, ScrivenError> {
        Ok(self.import.import_image(at, options)?)
    }

    /// Splices another document in as an external section.
    pub fn import_document(
        &mut self,
        at: &Path,
        options: OdtImportOptions,
    ) -> Result<String, ScrivenError> {
        Ok(scriven_import::import_odt(&mut self.import, at, options)?)
    }

    /// Rasterizes a PDF and imports its pages as images.
    pub fn import_pdf(&mut self, at: &Path) -> Result<String, ScrivenError> {
        Ok(scriven_import::import_pdf(&mut self.import, at)?)
    }

    /// Converts a legacy office document to PDF, then imports it.
    pub fn import_via_pdf(&mut self, at: &Path) -> Result<String, ScrivenError> {
        Ok(scriven_import::import_via_pdf(&mut self.import, at)?)
    }

    /// Renders another template against `data` and imports the result.
    /// The recursive rendering runs to completion before this context is
    /// touched again.
    pub fn import_template(
        &mut self,
        template: &Path,
        data: &serde_json::Value,
        renderer: &mut dyn TemplateRenderer,
        options: OdtImportOptions,
    ) -> Result<String, ScrivenError> {
        Ok(scriven_import::import_template(
            &mut self.import,
            template,
            data,
            renderer,
            options,
        )?)
    }

    /// Hands out everything accumulated for the target document,
    /// resetting the dynamic-style areas.
    pub fn finish(&mut self) -> ConversionOutput {
        let DynamicStyles { content, styles } = self.manager.take_dynamic();
        ConversionOutput {
            content_styles: content,
            document_styles: styles,
            staged_resources: self.import.staged().clone(),
        }
    }
}

/// Adapts the staging context to the converter's importer seam for
/// `<img>` elements.
struct MarkupImageImporter<'a> {
    ctx: &'a mut ImportContext,
}

impl ResourceImporter for MarkupImageImporter<'_> {
    fn import_image(
        &mut self,
        src: &str,
        style_attr: Option<&str>,
    ) -> Result<String, ConvertError> {
        self.ctx
            .import_image(src, &ImageOptions::for_markup(style_attr))
            .map_err(|e| ConvertError::Resource(e.to_string()))
    }
}
