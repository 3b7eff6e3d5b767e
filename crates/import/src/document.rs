//! Document-level importers: external documents spliced in as sections,
//! PDFs rasterized page by page, legacy formats converted through PDF,
//! and other templates rendered recursively.

use std::fs;
use std::path::{Path, PathBuf};

use scriven_style::resolver::PAGE_BREAK_STYLE;

use crate::error::ImportError;
use crate::image::{run_tool, Anchor, ImageOptions, ImportContext, SizeUnit, WrapInPara};

/// DPI used when splitting a PDF into page images.
const PDF_RASTER_DPI: &str = "125";

#[derive(Debug, Clone, Copy, Default)]
pub struct OdtImportOptions {
    pub page_break_before: bool,
    pub page_break_after: bool,
}

/// Renders another document template; the seam through which the
/// template importer re-enters the full generation pipeline. The inner
/// rendering runs to completion before the outer conversion resumes.
pub trait TemplateRenderer {
    fn render(
        &mut self,
        template: &Path,
        data: &serde_json::Value,
        output: &Path,
    ) -> Result<(), String>;
}

fn require_file(path: &Path) -> Result<(), ImportError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ImportError::FileNotFound(path.to_path_buf()))
    }
}

/// Splices another document in as an external section, with optional
/// page breaks around it.
pub fn import_odt(
    ctx: &mut ImportContext,
    at: &Path,
    options: OdtImportOptions,
) -> Result<String, ImportError> {
    require_file(at)?;
    let page_break =
        format!("<text:p text:style-name=\"{PAGE_BREAK_STYLE}\"></text:p>");
    let mut res = String::new();
    if options.page_break_before {
        res.push_str(&page_break);
    }
    res.push_str(&format!(
        "<text:section text:name=\"ImportSection{}\"><text:section-source \
         xlink:href=\"{}\" text:filter-name=\"writer8\"/></text:section>",
        ctx.unique_id(),
        at.display(),
    ));
    if options.page_break_after {
        res.push_str(&page_break);
    }
    Ok(res)
}

/// Renders another template with the given data context, then imports
/// the produced document as a section.
pub fn import_template(
    ctx: &mut ImportContext,
    template: &Path,
    data: &serde_json::Value,
    renderer: &mut dyn TemplateRenderer,
    options: OdtImportOptions,
) -> Result<String, ImportError> {
    require_file(template)?;
    let id = ctx.unique_id();
    let output = ctx.temp_dir().join(format!("{id}.odt"));
    renderer
        .render(template, data, &output)
        .map_err(ImportError::Render)?;
    import_odt(ctx, &output, options)
}

/// Splits a PDF into one raster image per page and imports the pages in
/// order. Producing no page at all is a hard error: silently dropping a
/// whole PDF would leave an invisible hole in the document.
pub fn import_pdf(ctx: &mut ImportContext, at: &Path) -> Result<String, ImportError> {
    require_file(at)?;
    let prefix = format!("pdf{}", ctx.unique_id());
    let pages_dir = ctx.temp_dir().to_path_buf();
    let output_pattern = pages_dir.join(format!("{prefix}%d.png"));

    run_tool(
        "gs",
        &[
            "-dSAFER".to_string(),
            "-dNOPAUSE".to_string(),
            "-dBATCH".to_string(),
            "-sDEVICE=png16m".to_string(),
            format!("-r{PDF_RASTER_DPI}"),
            "-dTextAlphaBits=4".to_string(),
            "-dGraphicsAlphaBits=4".to_string(),
            format!("-sOutputFile={}", output_pattern.display()),
            at.display().to_string(),
        ],
    )?;

    let page_path = |index: usize| -> PathBuf { pages_dir.join(format!("{prefix}{index}.png")) };
    if !page_path(1).is_file() {
        return Err(ImportError::PdfToImages);
    }

    let mut res = String::new();
    let mut index = 1;
    loop {
        let page = page_path(index);
        if !page.is_file() {
            break;
        }
        let options = ImageOptions {
            anchor: Anchor::Paragraph,
            wrap_in_para: WrapInPara::Plain,
            size: None,
            size_unit: SizeUnit::Px,
            keep_ratio: true,
            style_attr: None,
            convert_options: None,
        };
        res.push_str(&ctx.import_image(&page.to_string_lossy(), &options)?);
        // The staged copy lives in the document package now.
        fs::remove_file(&page).map_err(|e| ImportError::Io {
            path: page,
            source: e,
        })?;
        index += 1;
    }
    Ok(res)
}

/// Converts any office-suite-readable document to PDF, then imports the
/// PDF page images. A non-empty error stream from the conversion is
/// treated as failure.
pub fn import_via_pdf(ctx: &mut ImportContext, at: &Path) -> Result<String, ImportError> {
    require_file(at)?;
    let out_dir = ctx.temp_dir().to_path_buf();
    let (_, stderr) = run_tool(
        "soffice",
        &[
            "--headless".to_string(),
            "--convert-to".to_string(),
            "pdf".to_string(),
            "--outdir".to_string(),
            out_dir.display().to_string(),
            at.display().to_string(),
        ],
    )?;
    if !stderr.trim().is_empty() {
        return Err(ImportError::ToPdf(stderr));
    }
    let stem = at
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pdf = out_dir.join(format!("{stem}.pdf"));
    import_pdf(ctx, &pdf)
}
