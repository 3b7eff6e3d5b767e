//! Image staging and embedding.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use scriven_style::parse_style_attribute;
use scriven_style::resolver::IMAGE_STYLE_PREFIX;
use scriven_types::{format_number, PX_PER_CM};

use crate::error::ImportError;
use crate::probe::{probe, ImageFormat, ImageInfo};

/// A visible stand-in embedded when a remote image cannot be retrieved,
/// so a missing resource never silently blanks a document region.
const IMAGE_NOT_FOUND: &[u8] = include_bytes!("../assets/image_not_found.png");

const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/svg+xml", "svg"),
];

/// How an embedded image is anchored in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    Page,
    #[default]
    Paragraph,
    Char,
    AsChar,
}

impl Anchor {
    pub fn parse(s: &str) -> Result<Anchor, ImportError> {
        match s {
            "page" => Ok(Anchor::Page),
            "paragraph" => Ok(Anchor::Paragraph),
            "char" => Ok(Anchor::Char),
            "as-char" => Ok(Anchor::AsChar),
            other => Err(ImportError::WrongAnchor(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::Page => "page",
            Anchor::Paragraph => "paragraph",
            Anchor::Char => "char",
            Anchor::AsChar => "as-char",
        }
    }
}

/// Whether the frame markup is wrapped in a paragraph of its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WrapInPara {
    #[default]
    No,
    Plain,
    Styled(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnit {
    #[default]
    Px,
    /// Sizes are percentages of the image's natural size.
    Percent,
}

/// Extra arguments for the external image-conversion tool: either a
/// literal option string, or a function deriving one from the probed
/// image.
pub enum ConvertOptions {
    Fixed(String),
    Computed(fn(&ImageInfo) -> Option<String>),
}

#[derive(Default)]
pub struct ImageOptions {
    pub anchor: Anchor,
    pub wrap_in_para: WrapInPara,
    /// Explicit size, in `size_unit`. Overrides the natural size.
    pub size: Option<(f64, f64)>,
    pub size_unit: SizeUnit,
    /// When both dimensions are being overridden, apply the tighter of
    /// the two implied scale ratios to both, avoiding distortion.
    pub keep_ratio: bool,
    /// The source element's CSS declarations (`width`, `height`, `float`).
    pub style_attr: Option<String>,
    pub convert_options: Option<ConvertOptions>,
}

impl ImageOptions {
    /// The options the converter uses for `<img>` elements.
    pub fn for_markup(style_attr: Option<&str>) -> ImageOptions {
        ImageOptions {
            keep_ratio: true,
            style_attr: style_attr.map(str::to_string),
            ..ImageOptions::default()
        }
    }
}

/// Resolves image URLs the plain HTTP fetch cannot serve, e.g. against
/// an internal object store. Returns the raw bytes and their format
/// extension.
pub trait ImageResolver {
    fn resolve(&self, url: &str) -> Option<(Vec<u8>, String)>;
}

/// Per-document staging state shared by every importer: target
/// directories, the resource dedup map and the unique-name source.
pub struct ImportContext {
    /// Directory, inside the document package, where images are staged.
    pictures_dir: PathBuf,
    /// Working area for staged documents and intermediate files.
    temp_dir: PathBuf,
    /// Original locator -> staged package-relative path.
    staged: HashMap<String, String>,
    resolver: Option<Box<dyn ImageResolver>>,
    serial: u32,
}

impl ImportContext {
    pub fn new(
        pictures_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Result<ImportContext, ImportError> {
        let pictures_dir = pictures_dir.into();
        let temp_dir = temp_dir.into();
        for dir in [&pictures_dir, &temp_dir] {
            fs::create_dir_all(dir).map_err(|e| ImportError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(ImportContext {
            pictures_dir,
            temp_dir,
            staged: HashMap::new(),
            resolver: None,
            serial: 0,
        })
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ImageResolver>) -> ImportContext {
        self.resolver = Some(resolver);
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Staged resources so far: original locator -> package-relative path.
    pub fn staged(&self) -> &HashMap<String, String> {
        &self.staged
    }

    /// A collision-resistant identifier: time-based with a random suffix,
    /// plus a per-context serial for sub-millisecond bursts.
    pub fn unique_id(&mut self) -> String {
        self.serial += 1;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        format!("{:x}{:x}{:08x}", nanos, self.serial, rand::random::<u32>())
    }

    /// Imports one image and returns the frame markup referencing its
    /// staged copy. The same locator is only ever staged once.
    pub fn import_image(
        &mut self,
        at: &str,
        options: &ImageOptions,
    ) -> Result<String, ImportError> {
        let staged_rel = match self.staged.get(at) {
            Some(existing) => existing.clone(),
            None => {
                let rel = self.stage_image(at)?;
                self.staged.insert(at.to_string(), rel.clone());
                rel
            }
        };
        let file_name = staged_rel
            .rsplit('/')
            .next()
            .unwrap_or(staged_rel.as_str())
            .to_string();
        let mut staged_path = self.pictures_dir.join(file_name);

        let css: HashMap<String, String> = options
            .style_attr
            .as_deref()
            .map(|s| parse_style_attribute(s).into_iter().collect())
            .unwrap_or_default();

        // Custom conversion, when requested.
        let mut staged_rel = staged_rel;
        if let Some(convert) = &options.convert_options {
            let resolved = match convert {
                ConvertOptions::Fixed(args) => Some(args.clone()),
                ConvertOptions::Computed(f) => f(&probe(&staged_path)?),
            };
            if let Some(args) = resolved {
                let mut command: Vec<String> = vec![staged_path.to_string_lossy().into_owned()];
                command.extend(args.split_whitespace().map(str::to_string));
                command.push(staged_path.to_string_lossy().into_owned());
                let (_, stderr) = run_tool("convert", &command)?;
                if !stderr.trim().is_empty() {
                    return Err(ImportError::Convert(stderr));
                }
            }
        }

        // The simple embedding path expects raster content: vector images
        // are rasterized first.
        if staged_path.extension().and_then(|e| e.to_str()) == Some("svg") {
            let png_path = staged_path.with_extension("png");
            let (_, stderr) = run_tool(
                "convert",
                &[
                    staged_path.to_string_lossy().into_owned(),
                    png_path.to_string_lossy().into_owned(),
                ],
            )?;
            if !stderr.trim().is_empty() {
                return Err(ImportError::Convert(stderr));
            }
            fs::remove_file(&staged_path).map_err(|e| ImportError::Io {
                path: staged_path.clone(),
                source: e,
            })?;
            staged_rel = Path::new(&staged_rel)
                .with_extension("png")
                .to_string_lossy()
                .into_owned();
            self.staged.insert(at.to_string(), staged_rel.clone());
            staged_path = png_path;
        }

        let info = probe(&staged_path)?;
        let size_attrs = image_size_attrs(&info, options, &css);

        // A floated image is anchored to its character position and gets
        // the engine's matching float style.
        let (style_info, anchor) = match css.get("float").map(|f| f.to_ascii_lowercase()) {
            Some(float) if float == "left" || float == "right" => {
                let capitalized = if float == "left" { "Left" } else { "Right" };
                (
                    format!(" draw:style-name=\"{IMAGE_STYLE_PREFIX}{capitalized}\""),
                    Anchor::Char,
                )
            }
            _ => (String::new(), options.anchor),
        };

        let frame = format!(
            "<draw:frame{style_info} draw:name=\"{}\" draw:z-index=\"0\" \
             text:anchor-type=\"{}\"{size_attrs}><draw:image xlink:type=\"simple\" \
             xlink:show=\"embed\" xlink:href=\"{staged_rel}\" xlink:actuate=\"onLoad\"/>\
             </draw:frame>",
            self.unique_id(),
            anchor.as_str(),
        );
        Ok(match &options.wrap_in_para {
            WrapInPara::No => frame,
            WrapInPara::Plain => format!("<text:p>{frame}</text:p>"),
            WrapInPara::Styled(style) => {
                format!("<text:p text:style-name=\"{style}\">{frame}</text:p>")
            }
        })
    }

    /// Copies or retrieves the image into the pictures directory and
    /// returns its package-relative path.
    fn stage_image(&mut self, at: &str) -> Result<String, ImportError> {
        if !at.starts_with("http") {
            let source = Path::new(at);
            if !source.is_file() {
                // Missing local files are a template defect: fail fast.
                return Err(ImportError::FileNotFound(source.to_path_buf()));
            }
            let extension = source
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            let file_name = format!("{}.{extension}", self.unique_id());
            let target = self.pictures_dir.join(&file_name);
            fs::copy(source, &target).map_err(|e| ImportError::Io {
                path: target.clone(),
                source: e,
            })?;
            return Ok(format!("Pictures/{file_name}"));
        }

        // Remote image: plain GET, then the fallback resolver, then the
        // built-in placeholder. A whole batch must not fail over one
        // unreachable image.
        let (bytes, extension) = match fetch_remote(at) {
            Some(found) => found,
            None => match self.resolver.as_ref().and_then(|r| r.resolve(at)) {
                Some(found) => found,
                None => {
                    log::warn!("image \"{at}\" could not be retrieved; embedding placeholder");
                    (IMAGE_NOT_FOUND.to_vec(), "png".to_string())
                }
            },
        };
        let file_name = format!("{}.{extension}", self.unique_id());
        let target = self.pictures_dir.join(&file_name);
        fs::write(&target, bytes).map_err(|e| ImportError::Io {
            path: target,
            source: e,
        })?;
        Ok(format!("Pictures/{file_name}"))
    }
}

fn fetch_remote(url: &str) -> Option<(Vec<u8>, String)> {
    let response = match reqwest::blocking::get(url) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("GET {url} failed: {e}");
            return None;
        }
    };
    if !response.status().is_success() {
        log::debug!("GET {url} returned {}", response.status());
        return None;
    }
    let extension = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|mime| {
            let mime = mime.split(';').next().unwrap_or(mime).trim();
            MIME_EXTENSIONS
                .iter()
                .find(|(m, _)| *m == mime)
                .map(|(_, ext)| ext.to_string())
        })?;
    let bytes = response.bytes().ok()?;
    Some((bytes.to_vec(), extension))
}

/// Computes the final embedding size as `svg:width`/`svg:height`
/// attributes in cm. Explicit sizes override the natural size; a
/// percentage multiplies it; with the aspect lock, the tighter of the
/// two implied ratios applies to both dimensions.
fn image_size_attrs(
    info: &ImageInfo,
    options: &ImageOptions,
    css: &HashMap<String, String>,
) -> String {
    let natural_w = info.width_px.map(|px| px as f64 / PX_PER_CM);
    let natural_h = info.height_px.map(|px| px as f64 / PX_PER_CM);

    let css_px = |name: &str| -> Option<f64> {
        css.get(name)
            .map(|v| v.trim_end_matches("px").trim())
            .and_then(|v| v.parse::<f64>().ok())
    };

    let (width, height) = match (options.size, options.size_unit) {
        (Some((w_pc, h_pc)), SizeUnit::Percent) => {
            // A percentage of an unknown natural size is uncomputable.
            let (Some(w), Some(h)) = (natural_w, natural_h) else {
                return String::new();
            };
            let (ratio_w, ratio_h) = if options.keep_ratio {
                (w_pc / 100.0, w_pc / 100.0)
            } else {
                (w_pc / 100.0, h_pc / 100.0)
            };
            (Some(w * ratio_w), Some(h * ratio_h))
        }
        (size, _) => {
            let explicit_w = css_px("width").or(size.map(|(w, _)| w)).map(|w| w / PX_PER_CM);
            let explicit_h = css_px("height").or(size.map(|(_, h)| h)).map(|h| h / PX_PER_CM);
            match (explicit_w, explicit_h) {
                (Some(w), Some(h)) => match (natural_w, natural_h) {
                    (Some(nw), Some(nh)) if options.keep_ratio => {
                        let ratio = (w / nw).min(h / nh);
                        (Some(nw * ratio), Some(nh * ratio))
                    }
                    _ => (Some(w), Some(h)),
                },
                (None, None) => (natural_w, natural_h),
                // One explicit dimension: complete the other from the
                // natural aspect ratio when known.
                (Some(w), None) => match (natural_w, natural_h) {
                    (Some(nw), Some(nh)) => (Some(w), Some(nh * w / nw)),
                    _ => (Some(w), natural_h),
                },
                (None, Some(h)) => match (natural_w, natural_h) {
                    (Some(nw), Some(nh)) => (Some(nw * h / nh), Some(h)),
                    _ => (natural_w, Some(h)),
                },
            }
        }
    };

    match (width, height) {
        (Some(w), Some(h)) => format!(
            " svg:width=\"{}cm\" svg:height=\"{}cm\"",
            format_number(w, 3),
            format_number(h, 3)
        ),
        _ => String::new(),
    }
}

/// Runs an external tool, blocking until it exits with its output fully
/// drained.
pub(crate) fn run_tool(program: &str, args: &[String]) -> Result<(String, String), ImportError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ImportError::Spawn {
            command: program.to_string(),
            source: e,
        })?;
    Ok((
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}
