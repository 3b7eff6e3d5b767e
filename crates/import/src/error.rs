use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("\"{0}\" does not exist or is not a file")]
    FileNotFound(PathBuf),

    #[error("I/O error while staging \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "the PDF could not be split into images; ensure Ghostscript (gs) \
         is installed and on the PATH"
    )]
    PdfToImages,

    #[error(
        "the \"convert\" tool failed: {0}. ImageMagick must be installed \
         and on the PATH (with SVG support enabled for vector conversion)"
    )]
    Convert(String),

    #[error("document conversion to PDF failed: {0}")]
    ToPdf(String),

    #[error("invalid image anchor \"{0}\"; valid anchors are: page, paragraph, char, as-char")]
    WrongAnchor(String),

    #[error("template rendering failed: {0}")]
    Render(String),
}
