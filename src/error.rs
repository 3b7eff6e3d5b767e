use thiserror::Error;

/// Umbrella error for the whole pipeline.
#[derive(Error, Debug)]
pub enum ScrivenError {
    #[error(transparent)]
    Style(#[from] scriven_style::StyleError),

    #[error(transparent)]
    Convert(#[from] scriven_convert::ConvertError),

    #[error(transparent)]
    Import(#[from] scriven_import::ImportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
