//! Intrinsic image dimensions from format-specific header bytes.
//!
//! Dimensions are read directly from the first bytes of the file (JPEG
//! frame segments, the PNG IHDR chunk, the GIF logical screen
//! descriptor) without decoding any pixel data.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::ImportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    /// Anything else, identified by its file extension.
    Other(String),
}

impl ImageFormat {
    pub fn extension(&self) -> &str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Svg => "svg",
            ImageFormat::Other(ext) => ext,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width_px: Option<u32>,
    pub height_px: Option<u32>,
}

fn io_err(path: &Path, source: std::io::Error) -> ImportError {
    ImportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Identifies an image's format from its magic bytes (falling back to the
/// file extension) and reads its pixel dimensions from the header.
/// Dimensions come back `None` when the header does not carry them: a
/// truncated file, or a format with no fixed pixel size (SVG).
pub fn probe(path: &Path) -> Result<ImageInfo, ImportError> {
    let file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    let got = reader.read(&mut magic).map_err(|e| io_err(path, e))?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let format = if got >= 3 && magic[..3] == [0xff, 0xd8, 0xff] {
        ImageFormat::Jpeg
    } else if got >= 8 && magic == [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'] {
        ImageFormat::Png
    } else if got >= 4 && &magic[..4] == b"GIF8" {
        ImageFormat::Gif
    } else if extension == "svg" {
        ImageFormat::Svg
    } else {
        ImageFormat::Other(extension)
    };

    reader.rewind().map_err(|e| io_err(path, e))?;
    let (width_px, height_px) = match format {
        ImageFormat::Jpeg => jpeg_size(&mut reader).map_err(|e| io_err(path, e))?,
        ImageFormat::Png => png_size(&mut reader).map_err(|e| io_err(path, e))?,
        ImageFormat::Gif => gif_size(&mut reader).map_err(|e| io_err(path, e))?,
        _ => (None, None),
    };

    Ok(ImageInfo {
        format,
        width_px,
        height_px,
    })
}

/// Walks JPEG segments until a start-of-frame (C0..C3) carrying the
/// dimensions.
fn jpeg_size<R: Read>(reader: &mut R) -> std::io::Result<(Option<u32>, Option<u32>)> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header)?;
    loop {
        let mut segment = [0u8; 4];
        if reader.read_exact(&mut segment).is_err() {
            return Ok((None, None));
        }
        let (marker, code) = (segment[0], segment[1]);
        let length = u16::from_be_bytes([segment[2], segment[3]]);
        if marker != 0xff {
            return Ok((None, None));
        }
        if (0xc0..=0xc3).contains(&code) {
            let mut frame = [0u8; 5];
            reader.read_exact(&mut frame)?;
            let height = u16::from_be_bytes([frame[1], frame[2]]);
            let width = u16::from_be_bytes([frame[3], frame[4]]);
            return Ok((Some(width as u32), Some(height as u32)));
        }
        // Skip over the segment payload.
        let mut remaining = length.saturating_sub(2) as u64;
        let mut sink = [0u8; 256];
        while remaining > 0 {
            let take = remaining.min(sink.len() as u64) as usize;
            reader.read_exact(&mut sink[..take])?;
            remaining -= take as u64;
        }
    }
}

/// Reads the PNG IHDR chunk, the first chunk after the signature.
fn png_size<R: Read + Seek>(reader: &mut R) -> std::io::Result<(Option<u32>, Option<u32>)> {
    reader.seek(SeekFrom::Start(12))?;
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;
    if &tag != b"IHDR" {
        return Ok((None, None));
    }
    let mut dims = [0u8; 8];
    reader.read_exact(&mut dims)?;
    let width = u32::from_be_bytes([dims[0], dims[1], dims[2], dims[3]]);
    let height = u32::from_be_bytes([dims[4], dims[5], dims[6], dims[7]]);
    Ok((Some(width), Some(height)))
}

/// Reads the GIF logical screen descriptor following the 6-byte header.
fn gif_size<R: Read + Seek>(reader: &mut R) -> std::io::Result<(Option<u32>, Option<u32>)> {
    reader.seek(SeekFrom::Start(6))?;
    let mut dims = [0u8; 4];
    if reader.read_exact(&mut dims).is_err() {
        // Truncated screen descriptor: a corrupted GIF.
        return Ok((None, None));
    }
    let width = u16::from_le_bytes([dims[0], dims[1]]);
    let height = u16::from_le_bytes([dims[2], dims[3]]);
    Ok((Some(width as u32), Some(height as u32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_probe_png() {
        let dir = tempdir().unwrap();
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&640u32.to_be_bytes());
        bytes.extend_from_slice(&480u32.to_be_bytes());
        bytes.extend_from_slice(&[8, 2, 0, 0, 0]);
        let path = write_file(dir.path(), "a.png", &bytes);

        let info = probe(&path).unwrap();
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!(info.width_px, Some(640));
        assert_eq!(info.height_px, Some(480));
    }

    #[test]
    fn test_probe_gif() {
        let dir = tempdir().unwrap();
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&320u16.to_le_bytes());
        bytes.extend_from_slice(&200u16.to_le_bytes());
        bytes.push(0);
        let path = write_file(dir.path(), "a.gif", &bytes);

        let info = probe(&path).unwrap();
        assert_eq!(info.format, ImageFormat::Gif);
        assert_eq!(info.width_px, Some(320));
        assert_eq!(info.height_px, Some(200));
    }

    #[test]
    fn test_probe_jpeg_walks_to_frame_segment() {
        let dir = tempdir().unwrap();
        let mut bytes = vec![0xff, 0xd8];
        // An APP0 segment to skip (length 6 = 2 length bytes + 4 payload).
        bytes.extend_from_slice(&[0xff, 0xe0, 0x00, 0x06, 1, 2, 3, 4]);
        // SOF0 with height 600, width 800.
        bytes.extend_from_slice(&[0xff, 0xc0, 0x00, 0x0b]);
        bytes.push(8);
        bytes.extend_from_slice(&600u16.to_be_bytes());
        bytes.extend_from_slice(&800u16.to_be_bytes());
        let path = write_file(dir.path(), "a.jpg", &bytes);

        let info = probe(&path).unwrap();
        assert_eq!(info.format, ImageFormat::Jpeg);
        assert_eq!(info.width_px, Some(800));
        assert_eq!(info.height_px, Some(600));
    }

    #[test]
    fn test_probe_truncated_jpeg_yields_no_dimensions() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "trunc.jpg", &[0xff, 0xd8, 0xff]);
        let info = probe(&path).unwrap();
        assert_eq!(info.format, ImageFormat::Jpeg);
        assert_eq!(info.width_px, None);
    }

    #[test]
    fn test_probe_unknown_falls_back_to_extension() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "a.bmp", b"BMxxxxxxxx");
        let info = probe(&path).unwrap();
        assert_eq!(info.format, ImageFormat::Other("bmp".to_string()));
    }

    #[test]
    fn test_probe_missing_file() {
        let dir = tempdir().unwrap();
        assert!(probe(&dir.path().join("absent.png")).is_err());
    }
}
