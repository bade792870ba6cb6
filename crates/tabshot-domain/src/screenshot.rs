//! Screenshot module - one image handed to the vision backend

use std::path::Path;

/// Image extensions (lowercase) the pipeline treats as screenshots
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An image loaded from a task directory.
///
/// The crawler names screenshots `{timestamp}_{id}.{ext}`; the filename is
/// the key into both the metadata index and the progress ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// File name within the task directory
    pub filename: String,

    /// MIME type used for transport
    pub media_type: &'static str,

    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl Screenshot {
    /// Wrap image bytes, deriving the media type from the filename
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let media_type = media_type_for(&filename);
        Self {
            filename,
            media_type,
            bytes,
        }
    }

    /// Whether a file name carries a screenshot extension (case-insensitive)
    pub fn is_image_name(name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

fn media_type_for(filename: &str) -> &'static str {
    let is_png = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);
    if is_png {
        "image/png"
    } else {
        "image/jpeg"
    }
}
