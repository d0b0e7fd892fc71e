use convertease_core::models::{
    normalize_mime, FormatCategory, DOCX_MIME, MSWORD_MIME, PDF_MIME, POSTSCRIPT_MIME, RTF_MIME,
};
use image::ImageFormat;

/// Bytes of the upload head needed to sniff its content family
pub const SNIFF_LEN: usize = 8192;

const MAX_FILENAME_LEN: usize = 255;

/// Common validation errors for uploaded files
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Content does not match declared type {declared} (looks like {detected})")]
    ContentMismatch { declared: String, detected: String },

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),
}

/// What the first bytes of a file look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedKind {
    Pdf,
    PostScript,
    Rtf,
    /// ZIP container (DOCX and other OOXML packages)
    Zip,
    /// OLE2 compound file (legacy binary .doc)
    Ole,
    Image(ImageFormat),
    Text,
    Unknown,
}

impl SniffedKind {
    pub fn label(&self) -> String {
        match self {
            SniffedKind::Pdf => "pdf".to_string(),
            SniffedKind::PostScript => "postscript".to_string(),
            SniffedKind::Rtf => "rtf".to_string(),
            SniffedKind::Zip => "zip".to_string(),
            SniffedKind::Ole => "ole2".to_string(),
            SniffedKind::Image(format) => format!("{:?}", format).to_lowercase(),
            SniffedKind::Text => "text".to_string(),
            SniffedKind::Unknown => "unknown".to_string(),
        }
    }
}

/// Image formats the converter can decode.
pub fn is_decodable_image(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::WebP
            | ImageFormat::Gif
            | ImageFormat::Bmp
            | ImageFormat::Tiff
            | ImageFormat::Ico
    )
}

/// Classify content by its leading bytes.
pub fn sniff(head: &[u8]) -> SniffedKind {
    const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    let trimmed = strip_bom(head);
    if head.starts_with(b"%PDF-") {
        SniffedKind::Pdf
    } else if head.starts_with(b"%!PS") {
        SniffedKind::PostScript
    } else if trimmed.starts_with(b"{\\rtf") {
        SniffedKind::Rtf
    } else if head.starts_with(b"PK\x03\x04") {
        SniffedKind::Zip
    } else if head.starts_with(&OLE_MAGIC) {
        SniffedKind::Ole
    } else if let Ok(format) = image::guess_format(head) {
        SniffedKind::Image(format)
    } else if looks_like_text(head) {
        SniffedKind::Text
    } else {
        SniffedKind::Unknown
    }
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// Text has no NUL bytes and mostly printable characters.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    let control = head
        .iter()
        .filter(|b| **b < 0x20 && !matches!(**b, b'\n' | b'\r' | b'\t' | 0x0C))
        .count();
    control * 20 <= head.len()
}

/// Checks that the content agrees with the declared MIME type and returns its category.
pub fn check_declared_type(
    declared_type: &str,
    head: &[u8],
) -> Result<FormatCategory, ValidationError> {
    if head.is_empty() {
        return Err(ValidationError::EmptyFile);
    }

    let declared = normalize_mime(declared_type);
    let detected = sniff(head);

    let matches = match declared.as_str() {
        d if d.starts_with("image/") => {
            matches!(detected, SniffedKind::Image(f) if is_decodable_image(f))
        }
        PDF_MIME => detected == SniffedKind::Pdf,
        POSTSCRIPT_MIME => detected == SniffedKind::PostScript,
        DOCX_MIME => detected == SniffedKind::Zip,
        MSWORD_MIME => matches!(detected, SniffedKind::Ole | SniffedKind::Rtf),
        RTF_MIME | "text/rtf" => detected == SniffedKind::Rtf,
        d if d.starts_with("text/") => matches!(detected, SniffedKind::Text | SniffedKind::Rtf),
        _ => return Err(ValidationError::UnsupportedContent(declared)),
    };

    if !matches {
        return Err(ValidationError::ContentMismatch {
            declared,
            detected: detected.label(),
        });
    }

    Ok(if declared.starts_with("image/") {
        FormatCategory::Image
    } else {
        FormatCategory::Document
    })
}

/// Strip directories and control characters from a client-supplied filename.
pub fn sanitize_filename(name: &str) -> Result<String, ValidationError> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string();

    if cleaned.is_empty() {
        return Err(ValidationError::InvalidFilename(name.to_string()));
    }

    Ok(cleaned.chars().take(MAX_FILENAME_LEN).collect())
}
