//! Format registry
//!
//! Immutable table of conversion targets and the source MIME prefixes each
//! one accepts. Built once at startup and shared as `Arc<FormatRegistry>`.
//!
//! Compatibility is narrowed per category pairing: image targets only accept
//! `image/` sources and document targets never do.

use crate::models::{
    normalize_mime, Format, FormatCategory, DOCX_MIME, MSWORD_MIME, PDF_MIME, POSTSCRIPT_MIME,
    RTF_MIME,
};

#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: Vec<Format>,
}

impl FormatRegistry {
    /// Builds a registry, rejecting duplicate codes.
    pub fn new(formats: Vec<Format>) -> Result<Self, anyhow::Error> {
        for (i, format) in formats.iter().enumerate() {
            if formats[..i]
                .iter()
                .any(|f| f.code.eq_ignore_ascii_case(&format.code))
            {
                return Err(anyhow::anyhow!("Duplicate format code: {}", format.code));
            }
        }
        Ok(Self { formats })
    }

    /// The formats the service can actually produce.
    pub fn builtin() -> Self {
        let word_sources: &[&str] = &[MSWORD_MIME, RTF_MIME, "text/", PDF_MIME, DOCX_MIME];
        let docx_sources: &[&str] = &[DOCX_MIME, "text/", PDF_MIME, MSWORD_MIME, RTF_MIME];
        let pdf_sources: &[&str] = &[PDF_MIME, "text/", MSWORD_MIME, RTF_MIME, DOCX_MIME];
        let text_sources: &[&str] = &["text/", PDF_MIME, MSWORD_MIME, RTF_MIME, DOCX_MIME];
        let images: &[&str] = &["image/"];

        use FormatCategory::{Document, Image};
        let formats = vec![
            Format::new("DOC", "Word Document (.doc)", Document, "doc", MSWORD_MIME, word_sources),
            Format::new("DOCX", "Word Document (.docx)", Document, "docx", DOCX_MIME, docx_sources),
            Format::new("PDF", "PDF Document (.pdf)", Document, "pdf", PDF_MIME, pdf_sources),
            Format::new(
                "PS",
                "PostScript (.ps)",
                Document,
                "ps",
                POSTSCRIPT_MIME,
                &[POSTSCRIPT_MIME, PDF_MIME],
            ),
            Format::new("TEXT", "Plain Text (.txt)", Document, "txt", "text/plain", text_sources),
            Format::new("TXT", "Text File (.txt)", Document, "txt", "text/plain", text_sources),
            Format::new("WORD", "Word Document (.doc)", Document, "doc", MSWORD_MIME, word_sources),
            Format::new("JPG", "JPEG Image (.jpg)", Image, "jpg", "image/jpeg", images),
            Format::new("PNG", "PNG Image (.png)", Image, "png", "image/png", images),
            Format::new("WEBP", "WebP Image (.webp)", Image, "webp", "image/webp", images),
            Format::new("BMP", "Bitmap Image (.bmp)", Image, "bmp", "image/bmp", images),
            Format::new("GIF", "GIF Image (.gif)", Image, "gif", "image/gif", images),
            Format::new("TIFF", "TIFF Image (.tiff)", Image, "tiff", "image/tiff", images),
            Format::new("ICO", "Icon (.ico)", Image, "ico", "image/x-icon", images),
            Format::new("EPS", "EPS Image (.eps)", Image, "eps", POSTSCRIPT_MIME, images),
        ];

        Self { formats }
    }

    pub fn list_formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn get(&self, code: &str) -> Option<&Format> {
        let code = code.trim();
        self.formats
            .iter()
            .find(|f| f.code.eq_ignore_ascii_case(code))
    }

    /// Every format with a rule matching a prefix of `source_type`, in table order.
    pub fn compatible_formats(&self, source_type: &str) -> Vec<&Format> {
        let source = normalize_mime(source_type);
        if source.is_empty() {
            return Vec::new();
        }
        self.formats
            .iter()
            .filter(|f| f.accepts_source(&source))
            .collect()
    }

    pub fn is_compatible(&self, source_type: &str, target_code: &str) -> bool {
        let source = normalize_mime(source_type);
        !source.is_empty()
            && self
                .get(target_code)
                .map(|f| f.accepts_source(&source))
                .unwrap_or(false)
    }

    /// Whether any format can be produced from `source_type`.
    pub fn accepts_source(&self, source_type: &str) -> bool {
        !self.compatible_formats(source_type).is_empty()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let registry = FormatRegistry::builtin();
        assert!(FormatRegistry::new(registry.list_formats().to_vec()).is_ok());
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let png = FormatRegistry::builtin().get("PNG").unwrap().clone();
        let mut dup = png.clone();
        dup.code = "png".to_string();
        assert!(FormatRegistry::new(vec![png, dup]).is_err());
    }

    #[test]
    fn test_list_formats_is_ordered() {
        let registry = FormatRegistry::builtin();
        let codes: Vec<&str> = registry
            .list_formats()
            .iter()
            .map(|f| f.code.as_str())
            .collect();
        assert_eq!(codes.first(), Some(&"DOC"));
        assert_eq!(codes.last(), Some(&"EPS"));
        assert_eq!(codes.len(), 15);
    }

    #[test]
    fn test_text_sources_get_document_targets_only() {
        let registry = FormatRegistry::builtin();
        let codes: Vec<&str> = registry
            .compatible_formats("text/plain")
            .iter()
            .map(|f| f.code.as_str())
            .collect();
        assert_eq!(codes, vec!["DOC", "DOCX", "PDF", "TEXT", "TXT", "WORD"]);
        assert!(!registry.is_compatible("text/plain", "PNG"));
    }

    #[test]
    fn test_image_sources_get_image_targets_only() {
        let registry = FormatRegistry::builtin();
        let formats = registry.compatible_formats("IMAGE/PNG");
        assert_eq!(formats.len(), 8);
        assert!(formats.iter().all(|f| f.category == FormatCategory::Image));
        assert!(!registry.is_compatible("image/png", "PDF"));
        assert!(registry.is_compatible("image/png", "EPS"));
        assert!(!registry.is_compatible(POSTSCRIPT_MIME, "EPS"));
    }

    #[test]
    fn test_is_compatible_is_case_insensitive() {
        let registry = FormatRegistry::builtin();
        assert!(registry.is_compatible("application/pdf", "ps"));
        assert!(registry.is_compatible("Application/PDF; name=x.pdf", "TXT"));
        assert!(!registry.is_compatible("text/plain", "PS"));
        assert!(!registry.is_compatible("text/plain", "NOPE"));
    }

    #[test]
    fn test_unknown_source_has_no_targets() {
        let registry = FormatRegistry::builtin();
        assert!(!registry.accepts_source("video/mp4"));
        assert!(!registry.accepts_source(""));
        assert!(registry.accepts_source(DOCX_MIME));
    }
}
