use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MSWORD_MIME: &str = "application/msword";
pub const RTF_MIME: &str = "application/rtf";
pub const PDF_MIME: &str = "application/pdf";
pub const POSTSCRIPT_MIME: &str = "application/postscript";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FormatCategory {
    Image,
    Document,
}

impl Display for FormatCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FormatCategory::Image => write!(f, "Image"),
            FormatCategory::Document => write!(f, "Document"),
        }
    }
}

impl FromStr for FormatCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(FormatCategory::Image),
            "document" => Ok(FormatCategory::Document),
            _ => Err(anyhow::anyhow!("Invalid format category: {}", s)),
        }
    }
}

/// A conversion target.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Format {
    /// Unique upper-case code, e.g. `PNG`
    pub code: String,
    pub label: String,
    pub category: FormatCategory,
    /// File extension of produced artifacts, without the dot
    pub extension: String,
    /// MIME type of produced artifacts
    pub mime_type: String,
    /// Source MIME prefixes this format can be produced from
    pub source_prefixes: Vec<String>,
}

impl Format {
    pub fn new(
        code: &str,
        label: &str,
        category: FormatCategory,
        extension: &str,
        mime_type: &str,
        source_prefixes: &[&str],
    ) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
            category,
            extension: extension.to_string(),
            mime_type: mime_type.to_string(),
            source_prefixes: source_prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Case-insensitive prefix match of `source_type` against any rule.
    pub fn accepts_source(&self, source_type: &str) -> bool {
        let source = source_type.trim().to_ascii_lowercase();
        self.source_prefixes
            .iter()
            .any(|prefix| source.starts_with(&prefix.to_ascii_lowercase()))
    }

    /// Picker search: case-insensitive substring of the label or the category.
    /// A blank query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.label.to_lowercase().contains(&query)
            || self.category.to_string().to_lowercase().contains(&query)
    }
}

/// Lower-cases a MIME type and drops parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_source_is_case_insensitive_prefix() {
        let format = Format::new(
            "PDF",
            "PDF Document (.pdf)",
            FormatCategory::Document,
            "pdf",
            PDF_MIME,
            &["text/", PDF_MIME],
        );
        assert!(format.accepts_source("text/plain"));
        assert!(format.accepts_source("TEXT/Markdown"));
        assert!(format.accepts_source("application/pdf"));
        assert!(!format.accepts_source("image/png"));
    }

    #[test]
    fn test_normalize_mime_strips_parameters() {
        assert_eq!(normalize_mime("Text/Plain; charset=UTF-8"), "text/plain");
        assert_eq!(normalize_mime("  image/PNG "), "image/png");
        assert_eq!(normalize_mime(""), "");
    }

    #[test]
    fn test_matches_query_on_label_or_category() {
        let format = Format::new(
            "WEBP",
            "WebP Image (.webp)",
            FormatCategory::Image,
            "webp",
            "image/webp",
            &["image/"],
        );
        assert!(format.matches_query("webp"));
        assert!(format.matches_query("IMAG"));
        assert!(format.matches_query("  "));
        assert!(!format.matches_query("document"));
        assert!(!format.matches_query("png"));
    }

    #[test]
    fn test_category_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(FormatCategory::Document).unwrap(),
            "document"
        );
    }
}
