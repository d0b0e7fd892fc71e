//! Document converter - picks a reader for the source and a writer for the target

use super::model::TextDocument;
use super::{readers, writers};
use crate::traits::{ConversionRequest, ConvertedOutput, Converter};
use crate::validator::{sniff, SniffedKind};
use convertease_core::models::{
    normalize_mime, FormatCategory, DOCX_MIME, MSWORD_MIME, PDF_MIME, POSTSCRIPT_MIME, RTF_MIME,
};
use convertease_core::ConversionError;

/// Document families the backend reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFamily {
    Text,
    Pdf,
    Docx,
    /// `.doc`, written as RTF
    Word,
    PostScript,
}

impl DocumentFamily {
    pub fn from_source_type(source_type: &str) -> Option<Self> {
        match normalize_mime(source_type).as_str() {
            PDF_MIME => Some(DocumentFamily::Pdf),
            DOCX_MIME => Some(DocumentFamily::Docx),
            MSWORD_MIME | RTF_MIME | "text/rtf" => Some(DocumentFamily::Word),
            POSTSCRIPT_MIME => Some(DocumentFamily::PostScript),
            t if t.starts_with("text/") => Some(DocumentFamily::Text),
            _ => None,
        }
    }

    pub fn from_target_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "TXT" | "TEXT" => Some(DocumentFamily::Text),
            "PDF" => Some(DocumentFamily::Pdf),
            "DOCX" => Some(DocumentFamily::Docx),
            "DOC" | "WORD" => Some(DocumentFamily::Word),
            "PS" => Some(DocumentFamily::PostScript),
            _ => None,
        }
    }
}

/// Converter backend for every document target. Not cancellable while running.
#[derive(Debug, Default)]
pub struct DocumentConverter;

impl DocumentConverter {
    pub fn new() -> Self {
        Self
    }

    fn read(
        &self,
        family: DocumentFamily,
        request: &ConversionRequest<'_>,
    ) -> Result<TextDocument, ConversionError> {
        let unsupported = || ConversionError::UnsupportedConversion {
            from: request.source_type.to_string(),
            to: request.target.code.clone(),
        };

        match family {
            DocumentFamily::Text => Ok(readers::read_plain_text(request.input)),
            DocumentFamily::Pdf => readers::read_pdf(request.input),
            DocumentFamily::Docx => readers::read_docx(request.input),
            // Only the RTF flavour of .doc can be read; binary Word files cannot
            DocumentFamily::Word => match sniff(request.input) {
                SniffedKind::Rtf => readers::read_rtf(request.input),
                _ => Err(unsupported()),
            },
            DocumentFamily::PostScript => Err(unsupported()),
        }
    }
}

impl Converter for DocumentConverter {
    fn name(&self) -> &'static str {
        "document"
    }

    fn convert(&self, request: &ConversionRequest<'_>) -> Result<ConvertedOutput, ConversionError> {
        let target = request.target;
        let unsupported = || ConversionError::UnsupportedConversion {
            from: request.source_type.to_string(),
            to: target.code.clone(),
        };

        if target.category != FormatCategory::Document {
            return Err(unsupported());
        }
        let target_family = DocumentFamily::from_target_code(&target.code).ok_or_else(unsupported)?;
        let source_family =
            DocumentFamily::from_source_type(request.source_type).ok_or_else(unsupported)?;

        if source_family == target_family {
            tracing::debug!(target_format = %target.code, "Same document family, passing bytes through");
            return Ok(ConvertedOutput::for_target(request.input.to_vec(), target));
        }

        let document = self.read(source_family, request)?;
        tracing::debug!(
            paragraphs = document.paragraphs.len(),
            target_format = %target.code,
            "Document read"
        );

        let data = match target_family {
            DocumentFamily::Text => writers::write_text(&document),
            DocumentFamily::Pdf => writers::write_pdf(&document)?,
            DocumentFamily::Docx => writers::write_docx(&document)?,
            DocumentFamily::Word => writers::write_rtf(&document),
            DocumentFamily::PostScript => writers::write_postscript(&document),
        };

        Ok(ConvertedOutput::for_target(data, target))
    }

    fn supports_cancellation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convertease_core::FormatRegistry;
    use tokio_util::sync::CancellationToken;

    fn convert(input: &[u8], source_type: &str, target: &str) -> Result<ConvertedOutput, ConversionError> {
        let registry = FormatRegistry::builtin();
        let target = registry.get(target).unwrap();
        let cancel = CancellationToken::new();
        DocumentConverter::new().convert(&ConversionRequest {
            input,
            source_type,
            target,
            settings: None,
            cancel: &cancel,
        })
    }

    #[test]
    fn test_families() {
        assert_eq!(
            DocumentFamily::from_source_type("text/markdown"),
            Some(DocumentFamily::Text)
        );
        assert_eq!(
            DocumentFamily::from_source_type("application/rtf"),
            Some(DocumentFamily::Word)
        );
        assert_eq!(DocumentFamily::from_source_type("image/png"), None);
        assert_eq!(DocumentFamily::from_target_code("word"), Some(DocumentFamily::Word));
        assert_eq!(DocumentFamily::from_target_code("JPG"), None);
    }

    #[test]
    fn test_text_to_pdf() {
        let output = convert(b"Hello converter\nSecond line\n", "text/plain", "PDF").unwrap();
        assert_eq!(output.content_type, "application/pdf");
        assert_eq!(output.extension, "pdf");
        assert!(output.data.starts_with(b"%PDF-"));

        let text = readers::read_pdf(&output.data).unwrap().to_text();
        assert!(text.contains("Hello converter"), "{}", text);
    }

    #[test]
    fn test_same_family_passes_through() {
        let input = b"%PDF-1.4 untouched bytes";
        let output = convert(input, "application/pdf", "PDF").unwrap();
        assert_eq!(&output.data[..], &input[..]);

        let output = convert(b"plain", "text/plain", "TXT").unwrap();
        assert_eq!(&output.data[..], b"plain");
    }

    #[test]
    fn test_text_to_docx_and_word() {
        let docx = convert(b"one\ntwo\n", "text/plain", "DOCX").unwrap();
        assert_eq!(
            readers::read_docx(&docx.data).unwrap().paragraphs,
            vec!["one", "two"]
        );

        let doc = convert(b"one\ntwo\n", "text/plain", "WORD").unwrap();
        assert_eq!(doc.extension, "doc");
        assert!(doc.data.starts_with(b"{\\rtf1"));
    }

    #[test]
    fn test_rtf_msword_to_text() {
        let output = convert(b"{\\rtf1\\ansi Hi there\\par}", "application/msword", "TXT").unwrap();
        assert_eq!(&output.data[..], b"Hi there\n");
    }

    #[test]
    fn test_binary_word_is_unsupported() {
        let ole = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0, 0, 0];
        let err = convert(&ole, "application/msword", "PDF").unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedConversion { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_pdf_to_postscript() {
        let pdf = convert(b"Page text\n", "text/plain", "PDF").unwrap();
        let ps = convert(&pdf.data, "application/pdf", "PS").unwrap();
        assert!(ps.data.starts_with(b"%!PS-Adobe-3.0"));
        assert!(String::from_utf8_lossy(&ps.data).contains("Page text"));
    }

    #[test]
    fn test_image_target_rejected() {
        let err = convert(b"text", "text/plain", "PNG").unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_corrupt_pdf() {
        let err = convert(b"%PDF-1.7 nothing else", "application/pdf", "TXT").unwrap_err();
        assert!(matches!(err, ConversionError::CorruptInput(_)));
    }
}
