//! Readers turning source bytes into a [`TextDocument`]

use super::model::TextDocument;
use convertease_core::ConversionError;
use lopdf::content::Content;
use lopdf::Object;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

/// Largest `word/document.xml` we inflate
const MAX_DOCX_XML_BYTES: u64 = 256 * 1024 * 1024;

/// UTF-8 text; invalid sequences are replaced rather than rejected.
pub fn read_plain_text(data: &[u8]) -> TextDocument {
    TextDocument::from_text(&String::from_utf8_lossy(data))
}

/// Text of every page, walked with lopdf so malformed files surface as errors.
///
/// A text operator that selects a font missing from the page resources makes
/// the file corrupt rather than silently dropping its text.
pub fn read_pdf(data: &[u8]) -> Result<TextDocument, ConversionError> {
    let corrupt = |e: &dyn std::fmt::Display| ConversionError::CorruptInput(format!("PDF: {}", e));

    let document = lopdf::Document::load_mem(data).map_err(|e| corrupt(&e))?;
    if document.is_encrypted() {
        return Err(ConversionError::CorruptInput(
            "PDF: encrypted documents are not supported".to_string(),
        ));
    }

    let mut text = String::new();
    for (page_number, page_id) in document.get_pages() {
        let fonts = document.get_page_fonts(page_id).map_err(|e| corrupt(&e))?;
        // Fonts whose encoding lopdf cannot read map to None; their text is skipped
        let encodings: BTreeMap<Vec<u8>, Option<lopdf::Encoding>> = fonts
            .into_iter()
            .map(|(name, font)| (name, font.get_font_encoding(&document).ok()))
            .collect();

        let content_data = document.get_page_content(page_id).map_err(|e| corrupt(&e))?;
        let content = Content::decode(&content_data).map_err(|e| corrupt(&e))?;

        let mut current = None;
        for operation in &content.operations {
            match operation.operator.as_str() {
                "Tf" => {
                    let name = operation
                        .operands
                        .first()
                        .and_then(|operand| operand.as_name().ok())
                        .ok_or_else(|| corrupt(&format!("page {} has a malformed Tf", page_number)))?;
                    let encoding = encodings.get(name).ok_or_else(|| {
                        corrupt(&format!(
                            "page {} uses font /{} missing from its resources",
                            page_number,
                            String::from_utf8_lossy(name)
                        ))
                    })?;
                    current = Some(encoding.as_ref());
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    let encoding = current.ok_or_else(|| {
                        corrupt(&format!("page {} shows text before selecting a font", page_number))
                    })?;
                    if matches!(operation.operator.as_str(), "'" | "\"") {
                        text.push('\n');
                    }
                    if let Some(encoding) = encoding {
                        if let Err(e) = collect_pdf_text(&mut text, encoding, &operation.operands) {
                            tracing::debug!(page = page_number, error = %e, "Skipping undecodable PDF text");
                        }
                    }
                }
                "T*" => text.push('\n'),
                "Td" | "TD" | "ET" if !text.is_empty() && !text.ends_with('\n') => text.push('\n'),
                _ => {}
            }
        }
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
    }

    Ok(TextDocument::from_text(&text))
}

fn collect_pdf_text(
    text: &mut String,
    encoding: &lopdf::Encoding,
    operands: &[Object],
) -> Result<(), lopdf::Error> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&lopdf::Document::decode_text(encoding, bytes)?),
            Object::Array(items) => collect_pdf_text(text, encoding, items)?,
            // Large negative kerning in a TJ array is a word gap
            Object::Integer(gap) if *gap < -100 => text.push(' '),
            Object::Real(gap) if *gap < -100.0 => text.push(' '),
            _ => {}
        }
    }
    Ok(())
}

pub fn read_docx(data: &[u8]) -> Result<TextDocument, ConversionError> {
    let corrupt = |e: &dyn std::fmt::Display| ConversionError::CorruptInput(format!("DOCX: {}", e));

    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(|e| corrupt(&e))?;
    let entry = archive.by_name("word/document.xml").map_err(|e| corrupt(&e))?;
    if entry.size() > MAX_DOCX_XML_BYTES {
        return Err(ConversionError::ResourceExhausted(format!(
            "DOCX body of {} bytes",
            entry.size()
        )));
    }

    let mut xml = String::new();
    entry
        .take(MAX_DOCX_XML_BYTES)
        .read_to_string(&mut xml)
        .map_err(|e| corrupt(&e))?;

    parse_wordprocessing_xml(&xml)
}

/// Text runs, tabs and breaks, and paragraph ends in WordprocessingML
static DOCX_RUN_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)\s*/>|</w:p>")
});

/// Paragraph text from a WordprocessingML body.
fn parse_wordprocessing_xml(xml: &str) -> Result<TextDocument, ConversionError> {
    let pattern = DOCX_RUN_PATTERN
        .as_ref()
        .map_err(|e| ConversionError::EncodeFailed(format!("docx pattern: {}", e)))?;
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for caps in pattern.captures_iter(xml) {
        if let Some(text) = caps.get(1) {
            current.push_str(&xml_unescape(text.as_str()));
        } else if let Some(tag) = caps.get(2) {
            current.push(if tag.as_str() == "tab" { '\t' } else { ' ' });
        } else {
            paragraphs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(TextDocument { paragraphs })
}

pub fn xml_unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..end];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Destinations whose text is not part of the document body
const RTF_SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "headerl",
    "headerr", "footerl", "footerr", "object", "themedata", "datastore", "latentstyles",
    "listtable", "listoverridetable", "rsidtbl", "generator", "xmlnstbl", "fldinst",
];

/// Text content of an RTF document.
///
/// Handles paragraphs, tabs, `\'hh` and `\uN` escapes; formatting is dropped.
pub fn read_rtf(data: &[u8]) -> Result<TextDocument, ConversionError> {
    let start = data
        .windows(5)
        .position(|w| w == b"{\\rtf")
        .ok_or_else(|| ConversionError::CorruptInput("missing RTF header".to_string()))?;

    let mut parser = RtfParser::new(&data[start..]);
    parser.run();
    Ok(TextDocument::from_text(&parser.out))
}

struct RtfParser<'a> {
    data: &'a [u8],
    pos: usize,
    out: String,
    /// Per-group (skip, unicode fallback count)
    stack: Vec<(bool, usize)>,
    skip: bool,
    uc: usize,
    pending_fallback: usize,
    /// Leading half of a `\uN` surrogate pair
    high_surrogate: Option<u32>,
}

impl<'a> RtfParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            out: String::new(),
            stack: Vec::new(),
            skip: false,
            uc: 1,
            pending_fallback: 0,
            high_surrogate: None,
        }
    }

    fn emit(&mut self, c: char) {
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        if !self.skip {
            self.out.push(c);
        }
    }

    fn run(&mut self) {
        while self.pos < self.data.len() {
            let byte = self.data[self.pos];
            self.pos += 1;
            match byte {
                b'{' => {
                    self.stack.push((self.skip, self.uc));
                    if self.data[self.pos..].starts_with(b"\\*") {
                        self.skip = true;
                    }
                }
                b'}' => {
                    if let Some((skip, uc)) = self.stack.pop() {
                        self.skip = skip;
                        self.uc = uc;
                    }
                    if self.stack.is_empty() {
                        return;
                    }
                }
                b'\\' => self.control(),
                b'\r' | b'\n' => {}
                other => self.emit(cp1252_char(other)),
            }
        }
    }

    fn control(&mut self) {
        let Some(&next) = self.data.get(self.pos) else {
            return;
        };

        if !next.is_ascii_alphabetic() {
            self.pos += 1;
            match next {
                b'\'' => {
                    let hex = self.data.get(self.pos..self.pos + 2).unwrap_or_default();
                    self.pos += hex.len();
                    if let Some(value) = std::str::from_utf8(hex)
                        .ok()
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                    {
                        self.emit(cp1252_char(value));
                    }
                }
                b'\\' | b'{' | b'}' => self.emit(next as char),
                b'~' => self.emit('\u{00A0}'),
                b'_' => self.emit('-'),
                b'\r' | b'\n' => self.emit('\n'),
                _ => {}
            }
            return;
        }

        let word_start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }
        let word = String::from_utf8_lossy(&self.data[word_start..self.pos]).into_owned();

        let param_start = self.pos;
        if self.data.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let param: Option<i32> = std::str::from_utf8(&self.data[param_start..self.pos])
            .ok()
            .and_then(|p| p.parse().ok());
        if self.data.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }

        match word.as_str() {
            "par" | "line" | "sect" | "page" => self.emit('\n'),
            "tab" => self.emit('\t'),
            "emdash" => self.emit('\u{2014}'),
            "endash" => self.emit('\u{2013}'),
            "bullet" => self.emit('\u{2022}'),
            "lquote" => self.emit('\u{2018}'),
            "rquote" => self.emit('\u{2019}'),
            "ldblquote" => self.emit('\u{201C}'),
            "rdblquote" => self.emit('\u{201D}'),
            "uc" => self.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(code) = param {
                    // Negative values encode UTF-16 units above 0x7FFF
                    let unit = (if code < 0 { code + 65536 } else { code }) as u32;
                    match unit {
                        0xD800..=0xDBFF => self.high_surrogate = Some(unit),
                        0xDC00..=0xDFFF => {
                            if let Some(high) = self.high_surrogate.take() {
                                let combined = 0x10000 + ((high - 0xD800) << 10) + (unit - 0xDC00);
                                if let Some(c) = char::from_u32(combined) {
                                    self.emit(c);
                                }
                            }
                        }
                        _ => {
                            self.high_surrogate = None;
                            if let Some(c) = char::from_u32(unit) {
                                self.emit(c);
                            }
                        }
                    }
                    self.pending_fallback = self.uc;
                }
            }
            w if RTF_SKIPPED_DESTINATIONS.contains(&w) => self.skip = true,
            _ => {}
        }
    }
}

fn cp1252_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x85 => '\u{2026}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        other => other as char,
    }
}
