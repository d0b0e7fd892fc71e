//! Plain-text document model shared by every reader and writer

/// Characters per line on an A4 page at 11pt Helvetica
pub const LINE_WIDTH_CHARS: usize = 85;
/// Lines per A4 page at 14pt leading with 56pt margins
pub const LINES_PER_PAGE: usize = 52;
const TAB_WIDTH: usize = 4;

/// A document reduced to its paragraphs of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDocument {
    pub paragraphs: Vec<String>,
}

impl TextDocument {
    /// One paragraph per line of `text`. A leading BOM is dropped.
    pub fn from_text(text: &str) -> Self {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut paragraphs: Vec<String> = normalized.split('\n').map(str::to_string).collect();
        if paragraphs.last().is_some_and(|p| p.is_empty()) {
            paragraphs.pop();
        }
        Self { paragraphs }
    }

    pub fn to_text(&self) -> String {
        let mut out = self.paragraphs.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.trim().is_empty())
    }

    /// Word-wrap every paragraph and split the lines into pages.
    ///
    /// Always returns at least one page so an empty document still renders.
    pub fn paginate(&self, width: usize, lines_per_page: usize) -> Vec<Vec<String>> {
        let lines: Vec<String> = self
            .paragraphs
            .iter()
            .flat_map(|p| wrap_line(p, width))
            .collect();

        let mut pages: Vec<Vec<String>> = lines
            .chunks(lines_per_page.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        pages
    }
}

/// Greedy word wrap. Words longer than `width` are split.
pub fn wrap_line(paragraph: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let expanded = paragraph.replace('\t', &" ".repeat(TAB_WIDTH));
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in expanded.split(' ').filter(|w| !w.is_empty()) {
        let mut chars: Vec<char> = word.chars().collect();

        while chars.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(width);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }

        let needed = if current_len == 0 {
            chars.len()
        } else {
            current_len + 1 + chars.len()
        };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += chars.len();
        current.extend(chars);
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encode as Windows-1252 bytes for the PDF and PostScript standard fonts.
///
/// Typographic punctuation maps to its cp1252 slot; anything else outside
/// Latin-1 becomes `?`.
pub fn to_cp1252(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2026}' => 0x85,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_splits_lines() {
        let doc = TextDocument::from_text("\u{FEFF}one\r\ntwo\rthree\n\nfive\n");
        assert_eq!(doc.paragraphs, vec!["one", "two", "three", "", "five"]);
        assert_eq!(doc.to_text(), "one\ntwo\nthree\n\nfive\n");
    }

    #[test]
    fn test_empty_document() {
        let doc = TextDocument::from_text("");
        assert!(doc.is_empty());
        assert_eq!(doc.to_text(), "");
        assert_eq!(doc.paginate(80, 50), vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_wrap_line() {
        assert_eq!(wrap_line("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_line("", 10), vec![""]);
        assert_eq!(wrap_line("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_line("a\tb", 10), vec!["a b"]);
    }

    #[test]
    fn test_paginate() {
        let doc = TextDocument {
            paragraphs: (0..5).map(|i| format!("line {}", i)).collect(),
        };
        let pages = doc.paginate(80, 2);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], vec!["line 4"]);
    }

    #[test]
    fn test_to_cp1252() {
        assert_eq!(to_cp1252("A\u{e9}\u{2019}\u{4e2d}"), vec![b'A', 0xE9, 0x92, b'?']);
    }
}
