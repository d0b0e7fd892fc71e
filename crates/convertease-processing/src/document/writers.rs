//! Writers rendering a [`TextDocument`] into each document target

use super::model::{to_cp1252, TextDocument, LINES_PER_PAGE, LINE_WIDTH_CHARS};
use convertease_core::ConversionError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::{Cursor, Write};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

const A4_WIDTH: i64 = 595;
const A4_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FONT_SIZE: i64 = 11;
const LEADING: i64 = 14;

pub fn write_text(doc: &TextDocument) -> Vec<u8> {
    doc.to_text().into_bytes()
}

/// Paginated A4 PDF set in Helvetica.
pub fn write_pdf(doc: &TextDocument) -> Result<Vec<u8>, ConversionError> {
    let encode_failed = |e: &dyn std::fmt::Display| ConversionError::EncodeFailed(format!("PDF: {}", e));

    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let font_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids = Vec::new();
    for lines in doc.paginate(LINE_WIDTH_CHARS, LINES_PER_PAGE) {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("TL", vec![LEADING.into()]),
            Operation::new("Td", vec![MARGIN.into(), (A4_HEIGHT - MARGIN).into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(to_cp1252(&line))]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations }.encode().map_err(|e| encode_failed(&e))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => page_ids.len() as i64,
        "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<Object>>(),
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
    };
    pdf.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.compress();

    let mut buffer = Vec::new();
    pdf.save_to(&mut buffer).map_err(|e| encode_failed(&e))?;
    Ok(buffer)
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Minimal WordprocessingML package: one run per paragraph.
pub fn write_docx(doc: &TextDocument) -> Result<Vec<u8>, ConversionError> {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for paragraph in &doc.paragraphs {
        if paragraph.is_empty() {
            body.push_str("<w:p></w:p>");
            continue;
        }
        body.push_str("<w:p><w:r>");
        for (i, segment) in paragraph.split('\t').enumerate() {
            if i > 0 {
                body.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                body.push_str(r#"<w:t xml:space="preserve">"#);
                body.push_str(&xml_escape(segment));
                body.push_str("</w:t>");
            }
        }
        body.push_str("</w:r></w:p>");
    }
    body.push_str("</w:body></w:document>");

    let encode_failed = |e: &dyn std::fmt::Display| ConversionError::EncodeFailed(format!("DOCX: {}", e));
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (name, contents) in [
            ("[Content_Types].xml", CONTENT_TYPES_XML),
            ("_rels/.rels", PACKAGE_RELS_XML),
            ("word/document.xml", body.as_str()),
        ] {
            zip.start_file(name, options).map_err(|e| encode_failed(&e))?;
            zip.write_all(contents.as_bytes())
                .map_err(|e| encode_failed(&e))?;
        }
        zip.finish().map_err(|e| encode_failed(&e))?;
    }
    Ok(buffer)
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            // Control characters are not allowed in XML 1.0
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// RTF, which Word opens as a `.doc`.
pub fn write_rtf(doc: &TextDocument) -> Vec<u8> {
    let mut out = String::from("{\\rtf1\\ansi\\ansicpg1252\\deff0{\\fonttbl{\\f0\\fswiss Helvetica;}}\\f0\\fs22\n");
    for paragraph in &doc.paragraphs {
        for c in paragraph.chars() {
            match c {
                '\\' | '{' | '}' => {
                    out.push('\\');
                    out.push(c);
                }
                '\t' => out.push_str("\\tab "),
                c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
                c if c.is_control() => {}
                c => {
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        out.push_str(&format!("\\u{}?", *unit as i16));
                    }
                }
            }
        }
        out.push_str("\\par\n");
    }
    out.push('}');
    out.into_bytes()
}

/// PostScript level 2, one `showpage` per page.
pub fn write_postscript(doc: &TextDocument) -> Vec<u8> {
    let pages = doc.paginate(LINE_WIDTH_CHARS, LINES_PER_PAGE);
    let mut out: Vec<u8> = Vec::new();

    out.extend_from_slice(b"%!PS-Adobe-3.0\n");
    out.extend_from_slice(format!("%%BoundingBox: 0 0 {} {}\n", A4_WIDTH, A4_HEIGHT).as_bytes());
    out.extend_from_slice(format!("%%Pages: {}\n", pages.len()).as_bytes());
    out.extend_from_slice(b"%%EndComments\n");
    out.extend_from_slice(
        b"/Helvetica findfont dup length dict begin\n  { 1 index /FID ne { def } { pop pop } ifelse } forall\n  /Encoding ISOLatin1Encoding def\n  currentdict\nend /Helvetica-Latin1 exch definefont pop\n",
    );

    for (index, lines) in pages.iter().enumerate() {
        let number = index + 1;
        out.extend_from_slice(format!("%%Page: {} {}\n", number, number).as_bytes());
        out.extend_from_slice(format!("/Helvetica-Latin1 findfont {} scalefont setfont\n", FONT_SIZE).as_bytes());

        let mut y = A4_HEIGHT - MARGIN;
        for line in lines {
            out.extend_from_slice(format!("{} {} moveto (", MARGIN, y).as_bytes());
            for byte in to_cp1252(line) {
                match byte {
                    b'(' | b')' | b'\\' => {
                        out.push(b'\\');
                        out.push(byte);
                    }
                    0x20..=0x7E => out.push(byte),
                    other => out.extend_from_slice(format!("\\{:03o}", other).as_bytes()),
                }
            }
            out.extend_from_slice(b") show\n");
            y -= LEADING;
        }
        out.extend_from_slice(b"showpage\n");
    }

    out.extend_from_slice(b"%%EOF\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::readers::{read_docx, read_pdf, read_rtf};

    fn sample() -> TextDocument {
        TextDocument::from_text("Quarterly report\n\nRevenue & costs\tQ3\nCaf\u{e9} {draft}\n")
    }

    #[test]
    fn test_write_text() {
        assert_eq!(write_text(&sample()), sample().to_text().into_bytes());
    }

    #[test]
    fn test_pdf_is_readable() {
        let pdf = write_pdf(&sample()).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let loaded = Document::load_mem(&pdf).unwrap();
        assert_eq!(loaded.get_pages().len(), 1);

        let text = read_pdf(&pdf).unwrap().to_text();
        assert!(text.contains("Quarterly"), "{}", text);
        assert!(text.contains("Revenue"), "{}", text);
    }

    #[test]
    fn test_pdf_paginates() {
        let doc = TextDocument {
            paragraphs: (0..(LINES_PER_PAGE * 2 + 1))
                .map(|i| format!("line {}", i))
                .collect(),
        };
        let pdf = write_pdf(&doc).unwrap();
        assert_eq!(Document::load_mem(&pdf).unwrap().get_pages().len(), 3);
    }

    #[test]
    fn test_docx_round_trips_paragraphs() {
        let docx = write_docx(&sample()).unwrap();
        assert!(docx.starts_with(b"PK\x03\x04"));
        assert_eq!(read_docx(&docx).unwrap(), sample());
    }

    #[test]
    fn test_rtf_round_trips_paragraphs() {
        let rtf = write_rtf(&sample());
        assert!(rtf.starts_with(b"{\\rtf1"));
        assert_eq!(read_rtf(&rtf).unwrap(), sample());
    }

    #[test]
    fn test_rtf_escapes_non_ascii() {
        let doc = TextDocument::from_text("\u{4e2d} \u{1F600}");
        let rtf = String::from_utf8(write_rtf(&doc)).unwrap();
        assert!(rtf.contains("\\u20013?"));
        assert!(rtf.contains("\\u-10179?\\u-8704?"));
    }

    #[test]
    fn test_postscript_pages() {
        let ps = String::from_utf8_lossy(&write_postscript(&sample())).into_owned();
        assert!(ps.starts_with("%!PS-Adobe-3.0"));
        assert!(ps.contains("%%Pages: 1"));
        assert!(ps.contains("(Caf\\351 {draft}) show"));
        assert_eq!(ps.matches("showpage").count(), 1);
    }
}
