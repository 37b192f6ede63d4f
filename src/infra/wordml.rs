//! Word export.
//!
//! Writes a [`Document`] as a `.docx` package: a zip holding the
//! WordprocessingML parts and their `[Content_Types].xml` manifest.

use std::fmt::Write as _;
use std::fs;
use std::io::{Cursor, Write as _};
use std::path::Path;

use tracing::info;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::domain::document::{Block, Document, Span, TableRow};
use crate::error::{AppError, AppResult};

const BULLET_NUM_ID: usize = 1;
const FIRST_DECIMAL_NUM_ID: usize = 2;
const TWIPS_PER_INCH: u32 = 1440;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const WORD_TYPE_BASE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";
const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

pub fn save(document: &Document, path: &Path) -> AppResult<()> {
    let bytes = write_document(document)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
        .map_err(|err| AppError::Export(format!("failed to write {}: {err}", path.display())))?;
    info!(path = %path.display(), blocks = document.blocks.len(), "wrote Word document");
    Ok(())
}

pub fn write_document(document: &Document) -> AppResult<Vec<u8>> {
    let mut body = String::new();
    let mut decimal_lists = 0;
    let mut in_numbered_run = false;

    for (index, block) in document.blocks.iter().enumerate() {
        match block {
            Block::Heading { level, spans } => {
                let style = format!("Heading{}", (*level).clamp(1, 3));
                write_paragraph(&mut body, Some(&style), None, spans, false);
            }
            Block::Paragraph(spans) => write_paragraph(&mut body, None, None, spans, false),
            Block::BulletItem(spans) => {
                write_paragraph(&mut body, Some("ListParagraph"), Some(BULLET_NUM_ID), spans, false)
            }
            Block::NumberedItem(spans) => {
                if !in_numbered_run {
                    decimal_lists += 1;
                }
                let num_id = FIRST_DECIMAL_NUM_ID + decimal_lists - 1;
                write_paragraph(&mut body, Some("ListParagraph"), Some(num_id), spans, false);
            }
            Block::Table(rows) => {
                write_table(&mut body, rows);
                if index + 1 == document.blocks.len() {
                    body.push_str("<w:p/>");
                }
            }
        }
        in_numbered_run = matches!(block, Block::NumberedItem(_));
    }

    let margin = TWIPS_PER_INCH;
    let _ = write!(
        body,
        "<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/>\
         <w:pgMar w:top=\"{margin}\" w:right=\"{margin}\" w:bottom=\"{margin}\" w:left=\"{margin}\" \
         w:header=\"720\" w:footer=\"720\" w:gutter=\"0\"/></w:sectPr>"
    );

    let parts = [
        ("[Content_Types].xml", content_types_xml()),
        (
            "_rels/.rels",
            format!(
                "<Relationships xmlns=\"{REL_NS}\">\
                 <Relationship Id=\"rId1\" Type=\"{REL_TYPE_BASE}/officeDocument\" Target=\"word/document.xml\"/>\
                 </Relationships>"
            ),
        ),
        (
            "word/_rels/document.xml.rels",
            format!(
                "<Relationships xmlns=\"{REL_NS}\">\
                 <Relationship Id=\"rId1\" Type=\"{REL_TYPE_BASE}/styles\" Target=\"styles.xml\"/>\
                 <Relationship Id=\"rId2\" Type=\"{REL_TYPE_BASE}/numbering\" Target=\"numbering.xml\"/>\
                 </Relationships>"
            ),
        ),
        (
            "word/document.xml",
            format!("<w:document xmlns:w=\"{W_NS}\"><w:body>{body}</w:body></w:document>"),
        ),
        ("word/styles.xml", styles_xml()),
        ("word/numbering.xml", numbering_xml(decimal_lists)),
    ];
    package(&parts)
}

fn package(parts: &[(&str, String)]) -> AppResult<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, xml) in parts {
        zip.start_file(*name, options).map_err(zip_error)?;
        zip.write_all(XML_DECL.as_bytes())?;
        zip.write_all(xml.as_bytes())?;
    }
    let cursor = zip.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(err: zip::result::ZipError) -> AppError {
    AppError::Export(format!("failed to build .docx: {err}"))
}

fn content_types_xml() -> String {
    let mut xml = format!(
        "<Types xmlns=\"{CONTENT_TYPES_NS}\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>"
    );
    for (part, kind) in [
        ("document", "document.main"),
        ("styles", "styles"),
        ("numbering", "numbering"),
    ] {
        let _ = write!(
            xml,
            "<Override PartName=\"/word/{part}.xml\" ContentType=\"{WORD_TYPE_BASE}.{kind}+xml\"/>"
        );
    }
    xml.push_str("</Types>");
    xml
}

fn write_paragraph(
    out: &mut String,
    style: Option<&str>,
    num_id: Option<usize>,
    spans: &[Span],
    force_bold: bool,
) {
    out.push_str("<w:p>");
    if style.is_some() || num_id.is_some() {
        out.push_str("<w:pPr>");
        if let Some(style) = style {
            let _ = write!(out, "<w:pStyle w:val=\"{style}\"/>");
        }
        if let Some(num_id) = num_id {
            let _ = write!(
                out,
                "<w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"{num_id}\"/></w:numPr>"
            );
        }
        out.push_str("</w:pPr>");
    }
    for span in spans {
        write_run(out, span, force_bold);
    }
    out.push_str("</w:p>");
}

fn write_run(out: &mut String, span: &Span, force_bold: bool) {
    out.push_str("<w:r>");
    let bold = span.bold || force_bold;
    if bold || span.italic || span.monospace {
        out.push_str("<w:rPr>");
        if span.monospace {
            out.push_str("<w:rFonts w:ascii=\"Courier New\" w:hAnsi=\"Courier New\" w:cs=\"Courier New\"/>");
        }
        if bold {
            out.push_str("<w:b/>");
        }
        if span.italic {
            out.push_str("<w:i/>");
        }
        if span.monospace {
            out.push_str("<w:shd w:val=\"clear\" w:color=\"auto\" w:fill=\"F5F5F5\"/>");
        }
        out.push_str("</w:rPr>");
    }
    let _ = write!(out, "<w:t xml:space=\"preserve\">{}</w:t>", escape(&span.text));
    out.push_str("</w:r>");
}

fn write_table(out: &mut String, rows: &[TableRow]) {
    let columns = rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);

    out.push_str("<w:tbl><w:tblPr><w:tblW w:w=\"5000\" w:type=\"pct\"/><w:tblBorders>");
    for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        let _ = write!(
            out,
            "<w:{edge} w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"999999\"/>"
        );
    }
    out.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
    for _ in 0..columns {
        out.push_str("<w:gridCol/>");
    }
    out.push_str("</w:tblGrid>");

    for row in rows {
        out.push_str("<w:tr>");
        if row.header {
            out.push_str("<w:trPr><w:tblHeader/></w:trPr>");
        }
        for cell in &row.cells {
            out.push_str("<w:tc><w:tcPr><w:tcW w:w=\"0\" w:type=\"auto\"/></w:tcPr>");
            if cell.blocks.is_empty() {
                out.push_str("<w:p/>");
            }
            for block in &cell.blocks {
                match block {
                    Block::Paragraph(spans) => write_paragraph(out, None, None, spans, row.header),
                    other => {
                        let text = other.plain_text();
                        write_paragraph(out, None, None, &[Span::plain(text)], row.header);
                    }
                }
            }
            out.push_str("</w:tc>");
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
}

fn styles_xml() -> String {
    let mut xml = format!(
        "<w:styles xmlns:w=\"{W_NS}\">\
         <w:docDefaults><w:rPrDefault><w:rPr>\
         <w:rFonts w:ascii=\"Calibri\" w:hAnsi=\"Calibri\" w:cs=\"Calibri\"/><w:sz w:val=\"22\"/>\
         </w:rPr></w:rPrDefault></w:docDefaults>\
         <w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/>\
         <w:pPr><w:spacing w:after=\"120\"/></w:pPr></w:style>\
         <w:style w:type=\"paragraph\" w:styleId=\"ListParagraph\"><w:name w:val=\"List Paragraph\"/>\
         <w:basedOn w:val=\"Normal\"/><w:pPr><w:spacing w:after=\"80\"/><w:ind w:left=\"720\"/></w:pPr></w:style>"
    );
    // (level, space before, space after, half-point size)
    for (level, before, after, size) in [(1, 240, 120, 32), (2, 200, 100, 28), (3, 160, 80, 24)] {
        let _ = write!(
            xml,
            "<w:style w:type=\"paragraph\" w:styleId=\"Heading{level}\"><w:name w:val=\"heading {level}\"/>\
             <w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/>\
             <w:pPr><w:keepNext/><w:spacing w:before=\"{before}\" w:after=\"{after}\"/>\
             <w:outlineLvl w:val=\"{}\"/></w:pPr>\
             <w:rPr><w:b/><w:sz w:val=\"{size}\"/></w:rPr></w:style>",
            level - 1
        );
    }
    xml.push_str("</w:styles>");
    xml
}

fn numbering_xml(decimal_lists: usize) -> String {
    let mut xml = format!(
        "<w:numbering xmlns:w=\"{W_NS}\">\
         <w:abstractNum w:abstractNumId=\"0\"><w:multiLevelType w:val=\"singleLevel\"/>\
         <w:lvl w:ilvl=\"0\"><w:start w:val=\"1\"/><w:numFmt w:val=\"bullet\"/>\
         <w:lvlText w:val=\"\u{2022}\"/><w:lvlJc w:val=\"left\"/>\
         <w:pPr><w:ind w:left=\"720\" w:hanging=\"360\"/></w:pPr></w:lvl></w:abstractNum>\
         <w:abstractNum w:abstractNumId=\"1\"><w:multiLevelType w:val=\"singleLevel\"/>\
         <w:lvl w:ilvl=\"0\"><w:start w:val=\"1\"/><w:numFmt w:val=\"decimal\"/>\
         <w:lvlText w:val=\"%1.\"/><w:lvlJc w:val=\"left\"/>\
         <w:pPr><w:ind w:left=\"720\" w:hanging=\"360\"/></w:pPr></w:lvl></w:abstractNum>\
         <w:num w:numId=\"{BULLET_NUM_ID}\"><w:abstractNumId w:val=\"0\"/></w:num>"
    );
    // One instance per numbered run so each list restarts at 1.
    for offset in 0..decimal_lists {
        let _ = write!(
            xml,
            "<w:num w:numId=\"{}\"><w:abstractNumId w:val=\"1\"/>\
             <w:lvlOverride w:ilvl=\"0\"><w:startOverride w:val=\"1\"/></w:lvlOverride></w:num>",
            FIRST_DECIMAL_NUM_ID + offset
        );
    }
    xml.push_str("</w:numbering>");
    xml
}

/// Escapes markup characters and drops control characters XML 1.0 forbids.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(ch),
            ch if (ch as u32) < 0x20 => {}
            ch => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::domain::document::render;

    fn open(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = open(bytes.to_vec());
        let mut file = archive.by_name(name).unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }

    fn body_of(markdown: &str) -> String {
        part(&write_document(&render(markdown)).unwrap(), "word/document.xml")
    }

    #[test]
    fn escapes_markup_and_control_characters() {
        assert_eq!(escape("a<b & \"c\"\u{1}"), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn archive_holds_every_docx_part() {
        let bytes = write_document(&render("# Plan\n- step")).unwrap();
        let archive = open(bytes.clone());
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "[Content_Types].xml",
                "_rels/.rels",
                "word/_rels/document.xml.rels",
                "word/document.xml",
                "word/numbering.xml",
                "word/styles.xml",
            ]
        );

        let types = part(&bytes, "[Content_Types].xml");
        assert!(types.starts_with("<?xml"));
        assert!(types.contains("<Default Extension=\"rels\""));
        assert!(types.contains(
            "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>"
        ));
        assert!(types.contains("PartName=\"/word/numbering.xml\""));
        assert!(part(&bytes, "_rels/.rels").contains("Target=\"word/document.xml\""));
        assert!(part(&bytes, "word/_rels/document.xml.rels").contains("Target=\"numbering.xml\""));
        assert!(part(&bytes, "word/styles.xml").contains("w:styleId=\"Heading1\""));
    }

    #[test]
    fn writes_headings_runs_and_margins() {
        let xml = body_of("# Plan\nUse **bold**, *it* and `x < y`");
        assert!(xml.contains("<w:pStyle w:val=\"Heading1\"/>"));
        assert!(xml.contains("<w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">bold</w:t>"));
        assert!(xml.contains("<w:rPr><w:i/></w:rPr><w:t xml:space=\"preserve\">it</w:t>"));
        assert!(xml.contains("Courier New"));
        assert!(xml.contains("x &lt; y"));
        assert!(xml.contains("w:top=\"1440\""));
    }

    #[test]
    fn numbered_runs_restart() {
        let bytes = write_document(&render("1. a\n2. b\n\ntext\n1. c")).unwrap();
        let body = part(&bytes, "word/document.xml");
        assert!(body.contains("<w:numId w:val=\"2\"/>"));
        assert!(body.contains("<w:numId w:val=\"3\"/>"));
        let numbering = part(&bytes, "word/numbering.xml");
        assert!(numbering.contains("<w:num w:numId=\"3\">"));
        assert!(!numbering.contains("<w:num w:numId=\"4\">"));
    }

    #[test]
    fn tables_mark_header_rows_and_end_with_paragraph() {
        let xml = body_of("| A | B |\n|---|---|\n| 1 | 2 |");
        assert_eq!(xml.matches("<w:tr>").count(), 2);
        assert_eq!(xml.matches("<w:tblHeader/>").count(), 1);
        assert_eq!(xml.matches("<w:gridCol/>").count(), 2);
        assert!(xml.contains("<w:rPr><w:b/></w:rPr><w:t xml:space=\"preserve\">A</w:t>"));
        assert!(xml.contains("</w:tbl><w:p/><w:sectPr>"));
    }

    #[test]
    fn saves_a_zip_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("plan.docx");
        save(&render("# Plan"), &path).unwrap();
        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"PK\x03\x04"));
        assert!(part(&written, "word/document.xml").contains("Plan"));
    }
}
