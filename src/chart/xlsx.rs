//! Minimal workbook embedded next to a chart so that "Edit data" in Word opens the same values
//! the chart caches. Built entirely in memory.
//!
//! ```text
//!     |    A     |    B     |    C     |
//!   1 |          | Series 1 | Series 2 |
//!   2 | Cat 1    |   10     |   15     |
//!   3 | Cat 2    |   20     |   25     |
//! ```

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ChartRow;
use crate::docx::xml::escape_attr;
use crate::error::{Result, TemplateError};
use crate::value::format_number;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

pub const SHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// Writes `header` across row 1 (from column B) and one row per data row below it.
pub fn write_chart_workbook(header: &[String], rows: &[ChartRow]) -> Result<Vec<u8>> {
    let sheet = worksheet_xml(header, rows);
    let parts: [(&str, &str); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES),
        (SHEET_PART, sheet.as_str()),
    ];

    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in parts {
        zout.start_file(name, opts)
            .map_err(|e| TemplateError::archive(format!("start workbook part {name}"), e))?;
        zout.write_all(body.as_bytes()).map_err(|e| TemplateError::Io {
            path: name.into(),
            source: e,
        })?;
    }
    let cursor = zout
        .finish()
        .map_err(|e| TemplateError::archive("finish workbook", e))?;
    Ok(cursor.into_inner())
}

fn worksheet_xml(header: &[String], rows: &[ChartRow]) -> String {
    let mut xml = String::with_capacity(256 + rows.len() * 64);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);

    xml.push_str(r#"<row r="1">"#);
    for (col, name) in header.iter().enumerate() {
        inline_string(&mut xml, &format!("{}1", column_letter(col + 1)), name);
    }
    xml.push_str("</row>");

    for (i, row) in rows.iter().enumerate() {
        let r = i + 2;
        let _ = write!(xml, r#"<row r="{r}">"#);
        inline_string(&mut xml, &format!("A{r}"), &row.label);
        for (col, value) in row.values.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<c r="{}{r}"><v>{}</v></c>"#,
                column_letter(col + 1),
                format_number(*value)
            );
        }
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn inline_string(xml: &mut String, cell: &str, text: &str) {
    let _ = write!(
        xml,
        r#"<c r="{cell}" t="inlineStr"><is><t>{}</t></is></c>"#,
        escape_attr(text)
    );
}

/// 0-based column index to letters (0 = A, 25 = Z, 26 = AA).
fn column_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}
