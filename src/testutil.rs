//! In-memory `.docx` fixtures for unit tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::docx::ns;

pub const NAMESPACES: &str = concat!(
    r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" "#,
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture" "#,
    r#"xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" "#,
    r#"xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml""#
);

const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

pub const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Report</dc:title><dc:creator>Templates</dc:creator></cp:coreProperties>"#;

pub fn paragraph(text: &str) -> String {
    format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {NAMESPACES}><w:body>{body}</w:body></w:document>"#
    )
}

pub struct DocxBuilder {
    parts: Vec<(String, Vec<u8>)>,
    rels: Vec<(String, String, String)>,
    overrides: Vec<(String, String)>,
    next_id: usize,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self {
            parts: vec![
                ("_rels/.rels".to_string(), ROOT_RELS.as_bytes().to_vec()),
                ("word/document.xml".to_string(), document_xml("").into_bytes()),
                ("docProps/core.xml".to_string(), CORE_XML.as_bytes().to_vec()),
            ],
            rels: Vec::new(),
            overrides: vec![(
                "/word/document.xml".to_string(),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml".to_string(),
            )],
            next_id: 100,
        }
    }

    /// Adds or replaces a raw part.
    pub fn part(mut self, name: &str, data: Vec<u8>) -> Self {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = data,
            None => self.parts.push((name.to_string(), data)),
        }
        self
    }

    pub fn body(self, body_xml: &str) -> Self {
        self.part("word/document.xml", document_xml(body_xml).into_bytes())
    }

    /// Adds a relationship from `word/document.xml`.
    pub fn relationship(mut self, id: &str, rel_type: &str, target: &str) -> Self {
        self.rels
            .push((id.to_string(), rel_type.to_string(), target.to_string()));
        self
    }

    pub fn override_type(mut self, part: &str, content_type: &str) -> Self {
        self.overrides
            .push((format!("/{part}"), content_type.to_string()));
        self
    }

    pub fn header(self, file_name: &str, body_xml: &str) -> Self {
        self.story("hdr", ns::REL_HEADER, "header", file_name, body_xml)
    }

    pub fn footer(self, file_name: &str, body_xml: &str) -> Self {
        self.story("ftr", ns::REL_FOOTER, "footer", file_name, body_xml)
    }

    fn story(mut self, root: &str, rel_type: &str, kind: &str, file_name: &str, body_xml: &str) -> Self {
        let id = format!("rId{}", self.next_id);
        self.next_id += 1;
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:{root} {NAMESPACES}>{body_xml}</w:{root}>"#
        );
        let part = format!("word/{file_name}");
        self.relationship(&id, rel_type, file_name)
            .override_type(
                &part,
                &format!("application/vnd.openxmlformats-officedocument.wordprocessingml.{kind}+xml"),
            )
            .part(&part, xml.into_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        let mut parts = self.parts;
        if !parts.iter().any(|(n, _)| n == DOCUMENT_RELS_PART) {
            let mut xml = String::from(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            for (id, ty, target) in &self.rels {
                xml.push_str(&format!(
                    r#"<Relationship Id="{id}" Type="{ty}" Target="{target}"/>"#
                ));
            }
            xml.push_str("</Relationships>");
            parts.push((DOCUMENT_RELS_PART.to_string(), xml.into_bytes()));
        }
        if !parts.iter().any(|(n, _)| n == CONTENT_TYPES_PART) {
            let mut xml = String::from(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
            );
            for (name, ty) in &self.overrides {
                xml.push_str(&format!(r#"<Override PartName="{name}" ContentType="{ty}"/>"#));
            }
            xml.push_str("</Types>");
            parts.insert(0, (CONTENT_TYPES_PART.to_string(), xml.into_bytes()));
        }

        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        for (name, data) in &parts {
            zout.start_file(name.as_str(), opts).expect("start entry");
            zout.write_all(data).expect("write entry");
        }
        zout.finish().expect("finish zip").into_inner()
    }
}
