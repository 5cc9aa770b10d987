use std::path::Path;

use super::{load_part, TemplateProcessor};
use crate::docx::ns;
use crate::docx::query::PartIndex;
use crate::docx::rels::Relationships;
use crate::docx::xml::attr_value;
use crate::error::{Result, TemplateError};

impl TemplateProcessor {
    /// Swaps the bytes of every image whose drawing description is `$name$`. Returns the
    /// number of media parts replaced; a missing placeholder is only logged.
    pub fn replace_image(&mut self, name: &str, source: &Path) -> Result<usize> {
        let r = self.replace_image_inner(name, source);
        self.report(r)
    }

    fn replace_image_inner(&mut self, name: &str, source: &Path) -> Result<usize> {
        let marker = self.marker(name);
        let mut targets: Vec<String> = Vec::new();

        for part_name in self.working_set.clone() {
            let part = &*load_part(&mut self.parts, &self.package, &part_name)?;
            let index = PartIndex::build(part);
            let mut embeds: Vec<String> = Vec::new();
            for doc_pr in index.find(ns::WP, "docPr") {
                let descr = attr_value(&part.events[index.get(doc_pr).start], "descr");
                if descr.as_deref() != Some(marker.as_str()) {
                    continue;
                }
                let Some(drawing) = index.get(doc_pr).parent else {
                    continue;
                };
                let embed = index
                    .first_descendant(drawing, ns::A, "blip")
                    .and_then(|blip| index.attr(part, blip, ns::R, "embed"));
                match embed {
                    Some(id) => embeds.push(id),
                    None => {
                        return Err(TemplateError::unresolved(
                            &part_name,
                            format!("image placeholder {marker} has no embedded picture"),
                        ))
                    }
                }
            }
            if embeds.is_empty() {
                continue;
            }
            let rels = Relationships::load(&self.package, &part_name)?;
            for id in embeds {
                let target = rels.part_for_id(&id)?;
                if !self.package.contains(&target) {
                    return Err(TemplateError::unresolved(
                        &rels.rels_part,
                        format!("media part {target} is missing"),
                    ));
                }
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }

        if targets.is_empty() {
            self.log.info(&format!("no image placeholder {marker} found"));
            return Ok(0);
        }
        let bytes = std::fs::read(source).map_err(|e| TemplateError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        for target in &targets {
            self.package.set(target, bytes.clone());
        }
        Ok(targets.len())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::docx::ns;
    use crate::logging::{MemoryLog, Severity};
    use crate::testutil::DocxBuilder;
    use crate::{TemplateError, TemplateOptions, TemplateProcessor};

    fn drawing(descr: &str, rid: &str) -> String {
        format!(
            r#"<w:p><w:r><w:drawing><wp:inline><wp:extent cx="100" cy="100"/><wp:docPr id="1" name="Picture 1" descr="{descr}"/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:blipFill><a:blip r:embed="{rid}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        )
    }

    #[test]
    fn replaces_media_bytes_and_keeps_relationship() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logo = dir.path().join("logo.png");
        std::fs::write(&logo, b"new-png").expect("write");

        let bytes = DocxBuilder::new()
            .body(&format!("{}{}", drawing("$logo$", "rId7"), drawing("other", "rId8")))
            .relationship("rId7", ns::REL_IMAGE, "media/image1.png")
            .relationship("rId8", ns::REL_IMAGE, "media/image2.png")
            .part("word/media/image1.png", b"old-png".to_vec())
            .part("word/media/image2.png", b"keep".to_vec())
            .build();
        let mut s =
            TemplateProcessor::from_bytes(bytes, TemplateOptions::default(), Box::new(MemoryLog::default()))
                .expect("load");
        let before = s.part_xml("word/_rels/document.xml.rels").expect("rels");
        assert_eq!(s.replace_image("logo", &logo).expect("image"), 1);

        let out = crate::docx::package::DocxPackage::from_bytes(s.to_bytes().expect("bytes")).expect("pkg");
        assert_eq!(out.get("word/media/image1.png"), Some(&b"new-png"[..]));
        assert_eq!(out.get("word/media/image2.png"), Some(&b"keep"[..]));
        assert_eq!(
            out.get("word/_rels/document.xml.rels"),
            Some(before.as_bytes())
        );
    }

    #[test]
    fn header_images_resolve_through_their_own_rels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logo = dir.path().join("logo.png");
        std::fs::write(&logo, b"hdr").expect("write");
        let header_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image9.jpeg"/></Relationships>"#;
        let bytes = DocxBuilder::new()
            .header("header1.xml", &drawing("$logo$", "rId1"))
            .part("word/_rels/header1.xml.rels", header_rels.as_bytes().to_vec())
            .part("word/media/image9.jpeg", b"old".to_vec())
            .build();
        let mut s =
            TemplateProcessor::from_bytes(bytes, TemplateOptions::default(), Box::new(MemoryLog::default()))
                .expect("load");
        assert_eq!(s.replace_image("logo", &logo).expect("image"), 1);
        let out = crate::docx::package::DocxPackage::from_bytes(s.to_bytes().expect("bytes")).expect("pkg");
        assert_eq!(out.get("word/media/image9.jpeg"), Some(&b"hdr"[..]));
    }

    #[test]
    fn missing_placeholder_is_logged_not_fatal() {
        let log = Rc::new(MemoryLog::default());
        let mut s = TemplateProcessor::from_bytes(
            DocxBuilder::new().build(),
            TemplateOptions::default(),
            Box::new(Rc::clone(&log)),
        )
        .expect("load");
        let n = s
            .replace_image("logo", std::path::Path::new("/nonexistent.png"))
            .expect("no-op");
        assert_eq!(n, 0);
        assert_eq!(log.entries()[0].0, Severity::Info);
    }

    #[test]
    fn dangling_relationship_is_an_error() {
        let bytes = DocxBuilder::new().body(&drawing("$logo$", "rId42")).build();
        let mut s =
            TemplateProcessor::from_bytes(bytes, TemplateOptions::default(), Box::new(MemoryLog::default()))
                .expect("load");
        let err = s
            .replace_image("logo", std::path::Path::new("/nonexistent.png"))
            .err()
            .expect("error");
        assert!(matches!(err, TemplateError::RelationshipResolution { .. }));
    }
}
