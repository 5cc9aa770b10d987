use super::{load_part, TemplateProcessor};
use crate::docx::ns;
use crate::docx::query::{preserve_space_if_needed, PartIndex};
use crate::docx::xml::{escape_attr, parse_xml_part, structure_fingerprint, write_xml_part, XmlEvent, XmlPart};
use crate::error::{Result, TemplateError};
use crate::value::TemplateValue;

/// Replaces `search` inside every `w:t`; returns the number of occurrences.
fn replace_in_run_text(part: &mut XmlPart, search: &str, replacement: &str) -> Result<usize> {
    let index = PartIndex::build(part);
    let nodes = index.text_nodes_containing(part, ns::W, "t", search);
    if nodes.is_empty() {
        return Ok(0);
    }

    let before = structure_fingerprint(&part.events);
    let mut count = 0;
    for (t, ev) in nodes {
        let XmlEvent::Text { text } = &mut part.events[ev] else {
            continue;
        };
        count += text.matches(search).count();
        *text = text.replace(search, replacement);
        let text = text.clone();
        preserve_space_if_needed(&mut part.events[index.get(t).start], &text);
    }
    if structure_fingerprint(&part.events) != before {
        return Err(TemplateError::StructureChanged {
            part: part.name.clone(),
        });
    }
    Ok(count)
}

/// Metadata parts keep their values in plain element text.
fn replace_in_all_text(part: &mut XmlPart, search: &str, replacement: &str) -> usize {
    let mut count = 0;
    for ev in &mut part.events {
        if let XmlEvent::Text { text } = ev {
            if text.contains(search) {
                count += text.matches(search).count();
                *text = text.replace(search, replacement);
            }
        }
    }
    count
}

impl TemplateProcessor {
    /// Replaces every `$name$` in the working set and the core properties.
    pub fn replace_text(&mut self, name: &str, value: impl Into<TemplateValue>) -> Result<usize> {
        let value = value.into();
        let r = self.replace_text_inner(name, &value);
        self.report(r)
    }

    fn replace_text_inner(&mut self, name: &str, value: &TemplateValue) -> Result<usize> {
        let search = self.marker(name);
        let replacement = value.render();
        let mut total = 0;

        for part_name in self.working_set.clone() {
            let part = load_part(&mut self.parts, &self.package, &part_name)?;
            let n = replace_in_run_text(part, &search, &replacement)?;
            if n > 0 {
                self.dirty.insert(part_name);
                total += n;
            }
        }

        if let Some(core) = self.core_part.clone() {
            let part = load_part(&mut self.parts, &self.package, &core)?;
            let n = replace_in_all_text(part, &search, &replacement);
            if n > 0 {
                self.dirty.insert(core);
                total += n;
            }
        }
        Ok(total)
    }

    /// Batched text replacement over the main document only. The part is serialized once,
    /// every marker replaced in the markup, and the result parsed back.
    pub fn replace_multi_text<I, K, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TemplateValue>,
    {
        let pairs: Vec<(String, String)> = values
            .into_iter()
            .map(|(k, v)| (self.marker(k.as_ref()), v.into().render()))
            .collect();
        let r = self.replace_multi_text_inner(&pairs);
        self.report(r)
    }

    fn replace_multi_text_inner(&mut self, pairs: &[(String, String)]) -> Result<()> {
        let main = self.main_part.clone();
        let part = load_part(&mut self.parts, &self.package, &main)?;
        let bytes = write_xml_part(part)?;
        let original = String::from_utf8(bytes).map_err(|e| TemplateError::malformed(&main, e))?;

        let mut xml = original.clone();
        for (search, value) in pairs {
            if xml.contains(search.as_str()) {
                xml = xml.replace(search.as_str(), &escape_attr(value));
            }
        }
        if xml == original {
            return Ok(());
        }
        *part = parse_xml_part(&main, xml.as_bytes())?;
        self.dirty.insert(main);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::logging::MemoryLog;
    use crate::testutil::{paragraph, DocxBuilder};
    use crate::{TemplateOptions, TemplateProcessor, TemplateValue};

    fn session(bytes: Vec<u8>) -> TemplateProcessor {
        TemplateProcessor::from_bytes(bytes, TemplateOptions::default(), Box::new(MemoryLog::default()))
            .expect("load")
    }

    #[test]
    fn replaces_everywhere_including_metadata() {
        let core = crate::testutil::CORE_XML.replace("Report", "Report for $x$");
        let bytes = DocxBuilder::new()
            .body(&format!("{}{}", paragraph("a $x$ b $x$"), paragraph("other")))
            .header("header1.xml", &paragraph("$x$"))
            .footer("footer1.xml", &paragraph("page $x$"))
            .part("docProps/core.xml", core.into_bytes())
            .build();
        let mut s = session(bytes);
        assert_eq!(s.replace_text("x", "V").expect("replace"), 5);

        let doc = s.part_xml("word/document.xml").expect("doc");
        assert!(doc.contains("<w:t>a V b V</w:t>"));
        assert!(doc.contains("<w:t>other</w:t>"));
        assert!(s.part_xml("word/header1.xml").expect("hdr").contains("<w:t>V</w:t>"));
        assert!(s.part_xml("word/footer1.xml").expect("ftr").contains("<w:t>page V</w:t>"));
        assert!(s.part_xml("docProps/core.xml").expect("core").contains("Report for V"));
    }

    #[test]
    fn missing_marker_is_a_no_op() {
        let mut s = session(DocxBuilder::new().body(&paragraph("$x$")).build());
        assert_eq!(s.replace_text("y", "V").expect("replace"), 0);
        assert!(s.part_xml("word/document.xml").expect("doc").contains("$x$"));
    }

    #[test]
    fn edge_whitespace_and_markup_in_values() {
        let mut s = session(DocxBuilder::new().body(&paragraph("$x$")).build());
        s.replace_text("x", " <b> & ").expect("replace");
        let doc = s.part_xml("word/document.xml").expect("doc");
        assert!(doc.contains(r#"<w:t xml:space="preserve"> &lt;b&gt; &amp; </w:t>"#), "{doc}");
    }

    #[test]
    fn zero_is_not_empty() {
        let mut s = session(DocxBuilder::new().body(&paragraph("[$a$][$b$]")).build());
        s.replace_text("a", 0i64).expect("a");
        s.replace_text("b", TemplateValue::Absent).expect("b");
        assert!(s.part_xml("word/document.xml").expect("doc").contains("<w:t>[0][]</w:t>"));
    }

    #[test]
    fn multi_text_touches_only_the_main_document() {
        let bytes = DocxBuilder::new()
            .body(&paragraph("$a$ and $b$"))
            .header("header1.xml", &paragraph("$a$"))
            .build();
        let mut s = session(bytes);
        s.replace_multi_text([("a", "1 & 2"), ("b", "\"q\"")]).expect("multi");
        let doc = s.part_xml("word/document.xml").expect("doc");
        assert!(doc.contains("1 &amp; 2 and"), "{doc}");
        assert!(doc.contains("and \"q\"</w:t>"), "{doc}");
        assert!(s.part_xml("word/header1.xml").expect("hdr").contains("$a$"));
    }
}
