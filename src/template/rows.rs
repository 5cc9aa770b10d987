use std::collections::BTreeSet;

use super::block::{apply_splices, outermost, Splice, Stamp};
use super::{load_part, TemplateProcessor};
use crate::docx::ns;
use crate::docx::query::PartIndex;
use crate::docx::xml::XmlPart;
use crate::error::Result;
use crate::value::{Record, TemplateValue};

fn fill(text: &str, markers: &[(String, String)], record: &Record) -> String {
    let mut out = text.to_string();
    for (key, search) in markers {
        if out.contains(search.as_str()) {
            let value = record.get(key).map(TemplateValue::render).unwrap_or_default();
            out = out.replace(search.as_str(), &value);
        }
    }
    out
}

/// Returns the number of rows written.
fn expand_rows(part: &mut XmlPart, markers: &[(String, String)], records: &[Record]) -> usize {
    let index = PartIndex::build(part);
    let mut found: BTreeSet<usize> = BTreeSet::new();
    for (_, search) in markers {
        for (t, _) in index.text_nodes_containing(part, ns::W, "t", search) {
            if let Some(tr) = index.ancestor(t, ns::W, "tr") {
                found.insert(tr);
            }
        }
    }
    let found: Vec<usize> = found.into_iter().collect();
    let rows = outermost(&index, &found);

    // Rows sharing a parent table form one block, repeated per record.
    let mut groups: Vec<(Option<usize>, Vec<usize>)> = Vec::new();
    for row in rows {
        let parent = index.get(row).parent;
        match groups.iter_mut().find(|(p, _)| *p == parent) {
            Some((_, members)) => members.push(row),
            None => groups.push((parent, vec![row])),
        }
    }

    let mut splices = Vec::new();
    let mut written = 0;
    for (_, group) in &groups {
        let stamps: Vec<Stamp> = group.iter().map(|&r| Stamp::capture(&index, &*part, r)).collect();
        let mut block = Vec::new();
        for record in records {
            for stamp in &stamps {
                block.extend(stamp.render(part, |text| fill(text, markers, record)));
                written += 1;
            }
        }
        for (i, stamp) in stamps.iter().enumerate() {
            splices.push(Splice {
                start: stamp.start,
                end: stamp.end,
                events: if i == 0 { std::mem::take(&mut block) } else { Vec::new() },
            });
        }
    }
    apply_splices(part, splices);
    written
}

impl TemplateProcessor {
    /// Repeats each table row that mentions a field of `records[0]` once per record.
    pub fn replace_table(&mut self, records: &[Record]) -> Result<usize> {
        let r = self.replace_table_inner(records);
        self.report(r)
    }

    fn replace_table_inner(&mut self, records: &[Record]) -> Result<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        let markers: Vec<(String, String)> = first
            .keys()
            .map(|k| (k.to_string(), self.marker(k)))
            .collect();

        let main = self.main_part.clone();
        let part = load_part(&mut self.parts, &self.package, &main)?;
        let written = expand_rows(part, &markers, records);
        if written > 0 {
            self.dirty.insert(main);
        } else {
            self.log.info("no table row holds a marker of the supplied records");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use crate::docx::ns;
    use crate::docx::query::PartIndex;
    use crate::docx::xml::parse_xml_part;
    use crate::logging::MemoryLog;
    use crate::testutil::DocxBuilder;
    use crate::{Record, TemplateOptions, TemplateProcessor};

    fn cell(text: &str) -> String {
        format!("<w:tc><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:tc>")
    }

    fn row(cells: &[&str]) -> String {
        let cells: String = cells.iter().map(|c| cell(c)).collect();
        format!(r#"<w:tr><w:trPr><w:cantSplit/></w:trPr>{cells}</w:tr>"#)
    }

    fn session(body: &str) -> TemplateProcessor {
        TemplateProcessor::from_bytes(
            DocxBuilder::new().body(body).build(),
            TemplateOptions::default(),
            Box::new(MemoryLog::default()),
        )
        .expect("load")
    }

    fn row_texts(xml: &str) -> Vec<String> {
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        let index = PartIndex::build(&part);
        index
            .find(ns::W, "tr")
            .into_iter()
            .map(|tr| {
                index
                    .descendants(tr, ns::W, "t")
                    .into_iter()
                    .map(|t| index.text(&part, t))
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect()
    }

    #[test]
    fn rows_follow_record_order_and_zero_renders() {
        let body = format!(
            "<w:tbl>{}{}{}</w:tbl><w:p><w:r><w:t>after</w:t></w:r></w:p>",
            row(&["Name", "Qty"]),
            row(&["$name$", "$qty$"]),
            row(&["Total", ""])
        );
        let mut s = session(&body);
        let records = vec![
            Record::new().with("name", "A").with("qty", "0"),
            Record::new().with("name", "B").with("qty", 5i64),
        ];
        assert_eq!(s.replace_table(&records).expect("table"), 2);

        let xml = s.part_xml("word/document.xml").expect("xml");
        assert_eq!(row_texts(&xml), vec!["Name|Qty", "A|0", "B|5", "Total|"]);
        assert_eq!(xml.matches("<w:cantSplit/>").count(), 4);
        assert!(!xml.contains("$name$"));
        assert!(xml.contains("<w:t>after</w:t>"));
    }

    #[test]
    fn multi_row_block_repeats_per_record() {
        let body = format!(
            "<w:tbl>{}{}</w:tbl>",
            row(&["$name$"]),
            row(&["qty: $qty$"])
        );
        let mut s = session(&body);
        let records = vec![
            Record::new().with("name", "A").with("qty", 1i64),
            Record::new().with("name", "B"),
        ];
        assert_eq!(s.replace_table(&records).expect("table"), 4);
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert_eq!(row_texts(&xml), vec!["A", "qty: 1", "B", "qty: "]);
    }

    #[test]
    fn separate_tables_expand_independently() {
        let body = format!(
            "<w:tbl>{}</w:tbl><w:p/><w:tbl>{}{}</w:tbl>",
            row(&["$name$"]),
            row(&["fixed"]),
            row(&["$qty$"])
        );
        let mut s = session(&body);
        let records = vec![
            Record::new().with("name", "A").with("qty", 1i64),
            Record::new().with("name", "B").with("qty", 2i64),
        ];
        s.replace_table(&records).expect("table");
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert_eq!(row_texts(&xml), vec!["A", "B", "fixed", "1", "2"]);
    }

    #[test]
    fn empty_records_are_a_no_op() {
        let body = format!("<w:tbl>{}</w:tbl>", row(&["$name$"]));
        let mut s = session(&body);
        assert_eq!(s.replace_table(&[]).expect("table"), 0);
        assert!(s.part_xml("word/document.xml").expect("xml").contains("$name$"));
    }
}
