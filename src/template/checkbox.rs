use super::{load_part, TemplateProcessor};
use crate::docx::ns;
use crate::docx::query::{set_text, PartIndex};
use crate::docx::xml::{set_attr_value, XmlEvent, XmlPart};
use crate::error::Result;

const CHECKED_GLYPH: char = '\u{2612}';
const UNCHECKED_GLYPH: char = '\u{2610}';

enum Edit {
    Attr { event: usize, key: String, value: String },
    Text { el: usize, value: String },
    /// New first child of element `el`.
    Prepend { el: usize, child: XmlEvent },
}

/// Qualified `val` attribute key for `{ns}val` on `el`, existing or not.
fn val_key(index: &PartIndex, part: &XmlPart, el: usize, ns: &str) -> Option<String> {
    index
        .attr_key(part, el, ns, "val")
        .map(str::to_string)
        .or_else(|| index.prefix_for(el, ns).map(|p| format!("{p}:val")))
}

fn set_val(edits: &mut Vec<Edit>, index: &PartIndex, part: &XmlPart, el: usize, ns: &str, value: &str) {
    if let Some(key) = val_key(index, part, el, ns) {
        edits.push(Edit::Attr {
            event: index.get(el).start,
            key,
            value: value.to_string(),
        });
    }
}

/// Glyph declared by `w14:checkedState`/`w14:uncheckedState` as a hex code point.
fn declared_glyph(index: &PartIndex, part: &XmlPart, checkbox: usize, state: &str) -> Option<char> {
    let el = index.child(checkbox, ns::W14, state)?;
    let hex = index.attr(part, el, ns::W14, "val")?;
    u32::from_str_radix(hex.trim(), 16).ok().and_then(char::from_u32)
}

/// Legacy form fields matched by `w:statusText`.
fn plan_legacy(edits: &mut Vec<Edit>, index: &PartIndex, part: &XmlPart, marker: &str, checked: bool) -> usize {
    let value = if checked { "1" } else { "0" };
    let mut fields = 0;
    for ff in index.find(ns::W, "ffData") {
        let status = index
            .child(ff, ns::W, "statusText")
            .and_then(|s| index.attr(part, s, ns::W, "val"));
        if status.as_deref() != Some(marker) {
            continue;
        }
        let Some(checkbox) = index.child(ff, ns::W, "checkBox") else {
            continue;
        };
        for state in ["default", "checked"] {
            if let Some(el) = index.child(checkbox, ns::W, state) {
                set_val(edits, index, part, el, ns::W, value);
            }
        }
        fields += 1;
    }
    fields
}

/// Content-control checkboxes matched by `w:tag`.
fn plan_sdt(edits: &mut Vec<Edit>, index: &PartIndex, part: &XmlPart, marker: &str, checked: bool) -> usize {
    let mut fields = 0;
    for pr in index.find(ns::W, "sdtPr") {
        let tag = index
            .child(pr, ns::W, "tag")
            .and_then(|t| index.attr(part, t, ns::W, "val"));
        if tag.as_deref() != Some(marker) {
            continue;
        }
        let Some(checkbox) = index.child(pr, ns::W14, "checkbox") else {
            continue;
        };
        let state = if checked { "1" } else { "0" };
        match index.child(checkbox, ns::W14, "checked") {
            Some(el) => set_val(edits, index, part, el, ns::W14, state),
            None => {
                if let Some(p) = index.prefix_for(checkbox, ns::W14) {
                    edits.push(Edit::Prepend {
                        el: checkbox,
                        child: XmlEvent::Empty {
                            name: format!("{p}:checked"),
                            attrs: vec![(format!("{p}:val"), state.to_string())],
                        },
                    });
                }
            }
        }

        let glyph = if checked {
            declared_glyph(index, part, checkbox, "checkedState").unwrap_or(CHECKED_GLYPH)
        } else {
            declared_glyph(index, part, checkbox, "uncheckedState").unwrap_or(UNCHECKED_GLYPH)
        };
        let shown = index
            .get(pr)
            .parent
            .and_then(|sdt| index.child(sdt, ns::W, "sdtContent"))
            .and_then(|content| index.first_descendant(content, ns::W, "t"));
        if let Some(t) = shown {
            edits.push(Edit::Text {
                el: t,
                value: glyph.to_string(),
            });
        }
        fields += 1;
    }
    fields
}

fn prepend_child(part: &mut XmlPart, start: usize, end: usize, child: XmlEvent) {
    if start == end {
        if let XmlEvent::Empty { name, attrs } = part.events[start].clone() {
            part.events[start] = XmlEvent::Start {
                name: name.clone(),
                attrs,
            };
            part.events.splice(start + 1..start + 1, [child, XmlEvent::End { name }]);
        }
        return;
    }
    part.events.insert(start + 1, child);
}

fn apply(part: &mut XmlPart, index: &PartIndex, edits: Vec<Edit>) {
    let mut shifting: Vec<Edit> = Vec::new();
    for edit in edits {
        match edit {
            Edit::Attr { event, key, value } => set_attr_value(&mut part.events[event], &key, &value),
            other => shifting.push(other),
        }
    }
    let start_of = |e: &Edit| match e {
        Edit::Attr { event, .. } => *event,
        Edit::Text { el, .. } | Edit::Prepend { el, .. } => index.get(*el).start,
    };
    shifting.sort_by_key(|e| std::cmp::Reverse(start_of(e)));
    for edit in shifting {
        match edit {
            Edit::Text { el, value } => {
                set_text(part, index.get(el), &value);
            }
            Edit::Prepend { el, child } => {
                let el = index.get(el);
                prepend_child(part, el.start, el.end, child);
            }
            Edit::Attr { .. } => {}
        }
    }
}

impl TemplateProcessor {
    /// Sets each named checkbox of the main document. Returns the number of fields changed.
    pub fn set_checkbox<I, K>(&mut self, states: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        let states: Vec<(String, bool)> = states
            .into_iter()
            .map(|(k, v)| (self.marker(k.as_ref()), v))
            .collect();
        let r = self.set_checkbox_inner(&states);
        self.report(r)
    }

    fn set_checkbox_inner(&mut self, states: &[(String, bool)]) -> Result<usize> {
        let main = self.main_part.clone();
        let part = load_part(&mut self.parts, &self.package, &main)?;
        let index = PartIndex::build(part);

        let mut edits = Vec::new();
        let mut fields = 0;
        for (marker, checked) in states {
            fields += plan_legacy(&mut edits, &index, part, marker, *checked);
            fields += plan_sdt(&mut edits, &index, part, marker, *checked);
        }
        if edits.is_empty() {
            return Ok(fields);
        }
        apply(part, &index, edits);
        self.dirty.insert(main);
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use crate::logging::MemoryLog;
    use crate::testutil::DocxBuilder;
    use crate::{TemplateOptions, TemplateProcessor};

    const SDT: &str = r#"<w:p><w:sdt><w:sdtPr><w:tag w:val="$agree$"/><w14:checkbox><w14:checked w14:val="0"/><w14:checkedState w14:val="2612" w14:font="MS Gothic"/><w14:uncheckedState w14:val="2610" w14:font="MS Gothic"/></w14:checkbox></w:sdtPr><w:sdtContent><w:r><w:rPr><w:rFonts w:ascii="MS Gothic"/></w:rPr><w:t>☐</w:t></w:r></w:sdtContent></w:sdt><w:r><w:t> I agree</w:t></w:r></w:p>"#;

    const LEGACY: &str = r#"<w:p><w:r><w:fldChar w:fldCharType="begin"><w:ffData><w:name w:val="Check1"/><w:enabled/><w:statusText w:type="text" w:val="$news$"/><w:checkBox><w:sizeAuto/><w:default w:val="0"/></w:checkBox></w:ffData></w:fldChar></w:r><w:r><w:instrText xml:space="preserve"> FORMCHECKBOX </w:instrText></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#;

    fn session(body: &str) -> TemplateProcessor {
        TemplateProcessor::from_bytes(
            DocxBuilder::new().body(body).build(),
            TemplateOptions::default(),
            Box::new(MemoryLog::default()),
        )
        .expect("load")
    }

    #[test]
    fn sdt_checkbox_toggles_state_and_glyph() {
        let mut s = session(SDT);
        assert_eq!(s.set_checkbox([("agree", true)]).expect("check"), 1);
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert!(xml.contains(r#"<w14:checked w14:val="1"/>"#));
        assert!(xml.contains("<w:t>\u{2612}</w:t>"));

        s.set_checkbox([("agree", false)]).expect("uncheck");
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert!(xml.contains(r#"<w14:checked w14:val="0"/>"#));
        assert!(xml.contains("<w:t>\u{2610}</w:t>"));
        assert!(xml.contains("<w:t> I agree</w:t>"));
    }

    #[test]
    fn missing_checked_state_is_added() {
        let body = SDT.replace(r#"<w14:checked w14:val="0"/>"#, "");
        let mut s = session(&body);
        assert_eq!(s.set_checkbox([("agree", true)]).expect("check"), 1);
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert!(
            xml.contains(r#"<w14:checkbox><w14:checked w14:val="1"/><w14:checkedState"#),
            "{xml}"
        );
        assert!(xml.contains("<w:t>\u{2612}</w:t>"));

        s.set_checkbox([("agree", false)]).expect("uncheck");
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert_eq!(xml.matches("w14:checked ").count(), 1);
        assert!(xml.contains(r#"<w14:checked w14:val="0"/>"#));
    }

    #[test]
    fn empty_checkbox_element_gets_a_state_child() {
        let body = r#"<w:sdt><w:sdtPr><w:tag w:val="$agree$"/><w14:checkbox/></w:sdtPr><w:sdtContent><w:r><w:t>☐</w:t></w:r></w:sdtContent></w:sdt>"#;
        let mut s = session(&format!("<w:p>{body}</w:p>"));
        s.set_checkbox([("agree", true)]).expect("check");
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert!(xml.contains(r#"<w14:checkbox><w14:checked w14:val="1"/></w14:checkbox>"#), "{xml}");
        assert!(xml.contains("<w:t>\u{2612}</w:t>"));
    }

    #[test]
    fn declared_glyphs_win() {
        let body = SDT.replace(r#"w14:checkedState w14:val="2612""#, r#"w14:checkedState w14:val="2714""#);
        let mut s = session(&body);
        s.set_checkbox([("agree", true)]).expect("check");
        assert!(s.part_xml("word/document.xml").expect("xml").contains("<w:t>\u{2714}</w:t>"));
    }

    #[test]
    fn legacy_field_sets_default() {
        let mut s = session(LEGACY);
        assert_eq!(s.set_checkbox([("news", true)]).expect("check"), 1);
        assert!(s
            .part_xml("word/document.xml")
            .expect("xml")
            .contains(r#"<w:default w:val="1"/>"#));
        s.set_checkbox([("news", false)]).expect("uncheck");
        assert!(s
            .part_xml("word/document.xml")
            .expect("xml")
            .contains(r#"<w:default w:val="0"/>"#));
    }

    #[test]
    fn unknown_names_are_no_ops() {
        let mut s = session(&format!("{SDT}{LEGACY}"));
        assert_eq!(s.set_checkbox([("other", true)]).expect("check"), 0);
        let xml = s.part_xml("word/document.xml").expect("xml");
        assert!(xml.contains(r#"<w14:checked w14:val="0"/>"#));
        assert!(xml.contains(r#"<w:default w:val="0"/>"#));
    }
}
