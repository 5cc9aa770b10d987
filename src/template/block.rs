//! Block cloning shared by table rows and list paragraphs.

use crate::docx::ns;
use crate::docx::query::{preserve_space_if_needed, PartIndex};
use crate::docx::xml::{XmlEvent, XmlPart};

/// A template block captured from a part: its event range plus the offsets of every `w:t`
/// start event and the text event inside it, relative to the block start.
pub(crate) struct Stamp {
    pub start: usize,
    pub end: usize,
    texts: Vec<(usize, usize)>,
}

impl Stamp {
    pub fn capture(index: &PartIndex, part: &XmlPart, id: usize) -> Self {
        let el = index.get(id);
        let texts = index
            .descendants(id, ns::W, "t")
            .into_iter()
            .filter_map(|t| {
                let text = index.text_event(part, t)?;
                Some((index.get(t).start - el.start, text - el.start))
            })
            .collect();
        Self {
            start: el.start,
            end: el.end,
            texts,
        }
    }

    /// A copy of the block with `substitute` applied to every run text.
    pub fn render(&self, part: &XmlPart, substitute: impl Fn(&str) -> String) -> Vec<XmlEvent> {
        let mut events = part.events[self.start..=self.end].to_vec();
        for &(t_start, t_text) in &self.texts {
            let XmlEvent::Text { text } = &events[t_text] else {
                continue;
            };
            let replaced = substitute(text);
            if replaced == *text {
                continue;
            }
            preserve_space_if_needed(&mut events[t_start], &replaced);
            events[t_text] = XmlEvent::Text { text: replaced };
        }
        events
    }
}

/// Drops ids nested inside another id of the set. `ids` must be sorted.
pub(crate) fn outermost(index: &PartIndex, ids: &[usize]) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::new();
    for &id in ids {
        let el = index.get(id);
        let nested = kept.last().is_some_and(|&k| {
            let outer = index.get(k);
            outer.start < el.start && el.end <= outer.end
        });
        if !nested {
            kept.push(id);
        }
    }
    kept
}

pub(crate) struct Splice {
    pub start: usize,
    pub end: usize,
    pub events: Vec<XmlEvent>,
}

/// Applies non-overlapping splices back to front so earlier offsets stay valid.
pub(crate) fn apply_splices(part: &mut XmlPart, mut splices: Vec<Splice>) {
    splices.sort_by(|a, b| b.start.cmp(&a.start));
    for s in splices {
        part.events.splice(s.start..=s.end, s.events);
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_splices, outermost, Splice, Stamp};
    use crate::docx::ns;
    use crate::docx::query::PartIndex;
    use crate::docx::xml::{parse_xml_part, write_xml_part};

    const XML: &str = r#"<w:body xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:p><w:r><w:t>a $x$</w:t></w:r></w:p><w:p><w:r><w:t>tail</w:t></w:r></w:p></w:body>"#;

    #[test]
    fn stamp_renders_substituted_copy_and_splices() {
        let mut part = parse_xml_part("t.xml", XML.as_bytes()).expect("parse");
        let index = PartIndex::build(&part);
        let paragraphs = index.find(ns::W, "p");
        assert_eq!(outermost(&index, &paragraphs), paragraphs);

        let stamp = Stamp::capture(&index, &part, paragraphs[0]);
        let mut events = stamp.render(&part, |t| t.replace("$x$", "1"));
        events.extend(stamp.render(&part, |t| t.replace("$x$", "2 ")));
        apply_splices(
            &mut part,
            vec![Splice {
                start: stamp.start,
                end: stamp.end,
                events,
            }],
        );
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains(r#"<w:p><w:r><w:t>a 1</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">a 2 </w:t></w:r></w:p><w:p><w:r><w:t>tail"#), "{out}");
    }
}
