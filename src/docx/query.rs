//! Namespace-aware element index over an [`XmlPart`].
//!
//! Every engine looks nodes up through [`PartIndex`] instead of matching literal prefixes, so a
//! template that binds the wordprocessing namespace to something other than `w:` still works.
//! Element ids are assigned in document order; the descendants of an element are therefore the
//! contiguous id range that follows it.
//!
//! The index borrows nothing: after a mutation that changes the event count it must be rebuilt.

use super::ns;
use super::xml::{XmlEvent, XmlPart};

#[derive(Clone, Debug)]
pub struct Element {
    /// Event index of the `Start`/`Empty` event.
    pub start: usize,
    /// Event index of the matching `End` event (equal to `start` for empty elements).
    pub end: usize,
    pub parent: Option<usize>,
    pub prefix: Option<String>,
    pub local: String,
    pub ns: Option<String>,
    scope: usize,
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<usize>,
    bindings: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct PartIndex {
    elements: Vec<Element>,
    scopes: Vec<Scope>,
}

impl PartIndex {
    pub fn build(part: &XmlPart) -> Self {
        let mut index = PartIndex {
            elements: Vec::new(),
            scopes: vec![Scope::default()],
        };
        let mut stack: Vec<usize> = Vec::new();

        for (i, ev) in part.events.iter().enumerate() {
            match ev {
                XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                    let parent = stack.last().copied();
                    let parent_scope = parent.map(|p| index.elements[p].scope).unwrap_or(0);
                    let bindings: Vec<(String, String)> = attrs
                        .iter()
                        .filter_map(|(k, v)| {
                            if k == "xmlns" {
                                Some((String::new(), v.clone()))
                            } else {
                                k.strip_prefix("xmlns:").map(|p| (p.to_string(), v.clone()))
                            }
                        })
                        .collect();
                    let scope = if bindings.is_empty() {
                        parent_scope
                    } else {
                        index.scopes.push(Scope {
                            parent: Some(parent_scope),
                            bindings,
                        });
                        index.scopes.len() - 1
                    };
                    let (prefix, local) = split_qname(name);
                    let ns = index
                        .lookup(scope, prefix.unwrap_or(""))
                        .map(|s| s.to_string());
                    index.elements.push(Element {
                        start: i,
                        end: i,
                        parent,
                        prefix: prefix.map(|p| p.to_string()),
                        local: local.to_string(),
                        ns,
                        scope,
                    });
                    if matches!(ev, XmlEvent::Start { .. }) {
                        stack.push(index.elements.len() - 1);
                    }
                }
                XmlEvent::End { .. } => {
                    if let Some(id) = stack.pop() {
                        index.elements[id].end = i;
                    }
                }
                _ => {}
            }
        }
        index
    }

    fn lookup(&self, mut scope: usize, prefix: &str) -> Option<&str> {
        loop {
            let s = &self.scopes[scope];
            if let Some((_, uri)) = s.bindings.iter().rev().find(|(p, _)| p == prefix) {
                return Some(uri.as_str());
            }
            match s.parent {
                Some(p) => scope = p,
                None => break,
            }
        }
        if prefix.is_empty() {
            None
        } else {
            ns::well_known(prefix)
        }
    }

    pub fn get(&self, id: usize) -> &Element {
        &self.elements[id]
    }

    pub fn is(&self, id: usize, ns: &str, local: &str) -> bool {
        let el = &self.elements[id];
        el.local == local && el.ns.as_deref() == Some(ns)
    }

    /// All elements named `{ns}local`, in document order.
    pub fn find(&self, ns: &str, local: &str) -> Vec<usize> {
        (0..self.elements.len())
            .filter(|&id| self.is(id, ns, local))
            .collect()
    }

    fn descendant_ids(&self, id: usize) -> std::ops::Range<usize> {
        let end = self.elements[id].end;
        let mut last = id + 1;
        while last < self.elements.len() && self.elements[last].start < end {
            last += 1;
        }
        id + 1..last
    }

    pub fn descendants(&self, id: usize, ns: &str, local: &str) -> Vec<usize> {
        self.descendant_ids(id)
            .filter(|&d| self.is(d, ns, local))
            .collect()
    }

    pub fn first_descendant(&self, id: usize, ns: &str, local: &str) -> Option<usize> {
        self.descendant_ids(id).find(|&d| self.is(d, ns, local))
    }

    pub fn children(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.descendant_ids(id)
            .filter(move |&d| self.elements[d].parent == Some(id))
    }

    pub fn child(&self, id: usize, ns: &str, local: &str) -> Option<usize> {
        self.children(id).find(|&c| self.is(c, ns, local))
    }

    /// Follows a chain of child names, returning every element at the end of the path.
    pub fn path(&self, id: usize, steps: &[(&str, &str)]) -> Vec<usize> {
        let mut current = vec![id];
        for (ns, local) in steps {
            current = current
                .into_iter()
                .flat_map(|c| {
                    self.children(c)
                        .filter(|&k| self.is(k, ns, local))
                        .collect::<Vec<_>>()
                })
                .collect();
        }
        current
    }

    /// Nearest proper ancestor named `{ns}local`.
    pub fn ancestor(&self, id: usize, ns: &str, local: &str) -> Option<usize> {
        let mut cur = self.elements[id].parent;
        while let Some(p) = cur {
            if self.is(p, ns, local) {
                return Some(p);
            }
            cur = self.elements[p].parent;
        }
        None
    }

    /// Qualified attribute key on element `id` for `{ns}local` as written in the part.
    pub fn attr_key<'p>(&self, part: &'p XmlPart, id: usize, ns: &str, local: &str) -> Option<&'p str> {
        let el = &self.elements[id];
        let attrs = part.events[el.start].attrs()?;
        attrs.iter().map(|(k, _)| k.as_str()).find(|k| {
            let (prefix, name) = split_qname(k);
            match prefix {
                Some(p) if p != "xmlns" => name == local && self.lookup(el.scope, p) == Some(ns),
                _ => false,
            }
        })
    }

    /// Unescaped value of the namespaced attribute `{ns}local`.
    pub fn attr(&self, part: &XmlPart, id: usize, ns: &str, local: &str) -> Option<String> {
        let key = self.attr_key(part, id, ns, local)?;
        super::xml::attr_value(&part.events[self.elements[id].start], key)
    }

    /// A prefix bound to `ns` in the scope of element `id`.
    pub fn prefix_for(&self, id: usize, ns: &str) -> Option<String> {
        let mut scope = Some(self.elements[id].scope);
        while let Some(s) = scope {
            let sc = &self.scopes[s];
            if let Some((p, _)) = sc.bindings.iter().find(|(p, uri)| uri == ns && !p.is_empty()) {
                return Some(p.clone());
            }
            scope = sc.parent;
        }
        self.elements[id].prefix.clone().filter(|_| self.elements[id].ns.as_deref() == Some(ns))
    }

    /// Text content of an element without child elements.
    pub fn text(&self, part: &XmlPart, id: usize) -> String {
        let el = &self.elements[id];
        let mut out = String::new();
        for ev in &part.events[el.start..=el.end] {
            if let XmlEvent::Text { text } | XmlEvent::CData { text } = ev {
                out.push_str(text);
            }
        }
        out
    }

    /// Event index of the first text event directly inside a leaf element.
    pub fn text_event(&self, part: &XmlPart, id: usize) -> Option<usize> {
        let el = &self.elements[id];
        (el.start + 1..el.end).find(|&i| matches!(part.events[i], XmlEvent::Text { .. }))
    }

    /// Leaf text nodes `{ns}local` whose text contains `pattern`, as (element id, event index).
    pub fn text_nodes_containing(
        &self,
        part: &XmlPart,
        ns: &str,
        local: &str,
        pattern: &str,
    ) -> Vec<(usize, usize)> {
        self.find(ns, local)
            .into_iter()
            .filter_map(|id| {
                let ev = self.text_event(part, id)?;
                match &part.events[ev] {
                    XmlEvent::Text { text } if text.contains(pattern) => Some((id, ev)),
                    _ => None,
                }
            })
            .collect()
    }
}

pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, name),
    }
}

/// Replaces the text of a leaf element. Returns the change in event count (0 when an existing
/// text event was rewritten); callers that get a non-zero delta must rebuild their index.
pub fn set_text(part: &mut XmlPart, el: &Element, value: &str) -> isize {
    if el.start == el.end {
        let XmlEvent::Empty { name, attrs } = part.events[el.start].clone() else {
            return 0;
        };
        let replacement = vec![
            XmlEvent::Start {
                name: name.clone(),
                attrs,
            },
            XmlEvent::Text {
                text: value.to_string(),
            },
            XmlEvent::End { name },
        ];
        part.events.splice(el.start..=el.start, replacement);
        return 2;
    }
    let mut written = false;
    for i in el.start + 1..el.end {
        if let XmlEvent::Text { text } = &mut part.events[i] {
            if written {
                text.clear();
            } else {
                *text = value.to_string();
                written = true;
            }
        }
    }
    if written {
        return 0;
    }
    part.events.insert(
        el.start + 1,
        XmlEvent::Text {
            text: value.to_string(),
        },
    );
    1
}

/// Marks a `w:t` start event with `xml:space="preserve"` when `text` needs it.
pub fn preserve_space_if_needed(ev: &mut XmlEvent, text: &str) {
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        super::xml::set_attr_value(ev, "xml:space", "preserve");
    }
}

#[cfg(test)]
mod tests {
    use super::{set_text, PartIndex};
    use crate::docx::ns;
    use crate::docx::xml::{parse_xml_part, write_xml_part};

    const DOC: &str = r#"<x:document xmlns:x="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><x:body><x:p><x:r><x:t>one</x:t></x:r><x:r><x:t/></x:r></x:p><x:tbl><x:tr><x:tc><x:p r:id="rId4"><x:r><x:t>two</x:t></x:r></x:p></x:tc></x:tr></x:tbl></x:body></x:document>"#;

    #[test]
    fn resolves_non_default_prefixes() {
        let part = parse_xml_part("word/document.xml", DOC.as_bytes()).expect("parse");
        let idx = PartIndex::build(&part);
        let texts = idx.find(ns::W, "t");
        assert_eq!(texts.len(), 3);
        assert_eq!(idx.text(&part, texts[0]), "one");

        let tr = idx.ancestor(texts[2], ns::W, "tr").expect("row");
        assert!(idx.is(tr, ns::W, "tr"));
        assert_eq!(idx.descendants(tr, ns::W, "t"), vec![texts[2]]);

        let p = idx.ancestor(texts[2], ns::W, "p").expect("paragraph");
        assert_eq!(idx.attr(&part, p, ns::R, "id").as_deref(), Some("rId4"));
        assert_eq!(idx.path(tr, &[(ns::W, "tc"), (ns::W, "p")]), vec![p]);
    }

    #[test]
    fn set_text_expands_empty_elements() {
        let mut part = parse_xml_part("word/document.xml", DOC.as_bytes()).expect("parse");
        let idx = PartIndex::build(&part);
        let empty_t = idx.find(ns::W, "t")[1];
        let delta = set_text(&mut part, idx.get(empty_t), "added");
        assert_eq!(delta, 2);
        let out = String::from_utf8(write_xml_part(&part).expect("write")).expect("utf8");
        assert!(out.contains("<x:t>added</x:t>"));
    }
}
