//! Marker repair: Word happily splits `$name$` over several runs (spell-check marks, revision
//! ids, partial formatting). Before any substitution each declared marker is pulled back into the
//! single `w:t` that holds its first character.

use std::collections::BTreeMap;

use regex::Regex;

use super::ns;
use super::query::{preserve_space_if_needed, set_text, PartIndex};
use super::xml::{attr_raw, parse_xml_part, write_xml_part, XmlPart};
use crate::error::{Result, TemplateError};

/// `w:t` element ids grouped by their nearest paragraph, in document order.
fn paragraph_text_nodes(index: &PartIndex) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for t in index.find(ns::W, "t") {
        if let Some(p) = index.ancestor(t, ns::W, "p") {
            groups.entry(p).or_default().push(t);
        }
    }
    groups
}

/// Merges every split occurrence of the named markers. Returns whether the part changed.
pub fn repair_part(part: &mut XmlPart, names: &[String], delimiter: &str) -> bool {
    let searches: Vec<String> = names
        .iter()
        .filter(|n| !n.is_empty())
        .map(|n| format!("{delimiter}{n}{delimiter}"))
        .collect();
    if searches.is_empty() {
        return false;
    }

    let index = PartIndex::build(part);
    let mut changed = false;
    for nodes in paragraph_text_nodes(&index).values() {
        if nodes.len() < 2 {
            continue;
        }
        let texts: Vec<String> = nodes.iter().map(|&t| index.text(part, t)).collect();
        let joined: String = texts.concat();
        let mut owner: Vec<usize> = Vec::with_capacity(joined.len());
        for (k, t) in texts.iter().enumerate() {
            owner.extend(std::iter::repeat(k).take(t.len()));
        }

        // receiver node -> donor nodes it absorbed text from
        let mut donors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for search in &searches {
            let mut from = 0;
            while let Some(pos) = joined[from..].find(search.as_str()) {
                let s = from + pos;
                let e = s + search.len();
                let receiver = owner[s];
                if owner[e - 1] != receiver {
                    let absorbed = donors.entry(receiver).or_default();
                    for o in &mut owner[s..e] {
                        if *o != receiver {
                            absorbed.push(*o);
                            *o = receiver;
                        }
                    }
                }
                from = e;
            }
        }
        if donors.is_empty() {
            continue;
        }

        let mut rebuilt: Vec<Vec<u8>> = vec![Vec::new(); nodes.len()];
        for (byte, k) in joined.bytes().zip(owner.iter()) {
            rebuilt[*k].push(byte);
        }
        for (k, bytes) in rebuilt.into_iter().enumerate() {
            let mut text = String::from_utf8_lossy(&bytes).into_owned();
            if text == texts[k] {
                continue;
            }
            let el = index.get(nodes[k]).clone();
            let preserved = attr_raw(&part.events[el.start], "xml:space") == Some("preserve");
            let flag = match donors.get(&k) {
                Some(ds) if !preserved => {
                    let inherits = ds.iter().any(|&d| {
                        attr_raw(&part.events[index.get(nodes[d]).start], "xml:space") == Some("preserve")
                    });
                    let flag = inherits || text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
                    // the run was not preserving, so its leading space was never rendered
                    if flag && text.starts_with(' ') {
                        text.remove(0);
                    }
                    flag
                }
                _ => false,
            };
            set_text(part, &el, &text);
            let start = &mut part.events[el.start];
            if flag {
                super::xml::set_attr_value(start, "xml:space", "preserve");
            } else {
                preserve_space_if_needed(start, &text);
            }
            changed = true;
        }
    }
    changed
}

/// String-level entry point: returns `xml` with every named marker made contiguous.
pub fn repair_markers(xml: &str, names: &[String], delimiter: &str) -> Result<String> {
    let mut part = parse_xml_part("<inline>", xml.as_bytes())?;
    if !repair_part(&mut part, names, delimiter) {
        return Ok(xml.to_string());
    }
    String::from_utf8(write_xml_part(&part)?).map_err(|e| TemplateError::malformed(&part.name, e))
}

/// Marker names present in the paragraph text of `part`, split or not, in first-seen order.
pub fn discover_markers(part: &XmlPart, delimiter: &str) -> Vec<String> {
    let d = regex::escape(delimiter);
    let Ok(re) = Regex::new(&format!(r"{d}(\w[\w.\-]*){d}")) else {
        return Vec::new();
    };
    let index = PartIndex::build(part);
    let mut found: Vec<String> = Vec::new();
    for nodes in paragraph_text_nodes(&index).values() {
        let joined: String = nodes.iter().map(|&t| index.text(part, t)).collect();
        for cap in re.captures_iter(&joined) {
            let name = cap[1].to_string();
            if !found.contains(&name) {
                found.push(name);
            }
        }
    }
    found
}
