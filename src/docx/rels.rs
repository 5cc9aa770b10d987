//! Relationship graph: one [`Relationships`] per source part, parsed from its `_rels/*.rels`.

use std::collections::HashSet;

use super::ns;
use super::package::DocxPackage;
use super::query::PartIndex;
use super::xml::{attr_value, parse_xml_part, set_attr_value, write_xml_part, XmlPart};
use crate::error::{Result, TemplateError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

#[derive(Clone, Debug)]
pub struct Relationships {
    /// Part the relationships belong to, e.g. `word/document.xml`.
    pub source: String,
    /// The `.rels` part itself, e.g. `word/_rels/document.xml.rels`.
    pub rels_part: String,
    pub entries: Vec<Relationship>,
}

pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolves a relationship target against the directory of its source part.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if let Some(abs) = target.strip_prefix('/') {
        return normalize(abs);
    }
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

impl Relationships {
    pub fn parse(source: &str, rels: &XmlPart) -> Result<Self> {
        let index = PartIndex::build(rels);
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();
        for id in index.find(ns::PKG_RELS, "Relationship") {
            let ev = &rels.events[index.get(id).start];
            let field = |key: &str| {
                attr_value(ev, key).ok_or_else(|| {
                    TemplateError::malformed(&rels.name, format!("Relationship missing {key}"))
                })
            };
            let rel = Relationship {
                id: field("Id")?,
                rel_type: field("Type")?,
                target: field("Target")?,
                external: attr_value(ev, "TargetMode").as_deref() == Some("External"),
            };
            if !seen.insert(rel.id.clone()) {
                return Err(TemplateError::malformed(
                    &rels.name,
                    format!("duplicate relationship id {}", rel.id),
                ));
            }
            entries.push(rel);
        }
        Ok(Self {
            source: source.to_string(),
            rels_part: rels.name.clone(),
            entries,
        })
    }

    /// Loads the relationships of `source`; a part without a `.rels` sibling has none.
    pub fn load(package: &DocxPackage, source: &str) -> Result<Self> {
        let rels_part = rels_path_for(source);
        match package.get(&rels_part) {
            Some(bytes) => Self::parse(source, &parse_xml_part(&rels_part, bytes)?),
            None => Ok(Self {
                source: source.to_string(),
                rels_part,
                entries: Vec::new(),
            }),
        }
    }

    pub fn resolve_by_id(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn resolve_by_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.entries.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// Package path of an internal relationship's target.
    pub fn target_part(&self, rel: &Relationship) -> Option<String> {
        (!rel.external).then(|| resolve_target(&self.source, &rel.target))
    }

    /// Resolves `id` all the way to a package path, failing on dangling or external targets.
    pub fn part_for_id(&self, id: &str) -> Result<String> {
        let rel = self.resolve_by_id(id).ok_or_else(|| {
            TemplateError::unresolved(&self.rels_part, format!("no relationship {id}"))
        })?;
        self.target_part(rel).ok_or_else(|| {
            TemplateError::unresolved(&self.rels_part, format!("relationship {id} is external"))
        })
    }

    /// Rewrites the `Target` of relationship `id` in the package, keeping the id.
    pub fn set_target(&mut self, package: &mut DocxPackage, id: &str, target: &str) -> Result<()> {
        let bytes = package.get(&self.rels_part).ok_or_else(|| {
            TemplateError::unresolved(&self.source, format!("missing {}", self.rels_part))
        })?;
        let mut part = parse_xml_part(&self.rels_part, bytes)?;
        let index = PartIndex::build(&part);
        let found = index.find(ns::PKG_RELS, "Relationship").into_iter().find(|&el| {
            attr_value(&part.events[index.get(el).start], "Id").as_deref() == Some(id)
        });
        let el = found.ok_or_else(|| {
            TemplateError::unresolved(&self.rels_part, format!("no relationship {id}"))
        })?;
        set_attr_value(&mut part.events[index.get(el).start], "Target", target);
        package.set(&self.rels_part, write_xml_part(&part)?);

        if let Some(rel) = self.entries.iter_mut().find(|r| r.id == id) {
            rel.target = target.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{rels_path_for, resolve_target, Relationships};
    use crate::docx::ns;
    use crate::docx::package::DocxPackage;
    use crate::docx::xml::parse_xml_part;
    use crate::testutil::DocxBuilder;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/>
</Relationships>"#;

    #[test]
    fn rels_paths() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for("word/charts/chart1.xml"), "word/charts/_rels/chart1.xml.rels");
        assert_eq!(
            resolve_target("word/charts/chart1.xml", "../embeddings/data1.xlsx"),
            "word/embeddings/data1.xlsx"
        );
        assert_eq!(resolve_target("word/document.xml", "/word/media/a.png"), "word/media/a.png");
    }

    #[test]
    fn parses_and_resolves() {
        let part = parse_xml_part("word/_rels/document.xml.rels", RELS.as_bytes()).expect("parse");
        let rels = Relationships::parse("word/document.xml", &part).expect("rels");
        assert_eq!(rels.entries.len(), 3);
        let hf: Vec<&str> = rels
            .entries
            .iter()
            .filter(|r| r.rel_type == ns::REL_HEADER || r.rel_type == ns::REL_FOOTER)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(hf, vec!["rId1", "rId3"]);
        assert_eq!(rels.part_for_id("rId1").expect("header"), "word/header1.xml");
        assert_eq!(rels.resolve_by_id("rId2").expect("link").target, "https://example.com/?a=1&b=2");
        assert!(rels.part_for_id("rId2").is_err());
        assert!(rels.part_for_id("rId9").is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dup = RELS.replace("rId3", "rId1");
        let part = parse_xml_part("x.rels", dup.as_bytes()).expect("parse");
        assert!(Relationships::parse("word/document.xml", &part).is_err());
    }

    #[test]
    fn set_target_keeps_id() {
        let bytes = DocxBuilder::new()
            .part("word/_rels/document.xml.rels", RELS.as_bytes().to_vec())
            .build();
        let mut pkg = DocxPackage::from_bytes(bytes).expect("pkg");
        let mut rels = Relationships::load(&pkg, "word/document.xml").expect("rels");
        rels.set_target(&mut pkg, "rId3", "footer9.xml").expect("set");
        let reloaded = Relationships::load(&pkg, "word/document.xml").expect("reload");
        assert_eq!(reloaded.entries, rels.entries);
        assert_eq!(reloaded.part_for_id("rId3").expect("footer"), "word/footer9.xml");
    }
}
