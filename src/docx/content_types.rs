//! `[Content_Types].xml` upkeep for parts that the engines rename.

use super::ns;
use super::package::DocxPackage;
use super::query::PartIndex;
use super::xml::{attr_value, escape_attr, parse_xml_part, set_attr_value, write_xml_part, XmlEvent};
use crate::error::Result;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Moves the content type registration of `old_part` to `new_part`. Parts typed by extension
/// get a `Default` entry for the new extension when none exists.
pub fn rename_part(
    package: &mut DocxPackage,
    old_part: &str,
    new_part: &str,
    content_type: &str,
) -> Result<()> {
    let Some(bytes) = package.get(CONTENT_TYPES_PART) else {
        return Ok(());
    };
    let mut part = parse_xml_part(CONTENT_TYPES_PART, bytes)?;
    let index = PartIndex::build(&part);
    let old_name = format!("/{old_part}");
    let new_name = format!("/{new_part}");

    let overrides = index.find(ns::CONTENT_TYPES, "Override");
    let existing = overrides.iter().copied().find(|&id| {
        attr_value(&part.events[index.get(id).start], "PartName")
            .is_some_and(|p| p.eq_ignore_ascii_case(&old_name))
    });
    if let Some(id) = existing {
        set_attr_value(&mut part.events[index.get(id).start], "PartName", &new_name);
        package.set(CONTENT_TYPES_PART, write_xml_part(&part)?);
        return Ok(());
    }

    let ext = new_part.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    let has_default = index.find(ns::CONTENT_TYPES, "Default").into_iter().any(|id| {
        attr_value(&part.events[index.get(id).start], "Extension")
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    });
    if has_default || ext.is_empty() {
        return Ok(());
    }
    let Some(root) = index.find(ns::CONTENT_TYPES, "Types").first().copied() else {
        return Ok(());
    };
    let root_el = index.get(root);
    if root_el.start == root_el.end {
        return Ok(());
    }
    let prefix = root_el.prefix.as_deref().map(|p| format!("{p}:")).unwrap_or_default();
    part.events.insert(
        root_el.start + 1,
        XmlEvent::Empty {
            name: format!("{prefix}Default"),
            attrs: vec![
                ("Extension".to_string(), escape_attr(ext).into_owned()),
                ("ContentType".to_string(), escape_attr(content_type).into_owned()),
            ],
        },
    );
    package.set(CONTENT_TYPES_PART, write_xml_part(&part)?);
    Ok(())
}
