use std::collections::BTreeSet;

use super::block::{apply_splices, outermost, Splice, Stamp};
use super::{load_part, TemplateProcessor};
use crate::docx::ns;
use crate::docx::query::PartIndex;
use crate::docx::xml::XmlPart;
use crate::error::Result;
use crate::value::TemplateValue;

fn expand_paragraphs(part: &mut XmlPart, search: &str, values: &[String]) -> usize {
    let index = PartIndex::build(part);
    let found: BTreeSet<usize> = index
        .text_nodes_containing(part, ns::W, "t", search)
        .into_iter()
        .filter_map(|(t, _)| index.ancestor(t, ns::W, "p"))
        .collect();
    let found: Vec<usize> = found.into_iter().collect();
    let paragraphs = outermost(&index, &found);

    let splices: Vec<Splice> = paragraphs
        .iter()
        .map(|&p| {
            let stamp = Stamp::capture(&index, &*part, p);
            let events = values
                .iter()
                .flat_map(|value| stamp.render(&*part, |text| text.replace(search, value)))
                .collect();
            Splice {
                start: stamp.start,
                end: stamp.end,
                events,
            }
        })
        .collect();
    let count = splices.len();
    apply_splices(part, splices);
    count
}

impl TemplateProcessor {
    /// Repeats each paragraph holding `$name$` once per value, in input order.
    pub fn replace_list<I>(&mut self, name: &str, values: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<TemplateValue>,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.into().render()).collect();
        let r = self.replace_list_inner(name, &values);
        self.report(r)
    }

    fn replace_list_inner(&mut self, name: &str, values: &[String]) -> Result<usize> {
        let search = self.marker(name);
        let mut total = 0;
        for part_name in self.working_set.clone() {
            let part = load_part(&mut self.parts, &self.package, &part_name)?;
            let n = expand_paragraphs(part, &search, values);
            if n > 0 {
                self.dirty.insert(part_name);
                total += n;
            }
        }
        Ok(total)
    }
}
