use once_cell::sync::Lazy;
use regex::Regex;

use super::{load_part, TemplateProcessor};
use crate::chart::format::formatter_for;
use crate::chart::xlsx::write_chart_workbook;
use crate::chart::{ChartData, ChartKind};
use crate::docx::content_types;
use crate::docx::ns;
use crate::docx::query::{set_text, PartIndex};
use crate::docx::rels::{resolve_target, Relationships};
use crate::error::{Result, TemplateError};
use crate::value::format_number;

static RID_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("rid digits regex"));

const NUM_POINTS: [(&str, &str); 4] = [
    (ns::C, "numRef"),
    (ns::C, "numCache"),
    (ns::C, "pt"),
    (ns::C, "v"),
];
const STR_POINTS: [(&str, &str); 4] = [
    (ns::C, "strRef"),
    (ns::C, "strCache"),
    (ns::C, "pt"),
    (ns::C, "v"),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChartOptions {
    /// Also rewrite cached category labels and series names.
    pub modify_legends: bool,
}

/// Replacement of the embedded workbook, computed before anything is written.
struct Twin {
    rel_id: String,
    old_part: String,
    new_part: String,
    target: String,
    bytes: Vec<u8>,
}

impl TemplateProcessor {
    /// Rewrites the cached points of the `chart_index`-th chart of the main document and
    /// regenerates its embedded workbook.
    pub fn replace_chart_data(&mut self, chart_index: usize, data: &ChartData, options: ChartOptions) -> Result<()> {
        let r = self.replace_chart_data_inner(chart_index, data, options);
        self.report(r)
    }

    fn replace_chart_data_inner(&mut self, chart_index: usize, data: &ChartData, options: ChartOptions) -> Result<()> {
        let main = self.main_part.clone();
        let refs: Vec<String> = {
            let doc = &*load_part(&mut self.parts, &self.package, &main)?;
            let index = PartIndex::build(doc);
            index
                .find(ns::C, "chart")
                .into_iter()
                .filter_map(|c| index.attr(doc, c, ns::R, "id"))
                .collect()
        };
        let rid = refs
            .get(chart_index)
            .cloned()
            .ok_or(TemplateError::ChartIndexOutOfRange {
                index: chart_index,
                available: refs.len(),
            })?;
        let chart_part = Relationships::load(&self.package, &main)?.part_for_id(&rid)?;

        let chart = load_part(&mut self.parts, &self.package, &chart_part)?;
        let index = PartIndex::build(chart);
        let unsupported = |kind: &str| TemplateError::UnsupportedChart {
            part: chart_part.clone(),
            kind: kind.to_string(),
        };
        let plot_area = *index
            .find(ns::C, "plotArea")
            .first()
            .ok_or_else(|| unsupported("no plot area"))?;
        let plot = index
            .children(plot_area)
            .map(|c| index.get(c))
            .find(|el| el.ns.as_deref() == Some(ns::C) && el.local.ends_with("Chart"))
            .ok_or_else(|| unsupported("no plot element"))?;
        let kind = ChartKind::from_plot_element(&plot.local).ok_or_else(|| unsupported(&plot.local))?;

        let formatter = formatter_for(kind);
        let formatted = formatter.prepare_data(data)?;

        let mut edits: Vec<(usize, String)> = Vec::new();
        for family in &formatted.families {
            let points: Vec<usize> = index
                .find(ns::C, family.tag)
                .into_iter()
                .flat_map(|el| index.path(el, &NUM_POINTS))
                .collect();
            if points.is_empty() && family.optional {
                continue;
            }
            if points.len() != family.values.len() {
                return Err(TemplateError::SeriesLengthMismatch {
                    part: chart_part.clone(),
                    tag: family.tag.to_string(),
                    expected: points.len(),
                    found: family.values.len(),
                });
            }
            edits.extend(points.into_iter().zip(family.values.iter().map(|v| format_number(*v))));
        }

        if options.modify_legends {
            let labels = data.labels();
            for cat in index.find(ns::C, "cat") {
                let points = index.path(cat, &STR_POINTS);
                if points.is_empty() {
                    continue;
                }
                if points.len() != labels.len() {
                    return Err(TemplateError::SeriesLengthMismatch {
                        part: chart_part.clone(),
                        tag: "cat".to_string(),
                        expected: points.len(),
                        found: labels.len(),
                    });
                }
                edits.extend(points.into_iter().zip(labels.iter().map(|l| l.to_string())));
            }
            for (ser, name) in index.find(ns::C, "ser").into_iter().zip(&data.series) {
                let tx = index.path(ser, &[(ns::C, "tx")]);
                if let Some(&v) = tx.iter().flat_map(|&t| index.path(t, &STR_POINTS)).collect::<Vec<_>>().first() {
                    edits.push((v, name.clone()));
                }
            }
        }

        let mut chart_rels = Relationships::load(&self.package, &chart_part)?;
        let twin = match chart_rels.resolve_by_type(ns::REL_PACKAGE).next() {
            Some(rel) if !rel.external => {
                let digits = RID_DIGITS
                    .find(&rid)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| (chart_index + 1).to_string());
                let target = format!("../embeddings/data{digits}.xlsx");
                Some(Twin {
                    rel_id: rel.id.clone(),
                    old_part: resolve_target(&chart_part, &rel.target),
                    new_part: resolve_target(&chart_part, &target),
                    target,
                    bytes: write_chart_workbook(&formatter.sheet_header(data), &data.rows)?,
                })
            }
            _ => None,
        };

        // Everything is validated; from here on the package changes.
        edits.sort_by(|a, b| index.get(b.0).start.cmp(&index.get(a.0).start));
        for (el, value) in &edits {
            set_text(chart, index.get(*el), value);
        }
        self.dirty.insert(chart_part.clone());

        match twin {
            Some(twin) => {
                chart_rels.set_target(&mut self.package, &twin.rel_id, &twin.target)?;
                content_types::rename_part(&mut self.package, &twin.old_part, &twin.new_part, ns::XLSX_CONTENT_TYPE)?;
                if twin.old_part != twin.new_part {
                    self.package.remove(&twin.old_part);
                }
                self.package.set(&twin.new_part, twin.bytes);
            }
            None => self
                .log
                .info(&format!("chart {chart_part} has no embedded workbook; only the cache was updated")),
        }
        Ok(())
    }
}
