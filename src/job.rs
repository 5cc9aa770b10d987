//! JSON job files: everything one CLI run substitutes into a template.
//!
//! ```json
//! {
//!   "variables": ["customer"],
//!   "text": {"customer": "ACME", "total": 0},
//!   "lists": {"item": ["a", "b"]},
//!   "tables": [[{"name": "A", "qty": 1}, {"name": "B", "qty": 2}]],
//!   "images": {"logo": "logo.png"},
//!   "charts": [{"index": 0, "data": {"Jan": 1, "Feb": 2}, "modify_legends": true}],
//!   "checkboxes": {"agree": true}
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::chart::ChartData;
use crate::template::{ChartOptions, TemplateProcessor};
use crate::value::{Record, TemplateValue};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    /// Markers to repair at load time, on top of the configured ones.
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub text: Record,
    /// Replaced in the main document only, in one pass.
    #[serde(default)]
    pub multi_text: Record,
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<TemplateValue>>,
    #[serde(default)]
    pub tables: Vec<Vec<Record>>,
    #[serde(default)]
    pub images: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub charts: Vec<ChartJob>,
    #[serde(default)]
    pub checkboxes: BTreeMap<String, bool>,

    /// Directory relative image paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartJob {
    pub index: usize,
    pub data: ChartData,
    #[serde(default)]
    pub modify_legends: bool,
}

/// What a job changed, per engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobReport {
    pub text: usize,
    pub list_paragraphs: usize,
    pub table_rows: usize,
    pub images: usize,
    pub charts: usize,
    pub checkboxes: usize,
}

impl Job {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read job: {}", path.display()))?;
        let mut job: Job = serde_json::from_str(&text)
            .with_context(|| format!("parse job json: {}", path.display()))?;
        job.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(job)
    }

    fn image_path(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.base_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Runs every section against `session`, in a fixed order: text, multi_text, lists,
    /// tables, images, charts, checkboxes.
    pub fn apply(&self, session: &mut TemplateProcessor) -> anyhow::Result<JobReport> {
        let mut report = JobReport::default();

        for (name, value) in self.text.iter() {
            report.text += session
                .replace_text(name, value.clone())
                .with_context(|| format!("replace text {name}"))?;
        }
        if !self.multi_text.is_empty() {
            session
                .replace_multi_text(self.multi_text.iter().map(|(k, v)| (k, v.clone())))
                .context("replace multi text")?;
        }
        for (name, values) in &self.lists {
            report.list_paragraphs += session
                .replace_list(name, values.iter().cloned())
                .with_context(|| format!("replace list {name}"))?;
        }
        for (i, records) in self.tables.iter().enumerate() {
            report.table_rows += session
                .replace_table(records)
                .with_context(|| format!("replace table #{i}"))?;
        }
        for (name, path) in &self.images {
            let path = self.image_path(path);
            report.images += session
                .replace_image(name, &path)
                .with_context(|| format!("replace image {name} from {}", path.display()))?;
        }
        for chart in &self.charts {
            let options = ChartOptions {
                modify_legends: chart.modify_legends,
            };
            session
                .replace_chart_data(chart.index, &chart.data, options)
                .with_context(|| format!("replace chart #{}", chart.index))?;
            report.charts += 1;
        }
        if !self.checkboxes.is_empty() {
            report.checkboxes += session
                .set_checkbox(self.checkboxes.iter().map(|(k, v)| (k, *v)))
                .context("set checkboxes")?;
        }
        Ok(report)
    }
}
