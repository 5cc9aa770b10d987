//! Chart data supplied by callers, chart plot kinds, and the collaborators that turn data into
//! cached chart points ([`format`]) and an embedded workbook ([`xlsx`]).

pub mod format;
pub mod xlsx;

use serde::Deserialize;

use crate::error::{Result, TemplateError};

#[derive(Clone, Debug, PartialEq)]
pub struct ChartRow {
    pub label: String,
    pub values: Vec<f64>,
}

/// Rows of `(category label, one value per series)` plus optional series names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartData {
    pub series: Vec<String>,
    pub rows: Vec<ChartRow>,
}

impl ChartData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-series data, e.g. `[("Jan", 1.0), ("Feb", 2.0)]`.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        let mut data = Self::new();
        for (label, value) in pairs {
            data = data.row(label, vec![value]);
        }
        data
    }

    pub fn with_series<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.series = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn row(mut self, label: impl Into<String>, values: Vec<f64>) -> Self {
        self.rows.push(ChartRow {
            label: label.into(),
            values,
        });
        self
    }

    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.values.len()).unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows.is_empty() {
            return Err(TemplateError::InvalidChartData("no data rows".to_string()));
        }
        let width = self.width();
        if width == 0 {
            return Err(TemplateError::InvalidChartData("rows carry no values".to_string()));
        }
        if let Some(bad) = self.rows.iter().find(|r| r.values.len() != width) {
            return Err(TemplateError::InvalidChartData(format!(
                "row {:?} has {} values, expected {width}",
                bad.label,
                bad.values.len()
            )));
        }
        if let Some(bad) = self.rows.iter().flat_map(|r| &r.values).find(|v| !v.is_finite()) {
            return Err(TemplateError::InvalidChartData(format!("non-finite value {bad}")));
        }
        Ok(())
    }
}

/// Accepts `{"legend": ["A", "B"], "Jan": [1, 2], "Feb": [3, 4]}`; single-series rows may use a
/// bare number.
impl<'de> Deserialize<'de> for ChartData {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RowValues {
            One(f64),
            Many(Vec<f64>),
        }

        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut data = ChartData::new();
        for (key, value) in map {
            if key == "legend" {
                data.series = Vec::<String>::deserialize(value).map_err(serde::de::Error::custom)?;
                continue;
            }
            let values = match RowValues::deserialize(value).map_err(serde::de::Error::custom)? {
                RowValues::One(v) => vec![v],
                RowValues::Many(vs) => vs,
            };
            data = data.row(key, values);
        }
        Ok(data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Bar3D,
    Line,
    Line3D,
    Area,
    Area3D,
    Pie,
    Pie3D,
    OfPie,
    Doughnut,
    Radar,
    Surface,
    Surface3D,
    Stock,
    Scatter,
    Bubble,
}

impl ChartKind {
    /// Maps the local name of a `c:plotArea` child such as `barChart`.
    pub fn from_plot_element(local: &str) -> Option<Self> {
        Some(match local {
            "barChart" => ChartKind::Bar,
            "bar3DChart" => ChartKind::Bar3D,
            "lineChart" => ChartKind::Line,
            "line3DChart" => ChartKind::Line3D,
            "areaChart" => ChartKind::Area,
            "area3DChart" => ChartKind::Area3D,
            "pieChart" => ChartKind::Pie,
            "pie3DChart" => ChartKind::Pie3D,
            "ofPieChart" => ChartKind::OfPie,
            "doughnutChart" => ChartKind::Doughnut,
            "radarChart" => ChartKind::Radar,
            "surfaceChart" => ChartKind::Surface,
            "surface3DChart" => ChartKind::Surface3D,
            "stockChart" => ChartKind::Stock,
            "scatterChart" => ChartKind::Scatter,
            "bubbleChart" => ChartKind::Bubble,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartData, ChartKind};

    #[test]
    fn deserializes_legend_and_rows_in_order() {
        let data: ChartData =
            serde_json::from_str(r#"{"legend": ["2023", "2024"], "Mar": [1, 2], "Jan": [3, 4]}"#)
                .expect("json");
        assert_eq!(data.series, vec!["2023", "2024"]);
        assert_eq!(data.labels(), vec!["Mar", "Jan"]);
        assert_eq!(data.rows[1].values, vec![3.0, 4.0]);
        data.validate().expect("valid");
    }

    #[test]
    fn ragged_rows_are_invalid() {
        let data = ChartData::new().row("a", vec![1.0, 2.0]).row("b", vec![3.0]);
        assert!(data.validate().is_err());
        assert!(ChartData::new().validate().is_err());
    }

    #[test]
    fn plot_kinds() {
        assert_eq!(ChartKind::from_plot_element("bar3DChart"), Some(ChartKind::Bar3D));
        assert_eq!(ChartKind::from_plot_element("layout"), None);
    }
}
