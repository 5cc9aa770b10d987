use super::{ChartData, ChartKind};
use crate::error::{Result, TemplateError};

/// One family of cached points: the chart element under `c:ser` that holds them, and the values
/// in document order.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueFamily {
    pub tag: &'static str,
    pub values: Vec<f64>,
    /// Families such as `c:xVal` may be cached as strings; those are left alone when the chart
    /// has no numeric cache for them.
    pub optional: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormattedData {
    pub families: Vec<ValueFamily>,
}

/// Per-plot-kind data layout.
pub trait ChartFormatter {
    fn prepare_data(&self, data: &ChartData) -> Result<FormattedData>;

    /// Series names written to the embedded workbook header.
    fn sheet_header(&self, data: &ChartData) -> Vec<String> {
        series_names(data, data.width())
    }
}

pub fn formatter_for(kind: ChartKind) -> Box<dyn ChartFormatter> {
    match kind {
        ChartKind::Scatter => Box::new(ScatterFormatter),
        ChartKind::Bubble => Box::new(BubbleFormatter),
        _ => Box::new(CategoryFormatter),
    }
}

pub fn series_names(data: &ChartData, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            data.series
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Series {}", i + 1))
        })
        .collect()
}

fn series_major(data: &ChartData, columns: impl Iterator<Item = usize>) -> Vec<f64> {
    columns
        .flat_map(|c| data.rows.iter().map(move |r| r.values[c]))
        .collect()
}

/// Bar, line, area, pie, radar, surface and stock charts: one `c:val` cache per series.
pub struct CategoryFormatter;

impl ChartFormatter for CategoryFormatter {
    fn prepare_data(&self, data: &ChartData) -> Result<FormattedData> {
        data.validate()?;
        Ok(FormattedData {
            families: vec![ValueFamily {
                tag: "val",
                values: series_major(data, 0..data.width()),
                optional: false,
            }],
        })
    }
}

/// Scatter charts: x from numeric row labels (row number otherwise), one y column per series.
pub struct ScatterFormatter;

fn x_values(data: &ChartData) -> Vec<f64> {
    data.rows
        .iter()
        .enumerate()
        .map(|(i, r)| r.label.trim().parse::<f64>().unwrap_or((i + 1) as f64))
        .collect()
}

impl ChartFormatter for ScatterFormatter {
    fn prepare_data(&self, data: &ChartData) -> Result<FormattedData> {
        data.validate()?;
        let xs = x_values(data);
        let series = data.width();
        Ok(FormattedData {
            families: vec![
                ValueFamily {
                    tag: "xVal",
                    values: (0..series).flat_map(|_| xs.iter().copied()).collect(),
                    optional: true,
                },
                ValueFamily {
                    tag: "yVal",
                    values: series_major(data, 0..series),
                    optional: false,
                },
            ],
        })
    }
}

/// Bubble charts: each series takes two columns, `y` then bubble size.
pub struct BubbleFormatter;

impl ChartFormatter for BubbleFormatter {
    fn prepare_data(&self, data: &ChartData) -> Result<FormattedData> {
        data.validate()?;
        let width = data.width();
        if width % 2 != 0 {
            return Err(TemplateError::InvalidChartData(format!(
                "bubble rows need (y, size) pairs, got {width} values"
            )));
        }
        let series = width / 2;
        let xs = x_values(data);
        Ok(FormattedData {
            families: vec![
                ValueFamily {
                    tag: "xVal",
                    values: (0..series).flat_map(|_| xs.iter().copied()).collect(),
                    optional: true,
                },
                ValueFamily {
                    tag: "yVal",
                    values: series_major(data, (0..series).map(|s| s * 2)),
                    optional: false,
                },
                ValueFamily {
                    tag: "bubbleSize",
                    values: series_major(data, (0..series).map(|s| s * 2 + 1)),
                    optional: false,
                },
            ],
        })
    }

    fn sheet_header(&self, data: &ChartData) -> Vec<String> {
        series_names(data, data.width() / 2)
            .into_iter()
            .flat_map(|name| [name, "Size".to_string()])
            .collect()
    }
}
