//! Fills placeholders in Word (`.docx`) templates: text markers, table rows, list items,
//! images, chart data and checkboxes.

pub mod chart;
pub mod config;
pub mod docx;
pub mod error;
pub mod job;
pub mod logging;
pub mod template;
pub mod value;

#[cfg(test)]
mod testutil;

pub use chart::ChartData;
pub use error::{Result, TemplateError};
pub use template::{ChartOptions, TemplateOptions, TemplateProcessor};
pub use value::{Record, TemplateValue};
