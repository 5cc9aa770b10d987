use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot open template package {path}: {message}")]
    PackageOpen { path: PathBuf, message: String },

    #[error("a name for the target docx file is required")]
    OutputNameMissing,

    #[error("chart index {index} does not exist (document has {available} charts)")]
    ChartIndexOutOfRange { index: usize, available: usize },

    #[error("relationship resolution failed in {part}: {detail}")]
    RelationshipResolution { part: String, detail: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed xml part {part}: {message}")]
    MalformedPart { part: String, message: String },

    #[error("series length mismatch in {part} for c:{tag}: chart has {expected} points, data has {found}")]
    SeriesLengthMismatch {
        part: String,
        tag: String,
        expected: usize,
        found: usize,
    },

    #[error("unsupported chart in {part}: {kind}")]
    UnsupportedChart { part: String, kind: String },

    #[error("invalid chart data: {0}")]
    InvalidChartData(String),

    #[error("invalid template options: {0}")]
    InvalidOptions(String),

    #[error("non-text structure changed in {part}")]
    StructureChanged { part: String },

    #[error("zip archive error ({context}): {source}")]
    Archive {
        context: String,
        #[source]
        source: zip::result::ZipError,
    },
}

impl TemplateError {
    pub fn malformed(part: &str, err: impl std::fmt::Display) -> Self {
        TemplateError::MalformedPart {
            part: part.to_string(),
            message: err.to_string(),
        }
    }

    pub fn unresolved(part: &str, detail: impl Into<String>) -> Self {
        TemplateError::RelationshipResolution {
            part: part.to_string(),
            detail: detail.into(),
        }
    }

    pub fn archive(context: impl Into<String>, source: zip::result::ZipError) -> Self {
        TemplateError::Archive {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
