use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

mod records;
mod shape;

pub use records::{RecordBatch, RecordFault, RecordRejection, parse_records};
pub use shape::{load_shape, parse_shape, shape_from_value};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed shape: {0}")]
    MalformedShape(String),
    #[error("invalid record set: {0}")]
    InvalidRecordSet(String),
}

pub trait RecordLoader {
    fn load(&self, path: &Path) -> Result<RecordBatch, IoError>;
}

/// 读取 JSON 钻孔记录文件。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRecordFacade;

impl JsonRecordFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn load_str(&self, source: &str) -> Result<RecordBatch, IoError> {
        parse_records(source)
    }
}

impl RecordLoader for JsonRecordFacade {
    fn load(&self, path: &Path) -> Result<RecordBatch, IoError> {
        let data = read_file(path)?;
        let batch = parse_records(&data)?;
        tracing::info!(
            path = %path.display(),
            accepted = batch.boreholes.len(),
            rejected = batch.rejected.len(),
            "钻孔记录读取完成"
        );
        Ok(batch)
    }
}

/// 数字或数字字符串，非有限值视为缺失。
pub(crate) fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub(crate) fn read_file(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}
