use std::path::{Path, PathBuf};

use geosect_core::borehole::Borehole;
use geosect_core::shape::DrawnShape;
use geosect_io::{IoError, JsonRecordFacade, RecordLoader, RecordRejection, load_shape};
use tracing::{info, warn};

use crate::demo;

/// 记录来源，便于报告呈现加载信息。
#[derive(Debug, Clone)]
pub enum RecordSource {
    Json(PathBuf),
    Demo,
}

#[derive(Debug)]
pub struct LoadedRecords {
    pub boreholes: Vec<Borehole>,
    pub rejected: Vec<RecordRejection>,
    pub source: RecordSource,
}

impl LoadedRecords {
    pub fn is_demo(&self) -> bool {
        matches!(self.source, RecordSource::Demo)
    }
}

/// 从指定 JSON 文件读取钻孔记录，未指定或读取失败时回退到内置示例。
pub fn load_records_or_demo(path: Option<&Path>) -> LoadedRecords {
    if let Some(path) = path {
        match JsonRecordFacade::new().load(path) {
            Ok(batch) => {
                info!(path = %path.display(), "从 JSON 加载钻孔记录成功");
                return LoadedRecords {
                    boreholes: batch.boreholes,
                    rejected: batch.rejected,
                    source: RecordSource::Json(path.to_path_buf()),
                };
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载钻孔记录失败，回退到内置示例");
            }
        }
    }

    LoadedRecords {
        boreholes: demo::demo_boreholes(),
        rejected: Vec::new(),
        source: RecordSource::Demo,
    }
}

/// 读取形状文件；未指定路径时使用 `fallback`。
pub fn load_shape_or(
    path: Option<&Path>,
    default_buffer: f64,
    fallback: impl FnOnce() -> DrawnShape,
) -> Result<DrawnShape, IoError> {
    match path {
        Some(path) => {
            let drawn = load_shape(path, default_buffer)?;
            info!(path = %path.display(), kind = drawn.shape.kind_name(), "读取形状成功");
            Ok(drawn)
        }
        None => Ok(fallback()),
    }
}
