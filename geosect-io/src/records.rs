use std::collections::HashSet;

use geosect_core::borehole::{Borehole, BoreholeId, DepthInterval};
use geosect_core::geometry::Point2;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{IoError, number};

const ID_KEYS: &[&str] = &["id", "LOCA_ID"];
const EASTING_KEYS: &[&str] = &["easting", "LOCA_NATE"];
const NORTHING_KEYS: &[&str] = &["northing", "LOCA_NATN"];
const GROUND_LEVEL_KEYS: &[&str] = &["ground_level", "LOCA_GL"];
const INTERVAL_KEYS: &[&str] = &["intervals", "GEOL"];
const TOP_KEYS: &[&str] = &["top", "GEOL_TOP"];
const BASE_KEYS: &[&str] = &["base", "GEOL_BASE"];
const LEGEND_KEYS: &[&str] = &["legend_code", "GEOL_LEG"];
const GEOLOGY_KEYS: &[&str] = &["geology_code", "GEOL_GEOL"];
const DESCRIPTION_KEYS: &[&str] = &["description", "GEOL_DESC"];

/// 单条记录被拒绝的原因。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordFault {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a finite number: {value}")]
    NotNumeric { field: &'static str, value: String },
    #[error("interval {index}: {reason}")]
    BadInterval { index: usize, reason: String },
    #[error("duplicate id")]
    DuplicateId,
}

impl RecordFault {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordFault::NotAnObject => "not_an_object",
            RecordFault::MissingField(_) => "missing_field",
            RecordFault::NotNumeric { .. } => "not_numeric",
            RecordFault::BadInterval { .. } => "bad_interval",
            RecordFault::DuplicateId => "duplicate_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRejection {
    /// 记录在输入数组中的位置（从 0 开始）。
    pub position: usize,
    pub id: Option<String>,
    pub fault: RecordFault,
}

/// 一批记录的读取结果：通过校验的钻孔与被拒绝的记录。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub boreholes: Vec<Borehole>,
    pub rejected: Vec<RecordRejection>,
}

impl RecordBatch {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Borehole> {
        self.boreholes.iter().find(|borehole| borehole.id.as_str() == id)
    }
}

/// 解析 JSON 记录。顶层可以是记录数组，也可以是带 `records` 或 `boreholes` 数组的对象。
///
/// 单条记录出错只拒绝该条并记录原因，其余记录照常读取；只有整体结构不可解释时才返回错误。
pub fn parse_records(source: &str) -> Result<RecordBatch, IoError> {
    let value: Value = serde_json::from_str(source)?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("records")
            .or_else(|| map.get("boreholes"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                IoError::InvalidRecordSet("expected a `records` or `boreholes` array".to_string())
            })?,
        _ => {
            return Err(IoError::InvalidRecordSet(
                "top level must be an array or an object".to_string(),
            ));
        }
    };

    let mut batch = RecordBatch::default();
    let mut seen: HashSet<BoreholeId> = HashSet::new();
    for (position, item) in items.iter().enumerate() {
        let outcome = item
            .as_object()
            .ok_or(RecordFault::NotAnObject)
            .and_then(convert_record)
            .and_then(|borehole| {
                if seen.insert(borehole.id.clone()) {
                    Ok(borehole)
                } else {
                    Err(RecordFault::DuplicateId)
                }
            });
        match outcome {
            Ok(borehole) => batch.boreholes.push(borehole),
            Err(fault) => {
                let id = item
                    .as_object()
                    .and_then(|map| lookup(map, ID_KEYS))
                    .and_then(id_text);
                warn!(position, id = ?id, reason = %fault, "钻孔记录被拒绝");
                batch.rejected.push(RecordRejection { position, id, fault });
            }
        }
    }
    debug!(
        accepted = batch.boreholes.len(),
        rejected = batch.rejected.len(),
        "记录解析完成"
    );
    Ok(batch)
}

fn convert_record(map: &Map<String, Value>) -> Result<Borehole, RecordFault> {
    let id = lookup(map, ID_KEYS)
        .and_then(id_text)
        .ok_or(RecordFault::MissingField("id"))?;
    let easting = required_number(map, EASTING_KEYS, "easting")?;
    let northing = required_number(map, NORTHING_KEYS, "northing")?;
    let ground_level = optional_number(map, GROUND_LEVEL_KEYS, "ground_level")?;

    let intervals = match lookup(map, INTERVAL_KEYS) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(raw)) => convert_intervals(raw)?,
        Some(_) => {
            return Err(RecordFault::BadInterval {
                index: 0,
                reason: "intervals must be an array".to_string(),
            });
        }
    };

    Ok(Borehole {
        id: BoreholeId::new(id),
        grid: Point2::new(easting, northing),
        ground_level,
        intervals,
    })
}

/// 区间按顶深排序后校验：厚度不能为负，相邻区间不能重叠。
fn convert_intervals(raw: &[Value]) -> Result<Vec<DepthInterval>, RecordFault> {
    let mut intervals = Vec::with_capacity(raw.len());
    for (index, item) in raw.iter().enumerate() {
        let map = item.as_object().ok_or_else(|| RecordFault::BadInterval {
            index,
            reason: "interval is not an object".to_string(),
        })?;
        let top = interval_number(map, TOP_KEYS, "top", index)?;
        let base = interval_number(map, BASE_KEYS, "base", index)?;
        if base < top {
            return Err(RecordFault::BadInterval {
                index,
                reason: format!("negative thickness (top {top}, base {base})"),
            });
        }
        intervals.push(DepthInterval {
            top,
            base,
            legend_code: lookup(map, LEGEND_KEYS).and_then(id_text),
            geology_code: lookup(map, GEOLOGY_KEYS).and_then(id_text),
            description: lookup(map, DESCRIPTION_KEYS).and_then(id_text),
        });
    }

    intervals.sort_by(|a, b| a.top.total_cmp(&b.top));
    for (index, pair) in intervals.windows(2).enumerate() {
        if pair[1].top < pair[0].base {
            return Err(RecordFault::BadInterval {
                index: index + 1,
                reason: format!(
                    "top {} overlaps the interval above (base {})",
                    pair[1].top, pair[0].base
                ),
            });
        }
    }
    Ok(intervals)
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

/// 字符串去掉首尾空白；数字按原样转为文本。空串视为缺失。
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn required_number(
    map: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<f64, RecordFault> {
    match lookup(map, keys) {
        None | Some(Value::Null) => Err(RecordFault::MissingField(field)),
        Some(value) => number(value).ok_or_else(|| RecordFault::NotNumeric {
            field,
            value: value.to_string(),
        }),
    }
}

fn optional_number(
    map: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<Option<f64>, RecordFault> {
    match lookup(map, keys) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(value) => number(value).map(Some).ok_or_else(|| RecordFault::NotNumeric {
            field,
            value: value.to_string(),
        }),
    }
}

fn interval_number(
    map: &Map<String, Value>,
    keys: &[&str],
    field: &str,
    index: usize,
) -> Result<f64, RecordFault> {
    lookup(map, keys)
        .and_then(number)
        .ok_or_else(|| RecordFault::BadInterval {
            index,
            reason: format!("`{field}` is missing or not numeric"),
        })
}
