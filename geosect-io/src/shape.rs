use std::path::Path;

use geosect_core::geometry::{Bounds2D, Point2};
use geosect_core::shape::{CoordinateFrame, DrawnShape, Shape};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{IoError, number, read_file};

/// 解析地图绘制工具导出的 GeoJSON 几何或 Feature。
///
/// `default_buffer` 在 LineString 未携带 `buffer`/`radius` 属性时使用。
pub fn parse_shape(source: &str, default_buffer: f64) -> Result<DrawnShape, IoError> {
    let value: Value = serde_json::from_str(source)?;
    shape_from_value(&value, default_buffer)
}

pub fn load_shape(path: &Path, default_buffer: f64) -> Result<DrawnShape, IoError> {
    let data = read_file(path)?;
    parse_shape(&data, default_buffer)
}

pub fn shape_from_value(value: &Value, default_buffer: f64) -> Result<DrawnShape, IoError> {
    let empty = Map::new();
    let (geometry, properties) = match type_name(value)? {
        "Feature" => {
            let geometry = value
                .get("geometry")
                .filter(|geometry| !geometry.is_null())
                .ok_or_else(|| IoError::MalformedShape("feature has no geometry".to_string()))?;
            let properties = value
                .get("properties")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            (geometry, properties)
        }
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| IoError::MalformedShape("missing `features` array".to_string()))?;
            return match features.as_slice() {
                [single] => shape_from_value(single, default_buffer),
                _ => Err(IoError::UnsupportedGeometry(format!(
                    "feature collection with {} features",
                    features.len()
                ))),
            };
        }
        _ => (value, &empty),
    };

    let frame = frame_of(properties)?;
    let shape = match type_name(geometry)? {
        "Polygon" => polygon(geometry, properties)?,
        "LineString" => {
            let vertices = positions(coordinates(geometry)?)?;
            let buffer = match properties.get("buffer").or_else(|| properties.get("radius")) {
                None | Some(Value::Null) => default_buffer,
                Some(raw) => number(raw).ok_or_else(|| {
                    IoError::MalformedShape(format!("buffer is not a number: {raw}"))
                })?,
            };
            Shape::line(vertices, buffer)
        }
        other @ ("Point" | "MultiPoint" | "MultiLineString" | "MultiPolygon"
        | "GeometryCollection") => {
            return Err(IoError::UnsupportedGeometry(other.to_string()));
        }
        other => {
            return Err(IoError::MalformedShape(format!(
                "unknown geometry type `{other}`"
            )));
        }
    };
    debug!(kind = shape.kind_name(), frame = ?frame, "读取选区形状");
    Ok(DrawnShape { shape, frame })
}

fn polygon(geometry: &Value, properties: &Map<String, Value>) -> Result<Shape, IoError> {
    let rings = coordinates(geometry)?
        .as_array()
        .ok_or_else(|| IoError::MalformedShape("polygon coordinates must be an array".to_string()))?;
    let outer = match rings.as_slice() {
        [] => return Err(IoError::MalformedShape("polygon has no ring".to_string())),
        [outer] => outer,
        _ => {
            return Err(IoError::UnsupportedGeometry(
                "polygon with holes".to_string(),
            ));
        }
    };
    let vertices = positions(outer)?;
    let is_rectangle = properties
        .get("shape_type")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.eq_ignore_ascii_case("rectangle"));
    if is_rectangle {
        let mut bounds = Bounds2D::empty();
        for vertex in &vertices {
            bounds.include_point(*vertex);
        }
        if bounds.is_empty() {
            return Err(IoError::MalformedShape("rectangle has no vertices".to_string()));
        }
        return Ok(Shape::rectangle(bounds.min(), bounds.max()));
    }

    let shape = Shape::polygon(vertices);
    let remaining = shape.vertices().len();
    if remaining < 3 {
        return Err(IoError::MalformedShape(format!(
            "polygon needs at least 3 distinct vertices, got {remaining}"
        )));
    }
    Ok(shape)
}

fn type_name(value: &Value) -> Result<&str, IoError> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| IoError::MalformedShape("missing `type`".to_string()))
}

fn coordinates(geometry: &Value) -> Result<&Value, IoError> {
    geometry
        .get("coordinates")
        .ok_or_else(|| IoError::MalformedShape("missing `coordinates`".to_string()))
}

/// 读取位置数组；每个位置取前两个分量，忽略高程。
fn positions(value: &Value) -> Result<Vec<Point2>, IoError> {
    let items = value
        .as_array()
        .ok_or_else(|| IoError::MalformedShape("positions must be an array".to_string()))?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let pair = item.as_array().map(Vec::as_slice);
            match pair {
                Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => Ok(Point2::new(x, y)),
                    _ => Err(IoError::MalformedShape(format!(
                        "position {index} is not numeric"
                    ))),
                },
                _ => Err(IoError::MalformedShape(format!(
                    "position {index} needs two coordinates"
                ))),
            }
        })
        .collect()
}

fn frame_of(properties: &Map<String, Value>) -> Result<CoordinateFrame, IoError> {
    match properties.get("frame").and_then(Value::as_str) {
        None => Ok(CoordinateFrame::Geographic),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "geographic" | "wgs84" => Ok(CoordinateFrame::Geographic),
            "grid" => Ok(CoordinateFrame::Grid),
            other => Err(IoError::MalformedShape(format!(
                "unknown coordinate frame `{other}`"
            ))),
        },
    }
}
