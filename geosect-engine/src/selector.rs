use geosect_core::borehole::{BoreholeId, LocatedPoint};
use geosect_core::geometry::{Bounds2D, Point2};
use geosect_core::shape::{DrawnShape, Shape};
use tracing::{debug, warn};

use crate::containment::{
    BufferCap, ContainmentRule, WindingNumber, validate_shape, within_buffer,
};
use crate::diagnostics::{DiagnosticKind, DiagnosticReport};

/// 一次选区的结果。空结果是正常终态，调用方应呈现“无匹配”而非报错。
#[derive(Debug, Clone, Default)]
pub struct SelectionOutcome {
    pub selected: Vec<LocatedPoint>,
    pub diagnostics: DiagnosticReport,
}

impl SelectionOutcome {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &BoreholeId> + '_ {
        self.selected.iter().map(|point| &point.id)
    }

    /// 形状本身无法解释时为真。
    pub fn is_malformed(&self) -> bool {
        self.diagnostics.has(DiagnosticKind::MalformedShape)
    }
}

/// 空间选区器：按矩形、多边形或线缓冲区筛选点。
/// 不修改输入，输出保持输入中的相对顺序，对同一形状重复筛选结果不变。
#[derive(Debug)]
pub struct SpatialSelector {
    rule: Box<dyn ContainmentRule>,
    buffer_cap: BufferCap,
}

impl SpatialSelector {
    pub fn new() -> Self {
        Self {
            rule: Box::new(WindingNumber),
            buffer_cap: BufferCap::default(),
        }
    }

    /// 替换点在多边形内的判定规则。
    pub fn with_rule(mut self, rule: impl ContainmentRule + 'static) -> Self {
        self.rule = Box::new(rule);
        self
    }

    pub fn with_buffer_cap(mut self, cap: BufferCap) -> Self {
        self.buffer_cap = cap;
        self
    }

    #[inline]
    pub fn rule_name(&self) -> &'static str {
        self.rule.name()
    }

    #[inline]
    pub fn buffer_cap(&self) -> BufferCap {
        self.buffer_cap
    }

    /// 按形状所在坐标系比较点坐标：地图绘制的形状使用经纬度，网格形状使用东/北坐标。
    pub fn select(&self, points: &[LocatedPoint], drawn: &DrawnShape) -> SelectionOutcome {
        let mut outcome = SelectionOutcome::default();
        if let Err(defect) = validate_shape(&drawn.shape) {
            warn!(
                kind = drawn.shape.kind_name(),
                defect = %defect,
                "选区形状无效，返回空结果"
            );
            outcome
                .diagnostics
                .record(DiagnosticKind::MalformedShape, None, defect.to_string());
            return outcome;
        }

        outcome.selected = points
            .iter()
            .filter(|point| self.matches(&drawn.shape, point.position_in(drawn.frame)))
            .cloned()
            .collect();

        debug!(
            kind = drawn.shape.kind_name(),
            frame = ?drawn.frame,
            candidates = points.len(),
            selected = outcome.selected.len(),
            "选区完成"
        );
        if outcome.selected.is_empty() {
            outcome.diagnostics.record(
                DiagnosticKind::EmptySelection,
                None,
                format!("no boreholes inside {}", drawn.shape.kind_name()),
            );
        }
        outcome
    }

    fn matches(&self, shape: &Shape, position: Point2) -> bool {
        match shape {
            Shape::Rectangle { min, max } => Bounds2D::new(*min, *max).contains(position),
            Shape::Polygon { ring } => self.rule.contains(ring, position),
            Shape::Line { vertices, buffer } => {
                within_buffer(vertices, *buffer, self.buffer_cap, position)
            }
        }
    }
}

impl Default for SpatialSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use geosect_core::geometry::GeoCoord;

    use super::*;
    use crate::containment::RayCasting;

    /// 地理坐标与网格坐标取相同数值，便于按任一坐标系测试。
    fn point(id: &str, x: f64, y: f64) -> LocatedPoint {
        LocatedPoint::new(BoreholeId::new(id), Point2::new(x, y), GeoCoord::new(y, x))
    }

    fn sample() -> Vec<LocatedPoint> {
        vec![
            point("A", 5.0, 5.0),
            point("B", 15.0, 15.0),
            point("C", 0.0, 10.0),
            point("D", 10.0, 0.0),
            point("E", 5.0, 1.9),
            point("F", 5.0, 2.1),
            point("G", 12.0, 0.0),
        ]
    }

    fn ids(outcome: &SelectionOutcome) -> Vec<&str> {
        outcome.ids().map(BoreholeId::as_str).collect()
    }

    #[test]
    fn rectangle_includes_edges_and_excludes_one_unit_outside() {
        let selector = SpatialSelector::new();
        let points = vec![
            point("edge", 10.0, 5.0),
            point("corner", 0.0, 0.0),
            point("outside", 11.0, 5.0),
            point("below", 5.0, -1.0),
        ];
        let shape = DrawnShape::geographic(Shape::rectangle(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
        ));
        let outcome = selector.select(&points, &shape);
        assert_eq!(ids(&outcome), vec!["edge", "corner"]);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn rectangle_uses_geographic_coordinates() {
        let selector = SpatialSelector::new();
        let points = vec![LocatedPoint::new(
            BoreholeId::new("BH"),
            Point2::new(530_000.0, 180_000.0),
            GeoCoord::new(51.5, -0.12),
        )];
        let shape = DrawnShape::geographic(Shape::rectangle(
            Point2::new(-0.2, 51.4),
            Point2::new(0.0, 51.6),
        ));
        assert_eq!(selector.select(&points, &shape).len(), 1);
    }

    #[test]
    fn small_geographic_polygon_selects_inside_point() {
        let selector = SpatialSelector::new();
        let points = vec![
            LocatedPoint::new(
                BoreholeId::new("inside"),
                Point2::new(430_000.0, 206_000.0),
                GeoCoord::new(51.75001, -1.249984),
            ),
            LocatedPoint::new(
                BoreholeId::new("outside"),
                Point2::new(430_010.0, 206_000.0),
                GeoCoord::new(51.75001, -1.2499),
            ),
        ];
        // 经纬度下约 2 m × 2 m
        let shape = DrawnShape::geographic(Shape::polygon([
            Point2::new(-1.25, 51.75),
            Point2::new(-1.249968, 51.75),
            Point2::new(-1.249968, 51.75002),
            Point2::new(-1.25, 51.75002),
        ]));
        let outcome = selector.select(&points, &shape);
        assert!(!outcome.is_malformed(), "{:?}", outcome.diagnostics.summary());
        assert_eq!(ids(&outcome), vec!["inside"]);
    }

    #[test]
    fn polygon_selection_preserves_input_order() {
        let selector = SpatialSelector::new();
        let shape = DrawnShape::grid(Shape::polygon([
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
        ]));
        let outcome = selector.select(&sample(), &shape);
        assert_eq!(ids(&outcome), vec!["A", "C", "D", "E", "F"]);

        let ray = SpatialSelector::new().with_rule(RayCasting);
        assert_eq!(ray.rule_name(), "ray_casting");
        assert_eq!(ids(&ray.select(&sample(), &shape)), ids(&outcome));
    }

    #[test]
    fn line_buffer_selection() {
        let shape = DrawnShape::grid(Shape::line(
            [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)],
            2.0,
        ));
        let flat = SpatialSelector::new().select(&sample(), &shape);
        assert_eq!(ids(&flat), vec!["D", "E"]);

        let round = SpatialSelector::new()
            .with_buffer_cap(BufferCap::Round)
            .select(&sample(), &shape);
        assert_eq!(ids(&round), vec!["D", "E", "G"]);
    }

    #[test]
    fn selection_is_idempotent_and_leaves_input_untouched() {
        let selector = SpatialSelector::new();
        let points = sample();
        let snapshot = points.clone();
        let shapes = [
            DrawnShape::grid(Shape::rectangle(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0))),
            DrawnShape::grid(Shape::polygon([
                Point2::new(0.0, 0.0),
                Point2::new(20.0, 20.0),
                Point2::new(20.0, 0.0),
            ])),
            DrawnShape::grid(Shape::line(
                [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 10.0)],
                2.5,
            )),
        ];
        for shape in &shapes {
            let once = selector.select(&points, shape);
            let twice = selector.select(&once.selected, shape);
            assert_eq!(once.selected, twice.selected, "{:?}", shape.shape.kind_name());
        }
        assert_eq!(points, snapshot);
    }

    #[test]
    fn degenerate_shapes_select_nothing_with_diagnostic() {
        let selector = SpatialSelector::new();
        let degenerate = [
            Shape::rectangle(Point2::new(0.0, 0.0), Point2::new(0.0, 10.0)),
            Shape::polygon([Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)]),
            Shape::line([Point2::new(5.0, 5.0), Point2::new(5.0, 5.0)], 100.0),
            Shape::polygon([
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(10.0, 0.0),
                Point2::new(0.0, 10.0),
            ]),
            Shape::line([Point2::new(f64::NAN, 0.0), Point2::new(1.0, 1.0)], 1.0),
        ];
        for shape in degenerate {
            let outcome = selector.select(&sample(), &DrawnShape::grid(shape));
            assert!(outcome.is_empty());
            assert!(outcome.is_malformed());
            assert_eq!(outcome.diagnostics.count(DiagnosticKind::MalformedShape), 1);
        }
    }

    #[test]
    fn empty_result_is_informational() {
        let selector = SpatialSelector::new();
        let shape = DrawnShape::grid(Shape::rectangle(
            Point2::new(100.0, 100.0),
            Point2::new(200.0, 200.0),
        ));
        let outcome = selector.select(&sample(), &shape);
        assert!(outcome.is_empty());
        assert!(!outcome.is_malformed());
        assert!(outcome.diagnostics.has(DiagnosticKind::EmptySelection));
    }
}
