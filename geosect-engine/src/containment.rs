//! 选区判定所需的计算几何：点到线段投影、点在多边形内、线缓冲区、环自相交检测。

use std::fmt::Debug;

use geosect_core::geometry::{Point2, Vector2};
use geosect_core::shape::Shape;
use thiserror::Error;

/// 边界判定的长度容差，单位与坐标一致。
pub const BOUNDARY_EPSILON: f64 = 1e-9;

/// 点到线段的投影。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentFoot {
    /// 未截断的线段参数，<0 表示在起点之前，>1 表示在终点之后。
    pub raw_t: f64,
    /// 截断到 [0, 1] 的参数。
    pub t: f64,
    pub foot: Point2,
    /// 点到垂足（截断后）的距离。
    pub distance: f64,
}

/// 将点投影到线段 `start -> end`。零长度线段的垂足即为起点。
pub fn project_onto_segment(point: Point2, start: Point2, end: Point2) -> SegmentFoot {
    let direction = Vector2::from_points(start, end);
    let length_squared = direction.length_squared();
    let raw_t = if length_squared <= f64::EPSILON * f64::EPSILON {
        0.0
    } else {
        Vector2::from_points(start, point).dot(direction) / length_squared
    };
    let t = raw_t.clamp(0.0, 1.0);
    let foot = start.translate(direction.scale(t));
    SegmentFoot {
        raw_t,
        t,
        foot,
        distance: point.distance(foot),
    }
}

#[inline]
fn orientation(a: Point2, b: Point2, c: Point2) -> f64 {
    Vector2::from_points(a, b).cross(Vector2::from_points(a, c))
}

/// 点 `c` 到直线 `ab` 的有向距离，左侧为正；零长度线段返回 0。
#[inline]
fn side(a: Point2, b: Point2, c: Point2) -> f64 {
    let length = a.distance(b);
    if length == 0.0 {
        return 0.0;
    }
    orientation(a, b, c) / length
}

#[inline]
fn within_extent(a: Point2, b: Point2, p: Point2) -> bool {
    p.x() >= a.x().min(b.x()) - BOUNDARY_EPSILON
        && p.x() <= a.x().max(b.x()) + BOUNDARY_EPSILON
        && p.y() >= a.y().min(b.y()) - BOUNDARY_EPSILON
        && p.y() <= a.y().max(b.y()) + BOUNDARY_EPSILON
}

/// 两条闭线段是否相交（含端点接触与共线重叠）。
pub fn segments_intersect(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> bool {
    let d1 = side(b1, b2, a1);
    let d2 = side(b1, b2, a2);
    let d3 = side(a1, a2, b1);
    let d4 = side(a1, a2, b2);

    if ((d1 > BOUNDARY_EPSILON && d2 < -BOUNDARY_EPSILON)
        || (d1 < -BOUNDARY_EPSILON && d2 > BOUNDARY_EPSILON))
        && ((d3 > BOUNDARY_EPSILON && d4 < -BOUNDARY_EPSILON)
            || (d3 < -BOUNDARY_EPSILON && d4 > BOUNDARY_EPSILON))
    {
        return true;
    }

    (d1.abs() <= BOUNDARY_EPSILON && within_extent(b1, b2, a1))
        || (d2.abs() <= BOUNDARY_EPSILON && within_extent(b1, b2, a2))
        || (d3.abs() <= BOUNDARY_EPSILON && within_extent(a1, a2, b1))
        || (d4.abs() <= BOUNDARY_EPSILON && within_extent(a1, a2, b2))
}

/// 点是否位于环的某条边上。
pub fn on_ring_boundary(ring: &[Point2], point: Point2) -> bool {
    ring_edges(ring).any(|(a, b)| project_onto_segment(point, a, b).distance <= BOUNDARY_EPSILON)
}

/// 环的有向面积（鞋带公式），逆时针为正。以首顶点为原点计算，大坐标下不损失精度。
pub fn signed_area(ring: &[Point2]) -> f64 {
    let Some(&origin) = ring.first() else {
        return 0.0;
    };
    ring_edges(ring)
        .map(|(a, b)| Vector2::from_points(origin, a).cross(Vector2::from_points(origin, b)))
        .sum::<f64>()
        * 0.5
}

/// 环的周长。
pub fn perimeter(ring: &[Point2]) -> f64 {
    ring_edges(ring).map(|(a, b)| a.distance(b)).sum()
}

fn ring_edges(ring: &[Point2]) -> impl Iterator<Item = (Point2, Point2)> + '_ {
    let count = ring.len();
    (0..count).map(move |index| (ring[index], ring[(index + 1) % count]))
}

/// 查找环中第一对相交的非相邻边，或相邻边折返重叠。
pub fn find_self_intersection(ring: &[Point2]) -> Option<(usize, usize)> {
    let count = ring.len();
    if count < 3 {
        return None;
    }
    for i in 0..count {
        let (a1, a2) = (ring[i], ring[(i + 1) % count]);
        // 相邻边沿原路折返
        let next = ring[(i + 2) % count];
        let turn = side(a1, a2, next);
        if turn.abs() <= BOUNDARY_EPSILON
            && Vector2::from_points(a1, a2).dot(Vector2::from_points(a2, next)) < 0.0
        {
            return Some((i, (i + 1) % count));
        }
        for j in (i + 2)..count {
            if i == 0 && j == count - 1 {
                continue;
            }
            let (b1, b2) = (ring[j], ring[(j + 1) % count]);
            if segments_intersect(a1, a2, b1, b2) {
                return Some((i, j));
            }
        }
    }
    None
}

/// 点在多边形内的判定规则。实现须把边界上的点视为在内。
pub trait ContainmentRule: Debug + Send + Sync {
    fn name(&self) -> &'static str;
    fn contains(&self, ring: &[Point2], point: Point2) -> bool;
}

/// 非零环绕数规则。
#[derive(Debug, Clone, Copy, Default)]
pub struct WindingNumber;

impl ContainmentRule for WindingNumber {
    fn name(&self) -> &'static str {
        "winding"
    }

    fn contains(&self, ring: &[Point2], point: Point2) -> bool {
        if on_ring_boundary(ring, point) {
            return true;
        }
        let mut winding = 0i32;
        for (a, b) in ring_edges(ring) {
            if a.y() <= point.y() {
                if b.y() > point.y() && orientation(a, b, point) > 0.0 {
                    winding += 1;
                }
            } else if b.y() <= point.y() && orientation(a, b, point) < 0.0 {
                winding -= 1;
            }
        }
        winding != 0
    }
}

/// 奇偶射线法。
#[derive(Debug, Clone, Copy, Default)]
pub struct RayCasting;

impl ContainmentRule for RayCasting {
    fn name(&self) -> &'static str {
        "ray_casting"
    }

    fn contains(&self, ring: &[Point2], point: Point2) -> bool {
        if on_ring_boundary(ring, point) {
            return true;
        }
        let mut inside = false;
        for (a, b) in ring_edges(ring) {
            if (a.y() > point.y()) != (b.y() > point.y()) {
                let crossing = (b.x() - a.x()) * (point.y() - a.y()) / (b.y() - a.y()) + a.x();
                if point.x() < crossing {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// 线缓冲区两端的处理方式。折线内部拐点始终按圆角处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferCap {
    /// 平头：线两端之外的点不计入。
    #[default]
    Flat,
    /// 圆头：端点缓冲半径内的点计入。
    Round,
}

/// 点是否落在折线缓冲区内（距离 ≤ `buffer`）。
pub fn within_buffer(vertices: &[Point2], buffer: f64, cap: BufferCap, point: Point2) -> bool {
    let Some(last_segment) = vertices.len().checked_sub(2) else {
        return false;
    };
    vertices.windows(2).enumerate().any(|(index, pair)| {
        let foot = project_onto_segment(point, pair[0], pair[1]);
        if foot.distance > buffer {
            return false;
        }
        let beyond_start = index == 0 && foot.raw_t < 0.0;
        let beyond_end = index == last_segment && foot.raw_t > 1.0;
        cap == BufferCap::Round || !(beyond_start || beyond_end)
    })
}

/// 无法无歧义解释的形状。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeDefect {
    #[error("{kind} has a non-finite vertex at index {index}")]
    NonFiniteVertex { kind: &'static str, index: usize },
    #[error("rectangle has zero area")]
    ZeroAreaRectangle,
    #[error("{kind} needs at least {required} vertices, found {found}")]
    TooFewVertices {
        kind: &'static str,
        required: usize,
        found: usize,
    },
    #[error("{kind} repeats vertex {index} consecutively")]
    RepeatedVertex { kind: &'static str, index: usize },
    #[error("polygon has zero area")]
    ZeroAreaPolygon,
    #[error("polygon edges {first} and {second} intersect")]
    SelfIntersection { first: usize, second: usize },
    #[error("line has zero length")]
    ZeroLengthLine,
    #[error("line buffer {0} must be a positive finite distance")]
    InvalidBuffer(f64),
}

/// 检查形状是否可以无歧义地用于选区。
pub fn validate_shape(shape: &Shape) -> Result<(), ShapeDefect> {
    let kind = shape.kind_name();
    let vertices = shape.vertices();
    if let Some(index) = vertices.iter().position(|vertex| !vertex.is_finite()) {
        return Err(ShapeDefect::NonFiniteVertex { kind, index });
    }

    match shape {
        Shape::Rectangle { min, max } => {
            if max.x() - min.x() <= 0.0 || max.y() - min.y() <= 0.0 {
                return Err(ShapeDefect::ZeroAreaRectangle);
            }
        }
        Shape::Polygon { ring } => {
            if ring.len() < 3 {
                return Err(ShapeDefect::TooFewVertices {
                    kind,
                    required: 3,
                    found: ring.len(),
                });
            }
            check_repeated(ring, kind, true)?;
            // 面积不超过“周长 × 容差”即视为退化，阈值随形状尺度变化
            if signed_area(ring).abs() <= BOUNDARY_EPSILON * perimeter(ring) {
                return Err(ShapeDefect::ZeroAreaPolygon);
            }
            if let Some((first, second)) = find_self_intersection(ring) {
                return Err(ShapeDefect::SelfIntersection { first, second });
            }
        }
        Shape::Line { vertices, buffer } => {
            if vertices.len() < 2 {
                return Err(ShapeDefect::TooFewVertices {
                    kind,
                    required: 2,
                    found: vertices.len(),
                });
            }
            if !buffer.is_finite() || *buffer <= 0.0 {
                return Err(ShapeDefect::InvalidBuffer(*buffer));
            }
            let length: f64 = vertices.windows(2).map(|pair| pair[0].distance(pair[1])).sum();
            if length <= 0.0 {
                return Err(ShapeDefect::ZeroLengthLine);
            }
            check_repeated(vertices, kind, false)?;
        }
    }
    Ok(())
}

fn check_repeated(vertices: &[Point2], kind: &'static str, closed: bool) -> Result<(), ShapeDefect> {
    let count = vertices.len();
    let pairs = if closed { count } else { count - 1 };
    for index in 0..pairs {
        if vertices[index] == vertices[(index + 1) % count] {
            return Err(ShapeDefect::RepeatedVertex {
                kind,
                index: (index + 1) % count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
        ]
    }

    #[test]
    fn square_contains_centre_and_excludes_outside() {
        let ring = square();
        for rule in [&WindingNumber as &dyn ContainmentRule, &RayCasting] {
            assert!(rule.contains(&ring, Point2::new(5.0, 5.0)), "{}", rule.name());
            assert!(!rule.contains(&ring, Point2::new(15.0, 15.0)), "{}", rule.name());
        }
    }

    #[test]
    fn boundary_points_are_inside() {
        let ring = square();
        for rule in [&WindingNumber as &dyn ContainmentRule, &RayCasting] {
            assert!(rule.contains(&ring, Point2::new(0.0, 5.0)));
            assert!(rule.contains(&ring, Point2::new(10.0, 10.0)));
            assert!(rule.contains(&ring, Point2::new(5.0, 0.0)));
            assert!(!rule.contains(&ring, Point2::new(5.0, -0.001)));
        }
    }

    #[test]
    fn rules_agree_on_concave_ring() {
        // U 形
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(9.0, 0.0),
            Point2::new(9.0, 9.0),
            Point2::new(6.0, 9.0),
            Point2::new(6.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 9.0),
            Point2::new(0.0, 9.0),
        ];
        for x in 0..=18 {
            for y in 0..=18 {
                let point = Point2::new(x as f64 * 0.5 + 0.25, y as f64 * 0.5 + 0.25);
                assert_eq!(
                    WindingNumber.contains(&ring, point),
                    RayCasting.contains(&ring, point),
                    "disagreement at {point:?}"
                );
            }
        }
        assert!(!WindingNumber.contains(&ring, Point2::new(4.5, 6.0)));
        assert!(WindingNumber.contains(&ring, Point2::new(1.5, 6.0)));
    }

    #[test]
    fn horizontal_line_buffer_with_flat_caps() {
        let line = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)];
        assert!(within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(5.0, 1.9)));
        assert!(!within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(5.0, 2.1)));
        assert!(!within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(12.0, 0.0)));
        assert!(!within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(-0.5, 0.0)));
        assert!(within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(10.0, -2.0)));
    }

    #[test]
    fn round_caps_extend_past_line_ends() {
        let line = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)];
        assert!(within_buffer(&line, 2.0, BufferCap::Round, Point2::new(11.5, 0.0)));
        assert!(!within_buffer(&line, 2.0, BufferCap::Round, Point2::new(12.1, 0.0)));
        assert!(!within_buffer(&line, 2.0, BufferCap::Round, Point2::new(11.5, 1.5)));
    }

    #[test]
    fn interior_bend_is_covered_on_the_outside() {
        let line = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
        ];
        // 拐角外侧，两段的垂足都落在段外
        assert!(within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(11.0, -1.0)));
        assert!(!within_buffer(&line, 2.0, BufferCap::Flat, Point2::new(10.0, 11.0)));
    }

    #[test]
    fn self_intersection_detection() {
        let bow_tie = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        assert_eq!(find_self_intersection(&bow_tie), Some((0, 2)));
        assert_eq!(find_self_intersection(&square()), None);

        let spike = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(5.0, 5.0),
        ];
        assert!(find_self_intersection(&spike).is_some());
    }

    #[test]
    fn validate_reports_degenerate_shapes() {
        let flat = Shape::rectangle(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));
        assert_eq!(validate_shape(&flat), Err(ShapeDefect::ZeroAreaRectangle));

        let two = Shape::polygon([Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)]);
        assert!(matches!(
            validate_shape(&two),
            Err(ShapeDefect::TooFewVertices { found: 2, .. })
        ));

        let collinear = Shape::polygon([
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ]);
        assert!(validate_shape(&collinear).is_err());

        let point_line = Shape::line([Point2::new(3.0, 3.0), Point2::new(3.0, 3.0)], 1.0);
        assert_eq!(validate_shape(&point_line), Err(ShapeDefect::ZeroLengthLine));

        let bad_buffer = Shape::line([Point2::new(0.0, 0.0), Point2::new(3.0, 3.0)], f64::NAN);
        assert!(matches!(
            validate_shape(&bad_buffer),
            Err(ShapeDefect::InvalidBuffer(_))
        ));

        let nan = Shape::polygon([
            Point2::new(0.0, 0.0),
            Point2::new(f64::NAN, 1.0),
            Point2::new(2.0, 0.0),
        ]);
        assert_eq!(
            validate_shape(&nan),
            Err(ShapeDefect::NonFiniteVertex {
                kind: "polygon",
                index: 1
            })
        );

        assert!(validate_shape(&Shape::polygon(square())).is_ok());
    }

    #[test]
    fn small_geographic_ring_is_usable() {
        // 经纬度下约 2 m × 2 m 的选区，面积约 6.4e-10 平方度
        let ring = vec![
            Point2::new(-1.25, 51.75),
            Point2::new(-1.249968, 51.75),
            Point2::new(-1.249968, 51.75002),
            Point2::new(-1.25, 51.75002),
        ];
        assert_eq!(validate_shape(&Shape::polygon(ring.clone())), Ok(()));
        assert_eq!(find_self_intersection(&ring), None);
        assert!(signed_area(&ring) > 0.0);

        let centre = Point2::new(-1.249984, 51.75001);
        let outside = Point2::new(-1.2499, 51.75001);
        for rule in [&WindingNumber as &dyn ContainmentRule, &RayCasting] {
            assert!(rule.contains(&ring, centre), "{}", rule.name());
            assert!(!rule.contains(&ring, outside), "{}", rule.name());
        }

        // 大尺度下的细长三角形仍按零面积拒绝
        let sliver = Shape::polygon([
            Point2::new(450_000.0, 200_000.0),
            Point2::new(450_010.0, 200_000.0),
            Point2::new(450_020.0, 200_000.000_000_000_1),
        ]);
        assert_eq!(validate_shape(&sliver), Err(ShapeDefect::ZeroAreaPolygon));
    }
}
