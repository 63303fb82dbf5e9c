use std::cmp::Ordering;

use geosect_core::borehole::LocatedPoint;
use geosect_core::geometry::{Point2, Vector2};
use geosect_core::section::{Projection, SectionLine};
use tracing::debug;

use crate::containment::project_onto_segment;

/// 距离差在此范围内视为并列，取线上靠前的线段。
const TIE_TOLERANCE: f64 = 1e-9;

/// 将点（网格坐标）投影到剖面线上，按里程升序返回。
///
/// 每个输入点恰好得到一个投影，不会丢弃任何点。排序规则：里程升序，
/// 其次偏移绝对值升序，最后按输入顺序，因此相同输入得到完全相同的输出。
///
/// 里程在最近线段上截断到 `[0, 段长]`：位于起点之前的点里程为 0，位于终点之后
/// 的点里程为全线长度。偏移为点到最近线段所在直线的有符号距离，沿行进方向左侧为正。
pub fn project(points: &[LocatedPoint], line: &SectionLine) -> Vec<Projection> {
    let mut projections: Vec<Projection> = points
        .iter()
        .enumerate()
        .map(|(input_index, point)| {
            let (segment, chainage, offset) = project_point(point.grid, line);
            Projection {
                id: point.id.clone(),
                chainage,
                offset,
                segment,
                input_index,
            }
        })
        .collect();

    projections.sort_by(compare_projections);
    debug!(
        points = projections.len(),
        line_length = line.length(),
        segments = line.segment_count(),
        "剖面投影完成"
    );
    projections
}

fn compare_projections(a: &Projection, b: &Projection) -> Ordering {
    a.chainage
        .total_cmp(&b.chainage)
        .then_with(|| a.offset.abs().total_cmp(&b.offset.abs()))
        .then_with(|| a.input_index.cmp(&b.input_index))
}

/// 返回 (最近线段序号, 里程, 有符号偏移)。零长度线段不参与最近线段判定。
fn project_point(point: Point2, line: &SectionLine) -> (usize, f64, f64) {
    let mut best: Option<(usize, f64, f64)> = None;
    for index in 0..line.segment_count() {
        let (start, end) = line.segment(index);
        let direction = Vector2::from_points(start, end);
        let length = direction.length();
        if length <= f64::EPSILON {
            continue;
        }
        let foot = project_onto_segment(point, start, end);
        if let Some((_, best_distance, _)) = best {
            if foot.distance + TIE_TOLERANCE >= best_distance {
                continue;
            }
        }
        best = Some((index, foot.distance, length));
    }

    let Some((segment, _, length)) = best else {
        // SectionLine 保证总长大于零，总有一段非零长度
        return (0, 0.0, 0.0);
    };
    let (start, end) = line.segment(segment);
    let direction = Vector2::from_points(start, end);
    let to_point = Vector2::from_points(start, point);
    let along = (to_point.dot(direction) / length).clamp(0.0, length);
    let chainage = line.chainage_at_vertex(segment) + along;
    let offset = direction.cross(to_point) / length;
    (segment, chainage.min(line.length()), offset)
}
