use geosect_core::borehole::{Borehole, DepthInterval};
use geosect_core::geometry::Point2;
use geosect_core::shape::{DrawnShape, Shape};

/// 牛津附近的一组示例钻孔（英国国家网格坐标）。
pub fn demo_boreholes() -> Vec<Borehole> {
    let mut boreholes = vec![
        Borehole::new("BH01", 451_180.0, 206_240.0).with_intervals(vec![
            interval(0.0, 0.3, "101", "Dark brown TOPSOIL"),
            interval(0.3, 2.6, "201", "Soft orange brown sandy CLAY"),
            interval(2.6, 6.8, "401", "Medium dense GRAVEL"),
            interval(6.8, 23.4, "301", "Stiff grey fissured CLAY"),
        ]),
        Borehole::new("BH02", 451_420.0, 206_460.0).with_intervals(vec![
            interval(0.0, 0.4, "101", "TOPSOIL"),
            interval(0.4, 4.1, "401", "Dense sandy GRAVEL"),
            interval(4.1, 15.0, "301", "Stiff grey CLAY"),
        ]),
        Borehole::new("BH03", 451_300.0, 206_330.0).with_intervals(vec![
            interval(0.0, 1.2, "601", "MADE GROUND"),
            interval(1.2, 9.5, "401", "Medium dense GRAVEL"),
            interval(9.5, 12.0, "301", "Firm grey CLAY"),
        ]),
        Borehole::new("BH04", 451_900.0, 206_120.0).with_intervals(vec![
            interval(0.0, 0.2, "101", "TOPSOIL"),
            interval(0.2, 5.0, "201", "Firm sandy CLAY"),
        ]),
        Borehole::new("TP05", 451_560.0, 206_590.0).with_intervals(vec![
            interval(0.0, 0.3, "101", "TOPSOIL"),
            interval(0.3, 3.0, "401", "Loose GRAVEL"),
        ]),
        // 北坐标超出作业区域，演示坐标转换诊断
        Borehole::new("BH99", 451_000.0, 2_000_000.0),
    ];
    boreholes[0].ground_level = Some(58.2);
    boreholes[1].ground_level = Some(57.9);
    boreholes
}

fn interval(top: f64, base: f64, legend: &str, description: &str) -> DepthInterval {
    DepthInterval::new(top, base)
        .with_legend(legend)
        .with_description(description)
}

/// 覆盖示例钻孔的地理矩形（经度, 纬度）。
pub fn demo_selection() -> DrawnShape {
    DrawnShape::geographic(Shape::rectangle(
        Point2::new(-1.30, 51.70),
        Point2::new(-1.20, 51.80),
    ))
}

/// 自西南向东北穿过示例钻孔的剖面线（网格坐标）。
pub fn demo_section() -> DrawnShape {
    DrawnShape::grid(Shape::line(
        [
            Point2::new(451_100.0, 206_200.0),
            Point2::new(451_350.0, 206_400.0),
            Point2::new(451_600.0, 206_620.0),
        ],
        150.0,
    ))
}
