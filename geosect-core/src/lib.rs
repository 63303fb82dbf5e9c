pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。网格坐标系下 x=东坐标、y=北坐标；
    /// 地理坐标系下 x=经度、y=纬度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 二维叉积（z 分量）。正值表示 `other` 位于 `self` 左侧。
        #[inline]
        pub fn cross(self, other: Vector2) -> f64 {
            self.0.perp_dot(other.0)
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Vector2 {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于矩形选区。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 由任意两个对角点构造，自动整理为 min/max。
        pub fn from_corners(a: Point2, b: Point2) -> Self {
            Self {
                min: Point2::from_vec(a.as_vec2().min(b.as_vec2())),
                max: Point2::from_vec(a.as_vec2().max(b.as_vec2())),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        /// 闭区间包含判定，边上的点视为在内。
        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }
    }

    /// 地理坐标（十进制度）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct GeoCoord {
        pub latitude: f64,
        pub longitude: f64,
    }

    impl GeoCoord {
        #[inline]
        pub fn new(latitude: f64, longitude: f64) -> Self {
            Self {
                latitude,
                longitude,
            }
        }

        /// 是否落在合法的经纬度取值范围内。
        #[inline]
        pub fn is_valid(self) -> bool {
            self.latitude.is_finite()
                && self.longitude.is_finite()
                && (-90.0..=90.0).contains(&self.latitude)
                && (-180.0..=180.0).contains(&self.longitude)
        }

        /// 以 (经度, 纬度) 形式返回平面点，与地图绘制工具的坐标顺序一致。
        #[inline]
        pub fn as_point(self) -> Point2 {
            Point2::new(self.longitude, self.latitude)
        }

        #[inline]
        pub fn from_point(point: Point2) -> Self {
            Self::new(point.y(), point.x())
        }
    }

}

pub mod borehole {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{GeoCoord, Point2};
    use crate::shape::CoordinateFrame;

    /// 钻孔标识符，数据集内唯一。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct BoreholeId(String);

    impl BoreholeId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl std::fmt::Display for BoreholeId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// 单条地层记录的深度区间（自地面向下为正，单位米）及岩性元数据。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DepthInterval {
        pub top: f64,
        pub base: f64,
        #[serde(default)]
        pub legend_code: Option<String>,
        #[serde(default)]
        pub geology_code: Option<String>,
        #[serde(default)]
        pub description: Option<String>,
    }

    impl DepthInterval {
        #[inline]
        pub fn new(top: f64, base: f64) -> Self {
            Self {
                top,
                base,
                legend_code: None,
                geology_code: None,
                description: None,
            }
        }

        pub fn with_legend(mut self, legend_code: impl Into<String>) -> Self {
            self.legend_code = Some(legend_code.into());
            self
        }

        pub fn with_description(mut self, description: impl Into<String>) -> Self {
            self.description = Some(description.into());
            self
        }

        #[inline]
        pub fn thickness(&self) -> f64 {
            self.base - self.top
        }
    }

    /// 经摄入边界校验后的钻孔记录。坐标为网格坐标（东, 北）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Borehole {
        pub id: BoreholeId,
        pub grid: Point2,
        #[serde(default)]
        pub ground_level: Option<f64>,
        #[serde(default)]
        pub intervals: Vec<DepthInterval>,
    }

    impl Borehole {
        pub fn new(id: impl Into<String>, easting: f64, northing: f64) -> Self {
            Self {
                id: BoreholeId::new(id),
                grid: Point2::new(easting, northing),
                ground_level: None,
                intervals: Vec::new(),
            }
        }

        pub fn with_intervals(mut self, intervals: Vec<DepthInterval>) -> Self {
            self.intervals = intervals;
            self
        }

        /// 最后一条区间的底深，即记录的终孔深度。
        pub fn total_depth(&self) -> Option<f64> {
            self.intervals.last().map(|interval| interval.base)
        }
    }

    /// 已完成坐标转换的点。只有转换成功且在有效范围内的点才会被构造出来，
    /// 失败的点由转换批处理单独记录，不会进入后续流程。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LocatedPoint {
        pub id: BoreholeId,
        pub grid: Point2,
        pub geo: GeoCoord,
    }

    impl LocatedPoint {
        pub fn new(id: BoreholeId, grid: Point2, geo: GeoCoord) -> Self {
            Self { id, grid, geo }
        }

        #[inline]
        pub fn easting(&self) -> f64 {
            self.grid.x()
        }

        #[inline]
        pub fn northing(&self) -> f64 {
            self.grid.y()
        }

        /// 返回指定坐标系下的平面坐标。
        #[inline]
        pub fn position_in(&self, frame: CoordinateFrame) -> Point2 {
            match frame {
                CoordinateFrame::Grid => self.grid,
                CoordinateFrame::Geographic => self.geo.as_point(),
            }
        }
    }
}

pub mod shape {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2};

    /// 选区所处的坐标系。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum CoordinateFrame {
        /// x=经度, y=纬度
        Geographic,
        /// x=东坐标, y=北坐标（米）
        Grid,
    }

    /// 用户绘制的选区几何。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Shape {
        Rectangle { min: Point2, max: Point2 },
        /// 隐式闭合的环，不重复首点。
        Polygon { ring: Vec<Point2> },
        Line { vertices: Vec<Point2>, buffer: f64 },
    }

    impl Shape {
        /// 由任意两个对角点构造矩形。
        pub fn rectangle(a: Point2, b: Point2) -> Self {
            let bounds = Bounds2D::from_corners(a, b);
            Shape::Rectangle {
                min: bounds.min(),
                max: bounds.max(),
            }
        }

        /// 构造多边形；若末点与首点重合则去掉该闭合点，其他顶点原样保留。
        pub fn polygon(vertices: impl IntoIterator<Item = Point2>) -> Self {
            let mut ring: Vec<Point2> = vertices.into_iter().collect();
            if ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            Shape::Polygon { ring }
        }

        pub fn line(vertices: impl IntoIterator<Item = Point2>, buffer: f64) -> Self {
            Shape::Line {
                vertices: vertices.into_iter().collect(),
                buffer,
            }
        }

        pub fn kind_name(&self) -> &'static str {
            match self {
                Shape::Rectangle { .. } => "rectangle",
                Shape::Polygon { .. } => "polygon",
                Shape::Line { .. } => "line",
            }
        }

        /// 形状的顶点（矩形返回两个角点）。
        pub fn vertices(&self) -> Vec<Point2> {
            match self {
                Shape::Rectangle { min, max } => vec![*min, *max],
                Shape::Polygon { ring } => ring.clone(),
                Shape::Line { vertices, .. } => vertices.clone(),
            }
        }

        /// 逐顶点映射生成新形状，任一顶点失败则整体失败。
        /// 矩形映射后重新整理角点，缓冲距离保持不变。
        pub fn try_map_vertices<E>(
            &self,
            mut f: impl FnMut(Point2) -> Result<Point2, E>,
        ) -> Result<Shape, E> {
            Ok(match self {
                Shape::Rectangle { min, max } => Shape::rectangle(f(*min)?, f(*max)?),
                Shape::Polygon { ring } => Shape::Polygon {
                    ring: ring.iter().map(|p| f(*p)).collect::<Result<_, _>>()?,
                },
                Shape::Line { vertices, buffer } => Shape::Line {
                    vertices: vertices.iter().map(|p| f(*p)).collect::<Result<_, _>>()?,
                    buffer: *buffer,
                },
            })
        }
    }

    /// 形状及其坐标系。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DrawnShape {
        pub shape: Shape,
        pub frame: CoordinateFrame,
    }

    impl DrawnShape {
        pub fn geographic(shape: Shape) -> Self {
            Self {
                shape,
                frame: CoordinateFrame::Geographic,
            }
        }

        pub fn grid(shape: Shape) -> Self {
            Self {
                shape,
                frame: CoordinateFrame::Grid,
            }
        }
    }

}

pub mod section {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::borehole::BoreholeId;
    use crate::geometry::Point2;

    /// 几何构造失败的原因。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GeometryDefect {
        TooFewVertices,
        NonFiniteVertex,
        ZeroLength,
    }

    impl GeometryDefect {
        pub fn describe(&self) -> &'static str {
            match self {
                GeometryDefect::TooFewVertices => "section line needs at least two vertices",
                GeometryDefect::NonFiniteVertex => "section line has a non-finite vertex",
                GeometryDefect::ZeroLength => "section line has zero length",
            }
        }
    }

    impl fmt::Display for GeometryDefect {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.describe())
        }
    }

    impl std::error::Error for GeometryDefect {}

    /// 剖面线：网格坐标系下的折线，并预先计算每个顶点的累计里程。
    /// 序列化形式为顶点数组，反序列化时重新校验并计算里程。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(try_from = "Vec<Point2>", into = "Vec<Point2>")]
    pub struct SectionLine {
        vertices: Vec<Point2>,
        chainages: Vec<f64>,
    }

    impl SectionLine {
        pub fn try_new(vertices: Vec<Point2>) -> Result<Self, GeometryDefect> {
            if vertices.len() < 2 {
                return Err(GeometryDefect::TooFewVertices);
            }
            if vertices.iter().any(|vertex| !vertex.is_finite()) {
                return Err(GeometryDefect::NonFiniteVertex);
            }
            let mut chainages = Vec::with_capacity(vertices.len());
            let mut total = 0.0;
            chainages.push(total);
            for pair in vertices.windows(2) {
                total += pair[0].distance(pair[1]);
                chainages.push(total);
            }
            if total <= f64::EPSILON {
                return Err(GeometryDefect::ZeroLength);
            }
            Ok(Self {
                vertices,
                chainages,
            })
        }

        #[inline]
        pub fn vertices(&self) -> &[Point2] {
            &self.vertices
        }

        #[inline]
        pub fn segment_count(&self) -> usize {
            self.vertices.len() - 1
        }

        /// 第 `index` 段的起止点。
        #[inline]
        pub fn segment(&self, index: usize) -> (Point2, Point2) {
            (self.vertices[index], self.vertices[index + 1])
        }

        /// 第 `index` 个顶点处的累计里程。
        #[inline]
        pub fn chainage_at_vertex(&self, index: usize) -> f64 {
            self.chainages[index]
        }

        #[inline]
        pub fn length(&self) -> f64 {
            self.chainages[self.chainages.len() - 1]
        }
    }

    impl TryFrom<Vec<Point2>> for SectionLine {
        type Error = GeometryDefect;

        fn try_from(vertices: Vec<Point2>) -> Result<Self, Self::Error> {
            Self::try_new(vertices)
        }
    }

    impl From<SectionLine> for Vec<Point2> {
        fn from(line: SectionLine) -> Self {
            line.vertices
        }
    }

    /// 单个点在剖面线上的投影结果。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Projection {
        pub id: BoreholeId,
        /// 沿线距离（米）。
        pub chainage: f64,
        /// 有符号垂距：沿行进方向左侧为正。
        pub offset: f64,
        /// 最近线段（home segment）的序号。
        pub segment: usize,
        /// 点在输入序列中的位置。
        pub input_index: usize,
    }

    /// 落在某一页内的区间片段。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PageFragment {
        /// 原始区间在钻孔区间序列中的序号。
        pub interval_index: usize,
        pub top: f64,
        pub base: f64,
        /// 该区间在上一页已有部分。
        pub continues_above: bool,
        /// 该区间在下一页还有部分。
        pub continues_below: bool,
    }

    impl PageFragment {
        #[inline]
        pub fn thickness(&self) -> f64 {
            self.base - self.top
        }
    }

    /// 一页打印输出对应的深度窗口。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Page {
        /// 从 1 开始的页码。
        pub number: usize,
        pub total: usize,
        pub window_top: f64,
        pub window_base: f64,
        pub fragments: Vec<PageFragment>,
    }

    impl Page {
        #[inline]
        pub fn span(&self) -> f64 {
            self.window_base - self.window_top
        }

        #[inline]
        pub fn is_last(&self) -> bool {
            self.number == self.total
        }
    }

}
