use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use geosect_core::borehole::{Borehole, LocatedPoint};
use geosect_core::geometry::{GeoCoord, Point2};
use geosect_core::shape::{CoordinateFrame, DrawnShape, Shape};
use glam::DVec3;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diagnostics::{DiagnosticKind, DiagnosticReport};
use crate::errors::EngineError;

const MAX_ITERATIONS: usize = 64;
/// 子午线弧长迭代的收敛阈值（米）。
const ARC_TOLERANCE: f64 = 1e-5;
const LATITUDE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("coordinate ({x}, {y}) is not finite")]
    NonFinite { x: f64, y: f64 },
    #[error("coordinate (lat {latitude:.6}, lon {longitude:.6}) is outside the operating region")]
    OutsideRegion { latitude: f64, longitude: f64 },
    #[error("coordinate conversion did not converge")]
    NoConvergence,
}

/// 参考椭球。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major: f64,
    pub semi_minor: f64,
}

impl Ellipsoid {
    pub const AIRY_1830: Self = Self {
        semi_major: 6_377_563.396,
        semi_minor: 6_356_256.909,
    };
    pub const AIRY_MODIFIED: Self = Self {
        semi_major: 6_377_340.189,
        semi_minor: 6_356_034.447,
    };
    pub const WGS84: Self = Self {
        semi_major: 6_378_137.0,
        semi_minor: 6_356_752.314_245,
    };

    #[inline]
    fn eccentricity_squared(&self) -> f64 {
        let a2 = self.semi_major * self.semi_major;
        (a2 - self.semi_minor * self.semi_minor) / a2
    }

    fn to_cartesian(&self, latitude: f64, longitude: f64) -> DVec3 {
        let e2 = self.eccentricity_squared();
        let (sin_phi, cos_phi) = latitude.sin_cos();
        let nu = self.semi_major / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        DVec3::new(
            nu * cos_phi * longitude.cos(),
            nu * cos_phi * longitude.sin(),
            (1.0 - e2) * nu * sin_phi,
        )
    }

    /// 笛卡尔坐标转回经纬度（弧度），椭球高被丢弃。
    fn to_geodetic(&self, point: DVec3) -> Result<(f64, f64), CoordinateError> {
        let e2 = self.eccentricity_squared();
        let horizontal = point.x.hypot(point.y);
        let mut phi = point.z.atan2(horizontal * (1.0 - e2));
        for _ in 0..MAX_ITERATIONS {
            let sin_phi = phi.sin();
            let nu = self.semi_major / (1.0 - e2 * sin_phi * sin_phi).sqrt();
            let next = (point.z + e2 * nu * sin_phi).atan2(horizontal);
            if (next - phi).abs() < LATITUDE_TOLERANCE {
                return Ok((next, point.y.atan2(point.x)));
            }
            phi = next;
        }
        Err(CoordinateError::NoConvergence)
    }
}

/// 七参数 Helmert 变换（位置向量约定，旋转单位为角秒，尺度单位为 ppm）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HelmertShift {
    pub tx: f64,
    pub ty: f64,
    pub tz: f64,
    pub scale_ppm: f64,
    pub rx_arcsec: f64,
    pub ry_arcsec: f64,
    pub rz_arcsec: f64,
}

impl HelmertShift {
    /// 小角度近似下的逆变换。
    pub fn inverse(&self) -> Self {
        Self {
            tx: -self.tx,
            ty: -self.ty,
            tz: -self.tz,
            scale_ppm: -self.scale_ppm,
            rx_arcsec: -self.rx_arcsec,
            ry_arcsec: -self.ry_arcsec,
            rz_arcsec: -self.rz_arcsec,
        }
    }

    fn apply(&self, point: DVec3) -> DVec3 {
        let scale = 1.0 + self.scale_ppm * 1e-6;
        let rx = (self.rx_arcsec / 3600.0).to_radians();
        let ry = (self.ry_arcsec / 3600.0).to_radians();
        let rz = (self.rz_arcsec / 3600.0).to_radians();
        DVec3::new(
            self.tx + point.x * scale - point.y * rz + point.z * ry,
            self.ty + point.x * rz + point.y * scale - point.z * rx,
            self.tz - point.x * ry + point.y * rx + point.z * scale,
        )
    }
}

/// 横轴墨卡托网格定义及其本地基准到 WGS84 的转换参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDefinition {
    pub name: &'static str,
    pub ellipsoid: Ellipsoid,
    pub scale_factor: f64,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    pub to_wgs84: HelmertShift,
}

impl GridDefinition {
    /// 英国国家网格（OSGB36, EPSG:27700）。
    pub fn british_national_grid() -> Self {
        Self {
            name: "British National Grid",
            ellipsoid: Ellipsoid::AIRY_1830,
            scale_factor: 0.999_601_271_7,
            origin_latitude: 49.0,
            origin_longitude: -2.0,
            false_easting: 400_000.0,
            false_northing: -100_000.0,
            to_wgs84: HelmertShift {
                tx: 446.448,
                ty: -125.157,
                tz: 542.060,
                scale_ppm: -20.4894,
                rx_arcsec: 0.1502,
                ry_arcsec: 0.2470,
                rz_arcsec: 0.8421,
            },
        }
    }

    /// 爱尔兰网格（TM75, EPSG:29903）。
    pub fn irish_grid() -> Self {
        Self {
            name: "Irish Grid",
            ellipsoid: Ellipsoid::AIRY_MODIFIED,
            scale_factor: 1.000_035,
            origin_latitude: 53.5,
            origin_longitude: -8.0,
            false_easting: 200_000.0,
            false_northing: 250_000.0,
            to_wgs84: HelmertShift {
                tx: 482.530,
                ty: -130.596,
                tz: 564.557,
                scale_ppm: 8.150,
                rx_arcsec: -1.042,
                ry_arcsec: -0.214,
                rz_arcsec: -0.631,
            },
        }
    }

    fn meridional_arc(&self, phi: f64) -> f64 {
        let a = self.ellipsoid.semi_major;
        let b = self.ellipsoid.semi_minor;
        let n = (a - b) / (a + b);
        let n2 = n * n;
        let n3 = n2 * n;
        let phi0 = self.origin_latitude.to_radians();
        let diff = phi - phi0;
        let sum = phi + phi0;

        let ma = (1.0 + n + 1.25 * n2 + 1.25 * n3) * diff;
        let mb = (3.0 * n + 3.0 * n2 + 2.625 * n3) * diff.sin() * sum.cos();
        let mc = (1.875 * n2 + 1.875 * n3) * (2.0 * diff).sin() * (2.0 * sum).cos();
        let md = (35.0 / 24.0) * n3 * (3.0 * diff).sin() * (3.0 * sum).cos();
        b * self.scale_factor * (ma - mb + mc - md)
    }

    /// 网格坐标转本地基准经纬度（度）。
    pub fn to_datum(&self, easting: f64, northing: f64) -> Result<GeoCoord, CoordinateError> {
        let a = self.ellipsoid.semi_major;
        let af0 = a * self.scale_factor;
        let e2 = self.ellipsoid.eccentricity_squared();
        let northing_offset = northing - self.false_northing;

        let mut phi = self.origin_latitude.to_radians();
        let mut arc = 0.0;
        let mut converged = false;
        for _ in 0..MAX_ITERATIONS {
            phi += (northing_offset - arc) / af0;
            arc = self.meridional_arc(phi);
            if !phi.is_finite() {
                break;
            }
            if (northing_offset - arc).abs() < ARC_TOLERANCE {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(CoordinateError::NoConvergence);
        }

        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = sin_phi / cos_phi;
        let sec_phi = 1.0 / cos_phi;
        let denom = 1.0 - e2 * sin_phi * sin_phi;
        let nu = af0 / denom.sqrt();
        let rho = af0 * (1.0 - e2) / denom.powf(1.5);
        let eta2 = nu / rho - 1.0;
        let t2 = tan_phi * tan_phi;
        let t4 = t2 * t2;
        let t6 = t4 * t2;

        let vii = tan_phi / (2.0 * rho * nu);
        let viii = tan_phi / (24.0 * rho * nu.powi(3)) * (5.0 + 3.0 * t2 + eta2 - 9.0 * t2 * eta2);
        let ix = tan_phi / (720.0 * rho * nu.powi(5)) * (61.0 + 90.0 * t2 + 45.0 * t4);
        let x = sec_phi / nu;
        let xi = sec_phi / (6.0 * nu.powi(3)) * (nu / rho + 2.0 * t2);
        let xii = sec_phi / (120.0 * nu.powi(5)) * (5.0 + 28.0 * t2 + 24.0 * t4);
        let xiia =
            sec_phi / (5040.0 * nu.powi(7)) * (61.0 + 662.0 * t2 + 1320.0 * t4 + 720.0 * t6);

        let de = easting - self.false_easting;
        let de2 = de * de;
        let latitude = phi - vii * de2 + viii * de2 * de2 - ix * de2 * de2 * de2;
        let longitude = self.origin_longitude.to_radians() + x * de - xi * de2 * de
            + xii * de2 * de2 * de
            - xiia * de2 * de2 * de2 * de;

        Ok(GeoCoord::new(latitude.to_degrees(), longitude.to_degrees()))
    }

    /// 本地基准经纬度（度）转网格坐标。
    pub fn from_datum(&self, datum: GeoCoord) -> Point2 {
        let a = self.ellipsoid.semi_major;
        let af0 = a * self.scale_factor;
        let e2 = self.ellipsoid.eccentricity_squared();
        let phi = datum.latitude.to_radians();

        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = sin_phi / cos_phi;
        let denom = 1.0 - e2 * sin_phi * sin_phi;
        let nu = af0 / denom.sqrt();
        let rho = af0 * (1.0 - e2) / denom.powf(1.5);
        let eta2 = nu / rho - 1.0;
        let t2 = tan_phi * tan_phi;
        let t4 = t2 * t2;
        let cos3 = cos_phi.powi(3);
        let cos5 = cos_phi.powi(5);

        let i = self.meridional_arc(phi) + self.false_northing;
        let ii = nu / 2.0 * sin_phi * cos_phi;
        let iii = nu / 24.0 * sin_phi * cos3 * (5.0 - t2 + 9.0 * eta2);
        let iiia = nu / 720.0 * sin_phi * cos5 * (61.0 - 58.0 * t2 + t4);
        let iv = nu * cos_phi;
        let v = nu / 6.0 * cos3 * (nu / rho - t2);
        let vi = nu / 120.0 * cos5 * (5.0 - 18.0 * t2 + t4 + 14.0 * eta2 - 58.0 * t2 * eta2);

        let dl = datum.longitude.to_radians() - self.origin_longitude.to_radians();
        let dl2 = dl * dl;
        let northing = i + ii * dl2 + iii * dl2 * dl2 + iiia * dl2 * dl2 * dl2;
        let easting = self.false_easting + iv * dl + v * dl2 * dl + vi * dl2 * dl2 * dl;
        Point2::new(easting, northing)
    }
}

/// 有效作业区域（经纬度范围，闭区间）。超出范围的转换结果判为无效，不做截断。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingRegion {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl OperatingRegion {
    /// 覆盖大不列颠与爱尔兰。
    pub const BRITISH_ISLES: Self = Self {
        min_latitude: 49.0,
        max_latitude: 61.0,
        min_longitude: -11.0,
        max_longitude: 2.0,
    };

    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> Result<Self, EngineError> {
        let region = Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        };
        let corners_valid = GeoCoord::new(min_latitude, min_longitude).is_valid()
            && GeoCoord::new(max_latitude, max_longitude).is_valid();
        if !corners_valid || min_latitude >= max_latitude || min_longitude >= max_longitude {
            return Err(EngineError::InvalidConfiguration(format!(
                "operating region lat [{min_latitude}, {max_latitude}] lon [{min_longitude}, {max_longitude}] is empty or out of range"
            )));
        }
        Ok(region)
    }

    #[inline]
    pub fn contains(&self, geo: GeoCoord) -> bool {
        geo.is_valid()
            && geo.latitude >= self.min_latitude
            && geo.latitude <= self.max_latitude
            && geo.longitude >= self.min_longitude
            && geo.longitude <= self.max_longitude
    }
}

impl Default for OperatingRegion {
    fn default() -> Self {
        Self::BRITISH_ISLES
    }
}

/// 网格坐标与地理坐标（WGS84）之间的双向转换。实现必须是纯函数且确定。
pub trait CoordinateTransformer {
    fn to_geographic(&self, grid: Point2) -> Result<GeoCoord, CoordinateError>;
    fn to_grid(&self, geo: GeoCoord) -> Result<Point2, CoordinateError>;
}

impl<T: CoordinateTransformer + ?Sized> CoordinateTransformer for Box<T> {
    fn to_geographic(&self, grid: Point2) -> Result<GeoCoord, CoordinateError> {
        (**self).to_geographic(grid)
    }

    fn to_grid(&self, geo: GeoCoord) -> Result<Point2, CoordinateError> {
        (**self).to_grid(geo)
    }
}

/// 基于 [`GridDefinition`] 的转换器，结果限定在作业区域内。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransformer {
    definition: GridDefinition,
    region: OperatingRegion,
}

impl GridTransformer {
    pub fn new(definition: GridDefinition, region: OperatingRegion) -> Self {
        Self { definition, region }
    }

    pub fn british_national_grid() -> Self {
        Self::new(
            GridDefinition::british_national_grid(),
            OperatingRegion::default(),
        )
    }

    #[inline]
    pub fn definition(&self) -> &GridDefinition {
        &self.definition
    }

    #[inline]
    pub fn region(&self) -> &OperatingRegion {
        &self.region
    }

    fn check_region(&self, geo: GeoCoord) -> Result<GeoCoord, CoordinateError> {
        if self.region.contains(geo) {
            Ok(geo)
        } else {
            Err(CoordinateError::OutsideRegion {
                latitude: geo.latitude,
                longitude: geo.longitude,
            })
        }
    }
}

impl CoordinateTransformer for GridTransformer {
    fn to_geographic(&self, grid: Point2) -> Result<GeoCoord, CoordinateError> {
        if !grid.is_finite() {
            return Err(CoordinateError::NonFinite {
                x: grid.x(),
                y: grid.y(),
            });
        }
        let datum = self.definition.to_datum(grid.x(), grid.y())?;
        let local = self
            .definition
            .ellipsoid
            .to_cartesian(datum.latitude.to_radians(), datum.longitude.to_radians());
        let wgs = self.definition.to_wgs84.apply(local);
        let (phi, lambda) = Ellipsoid::WGS84.to_geodetic(wgs)?;
        self.check_region(GeoCoord::new(phi.to_degrees(), lambda.to_degrees()))
    }

    fn to_grid(&self, geo: GeoCoord) -> Result<Point2, CoordinateError> {
        if !geo.latitude.is_finite() || !geo.longitude.is_finite() {
            return Err(CoordinateError::NonFinite {
                x: geo.longitude,
                y: geo.latitude,
            });
        }
        let geo = self.check_region(geo)?;
        let wgs = Ellipsoid::WGS84.to_cartesian(geo.latitude.to_radians(), geo.longitude.to_radians());
        let local = self.definition.to_wgs84.inverse().apply(wgs);
        let (phi, lambda) = self.definition.ellipsoid.to_geodetic(local)?;
        Ok(self
            .definition
            .from_datum(GeoCoord::new(phi.to_degrees(), lambda.to_degrees())))
    }
}

type CacheKey = (u64, u64);

/// 转换缓存默认最多保留的条目数。
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

/// 显式注入的转换缓存，以 (东, 北) 的精确位模式为键，成功与失败结果都会缓存。
/// 仅缓存网格到地理方向。条目数达到上限后，下一次未命中的插入会先清空整个缓存。
#[derive(Debug)]
pub struct CachedTransformer<T> {
    inner: T,
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, Result<GeoCoord, CoordinateError>>>,
}

impl<T: CoordinateTransformer> CachedTransformer<T> {
    pub fn new(inner: T) -> Self {
        Self::with_capacity_limit(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// `capacity` 为 0 时按 1 处理。
    pub fn with_capacity_limit(inner: T, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Result<GeoCoord, CoordinateError>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: CoordinateTransformer> CoordinateTransformer for CachedTransformer<T> {
    fn to_geographic(&self, grid: Point2) -> Result<GeoCoord, CoordinateError> {
        let key = (grid.x().to_bits(), grid.y().to_bits());
        if let Some(hit) = self.lock().get(&key) {
            return *hit;
        }
        let result = self.inner.to_geographic(grid);
        let mut entries = self.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            debug!(capacity = self.capacity, "转换缓存已满，清空后重新累积");
            entries.clear();
        }
        entries.insert(key, result);
        result
    }

    fn to_grid(&self, geo: GeoCoord) -> Result<Point2, CoordinateError> {
        self.inner.to_grid(geo)
    }
}

/// 批量定位结果：成功的点与逐点诊断。
#[derive(Debug, Clone, Default)]
pub struct LocateOutcome {
    pub points: Vec<LocatedPoint>,
    pub diagnostics: DiagnosticReport,
}

impl LocateOutcome {
    pub fn skipped(&self) -> usize {
        self.diagnostics.count(DiagnosticKind::InvalidCoordinate)
    }
}

/// 将钻孔记录转换为带地理坐标的点。转换失败的记录被跳过并记入诊断，不会中断批处理。
pub fn locate_boreholes<T>(boreholes: &[Borehole], transformer: &T) -> LocateOutcome
where
    T: CoordinateTransformer + ?Sized,
{
    let mut outcome = LocateOutcome::default();
    for borehole in boreholes {
        match transformer.to_geographic(borehole.grid) {
            Ok(geo) => outcome.points.push(LocatedPoint::new(
                borehole.id.clone(),
                borehole.grid,
                geo,
            )),
            Err(err) => {
                warn!(
                    id = %borehole.id,
                    easting = borehole.grid.x(),
                    northing = borehole.grid.y(),
                    error = %err,
                    "坐标转换失败，跳过该钻孔"
                );
                outcome.diagnostics.record(
                    DiagnosticKind::InvalidCoordinate,
                    Some(borehole.id.as_str()),
                    err.to_string(),
                );
            }
        }
    }
    if outcome.skipped() > 0 {
        info!(
            located = outcome.points.len(),
            skipped = outcome.skipped(),
            "部分钻孔坐标无效"
        );
    } else {
        debug!(located = outcome.points.len(), "钻孔定位完成");
    }
    outcome
}

/// 将地理坐标系下的形状转换到网格坐标系。矩形在网格中不再轴对齐，因此转为四角多边形。
pub fn reframe_to_grid<T>(drawn: &DrawnShape, transformer: &T) -> Result<DrawnShape, CoordinateError>
where
    T: CoordinateTransformer + ?Sized,
{
    if drawn.frame == CoordinateFrame::Grid {
        return Ok(drawn.clone());
    }
    let to_grid = |point: Point2| transformer.to_grid(GeoCoord::from_point(point));
    let shape = match &drawn.shape {
        Shape::Rectangle { min, max } => {
            let corners = [
                Point2::new(min.x(), min.y()),
                Point2::new(max.x(), min.y()),
                Point2::new(max.x(), max.y()),
                Point2::new(min.x(), max.y()),
            ];
            Shape::Polygon {
                ring: corners
                    .into_iter()
                    .map(to_grid)
                    .collect::<Result<Vec<_>, _>>()?,
            }
        }
        other => other.try_map_vertices(to_grid)?,
    };
    Ok(DrawnShape::grid(shape))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual} (tolerance {tolerance})"
        );
    }

    #[test]
    fn national_grid_matches_ordnance_survey_worked_example() {
        let bng = GridDefinition::british_national_grid();
        let datum = bng.to_datum(651_409.903, 313_177.270).expect("converges");
        let expected_lat = 52.0 + 39.0 / 60.0 + 27.2531 / 3600.0;
        let expected_lon = 1.0 + 43.0 / 60.0 + 4.5177 / 3600.0;
        assert_close(datum.latitude, expected_lat, 1e-7);
        assert_close(datum.longitude, expected_lon, 1e-7);

        let grid = bng.from_datum(GeoCoord::new(expected_lat, expected_lon));
        assert_close(grid.x(), 651_409.903, 0.01);
        assert_close(grid.y(), 313_177.270, 0.01);
    }

    #[test]
    fn central_london_lands_near_expected_wgs84_position() {
        let transformer = GridTransformer::british_national_grid();
        let geo = transformer
            .to_geographic(Point2::new(530_000.0, 180_000.0))
            .expect("central London is inside the region");
        assert_close(geo.latitude, 51.50, 0.02);
        assert_close(geo.longitude, -0.13, 0.02);
    }

    #[test]
    fn dublin_on_irish_grid() {
        let transformer =
            GridTransformer::new(GridDefinition::irish_grid(), OperatingRegion::default());
        let geo = transformer
            .to_geographic(Point2::new(315_500.0, 233_300.0))
            .expect("Dublin is inside the region");
        assert_close(geo.latitude, 53.35, 0.05);
        assert_close(geo.longitude, -6.26, 0.05);
    }

    #[test]
    fn grid_round_trip_within_half_metre() {
        for definition in [GridDefinition::british_national_grid(), GridDefinition::irish_grid()] {
            let transformer = GridTransformer::new(definition, OperatingRegion::default());
            let mut checked = 0;
            for easting in (150_000..=550_000).step_by(100_000) {
                for northing in (50_000..=950_000).step_by(150_000) {
                    let grid = Point2::new(easting as f64 + 0.37, northing as f64 + 0.81);
                    let Ok(geo) = transformer.to_geographic(grid) else {
                        continue;
                    };
                    let back = transformer.to_grid(geo).expect("round trip back to grid");
                    assert!(
                        grid.distance(back) < 0.5,
                        "{}: {grid:?} came back as {back:?}",
                        definition.name
                    );
                    checked += 1;
                }
            }
            assert!(checked > 10, "{}: only {checked} in-region samples", definition.name);
        }
    }

    #[test]
    fn results_outside_region_are_rejected_not_clamped() {
        let transformer = GridTransformer::british_national_grid();
        let err = transformer
            .to_geographic(Point2::new(400_000.0, -3_000_000.0))
            .unwrap_err();
        assert!(matches!(err, CoordinateError::OutsideRegion { .. }));

        let err = transformer.to_grid(GeoCoord::new(40.0, -3.0)).unwrap_err();
        assert!(matches!(err, CoordinateError::OutsideRegion { .. }));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let transformer = GridTransformer::british_national_grid();
        let err = transformer
            .to_geographic(Point2::new(f64::NAN, 100.0))
            .unwrap_err();
        assert!(matches!(err, CoordinateError::NonFinite { .. }));
        let err = transformer
            .to_grid(GeoCoord::new(f64::INFINITY, 0.0))
            .unwrap_err();
        assert!(matches!(err, CoordinateError::NonFinite { .. }));
    }

    #[test]
    fn operating_region_validation() {
        assert!(OperatingRegion::new(49.0, 61.0, -11.0, 2.0).is_ok());
        assert!(matches!(
            OperatingRegion::new(61.0, 49.0, -11.0, 2.0),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(OperatingRegion::new(-95.0, 10.0, 0.0, 1.0).is_err());
    }

    struct CountingTransformer {
        calls: AtomicUsize,
    }

    impl CoordinateTransformer for CountingTransformer {
        fn to_geographic(&self, grid: Point2) -> Result<GeoCoord, CoordinateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if grid.x() < 0.0 {
                Err(CoordinateError::OutsideRegion {
                    latitude: 0.0,
                    longitude: grid.x(),
                })
            } else {
                Ok(GeoCoord::new(grid.y() / 1000.0, grid.x() / 1000.0))
            }
        }

        fn to_grid(&self, geo: GeoCoord) -> Result<Point2, CoordinateError> {
            Ok(Point2::new(geo.longitude * 1000.0, geo.latitude * 1000.0))
        }
    }

    #[test]
    fn cache_reuses_successes_and_failures() {
        let cached = CachedTransformer::new(CountingTransformer {
            calls: AtomicUsize::new(0),
        });
        let first = cached.to_geographic(Point2::new(10.0, 20.0));
        let second = cached.to_geographic(Point2::new(10.0, 20.0));
        assert_eq!(first, second);
        let _ = cached.to_geographic(Point2::new(-1.0, 0.0));
        let _ = cached.to_geographic(Point2::new(-1.0, 0.0));

        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.len(), 2);
        cached.clear();
        assert!(cached.is_empty());
    }

    #[test]
    fn cache_never_grows_past_its_limit() {
        let cached = CachedTransformer::with_capacity_limit(
            CountingTransformer {
                calls: AtomicUsize::new(0),
            },
            3,
        );
        assert_eq!(cached.capacity(), 3);
        for index in 0..10 {
            let _ = cached.to_geographic(Point2::new(index as f64, 0.0));
            assert!(cached.len() <= 3, "第 {index} 次后缓存条目数 {}", cached.len());
        }

        // 第 10 个点在清空后写入，仍然命中
        let calls = cached.inner().calls.load(Ordering::SeqCst);
        let _ = cached.to_geographic(Point2::new(9.0, 0.0));
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), calls);

        let minimal = CachedTransformer::with_capacity_limit(
            CountingTransformer {
                calls: AtomicUsize::new(0),
            },
            0,
        );
        assert_eq!(minimal.capacity(), 1);
        assert_eq!(
            CachedTransformer::new(GridTransformer::british_national_grid()).capacity(),
            DEFAULT_CACHE_CAPACITY
        );
    }

    #[test]
    fn locate_skips_invalid_points_and_reports_them() {
        let boreholes = vec![
            Borehole::new("BH1", 530_000.0, 180_000.0),
            Borehole::new("BH2", f64::NAN, 180_000.0),
            Borehole::new("BH3", 400_000.0, -3_000_000.0),
            Borehole::new("BH4", 531_000.0, 181_000.0),
        ];
        let outcome = locate_boreholes(&boreholes, &GridTransformer::british_national_grid());
        let ids: Vec<_> = outcome.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["BH1", "BH4"]);
        assert_eq!(outcome.skipped(), 2);
        assert_eq!(
            outcome
                .diagnostics
                .subjects(DiagnosticKind::InvalidCoordinate, 5),
            vec!["BH2", "BH3"]
        );
        assert!(outcome.points.iter().all(|p| p.geo.is_valid()));
    }

    #[test]
    fn reframe_rectangle_becomes_polygon_in_grid() {
        let transformer = CountingTransformer {
            calls: AtomicUsize::new(0),
        };
        let drawn = DrawnShape::geographic(Shape::rectangle(
            Point2::new(1.0, 2.0),
            Point2::new(3.0, 4.0),
        ));
        let reframed = reframe_to_grid(&drawn, &transformer).expect("reframe");
        assert_eq!(reframed.frame, CoordinateFrame::Grid);
        match reframed.shape {
            Shape::Polygon { ring } => {
                assert_eq!(ring.len(), 4);
                assert_eq!(ring[0], Point2::new(1000.0, 2000.0));
                assert_eq!(ring[2], Point2::new(3000.0, 4000.0));
            }
            other => panic!("expected polygon, got {other:?}"),
        }

        let line = DrawnShape::geographic(Shape::line(
            [Point2::new(0.5, 0.5), Point2::new(0.6, 0.5)],
            25.0,
        ));
        let reframed = reframe_to_grid(&line, &transformer).expect("reframe line");
        assert_eq!(
            reframed.shape,
            Shape::line([Point2::new(500.0, 500.0), Point2::new(600.0, 500.0)], 25.0)
        );
    }
}
