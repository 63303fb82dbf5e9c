use std::collections::HashMap;

use geosect_core::borehole::{Borehole, BoreholeId, LocatedPoint};
use geosect_core::section::{Page, Projection, SectionLine};
use geosect_core::shape::{CoordinateFrame, DrawnShape, Shape};
use tracing::{debug, info, warn};

use crate::diagnostics::{DiagnosticKind, DiagnosticReport};
use crate::errors::EngineError;
use crate::paginator::paginate;
use crate::projector::project;
use crate::selector::{SelectionOutcome, SpatialSelector};
use crate::transform::{CoordinateTransformer, LocateOutcome, locate_boreholes, reframe_to_grid};

/// 剖面渲染输入：按里程排序的投影及与之一一对应的钻孔记录。
#[derive(Debug, Clone, Default)]
pub struct CrossSection {
    pub projections: Vec<Projection>,
    pub boreholes: Vec<Borehole>,
    pub line_length: f64,
}

impl CrossSection {
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Projection, &Borehole)> + '_ {
        self.projections.iter().zip(self.boreholes.iter())
    }
}

/// 单孔柱状图渲染输入。
#[derive(Debug, Clone, PartialEq)]
pub struct BoreholeLog {
    pub id: BoreholeId,
    pub pages: Vec<Page>,
}

/// 将坐标转换、选区、投影与分页串起来的处理管线。
///
/// 管线本身不持有数据，只持有转换器、选区器与分页高度，每次调用都作用于传入的记录。
#[derive(Debug)]
pub struct Pipeline<T> {
    transformer: T,
    selector: SpatialSelector,
    page_depth_span: f64,
}

impl<T: CoordinateTransformer> Pipeline<T> {
    pub fn new(
        transformer: T,
        selector: SpatialSelector,
        page_depth_span: f64,
    ) -> Result<Self, EngineError> {
        if !page_depth_span.is_finite() || page_depth_span <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "page depth span must be a positive distance, got {page_depth_span}"
            )));
        }
        Ok(Self {
            transformer,
            selector,
            page_depth_span,
        })
    }

    #[inline]
    pub fn selector(&self) -> &SpatialSelector {
        &self.selector
    }

    #[inline]
    pub fn page_depth_span(&self) -> f64 {
        self.page_depth_span
    }

    pub fn locate(&self, boreholes: &[Borehole]) -> LocateOutcome {
        locate_boreholes(boreholes, &self.transformer)
    }

    /// 线缓冲区以米为单位，地理坐标下绘制的线先转换到网格坐标再筛选。
    pub fn select(&self, points: &[LocatedPoint], drawn: &DrawnShape) -> SelectionOutcome {
        let needs_grid =
            matches!(drawn.shape, Shape::Line { .. }) && drawn.frame == CoordinateFrame::Geographic;
        if !needs_grid {
            return self.selector.select(points, drawn);
        }
        match reframe_to_grid(drawn, &self.transformer) {
            Ok(grid) => self.selector.select(points, &grid),
            Err(err) => {
                warn!(error = %err, "线缓冲区无法转换到网格坐标");
                let mut outcome = SelectionOutcome::default();
                outcome.diagnostics.record(
                    DiagnosticKind::MalformedShape,
                    None,
                    format!("line vertex cannot be converted: {err}"),
                );
                outcome
            }
        }
    }

    /// 由绘制的线构造网格坐标下的剖面线。
    pub fn section_line(&self, drawn: &DrawnShape) -> Result<SectionLine, EngineError> {
        if !matches!(drawn.shape, Shape::Line { .. }) {
            return Err(EngineError::MalformedShape(format!(
                "section line must be a line, got {}",
                drawn.shape.kind_name()
            )));
        }
        let grid = reframe_to_grid(drawn, &self.transformer)
            .map_err(|err| EngineError::MalformedShape(err.to_string()))?;
        SectionLine::try_new(grid.shape.vertices())
            .map_err(|defect| EngineError::MalformedShape(defect.describe().to_string()))
    }

    /// 将已选中的点投影到剖面线上，并附上对应的钻孔记录。
    pub fn cross_section(
        &self,
        boreholes: &[Borehole],
        selected: &[LocatedPoint],
        drawn: &DrawnShape,
    ) -> Result<CrossSection, EngineError> {
        let line = self.section_line(drawn)?;
        let by_id: HashMap<&BoreholeId, &Borehole> =
            boreholes.iter().map(|borehole| (&borehole.id, borehole)).collect();

        let projections = project(selected, &line);
        let boreholes = projections
            .iter()
            .map(|projection| {
                by_id
                    .get(&projection.id)
                    .map(|borehole| (*borehole).clone())
                    .ok_or_else(|| EngineError::BoreholeNotFound(projection.id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            boreholes = projections.len(),
            line_length = line.length(),
            "剖面生成完成"
        );
        Ok(CrossSection {
            projections,
            boreholes,
            line_length: line.length(),
        })
    }

    /// 对指定钻孔分页。
    pub fn log(&self, boreholes: &[Borehole], id: &str) -> Result<BoreholeLog, EngineError> {
        let borehole = boreholes
            .iter()
            .find(|borehole| borehole.id.as_str() == id)
            .ok_or_else(|| EngineError::BoreholeNotFound(id.to_string()))?;
        let pages = paginate(&borehole.intervals, self.page_depth_span)?;
        debug!(id, pages = pages.len(), "柱状图分页完成");
        Ok(BoreholeLog {
            id: borehole.id.clone(),
            pages,
        })
    }

    /// 依次执行定位与选区，合并两步的诊断。
    pub fn locate_and_select(
        &self,
        boreholes: &[Borehole],
        drawn: &DrawnShape,
    ) -> (SelectionOutcome, DiagnosticReport) {
        let located = self.locate(boreholes);
        let selection = self.select(&located.points, drawn);
        let mut diagnostics = located.diagnostics;
        diagnostics.merge(selection.diagnostics.clone());
        (selection, diagnostics)
    }
}
