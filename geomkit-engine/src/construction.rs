//! 构造操作：过点作垂线、平行线，线段中点，以及以线段长度为半径的圆/球。

use geomkit_core::geometry::Vector3;
use geomkit_core::store::{Appearance, Circle, Point, Segment, StoreError};
use serde::Serialize;
use tracing::debug;

use crate::errors::EngineError;
use crate::session::Session;

const PERPENDICULAR_COLOR: &str = "#FF00FF";
const PARALLEL_COLOR: &str = "#00AAFF";
const CIRCLE_COLOR: &str = "#FFA500";

/// 一次构造新增的实体。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Construction {
    Line { point: Point, segment: Segment },
    Midpoint { point: Point },
    Circle { circle: Circle },
}

impl Construction {
    /// 新增点的名称；圆不新增点。
    pub fn point_name(&self) -> Option<&str> {
        match self {
            Construction::Line { point, .. } | Construction::Midpoint { point } => {
                Some(&point.name)
            }
            Construction::Circle { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LineKind {
    Perpendicular,
    Parallel,
}

impl LineKind {
    fn prefix(self) -> &'static str {
        match self {
            LineKind::Perpendicular => "perp_end",
            LineKind::Parallel => "parallel_end",
        }
    }

    fn appearance(self) -> Appearance {
        match self {
            LineKind::Perpendicular => Appearance::dashed(PERPENDICULAR_COLOR),
            LineKind::Parallel => Appearance::dashed(PARALLEL_COLOR),
        }
    }

    /// 只取线段方向的 XY 分量。
    fn offset(self, direction: Vector3) -> Vector3 {
        match self {
            LineKind::Perpendicular => direction.perpendicular_xy(),
            LineKind::Parallel => direction.planar(),
        }
    }
}

impl Session {
    /// 过点 `point` 作线段 `segment` 的垂线（XY 平面内旋转 90°），新点继承 `point` 的 z。
    pub fn create_perpendicular(
        &mut self,
        point: &str,
        segment: &str,
    ) -> Result<Construction, EngineError> {
        self.construct_line(point, segment, LineKind::Perpendicular)
    }

    /// 过点 `point` 作线段 `segment` 的平行线，只平移 XY 分量。
    pub fn create_parallel(
        &mut self,
        point: &str,
        segment: &str,
    ) -> Result<Construction, EngineError> {
        self.construct_line(point, segment, LineKind::Parallel)
    }

    fn construct_line(
        &mut self,
        point: &str,
        segment: &str,
        kind: LineKind,
    ) -> Result<Construction, EngineError> {
        let origin = self
            .store()
            .point(point)
            .map(|p| p.position)
            .ok_or_else(|| StoreError::UnknownPoint(point.to_string()))?;
        let direction = self.store().segment_vector(segment)?;
        let target = origin.translate(kind.offset(direction));

        let name = self.fresh_name_where(kind.prefix(), |store, candidate| {
            !store.contains_segment(&store.segment_name(point, candidate))
        })?;
        let new_point = self
            .store_mut()
            .add_point(name.as_str(), target.x(), target.y(), target.z())?;
        let new_segment = match self
            .store_mut()
            .add_segment(point, &name, kind.appearance())
        {
            Ok(segment) => segment,
            Err(err) => {
                self.store_mut().delete_point(&name)?;
                return Err(err.into());
            }
        };

        debug!(
            kind = ?kind,
            through = point,
            base = segment,
            point = %new_point.name,
            segment = %new_segment.name,
            "已构造辅助线"
        );
        Ok(Construction::Line {
            point: new_point,
            segment: new_segment,
        })
    }

    /// 在线段三个坐标的算术平均处新增中点，命名为 `mid_{segment}_N`。
    pub fn create_midpoint(&mut self, segment: &str) -> Result<Construction, EngineError> {
        let (start, end) = self.store().segment_endpoints(segment)?;
        let middle = start.midpoint(end);
        let name = self.fresh_name(&format!("mid_{segment}"))?;
        let point = self
            .store_mut()
            .add_point(name, middle.x(), middle.y(), middle.z())?;
        debug!(segment, point = %point.name, "已构造中点");
        Ok(Construction::Midpoint { point })
    }

    /// 以 `center` 为圆心、线段 `radius_segment` 当前长度为半径创建圆/球。
    /// 半径只在创建时计算一次。
    pub fn create_circle(
        &mut self,
        center: &str,
        radius_segment: &str,
    ) -> Result<Construction, EngineError> {
        if !self.store().contains_point(center) {
            return Err(StoreError::UnknownPoint(center.to_string()).into());
        }
        let radius = self.store().segment_length(radius_segment)?;
        let name = self.fresh_name("circle")?;
        let circle =
            self.store_mut()
                .add_circle(name, center, radius, Appearance::dashed(CIRCLE_COLOR))?;
        debug!(center, radius, circle = %circle.name, "已构造圆");
        Ok(Construction::Circle { circle })
    }
}
