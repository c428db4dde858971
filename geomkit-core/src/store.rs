//! 几何存储：点、线段、圆/球、待显示向量与函数的权威集合。
//!
//! 所有集合都按插入顺序保存；线段只按名称引用端点，每次计算都重新查找端点坐标。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Point3, Vector3};
use crate::resolver::{CoordinateInput, Expression, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("point '{0}' already exists")]
    DuplicateName(String),
    #[error("segment '{0}' already exists")]
    DuplicateSegment(String),
    #[error("circle '{0}' already exists")]
    DuplicateCircle(String),
    #[error("function '{0}' already exists")]
    DuplicateFunction(String),
    #[error("point '{0}' does not exist")]
    UnknownPoint(String),
    #[error("segment '{0}' does not exist")]
    UnknownSegment(String),
    #[error("circle '{0}' does not exist")]
    UnknownCircle(String),
    #[error("function '{0}' does not exist")]
    UnknownFunction(String),
    #[error("displayed vector #{0} does not exist")]
    UnknownDisplayedVector(usize),
    #[error("failed to resolve {axis} coordinate of point '{name}': {source}")]
    CoordinateResolutionFailed {
        name: String,
        axis: Axis,
        #[source]
        source: ResolveError,
    },
    #[error("circle '{name}' has invalid radius {radius}")]
    InvalidRadius { name: String, radius: f64 },
    #[error("function '{name}' is invalid: {reason}")]
    InvalidFunction { name: String, reason: String },
    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    FunctionArity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("failed to evaluate function '{name}': {source}")]
    FunctionEvaluation {
        name: String,
        #[source]
        source: ResolveError,
    },
}

/// 线段、圆等实体的显示属性。内核只保存，不解释。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub color: String,
    pub line_style: String,
}

impl Appearance {
    pub fn new(color: impl Into<String>, line_style: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            line_style: line_style.into(),
        }
    }

    pub fn dashed(color: impl Into<String>) -> Self {
        Self::new(color, "dashed")
    }
}

impl Default for Appearance {
    fn default() -> Self {
        Self::new("#0000FF", "solid")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub name: String,
    pub position: Point3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub start: String,
    pub end: String,
    pub appearance: Appearance,
}

impl Segment {
    #[inline]
    pub fn references(&self, point: &str) -> bool {
        self.start == point || self.end == point
    }
}

/// 圆（2D）或球（3D）。半径在创建时取快照，之后不随线段变化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub name: String,
    pub center: String,
    pub radius: f64,
    pub appearance: Appearance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub symbol: String,
    pub size: f64,
}

/// 向量计算器产生的可视化指令，不属于几何事实。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayedVector {
    pub start: String,
    pub end: String,
    pub label: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
}

impl DisplayedVector {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        label: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            label: label.into(),
            color: color.into(),
            marker: None,
            line_width: None,
        }
    }

    pub fn with_marker(mut self, symbol: impl Into<String>, size: f64) -> Self {
        self.marker = Some(Marker {
            symbol: symbol.into(),
            size,
        });
        self
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = Some(width);
        self
    }

    #[inline]
    pub fn references(&self, point: &str) -> bool {
        self.start == point || self.end == point
    }
}

/// 命名函数。只登记与求值，绘制交给外部。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub expression: Expression,
    pub variables: Vec<String>,
    pub range: (f64, f64),
    pub is_3d: bool,
    pub appearance: Appearance,
}

/// 删除点时会被连带删除的依赖项。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dependents {
    pub segments: Vec<String>,
    pub circles: Vec<String>,
    pub displayed_vectors: Vec<DisplayedVector>,
}

impl Dependents {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.circles.is_empty() && self.displayed_vectors.is_empty()
    }

    fn absorb(&mut self, other: Dependents) {
        self.segments.extend(other.segments);
        self.circles.extend(other.circles);
        self.displayed_vectors.extend(other.displayed_vectors);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRemoval {
    pub point: Point,
    pub dependents: Dependents,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamespaceRemoval {
    pub points: Vec<String>,
    pub dependents: Dependents,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub points: usize,
    pub segments: usize,
    pub displayed_vectors: usize,
    pub calculation_points: usize,
    pub circles: usize,
    pub functions: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GeometryStore {
    points: Vec<Point>,
    segments: Vec<Segment>,
    circles: Vec<Circle>,
    displayed_vectors: Vec<DisplayedVector>,
    functions: Vec<FunctionDef>,
    segment_separator: String,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 线段名 = 起点名 + 分隔符 + 终点名；默认分隔符为空串。
    pub fn with_segment_separator(separator: impl Into<String>) -> Self {
        Self {
            segment_separator: separator.into(),
            ..Self::default()
        }
    }

    pub fn segment_name(&self, start: &str, end: &str) -> String {
        format!("{start}{}{end}", self.segment_separator)
    }

    // ---- 点 ----

    /// 三个坐标全部解析成功后才插入；任一失败都不修改存储。
    pub fn add_point(
        &mut self,
        name: impl Into<String>,
        x: impl Into<CoordinateInput>,
        y: impl Into<CoordinateInput>,
        z: impl Into<CoordinateInput>,
    ) -> Result<Point, StoreError> {
        let name = name.into();
        if self.contains_point(&name) {
            return Err(StoreError::DuplicateName(name));
        }
        let position = resolve_position(&name, x.into(), y.into(), z.into())?;
        let point = Point { name, position };
        self.points.push(point.clone());
        Ok(point)
    }

    /// 重新设置已有点的坐标。线段长度随之变化，圆的半径不变。
    pub fn set_point(
        &mut self,
        name: &str,
        x: impl Into<CoordinateInput>,
        y: impl Into<CoordinateInput>,
        z: impl Into<CoordinateInput>,
    ) -> Result<Point, StoreError> {
        let index = self
            .point_index(name)
            .ok_or_else(|| StoreError::UnknownPoint(name.to_string()))?;
        let position = resolve_position(name, x.into(), y.into(), z.into())?;
        self.points[index].position = position;
        Ok(self.points[index].clone())
    }

    #[inline]
    pub fn point(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|point| point.name == name)
    }

    #[inline]
    pub fn contains_point(&self, name: &str) -> bool {
        self.point(name).is_some()
    }

    #[inline]
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    fn point_index(&self, name: &str) -> Option<usize> {
        self.points.iter().position(|point| point.name == name)
    }

    fn position_of(&self, name: &str) -> Result<Point3, StoreError> {
        self.point(name)
            .map(|point| point.position)
            .ok_or_else(|| StoreError::UnknownPoint(name.to_string()))
    }

    /// 预览删除某点时会连带删除的线段、圆和待显示向量。
    pub fn point_dependents(&self, name: &str) -> Result<Dependents, StoreError> {
        if !self.contains_point(name) {
            return Err(StoreError::UnknownPoint(name.to_string()));
        }
        Ok(self.dependents_of(|point| point == name))
    }

    fn dependents_of(&self, is_target: impl Fn(&str) -> bool) -> Dependents {
        Dependents {
            segments: self
                .segments
                .iter()
                .filter(|segment| is_target(&segment.start) || is_target(&segment.end))
                .map(|segment| segment.name.clone())
                .collect(),
            circles: self
                .circles
                .iter()
                .filter(|circle| is_target(&circle.center))
                .map(|circle| circle.name.clone())
                .collect(),
            displayed_vectors: self
                .displayed_vectors
                .iter()
                .filter(|vector| is_target(&vector.start) || is_target(&vector.end))
                .cloned()
                .collect(),
        }
    }

    /// 删除点，并级联删除引用它的线段、圆与待显示向量。返回实际删除的依赖项。
    pub fn delete_point(&mut self, name: &str) -> Result<PointRemoval, StoreError> {
        let index = self
            .point_index(name)
            .ok_or_else(|| StoreError::UnknownPoint(name.to_string()))?;
        let dependents = self.dependents_of(|point| point == name);
        self.segments.retain(|segment| !segment.references(name));
        self.circles.retain(|circle| circle.center != name);
        self.displayed_vectors.retain(|vector| !vector.references(name));
        let point = self.points.remove(index);
        Ok(PointRemoval { point, dependents })
    }

    /// 批量删除名称带有指定前缀的点（临时点、结果点），依赖项同样级联删除。
    pub fn clear_namespace(&mut self, prefix: &str) -> NamespaceRemoval {
        let names: Vec<String> = self
            .points
            .iter()
            .filter(|point| point.name.starts_with(prefix))
            .map(|point| point.name.clone())
            .collect();
        let mut removal = NamespaceRemoval::default();
        for name in names {
            if let Ok(point_removal) = self.delete_point(&name) {
                removal.points.push(point_removal.point.name);
                removal.dependents.absorb(point_removal.dependents);
            }
        }
        removal
    }

    // ---- 线段 ----

    pub fn add_segment(
        &mut self,
        start: &str,
        end: &str,
        appearance: Appearance,
    ) -> Result<Segment, StoreError> {
        for endpoint in [start, end] {
            if !self.contains_point(endpoint) {
                return Err(StoreError::UnknownPoint(endpoint.to_string()));
            }
        }
        let name = self.segment_name(start, end);
        if self.contains_segment(&name) {
            return Err(StoreError::DuplicateSegment(name));
        }
        let segment = Segment {
            name,
            start: start.to_string(),
            end: end.to_string(),
            appearance,
        };
        self.segments.push(segment.clone());
        Ok(segment)
    }

    #[inline]
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.name == name)
    }

    #[inline]
    pub fn contains_segment(&self, name: &str) -> bool {
        self.segment(name).is_some()
    }

    #[inline]
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// 删除线段，不影响端点。
    pub fn delete_segment(&mut self, name: &str) -> Result<Segment, StoreError> {
        let index = self
            .segments
            .iter()
            .position(|segment| segment.name == name)
            .ok_or_else(|| StoreError::UnknownSegment(name.to_string()))?;
        Ok(self.segments.remove(index))
    }

    /// 线段端点的当前坐标 (start, end)。端点缺失时返回 `UnknownPoint`。
    pub fn segment_endpoints(&self, name: &str) -> Result<(Point3, Point3), StoreError> {
        let segment = self
            .segment(name)
            .ok_or_else(|| StoreError::UnknownSegment(name.to_string()))?;
        Ok((
            self.position_of(&segment.start)?,
            self.position_of(&segment.end)?,
        ))
    }

    /// 线段向量（终点减起点），每次都按当前点坐标重新计算。
    pub fn segment_vector(&self, name: &str) -> Result<Vector3, StoreError> {
        let (start, end) = self.segment_endpoints(name)?;
        Ok(start.vector_to(end))
    }

    #[inline]
    pub fn segment_length(&self, name: &str) -> Result<f64, StoreError> {
        self.segment_vector(name).map(Vector3::magnitude)
    }

    /// 按两点名称求向量，不要求两点之间存在线段。
    pub fn vector_between(&self, start: &str, end: &str) -> Result<Vector3, StoreError> {
        Ok(self.position_of(start)?.vector_to(self.position_of(end)?))
    }

    // ---- 圆 / 球 ----

    pub fn add_circle(
        &mut self,
        name: impl Into<String>,
        center: &str,
        radius: f64,
        appearance: Appearance,
    ) -> Result<Circle, StoreError> {
        let name = name.into();
        if !self.contains_point(center) {
            return Err(StoreError::UnknownPoint(center.to_string()));
        }
        if self.circle(&name).is_some() {
            return Err(StoreError::DuplicateCircle(name));
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(StoreError::InvalidRadius { name, radius });
        }
        let circle = Circle {
            name,
            center: center.to_string(),
            radius,
            appearance,
        };
        self.circles.push(circle.clone());
        Ok(circle)
    }

    #[inline]
    pub fn circle(&self, name: &str) -> Option<&Circle> {
        self.circles.iter().find(|circle| circle.name == name)
    }

    #[inline]
    pub fn circles(&self) -> impl Iterator<Item = &Circle> {
        self.circles.iter()
    }

    pub fn delete_circle(&mut self, name: &str) -> Result<Circle, StoreError> {
        let index = self
            .circles
            .iter()
            .position(|circle| circle.name == name)
            .ok_or_else(|| StoreError::UnknownCircle(name.to_string()))?;
        Ok(self.circles.remove(index))
    }

    // ---- 待显示向量 ----

    pub fn push_displayed_vector(&mut self, vector: DisplayedVector) -> Result<(), StoreError> {
        for endpoint in [&vector.start, &vector.end] {
            if !self.contains_point(endpoint) {
                return Err(StoreError::UnknownPoint(endpoint.clone()));
            }
        }
        self.displayed_vectors.push(vector);
        Ok(())
    }

    #[inline]
    pub fn displayed_vectors(&self) -> &[DisplayedVector] {
        &self.displayed_vectors
    }

    pub fn delete_displayed_vector(&mut self, index: usize) -> Result<DisplayedVector, StoreError> {
        if index >= self.displayed_vectors.len() {
            return Err(StoreError::UnknownDisplayedVector(index));
        }
        Ok(self.displayed_vectors.remove(index))
    }

    /// 清空待显示向量，返回被清除的记录。
    pub fn clear_displayed_vectors(&mut self) -> Vec<DisplayedVector> {
        std::mem::take(&mut self.displayed_vectors)
    }

    // ---- 函数 ----

    /// 登记命名函数。表达式必须可解析，且自由变量都在声明的变量列表内
    /// （2D 函数 1 个变量，3D 函数 2 个变量）。
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        variables: &[&str],
        range: (f64, f64),
        is_3d: bool,
        appearance: Appearance,
    ) -> Result<&FunctionDef, StoreError> {
        let name = name.into();
        if self.function(&name).is_some() {
            return Err(StoreError::DuplicateFunction(name));
        }
        let expected = if is_3d { 2 } else { 1 };
        if variables.len() != expected {
            return Err(StoreError::InvalidFunction {
                name,
                reason: format!(
                    "expected {expected} variable(s), got {}",
                    variables.len()
                ),
            });
        }
        if !(range.0.is_finite() && range.1.is_finite() && range.0 < range.1) {
            return Err(StoreError::InvalidFunction {
                name,
                reason: format!("invalid range [{}, {}]", range.0, range.1),
            });
        }
        let expression = match Expression::parse(expression) {
            Ok(expression) => expression,
            Err(err) => {
                return Err(StoreError::InvalidFunction {
                    name,
                    reason: err.to_string(),
                });
            }
        };
        let undeclared: Vec<String> = expression
            .variables()
            .into_iter()
            .filter(|var| !variables.contains(&var.as_str()))
            .collect();
        if !undeclared.is_empty() {
            return Err(StoreError::InvalidFunction {
                name,
                reason: format!("undeclared variable(s): {}", undeclared.join(", ")),
            });
        }
        self.functions.push(FunctionDef {
            name,
            expression,
            variables: variables.iter().map(|var| var.to_string()).collect(),
            range,
            is_3d,
            appearance,
        });
        let index = self.functions.len() - 1;
        Ok(&self.functions[index])
    }

    #[inline]
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|function| function.name == name)
    }

    #[inline]
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.iter()
    }

    /// 按声明顺序绑定参数并求值。
    pub fn evaluate_function(&self, name: &str, args: &[f64]) -> Result<f64, StoreError> {
        let function = self
            .function(name)
            .ok_or_else(|| StoreError::UnknownFunction(name.to_string()))?;
        if args.len() != function.variables.len() {
            return Err(StoreError::FunctionArity {
                name: name.to_string(),
                expected: function.variables.len(),
                actual: args.len(),
            });
        }
        let bindings: Vec<(&str, f64)> = function
            .variables
            .iter()
            .map(String::as_str)
            .zip(args.iter().copied())
            .collect();
        function
            .expression
            .evaluate(&bindings)
            .map_err(|source| StoreError::FunctionEvaluation {
                name: name.to_string(),
                source,
            })
    }

    pub fn delete_function(&mut self, name: &str) -> Result<FunctionDef, StoreError> {
        let index = self
            .functions
            .iter()
            .position(|function| function.name == name)
            .ok_or_else(|| StoreError::UnknownFunction(name.to_string()))?;
        Ok(self.functions.remove(index))
    }

    // ---- 概览 ----

    /// 各类实体数量；名称带 `calculation_prefixes` 任一前缀的点计为计算点。
    pub fn summary(&self, calculation_prefixes: &[&str]) -> StoreSummary {
        StoreSummary {
            points: self.points.len(),
            segments: self.segments.len(),
            displayed_vectors: self.displayed_vectors.len(),
            calculation_points: self
                .points
                .iter()
                .filter(|point| {
                    calculation_prefixes
                        .iter()
                        .any(|prefix| point.name.starts_with(prefix))
                })
                .count(),
            circles: self.circles.len(),
            functions: self.functions.len(),
        }
    }
}

fn resolve_position(
    name: &str,
    x: CoordinateInput,
    y: CoordinateInput,
    z: CoordinateInput,
) -> Result<Point3, StoreError> {
    let resolve_axis = |axis: Axis, input: CoordinateInput| {
        input
            .resolve()
            .map_err(|source| StoreError::CoordinateResolutionFailed {
                name: name.to_string(),
                axis,
                source,
            })
    };
    Ok(Point3::new(
        resolve_axis(Axis::X, x)?,
        resolve_axis(Axis::Y, y)?,
        resolve_axis(Axis::Z, z)?,
    ))
}
