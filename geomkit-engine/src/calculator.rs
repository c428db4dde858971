//! 向量计算器：两个输入向量（点对或字面三元组）上的加、减、点积、叉积、模长与夹角。
//!
//! 每次计算都会把结果物化为结果点，并追加一条从原点出发的待显示向量。

use std::fmt;
use std::str::FromStr;

use geomkit_core::geometry::{Point3, Vector3};
use geomkit_core::resolver;
use geomkit_core::store::DisplayedVector;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::session::Session;

const FIRST_COLOR: &str = "#0000FF";
const SECOND_COLOR: &str = "#00FF00";
const SUM_COLOR: &str = "#FF0000";
const DIFFERENCE_COLOR: &str = "#FF5500";
const DOT_COLOR: &str = "#FF00FF";
const CROSS_COLOR: &str = "#9900FF";
const FIRST_MAGNITUDE_COLOR: &str = "#FF7700";
const SECOND_MAGNITUDE_COLOR: &str = "#0099FF";
const ANGLE_COLOR: &str = "#FF00FF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorOperation {
    Add,
    Subtract,
    Dot,
    Cross,
    MagnitudeFirst,
    MagnitudeSecond,
    Angle,
}

impl VectorOperation {
    /// 结果点名称中使用的标记。
    pub fn tag(self) -> &'static str {
        match self {
            VectorOperation::Add => "add",
            VectorOperation::Subtract => "sub",
            VectorOperation::Dot => "dot",
            VectorOperation::Cross => "cross",
            VectorOperation::MagnitudeFirst => "mag1",
            VectorOperation::MagnitudeSecond => "mag2",
            VectorOperation::Angle => "angle",
        }
    }
}

impl FromStr for VectorOperation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "add" | "+" => Ok(VectorOperation::Add),
            "sub" | "subtract" | "-" => Ok(VectorOperation::Subtract),
            "dot" => Ok(VectorOperation::Dot),
            "cross" => Ok(VectorOperation::Cross),
            "mag1" | "magnitude1" => Ok(VectorOperation::MagnitudeFirst),
            "mag2" | "magnitude2" => Ok(VectorOperation::MagnitudeSecond),
            "angle" => Ok(VectorOperation::Angle),
            other => Err(format!("未知的向量运算: {other}")),
        }
    }
}

impl fmt::Display for VectorOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 向量输入：优先按点对解析，点对不可用时回退到字面 `x,y,z`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorInput {
    pub points: Option<(String, String)>,
    pub literal: Option<String>,
}

impl VectorInput {
    pub fn points(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            points: Some((start.into(), end.into())),
            literal: None,
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            points: None,
            literal: Some(text.into()),
        }
    }

    pub fn with_literal(mut self, text: impl Into<String>) -> Self {
        self.literal = Some(text.into());
        self
    }
}

/// 文本形式：`A->B`、`x,y,z` 或 `A->B|x,y,z`。
impl FromStr for VectorInput {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err("向量输入为空".to_string());
        }
        let (pair, literal) = match value.split_once('|') {
            Some((pair, literal)) => (Some(pair), Some(literal)),
            None if value.contains("->") => (Some(value), None),
            None => (None, Some(value)),
        };
        let points = match pair {
            Some(pair) => {
                let (start, end) = pair
                    .split_once("->")
                    .ok_or_else(|| format!("点对格式应为 起点->终点: {pair}"))?;
                Some((start.trim().to_string(), end.trim().to_string()))
            }
            None => None,
        };
        Ok(Self {
            points,
            literal: literal.map(|text| text.trim().to_string()),
        })
    }
}

/// 解析 `x,y,z`，每个分量都经过坐标解析器。
pub fn parse_literal(text: &str) -> Result<Vector3, String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("需要 3 个分量 (x,y,z)，实际为 {}", parts.len()));
    }
    let mut components = [0.0; 3];
    for (slot, part) in components.iter_mut().zip(&parts) {
        *slot = resolver::resolve(part).map_err(|err| err.to_string())?;
    }
    Ok(Vector3::from(components))
}

/// 参与计算的向量及其在存储中的端点（点对原样使用，字面量物化为临时点）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedVector {
    pub start: String,
    pub end: String,
    pub vector: Vector3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CalcValue {
    Vector(Vector3),
    Scalar(f64),
    /// 夹角计算中存在零向量。
    Undefined,
}

impl fmt::Display for CalcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcValue::Vector(v) => write!(f, "({:.2}, {:.2}, {:.2})", v.x(), v.y(), v.z()),
            CalcValue::Scalar(value) => write!(f, "{value:.2}"),
            CalcValue::Undefined => f.write_str("无定义（存在零向量）"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    pub operation: VectorOperation,
    pub first: ResolvedVector,
    pub second: ResolvedVector,
    pub value: CalcValue,
    /// 物化结果的点名；夹角无定义时为空。
    pub result_point: Option<String>,
}

impl fmt::Display for Calculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, input) in [&self.first, &self.second].into_iter().enumerate() {
            writeln!(
                f,
                "向量{} ({}→{}): {}",
                index + 1,
                input.start,
                input.end,
                CalcValue::Vector(input.vector)
            )?;
        }
        write!(f, "{}: {}", self.operation, self.value)?;
        if matches!(self.operation, VectorOperation::Angle)
            && !matches!(self.value, CalcValue::Undefined)
        {
            f.write_str("°")?;
        }
        if let Some(point) = &self.result_point {
            write!(f, " [{point}]")?;
        }
        Ok(())
    }
}

enum Source {
    Points { start: String, end: String },
    Literal,
}

struct Pending {
    source: Source,
    vector: Vector3,
}

impl Session {
    /// 执行一次向量计算。两个输入都解析成功后才修改存储。
    pub fn calculate(
        &mut self,
        operation: VectorOperation,
        first: &VectorInput,
        second: &VectorInput,
    ) -> Result<Calculation, EngineError> {
        let pending = [self.resolve_input(1, first)?, self.resolve_input(2, second)?];
        let scale = self.calculator_config().scalar_marker_scale;
        let (a, b) = (pending[0].vector, pending[1].vector);

        let (value, result) = match operation {
            VectorOperation::Add => {
                let sum = a + b;
                (
                    CalcValue::Vector(sum),
                    Some((sum, DisplayedVector::new("", "", "加和结果", SUM_COLOR))),
                )
            }
            VectorOperation::Subtract => {
                let difference = a - b;
                (
                    CalcValue::Vector(difference),
                    Some((
                        difference,
                        DisplayedVector::new("", "", "减法结果", DIFFERENCE_COLOR),
                    )),
                )
            }
            VectorOperation::Dot => {
                let dot = a.dot(b);
                (
                    CalcValue::Scalar(dot),
                    Some((
                        Vector3::new(dot * scale, 0.0, 0.0),
                        DisplayedVector::new("", "", format!("点积: {dot:.2}"), DOT_COLOR)
                            .with_marker("o", 10.0),
                    )),
                )
            }
            VectorOperation::Cross => {
                let cross = a.cross(b);
                (
                    CalcValue::Vector(cross),
                    Some((
                        cross,
                        DisplayedVector::new("", "", "叉积结果", CROSS_COLOR).with_line_width(2.0),
                    )),
                )
            }
            VectorOperation::MagnitudeFirst => {
                let magnitude = a.magnitude();
                (
                    CalcValue::Scalar(magnitude),
                    Some((
                        Vector3::new(0.0, magnitude * scale, 0.0),
                        DisplayedVector::new(
                            "",
                            "",
                            format!("模长: {magnitude:.2}"),
                            FIRST_MAGNITUDE_COLOR,
                        )
                        .with_marker("s", 8.0),
                    )),
                )
            }
            VectorOperation::MagnitudeSecond => {
                let magnitude = b.magnitude();
                (
                    CalcValue::Scalar(magnitude),
                    Some((
                        Vector3::new(0.0, 0.0, magnitude * scale),
                        DisplayedVector::new(
                            "",
                            "",
                            format!("模长: {magnitude:.2}"),
                            SECOND_MAGNITUDE_COLOR,
                        )
                        .with_marker("d", 8.0),
                    )),
                )
            }
            VectorOperation::Angle => match a.angle_degrees(b) {
                Some(angle) => {
                    let radians = angle.to_radians();
                    (
                        CalcValue::Scalar(angle),
                        Some((
                            Vector3::new(radians.cos(), radians.sin(), 0.0),
                            DisplayedVector::new("", "", format!("夹角: {angle:.2}°"), ANGLE_COLOR),
                        )),
                    )
                }
                None => (CalcValue::Undefined, None),
            },
        };

        // 结果溢出时在任何写入之前失败，存储保持原样
        let finite = match (&value, &result) {
            (_, Some((position, _))) if !position.is_finite() => false,
            (CalcValue::Vector(v), _) => v.is_finite(),
            (CalcValue::Scalar(x), _) => x.is_finite(),
            (CalcValue::Undefined, _) => true,
        };
        if !finite {
            warn!(operation = %operation, "计算结果超出浮点范围");
            return Err(EngineError::NonFiniteResult {
                operation: operation.tag().to_string(),
            });
        }

        self.store_mut().clear_displayed_vectors();
        let temp_prefix = self.naming().temp_prefix.clone();
        self.store_mut().clear_namespace(&temp_prefix);

        let [first, second] = pending;
        let first = self.materialize(1, first, FIRST_COLOR)?;
        let second = self.materialize(2, second, SECOND_COLOR)?;
        let origin = self.ensure_origin()?;

        let result_point = match result {
            Some((position, mut display)) => {
                let prefix = format!("{}{}", self.naming().result_prefix, operation.tag());
                let name = self.fresh_name(&prefix)?;
                self.store_mut()
                    .add_point(name.as_str(), position.x(), position.y(), position.z())?;
                display.start = origin.clone();
                display.end = name.clone();
                self.store_mut().push_displayed_vector(display)?;
                Some(name)
            }
            None => {
                debug!(operation = %operation, "夹角无定义，不生成结果点");
                None
            }
        };

        info!(operation = %operation, value = %value, "向量计算完成");
        Ok(Calculation {
            operation,
            first,
            second,
            value,
            result_point,
        })
    }

    fn resolve_input(&self, slot: usize, input: &VectorInput) -> Result<Pending, EngineError> {
        if let Some((start, end)) = &input.points {
            match self.store().vector_between(start, end) {
                Ok(vector) => {
                    return Ok(Pending {
                        source: Source::Points {
                            start: start.clone(),
                            end: end.clone(),
                        },
                        vector,
                    });
                }
                Err(err) => debug!(slot, error = %err, "点对不可用，尝试字面量"),
            }
        }
        let Some(text) = &input.literal else {
            let reason = if input.points.is_some() {
                "点对不存在且未提供坐标".to_string()
            } else {
                "未提供点对或坐标".to_string()
            };
            return Err(EngineError::InvalidVectorInput { slot, reason });
        };
        let vector =
            parse_literal(text).map_err(|reason| EngineError::InvalidVectorInput { slot, reason })?;
        Ok(Pending {
            source: Source::Literal,
            vector,
        })
    }

    /// 点对端点仍存在时原样显示；否则物化为 `temp_start{slot}_N` 到 `temp_end{slot}_N`。
    fn materialize(
        &mut self,
        slot: usize,
        pending: Pending,
        color: &str,
    ) -> Result<ResolvedVector, EngineError> {
        let existing = match pending.source {
            Source::Points { start, end }
                if self.store().contains_point(&start) && self.store().contains_point(&end) =>
            {
                Some((start, end))
            }
            _ => None,
        };
        let (start, end) = match existing {
            Some(pair) => pair,
            None => {
                let temp_prefix = self.naming().temp_prefix.clone();
                let start = self.fresh_name(&format!("{temp_prefix}start{slot}"))?;
                self.store_mut().add_point(start.as_str(), 0.0, 0.0, 0.0)?;
                let end = self.fresh_name(&format!("{temp_prefix}end{slot}"))?;
                let v = pending.vector;
                self.store_mut().add_point(end.as_str(), v.x(), v.y(), v.z())?;
                (start, end)
            }
        };
        self.store_mut().push_displayed_vector(DisplayedVector::new(
            start.as_str(),
            end.as_str(),
            format!("向量{slot}"),
            color,
        ))?;
        Ok(ResolvedVector {
            start,
            end,
            vector: pending.vector,
        })
    }

    /// 保证原点存在且位于 (0, 0, 0)。
    fn ensure_origin(&mut self) -> Result<String, EngineError> {
        let origin = self.calculator_config().origin.clone();
        match self.store().point(&origin).map(|point| point.position) {
            None => {
                self.store_mut().add_point(origin.as_str(), 0.0, 0.0, 0.0)?;
            }
            Some(position) if position != Point3::ORIGIN => {
                warn!(origin = %origin, ?position, "原点不在 (0, 0, 0)，已重置");
                self.store_mut().set_point(&origin, 0.0, 0.0, 0.0)?;
            }
            Some(_) => {}
        }
        Ok(origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geomkit_core::store::Appearance;

    fn session() -> Session {
        let mut session = Session::new();
        let store = session.store_mut();
        store.add_point("O", 0, 0, 0).unwrap();
        store.add_point("A", 3, 0, 0).unwrap();
        store.add_point("B", 0, 4, 0).unwrap();
        store.add_segment("O", "A", Appearance::default()).unwrap();
        session
    }

    #[test]
    fn operation_names_parse() {
        assert_eq!("add".parse::<VectorOperation>(), Ok(VectorOperation::Add));
        assert_eq!("SUB".parse::<VectorOperation>(), Ok(VectorOperation::Subtract));
        assert_eq!(
            "mag2".parse::<VectorOperation>(),
            Ok(VectorOperation::MagnitudeSecond)
        );
        assert!("divide".parse::<VectorOperation>().is_err());
    }

    #[test]
    fn vector_input_text_forms() {
        let input: VectorInput = "A->B".parse().unwrap();
        assert_eq!(input, VectorInput::points("A", "B"));

        let input: VectorInput = "1, 2, 3".parse().unwrap();
        assert_eq!(input, VectorInput::literal("1, 2, 3"));

        let input: VectorInput = "A->B|1,0,0".parse().unwrap();
        assert_eq!(input, VectorInput::points("A", "B").with_literal("1,0,0"));

        assert!("".parse::<VectorInput>().is_err());
        assert!("AB|1,0,0".parse::<VectorInput>().is_err());
    }

    #[test]
    fn literal_components_go_through_the_resolver() {
        assert_eq!(parse_literal("1/2, sqrt(4), -1").unwrap(), Vector3::new(0.5, 2.0, -1.0));
        assert!(parse_literal("1,2").is_err());
        assert!(parse_literal("1,2,t").is_err());
        assert!(parse_literal("1,2,1/0").is_err());
    }

    #[test]
    fn point_pairs_are_displayed_without_temp_points() {
        let mut session = session();
        let calc = session
            .calculate(
                VectorOperation::Add,
                &VectorInput::points("O", "A"),
                &VectorInput::points("O", "B"),
            )
            .unwrap();
        assert_eq!(calc.value, CalcValue::Vector(Vector3::new(3.0, 4.0, 0.0)));
        assert_eq!(calc.first.start, "O");
        assert_eq!(calc.result_point.as_deref(), Some("result_add_1"));

        let store = session.store();
        assert_eq!(
            store.point("result_add_1").unwrap().position,
            Point3::new(3.0, 4.0, 0.0)
        );
        let displayed = store.displayed_vectors();
        assert_eq!(displayed.len(), 3);
        assert_eq!(displayed[0].label, "向量1");
        assert_eq!(displayed[2].start, "O");
        assert_eq!(displayed[2].color, "#FF0000");
        assert_eq!(session.summary().calculation_points, 1);
    }

    #[test]
    fn unknown_points_fall_back_to_literal() {
        let mut session = session();
        let calc = session
            .calculate(
                VectorOperation::Dot,
                &VectorInput::points("X", "Y").with_literal("1,2,3"),
                &VectorInput::literal("4,5,6"),
            )
            .unwrap();
        assert_eq!(calc.value, CalcValue::Scalar(32.0));
        assert_eq!(calc.first.start, "temp_start1_1");
        assert_eq!(calc.first.end, "temp_end1_2");
        assert_eq!(calc.second.end, "temp_end2_4");

        let store = session.store();
        assert_eq!(
            store.point("temp_end1_2").unwrap().position,
            Point3::new(1.0, 2.0, 3.0)
        );
        let result = calc.result_point.unwrap();
        assert_eq!(result, "result_dot_5");
        let position = store.point(&result).unwrap().position;
        assert!((position.x() - 32.0 * 0.8).abs() < 1e-12);
        let marker = store.displayed_vectors()[2].marker.clone().unwrap();
        assert_eq!(marker.symbol, "o");
    }

    #[test]
    fn invalid_input_leaves_store_untouched() {
        let mut session = session();
        let before = session.summary();
        let err = session
            .calculate(
                VectorOperation::Add,
                &VectorInput::points("O", "A"),
                &VectorInput::points("X", "Y").with_literal("1,2"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidVectorInput { slot: 2, .. }));

        let err = session
            .calculate(
                VectorOperation::Add,
                &VectorInput::points("X", "Y"),
                &VectorInput::points("O", "A"),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidVectorInput { slot: 1, .. }));
        assert_eq!(session.summary(), before);
    }

    #[test]
    fn overflowing_result_leaves_store_untouched() {
        let mut session = session();
        session
            .calculate(
                VectorOperation::Add,
                &VectorInput::points("O", "A"),
                &VectorInput::points("O", "A"),
            )
            .unwrap();
        let points = session.store().point_count();
        let displayed = session.store().displayed_vectors().to_vec();

        for operation in [VectorOperation::Add, VectorOperation::Dot] {
            let err = session
                .calculate(
                    operation,
                    &VectorInput::literal("1e308,0,0"),
                    &VectorInput::literal("1e308,0,0"),
                )
                .unwrap_err();
            assert!(matches!(err, EngineError::NonFiniteResult { .. }), "{operation}: {err:?}");
            assert_eq!(session.store().point_count(), points);
            assert_eq!(session.store().displayed_vectors(), displayed.as_slice());
        }
    }

    #[test]
    fn repeated_calculations_replace_temporaries() {
        let mut session = session();
        for _ in 0..3 {
            session
                .calculate(
                    VectorOperation::Cross,
                    &VectorInput::literal("1,0,0"),
                    &VectorInput::literal("0,1,0"),
                )
                .unwrap();
        }
        let temp_points = session
            .store()
            .points()
            .filter(|point| point.name.starts_with("temp_"))
            .count();
        assert_eq!(temp_points, 4);
        // 结果点保留，待显示向量只保留最近一次
        let results = session
            .store()
            .points()
            .filter(|point| point.name.starts_with("result_cross"))
            .count();
        assert_eq!(results, 3);
        assert_eq!(session.store().displayed_vectors().len(), 3);
        assert_eq!(session.store().displayed_vectors()[2].line_width, Some(2.0));
    }

    #[test]
    fn angle_with_zero_vector_is_undefined() {
        let mut session = session();
        let points_before = session.store().point_count();
        let calc = session
            .calculate(
                VectorOperation::Angle,
                &VectorInput::literal("1,0,0"),
                &VectorInput::literal("0,0,0"),
            )
            .unwrap();
        assert_eq!(calc.value, CalcValue::Undefined);
        assert!(calc.result_point.is_none());
        // 只有四个临时点
        assert_eq!(session.store().point_count(), points_before + 4);
        assert_eq!(session.store().displayed_vectors().len(), 2);
    }

    #[test]
    fn angle_is_placed_on_unit_circle() {
        let mut session = session();
        let calc = session
            .calculate(
                VectorOperation::Angle,
                &VectorInput::points("O", "A"),
                &VectorInput::points("O", "B"),
            )
            .unwrap();
        let CalcValue::Scalar(angle) = calc.value else {
            panic!("expected a scalar angle");
        };
        assert!((angle - 90.0).abs() < 1e-9);
        let position = session
            .store()
            .point(calc.result_point.as_deref().unwrap())
            .unwrap()
            .position;
        assert!(position.x().abs() < 1e-12);
        assert!((position.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn magnitudes_use_their_own_axis() {
        let mut session = session();
        let calc = session
            .calculate(
                VectorOperation::MagnitudeSecond,
                &VectorInput::points("O", "A"),
                &VectorInput::points("O", "B"),
            )
            .unwrap();
        assert_eq!(calc.value, CalcValue::Scalar(4.0));
        let position = session
            .store()
            .point(calc.result_point.as_deref().unwrap())
            .unwrap()
            .position;
        assert!((position.z() - 3.2).abs() < 1e-12);
        assert!(calc.to_string().contains("mag2: 4.00"));
    }

    #[test]
    fn origin_is_created_and_reset() {
        let mut session = Session::new();
        session
            .calculate(
                VectorOperation::Subtract,
                &VectorInput::literal("1,1,0"),
                &VectorInput::literal("1,0,0"),
            )
            .unwrap();
        assert_eq!(session.store().point("O").unwrap().position, Point3::ORIGIN);

        session.store_mut().set_point("O", 5, 5, 5).unwrap();
        session
            .calculate(
                VectorOperation::Subtract,
                &VectorInput::literal("1,1,0"),
                &VectorInput::literal("1,0,0"),
            )
            .unwrap();
        assert_eq!(session.store().point("O").unwrap().position, Point3::ORIGIN);
    }
}
