use std::collections::HashMap;

use geomkit_core::resolver;
use geomkit_core::store::{Appearance, StoreError};
use serde::Serialize;
use tracing::warn;

use crate::calculator::{VectorInput, VectorOperation};
use crate::construction::Construction;
use crate::errors::EngineError;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    fn from_result(result: Result<String, EngineError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(err) => Self::err(err.to_string()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    /// 参数用法，例如 `NAME X Y [Z]`。
    fn usage(&self) -> &'static str {
        ""
    }
    /// 允许的参数个数范围（含两端）。
    fn arity(&self) -> (usize, usize) {
        (0, 0)
    }
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddPointCommand);
        bus.register(SetPointCommand);
        bus.register(AddSegmentCommand);
        bus.register(DeletePointCommand);
        bus.register(DeleteSegmentCommand);
        bus.register(ClearNamespaceCommand);
        bus.register(ListPointsCommand);
        bus.register(ListSegmentsCommand);
        bus.register(AnalyzeCommand);
        bus.register(PerpendicularCommand);
        bus.register(ParallelCommand);
        bus.register(MidpointCommand);
        bus.register(CircleCommand);
        bus.register(DeleteCircleCommand);
        bus.register(VectorCommand);
        bus.register(StatusCommand);
        bus.register(AddFunctionCommand);
        bus.register(EvalFunctionCommand);
        bus.register(DeleteFunctionCommand);
        bus.register(DeleteVectorCommand);
        bus.register(ClearVectorsCommand);
        bus.register(ClearCalculationsCommand);
        bus.register(SampleCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let response = match self.handlers.get(request.name.as_str()) {
            Some(handler) => {
                let (min, max) = handler.arity();
                if (min..=max).contains(&request.args.len()) {
                    handler.execute(request, context)
                } else {
                    CommandResponse::err(format!(
                        "参数个数错误，用法: {} {}",
                        handler.name(),
                        handler.usage()
                    ))
                }
            }
            None => CommandResponse::err(format!("未知命令: {}", request.name)),
        };
        if !response.success {
            warn!(
                command = %request.name,
                message = response.message.as_deref().unwrap_or_default(),
                "命令执行失败"
            );
        }
        response
    }

    /// 已注册的命令名，按字母序。
    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn usage(&self, name: &str) -> Option<&'static str> {
        self.handlers.get(name).map(|handler| handler.usage())
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn appearance_from(request: &CommandRequest, first: usize, fallback: Appearance) -> Appearance {
    Appearance {
        color: request
            .args
            .get(first)
            .cloned()
            .unwrap_or(fallback.color),
        line_style: request
            .args
            .get(first + 1)
            .cloned()
            .unwrap_or(fallback.line_style),
    }
}

fn describe_construction(construction: &Construction) -> String {
    match construction {
        Construction::Line { point, segment } => {
            format!("已创建点 {} 与线段 {}", point.name, segment.name)
        }
        Construction::Midpoint { point } => format!(
            "已创建中点 {} ({:.4}, {:.4}, {:.4})",
            point.name,
            point.position.x(),
            point.position.y(),
            point.position.z()
        ),
        Construction::Circle { circle } => format!(
            "已创建圆 {}，圆心 {}，半径 {:.4}",
            circle.name, circle.center, circle.radius
        ),
    }
}

struct AddPointCommand;

impl CommandHandler for AddPointCommand {
    fn name(&self) -> &'static str {
        "add_point"
    }

    fn usage(&self) -> &'static str {
        "NAME X Y [Z]"
    }

    fn arity(&self) -> (usize, usize) {
        (3, 4)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let z = request.args.get(3).cloned().unwrap_or_else(|| "0".to_string());
        let result = context
            .session
            .store_mut()
            .add_point(request.arg(0), request.arg(1), request.arg(2), z)
            .map(|point| {
                format!(
                    "已添加点 {} ({}, {}, {})",
                    point.name,
                    point.position.x(),
                    point.position.y(),
                    point.position.z()
                )
            });
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct SetPointCommand;

impl CommandHandler for SetPointCommand {
    fn name(&self) -> &'static str {
        "set_point"
    }

    fn usage(&self) -> &'static str {
        "NAME X Y [Z]"
    }

    fn arity(&self) -> (usize, usize) {
        (3, 4)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let z = request.args.get(3).cloned().unwrap_or_else(|| "0".to_string());
        let result = context
            .session
            .store_mut()
            .set_point(request.arg(0), request.arg(1), request.arg(2), z)
            .map(|point| {
                format!(
                    "点 {} 已移动到 ({}, {}, {})",
                    point.name,
                    point.position.x(),
                    point.position.y(),
                    point.position.z()
                )
            });
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct AddSegmentCommand;

impl CommandHandler for AddSegmentCommand {
    fn name(&self) -> &'static str {
        "add_segment"
    }

    fn usage(&self) -> &'static str {
        "START END [COLOR] [STYLE]"
    }

    fn arity(&self) -> (usize, usize) {
        (2, 4)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let appearance = appearance_from(request, 2, Appearance::default());
        let result = context
            .session
            .store_mut()
            .add_segment(request.arg(0), request.arg(1), appearance)
            .map(|segment| format!("已添加线段 {}", segment.name));
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct DeletePointCommand;

impl CommandHandler for DeletePointCommand {
    fn name(&self) -> &'static str {
        "delete_point"
    }

    fn usage(&self) -> &'static str {
        "NAME"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = context
            .session
            .store_mut()
            .delete_point(request.arg(0))
            .map(|removal| {
                let mut message = format!("已删除点 {}", removal.point.name);
                let dependents = &removal.dependents;
                if !dependents.segments.is_empty() {
                    message.push_str(&format!("，线段: {}", dependents.segments.join(", ")));
                }
                if !dependents.circles.is_empty() {
                    message.push_str(&format!("，圆: {}", dependents.circles.join(", ")));
                }
                if !dependents.displayed_vectors.is_empty() {
                    let labels: Vec<&str> = dependents
                        .displayed_vectors
                        .iter()
                        .map(|vector| vector.label.as_str())
                        .collect();
                    message.push_str(&format!("，待显示向量: {}", labels.join(", ")));
                }
                message
            });
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct DeleteSegmentCommand;

impl CommandHandler for DeleteSegmentCommand {
    fn name(&self) -> &'static str {
        "delete_segment"
    }

    fn usage(&self) -> &'static str {
        "NAME"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = context
            .session
            .store_mut()
            .delete_segment(request.arg(0))
            .map(|segment| format!("已删除线段 {}", segment.name));
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct ClearNamespaceCommand;

impl CommandHandler for ClearNamespaceCommand {
    fn name(&self) -> &'static str {
        "clear_namespace"
    }

    fn usage(&self) -> &'static str {
        "PREFIX"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let prefix = request.arg(0);
        if prefix.is_empty() {
            return CommandResponse::err("前缀不能为空");
        }
        let removal = context.session.store_mut().clear_namespace(prefix);
        CommandResponse::ok(format!(
            "已清除 {} 个以 {prefix} 开头的点，连带线段 {} 条",
            removal.points.len(),
            removal.dependents.segments.len()
        ))
    }
}

struct ListPointsCommand;

impl CommandHandler for ListPointsCommand {
    fn name(&self) -> &'static str {
        "list_points"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let lines: Vec<String> = context
            .session
            .store()
            .points()
            .map(|point| {
                format!(
                    "{}: ({}, {}, {})",
                    point.name,
                    point.position.x(),
                    point.position.y(),
                    point.position.z()
                )
            })
            .collect();
        CommandResponse::ok(format!("共 {} 个点\n{}", lines.len(), lines.join("\n")))
    }
}

struct ListSegmentsCommand;

impl CommandHandler for ListSegmentsCommand {
    fn name(&self) -> &'static str {
        "list_segments"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let store = context.session.store();
        let lines: Result<Vec<String>, StoreError> = store
            .segments()
            .map(|segment| {
                store.segment_length(&segment.name).map(|length| {
                    format!(
                        "{}: {} -> {}，长度 {length:.4}",
                        segment.name, segment.start, segment.end
                    )
                })
            })
            .collect();
        CommandResponse::from_result(
            lines
                .map(|lines| format!("共 {} 条线段\n{}", lines.len(), lines.join("\n")))
                .map_err(EngineError::from),
        )
    }
}

struct AnalyzeCommand;

impl CommandHandler for AnalyzeCommand {
    fn name(&self) -> &'static str {
        "analyze"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .session
                .analyze()
                .map(|relations| relations.to_string().trim_end().to_string()),
        )
    }
}

struct PerpendicularCommand;

impl CommandHandler for PerpendicularCommand {
    fn name(&self) -> &'static str {
        "perpendicular"
    }

    fn usage(&self) -> &'static str {
        "POINT SEGMENT"
    }

    fn arity(&self) -> (usize, usize) {
        (2, 2)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .session
                .create_perpendicular(request.arg(0), request.arg(1))
                .map(|construction| describe_construction(&construction)),
        )
    }
}

struct ParallelCommand;

impl CommandHandler for ParallelCommand {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn usage(&self) -> &'static str {
        "POINT SEGMENT"
    }

    fn arity(&self) -> (usize, usize) {
        (2, 2)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .session
                .create_parallel(request.arg(0), request.arg(1))
                .map(|construction| describe_construction(&construction)),
        )
    }
}

struct MidpointCommand;

impl CommandHandler for MidpointCommand {
    fn name(&self) -> &'static str {
        "midpoint"
    }

    fn usage(&self) -> &'static str {
        "SEGMENT"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .session
                .create_midpoint(request.arg(0))
                .map(|construction| describe_construction(&construction)),
        )
    }
}

struct CircleCommand;

impl CommandHandler for CircleCommand {
    fn name(&self) -> &'static str {
        "circle"
    }

    fn usage(&self) -> &'static str {
        "CENTER RADIUS_SEGMENT"
    }

    fn arity(&self) -> (usize, usize) {
        (2, 2)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .session
                .create_circle(request.arg(0), request.arg(1))
                .map(|construction| describe_construction(&construction)),
        )
    }
}

struct DeleteCircleCommand;

impl CommandHandler for DeleteCircleCommand {
    fn name(&self) -> &'static str {
        "delete_circle"
    }

    fn usage(&self) -> &'static str {
        "NAME"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = context
            .session
            .store_mut()
            .delete_circle(request.arg(0))
            .map(|circle| format!("已删除圆 {}", circle.name));
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct VectorCommand;

impl CommandHandler for VectorCommand {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn usage(&self) -> &'static str {
        "OP V1 V2  (OP: add|sub|dot|cross|mag1|mag2|angle, V: A->B | x,y,z | A->B|x,y,z)"
    }

    fn arity(&self) -> (usize, usize) {
        (3, 3)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let operation: VectorOperation = match request.arg(0).parse() {
            Ok(operation) => operation,
            Err(message) => return CommandResponse::err(message),
        };
        let mut inputs = Vec::with_capacity(2);
        for (slot, text) in [(1, request.arg(1)), (2, request.arg(2))] {
            match text.parse::<VectorInput>() {
                Ok(input) => inputs.push(input),
                Err(reason) => {
                    return CommandResponse::from_result(Err(EngineError::InvalidVectorInput {
                        slot,
                        reason,
                    }));
                }
            }
        }
        CommandResponse::from_result(
            context
                .session
                .calculate(operation, &inputs[0], &inputs[1])
                .map(|calculation| calculation.to_string()),
        )
    }
}

struct StatusCommand;

impl CommandHandler for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let summary = context.session.summary();
        CommandResponse::ok(format!(
            "点: {} | 线段: {} | 待显示向量: {} | 计算点: {} | 圆/球: {} | 函数: {}",
            summary.points,
            summary.segments,
            summary.displayed_vectors,
            summary.calculation_points,
            summary.circles,
            summary.functions
        ))
    }
}

struct AddFunctionCommand;

impl CommandHandler for AddFunctionCommand {
    fn name(&self) -> &'static str {
        "add_function"
    }

    fn usage(&self) -> &'static str {
        "NAME EXPR VARS MIN MAX [COLOR] [STYLE]  (VARS: x 或 x,y)"
    }

    fn arity(&self) -> (usize, usize) {
        (5, 7)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let variables: Vec<&str> = request
            .arg(2)
            .split(',')
            .map(str::trim)
            .filter(|var| !var.is_empty())
            .collect();
        let range = match (resolver::resolve(request.arg(3)), resolver::resolve(request.arg(4))) {
            (Ok(min), Ok(max)) => (min, max),
            (Err(err), _) | (_, Err(err)) => {
                return CommandResponse::err(format!("取值范围无效: {err}"));
            }
        };
        let is_3d = variables.len() == 2;
        let appearance = appearance_from(request, 5, Appearance::default());
        let result = context
            .session
            .store_mut()
            .add_function(request.arg(0), request.arg(1), &variables, range, is_3d, appearance)
            .map(|function| {
                format!(
                    "已添加{}函数 {} = {}",
                    if function.is_3d { "3D " } else { "" },
                    function.name,
                    function.expression
                )
            });
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct EvalFunctionCommand;

impl CommandHandler for EvalFunctionCommand {
    fn name(&self) -> &'static str {
        "eval_function"
    }

    fn usage(&self) -> &'static str {
        "NAME ARG [ARG]"
    }

    fn arity(&self) -> (usize, usize) {
        (2, 3)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let args: Result<Vec<f64>, _> = request.args[1..]
            .iter()
            .map(|arg| resolver::resolve(arg))
            .collect();
        let args = match args {
            Ok(args) => args,
            Err(err) => return CommandResponse::err(format!("参数无效: {err}")),
        };
        let name = request.arg(0);
        let result = context
            .session
            .store()
            .evaluate_function(name, &args)
            .map(|value| format!("{name} = {value}"));
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct DeleteFunctionCommand;

impl CommandHandler for DeleteFunctionCommand {
    fn name(&self) -> &'static str {
        "delete_function"
    }

    fn usage(&self) -> &'static str {
        "NAME"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = context
            .session
            .store_mut()
            .delete_function(request.arg(0))
            .map(|function| format!("已删除函数 {}", function.name));
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct DeleteVectorCommand;

impl CommandHandler for DeleteVectorCommand {
    fn name(&self) -> &'static str {
        "delete_vector"
    }

    fn usage(&self) -> &'static str {
        "INDEX"
    }

    fn arity(&self) -> (usize, usize) {
        (1, 1)
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let index: usize = match request.arg(0).parse() {
            Ok(index) => index,
            Err(_) => return CommandResponse::err(format!("序号无效: {}", request.arg(0))),
        };
        let result = context
            .session
            .store_mut()
            .delete_displayed_vector(index)
            .map(|vector| format!("已删除待显示向量 #{index} ({})", vector.label));
        CommandResponse::from_result(result.map_err(EngineError::from))
    }
}

struct ClearVectorsCommand;

impl CommandHandler for ClearVectorsCommand {
    fn name(&self) -> &'static str {
        "clear_vectors"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let count = context.session.store_mut().clear_displayed_vectors().len();
        CommandResponse::ok(format!("已清除 {count} 条待显示向量"))
    }
}

struct ClearCalculationsCommand;

impl CommandHandler for ClearCalculationsCommand {
    fn name(&self) -> &'static str {
        "clear_calculations"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let removal = context.session.clear_calculations();
        CommandResponse::ok(format!(
            "已清除 {} 个计算点与 {} 条待显示向量",
            removal.points.len(),
            removal.dependents.displayed_vectors.len()
        ))
    }
}

struct SampleCommand;

impl CommandHandler for SampleCommand {
    fn name(&self) -> &'static str {
        "sample"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        CommandResponse::from_result(
            context
                .session
                .populate_sample()
                .map(|()| "已载入示例数据".to_string()),
        )
    }
}
