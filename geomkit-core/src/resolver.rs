//! 坐标解析器：把数值字面量或代数表达式转换为有限的 `f64`。
//!
//! 表达式语法：`+ - * / ^ **`、一元正负号、括号、科学计数法字面量，
//! 常量 `pi` / `E`，以及单参数函数 `sqrt sin cos tan asin acos atan exp ln log abs`。
//! 其余标识符一律视为自由变量。

use std::collections::BTreeSet;
use std::f64::consts::{E, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("invalid expression `{input}`: {reason}")]
    InvalidExpression { input: String, reason: String },
    #[error("expression `{input}` has unbound variables: {}", .variables.join(", "))]
    UnresolvedVariable {
        input: String,
        variables: Vec<String>,
    },
    #[error("expression `{input}` does not evaluate to a finite number")]
    NonFiniteValue { input: String },
}

impl ResolveError {
    fn invalid(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// 坐标输入：数值或尚未求值的表达式文本。只在存储边界处解析一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateInput {
    Number(f64),
    Expression(String),
}

impl CoordinateInput {
    pub fn resolve(&self) -> Result<f64, ResolveError> {
        match self {
            CoordinateInput::Number(value) => ensure_finite(&value.to_string(), *value),
            CoordinateInput::Expression(text) => resolve(text),
        }
    }
}

impl Default for CoordinateInput {
    fn default() -> Self {
        CoordinateInput::Number(0.0)
    }
}

impl From<f64> for CoordinateInput {
    fn from(value: f64) -> Self {
        CoordinateInput::Number(value)
    }
}

impl From<i32> for CoordinateInput {
    fn from(value: i32) -> Self {
        CoordinateInput::Number(f64::from(value))
    }
}

impl From<&str> for CoordinateInput {
    fn from(value: &str) -> Self {
        CoordinateInput::Expression(value.to_string())
    }
}

impl From<String> for CoordinateInput {
    fn from(value: String) -> Self {
        CoordinateInput::Expression(value)
    }
}

impl From<&String> for CoordinateInput {
    fn from(value: &String) -> Self {
        CoordinateInput::Expression(value.clone())
    }
}

impl fmt::Display for CoordinateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateInput::Number(value) => write!(f, "{value}"),
            CoordinateInput::Expression(text) => f.write_str(text),
        }
    }
}

/// 解析单个坐标。纯数字直接转换，否则按表达式求值；结果必须是有限值且不含自由变量。
pub fn resolve(text: &str) -> Result<f64, ResolveError> {
    let trimmed = text.trim();
    if let Some(value) = parse_numeral(trimmed) {
        return ensure_finite(trimmed, value);
    }
    Expression::parse(trimmed)?.value()
}

fn parse_numeral(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return None;
    }
    text.parse::<f64>().ok()
}

fn ensure_finite(input: &str, value: f64) -> Result<f64, ResolveError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ResolveError::NonFiniteValue {
            input: input.to_string(),
        })
    }
}

/// 已解析的表达式，可以携带不同的变量绑定多次求值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "String")]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(text: &str) -> Result<Self, ResolveError> {
        let source = text.trim().to_string();
        let tokens = tokenize(&source).map_err(|reason| ResolveError::invalid(&source, reason))?;
        if tokens.is_empty() {
            return Err(ResolveError::invalid(&source, "empty expression"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser
            .expression()
            .map_err(|reason| ResolveError::invalid(&source, reason))?;
        if let Some(token) = parser.peek() {
            let reason = format!("unexpected {token} after complete expression");
            return Err(ResolveError::invalid(&source, reason));
        }
        // 纯数值表达式照原样逐步求值
        let root = if root.has_variables() {
            root.simplify()
        } else {
            root
        };
        Ok(Self { source, root })
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 表达式中出现的自由变量（按名称排序）。
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.root.collect_variables(&mut names);
        names
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.variables().is_empty()
    }

    /// 使用给定绑定求值。未绑定的变量报告 `UnresolvedVariable`，非有限结果报告 `NonFiniteValue`。
    pub fn evaluate(&self, bindings: &[(&str, f64)]) -> Result<f64, ResolveError> {
        let unbound: Vec<String> = self
            .variables()
            .into_iter()
            .filter(|name| !bindings.iter().any(|(bound, _)| bound == name))
            .collect();
        if !unbound.is_empty() {
            return Err(ResolveError::UnresolvedVariable {
                input: self.source.clone(),
                variables: unbound,
            });
        }
        ensure_finite(&self.source, self.root.eval(bindings))
    }

    #[inline]
    pub fn value(&self) -> Result<f64, ResolveError> {
        self.evaluate(&[])
    }
}

impl FromStr for Expression {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl From<Expression> for String {
    fn from(value: Expression) -> Self {
        value.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Variable(String),
    Negate(Box<Node>),
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call {
        function: Function,
        argument: Box<Node>,
    },
}

impl Node {
    fn has_variables(&self) -> bool {
        match self {
            Node::Number(_) => false,
            Node::Variable(_) => true,
            Node::Negate(inner) => inner.has_variables(),
            Node::Binary { lhs, rhs, .. } => lhs.has_variables() || rhs.has_variables(),
            Node::Call { argument, .. } => argument.has_variables(),
        }
    }

    fn is_number(&self, value: f64) -> bool {
        matches!(self, Node::Number(n) if *n == value)
    }

    fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// 代数化简：合并加减链中的同类项，消去 `0*e`、`e/e`、`e^0` 等恒等式，
    /// 只含数字的子树直接折叠。`x - x`、`0*x` 因此不再留下自由变量。
    fn simplify(self) -> Node {
        match self {
            Node::Number(_) | Node::Variable(_) => self,
            Node::Negate(inner) => match (*inner).simplify() {
                Node::Number(value) => Node::Number(-value),
                Node::Negate(inner) => *inner,
                other => Node::Negate(Box::new(other)),
            },
            Node::Binary {
                op: op @ (BinaryOp::Add | BinaryOp::Sub),
                lhs,
                rhs,
            } => {
                let node = Node::binary(op, (*lhs).simplify(), (*rhs).simplify());
                let mut terms = Terms::default();
                terms.collect(node, 1.0);
                terms.rebuild()
            }
            Node::Binary { op, lhs, rhs } => {
                let lhs = (*lhs).simplify();
                let rhs = (*rhs).simplify();
                if let (Node::Number(a), Node::Number(b)) = (&lhs, &rhs) {
                    return Node::Number(op.apply(*a, *b));
                }
                match op {
                    BinaryOp::Mul if lhs.is_number(0.0) || rhs.is_number(0.0) => Node::Number(0.0),
                    BinaryOp::Mul if lhs.is_number(1.0) => rhs,
                    BinaryOp::Mul | BinaryOp::Div if rhs.is_number(1.0) => lhs,
                    BinaryOp::Div if lhs == rhs => Node::Number(1.0),
                    BinaryOp::Div if lhs.is_number(0.0) => Node::Number(0.0),
                    BinaryOp::Pow if rhs.is_number(0.0) => Node::Number(1.0),
                    BinaryOp::Pow if rhs.is_number(1.0) => lhs,
                    _ => Node::binary(op, lhs, rhs),
                }
            }
            Node::Call { function, argument } => match (*argument).simplify() {
                Node::Number(value) => Node::Number(function.apply(value)),
                argument => Node::Call {
                    function,
                    argument: Box::new(argument),
                },
            },
        }
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Node::Number(_) => {}
            Node::Variable(name) => {
                names.insert(name.clone());
            }
            Node::Negate(inner) => inner.collect_variables(names),
            Node::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Node::Call { argument, .. } => argument.collect_variables(names),
        }
    }

    fn eval(&self, bindings: &[(&str, f64)]) -> f64 {
        match self {
            Node::Number(value) => *value,
            Node::Variable(name) => bindings
                .iter()
                .find(|(bound, _)| bound == name)
                .map(|(_, value)| *value)
                .unwrap_or(f64::NAN),
            Node::Negate(inner) => -inner.eval(bindings),
            Node::Binary { op, lhs, rhs } => op.apply(lhs.eval(bindings), rhs.eval(bindings)),
            Node::Call { function, argument } => function.apply(argument.eval(bindings)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

/// 加减链展开后的 `常数 + Σ 系数·项`，结构相同的项合并系数。
#[derive(Default)]
struct Terms {
    constant: f64,
    terms: Vec<(f64, Node)>,
}

impl Terms {
    fn collect(&mut self, node: Node, sign: f64) {
        match node {
            Node::Number(value) => self.constant += sign * value,
            Node::Negate(inner) => self.collect(*inner, -sign),
            Node::Binary { op, lhs, rhs } => match (op, *lhs, *rhs) {
                (BinaryOp::Add, lhs, rhs) => {
                    self.collect(lhs, sign);
                    self.collect(rhs, sign);
                }
                (BinaryOp::Sub, lhs, rhs) => {
                    self.collect(lhs, sign);
                    self.collect(rhs, -sign);
                }
                (BinaryOp::Mul, Node::Number(c), term) | (BinaryOp::Mul, term, Node::Number(c)) => {
                    self.push(sign * c, term)
                }
                (op, lhs, rhs) => self.push(sign, Node::binary(op, lhs, rhs)),
            },
            term => self.push(sign, term),
        }
    }

    fn push(&mut self, coefficient: f64, term: Node) {
        match self.terms.iter_mut().find(|(_, existing)| *existing == term) {
            Some((existing, _)) => *existing += coefficient,
            None => self.terms.push((coefficient, term)),
        }
    }

    fn rebuild(self) -> Node {
        let mut result: Option<Node> = None;
        for (coefficient, term) in self.terms {
            if coefficient == 0.0 {
                continue;
            }
            let (negative, magnitude) = (coefficient < 0.0, coefficient.abs());
            let term = if magnitude == 1.0 {
                term
            } else {
                Node::binary(BinaryOp::Mul, Node::Number(magnitude), term)
            };
            result = Some(match (result, negative) {
                (None, false) => term,
                (None, true) => Node::Negate(Box::new(term)),
                (Some(acc), false) => Node::binary(BinaryOp::Add, acc, term),
                (Some(acc), true) => Node::binary(BinaryOp::Sub, acc, term),
            });
        }
        match result {
            None => Node::Number(self.constant),
            Some(node) if self.constant == 0.0 => node,
            Some(node) => Node::binary(BinaryOp::Add, node, Node::Number(self.constant)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Ln,
    Abs,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        let function = match name {
            "sqrt" => Function::Sqrt,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "abs" | "Abs" => Function::Abs,
            _ => return None,
        };
        Some(function)
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Function::Sqrt => x.sqrt(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Abs => x.abs(),
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(PI),
        "E" => Some(E),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "number `{value}`"),
            Token::Ident(name) => write!(f, "identifier `{name}`"),
            Token::Plus => f.write_str("`+`"),
            Token::Minus => f.write_str("`-`"),
            Token::Star => f.write_str("`*`"),
            Token::Slash => f.write_str("`/`"),
            Token::Caret => f.write_str("`^`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let simple = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(token) = simple {
            tokens.push(token);
            i += 1;
            continue;
        }
        if c == '*' {
            if chars.get(i + 1) == Some(&'*') {
                tokens.push(Token::Caret);
                i += 2;
            } else {
                tokens.push(Token::Star);
                i += 1;
            }
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // 指数部分必须紧跟数字，否则 `e` 留给后续标识符。
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| format!("malformed number `{literal}`"))?;
            tokens.push(Token::Number(value));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        return Err(format!("unexpected character `{c}` at position {i}"));
    }
    Ok(tokens)
}

/// 递归下降解析。优先级：加减 < 乘除 < 一元正负 < 乘方（右结合）。
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Node, String> {
        let mut node = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            node = Node::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<Node, String> {
        let mut node = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            node = Node::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn unary(&mut self) -> Result<Node, String> {
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Negate(Box::new(self.unary()?)))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, String> {
        let base = self.atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node, String> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Node::Number(value)),
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    let function = Function::lookup(&name)
                        .ok_or_else(|| format!("unknown function `{name}`"))?;
                    self.pos += 1;
                    let argument = self.expression()?;
                    self.expect_close()?;
                    return Ok(Node::Call {
                        function,
                        argument: Box::new(argument),
                    });
                }
                match constant(&name) {
                    Some(value) => Ok(Node::Number(value)),
                    None => Ok(Node::Variable(name)),
                }
            }
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect_close()?;
                Ok(inner)
            }
            Some(token) => Err(format!("unexpected {token}")),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn expect_close(&mut self) -> Result<(), String> {
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            Some(token) => Err(format!("expected `)` but found {token}")),
            None => Err("missing closing `)`".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn plain_numerals_resolve_directly() {
        assert!(approx(resolve("3").unwrap(), 3.0));
        assert!(approx(resolve(" -2.5 ").unwrap(), -2.5));
        assert!(approx(resolve("1e-3").unwrap(), 0.001));
        assert!(approx(resolve(".5").unwrap(), 0.5));
    }

    #[test]
    fn symbolic_expressions_are_evaluated() {
        assert!(approx(resolve("sqrt(2)*sqrt(2)").unwrap(), 2.0));
        assert!(approx(resolve("2^-1").unwrap(), 0.5));
        assert!(approx(resolve("2**3**2").unwrap(), 512.0));
        assert!(approx(resolve("-2^2").unwrap(), -4.0));
        assert!(approx(resolve("(1 + 2) * 3 - 4 / 2").unwrap(), 7.0));
        assert!(approx(resolve("cos(pi)").unwrap(), -1.0));
        assert!(approx(resolve("ln(E)").unwrap(), 1.0));
        assert!(approx(resolve("abs(-4)").unwrap(), 4.0));
    }

    #[test]
    fn division_by_zero_is_non_finite() {
        let err = resolve("1/0").unwrap_err();
        assert!(matches!(err, ResolveError::NonFiniteValue { .. }));
        let err = resolve("0/0").unwrap_err();
        assert!(matches!(err, ResolveError::NonFiniteValue { .. }));
        let err = resolve("1e999").unwrap_err();
        assert!(matches!(err, ResolveError::NonFiniteValue { .. }));
        let err = resolve("sqrt(-1)").unwrap_err();
        assert!(matches!(err, ResolveError::NonFiniteValue { .. }));
    }

    #[test]
    fn free_variables_are_reported_sorted() {
        match resolve("y + 2*x + x").unwrap_err() {
            ResolveError::UnresolvedVariable { input, variables } => {
                assert_eq!(input, "y + 2*x + x");
                assert_eq!(variables, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancelling_variables_resolve() {
        assert!(approx(resolve("x - x").unwrap(), 0.0));
        assert!(approx(resolve("0*x").unwrap(), 0.0));
        assert!(approx(resolve("x*0 + 2").unwrap(), 2.0));
        assert!(approx(resolve("x + 1 - x").unwrap(), 1.0));
        assert!(approx(resolve("2*y - y - y + 3").unwrap(), 3.0));
        assert!(approx(resolve("sin(t) - sin(t)").unwrap(), 0.0));
        assert!(approx(resolve("(a + b) / (a + b)").unwrap(), 1.0));
        assert!(approx(resolve("z^0").unwrap(), 1.0));

        match resolve("x - y + y - 2*x").unwrap_err() {
            ResolveError::UnresolvedVariable { variables, .. } => {
                assert_eq!(variables, vec!["x".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn simplified_expressions_keep_their_values() {
        let expr = Expression::parse("3*x - (x - 2) + x*1").unwrap();
        assert!(approx(expr.evaluate(&[("x", 2.0)]).unwrap(), 8.0));
        assert_eq!(expr.source(), "3*x - (x - 2) + x*1");

        let expr = Expression::parse("-(-x) / 2^1").unwrap();
        assert!(approx(expr.evaluate(&[("x", 5.0)]).unwrap(), 2.5));
    }

    #[test]
    fn malformed_text_is_invalid() {
        for text in ["", "2*(3", "2 3", "foo(1)", "3 +", "1,2", ")", "."] {
            let err = resolve(text).unwrap_err();
            assert!(
                matches!(err, ResolveError::InvalidExpression { .. }),
                "`{text}` should be invalid, got {err:?}"
            );
        }
    }

    #[test]
    fn expressions_evaluate_with_bindings() {
        let expr = Expression::parse("x^2 + y").unwrap();
        assert_eq!(
            expr.variables().into_iter().collect::<Vec<_>>(),
            vec!["x".to_string(), "y".to_string()]
        );
        assert!(!expr.is_constant());
        assert!(approx(expr.evaluate(&[("x", 3.0), ("y", 1.0)]).unwrap(), 10.0));

        let err = expr.evaluate(&[("x", 3.0)]).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedVariable { .. }));
    }

    #[test]
    fn coordinate_input_variants() {
        assert!(approx(CoordinateInput::from(4.0).resolve().unwrap(), 4.0));
        assert!(approx(CoordinateInput::from(2).resolve().unwrap(), 2.0));
        assert!(approx(CoordinateInput::from("pi/2").resolve().unwrap(), PI / 2.0));
        let err = CoordinateInput::from(f64::NAN).resolve().unwrap_err();
        assert!(matches!(err, ResolveError::NonFiniteValue { .. }));
        assert_eq!(CoordinateInput::default(), CoordinateInput::Number(0.0));
    }

    #[test]
    fn expression_serializes_as_source_text() {
        let expr = Expression::parse(" sin(x) ").unwrap();
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(json, "\"sin(x)\"");
    }
}
