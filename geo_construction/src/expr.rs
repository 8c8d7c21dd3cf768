//! Engine expression language: tokenizer, parser and evaluator.
//!
//! Numbers never use exponent letters. Large and small magnitudes are written
//! as the scaled literal `(S*10^(E))`, which the parser folds into a single
//! constant by decimal conversion of `SeE` so the value is exact.

use std::fmt;

use crate::commands;
use crate::error::EngineError;
use crate::object::{Coords, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Label(String),
    Tuple(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

/// A parsed input line: an optional requested label and its expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub label: Option<String>,
    pub expr: Expr,
}

/// Label resolution for evaluation.
pub trait Scope {
    fn lookup(&self, label: &str) -> Result<Value, EngineError>;
}

impl Expr {
    /// Labels referenced anywhere in the expression, first occurrence order.
    pub fn labels(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_labels(&mut out);
        out
    }

    fn collect_labels(&self, out: &mut Vec<String>) {
        match self {
            Expr::Label(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Expr::Tuple(x, y) | Expr::Binary(_, x, y) => {
                x.collect_labels(out);
                y.collect_labels(out);
            }
            Expr::Neg(inner) => inner.collect_labels(out),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_labels(out);
                }
            }
            Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) => {}
        }
    }

    /// Evaluates to every output; only command calls produce more than one.
    pub fn eval_outputs(&self, scope: &dyn Scope) -> Result<Vec<Value>, EngineError> {
        match self {
            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                commands::apply(name, values)
            }
            other => Ok(vec![other.eval(scope)?]),
        }
    }

    pub fn eval(&self, scope: &dyn Scope) -> Result<Value, EngineError> {
        match self {
            Expr::Number(value) => Ok(Value::number(*value)),
            Expr::Text(text) => Ok(Value::Text { text: text.clone() }),
            Expr::Bool(value) => Ok(Value::boolean(*value)),
            Expr::Label(label) => scope.lookup(label),
            Expr::Tuple(x, y) => {
                let x = expect_number(x.eval(scope)?, "point x-coordinate")?;
                let y = expect_number(y.eval(scope)?, "point y-coordinate")?;
                Ok(Value::Point(Coords::new(x, y)))
            }
            Expr::Neg(inner) => negate(inner.eval(scope)?),
            Expr::Binary(op, lhs, rhs) => apply_binary(*op, lhs.eval(scope)?, rhs.eval(scope)?),
            Expr::Call { name, .. } => {
                let mut outputs = self.eval_outputs(scope)?;
                if outputs.len() != 1 {
                    return Err(EngineError::Evaluation(format!(
                        "{name} yields {} results where one value is needed",
                        outputs.len()
                    )));
                }
                Ok(outputs.remove(0))
            }
        }
    }
}

fn expect_number(value: Value, what: &str) -> Result<f64, EngineError> {
    value.as_number().ok_or_else(|| {
        EngineError::Evaluation(format!(
            "{what} must be a number, got {}",
            value.object_type()
        ))
    })
}

fn negate(value: Value) -> Result<Value, EngineError> {
    match value {
        Value::Number { value } => Ok(Value::number(-value)),
        Value::Point(p) => Ok(Value::Point(p.scale(-1.0))),
        Value::Vector(v) => Ok(Value::Vector(v.scale(-1.0))),
        other => Err(EngineError::Evaluation(format!(
            "cannot negate {}",
            other.object_type()
        ))),
    }
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EngineError> {
    use Value::{Point, Vector};

    let result = match (op, &lhs, &rhs) {
        (BinaryOp::Add, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::number(a + b))
        }
        (BinaryOp::Sub, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::number(a - b))
        }
        (BinaryOp::Mul, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::number(a * b))
        }
        (BinaryOp::Div, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::number(a / b))
        }
        (BinaryOp::Pow, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::number(a.powf(*b)))
        }
        (BinaryOp::Add, Point(p), Point(q) | Vector(q)) => Some(Point(p.add(*q))),
        (BinaryOp::Add, Vector(v), Point(p)) => Some(Point(p.add(*v))),
        (BinaryOp::Add, Vector(v), Vector(w)) => Some(Vector(v.add(*w))),
        (BinaryOp::Sub, Point(p), Point(q) | Vector(q)) => Some(Point(p.sub(*q))),
        (BinaryOp::Sub, Vector(v), Vector(w)) => Some(Vector(v.sub(*w))),
        (BinaryOp::Mul, Point(p), Value::Number { value: k })
        | (BinaryOp::Mul, Value::Number { value: k }, Point(p)) => Some(Point(p.scale(*k))),
        (BinaryOp::Mul, Vector(v), Value::Number { value: k })
        | (BinaryOp::Mul, Value::Number { value: k }, Vector(v)) => Some(Vector(v.scale(*k))),
        (BinaryOp::Div, Point(p), Value::Number { value: k }) => Some(Point(p.scale(1.0 / k))),
        (BinaryOp::Div, Vector(v), Value::Number { value: k }) => Some(Vector(v.scale(1.0 / k))),
        (BinaryOp::Eq, a, b) => Some(Value::boolean(a == b)),
        (BinaryOp::NotEq, a, b) => Some(Value::boolean(a != b)),
        (BinaryOp::Lt, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::boolean(a < b))
        }
        (BinaryOp::Le, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::boolean(a <= b))
        }
        (BinaryOp::Gt, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::boolean(a > b))
        }
        (BinaryOp::Ge, Value::Number { value: a }, Value::Number { value: b }) => {
            Some(Value::boolean(a >= b))
        }
        _ => None,
    };

    result.ok_or_else(|| {
        EngineError::Evaluation(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            lhs.object_type(),
            rhs.object_type()
        ))
    })
}

/// Renders a number the way the parser reads it back.
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 || (1e-6..1e15).contains(&magnitude) {
        return format!("{value}");
    }
    let scientific = format!("{value:e}");
    match scientific.split_once('e') {
        Some((significand, exponent)) => format!("({significand}*10^({exponent}))"),
        None => scientific,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => f.write_str(&format_number(*value)),
            Expr::Text(text) => write!(f, "\"{text}\""),
            Expr::Bool(value) => write!(f, "{value}"),
            Expr::Label(label) => f.write_str(label),
            Expr::Tuple(x, y) => write!(f, "({x}, {y})"),
            Expr::Neg(inner) => write!(f, "-{}", Grouped(inner)),
            Expr::Binary(op, lhs, rhs) => {
                write!(f, "{} {} {}", Grouped(lhs), op.symbol(), Grouped(rhs))
            }
            Expr::Call { name, args } => {
                let parts: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
                write!(f, "{name}[{}]", parts.join(", "))
            }
        }
    }
}

struct Grouped<'a>(&'a Expr);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Binary(..) | Expr::Neg(_) => write!(f, "({})", self.0),
            other => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Text(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, EngineError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let start = index;
        let ch = chars[index];
        if ch.is_whitespace() {
            index += 1;
            continue;
        }
        let leading_dot = ch == '.' && chars.get(index + 1).is_some_and(|c| c.is_ascii_digit());
        if ch.is_ascii_digit() || leading_dot {
            let mut text = String::new();
            let mut seen_dot = false;
            while index < chars.len() {
                let c = chars[index];
                if c.is_ascii_digit() {
                    text.push(c);
                } else if c == '.' && !seen_dot {
                    seen_dot = true;
                    text.push(c);
                } else {
                    break;
                }
                index += 1;
            }
            tokens.push((Token::Number(text), start));
            continue;
        }
        if ch.is_alphabetic() {
            let mut text = String::new();
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                text.push(chars[index]);
                index += 1;
            }
            tokens.push((Token::Ident(text), start));
            continue;
        }
        if ch == '"' {
            index += 1;
            let mut text = String::new();
            loop {
                match chars.get(index) {
                    Some('"') => {
                        index += 1;
                        break;
                    }
                    Some('\\') => {
                        if let Some(escaped) = chars.get(index + 1) {
                            text.push(*escaped);
                        }
                        index += 2;
                    }
                    Some(c) => {
                        text.push(*c);
                        index += 1;
                    }
                    None => {
                        return Err(EngineError::Syntax {
                            position: start,
                            message: "unterminated string literal".to_string(),
                        })
                    }
                }
            }
            tokens.push((Token::Text(text), start));
            continue;
        }

        let next = chars.get(index + 1).copied();
        let (token, width) = match (ch, next) {
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('=', _) => (Token::Assign, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('^', _) => (Token::Caret, 1),
            _ => {
                return Err(EngineError::Syntax {
                    position: start,
                    message: format!("unexpected character '{ch}'"),
                })
            }
        };
        tokens.push((token, start));
        index += width;
    }

    Ok(tokens)
}

pub fn parse_statement(input: &str) -> Result<Statement, EngineError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        len: input.len(),
    };

    let label = match (parser.peek_at(0), parser.peek_at(1)) {
        (Some(Token::Ident(name)), Some(Token::Assign)) => {
            let name = name.clone();
            parser.index += 2;
            Some(name)
        }
        _ => None,
    };
    let expr = parser.parse_comparison()?;
    if parser.index < parser.tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(Statement { label, expr })
}

pub fn parse_expr(input: &str) -> Result<Expr, EngineError> {
    let statement = parse_statement(input)?;
    match statement.label {
        Some(label) => Err(EngineError::Syntax {
            position: 0,
            message: format!("unexpected assignment to {label}"),
        }),
        None => Ok(statement.expr),
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .map(|(_, pos)| *pos)
            .unwrap_or(self.len)
    }

    fn error(&self, message: &str) -> EngineError {
        EngineError::Syntax {
            position: self.position(),
            message: message.to_string(),
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), EngineError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, EngineError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::NotEq,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.index += 1;
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, EngineError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(expr),
            };
            self.index += 1;
            let rhs = self.parse_term()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
    }

    fn parse_term(&mut self) -> Result<Expr, EngineError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(expr),
            };
            self.index += 1;
            let rhs = self.parse_unary()?;
            expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, EngineError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, EngineError> {
        let base = self.parse_primary()?;
        if self.eat(&Token::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, EngineError> {
        let Some((token, _)) = self.tokens.get(self.index).cloned() else {
            return Err(self.error("unexpected end of input"));
        };
        self.index += 1;
        match token {
            Token::Number(text) => self.parse_number(&text),
            Token::Text(text) => Ok(Expr::Text(text)),
            Token::Ident(name) => {
                if self.eat(&Token::LBracket) {
                    let args = self.parse_arguments()?;
                    return Ok(Expr::Call { name, args });
                }
                match name.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    _ => Ok(Expr::Label(name)),
                }
            }
            Token::LParen => {
                if let Some((literal, consumed)) = self.scaled_literal() {
                    self.index += consumed;
                    return self.parse_number(&literal);
                }
                let first = self.parse_comparison()?;
                if self.eat(&Token::Comma) {
                    let second = self.parse_comparison()?;
                    self.expect(Token::RParen, "')' after point coordinates")?;
                    return Ok(Expr::Tuple(Box::new(first), Box::new(second)));
                }
                self.expect(Token::RParen, "')'")?;
                Ok(first)
            }
            _ => {
                self.index -= 1;
                Err(self.error("expected a value"))
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, EngineError> {
        let mut args = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_comparison()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RBracket, "']' after command arguments")?;
            return Ok(args);
        }
    }

    fn parse_number(&self, text: &str) -> Result<Expr, EngineError> {
        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| self.error(&format!("invalid number {text}")))
    }

    /// Matches `[sign] S *10^( [sign] E ))` right after an opening
    /// parenthesis and returns the literal text `SeE` plus the tokens used.
    fn scaled_literal(&self) -> Option<(String, usize)> {
        let mut offset = 0;
        let sign = |offset: &mut usize| match self.peek_at(*offset) {
            Some(Token::Minus) => {
                *offset += 1;
                "-"
            }
            Some(Token::Plus) => {
                *offset += 1;
                ""
            }
            _ => "",
        };
        let significand_sign = sign(&mut offset);
        let significand = match self.peek_at(offset) {
            Some(Token::Number(text)) => text.clone(),
            _ => return None,
        };
        offset += 1;
        let ten = Token::Number("10".to_string());
        for expected in [&Token::Star, &ten, &Token::Caret, &Token::LParen] {
            if self.peek_at(offset) != Some(expected) {
                return None;
            }
            offset += 1;
        }
        let exponent_sign = sign(&mut offset);
        let exponent = match self.peek_at(offset) {
            Some(Token::Number(text)) if text.chars().all(|c| c.is_ascii_digit()) => text.clone(),
            _ => return None,
        };
        offset += 1;
        for _ in 0..2 {
            if self.peek_at(offset) != Some(&Token::RParen) {
                return None;
            }
            offset += 1;
        }
        Some((
            format!("{significand_sign}{significand}e{exponent_sign}{exponent}"),
            offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapScope(BTreeMap<String, Value>);

    impl Scope for MapScope {
        fn lookup(&self, label: &str) -> Result<Value, EngineError> {
            self.0
                .get(label)
                .cloned()
                .ok_or_else(|| EngineError::UnknownLabel(label.to_string()))
        }
    }

    fn eval(input: &str) -> Value {
        let scope = MapScope(BTreeMap::new());
        parse_expr(input)
            .expect("parsed")
            .eval(&scope)
            .expect("evaluated")
    }

    #[test]
    fn scaled_literal_is_exact_for_extreme_magnitudes() {
        let cases = [
            ("(5*10^(-324))", 5e-324),
            ("(1.7976931348623157*10^(308))", f64::MAX),
            ("(2.2250738585072014*10^(-308))", f64::MIN_POSITIVE),
            ("(-1.2345678901234567*10^(-200))", -1.2345678901234567e-200),
            ("(1*10^(-1))", 0.1),
        ];
        for (text, expected) in cases {
            let value = eval(text).as_number().expect("number");
            assert_eq!(value.to_bits(), expected.to_bits(), "{text}");
        }
    }

    #[test]
    fn negative_zero_survives_scaled_literal() {
        let value = eval("(-0*10^(0))").as_number().expect("number");
        assert!(value == 0.0 && value.is_sign_negative());
    }

    #[test]
    fn unparenthesized_scaling_keeps_ordinary_precedence() {
        assert_eq!(eval("6/2*10^(1)").as_number(), Some(30.0));
        // 10^(1)^2 is right-associative, so this is 2 * 10^(1^2).
        assert_eq!(eval("2*10^(1)^2").as_number(), Some(20.0));
        assert_eq!(eval("(2*10^(1))^2").as_number(), Some(400.0));

        let mut labels = BTreeMap::new();
        labels.insert("a".to_string(), Value::number(3.0));
        let scope = MapScope(labels);
        let value = parse_expr("a^2*10^(1)").unwrap().eval(&scope).unwrap();
        assert_eq!(value.as_number(), Some(90.0));
    }

    #[test]
    fn assignment_prefix_is_split_from_expression() {
        let statement = parse_statement("A = (1, 2)").expect("parsed");
        assert_eq!(statement.label.as_deref(), Some("A"));
        assert!(matches!(statement.expr, Expr::Tuple(..)));

        let comparison = parse_statement("a == b").expect("parsed");
        assert!(comparison.label.is_none());
    }

    #[test]
    fn point_arithmetic_follows_geometric_rules() {
        let mut labels = BTreeMap::new();
        labels.insert("A".to_string(), Value::Point(Coords::new(1.0, 2.0)));
        labels.insert("B".to_string(), Value::Point(Coords::new(3.0, -1.0)));
        labels.insert("k".to_string(), Value::number(2.0));
        let scope = MapScope(labels);

        let sum = parse_expr("A + B").unwrap().eval(&scope).unwrap();
        assert_eq!(sum, Value::Point(Coords::new(4.0, 1.0)));
        let scaled = parse_expr("k * A").unwrap().eval(&scope).unwrap();
        assert_eq!(scaled, Value::Point(Coords::new(2.0, 4.0)));
        let negated = parse_expr("-(A)").unwrap().eval(&scope).unwrap();
        assert_eq!(negated, Value::Point(Coords::new(-1.0, -2.0)));

        let err = parse_expr("A * B").unwrap().eval(&scope).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(_)));
    }

    #[test]
    fn exponent_letters_are_not_part_of_numbers() {
        let err = parse_expr("1e5").unwrap_err();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }

    #[test]
    fn display_round_trips_through_parser() {
        let expr = parse_expr("Rotate[A, (3*10^(-9))] + -(B)").expect("parsed");
        let reparsed = parse_expr(&expr.to_string()).expect("reparsed");
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn labels_are_collected_once_in_order() {
        let expr = parse_expr("Segment[B, A] + B").expect("parsed");
        assert_eq!(expr.labels(), vec!["B".to_string(), "A".to_string()]);
    }
}
