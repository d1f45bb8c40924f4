//! Expression compiler and evaluator.
//!
//! Conditions (`if`/`while`) and expect/assert checks are compiled once, when
//! the definition tree is built, into an [`Expr`] tree. Evaluation runs against
//! an [`Env`] holding exactly two things: the value currently being checked
//! (reachable as `value`) and the variables bound so far. The grammar has no
//! calls, attribute access or imports, so nothing else is reachable.
//!
//! This is a capability boundary, not a sandbox: a definition file can still
//! make an interpretation spin forever (`while True:` over a stream that never
//! runs dry is bounded only by end-of-data). Do not run untrusted definitions.
//!
//! Semantics follow the usual scripting conventions definition authors expect:
//! integers are exact, `/` is true division, `//` floors, `%` takes the sign of
//! the divisor, `and`/`or` short-circuit and yield one of their operands, and
//! comparisons chain (`0 < x < 10`).

use crate::value::{Value, Variables};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::cmp::Ordering;
use std::fmt;

#[derive(PestParser)]
#[grammar = "expr.pest"]
struct ExprParser;

/// Name under which the value being checked is visible to expect/assert clauses.
pub const CURRENT_VALUE: &str = "value";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnknownVariable(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
}

/// Runtime value inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Operand>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Inv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Operand),
    Var(String),
    Seq(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `first op1 e1 op2 e2 ...`, true iff every adjacent pair compares true.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// A compiled expression together with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub source: String,
    pub expr: Expr,
}

/// What an expression can see while it runs.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    pub current: Option<&'a Value>,
    pub vars: &'a Variables,
}

impl<'a> Env<'a> {
    /// Environment for `if`/`while` conditions: bound variables only.
    pub fn vars(vars: &'a Variables) -> Self {
        Env { current: None, vars }
    }

    /// Environment for expect/assert: `value` is the field just decoded.
    pub fn checking(current: &'a Value, vars: &'a Variables) -> Self {
        Env {
            current: Some(current),
            vars,
        }
    }

    fn lookup(&self, name: &str) -> Result<Operand, EvalError> {
        if name == CURRENT_VALUE {
            if let Some(v) = self.current {
                return Ok(Operand::from(v));
            }
        }
        self.vars
            .get(name)
            .map(Operand::from)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }
}

/// Compile an `if`/`while` condition.
pub fn compile_condition(source: &str) -> Result<Check, String> {
    let pair = ExprParser::parse(Rule::condition, source)
        .map_err(|e| format!("{}", e))?
        .next()
        .ok_or("empty condition")?;
    let expr_pair = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or("empty condition")?;
    Ok(Check {
        source: source.trim().to_string(),
        expr: build_expr(expr_pair)?,
    })
}

/// Compile the text of an expect/assert clause into independent checks.
///
/// Checks are separated by `and`, including a top-level `and` inside a full
/// expression (`value > 1 and value < 5` is two checks, so a failure names
/// the half that failed). A check starting with a comparison operator is
/// applied to the current value (`> 0 and < 5` is two checks on `value`).
pub fn compile_checks(source: &str) -> Result<Vec<Check>, String> {
    let pair = ExprParser::parse(Rule::checks, source)
        .map_err(|e| format!("{}", e))?
        .next()
        .ok_or("empty check")?;
    let mut out = Vec::new();
    for check in pair.into_inner().filter(|p| p.as_rule() == Rule::check) {
        let text = check.as_str().trim().to_string();
        let inner = check.into_inner().next().ok_or("empty check")?;
        match inner.as_rule() {
            Rule::partial => {
                let mut it = inner.into_inner();
                let op = cmp_op(it.next().ok_or("missing comparison")?)?;
                let rhs = build_expr(it.next().ok_or("missing comparison operand")?)?;
                out.push(Check {
                    source: format!("{} {}", CURRENT_VALUE, text),
                    expr: Expr::Compare(
                        Box::new(Expr::Var(CURRENT_VALUE.to_string())),
                        vec![(op, rhs)],
                    ),
                });
            }
            _ => {
                for part in conjuncts(inner) {
                    out.push(Check {
                        source: part.as_str().trim().to_string(),
                        expr: build_expr(part)?,
                    });
                }
            }
        }
    }
    Ok(out)
}

/// Operands of a top-level `a and b and ...`, or the expression itself.
/// An `or` at the top keeps the whole expression as one check.
fn conjuncts(expr: Pair<Rule>) -> Vec<Pair<Rule>> {
    let whole = vec![expr.clone()];
    let Some(or_expr) = expr.into_inner().next() else {
        return whole;
    };
    let mut ors = or_expr.into_inner();
    match (ors.next(), ors.next()) {
        (Some(and_expr), None) => {
            let parts: Vec<_> = and_expr
                .into_inner()
                .filter(|p| p.as_rule() == Rule::not_expr)
                .collect();
            if parts.is_empty() {
                whole
            } else {
                parts
            }
        }
        _ => whole,
    }
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::expr => build_expr(pair.into_inner().next().ok_or("empty expression")?),
        Rule::or_expr
        | Rule::and_expr
        | Rule::bit_or
        | Rule::bit_xor
        | Rule::bit_and
        | Rule::shift
        | Rule::sum
        | Rule::term => build_left_assoc(pair),
        Rule::not_expr => {
            let mut nots = 0usize;
            let mut operand = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::not_kw => nots += 1,
                    _ => operand = Some(build_expr(inner)?),
                }
            }
            let mut e = operand.ok_or("not: missing operand")?;
            for _ in 0..nots {
                e = Expr::Not(Box::new(e));
            }
            Ok(e)
        }
        Rule::comparison => {
            let mut it = pair.into_inner();
            let first = build_expr(it.next().ok_or("empty comparison")?)?;
            let mut rest = Vec::new();
            while let Some(op) = it.next() {
                let rhs = it.next().ok_or("comparison: missing right operand")?;
                rest.push((cmp_op(op)?, build_expr(rhs)?));
            }
            if rest.is_empty() {
                Ok(first)
            } else {
                Ok(Expr::Compare(Box::new(first), rest))
            }
        }
        Rule::unary => {
            let mut ops = Vec::new();
            let mut operand = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::neg => ops.push(UnaryOp::Neg),
                    Rule::pos => ops.push(UnaryOp::Pos),
                    Rule::inv => ops.push(UnaryOp::Inv),
                    _ => operand = Some(build_expr(inner)?),
                }
            }
            let mut e = operand.ok_or("unary: missing operand")?;
            for op in ops.into_iter().rev() {
                e = Expr::Unary(op, Box::new(e));
            }
            Ok(e)
        }
        Rule::power => {
            let mut it = pair.into_inner();
            let base = build_expr(it.next().ok_or("power: missing base")?)?;
            match (it.next(), it.next()) {
                (Some(_pow), Some(exp)) => Ok(Expr::Binary(
                    BinOp::Pow,
                    Box::new(base),
                    Box::new(build_expr(exp)?),
                )),
                _ => Ok(base),
            }
        }
        Rule::tuple | Rule::list => Ok(Expr::Seq(
            pair.into_inner()
                .map(build_expr)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Rule::ident => Ok(Expr::Var(pair.as_str().to_string())),
        Rule::int => pair
            .as_str()
            .parse::<i128>()
            .map(|n| Expr::Literal(Operand::Int(n)))
            .map_err(|e| format!("integer literal {}: {}", pair.as_str(), e)),
        Rule::hex => parse_radix(&pair.as_str()[2..], 16),
        Rule::bin => parse_radix(&pair.as_str()[2..], 2),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(|f| Expr::Literal(Operand::Float(f)))
            .map_err(|e| format!("float literal {}: {}", pair.as_str(), e)),
        Rule::true_lit => Ok(Expr::Literal(Operand::Bool(true))),
        Rule::false_lit => Ok(Expr::Literal(Operand::Bool(false))),
        Rule::none_lit => Ok(Expr::Literal(Operand::None)),
        Rule::string => {
            let inner = pair.into_inner().next().ok_or("string: missing body")?;
            Ok(Expr::Literal(Operand::Str(unescape(inner.as_str()))))
        }
        other => Err(format!("unexpected expression rule: {:?}", other)),
    }
}

fn build_left_assoc(pair: Pair<Rule>) -> Result<Expr, String> {
    let mut it = pair.into_inner();
    let mut lhs = build_expr(it.next().ok_or("empty expression")?)?;
    while let Some(op) = it.next() {
        let rhs = build_expr(it.next().ok_or("missing right operand")?)?;
        let (l, r) = (Box::new(lhs), Box::new(rhs));
        lhs = match op.as_rule() {
            Rule::or_kw => Expr::Or(l, r),
            Rule::and_kw => Expr::And(l, r),
            Rule::bor => Expr::Binary(BinOp::BitOr, l, r),
            Rule::bxor => Expr::Binary(BinOp::BitXor, l, r),
            Rule::band => Expr::Binary(BinOp::BitAnd, l, r),
            Rule::shl => Expr::Binary(BinOp::Shl, l, r),
            Rule::shr => Expr::Binary(BinOp::Shr, l, r),
            Rule::add => Expr::Binary(BinOp::Add, l, r),
            Rule::sub => Expr::Binary(BinOp::Sub, l, r),
            Rule::mul => Expr::Binary(BinOp::Mul, l, r),
            Rule::div => Expr::Binary(BinOp::Div, l, r),
            Rule::floordiv => Expr::Binary(BinOp::FloorDiv, l, r),
            Rule::rem => Expr::Binary(BinOp::Rem, l, r),
            other => return Err(format!("unexpected operator rule: {:?}", other)),
        };
    }
    Ok(lhs)
}

fn cmp_op(pair: Pair<Rule>) -> Result<CmpOp, String> {
    match pair.as_rule() {
        Rule::eq => Ok(CmpOp::Eq),
        Rule::ne => Ok(CmpOp::Ne),
        Rule::lt => Ok(CmpOp::Lt),
        Rule::le => Ok(CmpOp::Le),
        Rule::gt => Ok(CmpOp::Gt),
        Rule::ge => Ok(CmpOp::Ge),
        Rule::in_kw => Ok(CmpOp::In),
        Rule::not_in => Ok(CmpOp::NotIn),
        other => Err(format!("unexpected comparison rule: {:?}", other)),
    }
}

fn parse_radix(digits: &str, radix: u32) -> Result<Expr, String> {
    i128::from_str_radix(digits, radix)
        .map(|n| Expr::Literal(Operand::Int(n)))
        .map_err(|e| format!("integer literal {}: {}", digits, e))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl Check {
    /// Evaluate and test truthiness.
    pub fn holds(&self, env: &Env<'_>) -> Result<bool, EvalError> {
        Ok(self.expr.eval(env)?.truthy())
    }
}

impl Expr {
    pub fn eval(&self, env: &Env<'_>) -> Result<Operand, EvalError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => env.lookup(name),
            Expr::Seq(items) => Ok(Operand::Seq(
                items
                    .iter()
                    .map(|e| e.eval(env))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Unary(op, e) => unary(*op, e.eval(env)?),
            Expr::Binary(op, l, r) => binary(*op, l.eval(env)?, r.eval(env)?),
            Expr::Compare(first, rest) => {
                let mut left = first.eval(env)?;
                for (op, rhs) in rest {
                    let right = rhs.eval(env)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Operand::Bool(false));
                    }
                    left = right;
                }
                Ok(Operand::Bool(true))
            }
            Expr::Not(e) => Ok(Operand::Bool(!e.eval(env)?.truthy())),
            Expr::And(l, r) => {
                let lv = l.eval(env)?;
                if lv.truthy() {
                    r.eval(env)
                } else {
                    Ok(lv)
                }
            }
            Expr::Or(l, r) => {
                let lv = l.eval(env)?;
                if lv.truthy() {
                    Ok(lv)
                } else {
                    r.eval(env)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl Operand {
    pub fn truthy(&self) -> bool {
        match self {
            Operand::None => false,
            Operand::Bool(b) => *b,
            Operand::Int(i) => *i != 0,
            Operand::Float(f) => *f != 0.0,
            Operand::Str(s) => !s.is_empty(),
            Operand::Bytes(b) => !b.is_empty(),
            Operand::Seq(s) => !s.is_empty(),
        }
    }

    fn num(&self) -> Option<Num> {
        match self {
            Operand::Bool(b) => Some(Num::Int(*b as i128)),
            Operand::Int(i) => Some(Num::Int(*i)),
            Operand::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn int(&self) -> Option<i128> {
        match self.num()? {
            Num::Int(i) => Some(i),
            Num::Float(_) => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Operand::None => "None",
            Operand::Bool(_) => "bool",
            Operand::Int(_) => "int",
            Operand::Float(_) => "float",
            Operand::Str(_) => "str",
            Operand::Bytes(_) => "bytes",
            Operand::Seq(_) => "sequence",
        }
    }
}

impl From<&Value> for Operand {
    fn from(v: &Value) -> Self {
        match v {
            Value::Bool(b) => Operand::Bool(*b),
            Value::Float(f) => Operand::Float(*f as f64),
            Value::Double(f) => Operand::Float(*f),
            Value::Str(s) => Operand::Str(s.clone()),
            Value::Bytes(b) => Operand::Bytes(b.clone()),
            Value::List(items) => Operand::Seq(items.iter().map(Operand::from).collect()),
            // membership on a map tests its keys
            Value::Map(entries) => {
                Operand::Seq(entries.iter().map(|(k, _)| Operand::Str(k.clone())).collect())
            }
            Value::Null => Operand::None,
            int => Operand::Int(int.as_i128().unwrap_or_default()),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => write!(f, "None"),
            Operand::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Operand::Int(i) => write!(f, "{}", i),
            Operand::Float(x) => write!(f, "{:?}", x),
            Operand::Str(s) => write!(f, "{:?}", s),
            Operand::Bytes(b) => write!(f, "{:02x?}", b),
            Operand::Seq(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn type_error(op: &str, l: &Operand, r: &Operand) -> EvalError {
    EvalError::Type(format!(
        "unsupported operand types for {}: {} and {}",
        op,
        l.type_name(),
        r.type_name()
    ))
}

fn unary(op: UnaryOp, v: Operand) -> Result<Operand, EvalError> {
    match (op, v.num()) {
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Operand::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Operand::Float(f)),
        (UnaryOp::Neg, Some(Num::Int(i))) => {
            i.checked_neg().map(Operand::Int).ok_or(EvalError::Overflow)
        }
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Operand::Float(-f)),
        (UnaryOp::Inv, Some(Num::Int(i))) => Ok(Operand::Int(!i)),
        _ => Err(EvalError::Type(format!(
            "bad operand type for unary {:?}: {}",
            op,
            v.type_name()
        ))),
    }
}

fn binary(op: BinOp, l: Operand, r: Operand) -> Result<Operand, EvalError> {
    match (op, &l, &r) {
        (BinOp::Add, Operand::Str(a), Operand::Str(b)) => return Ok(Operand::Str(format!("{}{}", a, b))),
        (BinOp::Add, Operand::Bytes(a), Operand::Bytes(b)) => {
            return Ok(Operand::Bytes([a.as_slice(), b.as_slice()].concat()))
        }
        (BinOp::Add, Operand::Seq(a), Operand::Seq(b)) => {
            return Ok(Operand::Seq(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => {}
    }
    match op {
        BinOp::BitOr | BinOp::BitXor | BinOp::BitAnd | BinOp::Shl | BinOp::Shr => {
            let (a, b) = match (l.int(), r.int()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(type_error(bin_symbol(op), &l, &r)),
            };
            bitwise(op, a, b)
        }
        _ => {
            let (a, b) = match (l.num(), r.num()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(type_error(bin_symbol(op), &l, &r)),
            };
            arith(op, a, b)
        }
    }
}

fn bitwise(op: BinOp, a: i128, b: i128) -> Result<Operand, EvalError> {
    let v = match op {
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::BitAnd => a & b,
        BinOp::Shl | BinOp::Shr if b < 0 => {
            return Err(EvalError::Type("negative shift count".to_string()))
        }
        BinOp::Shl => {
            let shift = u32::try_from(b).map_err(|_| EvalError::Overflow)?;
            let v = a.checked_shl(shift).ok_or(EvalError::Overflow)?;
            if v >> shift != a {
                return Err(EvalError::Overflow);
            }
            v
        }
        BinOp::Shr => a >> b.min(127) as u32,
        _ => unreachable!("bitwise called with arithmetic operator"),
    };
    Ok(Operand::Int(v))
}

fn arith(op: BinOp, a: Num, b: Num) -> Result<Operand, EvalError> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let v = match op {
            BinOp::Add => x.checked_add(y),
            BinOp::Sub => x.checked_sub(y),
            BinOp::Mul => x.checked_mul(y),
            BinOp::Div => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                return Ok(Operand::Float(x as f64 / y as f64));
            }
            BinOp::FloorDiv => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                x.checked_div(y).zip(x.checked_rem(y)).map(|(q, r)| {
                    if r != 0 && ((x < 0) != (y < 0)) {
                        q - 1
                    } else {
                        q
                    }
                })
            }
            BinOp::Rem => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                x.checked_rem(y)
                    .map(|r| if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
            }
            BinOp::Pow if y >= 0 => {
                let exp = u32::try_from(y).map_err(|_| EvalError::Overflow)?;
                x.checked_pow(exp)
            }
            BinOp::Pow => return Ok(Operand::Float((x as f64).powf(y as f64))),
            _ => unreachable!("arith called with bitwise operator"),
        };
        return v.map(Operand::Int).ok_or(EvalError::Overflow);
    }
    let (x, y) = (a.as_f64(), b.as_f64());
    let v = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div | BinOp::FloorDiv | BinOp::Rem if y == 0.0 => {
            return Err(EvalError::DivisionByZero)
        }
        BinOp::Div => x / y,
        BinOp::FloorDiv => (x / y).floor(),
        BinOp::Rem => x - y * (x / y).floor(),
        BinOp::Pow => x.powf(y),
        _ => unreachable!("arith called with bitwise operator"),
    };
    Ok(Operand::Float(v))
}

fn bin_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Rem => "%",
        BinOp::Pow => "**",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::BitAnd => "&",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    }
}

fn equal(l: &Operand, r: &Operand) -> bool {
    if let (Some(a), Some(b)) = (l.num(), r.num()) {
        return match (a, b) {
            (Num::Int(x), Num::Int(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        };
    }
    match (l, r) {
        (Operand::Seq(a), Operand::Seq(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal(x, y))
        }
        _ => l == r,
    }
}

fn order(l: &Operand, r: &Operand) -> Result<Option<Ordering>, EvalError> {
    if let (Some(a), Some(b)) = (l.num(), r.num()) {
        return Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            _ => a.as_f64().partial_cmp(&b.as_f64()),
        });
    }
    match (l, r) {
        (Operand::Str(a), Operand::Str(b)) => Ok(Some(a.cmp(b))),
        (Operand::Bytes(a), Operand::Bytes(b)) => Ok(Some(a.cmp(b))),
        _ => Err(type_error("ordering comparison", l, r)),
    }
}

fn contains(container: &Operand, item: &Operand) -> Result<bool, EvalError> {
    match (container, item) {
        (Operand::Seq(items), _) => Ok(items.iter().any(|x| equal(x, item))),
        (Operand::Str(s), Operand::Str(sub)) => Ok(s.contains(sub.as_str())),
        (Operand::Bytes(b), _) => match item.int() {
            Some(byte) => Ok(b.iter().any(|&x| x as i128 == byte)),
            None => Err(type_error("in", item, container)),
        },
        _ => Err(type_error("in", item, container)),
    }
}

fn compare(op: CmpOp, l: &Operand, r: &Operand) -> Result<bool, EvalError> {
    Ok(match op {
        CmpOp::Eq => equal(l, r),
        CmpOp::Ne => !equal(l, r),
        CmpOp::Lt => order(l, r)? == Some(Ordering::Less),
        CmpOp::Le => matches!(order(l, r)?, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => order(l, r)? == Some(Ordering::Greater),
        CmpOp::Ge => matches!(order(l, r)?, Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::In => contains(r, l)?,
        CmpOp::NotIn => !contains(r, l)?,
    })
}
