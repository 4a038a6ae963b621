use std::fmt;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::edm::{EdmType, FieldKind};
use crate::path::PropertyPath;

/// Literal vocabulary produced by the `$filter` parser.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(BigDecimal),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Literal {
    /// Type the literal binds to when nothing else constrains it.
    #[must_use]
    pub fn natural_type(&self) -> Option<EdmType> {
        let kind = match self {
            Literal::Null => return None,
            Literal::Bool(_) => FieldKind::Bool,
            Literal::Number(n) if is_small_integer(n) => FieldKind::I64,
            Literal::Number(_) => FieldKind::Decimal,
            Literal::String(_) => FieldKind::String,
            Literal::Uuid(_) => FieldKind::Uuid,
            Literal::DateTime(_) => FieldKind::DateTimeUtc,
            Literal::Date(_) => FieldKind::Date,
            Literal::Time(_) => FieldKind::Time,
        };
        Some(EdmType::Primitive(kind))
    }
}

pub(crate) fn is_small_integer(n: &BigDecimal) -> bool {
    n.is_integer() && n.to_i64().is_some()
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Uuid(u) => write!(f, "{u}"),
            Literal::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Literal::Date(d) => write!(f, "{d}"),
            Literal::Time(t) => write!(f, "{t}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Has,
}

impl BinaryOp {
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le
        )
    }

    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Has => "has",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => f.write_str("not"),
            UnaryOp::Negate => f.write_str("-"),
        }
    }
}

/// `$filter` expression tree.
#[derive(Clone, Debug)]
pub enum Expr {
    /// Literal with the static type the parser assigned, if any.
    Constant(Literal, Option<EdmType>),
    Property(PropertyPath),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Function(String, Vec<Expr>),
    In(Box<Expr>, Vec<Expr>),
}

impl Expr {
    /// Constant carrying its natural static type.
    #[must_use]
    pub fn constant(value: impl IntoLiteral) -> Expr {
        let literal = value.into_literal();
        let ty = literal.natural_type();
        Expr::Constant(literal, ty)
    }

    /// Constant with an explicit static type, e.g. an enum literal `Color'Red'`.
    #[must_use]
    pub fn typed(value: impl IntoLiteral, ty: EdmType) -> Expr {
        Expr::Constant(value.into_literal(), Some(ty))
    }

    #[must_use]
    pub fn null() -> Expr {
        Expr::Constant(Literal::Null, None)
    }

    #[must_use]
    pub fn property(path: PropertyPath) -> Expr {
        Expr::Property(path)
    }

    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Function(name.into(), args)
    }

    #[must_use]
    pub fn negate(self) -> Expr {
        Expr::Unary(UnaryOp::Negate, Box::new(self))
    }

    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::And, self, other)
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::binary(BinaryOp::Or, self, other)
    }

    /// Every property path the tree references, in visit order.
    #[must_use]
    pub fn property_paths(&self) -> Vec<&PropertyPath> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a PropertyPath>) {
        match self {
            Expr::Constant(..) => {}
            Expr::Property(path) => out.push(path),
            Expr::Binary(_, l, r) => {
                l.collect_paths(out);
                r.collect_paths(out);
            }
            Expr::Unary(_, e) => e.collect_paths(out),
            Expr::Function(_, args) => args.iter().for_each(|a| a.collect_paths(out)),
            Expr::In(l, list) => {
                l.collect_paths(out);
                list.iter().for_each(|e| e.collect_paths(out));
            }
        }
    }

    /// Nesting depth; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Expr::Constant(..) | Expr::Property(_) => 1,
            Expr::Binary(_, l, r) => 1 + l.depth().max(r.depth()),
            Expr::Unary(_, e) => 1 + e.depth(),
            Expr::Function(_, args) => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::In(l, list) => {
                1 + list.iter().map(Expr::depth).max().unwrap_or(0).max(l.depth())
            }
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }
}

impl From<PropertyPath> for Expr {
    fn from(path: PropertyPath) -> Self {
        Expr::Property(path)
    }
}

/// Conversion of Rust values into filter literals.
pub trait IntoLiteral {
    fn into_literal(self) -> Literal;
}

impl IntoLiteral for Literal {
    fn into_literal(self) -> Literal {
        self
    }
}

impl IntoLiteral for bool {
    fn into_literal(self) -> Literal {
        Literal::Bool(self)
    }
}

impl IntoLiteral for i32 {
    fn into_literal(self) -> Literal {
        Literal::Number(BigDecimal::from(self))
    }
}

impl IntoLiteral for i64 {
    fn into_literal(self) -> Literal {
        Literal::Number(BigDecimal::from(self))
    }
}

impl IntoLiteral for u64 {
    fn into_literal(self) -> Literal {
        Literal::Number(BigDecimal::from(self))
    }
}

/// Non-finite floats have no literal form and become `null`.
impl IntoLiteral for f64 {
    fn into_literal(self) -> Literal {
        self.to_string()
            .parse::<BigDecimal>()
            .map_or(Literal::Null, Literal::Number)
    }
}

impl IntoLiteral for BigDecimal {
    fn into_literal(self) -> Literal {
        Literal::Number(self)
    }
}

impl IntoLiteral for &str {
    fn into_literal(self) -> Literal {
        Literal::String(self.to_owned())
    }
}

impl IntoLiteral for String {
    fn into_literal(self) -> Literal {
        Literal::String(self)
    }
}

impl IntoLiteral for Uuid {
    fn into_literal(self) -> Literal {
        Literal::Uuid(self)
    }
}

impl IntoLiteral for DateTime<Utc> {
    fn into_literal(self) -> Literal {
        Literal::DateTime(self)
    }
}

impl IntoLiteral for NaiveDate {
    fn into_literal(self) -> Literal {
        Literal::Date(self)
    }
}

impl IntoLiteral for NaiveTime {
    fn into_literal(self) -> Literal {
        Literal::Time(self)
    }
}

/// Comparison and string-function shorthands on a resolved path.
impl PropertyPath {
    fn compare(&self, op: BinaryOp, value: impl IntoLiteral) -> Expr {
        Expr::binary(op, Expr::Property(self.clone()), Expr::constant(value))
    }

    #[must_use]
    pub fn eq<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Eq, v)
    }

    #[must_use]
    pub fn ne<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Ne, v)
    }

    #[must_use]
    pub fn gt<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Gt, v)
    }

    #[must_use]
    pub fn ge<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Ge, v)
    }

    #[must_use]
    pub fn lt<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Lt, v)
    }

    #[must_use]
    pub fn le<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Le, v)
    }

    /// Flags test; the value is a member name list such as `"Red,Blue"`.
    #[must_use]
    pub fn has<V: IntoLiteral>(&self, v: V) -> Expr {
        self.compare(BinaryOp::Has, v)
    }

    #[must_use]
    pub fn is_null(&self) -> Expr {
        Expr::binary(BinaryOp::Eq, Expr::Property(self.clone()), Expr::null())
    }

    #[must_use]
    pub fn is_not_null(&self) -> Expr {
        Expr::binary(BinaryOp::Ne, Expr::Property(self.clone()), Expr::null())
    }

    #[must_use]
    pub fn contains(&self, s: &str) -> Expr {
        self.string_fn("contains", s)
    }

    #[must_use]
    pub fn startswith(&self, s: &str) -> Expr {
        self.string_fn("startswith", s)
    }

    #[must_use]
    pub fn endswith(&self, s: &str) -> Expr {
        self.string_fn("endswith", s)
    }

    #[must_use]
    pub fn is_in<I, V>(&self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: IntoLiteral,
    {
        Expr::In(
            Box::new(Expr::Property(self.clone())),
            values.into_iter().map(Expr::constant).collect(),
        )
    }

    fn string_fn(&self, name: &str, s: &str) -> Expr {
        Expr::function(name, vec![Expr::Property(self.clone()), Expr::constant(s)])
    }
}
