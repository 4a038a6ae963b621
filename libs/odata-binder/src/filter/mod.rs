//! `$filter` binding: compiles an [`Expr`] tree into a [`Predicate`] closure.
//!
//! Binding walks the tree once, resolving static types and converting constants to
//! the type of the operand they meet. Everything that can be rejected statically is
//! rejected here; only accessor failures and arithmetic faults surface per entity.
//!
//! Null handling follows `OData`: comparisons with null are false except `eq`/`ne`,
//! arithmetic and functions propagate null, and `and`/`or`/`not` are three-valued.

use std::cmp::Ordering;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};

use crate::Error;
use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::edm::{EdmModel, EdmType, FieldKind};
use crate::value::{Entity, Value};

mod coerce;
mod functions;

use coerce::{coerce_literal, convert_numeric, natural_value};
use functions::StringFn;

/// Compiled `$filter`: true when the entity matches.
pub type Predicate = Arc<dyn Fn(&Entity) -> Result<bool, Error> + Send + Sync>;

type Eval = Arc<dyn Fn(&Entity) -> Result<Value, Error> + Send + Sync>;

/// A bound sub-expression: its evaluator and static type (`None` for null).
struct Bound {
    eval: Eval,
    ty: Option<EdmType>,
}

impl Bound {
    fn constant(value: Value, ty: Option<EdmType>) -> Self {
        Self {
            eval: Arc::new(move |_: &Entity| Ok(value.clone())),
            ty,
        }
    }

    fn type_name(&self) -> String {
        self.ty
            .as_ref()
            .map_or_else(|| "null".to_owned(), ToString::to_string)
    }
}

pub struct PredicateCompiler<'m> {
    model: &'m EdmModel,
}

impl<'m> PredicateCompiler<'m> {
    /// The model resolves enum literals.
    #[must_use]
    pub fn new(model: &'m EdmModel) -> Self {
        Self { model }
    }

    /// Bind `root` into a predicate.
    ///
    /// # Errors
    /// - `Error::UnsupportedOperation` for unsupported operators, operand
    ///   combinations, functions, or a non-boolean root
    /// - `Error::Bind` when a constant cannot be converted to its expected type
    pub fn compile(&self, root: &Expr) -> Result<Predicate, Error> {
        let bound = self.bind(root, Some(&EdmType::BOOL))?;
        if !is_boolean(bound.ty.as_ref()) {
            return Err(Error::UnsupportedOperation(format!(
                "$filter must be a boolean expression, got {}",
                bound.type_name()
            )));
        }
        let eval = bound.eval;
        Ok(Arc::new(move |entity: &Entity| {
            Ok(matches!(eval(entity)?, Value::Bool(true)))
        }))
    }

    fn bind(&self, expr: &Expr, expected: Option<&EdmType>) -> Result<Bound, Error> {
        match expr {
            Expr::Constant(lit, static_ty) => self.bind_constant(lit, static_ty.as_ref(), expected),
            Expr::Property(path) => {
                let path = path.clone();
                Ok(Bound {
                    ty: Some(path.edm_type().clone()),
                    eval: Arc::new(move |entity: &Entity| path.evaluate(entity)),
                })
            }
            Expr::Binary(op, left, right) => {
                let (left, right) = self.bind_operands(left, right)?;
                match op {
                    BinaryOp::And | BinaryOp::Or => bind_logical(*op, left, right),
                    BinaryOp::Has => bind_has(left, right),
                    op if op.is_comparison() => bind_comparison(*op, left, right),
                    op => bind_arithmetic(*op, left, right),
                }
            }
            Expr::Unary(UnaryOp::Not, operand) => {
                let operand = self.bind(operand, Some(&EdmType::BOOL))?;
                bind_not(operand)
            }
            Expr::Unary(UnaryOp::Negate, operand) => bind_negate(self.bind(operand, None)?),
            Expr::Function(name, args) => self.bind_function(name, args),
            Expr::In(left, list) => self.bind_in(left, list),
        }
    }

    fn bind_constant(
        &self,
        lit: &Literal,
        static_ty: Option<&EdmType>,
        expected: Option<&EdmType>,
    ) -> Result<Bound, Error> {
        if matches!(lit, Literal::Null) {
            return Ok(Bound::constant(Value::Null, None));
        }
        match expected.or(static_ty) {
            Some(target) => {
                let value = coerce_literal(self.model, lit, target)?;
                Ok(Bound::constant(value, Some(target.clone())))
            }
            None => Ok(Bound::constant(natural_value(lit), lit.natural_type())),
        }
    }

    /// A constant side is bound after the other side and takes its type.
    fn bind_operands(&self, left: &Expr, right: &Expr) -> Result<(Bound, Bound), Error> {
        if is_constant(left) && !is_constant(right) {
            let right = self.bind(right, None)?;
            let left = self.bind(left, right.ty.as_ref())?;
            Ok((left, right))
        } else {
            let left = self.bind(left, None)?;
            let right = self.bind(right, left.ty.as_ref())?;
            Ok((left, right))
        }
    }

    fn bind_function(&self, name: &str, args: &[Expr]) -> Result<Bound, Error> {
        let func = StringFn::lookup(name)
            .ok_or_else(|| Error::UnsupportedOperation(format!("function '{name}'")))?;
        let params = func.params(args.len()).ok_or_else(|| {
            Error::UnsupportedOperation(format!(
                "function '{}' does not take {} arguments",
                func.name(),
                args.len()
            ))
        })?;

        let mut evals = Vec::with_capacity(args.len());
        for (i, (arg, kind)) in args.iter().zip(params).enumerate() {
            let expected = EdmType::Primitive(*kind);
            let bound = self.bind(arg, Some(&expected))?;
            if bound.ty.as_ref().is_some_and(|ty| *ty != expected) {
                return Err(Error::UnsupportedOperation(format!(
                    "argument {} of '{}' must be {expected}, got {}",
                    i + 1,
                    func.name(),
                    bound.type_name()
                )));
            }
            evals.push(bound.eval);
        }

        Ok(Bound {
            ty: Some(EdmType::Primitive(func.returns())),
            eval: Arc::new(move |entity: &Entity| {
                let mut values = Vec::with_capacity(evals.len());
                for eval in &evals {
                    match eval(entity)? {
                        Value::Null => return Ok(Value::Null),
                        value => values.push(value),
                    }
                }
                func.apply(&values)
            }),
        })
    }

    fn bind_in(&self, left: &Expr, list: &[Expr]) -> Result<Bound, Error> {
        let left = self.bind(left, None)?;
        let mut items = Vec::with_capacity(list.len());
        for item in list {
            let item = self.bind(item, left.ty.as_ref())?;
            check_comparable(BinaryOp::Eq, &left, &item)?;
            items.push(item.eval);
        }
        let probe = left.eval;
        Ok(Bound {
            ty: Some(EdmType::BOOL),
            eval: Arc::new(move |entity: &Entity| {
                let value = probe(entity)?;
                for item in &items {
                    if value.equals(&item(entity)?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }),
        })
    }
}

fn is_constant(expr: &Expr) -> bool {
    matches!(expr, Expr::Constant(..))
}

fn is_boolean(ty: Option<&EdmType>) -> bool {
    ty.is_none_or(|ty| *ty == EdmType::BOOL)
}

fn bind_logical(op: BinaryOp, left: Bound, right: Bound) -> Result<Bound, Error> {
    for side in [&left, &right] {
        if !is_boolean(side.ty.as_ref()) {
            return Err(Error::UnsupportedOperation(format!(
                "operator '{op}' requires boolean operands, got {}",
                side.type_name()
            )));
        }
    }
    let (l, r) = (left.eval, right.eval);
    let eval: Eval = if op == BinaryOp::And {
        Arc::new(move |entity: &Entity| {
            let lv = l(entity)?;
            if matches!(lv, Value::Bool(false)) {
                return Ok(Value::Bool(false));
            }
            Ok(match (lv, r(entity)?) {
                (_, Value::Bool(false)) => Value::Bool(false),
                (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                _ => Value::Null,
            })
        })
    } else {
        Arc::new(move |entity: &Entity| {
            let lv = l(entity)?;
            if matches!(lv, Value::Bool(true)) {
                return Ok(Value::Bool(true));
            }
            Ok(match (lv, r(entity)?) {
                (_, Value::Bool(true)) => Value::Bool(true),
                (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                _ => Value::Null,
            })
        })
    };
    Ok(Bound {
        eval,
        ty: Some(EdmType::BOOL),
    })
}

fn bind_not(operand: Bound) -> Result<Bound, Error> {
    if !is_boolean(operand.ty.as_ref()) {
        return Err(Error::UnsupportedOperation(format!(
            "operator 'not' requires a boolean operand, got {}",
            operand.type_name()
        )));
    }
    let inner = operand.eval;
    Ok(Bound {
        ty: Some(EdmType::BOOL),
        eval: Arc::new(move |entity: &Entity| match inner(entity)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Null => Ok(Value::Null),
            other => Err(Error::Evaluation(format!(
                "'not' applied to a {} value",
                other.kind_name()
            ))),
        }),
    })
}

fn check_comparable(op: BinaryOp, left: &Bound, right: &Bound) -> Result<(), Error> {
    let ordering = !matches!(op, BinaryOp::Eq | BinaryOp::Ne);
    let structured = [&left.ty, &right.ty]
        .into_iter()
        .flatten()
        .any(EdmType::is_navigable);
    let ok = match (&left.ty, &right.ty) {
        _ if ordering && structured => false,
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => a == b || (a.is_numeric() && b.is_numeric()),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::UnsupportedOperation(format!(
            "cannot compare {} with {} using '{op}'",
            left.type_name(),
            right.type_name()
        )))
    }
}

fn bind_comparison(op: BinaryOp, left: Bound, right: Bound) -> Result<Bound, Error> {
    check_comparable(op, &left, &right)?;
    let (l, r) = (left.eval, right.eval);
    Ok(Bound {
        ty: Some(EdmType::BOOL),
        eval: Arc::new(move |entity: &Entity| {
            let (lv, rv) = (l(entity)?, r(entity)?);
            let result = match op {
                BinaryOp::Eq => lv.equals(&rv),
                BinaryOp::Ne => !lv.equals(&rv),
                BinaryOp::Gt => lv.compare(&rv) == Some(Ordering::Greater),
                BinaryOp::Ge => matches!(lv.compare(&rv), Some(Ordering::Greater | Ordering::Equal)),
                BinaryOp::Lt => lv.compare(&rv) == Some(Ordering::Less),
                _ => matches!(lv.compare(&rv), Some(Ordering::Less | Ordering::Equal)),
            };
            Ok(Value::Bool(result))
        }),
    })
}

fn numeric_kind(side: &Bound, op: &dyn std::fmt::Display) -> Result<Option<FieldKind>, Error> {
    match &side.ty {
        None => Ok(None),
        Some(ty) if ty.is_numeric() => Ok(ty.primitive()),
        Some(_) => Err(Error::UnsupportedOperation(format!(
            "operator '{op}' requires numeric operands, got {}",
            side.type_name()
        ))),
    }
}

fn bind_arithmetic(op: BinaryOp, left: Bound, right: Bound) -> Result<Bound, Error> {
    let lk = numeric_kind(&left, &op)?;
    let rk = numeric_kind(&right, &op)?;
    let l = left.eval;
    let r: Eval = match (lk, rk) {
        (Some(target), Some(source)) if target != source => {
            let inner = right.eval;
            Arc::new(move |entity: &Entity| convert_numeric(inner(entity)?, target))
        }
        _ => right.eval,
    };
    Ok(Bound {
        ty: lk.or(rk).map(EdmType::Primitive),
        eval: Arc::new(move |entity: &Entity| {
            let (lv, rv) = (l(entity)?, r(entity)?);
            if lv.is_null() || rv.is_null() {
                return Ok(Value::Null);
            }
            arithmetic(op, &lv, &rv)
        }),
    })
}

fn overflow(op: BinaryOp) -> Error {
    Error::Evaluation(format!("integer overflow in '{op}'"))
}

fn divide_by_zero(op: BinaryOp) -> Error {
    Error::Evaluation(format!("division by zero in '{op}'"))
}

fn arithmetic(op: BinaryOp, lv: &Value, rv: &Value) -> Result<Value, Error> {
    match (lv, rv) {
        (Value::I64(a), Value::I64(b)) => {
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && *b == 0 {
                return Err(divide_by_zero(op));
            }
            let result = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                BinaryOp::Mul => a.checked_mul(*b),
                BinaryOp::Div => a.checked_div(*b),
                _ => a.checked_rem(*b),
            };
            result.map(Value::I64).ok_or_else(|| overflow(op))
        }
        (Value::F64(a), Value::F64(b)) => Ok(Value::F64(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            _ => a % b,
        })),
        (Value::Decimal(a), Value::Decimal(b)) => {
            if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b.is_zero() {
                return Err(divide_by_zero(op));
            }
            Ok(Value::Decimal(decimal_op(op, a, b)))
        }
        _ => Err(Error::Evaluation(format!(
            "operator '{op}' applied to {} and {}",
            lv.kind_name(),
            rv.kind_name()
        ))),
    }
}

fn decimal_op(op: BinaryOp, a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }
}

fn bind_negate(operand: Bound) -> Result<Bound, Error> {
    let kind = numeric_kind(&operand, &UnaryOp::Negate)?;
    let inner = operand.eval;
    Ok(Bound {
        ty: kind.map(EdmType::Primitive),
        eval: Arc::new(move |entity: &Entity| match inner(entity)? {
            Value::Null => Ok(Value::Null),
            Value::I64(v) => v
                .checked_neg()
                .map(Value::I64)
                .ok_or_else(|| Error::Evaluation("integer overflow in negation".to_owned())),
            Value::F64(v) => Ok(Value::F64(-v)),
            Value::Decimal(v) => Ok(Value::Decimal(-v)),
            other => Err(Error::Evaluation(format!(
                "negation applied to a {} value",
                other.kind_name()
            ))),
        }),
    })
}

fn bind_has(left: Bound, right: Bound) -> Result<Bound, Error> {
    match (&left.ty, &right.ty) {
        (Some(EdmType::Enum(a)), Some(EdmType::Enum(b))) if a == b => {}
        (Some(EdmType::Enum(_)) | None, None) | (None, Some(EdmType::Enum(_))) => {}
        _ => {
            return Err(Error::UnsupportedOperation(format!(
                "operator 'has' requires enum operands of one type, got {} and {}",
                left.type_name(),
                right.type_name()
            )));
        }
    }
    let (l, r) = (left.eval, right.eval);
    Ok(Bound {
        ty: Some(EdmType::BOOL),
        eval: Arc::new(move |entity: &Entity| match (l(entity)?, r(entity)?) {
            (Value::Enum(bits), Value::Enum(flag)) => Ok(Value::Bool(bits & flag == flag)),
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (lv, rv) => Err(Error::Evaluation(format!(
                "operator 'has' applied to {} and {}",
                lv.kind_name(),
                rv.kind_name()
            ))),
        }),
    })
}
