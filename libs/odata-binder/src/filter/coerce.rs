//! Literal → [`Value`] conversion against an expected type.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::Error;
use crate::ast::{Literal, is_small_integer};
use crate::edm::{EdmModel, EdmType, FieldKind};
use crate::value::Value;

fn bind_err(expected: &EdmType, lit: &Literal) -> Error {
    Error::Bind {
        expected: expected.to_string(),
        literal: lit.to_string(),
    }
}

/// Value of a literal with no expected type.
pub(super) fn natural_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => match n.to_i64() {
            Some(i) if is_small_integer(n) => Value::I64(i),
            _ => Value::Decimal(n.clone()),
        },
        Literal::String(s) => Value::String(s.clone()),
        Literal::Uuid(u) => Value::Uuid(*u),
        Literal::DateTime(dt) => Value::DateTime(*dt),
        Literal::Date(d) => Value::Date(*d),
        Literal::Time(t) => Value::Time(*t),
    }
}

/// Convert `lit` to `target`, parsing strings where the target has a textual form.
pub(super) fn coerce_literal(
    model: &EdmModel,
    lit: &Literal,
    target: &EdmType,
) -> Result<Value, Error> {
    if matches!(lit, Literal::Null) {
        return Ok(Value::Null);
    }
    match target {
        EdmType::Primitive(kind) => {
            coerce_primitive(*kind, lit).ok_or_else(|| bind_err(target, lit))
        }
        EdmType::Enum(name) => {
            let enum_type = model
                .enum_type(name)
                .ok_or_else(|| Error::InvalidModel(format!("unknown enum type '{name}'")))?;
            let bits = match lit {
                Literal::String(s) => enum_type.parse(s),
                Literal::Number(n) if is_small_integer(n) => {
                    n.to_i64().filter(|bits| enum_type.accepts(*bits))
                }
                _ => None,
            };
            bits.map(Value::Enum).ok_or_else(|| bind_err(target, lit))
        }
        EdmType::Complex(_) | EdmType::Entity(_) => Err(bind_err(target, lit)),
    }
}

fn coerce_primitive(kind: FieldKind, lit: &Literal) -> Option<Value> {
    let value = match (kind, lit) {
        (FieldKind::String, Literal::String(s)) => Value::String(s.clone()),
        (FieldKind::Bool, Literal::Bool(b)) => Value::Bool(*b),
        (FieldKind::I64, Literal::Number(n)) if is_small_integer(n) => Value::I64(n.to_i64()?),
        (FieldKind::F64, Literal::Number(n)) => Value::F64(n.to_f64()?),
        (FieldKind::Decimal, Literal::Number(n)) => Value::Decimal(n.clone()),
        (FieldKind::Uuid, Literal::Uuid(u)) => Value::Uuid(*u),
        (FieldKind::Uuid, Literal::String(s)) => Value::Uuid(s.parse::<Uuid>().ok()?),
        (FieldKind::DateTimeUtc, Literal::DateTime(dt)) => Value::DateTime(*dt),
        (FieldKind::DateTimeUtc, Literal::String(s)) => {
            Value::DateTime(DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc))
        }
        (FieldKind::Date, Literal::Date(d)) => Value::Date(*d),
        (FieldKind::Date, Literal::String(s)) => Value::Date(s.parse::<NaiveDate>().ok()?),
        (FieldKind::Time, Literal::Time(t)) => Value::Time(*t),
        (FieldKind::Time, Literal::String(s)) => Value::Time(s.parse::<NaiveTime>().ok()?),
        _ => return None,
    };
    Some(value)
}

/// Convert a numeric runtime value to `kind` (right operand of mixed arithmetic).
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(super) fn convert_numeric(value: Value, kind: FieldKind) -> Result<Value, Error> {
    let converted = match (value, kind) {
        (Value::Null, _) => Value::Null,
        (v @ Value::I64(_), FieldKind::I64)
        | (v @ Value::F64(_), FieldKind::F64)
        | (v @ Value::Decimal(_), FieldKind::Decimal) => v,
        (Value::I64(i), FieldKind::F64) => Value::F64(i as f64),
        (Value::I64(i), FieldKind::Decimal) => Value::Decimal(BigDecimal::from(i)),
        (Value::F64(f), FieldKind::I64) => {
            let t = f.trunc();
            if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
                return Err(Error::Evaluation(format!("{f} does not fit in I64")));
            }
            Value::I64(t as i64)
        }
        (Value::F64(f), FieldKind::Decimal) => Value::Decimal(
            f.to_string()
                .parse::<BigDecimal>()
                .map_err(|_| Error::Evaluation(format!("{f} has no decimal form")))?,
        ),
        (Value::Decimal(d), FieldKind::I64) => Value::I64(
            d.with_scale(0)
                .to_i64()
                .ok_or_else(|| Error::Evaluation(format!("{d} does not fit in I64")))?,
        ),
        (Value::Decimal(d), FieldKind::F64) => Value::F64(
            d.to_f64()
                .ok_or_else(|| Error::Evaluation(format!("{d} does not fit in F64")))?,
        ),
        (other, kind) => {
            return Err(Error::Evaluation(format!(
                "cannot convert {} value to {kind}",
                other.kind_name()
            )));
        }
    };
    Ok(converted)
}
