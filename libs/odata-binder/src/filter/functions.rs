//! The closed set of `$filter` string functions.

use crate::Error;
use crate::edm::FieldKind;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum StringFn {
    Concat,
    Contains,
    StartsWith,
    EndsWith,
    IndexOf,
    Length,
    Substring,
    ToLower,
    ToUpper,
    Trim,
}

const S: FieldKind = FieldKind::String;
const I: FieldKind = FieldKind::I64;

impl StringFn {
    pub(super) fn lookup(name: &str) -> Option<Self> {
        let f = match name {
            "concat" => StringFn::Concat,
            "contains" => StringFn::Contains,
            "startswith" => StringFn::StartsWith,
            "endswith" => StringFn::EndsWith,
            "indexof" => StringFn::IndexOf,
            "length" => StringFn::Length,
            "substring" => StringFn::Substring,
            "tolower" => StringFn::ToLower,
            "toupper" => StringFn::ToUpper,
            "trim" => StringFn::Trim,
            _ => return None,
        };
        Some(f)
    }

    pub(super) fn name(self) -> &'static str {
        match self {
            StringFn::Concat => "concat",
            StringFn::Contains => "contains",
            StringFn::StartsWith => "startswith",
            StringFn::EndsWith => "endswith",
            StringFn::IndexOf => "indexof",
            StringFn::Length => "length",
            StringFn::Substring => "substring",
            StringFn::ToLower => "tolower",
            StringFn::ToUpper => "toupper",
            StringFn::Trim => "trim",
        }
    }

    /// Parameter kinds for a call with `arity` arguments, `None` if the arity is wrong.
    pub(super) fn params(self, arity: usize) -> Option<&'static [FieldKind]> {
        let params: &'static [FieldKind] = match (self, arity) {
            (
                StringFn::Concat
                | StringFn::Contains
                | StringFn::StartsWith
                | StringFn::EndsWith
                | StringFn::IndexOf,
                2,
            ) => &[S, S],
            (StringFn::Length | StringFn::ToLower | StringFn::ToUpper | StringFn::Trim, 1) => &[S],
            (StringFn::Substring, 2) => &[S, I],
            (StringFn::Substring, 3) => &[S, I, I],
            _ => return None,
        };
        Some(params)
    }

    pub(super) fn returns(self) -> FieldKind {
        match self {
            StringFn::Contains | StringFn::StartsWith | StringFn::EndsWith => FieldKind::Bool,
            StringFn::IndexOf | StringFn::Length => FieldKind::I64,
            StringFn::Concat | StringFn::Substring | StringFn::ToLower | StringFn::ToUpper
            | StringFn::Trim => FieldKind::String,
        }
    }

    /// Apply to non-null arguments already checked against [`params`](Self::params).
    pub(super) fn apply(self, args: &[Value]) -> Result<Value, Error> {
        let value = match (self, args) {
            (StringFn::Concat, [Value::String(a), Value::String(b)]) => {
                Value::String(format!("{a}{b}"))
            }
            (StringFn::Contains, [Value::String(s), Value::String(sub)]) => {
                Value::Bool(s.contains(sub.as_str()))
            }
            (StringFn::StartsWith, [Value::String(s), Value::String(p)]) => {
                Value::Bool(s.starts_with(p.as_str()))
            }
            (StringFn::EndsWith, [Value::String(s), Value::String(p)]) => {
                Value::Bool(s.ends_with(p.as_str()))
            }
            (StringFn::IndexOf, [Value::String(s), Value::String(sub)]) => Value::I64(
                s.find(sub.as_str())
                    .map_or(-1, |byte| char_count(&s[..byte])),
            ),
            (StringFn::Length, [Value::String(s)]) => Value::I64(char_count(s)),
            (StringFn::Substring, [Value::String(s), Value::I64(start)]) => {
                Value::String(s.chars().skip(clamp(*start)).collect())
            }
            (StringFn::Substring, [Value::String(s), Value::I64(start), Value::I64(len)]) => {
                Value::String(s.chars().skip(clamp(*start)).take(clamp(*len)).collect())
            }
            (StringFn::ToLower, [Value::String(s)]) => Value::String(s.to_lowercase()),
            (StringFn::ToUpper, [Value::String(s)]) => Value::String(s.to_uppercase()),
            (StringFn::Trim, [Value::String(s)]) => Value::String(s.trim().to_owned()),
            _ => {
                return Err(Error::Evaluation(format!(
                    "invalid arguments for '{}'",
                    self.name()
                )));
            }
        };
        Ok(value)
    }
}

fn char_count(s: &str) -> i64 {
    i64::try_from(s.chars().count()).unwrap_or(i64::MAX)
}

/// Negative offsets and lengths clamp to zero.
fn clamp(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}
