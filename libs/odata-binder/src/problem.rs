//! RFC 9457 Problem Details for binder errors (pure data model, no HTTP framework dependencies)

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// RFC 9457 Problem Details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Problem {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub type_url: String,
    /// A short, human-readable summary of the problem type.
    pub title: String,
    /// Serializes as u16 for RFC 9457 compatibility.
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    /// A human-readable explanation specific to this occurrence of the problem.
    pub detail: String,
    /// Machine-readable error code from the catalog.
    pub code: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status,
            detail: detail.into(),
            code: String::new(),
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}

impl From<Error> for Problem {
    fn from(err: Error) -> Self {
        err.err_def().as_problem(err.to_string())
    }
}

impl From<&Error> for Problem {
    fn from(err: &Error) -> Self {
        err.err_def().as_problem(err.to_string())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn problem_from_error_carries_catalog_fields() {
        let p = Problem::from(&Error::InvalidArgument("entity set name is required".to_owned()));

        assert_eq!(p.status, StatusCode::BAD_REQUEST);
        assert_eq!(p.code, "ODATA_INVALID_ARGUMENT");
        assert!(p.type_url.ends_with("/invalid-argument"));
        assert!(p.detail.contains("entity set name is required"));
    }

    #[test]
    fn problem_serializes_status_as_u16() {
        let p = Problem::new(StatusCode::NOT_IMPLEMENTED, "Not Implemented", "x");
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"status\":501"));
        assert!(json.contains("\"type\":\"about:blank\""));
    }

    #[test]
    fn problem_round_trips_through_json() {
        let p = Problem::from(Error::Bind {
            expected: "Edm.Int64".to_owned(),
            literal: "'abc'".to_owned(),
        });
        let back: Problem = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.status, StatusCode::BAD_REQUEST);
    }
}
