//! Error catalog: one [`ErrDef`] per [`Error`] variant.

use http::StatusCode;

use crate::Error;
use crate::problem::Problem;

/// Static error definition from catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub type_url: &'static str,
}

impl ErrDef {
    /// Convert this error definition into a Problem with the given detail
    #[inline]
    pub fn as_problem(&self, detail: impl Into<String>) -> Problem {
        // Convert u16 to StatusCode, using INTERNAL_SERVER_ERROR as fallback for invalid codes
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Problem::new(status, self.title, detail.into())
            .with_code(self.code)
            .with_type(self.type_url)
    }
}

pub const INVALID_ARGUMENT: ErrDef = ErrDef {
    status: 400,
    title: "Invalid Argument",
    code: "ODATA_INVALID_ARGUMENT",
    type_url: "https://errors.cyberfabric.dev/odata/invalid-argument",
};

pub const BIND_ERROR: ErrDef = ErrDef {
    status: 400,
    title: "Literal Cannot Be Bound",
    code: "ODATA_BIND_ERROR",
    type_url: "https://errors.cyberfabric.dev/odata/bind-error",
};

pub const LIMIT_EXCEEDED: ErrDef = ErrDef {
    status: 400,
    title: "Query Limit Exceeded",
    code: "ODATA_LIMIT_EXCEEDED",
    type_url: "https://errors.cyberfabric.dev/odata/limit-exceeded",
};

pub const UNSUPPORTED_OPERATION: ErrDef = ErrDef {
    status: 501,
    title: "Unsupported Operation",
    code: "ODATA_UNSUPPORTED_OPERATION",
    type_url: "https://errors.cyberfabric.dev/odata/unsupported-operation",
};

pub const TYPE_MISMATCH: ErrDef = ErrDef {
    status: 500,
    title: "Type Mismatch",
    code: "ODATA_TYPE_MISMATCH",
    type_url: "https://errors.cyberfabric.dev/odata/type-mismatch",
};

pub const EVALUATION_FAILED: ErrDef = ErrDef {
    status: 500,
    title: "Evaluation Failed",
    code: "ODATA_EVALUATION_FAILED",
    type_url: "https://errors.cyberfabric.dev/odata/evaluation-failed",
};

pub const INVALID_MODEL: ErrDef = ErrDef {
    status: 500,
    title: "Invalid Model",
    code: "ODATA_INVALID_MODEL",
    type_url: "https://errors.cyberfabric.dev/odata/invalid-model",
};

pub const CONFIG_ERROR: ErrDef = ErrDef {
    status: 500,
    title: "Configuration Error",
    code: "ODATA_CONFIG_ERROR",
    type_url: "https://errors.cyberfabric.dev/odata/config-error",
};

impl Error {
    /// Catalog entry for this error.
    #[must_use]
    pub fn err_def(&self) -> &'static ErrDef {
        match self {
            Error::InvalidArgument(_) => &INVALID_ARGUMENT,
            Error::Bind { .. } => &BIND_ERROR,
            Error::LimitExceeded(_) => &LIMIT_EXCEEDED,
            Error::UnsupportedOperation(_) => &UNSUPPORTED_OPERATION,
            Error::TypeMismatch { .. } => &TYPE_MISMATCH,
            Error::Evaluation(_) => &EVALUATION_FAILED,
            Error::InvalidModel(_) => &INVALID_MODEL,
            Error::Config(_) => &CONFIG_ERROR,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.err_def().status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Problem with the error's message as detail.
    pub fn to_problem(&self) -> Problem {
        Problem::from(self)
    }
}
