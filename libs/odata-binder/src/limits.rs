//! Safety caps for bound query options.
//!
//! Keeps a single request from asking for unbounded work:
//! - Maximum `$top` and (optionally) `$skip`
//! - Maximum number of `$orderby` keys and `$select` paths
//! - Maximum `$filter` nesting depth and `$expand` path depth
//!
//! Limits load through figment: defaults, then an optional YAML file, then
//! `ODATA_`-prefixed environment variables.

use std::fmt::Display;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::path::PropertyPath;
use crate::pipeline::QueryOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[must_use]
pub struct ODataLimits {
    /// Maximum value for $top (default: 1000)
    pub max_top: u64,
    /// Maximum value for $skip (default: unbounded)
    pub max_skip: Option<u64>,
    /// Maximum number of fields in $orderby (default: 5)
    pub max_orderby_fields: usize,
    /// Maximum nesting depth of the $filter tree (default: 32)
    pub max_filter_depth: usize,
    /// Maximum number of $select paths (default: 64)
    pub max_select_paths: usize,
    /// Maximum number of segments in an $expand path (default: 3)
    pub max_expand_depth: usize,
}

impl Default for ODataLimits {
    fn default() -> Self {
        Self {
            max_top: 1000,
            max_skip: None,
            max_orderby_fields: 5,
            max_filter_depth: 32,
            max_select_paths: 64,
            max_expand_depth: 3,
        }
    }
}

impl ODataLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract limits from an already assembled figment; missing keys keep defaults.
    ///
    /// # Errors
    /// Returns `Error::Config` if a value has the wrong shape.
    pub fn from_figment(figment: &Figment) -> Result<Self, Error> {
        figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Defaults, then `file` (YAML) if given, then `ODATA_*` environment variables.
    ///
    /// # Errors
    /// Returns `Error::Config` if the file is malformed or a value has the wrong shape.
    pub fn load(file: Option<&Path>) -> Result<Self, Error> {
        let defaults = Figment::new().merge(Serialized::defaults(Self::default()));
        let figment = match file {
            Some(path) => defaults.merge(Yaml::file(path)),
            None => defaults,
        };
        Self::from_figment(&figment.merge(Env::prefixed("ODATA_")))
    }

    pub fn with_max_top(mut self, max_top: u64) -> Self {
        self.max_top = max_top;
        self
    }

    pub fn with_max_skip(mut self, max_skip: u64) -> Self {
        self.max_skip = Some(max_skip);
        self
    }

    pub fn with_max_orderby_fields(mut self, max: usize) -> Self {
        self.max_orderby_fields = max;
        self
    }

    pub fn with_max_filter_depth(mut self, max: usize) -> Self {
        self.max_filter_depth = max;
        self
    }

    pub fn with_max_select_paths(mut self, max: usize) -> Self {
        self.max_select_paths = max;
        self
    }

    pub fn with_max_expand_depth(mut self, max: usize) -> Self {
        self.max_expand_depth = max;
        self
    }

    /// Check every option against the configured caps.
    ///
    /// # Errors
    /// Returns `Error::LimitExceeded` naming the first cap that is exceeded.
    pub fn validate(&self, options: &QueryOptions) -> Result<(), Error> {
        if let Some(top) = options.top {
            exceeds("$top", top, self.max_top)?;
        }
        if let (Some(skip), Some(max)) = (options.skip, self.max_skip) {
            exceeds("$skip", skip, max)?;
        }
        exceeds(
            "$orderby fields",
            options.order_by.len(),
            self.max_orderby_fields,
        )?;
        if let Some(filter) = &options.filter {
            exceeds("$filter depth", filter.depth(), self.max_filter_depth)?;
        }
        if let Some(select) = &options.select {
            exceeds("$select paths", select.len(), self.max_select_paths)?;
        }
        let expand_depth = options.expand.iter().map(PropertyPath::depth).max();
        if let Some(depth) = expand_depth {
            exceeds("$expand depth", depth, self.max_expand_depth)?;
        }
        Ok(())
    }
}

fn exceeds<T: PartialOrd + Display + Copy>(what: &str, value: T, max: T) -> Result<(), Error> {
    if value > max {
        return Err(Error::LimitExceeded(format!(
            "{what} is {value}, maximum is {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use figment::Jail;

    #[test]
    fn test_default_limits() {
        let limits = ODataLimits::default();
        assert_eq!(limits.max_top, 1000);
        assert_eq!(limits.max_skip, None);
        assert_eq!(limits.max_orderby_fields, 5);
        assert_eq!(limits.max_filter_depth, 32);
    }

    #[test]
    fn test_validate_top() {
        let limits = ODataLimits::new().with_max_top(10);
        assert!(limits.validate(&QueryOptions::new("S").with_top(10)).is_ok());
        let err = limits
            .validate(&QueryOptions::new("S").with_top(11))
            .unwrap_err();
        assert_eq!(
            err,
            Error::LimitExceeded("$top is 11, maximum is 10".to_owned())
        );
    }

    #[test]
    fn test_validate_skip_only_when_capped() {
        let options = QueryOptions::new("S").with_skip(1_000_000);
        assert!(ODataLimits::default().validate(&options).is_ok());
        assert!(matches!(
            ODataLimits::new().with_max_skip(100).validate(&options),
            Err(Error::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_validate_filter_depth() {
        let mut expr = Expr::constant(true);
        for _ in 0..5 {
            expr = !expr;
        }
        let options = QueryOptions::new("S").with_filter(expr);
        assert!(ODataLimits::new().with_max_filter_depth(6).validate(&options).is_ok());
        assert!(
            ODataLimits::new()
                .with_max_filter_depth(5)
                .validate(&options)
                .is_err()
        );
    }

    #[test]
    fn test_load_from_figment_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(serde_json::json!({
            "max_top": 50,
        })));
        let limits = ODataLimits::from_figment(&figment).unwrap();
        assert_eq!(limits.max_top, 50);
        assert_eq!(limits.max_expand_depth, 3);
    }

    #[test]
    fn test_load_merges_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "limits.yaml",
                "max_top: 200\nmax_skip: 5000\nmax_orderby_fields: 2\n",
            )?;
            jail.set_env("ODATA_MAX_ORDERBY_FIELDS", "3");

            let limits =
                ODataLimits::load(Some(Path::new("limits.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(limits.max_top, 200);
            assert_eq!(limits.max_skip, Some(5000));
            assert_eq!(limits.max_orderby_fields, 3);
            assert_eq!(limits.max_select_paths, 64);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_bad_values() {
        Jail::expect_with(|jail| {
            jail.set_env("ODATA_MAX_TOP", "lots");
            let err = ODataLimits::load(None).unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            Ok(())
        });
    }
}
