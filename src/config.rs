//! Runtime options for the scoping engine.
//!
//! Options have code defaults, can be overridden from `LINEAGE_DI_*`
//! environment variables and, with the `config` feature, loaded from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::{DiError, DiResult};

/// Environment variable overriding [`ScopeOptions::max_alias_depth`].
pub const ENV_MAX_ALIAS_DEPTH: &str = "LINEAGE_DI_MAX_ALIAS_DEPTH";
/// Environment variable overriding [`ScopeOptions::inherit_keys`] (comma separated).
pub const ENV_INHERIT_KEYS: &str = "LINEAGE_DI_INHERIT_KEYS";
/// Environment variable overriding [`ScopeOptions::report_failures`].
pub const ENV_REPORT_FAILURES: &str = "LINEAGE_DI_REPORT_FAILURES";

/// Tunables shared by a storage and the containers built on it.
///
/// # Examples
///
/// ```
/// use lineage_di::ScopeOptions;
///
/// let options = ScopeOptions::default()
///     .with_max_alias_depth(8)
///     .with_inherit_keys(["app::RequestId"]);
///
/// assert_eq!(options.max_alias_depth, 8);
/// assert_eq!(options.inherit_keys, vec!["app::RequestId".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScopeOptions {
    /// Longest alias chain followed before giving up
    pub max_alias_depth: usize,
    /// Keys a spawned unit inherits from its parent; empty means everything.
    ///
    /// The request-lineage flag is always inherited, so filtering never
    /// detaches a child from its request.
    pub inherit_keys: Vec<String>,
    /// Whether failed resolutions are reported to observers
    pub report_failures: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            max_alias_depth: 32,
            inherit_keys: Vec::new(),
            report_failures: true,
        }
    }
}

impl ScopeOptions {
    /// Sets the maximum alias chain length.
    pub fn with_max_alias_depth(mut self, depth: usize) -> Self {
        self.max_alias_depth = depth;
        self
    }

    /// Restricts spawn inheritance to the given keys.
    pub fn with_inherit_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherit_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables failure reporting to observers.
    pub fn with_report_failures(mut self, report: bool) -> Self {
        self.report_failures = report;
        self
    }

    /// Applies `LINEAGE_DI_*` environment overrides on top of `self`.
    ///
    /// Unset variables leave the current value alone; malformed values are
    /// reported as [`DiError::Config`].
    pub fn from_env(mut self) -> DiResult<Self> {
        if let Ok(raw) = env::var(ENV_MAX_ALIAS_DEPTH) {
            self.max_alias_depth = raw.trim().parse().map_err(|_| {
                DiError::Config(format!(
                    "{} must be an unsigned integer, got {:?}",
                    ENV_MAX_ALIAS_DEPTH, raw
                ))
            })?;
        }
        if let Ok(raw) = env::var(ENV_INHERIT_KEYS) {
            self.inherit_keys = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(raw) = env::var(ENV_REPORT_FAILURES) {
            self.report_failures = parse_bool(&raw).ok_or_else(|| {
                DiError::Config(format!("{} must be a boolean, got {:?}", ENV_REPORT_FAILURES, raw))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Parses options from JSON; missing fields keep their defaults.
    ///
    /// ```
    /// use lineage_di::ScopeOptions;
    ///
    /// let options = ScopeOptions::from_json(r#"{ "max_alias_depth": 4 }"#).unwrap();
    /// assert_eq!(options.max_alias_depth, 4);
    /// assert!(options.report_failures);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        let options: ScopeOptions =
            serde_json::from_str(json).map_err(|e| DiError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes the options to pretty JSON.
    #[cfg(feature = "config")]
    pub fn to_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiError::Config(e.to_string()))
    }

    /// Rejects option combinations the engine cannot work with.
    pub fn validate(&self) -> DiResult<()> {
        if self.max_alias_depth == 0 {
            return Err(DiError::Config("max_alias_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = ScopeOptions::default();
        assert!(options.validate().is_ok());
        assert!(options.inherit_keys.is_empty());
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = ScopeOptions::default().with_max_alias_depth(0).validate().unwrap_err();
        assert!(matches!(err, DiError::Config(_)));
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool(" no "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
