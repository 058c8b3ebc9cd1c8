//! Environment variable access.
//!
//! The query reads a handful of variables (the EWDK marker, the common-tools
//! hint). Going through [`Environment`] lets callers and tests supply them
//! without touching the process environment.

use std::collections::HashMap;

/// Source of environment variables.
pub trait Environment {
    /// Value of `key`, or `None` if unset or not valid Unicode.
    fn var(&self, key: &str) -> Option<String>;

    /// Value of `key` if set and non-empty.
    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        MapEnvironment::default()
    }

    /// Add a variable.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for MapEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapEnvironment {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Name of the per-version common tools variable, e.g. `VS170COMNTOOLS`.
pub fn common_tools_var(major: u16) -> String {
    format!("VS{}0COMNTOOLS", major)
}
