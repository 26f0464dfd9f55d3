// ABOUTME: Configuration values that may come from the environment.
// ABOUTME: Handles literal values and `{ env: VAR, default: ... }` references.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A string given literally or read from an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<String> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve with a custom variable lookup.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => lookup(var)
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }

    /// Text safe to print: the variable name rather than its value.
    pub fn describe(&self) -> String {
        match self {
            EnvValue::Literal(_) => "<literal>".to_string(),
            EnvValue::FromEnv { var, .. } => format!("${}", var),
        }
    }
}
