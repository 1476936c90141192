//! Gate rule configuration
//!
//! Rules are loaded once at startup from a JSON, YAML or TOML file and are
//! immutable afterwards. Each rule is owned by exactly one reconciler.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Interval used when a rule's interval cannot be parsed
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Default rule file location inside the operator pod
pub const DEFAULT_CONFIG_PATH: &str = "/etc/config/gates.json";

/// Kind of health check a rule runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Http,
    Tcp,
    Exec,
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckType::Http => "http",
            CheckType::Tcp => "tcp",
            CheckType::Exec => "exec",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for CheckType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(CheckType::Http),
            "tcp" => Ok(CheckType::Tcp),
            "exec" => Ok(CheckType::Exec),
            other => Err(Error::ConfigError(format!("unknown check type '{other}'"))),
        }
    }
}

/// Where a rule propagates its health
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
#[value(rename_all = "camelCase")]
pub enum SinkKind {
    /// Status block of a `Probe` custom resource
    ProbeStatus,
    /// Readiness-gate condition on every pod matching the rule's selector
    #[default]
    PodCondition,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::ProbeStatus => f.write_str("probeStatus"),
            SinkKind::PodCondition => f.write_str("podCondition"),
        }
    }
}

/// One configured health check plus its propagation target
///
/// `check_type` is kept as the raw string so that a single bad rule can be
/// skipped instead of failing the whole file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRule {
    /// Unique key of the rule
    pub name: String,
    /// Condition type (or suffix of it) written onto pods
    #[serde(default)]
    pub gate_name: String,
    /// Label selector for the gated pods
    #[serde(default, alias = "targetSelector")]
    pub target_label: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub check_type: String,
    pub check_target: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Overrides the process-wide default sink
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<SinkKind>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_interval() -> String {
    "5s".to_string()
}

impl GateRule {
    /// Parsed check type, or a configuration error for unknown values
    pub fn check_type(&self) -> Result<CheckType> {
        self.check_type.parse()
    }

    /// Reconcile interval, falling back to [`DEFAULT_INTERVAL`]
    pub fn interval(&self) -> Duration {
        parse_interval(&self.interval)
    }

    /// The gate name to propagate; falls back to the rule name
    pub fn gate(&self) -> &str {
        if self.gate_name.is_empty() {
            &self.name
        } else {
            &self.gate_name
        }
    }
}

#[derive(Deserialize)]
struct TomlRules {
    #[serde(default)]
    rules: Vec<GateRule>,
}

/// Load the rule list from `path`, picking the format from the extension
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<GateRule>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("failed to read rule file {}: {e}", path.display()))
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let rules = match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str::<Vec<GateRule>>(&raw)
            .map_err(|e| Error::ConfigError(format!("invalid YAML rule file: {e}")))?,
        Some("toml") => {
            toml::from_str::<TomlRules>(&raw)
                .map_err(|e| Error::ConfigError(format!("invalid TOML rule file: {e}")))?
                .rules
        }
        _ => serde_json::from_str::<Vec<GateRule>>(&raw)
            .map_err(|e| Error::ConfigError(format!("invalid JSON rule file: {e}")))?,
    };

    Ok(dedup_rules(rules))
}

/// Drop later rules that reuse an earlier rule's name
fn dedup_rules(rules: Vec<GateRule>) -> Vec<GateRule> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| {
            if seen.insert(rule.name.clone()) {
                true
            } else {
                warn!(rule = %rule.name, "Duplicate gate rule name, skipping later definition");
                false
            }
        })
        .collect()
}

/// Parse a Go-style duration such as `500ms`, `5s`, `1m30s` or `2h`.
///
/// Anything unparseable, and a zero duration, yields [`DEFAULT_INTERVAL`].
pub fn parse_interval(input: &str) -> Duration {
    match parse_duration(input.trim()) {
        Some(d) if !d.is_zero() => d,
        _ => DEFAULT_INTERVAL,
    }
}

fn parse_duration(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = input;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];

        let part = Duration::try_from_secs_f64(value * scale).ok()?;
        total = total.checked_add(part)?;
    }

    Some(total)
}
