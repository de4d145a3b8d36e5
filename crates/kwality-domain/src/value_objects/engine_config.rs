//! Per-job engine configuration carried by a submission.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::value_objects::limits::{FuzzConfig, ResourceLimits};

/// Serde adapter for human-readable durations (`"5m"`, `"10s"`).
pub mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Serialize a duration as a humantime string.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    /// Deserialize a duration from a humantime string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(D::Error::custom)
    }
}

/// Serde adapter for optional human-readable durations.
pub mod opt_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Serialize an optional duration as a humantime string.
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional duration from a humantime string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        text.map(|t| humantime::parse_duration(&t).map_err(D::Error::custom))
            .transpose()
    }
}

/// Per-engine override of deadline and resource envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOverride {
    /// Deadline override for this engine
    #[serde(default, with = "opt_duration", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Resource envelope override for this engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceLimits>,
}

/// Engine selection and budget configuration for one job.
///
/// `total_timeout` bounds wall-clock across all engines of the job; the
/// execution plan derives per-engine deadlines from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Engines to run, by registry name
    pub enabled_engines: Vec<String>,
    /// Wall-clock budget across all engines
    #[serde(with = "duration", default = "default_total_timeout")]
    pub total_timeout: Duration,
    /// Run engines concurrently instead of in plan order
    #[serde(default = "default_parallel")]
    pub parallel_engines: bool,
    /// Per-engine overrides keyed by engine name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_engine: BTreeMap<String, EngineOverride>,
    /// Per-engine aggregation weights (default 1.0 each)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub engine_weights: BTreeMap<String, f64>,
    /// Keep the workspace on disk after the job reaches a terminal state
    #[serde(default)]
    pub retain_workspace: bool,
    /// Optional fuzzing pass for the runtime sandbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzz: Option<FuzzConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled_engines: Vec::new(),
            total_timeout: default_total_timeout(),
            parallel_engines: default_parallel(),
            per_engine: BTreeMap::new(),
            engine_weights: BTreeMap::new(),
            retain_workspace: false,
            fuzz: None,
        }
    }
}

fn default_total_timeout() -> Duration {
    Duration::from_secs(60 * crate::constants::DEFAULT_JOB_TIMEOUT_MINUTES)
}

fn default_parallel() -> bool {
    true
}

impl EngineConfig {
    /// Aggregation weight for an engine (default 1.0).
    pub fn weight_for(&self, engine: &str) -> f64 {
        self.engine_weights.get(engine).copied().unwrap_or(1.0)
    }

    /// Deadline override for an engine, if configured.
    pub fn timeout_override(&self, engine: &str) -> Option<Duration> {
        self.per_engine.get(engine).and_then(|o| o.timeout)
    }
}
