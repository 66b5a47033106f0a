//! Runtime Configuration

use serde::{Deserialize, Serialize};

/// Tunables for a reactive runtime.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use rebind_core::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{"max_propagation_depth": 16}"#).unwrap();
/// assert_eq!(config.max_propagation_depth, 16);
/// assert_eq!(config.default_priority_level, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum nesting of change propagation (and of consecutive self-triggered
    /// re-runs of one effect) before `CyclicDependency` is reported.
    pub max_propagation_depth: usize,

    /// Priority level given to effects and computed refs that do not set one.
    pub default_priority_level: i32,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: 100,
            default_priority_level: 1,
        }
    }
}
