//! Simulation tunables.

use serde::{Deserialize, Serialize};

/// Configuration for a [`Circuit`].
///
/// Missing fields take their default values when deserialized.
///
/// ```
/// use gatesim::config::SimConfig;
///
/// let config = SimConfig::from_json(r#"{ "max_passes": 50 }"#).unwrap();
/// assert_eq!(config.pass_factor, 10);
/// assert_eq!(config.pass_limit(1000), 50);
/// ```
///
/// [`Circuit`]: crate::circuit::Circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Delta cycles allowed per gate before a convergence is aborted.
    pub pass_factor: usize,
    /// Lower bound on the delta cycles allowed, for small circuits.
    pub min_pass_limit: usize,
    /// A fixed number of delta cycles to allow, overriding the other two fields.
    pub max_passes: Option<usize>
}
impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pass_factor: 10,
            min_pass_limit: 16,
            max_passes: None
        }
    }
}
impl SimConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// The number of delta cycles a convergence may take
    /// in a circuit with `gate_count` gates.
    pub fn pass_limit(&self, gate_count: usize) -> usize {
        self.max_passes.unwrap_or_else(|| {
            self.pass_factor.saturating_mul(gate_count).max(self.min_pass_limit)
        })
    }
}
