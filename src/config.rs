//! Correlation settings.
//!
//! `CorrelationConfig` is plain data with serde defaults, so it can be
//! embedded in a host application's own configuration file and omitted
//! fields fall back to the defaults below.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tunables for the isomorphism solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Run the residual pass that pairs unmatched interior nodes by
    /// matched-child overlap, flagging the result as approximate.
    pub best_effort: bool,
    /// Minimum number of shared matched children before the residual pass
    /// will pair two nodes.
    pub min_overlap: usize,
    /// After forcing Root and definition sets, also pair the single
    /// same-kind child under each forced set pair.
    pub connect_spine: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            best_effort: true,
            min_overlap: 1,
            connect_spine: true,
        }
    }
}

impl CorrelationConfig {
    /// Enables or disables the residual best-effort pass.
    pub fn with_best_effort(mut self, enabled: bool) -> Self {
        self.best_effort = enabled;
        self
    }

    /// Sets the minimum child overlap for best-effort pairing.
    pub fn with_min_overlap(mut self, overlap: usize) -> Self {
        self.min_overlap = overlap;
        self
    }

    /// Enables or disables spine connection below definition sets.
    pub fn with_connect_spine(mut self, enabled: bool) -> Self {
        self.connect_spine = enabled;
        self
    }

    /// Checks that the settings are coherent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.best_effort && self.min_overlap == 0 {
            return Err(ConfigError::ZeroOverlap);
        }
        Ok(())
    }
}
