use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Capture and correlation tuning.
///
/// Every field has a default; a config deserialized from an empty object
/// is fully usable. `validated()` enforces the construction contract and
/// is the only place in the core that can reject input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Bound on the finalized store; the earliest-inserted record is
    /// evicted when full.
    pub max_requests: usize,
    /// Response bodies are truncated beyond this many characters.
    pub max_response_body_size: usize,
    /// URL patterns (regex, degrading to substring) dropped before any
    /// other processing.
    pub exclude_patterns: Vec<String>,
    /// How far after an action a request may start and still be a
    /// correlation candidate.
    #[serde(alias = "maxCorrelationWindow")]
    pub max_correlation_window_ms: f64,
    /// Scores below this are discarded during timing-based attribution.
    pub min_confidence: f64,
    /// How long the in-flight count must stay at zero for the network to
    /// count as quiet.
    #[serde(alias = "networkQuietPeriod")]
    pub network_quiet_period_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            max_response_body_size: 524_288,
            exclude_patterns: Vec::new(),
            max_correlation_window_ms: 2000.0,
            min_confidence: 0.20,
            network_quiet_period_ms: 500,
        }
    }
}

impl CaptureConfig {
    pub fn validated(self) -> Result<Self> {
        if self.max_requests == 0 {
            return Err(Error::InvalidConfig(
                "maxRequests must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfig(format!(
                "minConfidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_correlation_window_ms < 0.0 {
            return Err(Error::InvalidConfig(
                "maxCorrelationWindowMs must not be negative".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CaptureConfig::default();
        assert_eq!(config.max_requests, 1000);
        assert_eq!(config.max_response_body_size, 524_288);
        assert!(config.exclude_patterns.is_empty());
        assert_eq!(config.max_correlation_window_ms, 2000.0);
        assert_eq!(config.min_confidence, 0.20);
        assert_eq!(config.network_quiet_period_ms, 500);
    }

    #[test]
    fn empty_object_deserializes_to_defaults() {
        let config: CaptureConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_requests, 1000);
    }

    #[test]
    fn validated_rejects_contract_violations() {
        let zero_capacity = CaptureConfig {
            max_requests: 0,
            ..CaptureConfig::default()
        };
        assert!(zero_capacity.validated().is_err());

        let bad_confidence = CaptureConfig {
            min_confidence: 1.5,
            ..CaptureConfig::default()
        };
        assert!(bad_confidence.validated().is_err());
    }
}
