//! Per-indexer health tracking
//!
//! Three consecutive failures open the circuit; the indexer then answers
//! searches with an empty list and no I/O until a connection test succeeds.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::Capabilities;

/// Failures in a row before an indexer is taken out of rotation
pub const FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct HealthState {
    pub available: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub capabilities: Option<Capabilities>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            available: true,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
            capabilities: None,
        }
    }
}

impl HealthState {
    /// Record a failed request. Returns true when this failure opened the
    /// circuit (so the caller can log the transition once).
    pub fn mark_failure(&mut self, error: impl Into<String>) -> bool {
        self.last_error = Some(error.into());
        self.consecutive_failures += 1;

        if self.consecutive_failures >= FAILURE_THRESHOLD && self.available {
            self.available = false;
            return true;
        }
        false
    }

    /// Record a successful request, closing the circuit
    pub fn mark_success(&mut self) {
        self.last_error = None;
        self.consecutive_failures = 0;
        self.available = true;
        self.last_success = Some(Utc::now());
    }

    pub fn is_available(&self) -> bool {
        self.available && self.consecutive_failures < FAILURE_THRESHOLD
    }
}

/// Point-in-time copy of one indexer's health, for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub available: bool,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

impl From<&HealthState> for HealthSnapshot {
    fn from(state: &HealthState) -> Self {
        Self {
            available: state.is_available(),
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error.clone(),
            last_success: state.last_success,
            capabilities: state.capabilities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_opens_on_third_failure() {
        let mut state = HealthState::default();
        assert!(state.is_available());

        assert!(!state.mark_failure("one"));
        assert!(!state.mark_failure("two"));
        assert!(state.is_available());

        // third failure opens the circuit, exactly once
        assert!(state.mark_failure("three"));
        assert!(!state.is_available());
        assert!(!state.mark_failure("four"));
        assert_eq!(state.consecutive_failures, 4);
    }

    #[test]
    fn test_success_resets_counters() {
        let mut state = HealthState::default();
        state.mark_failure("a");
        state.mark_failure("b");
        state.mark_failure("c");
        assert!(!state.is_available());

        state.mark_success();
        assert!(state.is_available());
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_error.is_none());
        assert!(state.last_success.is_some());
    }
}
