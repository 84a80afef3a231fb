//! Scenario loading, parsing, and validation.
//!
//! A scenario file is the JSON description of one simulation run: the
//! protocol, the device roster, and optional overrides of the protocol's
//! tuning parameters. Loading never builds an engine; `build()` hands the
//! validated pieces to [`StepDriver::new`], which rejects anything invalid
//! before the first tick.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::engine::backoff::BackoffRange;
use crate::engine::types::{ContenderRange, Protocol, RoundParams};
use crate::engine::{EngineError, StepDriver};

/// One simulation run as described by a scenario file.
///
/// ```json
/// {
///   "protocol": "csma-cd",
///   "seed": 42,
///   "devices": ["Device 1", "Device 2", "Device 3"],
///   "contenders": { "min": 1, "max": 3 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Scenario {
    pub protocol: Protocol,
    pub devices: Vec<String>,
    /// Seed for the engine rng; omit for an entropy-seeded run.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Override of the contending-set size drawn each round.
    #[serde(default)]
    pub contenders: Option<ContenderRange>,
    /// Override of the first counter assignment range.
    #[serde(default)]
    pub initial_backoff: Option<BackoffRange>,
    /// Override of the post-collision redraw range.
    #[serde(default)]
    pub exponential_backoff: Option<BackoffRange>,
}

impl Scenario {
    /// Load and parse a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let data = fs::read_to_string(path)
            .map_err(|e| EngineError::InvalidConfiguration(format!("failed to read scenario file {}: {}", path.display(), e)))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, EngineError> {
        serde_json::from_str(data).map_err(|e| EngineError::InvalidConfiguration(format!("invalid scenario JSON: {}", e)))
    }

    /// The protocol defaults with this scenario's overrides applied.
    pub fn params(&self) -> RoundParams {
        let mut params = RoundParams::for_protocol(self.protocol);
        if let Some(contenders) = self.contenders {
            params.contenders = contenders;
        }
        if let Some(initial) = self.initial_backoff {
            params.initial = initial;
        }
        if let Some(exponential) = self.exponential_backoff {
            params.exponential = exponential;
        }
        params
    }

    /// Build the engine for this scenario. All validation happens here, at
    /// setup time.
    pub fn build(&self) -> Result<StepDriver, EngineError> {
        StepDriver::new(self.protocol, &self.devices, self.params(), self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_parses_with_protocol_defaults() {
        let scenario = Scenario::parse(
            r#"{
                "protocol": "csma-ca",
                "devices": ["Device 1", "Device 2"]
            }"#,
        )
        .unwrap();
        assert_eq!(scenario.protocol, Protocol::CsmaCa);
        assert_eq!(scenario.seed, None);
        let params = scenario.params();
        assert_eq!(params.initial, BackoffRange::new(2, 5));
        assert_eq!(params.exponential, BackoffRange::scaled(2, 6, 2));
        assert_eq!(params.contenders, ContenderRange { min: 1, max: 4 });
    }

    #[test]
    fn overrides_replace_the_protocol_defaults() {
        let scenario = Scenario::parse(
            r#"{
                "protocol": "csma-cd",
                "seed": 7,
                "devices": ["A", "B", "C"],
                "contenders": { "min": 2, "max": 2 },
                "initial-backoff": { "low": 2, "high": 4 },
                "exponential-backoff": { "low": 2, "high": 10 }
            }"#,
        )
        .unwrap();
        let params = scenario.params();
        assert_eq!(params.contenders, ContenderRange { min: 2, max: 2 });
        assert_eq!(params.initial, BackoffRange::new(2, 4));
        assert_eq!(params.exponential, BackoffRange::new(2, 10));
        scenario.build().unwrap();
    }

    #[test]
    fn unknown_fields_and_bad_protocols_are_rejected() {
        assert!(matches!(
            Scenario::parse(r#"{ "protocol": "aloha", "devices": ["A"] }"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Scenario::parse(r#"{ "protocol": "csma-ca", "devices": ["A"], "colour": "red" }"#),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn building_an_invalid_scenario_fails_at_setup() {
        let scenario = Scenario::parse(
            r#"{
                "protocol": "csma-ca",
                "devices": [],
                "seed": 1
            }"#,
        )
        .unwrap();
        assert!(matches!(scenario.build(), Err(EngineError::InvalidConfiguration(_))));

        let scenario = Scenario::parse(
            r#"{
                "protocol": "csma-cd",
                "devices": ["A", "B"],
                "initial-backoff": { "low": 9, "high": 2 }
            }"#,
        )
        .unwrap();
        assert!(matches!(scenario.build(), Err(EngineError::InvalidConfiguration(_))));
    }
}
