//! Engine configuration types.

use std::collections::HashMap;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{HaltReason, UserResponse};

/// Default transfer chunk: 5 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// A response applied to every halt of one reason without asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    pub reason: HaltReason,
    pub response: UserResponse,
}

impl PresetResponse {
    pub fn new(reason: HaltReason, response: UserResponse) -> Self {
        Self { reason, response }
    }
}

/// Configuration for one engine run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Bytes copied per transfer step.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// How often a paused worker checks whether it may continue.
    #[builder(default = "100")]
    #[serde(default = "default_pause_poll_interval_ms")]
    pub pause_poll_interval_ms: u64,

    /// Check every source (not only the first) before taking the same-volume
    /// rename path of a move.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub verify_volume_per_source: bool,

    /// Answers given up front, as if the caller had replied with them to the
    /// first halt of that reason. Only `proceed-all` and `skip-all` are
    /// accepted.
    #[builder(default)]
    #[serde(default)]
    pub preset_responses: Vec<PresetResponse>,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_pause_poll_interval_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be greater than zero".to_string());
        }
        if self.pause_poll_interval_ms == Some(0) {
            return Err("Pause poll interval must be greater than zero".to_string());
        }
        if let Some(presets) = &self.preset_responses {
            validate_presets(presets)?;
        }
        Ok(())
    }

    /// Add one preset response.
    pub fn preset(&mut self, reason: HaltReason, response: UserResponse) -> &mut Self {
        self.preset_responses
            .get_or_insert_with(Vec::new)
            .push(PresetResponse::new(reason, response));
        self
    }
}

fn validate_presets(presets: &[PresetResponse]) -> Result<(), String> {
    match presets.iter().find(|p| !p.response.is_memoizable()) {
        Some(p) => Err(format!(
            "Preset for {} must be proceed-all or skip-all, got '{}'",
            p.reason.as_ref(),
            p.response
        )),
        None => Ok(()),
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Check a config that did not come through the builder (e.g. parsed
    /// from a file).
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("Chunk size must be greater than zero".to_string());
        }
        if self.pause_poll_interval_ms == 0 {
            return Err("Pause poll interval must be greater than zero".to_string());
        }
        validate_presets(&self.preset_responses)
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }

    /// Preset responses keyed by reason; later entries win.
    pub fn preset_map(&self) -> HashMap<HaltReason, UserResponse> {
        self.preset_responses
            .iter()
            .map(|p| (p.reason, p.response.clone()))
            .collect()
    }

    /// Preset `skip-all` for every halt reason: nothing ever blocks.
    pub fn unattended() -> Self {
        use strum::IntoEnumIterator;
        Self {
            preset_responses: HaltReason::iter()
                .map(|reason| PresetResponse::new(reason, UserResponse::SkipAll))
                .collect(),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pause_poll_interval_ms: 100,
            verify_volume_per_source: true,
            preset_responses: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .chunk_size(1024u64)
            .verify_volume_per_source(false)
            .preset(HaltReason::DestinationExists, UserResponse::SkipAll)
            .build()
            .unwrap();

        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.pause_poll_interval_ms, 100);
        assert!(!config.verify_volume_per_source);
        assert_eq!(
            config.preset_map().get(&HaltReason::DestinationExists),
            Some(&UserResponse::SkipAll)
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 5 * 1024 * 1024);
        assert_eq!(config.pause_poll_interval(), Duration::from_millis(100));
        assert!(config.verify_volume_per_source);
        assert!(config.preset_responses.is_empty());
    }

    #[test]
    fn test_config_rejects_zero_chunk() {
        assert!(EngineConfig::builder().chunk_size(0u64).build().is_err());
    }

    #[test]
    fn test_config_rejects_non_memoizable_preset() {
        let result = EngineConfig::builder()
            .preset(HaltReason::FailedToDelete, UserResponse::Retry)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unattended_covers_every_reason() {
        let config = EngineConfig::unattended();
        assert_eq!(config.preset_map().len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "preset_responses": [{ "reason": "source-read-only", "response": "proceed-all" }] }"#,
        )
        .unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(
            config.preset_map().get(&HaltReason::SourceReadOnly),
            Some(&UserResponse::ProceedAll)
        );
    }
}
