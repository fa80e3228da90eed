//! EngineConfig - tunable constants for the pipeline, loaded the way the
//! teacher's `anna_config.rs` / `model_policy.rs` load theirs: parse a
//! TOML file if present, otherwise fall back to `Default`. Nothing here
//! is required for correctness - every field has a spec-derived default
//! so the engine runs sensibly with no config file at all.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Runtime/admission tunables plus prompt-budget and production-ready
/// thresholds. Grouped into one struct since the host app ships a single
/// config file for the whole explanation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grace window after a cancel/timeout before the runtime forcibly
    /// abandons the backend. Spec: a few hundred ms, < 2s.
    pub timeout_grace_ms: u64,
    /// Cooldown window after a cancel/timeout during which new calls are
    /// refused with `Busy`. Spec: < 1s.
    pub cancel_cooldown_ms: u64,
    /// PromptBuilder budgets.
    pub max_events: usize,
    pub max_hypotheses: usize,
    pub max_signals_per_event: usize,
    /// Resolves the spec's open question on the exact LOW_RAM threshold:
    /// available RAM (in MB) below which CapabilityGate denies with
    /// `LOW_RAM`. See DESIGN.md for the reasoning.
    pub low_ram_available_mb: u64,
    /// Default per-call inference timeout fed to `InferenceConfig` when
    /// the caller does not override it.
    pub default_inference_timeout_ms: u64,
    /// §4.9 production-ready thresholds, kept overridable for
    /// experimentation but defaulted to the spec's numbers.
    pub min_benchmark_runs: u32,
    pub max_stop_failure_rate: f64,
    pub min_health_score: f64,
    pub min_schema_compliance_rate: f64,
    pub max_policy_violation_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_grace_ms: crate::runtime::TIMEOUT_GRACE_MS,
            cancel_cooldown_ms: crate::runtime::CANCEL_COOLDOWN_MS,
            max_events: crate::prompt_builder::MAX_EVENTS,
            max_hypotheses: crate::prompt_builder::MAX_HYPOTHESES,
            max_signals_per_event: crate::prompt_builder::MAX_SIGNALS_PER_EVENT,
            low_ram_available_mb: 1500,
            default_inference_timeout_ms: 4_000,
            min_benchmark_runs: 10,
            max_stop_failure_rate: 0.02,
            min_health_score: 0.70,
            min_schema_compliance_rate: 0.85,
            max_policy_violation_rate: 0.01,
        }
    }
}

impl EngineConfig {
    /// Loads from a TOML file, falling back to `Default` if the file is
    /// absent or fails to parse - a config problem on-device should
    /// never prevent the pipeline from running.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "failed to parse engine config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}
