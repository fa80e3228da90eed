//! CapabilityGate - composite, stateless decision over whether the LLM
//! path may run at all.
//!
//! Grounded on the teacher's `hardware_capability.rs` RAM/core tiering
//! and `reliability_gate.rs`'s ordered-reason gate-result shape,
//! generalized to the spec's seven-rule device/runtime/kill-switch
//! predicate.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::model_manager::ModelState;

/// Static, rarely-changing device properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticDeviceProfile {
    pub total_ram_mb: u64,
    pub is_64_bit: bool,
    pub sdk_version: u32,
}

/// Frequently-changing runtime conditions, sampled fresh per `explain`
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub available_ram_mb: u64,
    pub power_saver_active: bool,
    pub thermal_throttled: bool,
    pub app_backgrounded: bool,
}

/// Device tier derived from RAM and bitness alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceTier {
    /// LLM path is never allowed.
    Tier0,
    Tier1,
    Tier2,
}

impl DeviceTier {
    pub fn llm_allowed(self) -> bool {
        !matches!(self, DeviceTier::Tier0)
    }
}

/// Classifies a device into its static tier. `totalRamMb < 4000` or
/// non-64-bit is always `Tier0`; `>= 8000` and 64-bit is `Tier2`;
/// everything else is `Tier1`.
pub fn static_tier(profile: &StaticDeviceProfile) -> DeviceTier {
    if profile.total_ram_mb < 4000 || !profile.is_64_bit {
        DeviceTier::Tier0
    } else if profile.total_ram_mb >= 8000 {
        DeviceTier::Tier2
    } else {
        DeviceTier::Tier1
    }
}

/// Denial reasons, in the fixed evaluation order the spec mandates.
/// `ModelNotReady` is this crate's own addition for the one case the
/// spec leaves unnamed: no denial rule fires but the model still isn't
/// `READY` (e.g. `NOT_DOWNLOADED`) - see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateRule {
    KillSwitch,
    TierBlocked,
    UserDisabled,
    LowRam,
    PowerSaver,
    ThermalThrottle,
    BackgroundRestricted,
    ModelNotReady,
    Allowed,
}

/// The gate's verdict, exposed to the host app as a plain observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: String,
    pub rule: GateRule,
}

impl GateDecision {
    fn denied(rule: GateRule, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            rule,
        }
    }

    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: "capability gate passed; model is ready".to_string(),
            rule: GateRule::Allowed,
        }
    }
}

/// Evaluates the full composite predicate. Rules are checked in a fixed
/// order so identical inputs always produce the same denial reason
/// (gate monotonicity).
pub fn decide(
    static_profile: &StaticDeviceProfile,
    runtime_snapshot: &RuntimeSnapshot,
    kill_switch_active: bool,
    user_toggle_enabled: bool,
    model_state: ModelState,
    config: &EngineConfig,
) -> GateDecision {
    if kill_switch_active {
        return GateDecision::denied(GateRule::KillSwitch, "kill switch is active");
    }

    let tier = static_tier(static_profile);
    if !tier.llm_allowed() {
        return GateDecision::denied(
            GateRule::TierBlocked,
            format!("device tier {tier:?} does not permit the LLM path"),
        );
    }

    if !user_toggle_enabled {
        return GateDecision::denied(GateRule::UserDisabled, "user has disabled on-device AI assistance");
    }

    if runtime_snapshot.available_ram_mb < config.low_ram_available_mb {
        return GateDecision::denied(
            GateRule::LowRam,
            format!(
                "available ram {}mb is below the {}mb threshold",
                runtime_snapshot.available_ram_mb, config.low_ram_available_mb
            ),
        );
    }

    if runtime_snapshot.power_saver_active {
        return GateDecision::denied(GateRule::PowerSaver, "device power saver mode is active");
    }

    if runtime_snapshot.thermal_throttled {
        return GateDecision::denied(GateRule::ThermalThrottle, "device is thermally throttled");
    }

    if runtime_snapshot.app_backgrounded {
        return GateDecision::denied(GateRule::BackgroundRestricted, "app is backgrounded");
    }

    if model_state != ModelState::Ready {
        return GateDecision::denied(
            GateRule::ModelNotReady,
            format!("model state is {model_state:?}, not ready"),
        );
    }

    GateDecision::allowed()
}
