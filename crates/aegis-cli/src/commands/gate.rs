//! `gate` command - evaluates `CapabilityGate::decide` against
//! CLI-supplied device/runtime flags, for reproducing a denial a field
//! report mentioned without needing the actual device.

use aegis_common::capability_gate::{self, RuntimeSnapshot, StaticDeviceProfile};
use aegis_common::config::EngineConfig;
use aegis_common::model_manager::ModelState;
use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;

#[derive(Args)]
pub struct GateArgs {
    /// Total device RAM in MB (static tiering)
    #[arg(long, default_value_t = 8000)]
    total_ram_mb: u64,
    /// Available RAM in MB right now
    #[arg(long, default_value_t = 4000)]
    available_ram_mb: u64,
    /// Treat the device as 32-bit rather than 64-bit
    #[arg(long)]
    is_32_bit: bool,
    #[arg(long)]
    kill_switch: bool,
    #[arg(long)]
    user_disabled: bool,
    #[arg(long)]
    power_saver: bool,
    #[arg(long)]
    thermal_throttled: bool,
    #[arg(long)]
    backgrounded: bool,
    /// Treat the model as not yet downloaded rather than ready
    #[arg(long)]
    model_not_ready: bool,
}

pub fn run(args: GateArgs) -> Result<()> {
    let profile = StaticDeviceProfile {
        total_ram_mb: args.total_ram_mb,
        is_64_bit: !args.is_32_bit,
        sdk_version: 34,
    };
    let snapshot = RuntimeSnapshot {
        available_ram_mb: args.available_ram_mb,
        power_saver_active: args.power_saver,
        thermal_throttled: args.thermal_throttled,
        app_backgrounded: args.backgrounded,
    };
    let model_state = if args.model_not_ready {
        ModelState::NotDownloaded
    } else {
        ModelState::Ready
    };

    let decision = capability_gate::decide(
        &profile,
        &snapshot,
        args.kill_switch,
        !args.user_disabled,
        model_state,
        &EngineConfig::default(),
    );

    if decision.allowed {
        println!("{}  {}", "allowed".bright_green(), decision.reason);
    } else {
        println!("{}  {:?}: {}", "denied".bright_red(), decision.rule, decision.reason);
    }
    Ok(())
}
