//! `benchmark` command - drives the fixture suite through
//! `BenchmarkRunner` against a fake runtime scripted with plausible,
//! deterministic timings, then prints the same summary format the host
//! app's QA harness would log.

use std::sync::Arc;
use std::time::Duration;

use aegis_common::benchmark::BenchmarkRunner;
use aegis_common::capability_gate::{RuntimeSnapshot, StaticDeviceProfile};
use aegis_common::config::EngineConfig;
use aegis_common::model_manager::ModelState;
use aegis_common::orchestrator::{DeviceStateProvider, StaticDeviceState};
use aegis_common::runtime::fake::{FakeRuntime, FixtureResponse};
use aegis_common::runtime::Runtime;
use aegis_common::ExplanationOrchestrator;
use anyhow::Result;
use clap::Args;
use console::style;
use indicatif::ProgressBar;

const SUCCESS_SLOTS: &str = r#"{"assessedSeverity":"HIGH","summaryTone":"NEUTRAL","selectedEvidenceIds":["sig-cert-1"],"recommendedActions":["UNINSTALL_APP"],"confidence":0.75,"canBeIgnored":false}"#;

#[derive(Args)]
pub struct BenchmarkArgs {
    /// Number of simulated runs; the fixture suite repeats to reach this count
    #[arg(long, default_value_t = 20)]
    runs: u32,
}

pub async fn run(args: BenchmarkArgs) -> Result<()> {
    let suite = aegis_common::fixtures::standard_suite();
    let incidents: Vec<_> = suite.iter().cloned().cycle().take(args.runs.max(1) as usize).collect();

    let fake = FakeRuntime::new();
    for i in 0..incidents.len() {
        // Deterministic, varied synthetic timings so the summary isn't a
        // flat line. No external randomness involved.
        let tokens = 30 + (i as u32 % 5) * 8;
        let total_ms = 90 + (i as u64 % 7) * 15;
        let ttft_ms = 10 + (i as u64 % 3) * 5;
        fake.push_response(FixtureResponse::Success {
            raw_output: SUCCESS_SLOTS.to_string(),
            tokens_generated: tokens,
            ttft_ms,
            total_ms,
        });
    }
    let runtime = Runtime::Fake(fake);

    let device_state: Arc<dyn DeviceStateProvider> = Arc::new(StaticDeviceState {
        snapshot: RuntimeSnapshot {
            available_ram_mb: 4000,
            power_saver_active: false,
            thermal_throttled: false,
            app_backgrounded: false,
        },
        kill_switch_active: false,
        user_toggle_enabled: true,
        model_state: ModelState::Ready,
    });
    let static_profile = StaticDeviceProfile {
        total_ram_mb: 8000,
        is_64_bit: true,
        sdk_version: 34,
    };
    let config = EngineConfig::default();
    let orchestrator = ExplanationOrchestrator::new(runtime, static_profile, device_state, config.clone());

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(format!("running {} benchmark calls...", incidents.len()));

    let runner = BenchmarkRunner::new(&orchestrator, "slot-filler-small", "fake");
    let result = runner.run(&incidents).await;
    spinner.finish_and_clear();

    println!("{}", style("benchmark result").bold());
    println!();
    println!("{}", result.summary(&config));
    Ok(())
}
