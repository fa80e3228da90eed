//! `explain` command - runs one fixture incident through the real
//! `ExplanationOrchestrator`, either down the template path (the
//! default, since no LLM backend is wired into the CLI) or down the
//! LLM-assisted path when `--raw-llm-output` scripts a response.

use std::sync::Arc;

use aegis_common::capability_gate::{RuntimeSnapshot, StaticDeviceProfile};
use aegis_common::config::EngineConfig;
use aegis_common::model_manager::ModelState;
use aegis_common::orchestrator::{DeviceStateProvider, StaticDeviceState};
use aegis_common::runtime::fake::{FakeRuntime, FixtureResponse};
use aegis_common::runtime::Runtime;
use aegis_common::types::SecurityIncident;
use aegis_common::{EngineSource, ExplanationAnswer, ExplanationOrchestrator};
use anyhow::Result;
use clap::{Args, ValueEnum};
use owo_colors::OwoColorize;

#[derive(Clone, Copy, ValueEnum)]
pub enum FixtureName {
    InfoConfigChange,
    HardCertMismatch,
    StalkerwarePattern,
    LowPermissionAdded,
    CriticalNativeTampering,
}

impl FixtureName {
    fn incident(self) -> SecurityIncident {
        match self {
            FixtureName::InfoConfigChange => aegis_common::fixtures::info_config_change(),
            FixtureName::HardCertMismatch => aegis_common::fixtures::hard_cert_mismatch_high_confidence(),
            FixtureName::StalkerwarePattern => aegis_common::fixtures::stalkerware_pattern(),
            FixtureName::LowPermissionAdded => aegis_common::fixtures::low_permission_added(),
            FixtureName::CriticalNativeTampering => aegis_common::fixtures::critical_native_tampering_no_package(),
        }
    }
}

#[derive(Args)]
pub struct ExplainArgs {
    /// Which fixture incident to run
    #[arg(value_enum)]
    fixture: FixtureName,

    /// Script this raw model output as a successful LLM response instead
    /// of exercising the default template-fallback path
    #[arg(long)]
    raw_llm_output: Option<String>,

    /// Print the full answer as JSON instead of a colorized summary
    #[arg(long)]
    json: bool,
}

pub async fn run(args: ExplainArgs) -> Result<()> {
    let incident = args.fixture.incident();

    let fake = FakeRuntime::new();
    if let Some(raw) = &args.raw_llm_output {
        fake.push_response(FixtureResponse::Success {
            raw_output: raw.clone(),
            tokens_generated: raw.split_whitespace().count() as u32,
            ttft_ms: 30,
            total_ms: 120,
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

    let orchestrator = ExplanationOrchestrator::new(runtime, static_profile, device_state, EngineConfig::default());
    let answer = orchestrator.explain(&incident).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    print_answer(&incident, &answer);
    Ok(())
}

fn print_answer(incident: &SecurityIncident, answer: &ExplanationAnswer) {
    let source_label = match answer.engine_source {
        EngineSource::Template => "template".to_string(),
        EngineSource::LlmAssisted => "llm-assisted".bright_green().to_string(),
        EngineSource::LlmFallbackToTemplate => "llm-fallback".yellow().to_string(),
    };

    println!("{}  {}", "*".cyan(), incident.title.bright_white());
    println!("   engine: {}", source_label);
    println!("   severity: {:?}", answer.severity);
    println!("   confidence: {:.2}", answer.confidence);
    println!("   summary: {}", answer.summary);

    if !answer.reasons.is_empty() {
        println!("   reasons:");
        for reason in &answer.reasons {
            println!("     - [{}] {}", reason.evidence_id.dimmed(), reason.text);
        }
    }

    if !answer.actions.is_empty() {
        println!("   actions:");
        for action in &answer.actions {
            println!("     {}. {}", action.step_number, action.description);
        }
    }

    if let Some(reason) = &answer.when_to_ignore {
        println!("   when to ignore: {}", reason);
    }

    if answer.is_busy_fallback {
        println!("   {}", "note: inference was busy, this is a template fallback".yellow());
    }
}
