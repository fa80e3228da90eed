//! BenchmarkRunner - drives fixture incidents through the orchestrator
//! and aggregates latency, stability, quality, and pipeline metrics plus
//! a production-ready predicate.
//!
//! Grounded on the teacher's `llm_benchmark.rs` (`BenchmarkResult`/
//! `BenchmarkSuiteResult` aggregation shape and `summary()` formatting)
//! and `reliability_gate.rs` (a composite go/no-go predicate over
//! several independent thresholds).

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorClass};
use crate::orchestrator::{ExplanationOrchestrator, ValidateOutcomeTag};
use crate::types::SecurityIncident;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub avg_total_ms: f64,
    pub min_total_ms: f64,
    pub max_total_ms: f64,
    pub median_total_ms: f64,
    pub p95_total_ms: f64,
    pub p99_total_ms: f64,
    pub avg_ttft_ms: f64,
    pub avg_tokens_per_sec: f64,
}

impl LatencyMetrics {
    fn zero() -> Self {
        Self {
            avg_total_ms: 0.0,
            min_total_ms: 0.0,
            max_total_ms: 0.0,
            median_total_ms: 0.0,
            p95_total_ms: 0.0,
            p99_total_ms: 0.0,
            avg_ttft_ms: 0.0,
            avg_tokens_per_sec: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    pub total_calls: u32,
    pub success_count: u32,
    pub oom_count: u32,
    pub timeout_count: u32,
    pub other_error_count: u32,
    pub busy_count: u32,
}

impl StabilityMetrics {
    /// Excludes `busy` - a busy admission is not a failure, it's the
    /// single-flight mechanism working as designed.
    pub fn real_error_count(&self) -> u32 {
        self.oom_count + self.timeout_count + self.other_error_count
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_calls as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub schema_compliance_rate: f64,
    pub evidence_faithfulness_rate: f64,
    pub policy_violation_count: u32,
    pub avg_confidence: f64,
    pub repaired_count: u32,
    pub rejected_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub inference_rate: f64,
    pub parse_rate: f64,
    pub validate_rate: f64,
    pub validate_repair_rate: f64,
    pub template_fallback_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub model_id: String,
    pub runtime_id: String,
    pub total_runs: u32,
    pub latency: LatencyMetrics,
    pub stability: StabilityMetrics,
    pub quality: QualityMetrics,
    pub pipeline: PipelineMetrics,
    pub peak_native_heap_bytes: Option<u64>,
    pub avg_generated_tokens: f64,
    pub max_generated_tokens: u32,
    pub stop_failure_rate: f64,
}

impl BenchmarkResult {
    /// `0.4*compliance + 0.3*success + 0.3*(1 - templateFallbackRate)`,
    /// clamped to `[0, 1]`; zero with no runs at all.
    pub fn health_score(&self) -> f64 {
        if self.total_runs == 0 {
            return 0.0;
        }
        let score = 0.4 * self.quality.schema_compliance_rate
            + 0.3 * self.stability.success_rate()
            + 0.3 * (1.0 - self.pipeline.template_fallback_rate);
        score.clamp(0.0, 1.0)
    }

    /// The §4.9 go/no-go predicate.
    pub fn is_production_ready(&self, config: &EngineConfig) -> bool {
        self.total_runs >= config.min_benchmark_runs
            && self.stop_failure_rate <= config.max_stop_failure_rate
            && self.health_score() >= config.min_health_score
            && self.quality.schema_compliance_rate >= config.min_schema_compliance_rate
            && self.policy_violation_rate() <= config.max_policy_violation_rate
    }

    fn policy_violation_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.quality.policy_violation_count as f64 / self.total_runs as f64
        }
    }

    /// Human-readable multi-line summary per §6: model id, run count,
    /// health percentage, latency trio, compliance %, fallback %, and -
    /// when non-zero - token averages, stop-failure %, busy % with
    /// count, OOM count, timeout count, and a literal YES/NO line.
    pub fn summary(&self, config: &EngineConfig) -> String {
        let mut lines = vec![
            format!("model: {}", self.model_id),
            format!("runs: {}", self.total_runs),
            format!("health: {:.0}%", self.health_score() * 100.0),
            format!(
                "latency (avg/p95/p99 ms): {:.1}/{:.1}/{:.1}",
                self.latency.avg_total_ms, self.latency.p95_total_ms, self.latency.p99_total_ms
            ),
            format!("schema compliance: {:.0}%", self.quality.schema_compliance_rate * 100.0),
            format!("template fallback: {:.0}%", self.pipeline.template_fallback_rate * 100.0),
        ];

        if self.avg_generated_tokens > 0.0 {
            lines.push(format!(
                "tokens (avg/max): {:.1}/{}",
                self.avg_generated_tokens, self.max_generated_tokens
            ));
        }
        if self.stop_failure_rate > 0.0 {
            lines.push(format!("stop failure: {:.1}%", self.stop_failure_rate * 100.0));
        }
        if self.stability.busy_count > 0 {
            let busy_rate = self.stability.busy_count as f64 / self.total_runs.max(1) as f64;
            lines.push(format!("busy: {:.0}% ({})", busy_rate * 100.0, self.stability.busy_count));
        }
        if self.stability.oom_count > 0 {
            lines.push(format!("oom: {}", self.stability.oom_count));
        }
        if self.stability.timeout_count > 0 {
            lines.push(format!("timeout: {}", self.stability.timeout_count));
        }

        lines.push(format!(
            "production ready: {}",
            if self.is_production_ready(config) { "YES" } else { "NO" }
        ));

        lines.join("\n")
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Best-effort current-process memory sample, in bytes. `None` when the
/// platform doesn't expose it (e.g. the process cannot be found under
/// `sysinfo`'s view) - peak native heap is optional per the spec.
fn current_process_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory() * 1024)
}

pub struct BenchmarkRunner<'a> {
    orchestrator: &'a ExplanationOrchestrator,
    model_id: String,
    runtime_id: String,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(orchestrator: &'a ExplanationOrchestrator, model_id: impl Into<String>, runtime_id: impl Into<String>) -> Self {
        Self {
            orchestrator,
            model_id: model_id.into(),
            runtime_id: runtime_id.into(),
        }
    }

    /// Runs every incident through the orchestrator once, in order, and
    /// aggregates the result. Incidents may repeat (e.g. the same
    /// fixture incident passed N times) to reach a target run count.
    pub async fn run(&self, incidents: &[SecurityIncident]) -> BenchmarkResult {
        let mut total_ms_success = Vec::new();
        let mut ttft_ms_success = Vec::new();
        let mut tokens_per_sec_success = Vec::new();
        let mut generated_tokens = Vec::new();
        let mut max_generated_tokens = 0u32;
        let mut stop_failures = 0u32;
        let mut successful_runs = 0u32;

        let mut stability = StabilityMetrics {
            total_calls: 0,
            success_count: 0,
            oom_count: 0,
            timeout_count: 0,
            other_error_count: 0,
            busy_count: 0,
        };

        let mut schema_compliant = 0u32;
        let mut faithfulness_hits = 0u32;
        let mut policy_violation_count = 0u32;
        let mut confidences = Vec::new();
        let mut repaired_count = 0u32;
        let mut rejected_count = 0u32;

        let mut inference_ran = 0u32;
        let mut parse_ok = 0u32;
        let mut validate_first_try = 0u32;
        let mut validate_repair = 0u32;
        let mut template_fallback = 0u32;

        let mut peak_heap: Option<u64> = None;

        for incident in incidents {
            stability.total_calls += 1;
            let (answer, trace) = self.orchestrator.explain_traced(incident).await;

            if let Some(bytes) = current_process_memory_bytes() {
                peak_heap = Some(peak_heap.map_or(bytes, |p| p.max(bytes)));
            }

            if trace.used_template_fallback {
                template_fallback += 1;
            }
            if trace.inference_ran {
                inference_ran += 1;
            }

            policy_violation_count += answer.policy_violations_found;
            confidences.push(answer.confidence);
            let faithful = answer
                .reasons
                .iter()
                .all(|r| incident.all_signal_ids().contains(r.evidence_id.as_str()));
            if faithful {
                faithfulness_hits += 1;
            }

            match (&trace.inference_error, &trace.inference_result) {
                (Some(e), _) => {
                    stability.classify_into(e.classify());
                }
                (None, Some(result)) => {
                    if result.success {
                        stability.success_count += 1;
                        successful_runs += 1;
                        total_ms_success.push(result.total_ms as f64);
                        if let Some(ttft) = result.ttft_ms {
                            ttft_ms_success.push(ttft as f64);
                        }
                        if result.total_ms > 0 {
                            tokens_per_sec_success
                                .push(result.tokens_generated as f64 / (result.total_ms as f64 / 1000.0));
                        }
                        generated_tokens.push(result.tokens_generated as f64);
                        max_generated_tokens = max_generated_tokens.max(result.tokens_generated);
                        if let Some(cfg) = &trace.inference_config {
                            if result.tokens_generated == cfg.max_new_tokens {
                                stop_failures += 1;
                            }
                        }
                    } else if let Some(msg) = &result.error_message {
                        stability.classify_into(EngineError::Other(msg.clone()).classify());
                    } else {
                        stability.other_error_count += 1;
                    }
                }
                (None, None) => {}
            }

            match trace.validate_outcome {
                Some(ValidateOutcomeTag::Valid) => {
                    validate_first_try += 1;
                    schema_compliant += 1;
                }
                Some(ValidateOutcomeTag::Repaired) => {
                    validate_repair += 1;
                    repaired_count += 1;
                }
                Some(ValidateOutcomeTag::Rejected) => {
                    rejected_count += 1;
                }
                None => {}
            }
            if trace.parse_outcome == Some(crate::orchestrator::ParseOutcomeTag::Success) {
                parse_ok += 1;
            }
        }

        let total_runs = stability.total_calls;
        let denom = total_runs.max(1) as f64;

        total_ms_success.sort_by(|a, b| a.total_cmp(b));

        let latency = if total_ms_success.is_empty() {
            LatencyMetrics::zero()
        } else {
            LatencyMetrics {
                avg_total_ms: mean(&total_ms_success),
                min_total_ms: total_ms_success[0],
                max_total_ms: *total_ms_success.last().unwrap(),
                median_total_ms: median(&total_ms_success),
                p95_total_ms: percentile(&total_ms_success, 0.95),
                p99_total_ms: percentile(&total_ms_success, 0.99),
                avg_ttft_ms: mean(&ttft_ms_success),
                avg_tokens_per_sec: mean(&tokens_per_sec_success),
            }
        };

        let quality = QualityMetrics {
            schema_compliance_rate: schema_compliant as f64 / denom,
            evidence_faithfulness_rate: faithfulness_hits as f64 / denom,
            policy_violation_count,
            avg_confidence: mean(&confidences),
            repaired_count,
            rejected_count,
        };

        let pipeline = PipelineMetrics {
            inference_rate: inference_ran as f64 / denom,
            parse_rate: parse_ok as f64 / denom,
            validate_rate: validate_first_try as f64 / denom,
            validate_repair_rate: validate_repair as f64 / denom,
            template_fallback_rate: template_fallback as f64 / denom,
        };

        let stop_failure_rate = if successful_runs == 0 {
            0.0
        } else {
            stop_failures as f64 / successful_runs as f64
        };

        BenchmarkResult {
            model_id: self.model_id.clone(),
            runtime_id: self.runtime_id.clone(),
            total_runs,
            latency,
            stability,
            quality,
            pipeline,
            peak_native_heap_bytes: peak_heap,
            avg_generated_tokens: mean(&generated_tokens),
            max_generated_tokens,
            stop_failure_rate,
        }
    }
}

impl StabilityMetrics {
    fn classify_into(&mut self, class: ErrorClass) {
        match class {
            ErrorClass::Busy => self.busy_count += 1,
            ErrorClass::Oom => self.oom_count += 1,
            ErrorClass::Timeout => self.timeout_count += 1,
            ErrorClass::Other => self.other_error_count += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability_gate::{RuntimeSnapshot, StaticDeviceProfile};
    use crate::model_manager::ModelState;
    use crate::orchestrator::{DeviceStateProvider, StaticDeviceState};
    use crate::runtime::fake::{FakeRuntime, FixtureResponse};
    use crate::runtime::Runtime;
    use std::sync::Arc;

    fn allowed_device_state() -> Arc<dyn DeviceStateProvider> {
        Arc::new(StaticDeviceState {
            snapshot: RuntimeSnapshot {
                available_ram_mb: 4000,
                power_saver_active: false,
                thermal_throttled: false,
                app_backgrounded: false,
            },
            kill_switch_active: false,
            user_toggle_enabled: true,
            model_state: ModelState::Ready,
        })
    }

    fn tier2_profile() -> StaticDeviceProfile {
        StaticDeviceProfile {
            total_ram_mb: 8000,
            is_64_bit: true,
            sdk_version: 34,
        }
    }

    fn valid_slots_json() -> String {
        r#"{"assessedSeverity":"HIGH","summaryTone":"NEUTRAL","selectedEvidenceIds":["sig-cert-1"],"recommendedActions":["UNINSTALL_APP"],"confidence":0.75,"canBeIgnored":false}"#.to_string()
    }

    #[tokio::test]
    async fn all_successes_yield_full_compliance_and_zero_fallback() {
        let fake = FakeRuntime::new();
        for _ in 0..5 {
            fake.push_response(FixtureResponse::Success {
                raw_output: valid_slots_json(),
                tokens_generated: 50,
                ttft_ms: 10,
                total_ms: 100,
            });
        }
        let runtime = Runtime::Fake(fake);
        let orchestrator =
            ExplanationOrchestrator::new(runtime, tier2_profile(), allowed_device_state(), EngineConfig::default());
        let incidents = vec![crate::fixtures::hard_cert_mismatch_high_confidence(); 5];
        let runner = BenchmarkRunner::new(&orchestrator, "test-model", "fake");
        let result = runner.run(&incidents).await;

        assert_eq!(result.total_runs, 5);
        assert_eq!(result.stability.success_count, 5);
        assert_eq!(result.pipeline.template_fallback_rate, 0.0);
        assert_eq!(result.quality.schema_compliance_rate, 1.0);
        assert_eq!(result.quality.evidence_faithfulness_rate, 1.0);
    }

    #[tokio::test]
    async fn zero_runs_has_zero_metrics_everywhere() {
        let runtime = Runtime::Fake(FakeRuntime::new());
        let orchestrator =
            ExplanationOrchestrator::new(runtime, tier2_profile(), allowed_device_state(), EngineConfig::default());
        let runner = BenchmarkRunner::new(&orchestrator, "test-model", "fake");
        let result = runner.run(&[]).await;

        assert_eq!(result.total_runs, 0);
        assert_eq!(result.latency, LatencyMetrics::zero());
        assert_eq!(result.health_score(), 0.0);
        assert!(!result.is_production_ready(&EngineConfig::default()));
    }

    #[tokio::test]
    async fn busy_is_not_counted_as_a_real_error() {
        let fake = FakeRuntime::new();
        fake.push_response(FixtureResponse::Hang { cooperative: true });
        let runtime = Runtime::Fake(fake);
        let config = EngineConfig {
            default_inference_timeout_ms: 200,
            ..EngineConfig::default()
        };
        let orchestrator = Arc::new(ExplanationOrchestrator::new(
            runtime,
            tier2_profile(),
            allowed_device_state(),
            config,
        ));
        let runner_orchestrator = orchestrator.clone();
        let incident = crate::fixtures::hard_cert_mismatch_high_confidence();
        let i1 = incident.clone();
        let first = tokio::spawn(async move { runner_orchestrator.explain_traced(&i1).await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let runner = BenchmarkRunner::new(&orchestrator, "test-model", "fake");
        let result = runner.run(std::slice::from_ref(&incident)).await;
        assert_eq!(result.stability.busy_count, 1);
        assert_eq!(result.stability.real_error_count(), 0);
        let _ = first.await;
    }

    #[test]
    fn production_ready_requires_every_threshold() {
        let config = EngineConfig::default();
        let good = BenchmarkResult {
            model_id: "m".into(),
            runtime_id: "r".into(),
            total_runs: 20,
            latency: LatencyMetrics::zero(),
            stability: StabilityMetrics {
                total_calls: 20,
                success_count: 20,
                oom_count: 0,
                timeout_count: 0,
                other_error_count: 0,
                busy_count: 0,
            },
            quality: QualityMetrics {
                schema_compliance_rate: 0.95,
                evidence_faithfulness_rate: 1.0,
                policy_violation_count: 0,
                avg_confidence: 0.8,
                repaired_count: 0,
                rejected_count: 0,
            },
            pipeline: PipelineMetrics {
                inference_rate: 1.0,
                parse_rate: 1.0,
                validate_rate: 1.0,
                validate_repair_rate: 0.0,
                template_fallback_rate: 0.0,
            },
            peak_native_heap_bytes: None,
            avg_generated_tokens: 40.0,
            max_generated_tokens: 60,
            stop_failure_rate: 0.0,
        };
        assert!(good.is_production_ready(&config));

        let mut too_few_runs = good.clone();
        too_few_runs.total_runs = 5;
        assert!(!too_few_runs.is_production_ready(&config));

        let mut too_many_stop_failures = good.clone();
        too_many_stop_failures.stop_failure_rate = 0.1;
        assert!(!too_many_stop_failures.is_production_ready(&config));

        let mut too_many_violations = good.clone();
        too_many_violations.quality.policy_violation_count = 5;
        assert!(!too_many_violations.is_production_ready(&config));

        let mut low_compliance = good.clone();
        low_compliance.quality.schema_compliance_rate = 0.5;
        assert!(!low_compliance.is_production_ready(&config));
    }

    #[test]
    fn summary_includes_yes_no_literal() {
        let config = EngineConfig::default();
        let result = BenchmarkResult {
            model_id: "m".into(),
            runtime_id: "r".into(),
            total_runs: 1,
            latency: LatencyMetrics::zero(),
            stability: StabilityMetrics {
                total_calls: 1,
                success_count: 0,
                oom_count: 0,
                timeout_count: 0,
                other_error_count: 1,
                busy_count: 0,
            },
            quality: QualityMetrics {
                schema_compliance_rate: 0.0,
                evidence_faithfulness_rate: 0.0,
                policy_violation_count: 0,
                avg_confidence: 0.0,
                repaired_count: 0,
                rejected_count: 0,
            },
            pipeline: PipelineMetrics {
                inference_rate: 1.0,
                parse_rate: 0.0,
                validate_rate: 0.0,
                validate_repair_rate: 0.0,
                template_fallback_rate: 1.0,
            },
            peak_native_heap_bytes: None,
            avg_generated_tokens: 0.0,
            max_generated_tokens: 0,
            stop_failure_rate: 0.0,
        };
        let summary = result.summary(&config);
        assert!(summary.contains("NO"));
        assert!(summary.contains("model: m"));
    }
}
