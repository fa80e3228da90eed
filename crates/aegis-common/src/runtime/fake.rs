//! Fixture-driven `Runtime` backend used for tests and benchmark runs.
//!
//! Scripted with a queue of `FixtureResponse`s consumed one per call, the
//! way the teacher's `llm_benchmark.rs` drives a fixed prompt suite
//! through a backend trait. Honors the same single-flight /
//! timeout-with-grace / cooldown discipline a real native backend would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::EngineError;

use super::{Admission, InferenceConfig, InferenceResult, CANCEL_COOLDOWN_MS, TIMEOUT_GRACE_MS};

/// One scripted outcome for the next `run_inference` call.
#[derive(Debug, Clone)]
pub enum FixtureResponse {
    /// Completes immediately with the given raw model output.
    Success {
        raw_output: String,
        tokens_generated: u32,
        ttft_ms: u64,
        total_ms: u64,
    },
    /// Completes immediately but reports a backend-level failure (e.g.
    /// out-of-memory) without tripping admission-level error handling.
    BackendError { kind: &'static str, message: String },
    /// Never completes on its own; only stops when the timeout elapses
    /// and the runtime cancels it. `cooperative = false` models a
    /// backend that ignores the cancellation flag, forcing the runtime
    /// to wait out the full grace window before abandoning it.
    Hang { cooperative: bool },
}

pub struct FakeRuntime {
    admission: Admission,
    cancel_flag: AtomicBool,
    shut_down: AtomicBool,
    script: Mutex<VecDeque<FixtureResponse>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            admission: Admission::new(),
            cancel_flag: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_script(script: Vec<FixtureResponse>) -> Self {
        let runtime = Self::new();
        *runtime.script.lock().unwrap() = script.into();
        runtime
    }

    /// Appends one more scripted response to the back of the queue.
    pub fn push_response(&self, response: FixtureResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    fn next_response(&self) -> FixtureResponse {
        self.script.lock().unwrap().pop_front().unwrap_or(FixtureResponse::Success {
            raw_output: String::new(),
            tokens_generated: 0,
            ttft_ms: 1,
            total_ms: 1,
        })
    }

    pub async fn run_inference(
        &self,
        _prompt: &str,
        config: &InferenceConfig,
    ) -> Result<InferenceResult, EngineError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::InvalidState("runtime shut down".into()));
        }
        let _guard = self.admission.try_admit()?;
        self.cancel_flag.store(false, Ordering::SeqCst);

        match self.next_response() {
            FixtureResponse::Success {
                raw_output,
                tokens_generated,
                ttft_ms,
                total_ms,
            } => Ok(InferenceResult {
                success: true,
                raw_output,
                tokens_generated,
                ttft_ms: Some(ttft_ms),
                total_ms,
                error_kind: None,
                error_message: None,
            }),
            FixtureResponse::BackendError { kind, message } => Ok(InferenceResult {
                success: false,
                raw_output: String::new(),
                tokens_generated: 0,
                ttft_ms: None,
                total_ms: 0,
                error_kind: Some(kind.to_string()),
                error_message: Some(message),
            }),
            FixtureResponse::Hang { cooperative } => {
                let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);
                while Instant::now() < deadline {
                    if self.cancel_flag.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
                // signal cooperative cancellation
                self.cancel_flag.store(true, Ordering::SeqCst);
                if !cooperative {
                    tokio::time::sleep(Duration::from_millis(TIMEOUT_GRACE_MS)).await;
                }
                self.admission.start_cooldown();
                Err(EngineError::Timeout(config.timeout_ms))
            }
        }
    }

    pub fn cancel_inference(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.admission.start_cooldown();
    }

    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}
