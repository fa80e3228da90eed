//! Runtime - abstraction over an inference backend.
//!
//! Two variants resolved once at construction and owned by the
//! orchestrator: `Fake` (fixture-driven, for tests and benchmarking) and
//! `Native` (the on-device model). No dynamic dispatch in the hot path -
//! see `Runtime::run_inference`, a plain match on `self`.
//!
//! Enforces single-flight admission, timeout-with-grace, and a cooldown
//! after any cancel/timeout, per the spec's concurrency model.

pub mod fake;
pub mod native;
pub mod protocol;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use fake::FakeRuntime;
pub use native::NativeRuntime;

/// Grace window after a cancel/timeout before the runtime forcibly
/// abandons the backend. Bounded below 2s per the spec.
pub const TIMEOUT_GRACE_MS: u64 = 400;
/// Cooldown window after a cancel/timeout during which new calls are
/// refused with `Busy`. Bounded below 1s per the spec.
pub const CANCEL_COOLDOWN_MS: u64 = 250;

/// Per-call immutable inference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub max_new_tokens: u32,
    /// Default 0.0: greedy decoding, so benchmark runs are reproducible
    /// within hardware jitter. Non-zero is opt-in.
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_ms: u64,
    pub stop_tokens: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.0,
            top_p: 1.0,
            timeout_ms: 4_000,
            stop_tokens: vec!["</json>".to_string()],
        }
    }
}

/// Per-call inference outcome. Backend-level failures (e.g. the model
/// process reporting OOM mid-generation) are represented here with
/// `success = false` rather than as an `Err`; admission-level failures
/// (busy, timeout, shutdown, kill switch, unsupported architecture) are
/// returned as `Err(EngineError)` by `run_inference` before a result is
/// ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub success: bool,
    pub raw_output: String,
    pub tokens_generated: u32,
    pub ttft_ms: Option<u64>,
    pub total_ms: u64,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

/// Single-flight + cooldown admission gate shared by both runtime
/// variants. One atomic admission counter plus a cooldown timestamp -
/// no general lock hierarchy.
#[derive(Debug)]
pub(crate) struct Admission {
    busy: AtomicBool,
    cooldown_until: Mutex<Option<Instant>>,
}

impl Admission {
    pub(crate) fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            cooldown_until: Mutex::new(None),
        }
    }

    /// Attempts to admit a new call. Fails with `Busy` if another call is
    /// already in flight, or if we're still inside the post-cancel
    /// cooldown window.
    pub(crate) fn try_admit(&self) -> Result<AdmitGuard<'_>, EngineError> {
        if let Some(until) = *self.cooldown_until.lock().unwrap() {
            if Instant::now() < until {
                return Err(EngineError::Busy);
            }
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::Busy);
        }
        Ok(AdmitGuard { admission: self })
    }

    /// Starts (or restarts) the cooldown window after a cancel/timeout.
    pub(crate) fn start_cooldown(&self) {
        *self.cooldown_until.lock().unwrap() =
            Some(Instant::now() + Duration::from_millis(CANCEL_COOLDOWN_MS));
    }
}

/// Held for the duration of one admitted call; releases the single-flight
/// slot on drop, including on every error/panic-unwind path.
pub(crate) struct AdmitGuard<'a> {
    admission: &'a Admission,
}

impl Drop for AdmitGuard<'_> {
    fn drop(&mut self) {
        self.admission.busy.store(false, Ordering::SeqCst);
    }
}

/// The two-variant inference backend choice. Identical contract either
/// way: fails with a typed `EngineError` rather than panicking or
/// throwing.
pub enum Runtime {
    Fake(FakeRuntime),
    Native(NativeRuntime),
}

impl Runtime {
    /// Runs one inference call under single-flight + timeout-with-grace
    /// discipline.
    pub async fn run_inference(
        &self,
        prompt: &str,
        config: &InferenceConfig,
    ) -> Result<InferenceResult, EngineError> {
        match self {
            Runtime::Fake(r) => r.run_inference(prompt, config).await,
            Runtime::Native(r) => r.run_inference(prompt, config).await,
        }
    }

    /// Idempotent; safe after shutdown and on an unloaded runtime.
    pub fn cancel_inference(&self) {
        match self {
            Runtime::Fake(r) => r.cancel_inference(),
            Runtime::Native(r) => r.cancel_inference(),
        }
    }

    /// Idempotent; releases the native handle (for the native variant).
    pub fn shutdown(&self) {
        match self {
            Runtime::Fake(r) => r.shutdown(),
            Runtime::Native(r) => r.shutdown(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Runtime::Fake(r) => r.is_available(),
            Runtime::Native(r) => r.is_available(),
        }
    }
}
