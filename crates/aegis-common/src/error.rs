//! Typed error kinds for the explanation core.
//!
//! Nothing in this crate throws or panics on a caller-reachable path.
//! `Runtime`, `ModelManager`, `SlotParser`, and `SlotValidator` return
//! these as values; `ExplanationOrchestrator` never propagates one -
//! every arm ends in a template-rendered answer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("busy: a single-flight inference is already in progress")]
    Busy,

    #[error("inference timed out after {0}ms")]
    Timeout(u64),

    #[error("out of memory: {0}")]
    Oom(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("validation rejected: {0}")]
    ValidationRejected(String),

    #[error("architecture unsupported: model requires arm64, device does not qualify")]
    ArchitectureUnsupported,

    #[error("kill switch active")]
    KillSwitchActive,

    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("other: {0}")]
    Other(String),
}

impl EngineError {
    /// Classify an error for the benchmark's stability counters.
    ///
    /// Structurally-known kinds classify directly; `Other` (which wraps
    /// whatever raw message a backend produced) falls back to a
    /// case-insensitive substring search, per the spec's
    /// `realErrorCount`/busy-exclusion rule.
    pub fn classify(&self) -> ErrorClass {
        match self {
            EngineError::Busy => ErrorClass::Busy,
            EngineError::Timeout(_) => ErrorClass::Timeout,
            EngineError::Oom(_) => ErrorClass::Oom,
            other => {
                let msg = other.to_string().to_lowercase();
                if msg.contains("busy") {
                    ErrorClass::Busy
                } else if msg.contains("oom") || msg.contains("out of memory") {
                    ErrorClass::Oom
                } else if msg.contains("timeout") {
                    ErrorClass::Timeout
                } else {
                    ErrorClass::Other
                }
            }
        }
    }
}

/// Coarse classification used by `BenchmarkRunner`'s stability metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Busy,
    Oom,
    Timeout,
    Other,
}
