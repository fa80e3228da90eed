//! Native on-device `Runtime` backend.
//!
//! Owns an external model process exclusively: the handle is expensive
//! to create (the model weights are mapped once at spawn) and
//! non-reentrant, so every call is serialized through `Admission`.
//! Cancellation is cooperative - we write a control line the backend
//! polls between tokens - plus a bounded grace window before the
//! process is killed outright.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use crate::error::EngineError;

use super::protocol::parse_native_output;
use super::{Admission, InferenceConfig, InferenceResult, TIMEOUT_GRACE_MS};

/// Static capability check: the native backend requires a 64-bit ARM
/// ABI. `requires_64bit_arm` takes the device's reported ABI list so the
/// check can be exercised without depending on the real host target.
pub fn supports_native_backend(abis: &[String]) -> bool {
    abis.iter().any(|a| a == "arm64-v8a" || a == "aarch64")
}

/// A spawned model process: stdin for prompts/control lines, a buffered
/// stdout line reader for the `TOKENS|TTFT_MS|TEXT` protocol.
struct ModelHandle {
    child: Child,
    /// `None` only while a read is borrowed out mid-call; see
    /// `send_and_read`, which takes it out rather than holding the std
    /// `Mutex` guard across an `.await`.
    stdout: Option<BufReader<tokio::process::ChildStdout>>,
}

pub struct NativeRuntime {
    binary_path: String,
    device_abis: Vec<String>,
    kill_switch: AtomicBool,
    shut_down: AtomicBool,
    admission: Admission,
    cancel_flag: AtomicBool,
    handle: Mutex<Option<ModelHandle>>,
}

impl NativeRuntime {
    /// `binary_path` is the on-device model runner executable;
    /// `device_abis` is the device's reported ABI list, used for the
    /// static architecture gate.
    pub fn new(binary_path: impl Into<String>, device_abis: Vec<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            device_abis,
            kill_switch: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            admission: Admission::new(),
            cancel_flag: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Process-wide kill switch; overrides everything else, including
    /// the ABI check.
    pub fn set_kill_switch(&self, active: bool) {
        self.kill_switch.store(active, Ordering::SeqCst);
    }

    fn architecture_ok(&self) -> bool {
        supports_native_backend(&self.device_abis)
    }

    async fn ensure_spawned(&self) -> Result<(), EngineError> {
        let mut guard = self.handle.lock().unwrap();
        if guard.is_some() {
            return Ok(());
        }
        let mut child = Command::new(&self.binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Other(format!("failed to spawn native backend: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Other("native backend has no stdout".into()))?;
        *guard = Some(ModelHandle {
            child,
            stdout: Some(BufReader::new(stdout)),
        });
        Ok(())
    }

    pub async fn run_inference(
        &self,
        prompt: &str,
        config: &InferenceConfig,
    ) -> Result<InferenceResult, EngineError> {
        if self.kill_switch.load(Ordering::SeqCst) {
            return Err(EngineError::KillSwitchActive);
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(EngineError::InvalidState("runtime shut down".into()));
        }
        if !self.architecture_ok() {
            return Err(EngineError::ArchitectureUnsupported);
        }

        let _guard = self.admission.try_admit()?;
        self.cancel_flag.store(false, Ordering::SeqCst);
        self.ensure_spawned().await?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(config.timeout_ms),
            self.send_and_read(prompt, config),
        )
        .await;

        match outcome {
            Ok(Ok(parsed_line)) => {
                let parsed = parse_native_output(&parsed_line);
                Ok(InferenceResult {
                    success: true,
                    tokens_generated: parsed.tokens.unwrap_or(0),
                    ttft_ms: parsed.ttft_ms,
                    total_ms: started.elapsed().as_millis() as u64,
                    raw_output: parsed.text,
                    error_kind: None,
                    error_message: None,
                })
            }
            Ok(Err(e)) => Ok(InferenceResult {
                success: false,
                raw_output: String::new(),
                tokens_generated: 0,
                ttft_ms: None,
                total_ms: started.elapsed().as_millis() as u64,
                error_kind: Some("other".into()),
                error_message: Some(e.to_string()),
            }),
            Err(_elapsed) => {
                // cooperative cancellation: signal, wait a bounded grace
                // window, then forcibly detach the handle either way.
                self.cancel_flag.store(true, Ordering::SeqCst);
                let _ = self.send_control_line("__cancel__").await;
                tokio::time::sleep(Duration::from_millis(TIMEOUT_GRACE_MS)).await;
                self.force_detach();
                self.admission.start_cooldown();
                Err(EngineError::Timeout(config.timeout_ms))
            }
        }
    }

    async fn send_and_read(&self, prompt: &str, _config: &InferenceConfig) -> Result<String, EngineError> {
        self.send_control_line(prompt).await?;

        // Single-flight admission guarantees no other call is using this
        // handle concurrently, so it's safe to borrow the reader out of
        // the Option rather than hold the std Mutex guard across the
        // `.await` below.
        let mut reader = {
            let mut guard = self.handle.lock().unwrap();
            let handle = guard
                .as_mut()
                .ok_or_else(|| EngineError::InvalidState("native handle not spawned".into()))?;
            handle
                .stdout
                .take()
                .ok_or_else(|| EngineError::InvalidState("native handle stdout unavailable".into()))?
        };

        let mut line = String::new();
        let read_result = reader.read_line(&mut line).await;

        if let Some(handle) = self.handle.lock().unwrap().as_mut() {
            handle.stdout = Some(reader);
        }

        read_result.map_err(|e| EngineError::Other(format!("native backend read failed: {e}")))?;
        Ok(line)
    }

    async fn send_control_line(&self, line: &str) -> Result<(), EngineError> {
        let stdin = {
            let mut guard = self.handle.lock().unwrap();
            guard.as_mut().and_then(|h| h.child.stdin.take())
        };
        if let Some(mut stdin) = stdin {
            let write_result = stdin.write_all(format!("{line}\n").as_bytes()).await;
            let mut guard = self.handle.lock().unwrap();
            if let Some(h) = guard.as_mut() {
                h.child.stdin = Some(stdin);
            }
            write_result.map_err(|e| EngineError::Other(format!("native backend write failed: {e}")))?;
        }
        Ok(())
    }

    fn force_detach(&self) {
        let mut guard = self.handle.lock().unwrap();
        if let Some(mut handle) = guard.take() {
            let _ = handle.child.start_kill();
        }
    }

    /// Idempotent; safe after shutdown and on an unloaded runtime.
    pub fn cancel_inference(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.admission.start_cooldown();
    }

    /// Idempotent; releases the native handle.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.force_detach();
    }

    pub fn is_available(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst)
            && !self.kill_switch.load(Ordering::SeqCst)
            && self.architecture_ok()
    }
}
