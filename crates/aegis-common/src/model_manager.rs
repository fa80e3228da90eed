//! ModelManager - loads, verifies, and lifecycles the model artifact.
//!
//! State machine: NOT_DOWNLOADED -> DOWNLOADING -> VERIFYING -> READY,
//! plus the terminal-like KILLED (reversible only by deactivating the
//! kill switch, which is tracked as a separate overlay flag rather than
//! a state transition - see `state()`) and CORRUPT.
//!
//! Grounded on the teacher's `update_system.rs` checksum-then-install
//! pipeline and `auto_update.rs`'s download-manager shape, generalized
//! to HMAC-verified manifests and a pluggable downloader the way
//! `llm_client.rs` pulls its HTTP backend behind a trait.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use hex::FromHex;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EngineError;

type HmacSha256 = Hmac<Sha256>;

/// A model artifact manifest, as delivered by the update channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model_id: String,
    pub display_name: String,
    pub version: String,
    pub download_url: String,
    pub file_size_bytes: u64,
    pub sha256: String,
    pub quantization: String,
    pub requires_64_bit: bool,
}

/// Lifecycle state of the on-device model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    NotDownloaded,
    Downloading,
    Verifying,
    Ready,
    Killed,
    Corrupt,
}

/// Delegate that performs the actual byte transfer. Kept behind a trait
/// so `ModelManager` itself stays free of any particular transport -
/// the same split the teacher uses for `LlmClient`.
pub trait ModelDownloader: Send + Sync {
    fn download(&self, url: &str, dest: &Path) -> Result<(), EngineError>;
}

/// Copies from a local path, standing in for a network fetch. Used by
/// tests and by the CLI's offline fixture flow.
pub struct LocalFileDownloader;

impl ModelDownloader for LocalFileDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), EngineError> {
        std::fs::copy(url, dest)
            .map(|_| ())
            .map_err(|e| EngineError::Other(format!("download failed: {e}")))
    }
}

/// Canonicalizes the four integrity-bearing manifest fields into the
/// signing payload `modelId|version|sha256|downloadUrl`, per §6.
fn canonical_payload(manifest: &ModelManifest) -> String {
    format!(
        "{}|{}|{}|{}",
        manifest.model_id, manifest.version, manifest.sha256, manifest.download_url
    )
}

/// Verifies an HMAC-SHA256 signature over the manifest's canonical
/// payload. Comparison is constant-time (delegated to `Mac::verify_slice`)
/// and the hex signature may be upper or lower case. An empty key is
/// accepted by HMAC construction and simply fails verification rather
/// than panicking.
pub fn verify_manifest_signature(manifest: &ModelManifest, hex_signature: &str, key: &[u8]) -> bool {
    let expected_bytes = match Vec::from_hex(hex_signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(canonical_payload(manifest).as_bytes());
    mac.verify_slice(&expected_bytes).is_ok()
}

/// Streams the file at `path` and returns its lowercase hex SHA-256, or
/// `None` if the file does not exist or cannot be read.
pub fn compute_sha256(path: &Path) -> Option<String> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).ok()?;
    Some(hex::encode(hasher.finalize()))
}

/// Compares the file's actual SHA-256 against the manifest's declared
/// hash, case-insensitively.
pub fn verify_integrity(path: &Path, manifest: &ModelManifest) -> bool {
    match compute_sha256(path) {
        Some(actual) => actual.eq_ignore_ascii_case(&manifest.sha256),
        None => false,
    }
}

/// Device ABI list includes a 64-bit ARM ABI (`arm64-v8a` or `aarch64`).
/// Shared with `runtime::native::supports_native_backend` since both
/// gates express the same physical constraint.
pub fn device_supports_arm64(abis: &[String]) -> bool {
    crate::runtime::native::supports_native_backend(abis)
}

/// Owns the lifecycle of one model artifact. Kill switch is checked
/// before every operation and overrides everything, including the ABI
/// check - a killed manager reports the kill-switch reason, never the
/// architecture one.
pub struct ModelManager {
    device_abis: Vec<String>,
    kill_switch: AtomicBool,
    lifecycle: Mutex<ModelState>,
}

impl ModelManager {
    pub fn new(device_abis: Vec<String>) -> Self {
        Self {
            device_abis,
            kill_switch: AtomicBool::new(false),
            lifecycle: Mutex::new(ModelState::NotDownloaded),
        }
    }

    /// Process-wide kill switch. Activating it overlays `Killed` onto
    /// whatever lifecycle state the manager was in; deactivating it
    /// reveals that underlying state again unchanged.
    pub fn set_kill_switch(&self, active: bool) {
        let was_active = self.kill_switch.swap(active, Ordering::SeqCst);
        if active && !was_active {
            tracing::warn!("model manager kill switch activated");
        } else if !active && was_active {
            tracing::info!("model manager kill switch deactivated");
        }
    }

    pub fn is_killed(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    /// Current observable state: `Killed` overlays the underlying
    /// lifecycle state whenever the kill switch is active.
    pub fn state(&self) -> ModelState {
        if self.is_killed() {
            ModelState::Killed
        } else {
            *self.lifecycle.lock().unwrap()
        }
    }

    fn set_lifecycle(&self, state: ModelState) {
        tracing::info!(?state, "model manager lifecycle transition");
        *self.lifecycle.lock().unwrap() = state;
    }

    /// Downloads, then verifies, a model artifact.
    ///
    /// Pre-checks in order: kill switch off, then (if
    /// `manifest.requires_64_bit`) a 64-bit ARM ABI on the device -
    /// failing with a message containing the literal `arm64`. Only then
    /// does it delegate to `downloader`. On success it hashes the
    /// downloaded bytes and compares against `manifest.sha256`.
    pub fn download_model(
        &self,
        manifest: &ModelManifest,
        target_dir: &Path,
        downloader: &dyn ModelDownloader,
    ) -> Result<PathBuf, EngineError> {
        if self.is_killed() {
            return Err(EngineError::KillSwitchActive);
        }
        if manifest.requires_64_bit && !device_supports_arm64(&self.device_abis) {
            return Err(EngineError::ArchitectureUnsupported);
        }

        self.set_lifecycle(ModelState::Downloading);
        std::fs::create_dir_all(target_dir)
            .map_err(|e| EngineError::Other(format!("failed to create target dir: {e}")))?;
        let dest = target_dir.join(format!("{}-{}.bin", manifest.model_id, manifest.version));

        if let Err(e) = downloader.download(&manifest.download_url, &dest) {
            self.set_lifecycle(ModelState::NotDownloaded);
            return Err(e);
        }

        self.set_lifecycle(ModelState::Verifying);
        if verify_integrity(&dest, manifest) {
            self.set_lifecycle(ModelState::Ready);
            Ok(dest)
        } else {
            self.set_lifecycle(ModelState::Corrupt);
            Err(EngineError::IntegrityMismatch(format!(
                "sha256 mismatch for {}",
                manifest.model_id
            )))
        }
    }
}
