//! Core data model for the explanation pipeline.
//!
//! Everything here is plain data: closed enums and structs with no
//! behavior beyond small, total helper methods. The engine logic lives
//! in the sibling modules that consume these types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Severity of a security incident or event, ordered INFO < LOW < MEDIUM
/// < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Type tag of a raw scanner signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    CertChange,
    VersionRollback,
    InstallerChange,
    HighRiskPermAdded,
    DebugSignature,
    SuspiciousNativeLib,
    ComboDetected,
    SpecialAccessEnabled,
    SignatureMismatch,
    BaselineSignatureChange,
    IntegrityFailWithHooking,
    InstallerAnomaly,
}

/// A single raw signal produced by the scanner. Immutable input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySignal {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub severity: Severity,
    pub package: Option<String>,
    pub summary: String,
}

/// A group of signals the scanner has already bucketed into one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    #[serde(rename = "type")]
    pub event_type: SignalType,
    pub severity: Severity,
    pub package: Option<String>,
    pub summary: String,
    pub signals: Vec<SecuritySignal>,
}

/// A scanner-produced explanatory hypothesis with a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub name: String,
    pub description: String,
    pub confidence: f64,
    pub supporting_evidence_ids: Vec<String>,
}

impl Hypothesis {
    /// Confidence clamped to `[0, 1]` regardless of what the scanner sent.
    pub fn clamped_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// The finished, immutable security finding handed to the explanation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityIncident {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub summary: String,
    pub package: Option<String>,
    pub events: Vec<SecurityEvent>,
    pub hypotheses: Vec<Hypothesis>,
    pub recommended_actions: Vec<ActionCategory>,
}

impl SecurityIncident {
    /// All signal ids carried anywhere in this incident, in event/signal order.
    pub fn all_signal_ids(&self) -> BTreeSet<&str> {
        self.events
            .iter()
            .flat_map(|e| e.signals.iter())
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Highest-confidence hypothesis, if any.
    pub fn top_hypothesis(&self) -> Option<&Hypothesis> {
        self.hypotheses
            .iter()
            .max_by(|a, b| a.clamped_confidence().total_cmp(&b.clamped_confidence()))
    }

    /// Every signal type appearing anywhere in the incident's events.
    pub fn all_signal_types(&self) -> BTreeSet<SignalType> {
        self.events
            .iter()
            .flat_map(|e| e.signals.iter())
            .map(|s| s.signal_type)
            .collect()
    }
}

/// Hardness classification of a finding derived from a signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hardness {
    Hard,
    Soft,
}

/// A finding type: the identity tag plus its hardness, as produced by
/// mapping a `SignalType` through the fixed signal->finding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingType {
    pub signal_type: SignalType,
    pub hardness: Hardness,
}

/// Closed set of language constraints the engine is forbidden to violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafeLanguageFlag {
    NoVirusClaim,
    NoMalwareClaim,
    NoCompromiseClaim,
    NoFactoryReset,
    NoSpyingClaim,
    NoAlarmistFraming,
}

impl SafeLanguageFlag {
    /// All flags, for exhaustive iteration (e.g. rendering the prompt directive table).
    pub const ALL: [SafeLanguageFlag; 6] = [
        SafeLanguageFlag::NoVirusClaim,
        SafeLanguageFlag::NoMalwareClaim,
        SafeLanguageFlag::NoCompromiseClaim,
        SafeLanguageFlag::NoFactoryReset,
        SafeLanguageFlag::NoSpyingClaim,
        SafeLanguageFlag::NoAlarmistFraming,
    ];
}

/// Action category a recommendation can fall into. Closed set so the
/// validator and renderer are total functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionCategory {
    UninstallApp,
    RevokePermission,
    UpdateApp,
    FactoryReset,
    ChangePasswords,
    EnablePlayProtect,
    ContactSupport,
    MonitorDevice,
    NoActionNeeded,
}

/// Tone the rendered summary should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SummaryTone {
    Calm,
    Neutral,
    Strict,
}

/// A single, 1-indexed recommended action in a rendered answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub step_number: u32,
    pub category: ActionCategory,
    pub description: String,
}

/// A single user-facing reason, tied back to the evidence it cites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub evidence_id: String,
    pub text: String,
}

/// The fixed JSON shape a local model is constrained to emit. Never
/// free-form prose; this is parsed, validated, and then used to drive
/// the deterministic renderer - it is never shown to the user directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSlots {
    pub assessed_severity: Severity,
    pub summary_tone: SummaryTone,
    pub selected_evidence_ids: Vec<String>,
    pub recommended_actions: Vec<ActionCategory>,
    pub confidence: f64,
    pub can_be_ignored: bool,
    #[serde(default)]
    pub ignore_reason_key: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reasoning_trace: Option<String>,
}

impl StructuredSlots {
    pub fn clamped_confidence(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0)
    }
}

/// Which engine produced an `ExplanationAnswer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineSource {
    Template,
    LlmAssisted,
    LlmFallbackToTemplate,
}

/// The final, auditable output of `ExplanationOrchestrator::explain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationAnswer {
    pub incident_id: String,
    pub severity: Severity,
    pub summary: String,
    pub reasons: Vec<Reason>,
    pub actions: Vec<RecommendedAction>,
    pub when_to_ignore: Option<String>,
    pub confidence: f64,
    pub active_flags: BTreeSet<SafeLanguageFlag>,
    pub engine_source: EngineSource,
    pub policy_violations_found: u32,
    pub is_busy_fallback: bool,
}

impl ExplanationAnswer {
    /// Renumber `actions` to be 1-indexed and contiguous. Called any time
    /// an action is dropped from the list.
    pub fn renumber_actions(&mut self) {
        for (i, action) in self.actions.iter_mut().enumerate() {
            action.step_number = (i + 1) as u32;
        }
    }
}
