//! PolicyGuard - evidence-based language guarding.
//!
//! Pure function of an incident: no I/O, no mutable state, safe to call
//! from any thread. Two public operations: `determine_constraints` maps
//! an incident to the set of active `SafeLanguageFlag`s, and `validate`
//! corrects an already-produced answer to respect them.

use std::collections::BTreeSet;

use crate::types::{
    ActionCategory, ExplanationAnswer, Hardness, SafeLanguageFlag, SecurityIncident, Severity,
    SignalType,
};

/// Signal types that count as HARD malware evidence. Fixed table per
/// the spec. `InstallerAnomaly`'s membership here resolves the spec's
/// open question in favor of the "source treats it as HARD" reading -
/// see DESIGN.md.
const HARD_MALWARE_EVIDENCE: &[SignalType] = &[
    SignalType::DebugSignature,
    SignalType::SignatureMismatch,
    SignalType::BaselineSignatureChange,
    SignalType::IntegrityFailWithHooking,
    SignalType::InstallerAnomaly,
    SignalType::VersionRollback,
    SignalType::HighRiskPermAdded,
];

/// Maps a signal type to its finding hardness. Any signal type not
/// covered by `HARD_MALWARE_EVIDENCE` is SOFT.
fn hardness_of(signal_type: SignalType) -> Hardness {
    if HARD_MALWARE_EVIDENCE.contains(&signal_type) {
        Hardness::Hard
    } else {
        Hardness::Soft
    }
}

/// All HARD findings present anywhere in the incident.
fn hard_findings(incident: &SecurityIncident) -> Vec<SignalType> {
    incident
        .all_signal_types()
        .into_iter()
        .filter(|t| hardness_of(*t) == Hardness::Hard)
        .collect()
}

pub(crate) fn has_hard_evidence(incident: &SecurityIncident) -> bool {
    !hard_findings(incident).is_empty()
}

/// The highest severity an answer may legally claim for this incident,
/// combining the evidence-support ceiling (no HARD finding caps at HIGH)
/// with the alarmist-framing ceiling (INFO/LOW input caps at MEDIUM).
/// Shared by `PolicyGuard::validate`'s evidence-consistency correction
/// and `SlotValidator`'s bounded repair.
pub fn severity_ceiling(incident: &SecurityIncident) -> Severity {
    let evidence_ceiling = if has_hard_evidence(incident) {
        Severity::Critical
    } else {
        Severity::High
    };
    let alarmist_ceiling = if matches!(incident.severity, Severity::Info | Severity::Low) {
        Severity::Medium
    } else {
        Severity::Critical
    };
    evidence_ceiling.min(alarmist_ceiling)
}

fn top_confidence(incident: &SecurityIncident) -> f64 {
    incident
        .top_hypothesis()
        .map(|h| h.clamped_confidence())
        .unwrap_or(0.0)
}

/// A "confirmed stalkerware pattern": both COMBO_DETECTED and
/// SPECIAL_ACCESS_ENABLED signal types co-occur, and at least one HARD
/// finding exists.
fn confirmed_stalkerware_pattern(incident: &SecurityIncident) -> bool {
    let types = incident.all_signal_types();
    types.contains(&SignalType::ComboDetected)
        && types.contains(&SignalType::SpecialAccessEnabled)
        && has_hard_evidence(incident)
}

/// Computes the set of active language constraints for an incident.
pub fn determine_constraints(incident: &SecurityIncident) -> BTreeSet<SafeLanguageFlag> {
    let mut flags = BTreeSet::new();

    // The concept of a "virus" does not apply to this platform; always active.
    flags.insert(SafeLanguageFlag::NoVirusClaim);

    let hard = has_hard_evidence(incident);
    let top_conf = top_confidence(incident);

    if !(hard && top_conf >= 0.6) {
        flags.insert(SafeLanguageFlag::NoMalwareClaim);
    }

    if !(hard && top_conf >= 0.7) {
        flags.insert(SafeLanguageFlag::NoCompromiseClaim);
    }

    if !(incident.severity == Severity::Critical && hard) {
        flags.insert(SafeLanguageFlag::NoFactoryReset);
    }

    if !confirmed_stalkerware_pattern(incident) {
        flags.insert(SafeLanguageFlag::NoSpyingClaim);
    }

    if matches!(incident.severity, Severity::Info | Severity::Low) {
        flags.insert(SafeLanguageFlag::NoAlarmistFraming);
    }

    flags
}

/// Validates (and corrects in place) an already-rendered answer against
/// the incident it was produced from. Returns the corrected answer;
/// `policy_violations_found` reflects corrections actually made, not
/// rules merely evaluated.
pub fn validate(mut answer: ExplanationAnswer, incident: &SecurityIncident) -> ExplanationAnswer {
    let flags = determine_constraints(incident);
    let mut violations = 0u32;

    if flags.contains(&SafeLanguageFlag::NoFactoryReset) {
        let before = answer.actions.len();
        answer
            .actions
            .retain(|a| a.category != ActionCategory::FactoryReset);
        let removed = before - answer.actions.len();
        if removed > 0 {
            answer.renumber_actions();
            violations += removed as u32;
        }
    }

    if flags.contains(&SafeLanguageFlag::NoAlarmistFraming)
        && matches!(answer.severity, Severity::Critical | Severity::High)
    {
        answer.severity = Severity::Medium;
        violations += 1;
    }

    if !has_hard_evidence(incident) && answer.severity == Severity::Critical {
        answer.severity = Severity::High;
        violations += 1;
    }

    answer.active_flags = flags;
    answer.policy_violations_found += violations;
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EngineSource, Reason, RecommendedAction, SecurityEvent};

    fn incident(severity: Severity, signal_types: &[SignalType], top_conf: f64) -> SecurityIncident {
        let signals = signal_types
            .iter()
            .enumerate()
            .map(|(i, t)| crate::types::SecuritySignal {
                id: format!("sig-{i}"),
                source: "scanner".into(),
                signal_type: *t,
                severity,
                package: Some("com.example.app".into()),
                summary: "signal".into(),
            })
            .collect::<Vec<_>>();
        SecurityIncident {
            id: "inc-1".into(),
            severity,
            title: "title".into(),
            summary: "summary".into(),
            package: Some("com.example.app".into()),
            events: vec![SecurityEvent {
                event_type: signal_types.first().copied().unwrap_or(SignalType::CertChange),
                severity,
                package: Some("com.example.app".into()),
                summary: "event".into(),
                signals,
            }],
            hypotheses: vec![Hypothesis_ {
                confidence: top_conf,
            }
            .into()],
            recommended_actions: vec![],
        }
    }

    // tiny helper so the fixture above reads cleanly
    struct Hypothesis_ {
        confidence: f64,
    }
    impl From<Hypothesis_> for crate::types::Hypothesis {
        fn from(h: Hypothesis_) -> Self {
            crate::types::Hypothesis {
                name: "h".into(),
                description: "d".into(),
                confidence: h.confidence,
                supporting_evidence_ids: vec![],
            }
        }
    }

    #[test]
    fn info_severity_config_change_all_flags_active() {
        let inc = incident(Severity::Info, &[SignalType::CertChange], 0.0);
        let flags = determine_constraints(&inc);
        assert!(flags.contains(&SafeLanguageFlag::NoVirusClaim));
        assert!(flags.contains(&SafeLanguageFlag::NoMalwareClaim));
        assert!(flags.contains(&SafeLanguageFlag::NoCompromiseClaim));
        assert!(flags.contains(&SafeLanguageFlag::NoFactoryReset));
        assert!(flags.contains(&SafeLanguageFlag::NoSpyingClaim));
        assert!(flags.contains(&SafeLanguageFlag::NoAlarmistFraming));
    }

    #[test]
    fn hard_cert_mismatch_high_confidence_lifts_malware_and_compromise() {
        let inc = incident(Severity::High, &[SignalType::SignatureMismatch], 0.8);
        let flags = determine_constraints(&inc);
        assert!(!flags.contains(&SafeLanguageFlag::NoMalwareClaim));
        assert!(!flags.contains(&SafeLanguageFlag::NoCompromiseClaim));
        // severity isn't CRITICAL, so factory reset stays blocked regardless of HARD evidence.
        assert!(flags.contains(&SafeLanguageFlag::NoFactoryReset));
    }

    #[test]
    fn stalkerware_pattern_lifts_spying_claim() {
        let inc = incident(
            Severity::High,
            &[
                SignalType::ComboDetected,
                SignalType::SpecialAccessEnabled,
                SignalType::InstallerAnomaly,
            ],
            0.5,
        );
        let flags = determine_constraints(&inc);
        assert!(!flags.contains(&SafeLanguageFlag::NoSpyingClaim));
    }

    fn base_answer(severity: Severity, actions: Vec<RecommendedAction>) -> ExplanationAnswer {
        ExplanationAnswer {
            incident_id: "inc-1".into(),
            severity,
            summary: "s".into(),
            reasons: vec![Reason {
                evidence_id: "sig-0".into(),
                text: "r".into(),
            }],
            actions,
            when_to_ignore: None,
            confidence: 0.5,
            active_flags: BTreeSet::new(),
            engine_source: EngineSource::Template,
            policy_violations_found: 0,
            is_busy_fallback: false,
        }
    }

    #[test]
    fn validate_drops_factory_reset_and_renumbers() {
        let inc = incident(Severity::Medium, &[SignalType::CertChange], 0.0);
        let actions = vec![
            RecommendedAction {
                step_number: 1,
                category: ActionCategory::UninstallApp,
                description: "uninstall".into(),
            },
            RecommendedAction {
                step_number: 2,
                category: ActionCategory::FactoryReset,
                description: "reset".into(),
            },
            RecommendedAction {
                step_number: 3,
                category: ActionCategory::ChangePasswords,
                description: "passwords".into(),
            },
        ];
        let answer = validate(base_answer(Severity::Medium, actions), &inc);
        assert_eq!(answer.actions.len(), 2);
        assert_eq!(answer.actions[0].step_number, 1);
        assert_eq!(answer.actions[1].step_number, 2);
        assert!(answer
            .actions
            .iter()
            .all(|a| a.category != ActionCategory::FactoryReset));
        assert_eq!(answer.policy_violations_found, 1);
    }

    #[test]
    fn validate_caps_alarmist_framing_for_low_severity_input() {
        let inc = incident(Severity::Low, &[SignalType::CertChange], 0.0);
        let answer = validate(base_answer(Severity::Critical, vec![]), &inc);
        assert_eq!(answer.severity, Severity::Medium);
        assert!(answer.policy_violations_found >= 1);
    }

    #[test]
    fn validate_caps_critical_without_hard_evidence() {
        let inc = incident(Severity::High, &[SignalType::CertChange], 0.0);
        let answer = validate(base_answer(Severity::Critical, vec![]), &inc);
        assert_eq!(answer.severity, Severity::High);
    }

    #[test]
    fn validate_is_idempotent() {
        let inc = incident(Severity::Medium, &[SignalType::CertChange], 0.0);
        let actions = vec![RecommendedAction {
            step_number: 1,
            category: ActionCategory::FactoryReset,
            description: "reset".into(),
        }];
        let once = validate(base_answer(Severity::Critical, actions), &inc);
        let twice = validate(once.clone(), &inc);
        assert_eq!(once, twice);
    }
}
