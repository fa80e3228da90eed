//! SlotValidator - checks (and, in REPAIR mode, bounded-corrects) a
//! parsed `StructuredSlots` against the incident it was produced from
//! and the currently active language constraints.

use std::collections::BTreeSet;

use crate::policy_guard::severity_ceiling;
use crate::types::{ActionCategory, SafeLanguageFlag, SecurityIncident, StructuredSlots};

/// Validation mode. STRICT rejects on any violation; REPAIR drops/clamps
/// what it can and only rejects if nothing usable survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Repair,
}

/// Outcome the orchestrator distinguishes.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(StructuredSlots),
    Repaired {
        slots: StructuredSlots,
        repairs: u32,
    },
    Rejected {
        violations: Vec<String>,
    },
}

/// An action category is illegal under the active constraints if it
/// would violate one of them outright - currently only FACTORY_RESET
/// under NO_FACTORY_RESET, per the spec's invariant table.
fn action_is_legal(action: ActionCategory, constraints: &BTreeSet<SafeLanguageFlag>) -> bool {
    !(action == ActionCategory::FactoryReset && constraints.contains(&SafeLanguageFlag::NoFactoryReset))
}

/// Validates `slots` against `incident` under `constraints`, in the
/// given mode.
pub fn validate(
    slots: &StructuredSlots,
    incident: &SecurityIncident,
    constraints: &BTreeSet<SafeLanguageFlag>,
    mode: ValidationMode,
) -> ValidationOutcome {
    let known_ids = incident.all_signal_ids();

    let mut violations = Vec::new();
    for id in &slots.selected_evidence_ids {
        if !known_ids.contains(id.as_str()) {
            violations.push(format!("unknown evidence id: {id}"));
        }
    }
    for action in &slots.recommended_actions {
        if !action_is_legal(*action, constraints) {
            violations.push(format!("illegal action under active constraints: {action:?}"));
        }
    }
    if !(0.0..=1.0).contains(&slots.confidence) {
        violations.push(format!("confidence out of range: {}", slots.confidence));
    }

    match mode {
        ValidationMode::Strict => {
            if violations.is_empty() {
                ValidationOutcome::Valid(slots.clone())
            } else {
                ValidationOutcome::Rejected { violations }
            }
        }
        ValidationMode::Repair => repair(slots, incident, constraints, &known_ids),
    }
}

fn repair(
    slots: &StructuredSlots,
    incident: &SecurityIncident,
    constraints: &BTreeSet<SafeLanguageFlag>,
    known_ids: &std::collections::BTreeSet<&str>,
) -> ValidationOutcome {
    let mut repairs = 0u32;
    let mut repaired = slots.clone();

    let before_ids = repaired.selected_evidence_ids.len();
    repaired
        .selected_evidence_ids
        .retain(|id| known_ids.contains(id.as_str()));
    repairs += (before_ids - repaired.selected_evidence_ids.len()) as u32;

    let before_actions = repaired.recommended_actions.len();
    repaired
        .recommended_actions
        .retain(|a| action_is_legal(*a, constraints));
    repairs += (before_actions - repaired.recommended_actions.len()) as u32;

    let clamped = repaired.confidence.clamp(0.0, 1.0);
    if clamped != repaired.confidence {
        repaired.confidence = clamped;
        repairs += 1;
    }

    let ceiling = severity_ceiling(incident);
    if repaired.assessed_severity > ceiling {
        repaired.assessed_severity = ceiling;
        repairs += 1;
    }

    if repaired.selected_evidence_ids.is_empty() || repaired.recommended_actions.is_empty() {
        return ValidationOutcome::Rejected {
            violations: vec!["no valid evidence or action survived repair".to_string()],
        };
    }

    ValidationOutcome::Repaired {
        slots: repaired,
        repairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Severity, SummaryTone};

    fn incident_with_signals(ids: &[&str]) -> SecurityIncident {
        SecurityIncident {
            id: "inc".into(),
            severity: Severity::Medium,
            title: "t".into(),
            summary: "s".into(),
            package: None,
            events: vec![crate::types::SecurityEvent {
                event_type: crate::types::SignalType::CertChange,
                severity: Severity::Medium,
                package: None,
                summary: "e".into(),
                signals: ids
                    .iter()
                    .map(|id| crate::types::SecuritySignal {
                        id: id.to_string(),
                        source: "scanner".into(),
                        signal_type: crate::types::SignalType::CertChange,
                        severity: Severity::Medium,
                        package: None,
                        summary: "s".into(),
                    })
                    .collect(),
            }],
            hypotheses: vec![],
            recommended_actions: vec![],
        }
    }

    fn slots(ids: Vec<&str>, actions: Vec<ActionCategory>, confidence: f64) -> StructuredSlots {
        StructuredSlots {
            assessed_severity: Severity::Medium,
            summary_tone: SummaryTone::Neutral,
            selected_evidence_ids: ids.into_iter().map(String::from).collect(),
            recommended_actions: actions,
            confidence,
            can_be_ignored: false,
            ignore_reason_key: None,
            notes: None,
            reasoning_trace: None,
        }
    }

    #[test]
    fn strict_accepts_fully_valid_slots() {
        let inc = incident_with_signals(&["a", "b"]);
        let s = slots(vec!["a", "b"], vec![ActionCategory::UpdateApp], 0.5);
        let outcome = validate(&s, &inc, &BTreeSet::new(), ValidationMode::Strict);
        assert_eq!(outcome, ValidationOutcome::Valid(s));
    }

    #[test]
    fn strict_rejects_unknown_evidence_id() {
        let inc = incident_with_signals(&["a"]);
        let s = slots(vec!["a", "ghost"], vec![ActionCategory::UpdateApp], 0.5);
        let outcome = validate(&s, &inc, &BTreeSet::new(), ValidationMode::Strict);
        assert!(matches!(outcome, ValidationOutcome::Rejected { .. }));
    }

    #[test]
    fn strict_rejects_illegal_action_under_constraints() {
        let inc = incident_with_signals(&["a"]);
        let s = slots(vec!["a"], vec![ActionCategory::FactoryReset], 0.5);
        let mut constraints = BTreeSet::new();
        constraints.insert(SafeLanguageFlag::NoFactoryReset);
        let outcome = validate(&s, &inc, &constraints, ValidationMode::Strict);
        assert!(matches!(outcome, ValidationOutcome::Rejected { .. }));
    }

    #[test]
    fn repair_drops_unknown_ids_preserving_order_of_survivors() {
        let inc = incident_with_signals(&["a", "b"]);
        let s = slots(vec!["ghost", "a", "b", "ghost2"], vec![ActionCategory::UpdateApp], 0.5);
        let outcome = validate(&s, &inc, &BTreeSet::new(), ValidationMode::Repair);
        match outcome {
            ValidationOutcome::Repaired { slots, repairs } => {
                assert_eq!(slots.selected_evidence_ids, vec!["a", "b"]);
                assert_eq!(repairs, 2);
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn repair_rejects_when_nothing_valid_survives() {
        let inc = incident_with_signals(&["a"]);
        let s = slots(vec!["ghost"], vec![ActionCategory::UpdateApp], 0.5);
        let outcome = validate(&s, &inc, &BTreeSet::new(), ValidationMode::Repair);
        assert!(matches!(outcome, ValidationOutcome::Rejected { .. }));
    }

    #[test]
    fn repair_clamps_confidence_and_caps_severity() {
        let inc = incident_with_signals(&["a"]); // no HARD evidence -> ceiling HIGH
        let mut s = slots(vec!["a"], vec![ActionCategory::UpdateApp], 1.5);
        s.assessed_severity = Severity::Critical;
        let outcome = validate(&s, &inc, &BTreeSet::new(), ValidationMode::Repair);
        match outcome {
            ValidationOutcome::Repaired { slots, repairs } => {
                assert_eq!(slots.confidence, 1.0);
                assert_eq!(slots.assessed_severity, Severity::High);
                assert_eq!(repairs, 2);
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }
}
