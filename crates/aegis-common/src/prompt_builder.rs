//! PromptBuilder - serializes an incident plus active constraints into a
//! bounded, anonymized prompt string that declares the structured-slots
//! JSON schema the model must fill.

use std::collections::BTreeSet;

use crate::types::{SafeLanguageFlag, SecurityIncident};

/// At most this many events are embedded in the prompt.
pub const MAX_EVENTS: usize = 4;
/// At most this many hypotheses are embedded in the prompt.
pub const MAX_HYPOTHESES: usize = 5;
/// At most this many signals per event are embedded in the prompt.
pub const MAX_SIGNALS_PER_EVENT: usize = 6;

const SCHEMA_BLOCK: &str = r#"Respond with a single JSON object matching exactly this shape:
{
  "assessedSeverity": "INFO" | "LOW" | "MEDIUM" | "HIGH" | "CRITICAL",
  "summaryTone": "CALM" | "NEUTRAL" | "STRICT",
  "selectedEvidenceIds": [string, ...],
  "recommendedActions": ["UNINSTALL_APP" | "REVOKE_PERMISSION" | "UPDATE_APP" | "FACTORY_RESET" | "CHANGE_PASSWORDS" | "ENABLE_PLAY_PROTECT" | "CONTACT_SUPPORT" | "MONITOR_DEVICE" | "NO_ACTION_NEEDED", ...],
  "confidence": number between 0 and 1,
  "canBeIgnored": boolean,
  "ignoreReasonKey": string | null,
  "notes": string | null
}"#;

/// Fixed projection of each active flag onto a short English directive.
fn directive_for(flag: SafeLanguageFlag) -> &'static str {
    match flag {
        SafeLanguageFlag::NoVirusClaim => "Do not use the word \"virus\" or describe this as a virus.",
        SafeLanguageFlag::NoMalwareClaim => "Do not claim the app is confirmed malware.",
        SafeLanguageFlag::NoCompromiseClaim => "Do not claim the device is confirmed compromised.",
        SafeLanguageFlag::NoFactoryReset => "Do not recommend a factory reset.",
        SafeLanguageFlag::NoSpyingClaim => "Do not claim the user is being spied on.",
        SafeLanguageFlag::NoAlarmistFraming => "Use calm, measured framing; avoid alarmist language.",
    }
}

/// A built prompt plus a rough token estimate for budget diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub text: String,
    pub estimated_tokens: usize,
}

/// Builds the full prompt string for an incident under the given active
/// constraints. Truncation (events, hypotheses, signals-per-event) is by
/// listed order only - the builder never reorders anything.
pub fn build_prompt(incident: &SecurityIncident, constraints: &BTreeSet<SafeLanguageFlag>) -> BuiltPrompt {
    let mut out = String::new();

    out.push_str("You are an on-device security explanation assistant.\n");
    out.push_str(SCHEMA_BLOCK);
    out.push_str("\n\n");

    out.push_str("# Incident\n");
    let package = incident.package.as_deref().unwrap_or("unknown_app");
    out.push_str(&format!("app: {package}\n"));
    out.push_str(&format!("incident_severity: {:?}\n", incident.severity));
    out.push_str(&format!("title: {}\n", incident.title));
    out.push_str(&format!("summary: {}\n", incident.summary));

    out.push_str("\n## Events\n");
    for event in incident.events.iter().take(MAX_EVENTS) {
        out.push_str(&format!(
            "- event type={:?} severity={:?} summary={}\n",
            event.event_type, event.severity, event.summary
        ));
        for signal in event.signals.iter().take(MAX_SIGNALS_PER_EVENT) {
            out.push_str(&format!(
                "    signal id={} type={:?} severity={:?} summary={}\n",
                signal.id, signal.signal_type, signal.severity, signal.summary
            ));
        }
    }

    out.push_str("\n## Hypotheses\n");
    for hyp in incident.hypotheses.iter().take(MAX_HYPOTHESES) {
        out.push_str(&format!(
            "- {} (confidence={:.2}): {}\n",
            hyp.name,
            hyp.clamped_confidence(),
            hyp.description
        ));
    }

    out.push_str("\n# Constraints\n");
    if constraints.is_empty() {
        out.push_str("No additional constraints\n");
    } else {
        for flag in constraints {
            out.push_str(&format!("- {}\n", directive_for(*flag)));
        }
    }

    out.push_str("\nEmit only the JSON object described above. No other text.\n");

    let estimated_tokens = out.len() / 4;
    BuiltPrompt {
        text: out,
        estimated_tokens,
    }
}
