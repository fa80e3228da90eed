//! TemplateRenderer - deterministic, localized answer renderer.
//!
//! Complete: every `(severity, finding tag)` combination resolves to a
//! localized string, with no panic path. This is both the baseline
//! answer source and the fallback every orchestrator error path lands
//! on, so it must never fail and must always pass
//! `policy_guard::validate` unchanged.

use crate::policy_guard;
use crate::types::{
    ActionCategory, EngineSource, ExplanationAnswer, Reason, RecommendedAction, SafeLanguageFlag,
    SecurityIncident, SignalType, StructuredSlots, SummaryTone,
};
use std::collections::BTreeSet;

/// A coarse "what kind of finding is this" tag used to pick a summary
/// template. Distinct from `SignalType` - several signal types map to
/// the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FindingTag {
    CertIdentity,
    VersionOrInstaller,
    Permissions,
    Stalkerware,
    NativeCode,
    General,
}

fn tag_for(signal_type: SignalType) -> FindingTag {
    match signal_type {
        SignalType::CertChange | SignalType::SignatureMismatch | SignalType::BaselineSignatureChange => {
            FindingTag::CertIdentity
        }
        SignalType::VersionRollback | SignalType::InstallerChange | SignalType::InstallerAnomaly => {
            FindingTag::VersionOrInstaller
        }
        SignalType::HighRiskPermAdded => FindingTag::Permissions,
        SignalType::ComboDetected | SignalType::SpecialAccessEnabled => FindingTag::Stalkerware,
        SignalType::DebugSignature | SignalType::SuspiciousNativeLib | SignalType::IntegrityFailWithHooking => {
            FindingTag::NativeCode
        }
    }
}

/// Picks the tag that best represents the incident when no slots are
/// available to disambiguate: first signal type in listed order, or
/// `General` when the incident carries no signals at all.
fn dominant_tag(incident: &SecurityIncident) -> FindingTag {
    incident
        .events
        .iter()
        .flat_map(|e| e.signals.iter())
        .next()
        .map(|s| tag_for(s.signal_type))
        .unwrap_or(FindingTag::General)
}

/// Fixed summary catalog, keyed by `(severity, tag)`. Complete over the
/// cross product - every arm is listed explicitly so a missing case is
/// a compile error, not a runtime gap.
fn summary_for(severity: crate::types::Severity, tag: FindingTag) -> &'static str {
    use crate::types::Severity::*;
    use FindingTag::*;
    match (severity, tag) {
        (Info, _) => "A routine change was observed on this app. No action is required.",
        (Low, CertIdentity) => "This app's signing identity changed slightly. This is usually harmless but worth a look.",
        (Low, VersionOrInstaller) => "This app was updated or reinstalled from a different source than usual.",
        (Low, Permissions) => "This app requested a new permission. Review whether it still matches how you use it.",
        (Low, Stalkerware) => "This app gained access that could be used to monitor device activity.",
        (Low, NativeCode) => "This app includes native code that could not be fully verified.",
        (Low, General) => "A change was detected on this app that may be worth reviewing.",
        (Medium, CertIdentity) => "This app's signing certificate does not match what we last saw. This can indicate tampering.",
        (Medium, VersionOrInstaller) => "This app was installed or updated in a way that differs from its usual pattern.",
        (Medium, Permissions) => "This app was granted a sensitive permission it did not previously have.",
        (Medium, Stalkerware) => "This app combines permissions in a pattern associated with monitoring tools.",
        (Medium, NativeCode) => "This app runs native code that bypassed normal verification.",
        (Medium, General) => "Multiple changes were detected on this app that together raise its risk.",
        (High, CertIdentity) => "This app's signing certificate was replaced. This strongly suggests the app is not what it claims to be.",
        (High, VersionOrInstaller) => "This app's version history was rolled back or its installer does not match a trusted source.",
        (High, Permissions) => "This app was granted permissions that allow significant control over the device.",
        (High, Stalkerware) => "This app shows a strong pattern associated with monitoring another person's device.",
        (High, NativeCode) => "This app runs unverified native code alongside signs of tampering.",
        (High, General) => "Several strong indicators together suggest this app may not be trustworthy.",
        (Critical, CertIdentity) => "This app's signing certificate does not match the original and shows other signs of tampering.",
        (Critical, VersionOrInstaller) => "This app was altered through an unofficial installation path and shows other signs of tampering.",
        (Critical, Permissions) => "This app combines high-risk permissions with other strong indicators of tampering.",
        (Critical, Stalkerware) => "This app shows confirmed indicators of being used to monitor this device.",
        (Critical, NativeCode) => "This app runs unverified native code and shows other strong indicators of tampering.",
        (Critical, General) => "Several strong, independently confirmed indicators suggest this app has been tampered with.",
    }
}

/// Default action set for a finding tag, listed order = default step order.
fn default_actions_for(tag: FindingTag) -> Vec<(ActionCategory, &'static str)> {
    use FindingTag::*;
    match tag {
        CertIdentity => vec![
            (ActionCategory::UninstallApp, "Uninstall this app."),
            (ActionCategory::EnablePlayProtect, "Make sure Play Protect scanning is turned on."),
        ],
        VersionOrInstaller => vec![
            (ActionCategory::UpdateApp, "Update this app from the official store, or uninstall it."),
            (ActionCategory::EnablePlayProtect, "Make sure Play Protect scanning is turned on."),
        ],
        Permissions => vec![
            (ActionCategory::RevokePermission, "Review and revoke the new permission if it is unexpected."),
        ],
        Stalkerware => vec![
            (ActionCategory::UninstallApp, "Uninstall this app."),
            (ActionCategory::ChangePasswords, "Change your account passwords from a different, trusted device."),
            (ActionCategory::ContactSupport, "Contact support if you believe someone else installed this app."),
        ],
        NativeCode => vec![
            (ActionCategory::UninstallApp, "Uninstall this app."),
            (ActionCategory::ContactSupport, "Contact support for further investigation."),
        ],
        General => vec![(ActionCategory::MonitorDevice, "Keep monitoring this app for further changes.")],
    }
}

fn localize_ignore_reason(key: &str) -> String {
    match key {
        "LOW_CONFIDENCE" => "This may be a false positive; confidence in this finding is low.".to_string(),
        "KNOWN_FALSE_POSITIVE" => "This pattern is commonly triggered by legitimate app updates.".to_string(),
        "USER_INITIATED" => "This change may have been caused by an action you took yourself.".to_string(),
        other => format!("This can typically be ignored ({other})."),
    }
}

/// Renders from incident + constraints alone - the no-slots baseline
/// path, used when the LLM path did not run at all.
pub fn render(incident: &SecurityIncident, constraints: &BTreeSet<SafeLanguageFlag>) -> ExplanationAnswer {
    let tag = dominant_tag(incident);
    let severity = incident.severity;
    let summary = summary_for(severity, tag).to_string();

    let reasons = incident
        .events
        .iter()
        .flat_map(|e| e.signals.iter())
        .map(|s| Reason {
            evidence_id: s.id.clone(),
            text: s.summary.clone(),
        })
        .collect();

    let actions = build_actions(default_actions_for(tag), constraints);

    let confidence = incident
        .top_hypothesis()
        .map(|h| h.clamped_confidence())
        .unwrap_or(0.5);

    let answer = ExplanationAnswer {
        incident_id: incident.id.clone(),
        severity,
        summary,
        reasons,
        actions,
        when_to_ignore: None,
        confidence,
        active_flags: constraints.clone(),
        engine_source: EngineSource::Template,
        policy_violations_found: 0,
        is_busy_fallback: false,
    };
    policy_guard::validate(answer, incident)
}

/// Renders using validated slots to drive severity, tone, evidence
/// order, action order, and the when-to-ignore key.
pub fn render_with_slots(
    incident: &SecurityIncident,
    constraints: &BTreeSet<SafeLanguageFlag>,
    slots: &StructuredSlots,
) -> ExplanationAnswer {
    let tag = dominant_tag(incident);
    let severity = slots.assessed_severity;
    let mut summary = summary_for(severity, tag).to_string();
    if slots.summary_tone == SummaryTone::Calm {
        summary = format!("{summary} This is likely manageable with the steps below.");
    } else if slots.summary_tone == SummaryTone::Strict {
        summary = format!("{summary} Acting on this promptly is recommended.");
    }

    let signal_text: std::collections::HashMap<&str, &str> = incident
        .events
        .iter()
        .flat_map(|e| e.signals.iter())
        .map(|s| (s.id.as_str(), s.summary.as_str()))
        .collect();

    let reasons = slots
        .selected_evidence_ids
        .iter()
        .filter_map(|id| {
            signal_text.get(id.as_str()).map(|text| Reason {
                evidence_id: id.clone(),
                text: text.to_string(),
            })
        })
        .collect();

    let action_catalog = default_actions_for(tag);
    let described = |category: ActionCategory| -> &'static str {
        action_catalog
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, d)| *d)
            .unwrap_or_else(|| generic_description(category))
    };
    let raw_actions: Vec<(ActionCategory, &'static str)> = slots
        .recommended_actions
        .iter()
        .map(|c| (*c, described(*c)))
        .collect();
    let actions = build_actions(raw_actions, constraints);

    let when_to_ignore = if slots.can_be_ignored {
        slots.ignore_reason_key.as_deref().map(localize_ignore_reason)
    } else {
        None
    };

    let answer = ExplanationAnswer {
        incident_id: incident.id.clone(),
        severity,
        summary,
        reasons,
        actions,
        when_to_ignore,
        confidence: slots.clamped_confidence(),
        active_flags: constraints.clone(),
        engine_source: EngineSource::LlmAssisted,
        policy_violations_found: 0,
        is_busy_fallback: false,
    };
    policy_guard::validate(answer, incident)
}

fn generic_description(category: ActionCategory) -> &'static str {
    match category {
        ActionCategory::UninstallApp => "Uninstall this app.",
        ActionCategory::RevokePermission => "Revoke the permission in question.",
        ActionCategory::UpdateApp => "Update this app to the latest version.",
        ActionCategory::FactoryReset => "Perform a factory reset of the device.",
        ActionCategory::ChangePasswords => "Change your account passwords.",
        ActionCategory::EnablePlayProtect => "Turn on Play Protect scanning.",
        ActionCategory::ContactSupport => "Contact support for further help.",
        ActionCategory::MonitorDevice => "Keep monitoring the device for changes.",
        ActionCategory::NoActionNeeded => "No action is needed.",
    }
}

fn build_actions(
    catalog: Vec<(ActionCategory, &'static str)>,
    constraints: &BTreeSet<SafeLanguageFlag>,
) -> Vec<RecommendedAction> {
    catalog
        .into_iter()
        .filter(|(category, _)| {
            !(*category == ActionCategory::FactoryReset && constraints.contains(&SafeLanguageFlag::NoFactoryReset))
        })
        .enumerate()
        .map(|(i, (category, description))| RecommendedAction {
            step_number: (i + 1) as u32,
            category,
            description: description.to_string(),
        })
        .collect()
}
