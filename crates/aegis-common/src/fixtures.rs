//! Fixture incidents shared by `BenchmarkRunner` and the integration
//! test suite, grounded on the teacher's
//! `BenchmarkPrompt::standard_suite()` pattern in `llm_benchmark.rs`: a
//! small, fixed, named suite rather than randomly generated data, so
//! benchmark runs are reproducible.

use crate::types::{
    ActionCategory, Hypothesis, SecurityEvent, SecurityIncident, SecuritySignal, Severity, SignalType,
};

fn signal(id: &str, signal_type: SignalType, severity: Severity, package: &str, summary: &str) -> SecuritySignal {
    SecuritySignal {
        id: id.to_string(),
        source: "scanner".to_string(),
        signal_type,
        severity,
        package: Some(package.to_string()),
        summary: summary.to_string(),
    }
}

/// §8 scenario 1: info-severity config change, one SOFT signal, no HARD
/// findings, no hypotheses.
pub fn info_config_change() -> SecurityIncident {
    let package = "com.example.calendar";
    SecurityIncident {
        id: "fixture-info-config-change".to_string(),
        severity: Severity::Info,
        title: "Minor configuration change".to_string(),
        summary: "This app's configuration changed in a routine way.".to_string(),
        package: Some(package.to_string()),
        events: vec![SecurityEvent {
            event_type: SignalType::InstallerChange,
            severity: Severity::Info,
            package: Some(package.to_string()),
            summary: "installer metadata refreshed".to_string(),
            signals: vec![signal(
                "sig-config-1",
                SignalType::InstallerChange,
                Severity::Info,
                package,
                "installer metadata refreshed",
            )],
        }],
        hypotheses: vec![],
        recommended_actions: vec![],
    }
}

/// §8 scenario 2: HARD cert mismatch with a high-confidence top
/// hypothesis.
pub fn hard_cert_mismatch_high_confidence() -> SecurityIncident {
    let package = "com.example.wallet";
    SecurityIncident {
        id: "fixture-hard-cert-mismatch".to_string(),
        severity: Severity::High,
        title: "Signing certificate mismatch".to_string(),
        summary: "This app's signing certificate no longer matches the baseline.".to_string(),
        package: Some(package.to_string()),
        events: vec![SecurityEvent {
            event_type: SignalType::SignatureMismatch,
            severity: Severity::High,
            package: Some(package.to_string()),
            summary: "certificate fingerprint changed".to_string(),
            signals: vec![signal(
                "sig-cert-1",
                SignalType::SignatureMismatch,
                Severity::High,
                package,
                "certificate fingerprint changed",
            )],
        }],
        hypotheses: vec![Hypothesis {
            name: "resigned_apk".to_string(),
            description: "App was likely repackaged and resigned by a third party".to_string(),
            confidence: 0.8,
            supporting_evidence_ids: vec!["sig-cert-1".to_string()],
        }],
        recommended_actions: vec![],
    }
}

/// §8 scenario 3: confirmed stalkerware pattern - COMBO_DETECTED and
/// SPECIAL_ACCESS_ENABLED co-occur with an INSTALLER_ANOMALY (HARD)
/// finding.
pub fn stalkerware_pattern() -> SecurityIncident {
    let package = "com.example.familytrack";
    SecurityIncident {
        id: "fixture-stalkerware-pattern".to_string(),
        severity: Severity::Critical,
        title: "Monitoring pattern detected".to_string(),
        summary: "This app combines special access with an anomalous install path.".to_string(),
        package: Some(package.to_string()),
        events: vec![SecurityEvent {
            event_type: SignalType::ComboDetected,
            severity: Severity::Critical,
            package: Some(package.to_string()),
            summary: "multiple high-risk signals combined".to_string(),
            signals: vec![
                signal(
                    "sig-combo-1",
                    SignalType::ComboDetected,
                    Severity::Critical,
                    package,
                    "multiple high-risk signals combined",
                ),
                signal(
                    "sig-access-1",
                    SignalType::SpecialAccessEnabled,
                    Severity::Critical,
                    package,
                    "accessibility service granted silently",
                ),
                signal(
                    "sig-installer-1",
                    SignalType::InstallerAnomaly,
                    Severity::High,
                    package,
                    "sideloaded outside of any known store",
                ),
            ],
        }],
        hypotheses: vec![Hypothesis {
            name: "stalkerware".to_string(),
            description: "App pattern strongly resembles commercial stalkerware".to_string(),
            confidence: 0.9,
            supporting_evidence_ids: vec!["sig-combo-1".to_string(), "sig-access-1".to_string()],
        }],
        recommended_actions: vec![],
    }
}

/// Low-severity single new permission grant, no hypotheses - exercises
/// the `Permissions` template tag at a low severity.
pub fn low_permission_added() -> SecurityIncident {
    let package = "com.example.flashlight";
    SecurityIncident {
        id: "fixture-low-permission-added".to_string(),
        severity: Severity::Low,
        title: "New permission granted".to_string(),
        summary: "This app requested a permission it did not previously have.".to_string(),
        package: Some(package.to_string()),
        events: vec![SecurityEvent {
            event_type: SignalType::HighRiskPermAdded,
            severity: Severity::Low,
            package: Some(package.to_string()),
            summary: "camera permission added".to_string(),
            signals: vec![signal(
                "sig-perm-1",
                SignalType::HighRiskPermAdded,
                Severity::Low,
                package,
                "camera permission added",
            )],
        }],
        hypotheses: vec![],
        recommended_actions: vec![ActionCategory::RevokePermission],
    }
}

/// Critical severity with HARD evidence and no package name - exercises
/// the `unknown_app` anonymization path alongside a critical
/// `NativeCode` finding.
pub fn critical_native_tampering_no_package() -> SecurityIncident {
    SecurityIncident {
        id: "fixture-critical-native-tampering".to_string(),
        severity: Severity::Critical,
        title: "Unverified native code with tampering signs".to_string(),
        summary: "This app runs native code that bypassed verification.".to_string(),
        package: None,
        events: vec![SecurityEvent {
            event_type: SignalType::DebugSignature,
            severity: Severity::Critical,
            package: None,
            summary: "debug signing key detected in release build".to_string(),
            signals: vec![
                signal(
                    "sig-debug-1",
                    SignalType::DebugSignature,
                    Severity::Critical,
                    "",
                    "debug signing key detected in release build",
                ),
                signal(
                    "sig-native-1",
                    SignalType::SuspiciousNativeLib,
                    Severity::High,
                    "",
                    "unverified native library loaded at runtime",
                ),
            ],
        }],
        hypotheses: vec![Hypothesis {
            name: "tampered_build".to_string(),
            description: "Build artifacts are inconsistent with an official release".to_string(),
            confidence: 0.85,
            supporting_evidence_ids: vec!["sig-debug-1".to_string(), "sig-native-1".to_string()],
        }],
        recommended_actions: vec![],
    }
}

/// The standard fixture suite driven by `BenchmarkRunner` and reused by
/// integration tests. Order is fixed and meaningful only in that it is
/// reproducible across runs - the orchestrator gives no cross-incident
/// ordering guarantee.
pub fn standard_suite() -> Vec<SecurityIncident> {
    vec![
        info_config_change(),
        hard_cert_mismatch_high_confidence(),
        stalkerware_pattern(),
        low_permission_added(),
        critical_native_tampering_no_package(),
    ]
}
