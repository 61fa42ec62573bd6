//! Client telemetry analyzer.
//!
//! Evaluates optional browser-side fingerprint and behavioral-timing payloads
//! for automation indicators. All three checks treat absent or malformed
//! input as "no signal": zero score and empty reasons, never an error, so a
//! visitor with telemetry disabled is indistinguishable from one that sent a
//! clean payload.

use crate::reputation::IpReputation;
use serde::{Deserialize, Serialize};

/// Browser-side fingerprint payload. All fields optional; unknown fields in
/// the wire JSON are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fingerprint {
    /// `navigator.webdriver`
    pub webdriver: Option<bool>,
    /// Automation framework markers found on the page (cdc_ globals etc.)
    pub automation_markers: Vec<String>,
    pub plugins_count: Option<u32>,
    pub languages_count: Option<u32>,
    /// Canvas fingerprint data URL
    pub canvas: Option<String>,
    pub webgl_renderer: Option<String>,
    /// IANA timezone reported by the browser
    pub timezone: Option<String>,
    /// `navigator.platform`
    pub platform: Option<String>,
}

impl Fingerprint {
    /// Parse a serialized payload; malformed JSON yields `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Browser-side behavioral-timing payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorTelemetry {
    pub time_on_page_seconds: Option<f64>,
    pub mouse_movements: Option<u32>,
    pub clicks: Option<u32>,
    pub scrolls: Option<u32>,
    pub keypresses: Option<u32>,
    /// Interaction timestamps in milliseconds since page load
    pub interaction_timestamps: Vec<f64>,
}

impl BehaviorTelemetry {
    /// Parse a serialized payload; malformed JSON yields `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Result of one telemetry check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub suspicion_score: u8,
    pub indicators: Vec<String>,
}

impl TelemetryReport {
    fn new() -> Self {
        Self {
            suspicion_score: 0,
            indicators: Vec::new(),
        }
    }

    fn add(&mut self, points: u32, indicator: &str) {
        self.suspicion_score = (self.suspicion_score as u32 + points).min(100) as u8;
        self.indicators.push(indicator.to_string());
    }

    /// Score at or past the automation threshold.
    pub fn is_suspicious(&self) -> bool {
        self.suspicion_score >= 50
    }

    /// Fold another check's findings into this report.
    pub fn merge(&mut self, other: TelemetryReport) {
        self.suspicion_score =
            (u32::from(self.suspicion_score) + u32::from(other.suspicion_score)).min(100) as u8;
        self.indicators.extend(other.indicators);
    }
}

/// WebGL renderer strings that betray a software rasterizer.
const SOFTWARE_RENDERERS: &[&str] = &["swiftshader", "llvmpipe", "software rasterizer", "mesa offscreen"];

/// Score headless-browser indicators in a fingerprint.
pub fn detect_headless_browser(fingerprint: Option<&Fingerprint>) -> TelemetryReport {
    let mut report = TelemetryReport::new();
    let fp = match fingerprint {
        Some(fp) => fp,
        None => return report,
    };

    if fp.webdriver == Some(true) {
        report.add(50, "webdriver_flag");
    }

    for marker in &fp.automation_markers {
        report.add(50, &format!("automation_marker_{}", marker.to_lowercase()));
    }

    if fp.plugins_count == Some(0) {
        report.add(20, "no_plugins");
    }

    if fp.languages_count == Some(0) {
        report.add(20, "no_languages");
    }

    if let Some(canvas) = &fp.canvas {
        if canvas.is_empty() || canvas == "data:," {
            report.add(25, "blank_canvas");
        }
    }

    if let Some(renderer) = &fp.webgl_renderer {
        let renderer_lower = renderer.to_lowercase();
        if SOFTWARE_RENDERERS.iter().any(|s| renderer_lower.contains(s)) {
            report.add(30, "software_webgl_renderer");
        }
    }

    report
}

/// Score interaction-timing indicators in a behavior payload.
pub fn analyze_behavior(behavior: Option<&BehaviorTelemetry>) -> TelemetryReport {
    let mut report = TelemetryReport::new();
    let b = match behavior {
        Some(b) => b,
        None => return report,
    };

    if let Some(time_on_page) = b.time_on_page_seconds {
        if time_on_page < 0.5 {
            report.add(30, "submitted_too_fast");
        }

        if b.mouse_movements == Some(0) && time_on_page > 2.0 {
            report.add(40, "no_mouse_movement");
        }

        if b.clicks == Some(0) && b.scrolls == Some(0) && b.keypresses == Some(0) && time_on_page > 3.0 {
            report.add(35, "no_interactions");
        }
    }

    if b.interaction_timestamps.len() >= 3 {
        if let Some(variance) = interarrival_variance(&b.interaction_timestamps) {
            if variance < 100.0 {
                report.add(25, "robotic_timing");
            }
        }
    }

    report
}

/// Population variance of inter-arrival gaps, in ms^2.
fn interarrival_variance(timestamps: &[f64]) -> Option<f64> {
    if timestamps.len() < 3 {
        return None;
    }

    let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let variance = intervals
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / intervals.len() as f64;

    Some(variance)
}

/// Cross-check the IP reputation record against the browser-reported
/// fingerprint. A datacenter IP alone is enough to fail consistency.
pub fn check_ip_consistency(
    reputation: &IpReputation,
    fingerprint: Option<&Fingerprint>,
) -> TelemetryReport {
    let mut report = TelemetryReport::new();

    if let Some(fp) = fingerprint {
        if let (Some(rep_tz), Some(fp_tz)) = (&reputation.timezone, &fp.timezone) {
            if !rep_tz.eq_ignore_ascii_case(fp_tz) {
                report.add(30, "timezone_mismatch");
            }
        }

        if let Some(platform) = &fp.platform {
            let platform_lower = platform.to_lowercase();
            let platform_mobile = ["android", "iphone", "ipad", "arm"]
                .iter()
                .any(|m| platform_lower.contains(m));
            if reputation.mobile != platform_mobile {
                report.add(25, "device_type_mismatch");
            }
        }
    }

    if reputation.is_hosting {
        report.add(40, "datacenter_ip");
    }

    if reputation.fraud_score > 75 {
        report.add(u32::from(reputation.fraud_score) / 2, "high_fraud_score");
    }

    report
}

/// `is_consistent` convenience for consistency reports.
pub fn is_consistent(report: &TelemetryReport) -> bool {
    report.suspicion_score < 50
}
