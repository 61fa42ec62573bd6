//! Detection modules.
//!
//! Each detector inspects one aspect of a visit: the user-agent signature
//! table, the DNS legitimacy of a claimed bot identity, and the optional
//! client-side telemetry payloads.

pub mod bot_patterns;
pub mod bot_verify;
pub mod telemetry;

pub use bot_patterns::{BotCategory, BotConfidence, BotMatch, BotPatternTable};
pub use bot_verify::BotVerifier;
pub use telemetry::{
    analyze_behavior, check_ip_consistency, detect_headless_browser, BehaviorTelemetry,
    Fingerprint, TelemetryReport,
};
