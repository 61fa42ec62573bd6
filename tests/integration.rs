//! Integration tests for the mask engine.
//!
//! These tests drive the full pipeline end to end: signal extraction, bot
//! detection and verification, reputation lookup through a stub provider,
//! policy evaluation, and analytics emission.

use async_trait::async_trait;
use maskgate::analytics::{hash_ip, MemorySink};
use maskgate::config::EngineConfig;
use maskgate::detectors::bot_patterns::BotPatternTable;
use maskgate::detectors::telemetry::{BehaviorTelemetry, Fingerprint};
use maskgate::honeypot::{HoneypotManager, HoneypotSubmission};
use maskgate::reputation::{ProviderRecord, ReputationProvider};
use maskgate::{
    Action, BlockedReason, Mask, MaskEngine, RequestInfo, StaticMaskSource, VisitorType,
};
use std::net::IpAddr;
use std::sync::Arc;

const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Reputation provider returning a fixed record for every lookup.
struct StubProvider {
    record: ProviderRecord,
}

#[async_trait]
impl ReputationProvider for StubProvider {
    async fn lookup(&self, _ip: IpAddr) -> anyhow::Result<ProviderRecord> {
        Ok(self.record.clone())
    }
}

fn base_mask() -> Mask {
    Mask {
        id: "mask-1".to_string(),
        name: Some("Spring campaign".to_string()),
        offer_page_url: "https://offer.example/landing".to_string(),
        active_domain: Some("shop.example.com".to_string()),
        whitelisted_countries: vec![],
        whitelisted_languages: vec![],
        whitelisted_os: vec![],
        whitelisted_browsers: vec![],
        bot_whitelist: vec![],
        bot_blacklist: vec![],
        filter_vpn_proxy: false,
        block_ad_review_bots: false,
        block_other_bots: false,
    }
}

fn engine_with(
    mask: Mask,
    record: ProviderRecord,
) -> (MaskEngine, Arc<MemorySink>) {
    // DNS verification stays off here so tests never touch the network;
    // the published-range fast path gets its own test below.
    let mut config = EngineConfig::default();
    config.detection.bot_verification = false;
    engine_with_config(config, mask, record)
}

fn engine_with_config(
    config: EngineConfig,
    mask: Mask,
    record: ProviderRecord,
) -> (MaskEngine, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let engine = MaskEngine::with_provider(
        config,
        Arc::new(StaticMaskSource::new(vec![mask])),
        Arc::new(StubProvider { record }),
        sink.clone(),
    )
    .expect("engine construction");
    (engine, sink)
}

fn request(ip: &str, user_agent: &str, accept_language: &str) -> RequestInfo {
    RequestInfo {
        domain: "shop.example.com".to_string(),
        ip: ip.to_string(),
        user_agent: user_agent.to_string(),
        accept_language: accept_language.to_string(),
    }
}

// =============================================================================
// IP Exception List
// =============================================================================

#[tokio::test]
async fn test_whitelisted_ip_skips_classification() {
    let mut config = EngineConfig::default();
    config.detection.bot_verification = false;
    config.detection.ip_whitelist = vec!["203.0.113.7".to_string()];

    let mut mask = base_mask();
    mask.filter_vpn_proxy = true;
    mask.block_ad_review_bots = true;

    // A record and user-agent that would otherwise both fail filtering.
    let (engine, sink) = engine_with_config(
        config,
        mask,
        ProviderRecord {
            is_vpn: Some(true),
            ..Default::default()
        },
    );

    let decision = engine
        .process(&request("203.0.113.7", "AdsBot-Google", ""))
        .await;

    assert!(decision.is_none());
    assert!(sink.is_empty());

    // Any other IP still goes through the pipeline.
    let decision = engine
        .process(&request("203.0.113.8", "AdsBot-Google", ""))
        .await
        .unwrap();
    assert_eq!(
        decision.blocked_reason,
        Some(BlockedReason::AdReviewBotBlocked)
    );
}

#[tokio::test]
async fn test_ip_exception_matches_equivalent_notation() {
    let mut config = EngineConfig::default();
    config.detection.bot_verification = false;
    config.detection.ip_whitelist = vec!["0:0:0:0:0:0:0:1".to_string()];

    let (engine, _sink) = engine_with_config(config, base_mask(), ProviderRecord::default());

    assert!(engine.process(&request("::1", CHROME_WIN, "en-US")).await.is_none());
}

// =============================================================================
// Mask Lookup
// =============================================================================

#[tokio::test]
async fn test_unknown_domain_yields_no_decision() {
    let (engine, sink) = engine_with(base_mask(), ProviderRecord::default());

    let mut req = request("203.0.113.7", CHROME_WIN, "en-US");
    req.domain = "other.example.net".to_string();

    assert!(engine.process(&req).await.is_none());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_domain_lookup_is_sanitized() {
    let (engine, _sink) = engine_with(base_mask(), ProviderRecord::default());

    let mut req = request("203.0.113.7", CHROME_WIN, "en-US");
    req.domain = "https://WWW.shop.example.com/checkout".to_string();

    assert!(engine.process(&req).await.is_some());
}

// =============================================================================
// Human Classification
// =============================================================================

#[tokio::test]
async fn test_unrestricted_mask_redirects_human() {
    let (engine, sink) = engine_with(
        base_mask(),
        ProviderRecord {
            country_code: Some("FR".to_string()),
            ..Default::default()
        },
    );

    let decision = engine
        .process(&request("203.0.113.7", CHROME_WIN, "fr-FR,fr;q=0.9"))
        .await
        .expect("mask covers domain");

    assert_eq!(decision.visitor_type, VisitorType::Whitelisted);
    assert_eq!(decision.action, Action::RedirectToOffer);
    assert_eq!(
        decision.redirect_url.as_deref(),
        Some("https://offer.example/landing")
    );

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].mask_id, "mask-1");
    assert_eq!(events[0].country_code.as_deref(), Some("FR"));
    assert!(events[0].blocked_reason.is_none());
}

#[tokio::test]
async fn test_country_whitelist_filters_wrong_country() {
    let mut mask = base_mask();
    mask.whitelisted_countries = vec!["US".to_string()];

    let (engine, sink) = engine_with(
        mask,
        ProviderRecord {
            country_code: Some("FR".to_string()),
            ..Default::default()
        },
    );

    let decision = engine
        .process(&request("203.0.113.7", CHROME_WIN, "fr-FR"))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::Filtered);
    assert_eq!(
        decision.blocked_reason,
        Some(BlockedReason::CountryNotWhitelisted)
    );
    assert_eq!(decision.action, Action::StayOnPage);
    assert!(decision.redirect_url.is_none());

    assert_eq!(
        sink.events()[0].blocked_reason,
        Some(BlockedReason::CountryNotWhitelisted)
    );
}

#[tokio::test]
async fn test_vpn_filter_short_circuits_country_check() {
    let mut mask = base_mask();
    mask.filter_vpn_proxy = true;
    mask.whitelisted_countries = vec!["US".to_string()];

    let (engine, _sink) = engine_with(
        mask,
        ProviderRecord {
            is_vpn: Some(true),
            country_code: Some("US".to_string()),
            ..Default::default()
        },
    );

    let decision = engine
        .process(&request("203.0.113.7", CHROME_WIN, "en-US"))
        .await
        .unwrap();

    assert_eq!(
        decision.blocked_reason,
        Some(BlockedReason::VpnOrProxyDetected)
    );
}

#[tokio::test]
async fn test_language_overlap_passes() {
    let mut mask = base_mask();
    mask.whitelisted_languages = vec!["en".to_string(), "fr".to_string()];

    let (engine, _sink) = engine_with(mask, ProviderRecord::default());

    let decision = engine
        .process(&request("203.0.113.7", CHROME_WIN, "de-DE,en-GB;q=0.7"))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::Whitelisted);
}

#[tokio::test]
async fn test_browser_whitelist_is_case_insensitive() {
    let mut mask = base_mask();
    mask.whitelisted_browsers = vec!["chrome".to_string()];

    let (engine, _sink) = engine_with(mask, ProviderRecord::default());

    let decision = engine
        .process(&request("203.0.113.7", CHROME_WIN, "en-US"))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::Whitelisted);
}

// =============================================================================
// Bot Classification
// =============================================================================

#[tokio::test]
async fn test_seo_bot_stays_on_page_by_default() {
    let (engine, sink) = engine_with(
        base_mask(),
        ProviderRecord {
            country_code: Some("US".to_string()),
            ..Default::default()
        },
    );

    let decision = engine
        .process(&request(
            "66.249.66.1",
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            "",
        ))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::BotWhitelisted);
    assert_eq!(decision.action, Action::StayOnPage);
    assert!(decision.blocked_reason.is_none());

    // Bot events record the visitor country like any other event.
    let events = sink.events();
    assert_eq!(events[0].visitor_type, VisitorType::BotWhitelisted);
    assert_eq!(events[0].country_code.as_deref(), Some("US"));
}

#[tokio::test]
async fn test_blacklist_dominates_whitelist() {
    let mut mask = base_mask();
    mask.bot_whitelist = vec!["googlebot".to_string()];
    mask.bot_blacklist = vec!["googlebot".to_string()];

    let (engine, _sink) = engine_with(mask, ProviderRecord::default());

    let decision = engine
        .process(&request("66.249.66.1", "Googlebot/2.1", ""))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::Filtered);
    assert_eq!(decision.blocked_reason, Some(BlockedReason::BotBlacklisted));
}

#[tokio::test]
async fn test_ad_review_bot_blocked_before_human_filters() {
    let mut mask = base_mask();
    mask.block_ad_review_bots = true;
    mask.whitelisted_countries = vec!["US".to_string()];

    // The record fails the country whitelist, but the bot branch decides
    // first and never consults reputation flags.
    let (engine, _sink) = engine_with(
        mask,
        ProviderRecord {
            country_code: Some("IE".to_string()),
            ..Default::default()
        },
    );

    let decision = engine
        .process(&request("203.0.113.7", "AdsBot-Google (+http://www.google.com/adsbot.html)", ""))
        .await
        .unwrap();

    assert_eq!(
        decision.blocked_reason,
        Some(BlockedReason::AdReviewBotBlocked)
    );
    assert_eq!(decision.action, Action::StayOnPage);
}

#[tokio::test]
async fn test_other_bot_passes_when_blocking_disabled() {
    let (engine, _sink) = engine_with(base_mask(), ProviderRecord::default());

    let decision = engine
        .process(&request("203.0.113.7", "Slackbot-LinkExpanding 1.0", ""))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::BotWhitelisted);
}

#[tokio::test]
async fn test_bot_whitelist_overrides_category_block() {
    let mut mask = base_mask();
    mask.block_other_bots = true;
    mask.bot_whitelist = vec!["slackbot".to_string()];

    let (engine, _sink) = engine_with(mask, ProviderRecord::default());

    let decision = engine
        .process(&request("203.0.113.7", "Slackbot-LinkExpanding 1.0", ""))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::BotWhitelisted);
}

#[tokio::test]
async fn test_verification_from_published_range() {
    let (engine, _sink) = engine_with_config(
        EngineConfig::default(),
        base_mask(),
        ProviderRecord::default(),
    );

    // 66.249.64.0/19 is published Googlebot space, so verification succeeds
    // without a DNS round trip.
    let decision = engine
        .process(&request("66.249.66.1", "Googlebot/2.1", ""))
        .await
        .unwrap();

    assert_eq!(decision.visitor_type, VisitorType::BotWhitelisted);
}

// =============================================================================
// Pattern Table
// =============================================================================

#[test]
fn test_default_table_knows_major_bots() {
    let table = BotPatternTable::default();

    for (ua, identity) in [
        ("Googlebot/2.1", "googlebot"),
        ("AdsBot-Google", "google-ads-review"),
        ("facebookexternalhit/1.1", "facebook-ads-review"),
        ("bingbot/2.0", "bingbot"),
    ] {
        let m = table.detect(ua);
        assert!(m.is_bot, "{ua} should match");
        assert_eq!(m.bot_identity.as_deref(), Some(identity), "{ua}");
    }

    assert!(!table.detect(CHROME_WIN).is_bot);
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn test_analytics_stores_hashed_ip_only() {
    let (engine, sink) = engine_with(base_mask(), ProviderRecord::default());

    let _ = engine
        .process(&request("203.0.113.7", CHROME_WIN, "en-US"))
        .await;

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_ne!(events[0].ip_hash, "203.0.113.7");
    assert_eq!(events[0].ip_hash, hash_ip("203.0.113.7", "maskgate"));
}

// =============================================================================
// Telemetry
// =============================================================================

#[tokio::test]
async fn test_telemetry_report_is_advisory() {
    let (engine, sink) = engine_with(
        base_mask(),
        ProviderRecord {
            is_hosting: Some(true),
            fraud_score: Some(100),
            ..Default::default()
        },
    );

    let req = request("203.0.113.7", CHROME_WIN, "en-US");

    let fingerprint = Fingerprint::from_json(r#"{"webdriver": true}"#).unwrap();
    let behavior = BehaviorTelemetry::from_json(
        r#"{"time_on_page_seconds": 0.1, "mouse_movements": 0}"#,
    )
    .unwrap();

    let report = engine
        .analyze_telemetry(&req, Some(&fingerprint), Some(&behavior))
        .await;
    assert!(report.is_suspicious());

    // The decision pipeline is untouched by telemetry findings.
    let decision = engine.process(&req).await.unwrap();
    assert_eq!(decision.visitor_type, VisitorType::Whitelisted);
    assert_eq!(sink.events().len(), 1);
}

// =============================================================================
// Honeypot
// =============================================================================

#[test]
fn test_honeypot_markup_and_validation_round_trip() {
    let manager = HoneypotManager::new("integration-secret");
    let (html, issuance) = manager.generate_markup("203.0.113.7");

    assert!(html.contains(&issuance.field_name));
    assert!(html.contains("visit_token"));

    let submission = HoneypotSubmission {
        honeypot_value: Some(String::new()),
        visit_time: Some(issuance.timestamp - 30),
        token: Some(manager.token(issuance.timestamp - 30, "203.0.113.7")),
        user_agent: Some(CHROME_WIN.to_string()),
        accept: Some("text/html,application/xhtml+xml".to_string()),
        cookie_present: true,
    };
    assert!(manager.validate(&submission, "203.0.113.7").passed);

    let mut bot_submission = submission.clone();
    bot_submission.honeypot_value = Some("spam".to_string());
    let result = manager.validate(&bot_submission, "203.0.113.7");
    assert!(!result.passed);
    assert!(result.failures.iter().any(|f| f == "honeypot_field_filled"));
}

#[test]
fn test_honeypot_token_rejected_for_other_ip() {
    let manager = HoneypotManager::new("integration-secret");
    let issuance = manager.issue("203.0.113.7");

    let submission = HoneypotSubmission {
        honeypot_value: Some(String::new()),
        visit_time: Some(issuance.timestamp - 30),
        token: Some(issuance.token),
        user_agent: Some(CHROME_WIN.to_string()),
        accept: Some("text/html".to_string()),
        cookie_present: true,
    };

    // Same token replayed from a different IP fails the HMAC check.
    let result = manager.validate(&submission, "198.51.100.9");
    assert!(result.failures.iter().any(|f| f == "invalid_token"));
}

// =============================================================================
// Malformed Input
// =============================================================================

#[tokio::test]
async fn test_garbage_input_still_produces_a_decision() {
    let (engine, _sink) = engine_with(base_mask(), ProviderRecord::default());

    let decision = engine
        .process(&request("not-an-ip", "", "???;;,,"))
        .await
        .unwrap();

    // No signals extracted, no restrictions configured: allowed through.
    assert_eq!(decision.visitor_type, VisitorType::Whitelisted);
}
