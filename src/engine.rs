//! Request orchestration.
//!
//! [`MaskEngine`] wires the detectors, reputation service, honeypot, and
//! policy evaluation into one per-request pipeline. It holds only
//! immutable configuration and internally-synchronized caches, so a single
//! instance is shared across request tasks.

use crate::analytics::{hash_ip, AnalyticsEvent, AnalyticsSink};
use crate::config::EngineConfig;
use crate::detectors::bot_patterns::{BotMatch, BotPatternTable};
use crate::detectors::bot_verify::BotVerifier;
use crate::detectors::telemetry::{
    analyze_behavior, check_ip_consistency, detect_headless_browser, BehaviorTelemetry,
    Fingerprint, TelemetryReport,
};
use crate::honeypot::HoneypotManager;
use crate::policy::{self, Decision, Mask};
use crate::reputation::{HttpReputationProvider, IpReputation, ReputationProvider, ReputationService};
use crate::signals::VisitorSignals;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The inbound request, as seen by the engine. Transport-agnostic: the
/// embedding server extracts these from whatever it serves.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// Host the request was served for
    pub domain: String,
    pub ip: String,
    pub user_agent: String,
    pub accept_language: String,
}

/// Where masks come from. Keyed by sanitized domain.
#[async_trait]
pub trait MaskSource: Send + Sync {
    async fn mask_for(&self, domain: &str) -> Option<Mask>;
}

/// Normalize a domain for mask lookup: lowercase, strip scheme, `www.`
/// prefix, port, and path.
pub fn sanitize_domain(raw: &str) -> String {
    let mut s = raw.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    if let Some(idx) = s.find(['/', '?', '#']) {
        s.truncate(idx);
    }
    if let Some(idx) = s.find(':') {
        s.truncate(idx);
    }
    s
}

/// In-memory mask source, loaded once at startup.
#[derive(Default)]
pub struct StaticMaskSource {
    by_domain: HashMap<String, Mask>,
}

impl StaticMaskSource {
    pub fn new(masks: Vec<Mask>) -> Self {
        let by_domain = masks
            .into_iter()
            .filter_map(|mask| {
                let domain = mask.active_domain.as_deref()?;
                Some((sanitize_domain(domain), mask))
            })
            .collect();
        Self { by_domain }
    }

    /// Load a JSON array of masks.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let masks: Vec<Mask> = serde_json::from_str(&raw)?;
        Ok(Self::new(masks))
    }

    pub fn len(&self) -> usize {
        self.by_domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_domain.is_empty()
    }
}

#[async_trait]
impl MaskSource for StaticMaskSource {
    async fn mask_for(&self, domain: &str) -> Option<Mask> {
        self.by_domain.get(&sanitize_domain(domain)).cloned()
    }
}

/// The assembled classification pipeline.
pub struct MaskEngine {
    config: EngineConfig,
    patterns: BotPatternTable,
    verifier: BotVerifier,
    reputation: ReputationService,
    honeypot: HoneypotManager,
    masks: Arc<dyn MaskSource>,
    sink: Arc<dyn AnalyticsSink>,
}

impl MaskEngine {
    pub fn new(
        config: EngineConfig,
        masks: Arc<dyn MaskSource>,
        sink: Arc<dyn AnalyticsSink>,
    ) -> anyhow::Result<Self> {
        let provider = Arc::new(HttpReputationProvider::new(
            config.reputation.provider_url.clone(),
        ));
        Self::with_provider(config, masks, provider, sink)
    }

    /// Constructor taking an explicit reputation provider, for tests and
    /// non-default backends.
    pub fn with_provider(
        config: EngineConfig,
        masks: Arc<dyn MaskSource>,
        provider: Arc<dyn ReputationProvider>,
        sink: Arc<dyn AnalyticsSink>,
    ) -> anyhow::Result<Self> {
        let patterns = match config.detection.pattern_table_path.as_deref() {
            Some(path) => BotPatternTable::from_path(Path::new(path))?,
            None => BotPatternTable::default(),
        };

        let verifier = BotVerifier::new(
            config.verification.dns_timeout(),
            config.verification.cache_size,
            config.verification.cache_ttl(),
        );

        let reputation = ReputationService::new(
            provider,
            config.reputation.cache_size,
            config.reputation.cache_ttl(),
            config.reputation.lookup_timeout(),
        );

        let honeypot = HoneypotManager::new(config.honeypot.secret.clone());

        Ok(Self {
            config,
            patterns,
            verifier,
            reputation,
            honeypot,
            masks,
            sink,
        })
    }

    pub fn honeypot(&self) -> &HoneypotManager {
        &self.honeypot
    }

    /// Process one request. Returns `None` when the client IP is on the
    /// exception list or no mask covers the domain; in both cases the
    /// caller serves the page as-is.
    pub async fn process(&self, request: &RequestInfo) -> Option<Decision> {
        if self.is_ip_whitelisted(&request.ip) {
            debug!(ip = %request.ip, "ip on exception list, skipping classification");
            return None;
        }

        let mask = self.masks.mask_for(&request.domain).await?;
        Some(self.classify(request, &mask).await)
    }

    /// Exception-list check. Entries are compared as parsed addresses when
    /// both sides parse, so `::1` matches `0:0:0:0:0:0:0:1`.
    fn is_ip_whitelisted(&self, ip: &str) -> bool {
        let ip = ip.trim();
        let parsed: Option<IpAddr> = ip.parse().ok();

        self.config.detection.ip_whitelist.iter().any(|entry| {
            let entry = entry.trim();
            match (parsed, entry.parse::<IpAddr>().ok()) {
                (Some(a), Some(b)) => a == b,
                _ => entry == ip,
            }
        })
    }

    /// Classify one request against a known mask. Total: every input,
    /// however malformed, produces a decision.
    pub async fn classify(&self, request: &RequestInfo, mask: &Mask) -> Decision {
        let signals =
            VisitorSignals::extract(&request.ip, &request.user_agent, &request.accept_language);

        let bot = self.detect_bot(&signals).await;

        // Fetched for every visitor: the bot branch ignores it, but the
        // analytics event still carries the country.
        let reputation = if self.config.detection.ip_reputation {
            self.reputation.get(&signals.ip).await
        } else {
            IpReputation::default()
        };

        let decision = policy::evaluate(&signals, &bot, &reputation, mask);

        info!(
            mask_id = %mask.id,
            visitor_type = ?decision.visitor_type,
            blocked_reason = ?decision.blocked_reason,
            bot = bot.is_bot,
            "visitor classified"
        );

        if self.config.analytics.enabled {
            self.sink.enqueue(AnalyticsEvent {
                mask_id: mask.id.clone(),
                visitor_type: decision.visitor_type,
                blocked_reason: decision.blocked_reason,
                country_code: reputation.country_code.clone(),
                user_agent: signals.user_agent.clone(),
                ip_hash: hash_ip(&signals.ip, &self.config.analytics.ip_salt),
                timestamp: Utc::now(),
            });
        }

        decision
    }

    async fn detect_bot(&self, signals: &VisitorSignals) -> BotMatch {
        if !self.config.detection.bot_patterns {
            return BotMatch::human();
        }

        let mut bot = self.patterns.detect(&signals.user_agent);
        if !bot.is_bot || !self.config.detection.bot_verification {
            return bot;
        }

        let identity = bot.bot_identity.clone().unwrap_or_default();
        if let Ok(addr) = signals.ip.parse() {
            if self.verifier.verify(addr, &identity).await {
                bot.mark_verified();
                debug!(identity = %identity, ip = %signals.ip, "bot identity verified");
            }
        }
        bot
    }

    /// Score optional client-side telemetry. Advisory only: the report
    /// feeds analytics and operator review, never the decision above.
    pub async fn analyze_telemetry(
        &self,
        request: &RequestInfo,
        fingerprint: Option<&Fingerprint>,
        behavior: Option<&BehaviorTelemetry>,
    ) -> TelemetryReport {
        let mut report = detect_headless_browser(fingerprint);
        report.merge(analyze_behavior(behavior));

        if self.config.detection.ip_reputation {
            let reputation = self.reputation.get(&request.ip).await;
            let consistency = check_ip_consistency(&reputation, fingerprint);
            report.merge(consistency);
        }

        report
    }
}
