//! Mask policy engine.
//!
//! Combines the extracted signals, bot match, and IP reputation with a
//! mask's declarative rule set under a fixed precedence order and produces
//! one final decision. This is a total function: misconfigured masks
//! (identities in both bot lists, empty filter sets) resolve
//! deterministically, never as errors.

use crate::detectors::bot_patterns::{BotCategory, BotMatch};
use crate::reputation::IpReputation;
use crate::signals::VisitorSignals;
use serde::{Deserialize, Serialize};

/// Operator-authored targeting policy bound to a destination. Owned by the
/// surrounding infrastructure; the engine treats it read-only.
///
/// Empty filter lists mean "no restriction on this dimension", never
/// "reject everyone".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mask {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Destination for allowed visitors
    pub offer_page_url: String,
    /// Domain this mask applies to, used by mask sources
    #[serde(default)]
    pub active_domain: Option<String>,
    #[serde(default)]
    pub whitelisted_countries: Vec<String>,
    #[serde(default)]
    pub whitelisted_languages: Vec<String>,
    #[serde(default)]
    pub whitelisted_os: Vec<String>,
    #[serde(default)]
    pub whitelisted_browsers: Vec<String>,
    #[serde(default)]
    pub bot_whitelist: Vec<String>,
    #[serde(default)]
    pub bot_blacklist: Vec<String>,
    #[serde(default)]
    pub filter_vpn_proxy: bool,
    #[serde(default)]
    pub block_ad_review_bots: bool,
    #[serde(default)]
    pub block_other_bots: bool,
}

/// Visitor classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorType {
    /// Bot allowed to stay on the decoy page untouched
    BotWhitelisted,
    /// Kept on the decoy page for a policy reason
    Filtered,
    /// Legitimate visitor matching the mask, forwarded to the offer
    Whitelisted,
}

/// Recommended action for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RedirectToOffer,
    StayOnPage,
}

/// Why a visitor was filtered. Internal/analytics only; never rendered to
/// the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    BotBlacklisted,
    AdReviewBotBlocked,
    OtherBotBlocked,
    VpnOrProxyDetected,
    CountryNotWhitelisted,
    LanguageNotWhitelisted,
    OsNotWhitelisted,
    BrowserNotWhitelisted,
}

impl BlockedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockedReason::BotBlacklisted => "bot_blacklisted",
            BlockedReason::AdReviewBotBlocked => "ad_review_bot_blocked",
            BlockedReason::OtherBotBlocked => "other_bot_blocked",
            BlockedReason::VpnOrProxyDetected => "vpn_or_proxy_detected",
            BlockedReason::CountryNotWhitelisted => "country_not_whitelisted",
            BlockedReason::LanguageNotWhitelisted => "language_not_whitelisted",
            BlockedReason::OsNotWhitelisted => "os_not_whitelisted",
            BlockedReason::BrowserNotWhitelisted => "browser_not_whitelisted",
        }
    }
}

/// Final per-request decision. Created once, consumed by the dispatcher,
/// logged to analytics; never persisted as mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub visitor_type: VisitorType,
    pub blocked_reason: Option<BlockedReason>,
    pub action: Action,
    /// Resolved offer URL, present only on redirect
    pub redirect_url: Option<String>,
}

impl Decision {
    fn filtered(reason: BlockedReason) -> Self {
        Self {
            visitor_type: VisitorType::Filtered,
            blocked_reason: Some(reason),
            action: Action::StayOnPage,
            redirect_url: None,
        }
    }

    fn bot_whitelisted() -> Self {
        Self {
            visitor_type: VisitorType::BotWhitelisted,
            blocked_reason: None,
            action: Action::StayOnPage,
            redirect_url: None,
        }
    }

    fn whitelisted(offer_url: &str) -> Self {
        let offer_url = offer_url.trim();
        // A mask without a destination degrades to serving the page as-is.
        if offer_url.is_empty() {
            return Self {
                visitor_type: VisitorType::Whitelisted,
                blocked_reason: None,
                action: Action::StayOnPage,
                redirect_url: None,
            };
        }
        Self {
            visitor_type: VisitorType::Whitelisted,
            blocked_reason: None,
            action: Action::RedirectToOffer,
            redirect_url: Some(offer_url.to_string()),
        }
    }
}

fn list_contains(list: &[String], value: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(value))
}

/// Evaluate one visitor against a mask.
///
/// Bot branch precedence is fixed: blacklist > whitelist > category policy >
/// SEO default > pass-through. A confirmed bot never reaches offer content;
/// the only question is decoy ("filtered") or untouched ("bot_whitelisted").
/// The human branch short-circuits on the first failing filter in the order
/// vpn, country, language, os, browser.
pub fn evaluate(
    signals: &VisitorSignals,
    bot: &BotMatch,
    reputation: &IpReputation,
    mask: &Mask,
) -> Decision {
    if bot.is_bot {
        return evaluate_bot(bot, mask);
    }

    if mask.filter_vpn_proxy && reputation.is_anonymized() {
        return Decision::filtered(BlockedReason::VpnOrProxyDetected);
    }

    if !mask.whitelisted_countries.is_empty() {
        let country = reputation.country_code.as_deref().unwrap_or("");
        if !list_contains(&mask.whitelisted_countries, country) {
            return Decision::filtered(BlockedReason::CountryNotWhitelisted);
        }
    }

    if !mask.whitelisted_languages.is_empty() {
        let overlap = signals
            .languages
            .iter()
            .any(|lang| list_contains(&mask.whitelisted_languages, lang));
        if !overlap {
            return Decision::filtered(BlockedReason::LanguageNotWhitelisted);
        }
    }

    if !mask.whitelisted_os.is_empty() {
        let os = signals.os.map(|os| os.as_str()).unwrap_or("");
        if !list_contains(&mask.whitelisted_os, os) {
            return Decision::filtered(BlockedReason::OsNotWhitelisted);
        }
    }

    if !mask.whitelisted_browsers.is_empty() {
        let browser = signals.browser.map(|b| b.as_str()).unwrap_or("");
        if !list_contains(&mask.whitelisted_browsers, browser) {
            return Decision::filtered(BlockedReason::BrowserNotWhitelisted);
        }
    }

    Decision::whitelisted(&mask.offer_page_url)
}

fn evaluate_bot(bot: &BotMatch, mask: &Mask) -> Decision {
    let identity = bot.bot_identity.as_deref().unwrap_or("");

    // Blacklist dominates everything, including the whitelist.
    if list_contains(&mask.bot_blacklist, identity) {
        return Decision::filtered(BlockedReason::BotBlacklisted);
    }

    if list_contains(&mask.bot_whitelist, identity) {
        return Decision::bot_whitelisted();
    }

    match bot.category {
        Some(BotCategory::AdReviewBots) if mask.block_ad_review_bots => {
            Decision::filtered(BlockedReason::AdReviewBotBlocked)
        }
        Some(BotCategory::OtherBots) if mask.block_other_bots => {
            Decision::filtered(BlockedReason::OtherBotBlocked)
        }
        // SEO bots and anything unmatched above pass through to the decoy.
        _ => Decision::bot_whitelisted(),
    }
}
