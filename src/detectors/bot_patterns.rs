//! Bot pattern matcher.
//!
//! Matches a user-agent against a curated, category-ordered table of known
//! bot signatures and returns the first matching bot identity. The table is
//! plain structured data: it serializes losslessly and can be loaded from a
//! JSON file, falling back to the built-in signatures.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bot category classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotCategory {
    /// Ad-network landing-page reviewers (Google Ads, Facebook Ads, ...)
    AdReviewBots,
    /// Social media and messaging link crawlers
    OtherBots,
    /// Search engine crawlers
    SeoBots,
}

impl BotCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotCategory::AdReviewBots => "ad_review_bots",
            BotCategory::OtherBots => "other_bots",
            BotCategory::SeoBots => "seo_bots",
        }
    }
}

/// Confidence attached to a bot match. Recorded for analytics; the policy
/// decision is driven by identity and category alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotConfidence {
    /// Identity confirmed by reverse/forward DNS
    Verified,
    /// Matched an ad-review or search-engine signature
    High,
    /// Matched a social/messaging signature
    Medium,
}

/// Result of matching a user-agent against the signature table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotMatch {
    pub is_bot: bool,
    /// Canonical bot name, e.g. `googlebot`
    pub bot_identity: Option<String>,
    pub category: Option<BotCategory>,
    /// Set only after legitimacy verification runs
    pub is_verified: bool,
    pub confidence: Option<BotConfidence>,
}

impl BotMatch {
    /// The "not a bot" result.
    pub fn human() -> Self {
        Self {
            is_bot: false,
            bot_identity: None,
            category: None,
            is_verified: false,
            confidence: None,
        }
    }

    fn matched(identity: &str, category: BotCategory) -> Self {
        let confidence = match category {
            BotCategory::AdReviewBots | BotCategory::SeoBots => BotConfidence::High,
            BotCategory::OtherBots => BotConfidence::Medium,
        };
        Self {
            is_bot: true,
            bot_identity: Some(identity.to_string()),
            category: Some(category),
            is_verified: false,
            confidence: Some(confidence),
        }
    }

    /// Mark this match as DNS-verified.
    pub fn mark_verified(&mut self) {
        self.is_verified = true;
        self.confidence = Some(BotConfidence::Verified);
    }
}

/// One bot identity with its user-agent substring patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSignature {
    /// Canonical identity, e.g. `google-ads-review`
    pub identity: String,
    /// Case-insensitive substring patterns
    pub patterns: Vec<String>,
}

/// A category with its ordered signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub category: BotCategory,
    pub bots: Vec<BotSignature>,
}

/// The full category-ordered signature table. Iteration order is load-bearing:
/// a user-agent matching more than one category resolves to whichever group
/// comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotPatternTable {
    pub groups: Vec<CategoryGroup>,
}

fn sig(identity: &str, patterns: &[&str]) -> BotSignature {
    BotSignature {
        identity: identity.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    }
}

impl Default for BotPatternTable {
    fn default() -> Self {
        Self {
            groups: vec![
                CategoryGroup {
                    category: BotCategory::AdReviewBots,
                    bots: vec![
                        sig(
                            "google-ads-review",
                            &[
                                "Google-InspectionTool",
                                "Google-Ads-Creatives-Assistant",
                                "AdsBot-Google",
                                "Mediapartners-Google",
                                "Google-Ads-Overview",
                                "Google-Ads-Crawlers",
                            ],
                        ),
                        sig(
                            "facebook-ads-review",
                            &["facebookexternalhit", "facebot", "FacebookBot", "Facebook-Ads-Bot"],
                        ),
                        sig(
                            "tiktok-ads-review",
                            &["TikTok", "ByteSpider", "Bytedance", "TikTokBot"],
                        ),
                        sig("snapchat-ads-review", &["Snapchat", "SnapchatAdsBot", "Snapbot"]),
                        sig("twitter-ads-review", &["TwitterBot", "Twitter-Ads-Crawler"]),
                        sig("linkedin-ads-review", &["LinkedInBot", "LinkedIn-Ads-Bot"]),
                        sig(
                            "pinterest-ads-review",
                            &["Pinterest", "Pinterestbot", "Pinterest-Ads-Bot"],
                        ),
                    ],
                },
                CategoryGroup {
                    category: BotCategory::OtherBots,
                    bots: vec![
                        sig("facebookexternalhit", &["facebookexternalhit"]),
                        sig("facebot", &["facebot", "FacebookBot"]),
                        sig("twitterbot", &["Twitterbot", "Twitter"]),
                        sig("linkedinbot", &["LinkedInBot", "LinkedIn"]),
                        sig("pinterestbot", &["Pinterest", "Pinterestbot"]),
                        sig("slackbot", &["Slackbot", "Slack-ImgProxy"]),
                        sig("telegrambot", &["TelegramBot", "Telegram"]),
                        sig("whatsapp", &["WhatsApp", "WhatsAppBot"]),
                        sig("snapchat", &["Snapchat", "SnapBot"]),
                        sig("tiktok", &["TikTok", "Musical.ly"]),
                    ],
                },
                CategoryGroup {
                    category: BotCategory::SeoBots,
                    bots: vec![
                        sig("googlebot", &["Googlebot", "Google-InspectionTool"]),
                        sig("bingbot", &["bingbot", "BingPreview", "msnbot"]),
                    ],
                },
            ],
        }
    }
}

impl BotPatternTable {
    /// Load the table from a JSON file, falling back to the built-in
    /// signatures when the file does not exist.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Match a user-agent against the table. Returns the first
    /// `(category, identity)` whose any pattern is a case-insensitive
    /// substring of the user-agent. An empty user-agent is never a bot.
    pub fn detect(&self, user_agent: &str) -> BotMatch {
        if user_agent.is_empty() {
            return BotMatch::human();
        }

        let ua_lower = user_agent.to_lowercase();
        for group in &self.groups {
            for bot in &group.bots {
                if bot
                    .patterns
                    .iter()
                    .any(|p| ua_lower.contains(&p.to_lowercase()))
                {
                    return BotMatch::matched(&bot.identity, group.category);
                }
            }
        }

        BotMatch::human()
    }
}
