//! Signal extraction from raw request fields.
//!
//! Pure functions that turn a request's user-agent and Accept-Language
//! header into structured facts: browser family, OS family, declared
//! languages. Malformed or empty input yields an absent signal, never an
//! error.

use serde::{Deserialize, Serialize};

/// Browser family, derived from the user-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Browser {
    Edge,
    Opera,
    Brave,
    Chrome,
    Safari,
    Firefox,
    Ie,
}

impl Browser {
    /// Name as it appears in mask filter lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Edge => "Edge",
            Browser::Opera => "Opera",
            Browser::Brave => "Brave",
            Browser::Chrome => "Chrome",
            Browser::Safari => "Safari",
            Browser::Firefox => "Firefox",
            Browser::Ie => "IE",
        }
    }
}

/// Operating system family, derived from the user-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Os {
    Windows,
    MacOs,
    Linux,
    Android,
    Ios,
    ChromeOs,
}

impl Os {
    /// Name as it appears in mask filter lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Windows => "Windows",
            Os::MacOs => "macOS",
            Os::Linux => "Linux",
            Os::Android => "Android",
            Os::Ios => "iOS",
            Os::ChromeOs => "ChromeOS",
        }
    }
}

/// Ordered browser pattern table. Order is significant: Edge, Opera and
/// Brave user-agents also contain "Chrome", and Chrome user-agents contain
/// "Safari", so the more specific markers must be checked first.
const BROWSER_PATTERNS: &[(&str, Browser)] = &[
    ("edg", Browser::Edge),
    ("opr", Browser::Opera),
    ("brave", Browser::Brave),
    ("chrome", Browser::Chrome),
    ("safari", Browser::Safari),
    ("firefox", Browser::Firefox),
    ("msie", Browser::Ie),
    ("trident", Browser::Ie),
];

/// Ordered OS pattern table. Android user-agents contain "linux", so the
/// mobile markers come before the desktop ones.
const OS_PATTERNS: &[(&str, Os)] = &[
    ("windows", Os::Windows),
    ("android", Os::Android),
    ("iphone", Os::Ios),
    ("ipad", Os::Ios),
    ("mac os x", Os::MacOs),
    ("macintosh", Os::MacOs),
    ("cros", Os::ChromeOs),
    ("linux", Os::Linux),
];

/// Per-request visitor signals, constructed fresh for each evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitorSignals {
    /// Client IP address as received (validated downstream).
    pub ip: String,
    /// Raw user-agent string, possibly empty.
    pub user_agent: String,
    /// Raw Accept-Language header value.
    pub accept_language: String,
    /// Lowercase primary-subtag language codes, unique, first-seen order.
    pub languages: Vec<String>,
    pub browser: Option<Browser>,
    pub os: Option<Os>,
}

impl VisitorSignals {
    /// Extract structured signals from the raw request fields.
    pub fn extract(ip: &str, user_agent: &str, accept_language: &str) -> Self {
        Self {
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            accept_language: accept_language.to_string(),
            languages: parse_languages(accept_language),
            browser: detect_browser(user_agent),
            os: detect_os(user_agent),
        }
    }
}

/// Parse an Accept-Language header into an ordered set of primary-subtag
/// language codes. `"en-US,en;q=0.9,fr;q=0.8"` becomes `["en", "fr"]`.
/// Empty input yields an empty set.
pub fn parse_languages(accept_language: &str) -> Vec<String> {
    let mut languages = Vec::new();

    for entry in accept_language.split(',') {
        let tag = entry.split(';').next().unwrap_or("").trim();
        let primary = tag.split('-').next().unwrap_or("").trim().to_lowercase();
        if primary.is_empty() {
            continue;
        }
        if !languages.contains(&primary) {
            languages.push(primary);
        }
    }

    languages
}

/// Detect the browser family. First match in the ordered table wins;
/// no match or empty user-agent yields `None`.
pub fn detect_browser(user_agent: &str) -> Option<Browser> {
    if user_agent.is_empty() {
        return None;
    }

    let ua_lower = user_agent.to_lowercase();
    BROWSER_PATTERNS
        .iter()
        .find(|(pattern, _)| ua_lower.contains(pattern))
        .map(|(_, browser)| *browser)
}

/// Detect the OS family. First match in the ordered table wins.
pub fn detect_os(user_agent: &str) -> Option<Os> {
    if user_agent.is_empty() {
        return None;
    }

    let ua_lower = user_agent.to_lowercase();
    OS_PATTERNS
        .iter()
        .find(|(pattern, _)| ua_lower.contains(pattern))
        .map(|(_, os)| *os)
}
