//! Honeypot challenge evaluator.
//!
//! A second bot-detection channel orthogonal to user-agent matching: an
//! invisible form field whose name rotates daily, a hidden issuance
//! timestamp, and an HMAC token binding the timestamp to the client IP.
//! Naive scripted submissions fill the invisible field, replay stale
//! tokens, or post back faster than a human can read.

use chrono::{NaiveDate, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// State handed back at issuance; correlates a served page to its later
/// submission via the session layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneypotIssuance {
    pub field_name: String,
    pub timestamp: i64,
    pub token: String,
}

/// Fields extracted from a submission for validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HoneypotSubmission {
    /// Value posted in the invisible field, if any
    pub honeypot_value: Option<String>,
    /// Hidden timestamp as submitted
    pub visit_time: Option<i64>,
    /// Token as submitted
    pub token: Option<String>,
    pub user_agent: Option<String>,
    pub accept: Option<String>,
    pub cookie_present: bool,
}

/// Validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoneypotResult {
    pub passed: bool,
    pub suspicion_score: u8,
    pub failures: Vec<String>,
}

/// Issues and validates honeypot challenges.
pub struct HoneypotManager {
    secret: Vec<u8>,
}

impl HoneypotManager {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
        }
    }

    /// Field name for the given day. Deterministic over (date, secret) so it
    /// is stable within a day but cannot be hardcoded by a scraper.
    pub fn field_name_for(&self, date: NaiveDate) -> String {
        let mut hasher = Sha256::new();
        hasher.update(date.format("%Y%m%d").to_string().as_bytes());
        hasher.update(&self.secret);
        let digest = hex::encode(hasher.finalize());
        format!("website_{}", &digest[..8])
    }

    /// Today's field name.
    pub fn field_name(&self) -> String {
        self.field_name_for(Utc::now().date_naive())
    }

    /// Token bound to (timestamp, client IP) under the server secret.
    pub fn token(&self, timestamp: i64, client_ip: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(format!("{}|{}", timestamp, client_ip).as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());
        digest[..16].to_string()
    }

    /// Issue a fresh challenge for the given client.
    pub fn issue(&self, client_ip: &str) -> HoneypotIssuance {
        let timestamp = Utc::now().timestamp();
        HoneypotIssuance {
            field_name: self.field_name(),
            timestamp,
            token: self.token(timestamp, client_ip),
        }
    }

    /// Generate the HTML snippet to embed in a served page, plus the
    /// issuance state for later correlation.
    pub fn generate_markup(&self, client_ip: &str) -> (String, HoneypotIssuance) {
        let issuance = self.issue(client_ip);

        let html = format!(
            concat!(
                "<div style=\"position: absolute; left: -9999px; top: -9999px; ",
                "opacity: 0; pointer-events: none;\" aria-hidden=\"true\">\n",
                "<label for=\"{field}\">Leave this field empty</label>\n",
                "<input type=\"text\" id=\"{field}\" name=\"{field}\" value=\"\" ",
                "tabindex=\"-1\" autocomplete=\"off\" />\n",
                "<input type=\"hidden\" name=\"visit_time\" value=\"{ts}\" />\n",
                "<input type=\"hidden\" name=\"visit_token\" value=\"{token}\" />\n",
                "</div>\n",
                "<script>try {{ document.cookie = \"hp_check={token}; path=/; ",
                "SameSite=Lax\"; }} catch(e) {{}}</script>\n",
            ),
            field = issuance.field_name,
            ts = issuance.timestamp,
            token = issuance.token,
        );

        (html, issuance)
    }

    /// Validate a submission against the challenge issued to `client_ip`.
    pub fn validate(&self, submission: &HoneypotSubmission, client_ip: &str) -> HoneypotResult {
        self.validate_at(submission, client_ip, Utc::now().timestamp())
    }

    fn validate_at(
        &self,
        submission: &HoneypotSubmission,
        client_ip: &str,
        now: i64,
    ) -> HoneypotResult {
        let mut score: u32 = 0;
        let mut failures = Vec::new();

        if submission
            .honeypot_value
            .as_deref()
            .is_some_and(|v| !v.is_empty())
        {
            failures.push("honeypot_field_filled".to_string());
            score += 50;
        }

        if let Some(visit_time) = submission.visit_time {
            if now - visit_time < 1 {
                failures.push("submitted_too_fast".to_string());
                score += 40;
            }

            let expected = self.token(visit_time, client_ip);
            let provided = submission.token.as_deref().unwrap_or("");
            if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
                failures.push("invalid_token".to_string());
                score += 30;
            }
        }

        if submission.user_agent.as_deref().unwrap_or("").is_empty() {
            failures.push("missing_user_agent".to_string());
            score += 30;
        }

        if submission.accept.as_deref().unwrap_or("").is_empty() {
            failures.push("missing_accept_header".to_string());
            score += 25;
        }

        if !submission.cookie_present {
            // Weak signal: privacy settings also strip cookies
            failures.push("no_cookie_support".to_string());
            score += 10;
        }

        HoneypotResult {
            passed: score < 50,
            suspicion_score: score.min(100) as u8,
            failures,
        }
    }
}

/// Constant-time comparison to keep token checks timing-safe.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP: &str = "203.0.113.7";

    fn manager() -> HoneypotManager {
        HoneypotManager::new("test-secret")
    }

    fn clean_submission(manager: &HoneypotManager, issued_at: i64) -> HoneypotSubmission {
        HoneypotSubmission {
            honeypot_value: Some(String::new()),
            visit_time: Some(issued_at),
            token: Some(manager.token(issued_at, IP)),
            user_agent: Some("Mozilla/5.0 Chrome/120".to_string()),
            accept: Some("text/html".to_string()),
            cookie_present: true,
        }
    }

    #[test]
    fn test_field_name_stable_within_day() {
        let m = manager();
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(m.field_name_for(date), m.field_name_for(date));
    }

    #[test]
    fn test_field_name_rotates_across_days() {
        let m = manager();
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        assert_ne!(m.field_name_for(monday), m.field_name_for(tuesday));
    }

    #[test]
    fn test_field_name_depends_on_secret() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let a = HoneypotManager::new("secret-a").field_name_for(date);
        let b = HoneypotManager::new("secret-b").field_name_for(date);
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_bound_to_ip() {
        let m = manager();
        assert_ne!(m.token(1_700_000_000, "1.2.3.4"), m.token(1_700_000_000, "5.6.7.8"));
    }

    #[test]
    fn test_clean_human_submission_passes() {
        let m = manager();
        let issued_at = 1_700_000_000;
        let submission = clean_submission(&m, issued_at);
        let result = m.validate_at(&submission, IP, issued_at + 12);
        assert!(result.passed, "failures: {:?}", result.failures);
    }

    #[test]
    fn test_filled_honeypot_field_always_fails() {
        let m = manager();
        let issued_at = 1_700_000_000;
        let mut submission = clean_submission(&m, issued_at);
        submission.honeypot_value = Some("buy cheap pills".to_string());

        let result = m.validate_at(&submission, IP, issued_at + 12);
        assert!(!result.passed);
        assert!(result.failures.iter().any(|f| f == "honeypot_field_filled"));
    }

    #[test]
    fn test_instant_submission_with_bad_token_fails() {
        let m = manager();
        let issued_at = 1_700_000_000;
        let mut submission = clean_submission(&m, issued_at);
        submission.token = Some("0000000000000000".to_string());

        let result = m.validate_at(&submission, IP, issued_at);
        // 40 fast + 30 token
        assert!(!result.passed);
        assert_eq!(result.suspicion_score, 70);
    }

    #[test]
    fn test_headerless_script_fails() {
        let m = manager();
        let issued_at = 1_700_000_000;
        let submission = HoneypotSubmission {
            visit_time: Some(issued_at),
            token: Some(m.token(issued_at, IP)),
            cookie_present: false,
            ..Default::default()
        };

        let result = m.validate_at(&submission, IP, issued_at + 12);
        // 30 missing UA + 25 missing Accept + 10 no cookie
        assert!(!result.passed);
        assert_eq!(result.suspicion_score, 65);
    }

    #[test]
    fn test_missing_cookie_alone_passes() {
        let m = manager();
        let issued_at = 1_700_000_000;
        let mut submission = clean_submission(&m, issued_at);
        submission.cookie_present = false;

        let result = m.validate_at(&submission, IP, issued_at + 12);
        assert!(result.passed);
        assert_eq!(result.suspicion_score, 10);
    }

    #[test]
    fn test_markup_embeds_issuance() {
        let m = manager();
        let (html, issuance) = m.generate_markup(IP);
        assert!(html.contains(&issuance.field_name));
        assert!(html.contains(&issuance.token));
        assert!(html.contains(&issuance.timestamp.to_string()));
    }
}
