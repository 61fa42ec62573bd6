//! Bot legitimacy verifier.
//!
//! A spoofed user-agent is cheap; reverse DNS infrastructure is not. For bot
//! identities with known infrastructure suffixes this performs a reverse DNS
//! lookup on the client IP, requires the hostname to end with a registered
//! suffix, then forward-resolves that hostname and requires it to map back to
//! the original IP. Published CIDR ranges, where available, short-circuit the
//! DNS round trip.

use ipnet::IpNet;
use moka::future::Cache;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Infrastructure facts for one verifiable bot identity.
struct BotInfrastructure {
    identity: &'static str,
    /// Hostname suffixes the reverse lookup must end with
    dns_suffixes: &'static [&'static str],
    /// Published ranges checked before DNS
    ip_ranges: &'static [&'static str],
}

const INFRASTRUCTURE: &[BotInfrastructure] = &[
    BotInfrastructure {
        identity: "googlebot",
        dns_suffixes: &[".googlebot.com", ".google.com"],
        ip_ranges: &["66.249.64.0/19", "64.233.160.0/19", "72.14.192.0/18"],
    },
    BotInfrastructure {
        identity: "google-ads-review",
        dns_suffixes: &[".googlebot.com", ".google.com"],
        ip_ranges: &["66.249.64.0/19", "64.233.160.0/19", "72.14.192.0/18"],
    },
    BotInfrastructure {
        identity: "bingbot",
        dns_suffixes: &[".search.msn.com"],
        ip_ranges: &["40.77.167.0/24", "157.55.0.0/16", "157.56.0.0/16"],
    },
];

/// Verifies claimed bot identities via reverse/forward DNS double lookup.
pub struct BotVerifier {
    resolver: TokioAsyncResolver,
    /// (ip, identity) -> verified
    cache: Cache<(IpAddr, String), bool>,
}

impl BotVerifier {
    /// Create a verifier with the given DNS timeout and result cache TTL.
    pub fn new(dns_timeout: Duration, cache_size: u64, cache_ttl: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = dns_timeout;
        opts.attempts = 1;

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        let cache = Cache::builder()
            .max_capacity(cache_size)
            .time_to_live(cache_ttl)
            .build();

        Self { resolver, cache }
    }

    /// Verify that `ip` genuinely belongs to the infrastructure of the
    /// claimed `bot_identity`. Identities without a registered suffix table
    /// are unverifiable and return false. DNS failure of either step also
    /// returns false; this never errors.
    pub async fn verify(&self, ip: IpAddr, bot_identity: &str) -> bool {
        let infra = match INFRASTRUCTURE.iter().find(|i| i.identity == bot_identity) {
            Some(infra) => infra,
            None => return false,
        };

        let cache_key = (ip, bot_identity.to_string());
        if let Some(cached) = self.cache.get(&cache_key).await {
            return cached;
        }

        let verified = self.verify_uncached(ip, infra).await;
        self.cache.insert(cache_key, verified).await;
        verified
    }

    async fn verify_uncached(&self, ip: IpAddr, infra: &BotInfrastructure) -> bool {
        // Published ranges first, no DNS round trip needed
        for range in infra.ip_ranges {
            if let Ok(net) = range.parse::<IpNet>() {
                if net.contains(&ip) {
                    return true;
                }
            }
        }

        let hostnames = match self.resolver.reverse_lookup(ip).await {
            Ok(hostnames) => hostnames,
            Err(err) => {
                debug!(ip = %ip, identity = infra.identity, error = %err, "reverse lookup failed");
                return false;
            }
        };

        for hostname in hostnames.iter() {
            let host = hostname.to_string();
            let host_trimmed = host.trim_end_matches('.');

            if !infra.dns_suffixes.iter().any(|s| host_trimmed.ends_with(s)) {
                continue;
            }

            // Forward verify: fake rDNS is trivial, the forward record is not.
            match self.resolver.lookup_ip(host_trimmed).await {
                Ok(ips) => {
                    if ips.iter().any(|resolved| resolved == ip) {
                        return true;
                    }
                }
                Err(err) => {
                    debug!(host = host_trimmed, error = %err, "forward lookup failed");
                }
            }
        }

        false
    }
}

impl Default for BotVerifier {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(3),
            10_000,
            Duration::from_secs(24 * 3600),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_identity_is_unverifiable() {
        let verifier = BotVerifier::default();
        let ip: IpAddr = "66.249.66.1".parse().unwrap();
        assert!(!verifier.verify(ip, "slackbot").await);
    }

    #[tokio::test]
    async fn test_published_range_short_circuits_dns() {
        let verifier = BotVerifier::default();
        let ip: IpAddr = "66.249.66.1".parse().unwrap();
        assert!(verifier.verify(ip, "googlebot").await);
    }

    #[tokio::test]
    async fn test_result_is_cached() {
        let verifier = BotVerifier::default();
        let ip: IpAddr = "66.249.66.1".parse().unwrap();

        assert!(verifier.verify(ip, "googlebot").await);
        let key = (ip, "googlebot".to_string());
        assert_eq!(verifier.cache.get(&key).await, Some(true));
    }

    #[tokio::test]
    async fn test_bingbot_range() {
        let verifier = BotVerifier::default();
        let ip: IpAddr = "40.77.167.12".parse().unwrap();
        assert!(verifier.verify(ip, "bingbot").await);
    }
}
