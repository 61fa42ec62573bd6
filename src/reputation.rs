//! IP reputation adapter.
//!
//! Wraps an external reputation provider behind a normalizing, caching
//! facade. The provider is a port: the engine only depends on the
//! [`ReputationProvider`] trait and the normalized [`IpReputation`] shape.
//! A failed or timed-out lookup yields a fully-defaulted record with an
//! `error` set, never a partial record, so callers never special-case
//! missing fields.

use crate::cache::TtlCache;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Normalized reputation record for one IP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpReputation {
    pub is_proxy: bool,
    pub is_vpn: bool,
    pub is_tor: bool,
    pub is_hosting: bool,
    pub is_crawler: bool,
    pub is_bot_ip: bool,
    /// 0-100
    pub fraud_score: u8,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub asn: Option<String>,
    pub organization: Option<String>,
    pub mobile: bool,
    /// Set when the lookup failed; all other fields are then defaults.
    pub error: Option<String>,
}

impl IpReputation {
    /// Defaulted record carrying an error marker.
    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Any anonymizing-network flag set.
    pub fn is_anonymized(&self) -> bool {
        self.is_proxy || self.is_vpn || self.is_tor
    }
}

/// Raw provider response. Every field is optional so that providers with
/// partial coverage merge cleanly over the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderRecord {
    pub is_proxy: Option<bool>,
    pub is_vpn: Option<bool>,
    pub is_tor: Option<bool>,
    pub is_hosting: Option<bool>,
    pub is_crawler: Option<bool>,
    pub is_bot: Option<bool>,
    pub fraud_score: Option<u8>,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub asn: Option<String>,
    pub organization: Option<String>,
    pub mobile: Option<bool>,
}

impl ProviderRecord {
    fn normalize(self) -> IpReputation {
        IpReputation {
            is_proxy: self.is_proxy.unwrap_or(false),
            is_vpn: self.is_vpn.unwrap_or(false),
            is_tor: self.is_tor.unwrap_or(false),
            is_hosting: self.is_hosting.unwrap_or(false),
            is_crawler: self.is_crawler.unwrap_or(false),
            is_bot_ip: self.is_bot.unwrap_or(false),
            fraud_score: self.fraud_score.unwrap_or(0).min(100),
            country_code: self.country_code,
            timezone: self.timezone,
            isp: self.isp,
            asn: self.asn,
            organization: self.organization,
            mobile: self.mobile.unwrap_or(false),
            error: None,
        }
    }
}

/// External reputation lookup capability.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> anyhow::Result<ProviderRecord>;
}

/// Caching, normalizing facade over a [`ReputationProvider`].
pub struct ReputationService {
    provider: Arc<dyn ReputationProvider>,
    cache: TtlCache<IpAddr, IpReputation>,
    lookup_timeout: Duration,
}

impl ReputationService {
    pub fn new(
        provider: Arc<dyn ReputationProvider>,
        cache_size: u64,
        cache_ttl: Duration,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache: TtlCache::new("ip_reputation", cache_size, cache_ttl),
            lookup_timeout,
        }
    }

    /// Look up the reputation for `ip`. Syntactically invalid input yields a
    /// defaulted record with `error="Invalid IP address"`. Provider errors
    /// and timeouts degrade to a defaulted record and are not cached, so the
    /// next request retries.
    pub async fn get(&self, ip: &str) -> IpReputation {
        let addr: IpAddr = match ip.parse() {
            Ok(addr) => addr,
            Err(_) => return IpReputation::errored("Invalid IP address"),
        };

        if let Some(cached) = self.cache.get(&addr).await {
            debug!(ip = %addr, "reputation cache hit");
            return cached;
        }

        let lookup = self.provider.lookup(addr);
        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(record)) => {
                let reputation = record.normalize();
                self.cache.insert(addr, reputation.clone()).await;
                reputation
            }
            Ok(Err(err)) => {
                warn!(ip = %addr, error = %err, "reputation lookup failed");
                IpReputation::errored(err.to_string())
            }
            Err(_) => {
                warn!(ip = %addr, "reputation lookup timed out");
                IpReputation::errored("Lookup timed out")
            }
        }
    }
}

/// HTTP reputation provider speaking the ip-api style JSON shape.
pub struct HttpReputationProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReputationProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpReputationProvider {
    fn default() -> Self {
        Self::new("http://ip-api.com/json")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    status: Option<String>,
    country_code: Option<String>,
    timezone: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    #[serde(rename = "as")]
    as_info: Option<String>,
    proxy: Option<bool>,
    hosting: Option<bool>,
    mobile: Option<bool>,
}

#[async_trait]
impl ReputationProvider for HttpReputationProvider {
    async fn lookup(&self, ip: IpAddr) -> anyhow::Result<ProviderRecord> {
        let url = format!(
            "{}/{}?fields=status,countryCode,timezone,isp,org,as,proxy,hosting,mobile",
            self.base_url, ip
        );

        let resp: WireResponse = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await?
            .json()
            .await?;

        if resp.status.as_deref() != Some("success") {
            anyhow::bail!("provider returned non-success status");
        }

        Ok(ProviderRecord {
            is_proxy: resp.proxy,
            is_hosting: resp.hosting,
            country_code: resp.country_code,
            timezone: resp.timezone,
            isp: resp.isp,
            asn: resp.as_info,
            organization: resp.org,
            mobile: resp.mobile,
            ..Default::default()
        })
    }
}
