use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::core::cache::Cache;
use crate::core::error::SniperError;
use crate::core::record::WhoisSummary;
use crate::core::retry::RetryPolicy;
use crate::core::time::parse_loose_datetime;

/// Negative results (lookup failed after retries) are cached briefly so a
/// dead WHOIS server is not hammered on every candidate.
const NEGATIVE_TTL: Duration = Duration::from_secs(600);
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;

pub struct WhoisClient {
    cache: Arc<Cache>,
    cache_ttl: Duration,
    retry: RetryPolicy,
}

impl WhoisClient {
    pub fn new(
        cache: Arc<Cache>,
        cache_ttl: Duration,
        timeout: Duration,
        retry_count: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            cache,
            cache_ttl,
            retry: RetryPolicy::new(timeout, retry_count.max(1), retry_delay),
        }
    }

    /// Fetch and normalize registration metadata. Never errors: a lookup
    /// that fails after retries yields a summary with `raw_ok = false`.
    pub async fn lookup(&self, domain: &str) -> WhoisSummary {
        let _guard = self.cache.lock_key("whois", domain).await;
        if let Some(hit) = self.cache.get::<WhoisSummary>("whois", domain) {
            tracing::debug!("whois cache hit for {domain}");
            return hit;
        }

        let outcome = self
            .retry
            .run("whois", || async { query_server(domain).await })
            .await;

        match outcome {
            Ok(raw) => {
                let summary = parse_response(&raw);
                if let Err(err) = self.cache.put("whois", domain, &summary, self.cache_ttl) {
                    tracing::warn!("whois cache write failed for {domain}: {err}");
                }
                summary
            }
            Err(err) => {
                tracing::warn!("whois lookup failed for {domain}: {err}");
                let summary = WhoisSummary::default();
                if let Err(err) = self.cache.put("whois", domain, &summary, NEGATIVE_TTL) {
                    tracing::warn!("whois cache write failed for {domain}: {err}");
                }
                summary
            }
        }
    }
}

/// One round trip of the port-43 protocol against the TLD's registry
/// server.
async fn query_server(domain: &str) -> Result<String, SniperError> {
    let tld = domain.rsplit('.').next().unwrap_or("");
    let server = server_for(tld);

    let mut stream = TcpStream::connect(&server)
        .await
        .map_err(|e| SniperError::TransientNet(format!("{server}: {e}")))?;
    stream
        .write_all(format!("{domain}\r\n").as_bytes())
        .await
        .map_err(|e| SniperError::TransientNet(e.to_string()))?;

    let mut response = Vec::new();
    stream
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut response)
        .await
        .map_err(|e| SniperError::TransientNet(e.to_string()))?;
    let text = String::from_utf8_lossy(&response).to_string();

    let lowered = text.to_lowercase();
    if lowered.contains("rate limit")
        || lowered.contains("quota exceeded")
        || lowered.contains("try again later")
    {
        return Err(SniperError::TransientNet(format!(
            "{server} refused the query"
        )));
    }
    Ok(text)
}

fn server_for(tld: &str) -> String {
    let host = match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "biz" => "whois.nic.biz",
        "io" => "whois.nic.io",
        "co" => "whois.nic.co",
        "us" => "whois.nic.us",
        "uk" => "whois.nic.uk",
        "me" => "whois.nic.me",
        "de" => "whois.denic.de",
        "fr" => "whois.afnic.fr",
        "nl" => "whois.domain-registry.nl",
        "eu" => "whois.eu",
        "ca" => "whois.cira.ca",
        "au" => "whois.auda.org.au",
        "jp" => "whois.jprs.jp",
        "cn" => "whois.cnnic.net.cn",
        "ru" => "whois.tcinet.ru",
        "br" => "whois.registro.br",
        "in" => "whois.registry.in",
        "app" | "dev" | "page" => "whois.nic.google",
        "xyz" => "whois.nic.xyz",
        "top" => "whois.nic.top",
        "online" => "whois.nic.online",
        "site" => "whois.nic.site",
        "shop" => "whois.nic.shop",
        "store" => "whois.nic.store",
        "tech" => "whois.nic.tech",
        "cc" | "tv" => "ccwhois.verisign-grs.com",
        _ => "whois.iana.org",
    };
    format!("{host}:43")
}

/// Key/value extraction over the raw response. Unparseable dates leave the
/// field None while `raw_ok` stays true.
pub fn parse_response(raw: &str) -> WhoisSummary {
    let mut summary = WhoisSummary {
        raw_ok: true,
        ..WhoisSummary::default()
    };

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "registrar" | "sponsoring registrar" => {
                if summary.registrar.is_none() {
                    summary.registrar = Some(value.to_string());
                }
            }
            "creation date" | "created" | "created on" | "registered" | "registered on"
            | "registration time" | "domain registration date" => {
                if summary.creation_date.is_none() {
                    summary.creation_date = parse_loose_datetime(value);
                }
            }
            "updated date" | "last updated" | "last-update" | "modified" | "changed" => {
                if summary.updated_date.is_none() {
                    summary.updated_date = parse_loose_datetime(value);
                }
            }
            "registry expiry date" | "expiration date" | "expires" | "expiry date"
            | "expire date" | "paid-till" => {
                if summary.expiration_date.is_none() {
                    summary.expiration_date = parse_loose_datetime(value);
                }
            }
            "name server" | "nserver" | "nameserver" | "nameservers" => {
                let ns = value
                    .split_whitespace()
                    .next()
                    .unwrap_or(value)
                    .to_lowercase();
                if !summary.name_servers.contains(&ns) {
                    summary.name_servers.push(ns);
                }
            }
            "domain status" | "status" => {
                let status = value
                    .split_whitespace()
                    .next()
                    .unwrap_or(value)
                    .to_string();
                if !summary.status.contains(&status) {
                    summary.status.push(status);
                }
            }
            "registrant name" | "registrant" => {
                if summary.registrant.is_none() {
                    summary.registrant = Some(value.to_string());
                }
            }
            "registrant organization" | "registrant organisation" | "org" | "organization" => {
                if summary.org.is_none() {
                    summary.org = Some(value.to_string());
                }
            }
            "registrant country" | "country" => {
                if summary.country.is_none() {
                    summary.country = Some(value.to_string());
                }
            }
            _ => {
                if key.contains("email") && value.contains('@') {
                    let email = value.to_lowercase();
                    if !summary.emails.contains(&email) {
                        summary.emails.push(email);
                    }
                }
            }
        }
    }

    summary
}
