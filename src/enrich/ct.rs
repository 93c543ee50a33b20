use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::core::cache::Cache;
use crate::core::error::SniperError;
use crate::core::record::CtSummary;
use crate::core::time::parse_loose_datetime;

const DEFAULT_BASE_URL: &str = "https://crt.sh";
const CT_TIMEOUT: Duration = Duration::from_secs(15);

/// Certificate Transparency lookup against the public crt.sh log index.
/// No API key; failures degrade to None.
pub struct CtClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CtClient {
    pub fn new(cache: Arc<Cache>, cache_ttl: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(CT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache,
            cache_ttl,
        }
    }

    /// Point the client at a different log index host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn lookup(&self, domain: &str) -> Option<CtSummary> {
        let _guard = self.cache.lock_key("ct", domain).await;
        if let Some(hit) = self.cache.get::<CtSummary>("ct", domain) {
            tracing::debug!("ct cache hit for {domain}");
            return Some(hit);
        }
        let summary = match self.fetch(domain).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!("ct lookup failed for {domain}: {err}");
                return None;
            }
        };
        if let Err(err) = self.cache.put("ct", domain, &summary, self.cache_ttl) {
            tracing::warn!("ct cache write failed for {domain}: {err}");
        }
        Some(summary)
    }

    async fn fetch(&self, domain: &str) -> Result<CtSummary, SniperError> {
        let url = format!("{}/?q={domain}&output=json", self.base_url);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SniperError::EnrichmentMiss(format!(
                "crt.sh returned {}",
                response.status()
            )));
        }
        // crt.sh answers "no certificates" with an HTML page
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        if !is_json {
            return Ok(CtSummary {
                count: 0,
                issuers: Vec::new(),
                first_seen: None,
                last_seen: None,
            });
        }

        let entries: Vec<CtEntry> = response.json().await?;
        let mut issuers: Vec<String> = entries
            .iter()
            .filter_map(|e| e.issuer_name.clone())
            .collect();
        issuers.sort();
        issuers.dedup();

        let mut first_seen = None;
        let mut last_seen = None;
        for entry in &entries {
            if let Some(seen) = entry.not_before.as_deref().and_then(parse_loose_datetime) {
                first_seen = Some(match first_seen {
                    Some(current) if current < seen => current,
                    _ => seen,
                });
                last_seen = Some(match last_seen {
                    Some(current) if current > seen => current,
                    _ => seen,
                });
            }
        }

        Ok(CtSummary {
            count: entries.len() as u64,
            issuers,
            first_seen,
            last_seen,
        })
    }
}

#[derive(Deserialize)]
struct CtEntry {
    issuer_name: Option<String>,
    not_before: Option<String>,
}
