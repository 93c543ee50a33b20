//! The scanner orchestrates permutation generation, DNS admission, parallel
//! enrichment, scoring and record assembly per seed, preserving seed input
//! order in its output.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::core::cache::Cache;
use crate::core::error::SniperError;
use crate::core::record::{
    sort_records, DnsRecords, PermutationRecord, ScanMeta, ScanReport, SeedScan, ThreatIntel,
    WhoisSummary,
};
use crate::core::time::{months_cutoff, now_utc};
use crate::enrich::ct::CtClient;
use crate::enrich::dns::{DnsResolution, DnsResolver};
use crate::enrich::http_probe::HttpProber;
use crate::enrich::risk::risk_score;
use crate::enrich::urlscan::UrlscanClient;
use crate::enrich::whois::WhoisClient;
use crate::ml::{MlHook, ReviewCandidate};
use crate::permute::{self, Candidate, GeneratorOptions};

pub mod limits;

use limits::EnricherLimits;

pub struct Scanner {
    config: Arc<AppConfig>,
    dns: DnsResolver,
    whois: WhoisClient,
    urlscan: Option<UrlscanClient>,
    ct: Option<CtClient>,
    probe: Option<HttpProber>,
    ml: Option<MlHook>,
    limits: Arc<EnricherLimits>,
    degraded: Mutex<BTreeMap<String, u64>>,
}

impl Scanner {
    pub fn new(config: Arc<AppConfig>, cache: Arc<Cache>) -> Result<Self, SniperError> {
        let cache_ttl = Duration::from_secs(config.cache_ttl);
        let whois = WhoisClient::new(
            cache.clone(),
            cache_ttl,
            Duration::from_secs(config.whois_timeout),
            config.whois_retry_count,
            Duration::from_secs(config.whois_retry_delay),
        );
        let urlscan = if config.urlscan_enabled() {
            let key = config.urlscan_api_key.clone().ok_or_else(|| {
                SniperError::Config("enable_urlscan is on but no API key resolved".into())
            })?;
            Some(UrlscanClient::new(
                key,
                config.urlscan_max_age_days,
                Duration::from_secs(config.urlscan_wait_timeout),
                config.urlscan_visibility.clone(),
                Duration::from_secs_f64(config.urlscan_submit_interval.max(0.0)),
                cache.clone(),
                cache_ttl,
            ))
        } else {
            None
        };
        let ct = config
            .enable_certificate_transparency
            .then(|| CtClient::new(cache.clone(), cache_ttl));
        let probe = config
            .enable_http_probe
            .then(|| HttpProber::new(Duration::from_secs(config.http_timeout)));
        let ml = MlHook::load(&config);

        Ok(Self {
            dns: DnsResolver::new(config.dns_retry_count),
            whois,
            urlscan,
            ct,
            probe,
            ml,
            limits: EnricherLimits::from_config(&config),
            degraded: Mutex::new(BTreeMap::new()),
            config,
        })
    }

    /// Scan every seed in input order. Individual seeds, candidates and
    /// enrichers never abort the run.
    pub async fn scan(&self, seeds: &[String]) -> ScanReport {
        let started_at = now_utc();
        let deadline = self.config.deadline();

        let mut results = Vec::with_capacity(seeds.len());
        for seed in seeds {
            tracing::info!("scanning {seed}");
            let scan = self.scan_seed(seed, deadline, started_at).await;
            tracing::info!(
                "{seed}: {} candidates, {} registered, {} emitted",
                scan.total_candidates,
                scan.registered_count,
                scan.records.len()
            );
            results.push(scan);
        }

        ScanReport {
            meta: ScanMeta {
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                started_at,
                finished_at: now_utc(),
                seeds: seeds.to_vec(),
                enabled_features: self.config.enabled_features(),
            },
            results,
            degraded: self.degraded.lock().await.clone(),
        }
    }

    async fn scan_seed(
        &self,
        seed: &str,
        deadline: Option<Instant>,
        now: DateTime<Utc>,
    ) -> SeedScan {
        let opts = GeneratorOptions {
            combo: self.config.enable_combosquatting,
            soundalike: self.config.enable_soundalike,
            idn_homograph: self.config.enable_idn_homograph,
        };

        // Phase A: stream candidates in worker-sized batches through DNS,
        // admitting only registered domains to enrichment.
        let mut total_candidates = 0usize;
        let mut transient_failures = 0u64;
        let mut registered: Vec<(Candidate, DnsRecords)> = Vec::new();
        let mut batch: Vec<Candidate> = Vec::with_capacity(self.config.max_workers);
        let mut admissions_open = true;

        let mut generator = permute::generate(seed, opts).peekable();
        while admissions_open {
            while batch.len() < self.config.max_workers {
                if past(deadline) {
                    tracing::warn!("deadline reached for {seed}, stopping admissions");
                    admissions_open = false;
                    break;
                }
                let Some(candidate) = generator.next() else {
                    break;
                };
                total_candidates += 1;
                batch.push(candidate);
            }
            if batch.is_empty() {
                break;
            }
            let outcomes = self.resolve_batch(std::mem::take(&mut batch)).await;
            for (candidate, resolution) in outcomes {
                match resolution {
                    DnsResolution::Registered(records) => registered.push((candidate, records)),
                    DnsResolution::Unregistered { degraded: true } => transient_failures += 1,
                    DnsResolution::Unregistered { degraded: false } => {}
                }
            }
            if generator.peek().is_none() {
                break;
            }
            if self.config.rate_limit_delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(self.config.rate_limit_delay)).await;
            }
        }

        let registered_count = registered.len();

        // Phase B: parallel enrichment of registered candidates.
        let enriched: Vec<Option<PermutationRecord>> = stream::iter(registered)
            .map(|(candidate, dns)| self.enrich_candidate(seed, candidate, dns, deadline, now))
            .buffer_unordered(self.config.max_workers)
            .collect()
            .await;

        let mut records: Vec<PermutationRecord> = Vec::with_capacity(enriched.len());
        for outcome in enriched {
            match outcome {
                Some(record) => records.push(record),
                None => transient_failures += 1,
            }
        }

        if let Some(ml) = &self.ml {
            for chunk in records.chunks_mut(MlHook::BATCH_SIZE) {
                ml.score_batch(seed, chunk).await;
            }
        }

        records = filter_recent(records, self.config.months_filter, now);
        sort_records(&mut records);

        SeedScan {
            seed: seed.to_string(),
            total_candidates,
            registered_count,
            records,
            transient_failures,
        }
    }

    async fn resolve_batch(&self, batch: Vec<Candidate>) -> Vec<(Candidate, DnsResolution)> {
        let lookups = batch.into_iter().map(|candidate| async move {
            let resolution = match self.limits.dns.acquire().await {
                Ok(_permit) => self.dns.resolve(&candidate.domain).await,
                Err(_) => DnsResolution::Unregistered { degraded: true },
            };
            (candidate, resolution)
        });
        futures::future::join_all(lookups).await
    }

    /// Phase B for one candidate. Enricher failures surface as None fields;
    /// only the deadline backstop discards the whole (partial) record.
    async fn enrich_candidate(
        &self,
        seed: &str,
        candidate: Candidate,
        dns: DnsRecords,
        deadline: Option<Instant>,
        now: DateTime<Utc>,
    ) -> Option<PermutationRecord> {
        if past(deadline) {
            return None;
        }
        let domain = candidate.domain.clone();

        let whois_fut = async {
            match self.limits.whois.enter().await {
                Ok(_permit) => self.whois.lookup(&domain).await,
                Err(_) => WhoisSummary::default(),
            }
        };
        let urlscan_fut = async {
            match &self.urlscan {
                Some(client) => match self.limits.urlscan.enter().await {
                    Ok(_permit) => client.analyze(&domain).await,
                    Err(_) => None,
                },
                None => None,
            }
        };
        let ct_fut = async {
            match &self.ct {
                Some(client) => match self.limits.ct.enter().await {
                    Ok(_permit) => client.lookup(&domain).await,
                    Err(_) => None,
                },
                None => None,
            }
        };
        let probe_fut = async {
            match &self.probe {
                Some(prober) => match self.limits.http.enter().await {
                    Ok(_permit) => Some(prober.probe(&domain).await),
                    Err(_) => None,
                },
                None => None,
            }
        };

        let joined = tokio::time::timeout(
            self.config.per_candidate_deadline(),
            async { tokio::join!(whois_fut, urlscan_fut, ct_fut, probe_fut) },
        )
        .await;
        let (whois, urlscan, ct, http_probe) = match joined {
            Ok(parts) => parts,
            Err(_) => {
                tracing::warn!("enrichment deadline hit for {domain}, record discarded");
                return None;
            }
        };

        self.note_degradations(&whois, urlscan.is_none(), ct.is_none(), &http_probe)
            .await;

        let registered = dns.any() || whois.creation_date.is_some();
        let mut record = PermutationRecord {
            seed: seed.to_string(),
            domain,
            fuzzer: candidate.fuzzer.tag().to_string(),
            registered,
            dns,
            whois,
            threat_intel: ThreatIntel {
                urlscan,
                certificate_transparency: ct,
                http_probe,
            },
            risk_score: 0,
            ml: None,
        };
        if self.config.enable_risk_scoring {
            record.risk_score = risk_score(&record, now);
        }
        Some(record)
    }

    async fn note_degradations(
        &self,
        whois: &WhoisSummary,
        urlscan_missing: bool,
        ct_missing: bool,
        http_probe: &Option<crate::core::record::HttpProbeResult>,
    ) {
        let mut degraded = self.degraded.lock().await;
        if !whois.raw_ok {
            *degraded.entry("whois".to_string()).or_default() += 1;
        }
        if self.urlscan.is_some() && urlscan_missing {
            *degraded.entry("urlscan".to_string()).or_default() += 1;
        }
        if self.ct.is_some() && ct_missing {
            *degraded
                .entry("certificate_transparency".to_string())
                .or_default() += 1;
        }
        if let Some(probe) = http_probe {
            if probe.status_code.is_none() && self.probe.is_some() {
                *degraded.entry("http_probe".to_string()).or_default() += 1;
            }
        }
    }

    /// Uncertain ML predictions accumulated for human review.
    pub async fn take_review_queue(&self) -> Vec<ReviewCandidate> {
        match &self.ml {
            Some(ml) => ml.select_for_review().await,
            None => Vec::new(),
        }
    }
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Keep records whose WHOIS creation date falls within the last N months of
/// 30 days; N = 0 disables the filter. Applying the filter twice equals
/// applying it once.
pub fn filter_recent(
    records: Vec<PermutationRecord>,
    months: u32,
    now: DateTime<Utc>,
) -> Vec<PermutationRecord> {
    if months == 0 {
        return records;
    }
    let cutoff = months_cutoff(now, months);
    records
        .into_iter()
        .filter(|record| {
            record
                .whois
                .creation_date
                .map(|created| created >= cutoff)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn record_with_age(domain: &str, days_old: Option<i64>, now: DateTime<Utc>) -> PermutationRecord {
        PermutationRecord {
            seed: "example.com".into(),
            domain: domain.into(),
            fuzzer: "omission".into(),
            registered: true,
            dns: DnsRecords::default(),
            whois: WhoisSummary {
                raw_ok: true,
                creation_date: days_old.map(|d| now - ChronoDuration::days(d)),
                ..WhoisSummary::default()
            },
            threat_intel: ThreatIntel::default(),
            risk_score: 0,
            ml: None,
        }
    }

    #[test]
    fn months_filter_keeps_only_recent_registrations() {
        let now: DateTime<Utc> = "2025-06-01T00:00:00Z".parse().unwrap();
        let records = vec![
            record_with_age("young.com", Some(10), now),
            record_with_age("old.com", Some(60), now),
            record_with_age("undated.com", None, now),
        ];
        let filtered = filter_recent(records, 1, now);
        let domains: Vec<&str> = filtered.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, ["young.com"]);
    }

    #[test]
    fn months_filter_is_idempotent() {
        let now: DateTime<Utc> = "2025-06-01T00:00:00Z".parse().unwrap();
        let records = vec![
            record_with_age("young.com", Some(10), now),
            record_with_age("mid.com", Some(45), now),
            record_with_age("old.com", Some(200), now),
        ];
        let once = filter_recent(records, 2, now);
        let twice = filter_recent(once.clone(), 2, now);
        assert_eq!(once, twice);
    }

    #[test]
    fn zero_months_disables_the_filter() {
        let now: DateTime<Utc> = "2025-06-01T00:00:00Z".parse().unwrap();
        let records = vec![record_with_age("undated.com", None, now)];
        assert_eq!(filter_recent(records.clone(), 0, now), records);
    }
}
