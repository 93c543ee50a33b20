use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::core::cache::Cache;
use crate::core::error::SniperError;
use crate::core::record::{UrlscanReport, UrlscanSource, UrlscanVerdict};
use crate::core::time::{age_days, now_utc, parse_loose_datetime};

const DEFAULT_BASE_URL: &str = "https://urlscan.io";
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// URLScan.io client with the two-phase lookup protocol: reuse a recent
/// existing scan when one exists, otherwise submit and poll. Results are
/// cached under (domain, max_age_days). Any failure, including a submit
/// that never finishes polling, degrades to None.
pub struct UrlscanClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_age_days: u32,
    wait_timeout: Duration,
    visibility: String,
    poll_interval: Duration,
    cache: Arc<Cache>,
    cache_ttl: Duration,
    /// Enforces the minimum spacing between scan submissions.
    submit_gate: Mutex<Option<Instant>>,
    submit_interval: Duration,
}

impl UrlscanClient {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_key: String,
        max_age_days: u32,
        wait_timeout: Duration,
        visibility: String,
        submit_interval: Duration,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_age_days,
            wait_timeout,
            visibility,
            poll_interval: POLL_INTERVAL,
            cache,
            cache_ttl,
            submit_gate: Mutex::new(None),
            submit_interval,
        }
    }

    /// Point the client at a different API host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Shorten the result polling interval. Used by tests.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn analyze(&self, domain: &str) -> Option<UrlscanReport> {
        let cache_key = format!("{domain}:{}", self.max_age_days);
        let _guard = self.cache.lock_key("urlscan", &cache_key).await;
        if let Some(hit) = self.cache.get::<UrlscanReport>("urlscan", &cache_key) {
            tracing::debug!("urlscan cache hit for {domain}");
            return Some(hit);
        }

        let report = match self.fetch(domain).await {
            Ok(Some(report)) => report,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("urlscan failed for {domain}: {err}");
                return None;
            }
        };

        if let Err(err) = self
            .cache
            .put("urlscan", &cache_key, &report, self.cache_ttl)
        {
            tracing::warn!("urlscan cache write failed for {domain}: {err}");
        }
        Some(report)
    }

    async fn fetch(&self, domain: &str) -> Result<Option<UrlscanReport>, SniperError> {
        if let Some(existing) = self.search_existing(domain).await? {
            return Ok(Some(existing));
        }
        self.submit_and_poll(domain).await
    }

    async fn search_existing(&self, domain: &str) -> Result<Option<UrlscanReport>, SniperError> {
        let url = format!(
            "{}/api/v1/search/?q=domain:{domain}&size=1",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .header("API-Key", &self.api_key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SniperError::TransientNet("urlscan search rate limited".into()));
        }
        if !response.status().is_success() {
            return Err(SniperError::EnrichmentMiss(format!(
                "urlscan search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        let Some(hit) = body.results.into_iter().next() else {
            return Ok(None);
        };
        let Some(scan_time) = hit.task.time.as_deref().and_then(parse_loose_datetime) else {
            return Ok(None);
        };
        let age = age_days(now_utc(), scan_time);
        if age > i64::from(self.max_age_days) {
            tracing::debug!("urlscan result for {domain} is {age} days old, resubmitting");
            return Ok(None);
        }

        Ok(Some(build_report(
            hit.verdicts,
            hit.task,
            age,
            UrlscanSource::Existing,
        )))
    }

    async fn submit_and_poll(&self, domain: &str) -> Result<Option<UrlscanReport>, SniperError> {
        self.wait_for_submit_slot().await;

        let response = self
            .http
            .post(format!("{}/api/v1/scan/", self.base_url))
            .header("API-Key", &self.api_key)
            .json(&serde_json::json!({
                "url": format!("http://{domain}"),
                "visibility": self.visibility,
            }))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SniperError::TransientNet("urlscan submit rate limited".into()));
        }
        if !response.status().is_success() {
            return Err(SniperError::EnrichmentMiss(format!(
                "urlscan submit returned {}",
                response.status()
            )));
        }
        let submitted: SubmitResponse = response.json().await?;
        let Some(result_url) = submitted.api else {
            return Err(SniperError::EnrichmentMiss(
                "urlscan submit returned no result url".into(),
            ));
        };
        tracing::debug!("urlscan submitted for {domain} (uuid {:?})", submitted.uuid);

        let max_polls =
            (self.wait_timeout.as_millis() / self.poll_interval.as_millis().max(1)).max(1);
        for _ in 0..max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let response = self.http.get(&result_url).send().await?;
            match response.status() {
                reqwest::StatusCode::NOT_FOUND => continue,
                status if status.is_success() => {
                    let body: ResultResponse = response.json().await?;
                    return Ok(Some(build_report(
                        body.verdicts,
                        body.task,
                        0,
                        UrlscanSource::Submitted,
                    )));
                }
                status => {
                    return Err(SniperError::EnrichmentMiss(format!(
                        "urlscan result fetch returned {status}"
                    )))
                }
            }
        }
        tracing::warn!(
            "urlscan poll for {domain} timed out after {:?}",
            self.wait_timeout
        );
        Ok(None)
    }

    async fn wait_for_submit_slot(&self) {
        let mut gate = self.submit_gate.lock().await;
        if let Some(last) = *gate {
            let elapsed = last.elapsed();
            if elapsed < self.submit_interval {
                tokio::time::sleep(self.submit_interval - elapsed).await;
            }
        }
        *gate = Some(Instant::now());
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    task: Task,
    #[serde(default)]
    verdicts: Verdicts,
}

#[derive(Deserialize, Default)]
struct Task {
    time: Option<String>,
    #[serde(rename = "reportURL")]
    report_url: Option<String>,
    #[serde(rename = "screenshotURL")]
    screenshot_url: Option<String>,
}

#[derive(Deserialize, Default)]
struct Verdicts {
    #[serde(default)]
    overall: Overall,
}

#[derive(Deserialize, Default)]
struct Overall {
    malicious: Option<bool>,
    score: Option<i64>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    api: Option<String>,
    uuid: Option<String>,
}

#[derive(Deserialize)]
struct ResultResponse {
    #[serde(default)]
    task: Task,
    #[serde(default)]
    verdicts: Verdicts,
}

fn build_report(
    verdicts: Verdicts,
    task: Task,
    scan_age_days: i64,
    source: UrlscanSource,
) -> UrlscanReport {
    let malicious = verdicts.overall.malicious.unwrap_or(false);
    let raw_score = verdicts.overall.score;
    let verdict = if malicious {
        UrlscanVerdict::Malicious
    } else {
        match raw_score {
            Some(score) if score > 0 => UrlscanVerdict::Suspicious,
            Some(_) => UrlscanVerdict::Clean,
            None => UrlscanVerdict::Unknown,
        }
    };
    UrlscanReport {
        verdict,
        score: raw_score.unwrap_or(0).clamp(0, 100) as u8,
        report_url: task.report_url,
        screenshot_url: task.screenshot_url,
        scan_age_days,
        source,
    }
}
