use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use httpmock::prelude::*;
use httpmock::Method::HEAD;
use serde_json::json;

use typo_sniper::core::cache::Cache;
use typo_sniper::core::record::{UrlscanSource, UrlscanVerdict};
use typo_sniper::enrich::ct::CtClient;
use typo_sniper::enrich::http_probe::HttpProber;
use typo_sniper::enrich::urlscan::UrlscanClient;

fn no_cache(name: &str) -> Arc<Cache> {
    let dir: PathBuf = std::env::temp_dir().join(format!("ts_enricher_{name}"));
    Arc::new(Cache::new(&dir, false).unwrap())
}

fn urlscan_client(server: &MockServer, name: &str) -> UrlscanClient {
    UrlscanClient::new(
        "test-key".to_string(),
        7,
        Duration::from_secs(5),
        "public".to_string(),
        Duration::from_millis(1),
        no_cache(name),
        Duration::from_secs(3600),
    )
    .with_base_url(server.base_url())
    .with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn urlscan_reuses_recent_existing_scan_without_submitting() {
    let server = MockServer::start();
    let scan_time = (Utc::now() - chrono::Duration::days(3)).to_rfc3339();
    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/search/")
            .query_param("q", "domain:xample.com");
        then.status(200).json_body(json!({
            "results": [{
                "task": {
                    "time": scan_time,
                    "reportURL": "https://urlscan.example/report",
                    "screenshotURL": "https://urlscan.example/shot.png"
                },
                "verdicts": {"overall": {"malicious": true, "score": 80}}
            }]
        }));
    });
    let submit = server.mock(|when, then| {
        when.method(POST).path("/api/v1/scan/");
        then.status(200).json_body(json!({"api": "unused", "uuid": "u"}));
    });

    let client = urlscan_client(&server, "existing");
    let report = client.analyze("xample.com").await.unwrap();

    assert_eq!(report.source, UrlscanSource::Existing);
    assert_eq!(report.verdict, UrlscanVerdict::Malicious);
    assert_eq!(report.scan_age_days, 3);
    assert_eq!(report.score, 80);
    search.assert();
    assert_eq!(submit.hits(), 0, "a recent existing scan must not resubmit");
}

#[tokio::test]
async fn urlscan_submits_and_polls_when_no_recent_scan_exists() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/search/");
        then.status(200).json_body(json!({"results": []}));
    });
    let result_url = format!("{}/api/v1/result/abc123/", server.base_url());
    let submit = server.mock(|when, then| {
        when.method(POST).path("/api/v1/scan/");
        then.status(200)
            .json_body(json!({"api": result_url, "uuid": "abc123"}));
    });
    let result = server.mock(|when, then| {
        when.method(GET).path("/api/v1/result/abc123/");
        then.status(200).json_body(json!({
            "task": {"reportURL": "https://urlscan.example/r"},
            "verdicts": {"overall": {"malicious": false, "score": 12}}
        }));
    });

    let client = urlscan_client(&server, "submit");
    let report = client.analyze("xample.com").await.unwrap();

    assert_eq!(report.source, UrlscanSource::Submitted);
    assert_eq!(report.verdict, UrlscanVerdict::Suspicious);
    assert_eq!(report.scan_age_days, 0);
    submit.assert();
    result.assert();
}

#[tokio::test]
async fn urlscan_failure_degrades_to_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/search/");
        then.status(500);
    });
    let client = urlscan_client(&server, "failure");
    assert!(client.analyze("xample.com").await.is_none());
}

#[tokio::test]
async fn urlscan_poll_timeout_yields_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/search/");
        then.status(200).json_body(json!({"results": []}));
    });
    let result_url = format!("{}/api/v1/result/slow/", server.base_url());
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/scan/");
        then.status(200)
            .json_body(json!({"api": result_url, "uuid": "slow"}));
    });
    // result never becomes available
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/result/slow/");
        then.status(404);
    });

    let client = UrlscanClient::new(
        "test-key".to_string(),
        7,
        Duration::from_secs(1),
        "public".to_string(),
        Duration::from_millis(1),
        no_cache("timeout"),
        Duration::from_secs(3600),
    )
    .with_base_url(server.base_url())
    .with_poll_interval(Duration::from_millis(10));

    assert!(client.analyze("xample.com").await.is_none());
}

#[tokio::test]
async fn ct_lookup_counts_and_dedupes_issuers() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/").query_param("q", "xample.com");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([
                {"issuer_name": "C=US, O=Let's Encrypt", "not_before": "2024-05-01T00:00:00"},
                {"issuer_name": "C=US, O=Let's Encrypt", "not_before": "2024-06-01T00:00:00"},
                {"issuer_name": "C=US, O=DigiCert Inc", "not_before": "2024-04-01T00:00:00"}
            ]));
    });

    let client = CtClient::new(no_cache("ct"), Duration::from_secs(3600))
        .with_base_url(server.base_url());
    let summary = client.lookup("xample.com").await.unwrap();

    assert_eq!(summary.count, 3);
    assert_eq!(summary.issuers.len(), 2);
    assert_eq!(
        summary.first_seen.unwrap().date_naive().to_string(),
        "2024-04-01"
    );
    assert_eq!(
        summary.last_seen.unwrap().date_naive().to_string(),
        "2024-06-01"
    );
}

#[tokio::test]
async fn ct_html_answer_means_no_certificates() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(200)
            .header("content-type", "text/html")
            .body("<html>no results</html>");
    });
    let client = CtClient::new(no_cache("ct_html"), Duration::from_secs(3600))
        .with_base_url(server.base_url());
    let summary = client.lookup("xample.com").await.unwrap();
    assert_eq!(summary.count, 0);
    assert!(summary.issuers.is_empty());
}

#[tokio::test]
async fn ct_server_error_degrades_to_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(503);
    });
    let client = CtClient::new(no_cache("ct_err"), Duration::from_secs(3600))
        .with_base_url(server.base_url());
    assert!(client.lookup("xample.com").await.is_none());
}

#[tokio::test]
async fn http_probe_follows_redirects_and_counts_hops() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(HEAD).path("/");
        then.status(301).header("location", "/landing");
    });
    server.mock(|when, then| {
        when.method(HEAD).path("/landing");
        then.status(200);
    });

    let prober = HttpProber::new(Duration::from_secs(2));
    let result = prober.probe(&server.address().to_string()).await;

    assert_eq!(result.status_code, Some(200));
    assert!(result.active);
    assert_eq!(result.chain_length, 1);
    assert!(result.final_url.ends_with("/landing"));
}

#[tokio::test]
async fn http_probe_unreachable_host_reports_inactive() {
    // nothing listens on this port
    let prober = HttpProber::new(Duration::from_millis(300));
    let result = prober.probe("127.0.0.1:9").await;
    assert_eq!(result.status_code, None);
    assert!(!result.active);
    assert_eq!(result.chain_length, 0);
}
