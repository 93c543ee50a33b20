//! Rule-based risk scoring: a pure function over the assembled record, so
//! equal inputs always produce equal scores.

use chrono::{DateTime, Utc};

use crate::core::record::{PermutationRecord, UrlscanVerdict, WhoisSummary};
use crate::core::time::age_days;
use crate::permute::tables::PRIVACY_MARKERS;

/// Signal weights. The maximum reachable sum stays under the clamp, but the
/// clamp is applied anyway.
pub fn risk_score(record: &PermutationRecord, now: DateTime<Utc>) -> u8 {
    let mut score: i64 = 0;

    if let Some(urlscan) = &record.threat_intel.urlscan {
        match urlscan.verdict {
            UrlscanVerdict::Malicious => score += 25,
            UrlscanVerdict::Suspicious => score += 15,
            UrlscanVerdict::Clean | UrlscanVerdict::Unknown => {}
        }
    }

    if let Some(created) = record.whois.creation_date {
        let age = age_days(now, created);
        if (0..90).contains(&age) {
            score += 15;
        }
        if (0..30).contains(&age) {
            score += 10;
        }
    }

    if record
        .threat_intel
        .http_probe
        .as_ref()
        .is_some_and(|probe| probe.active)
    {
        score += 10;
    }

    if record
        .threat_intel
        .certificate_transparency
        .as_ref()
        .is_some_and(|ct| ct.count >= 1)
    {
        score += 5;
    }

    match record.fuzzer.as_str() {
        "homoglyph" | "idn-homograph" => score += 10,
        "combo" | "subdomain" => score += 5,
        _ => {}
    }

    if is_privacy_proxy(&record.whois) {
        score += 5;
    }

    score.clamp(0, 100) as u8
}

/// Heuristic: registrar, registrant, org or contact emails name a known
/// privacy/proxy service.
pub fn is_privacy_proxy(whois: &WhoisSummary) -> bool {
    let mut haystacks: Vec<String> = Vec::new();
    if let Some(registrar) = &whois.registrar {
        haystacks.push(registrar.to_lowercase());
    }
    if let Some(registrant) = &whois.registrant {
        haystacks.push(registrant.to_lowercase());
    }
    if let Some(org) = &whois.org {
        haystacks.push(org.to_lowercase());
    }
    haystacks.extend(whois.emails.iter().map(|e| e.to_lowercase()));

    haystacks
        .iter()
        .any(|hay| PRIVACY_MARKERS.iter().any(|marker| hay.contains(marker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{
        CtSummary, DnsRecords, HttpProbeResult, ThreatIntel, UrlscanReport, UrlscanSource,
    };
    use chrono::Duration;

    fn base_record() -> PermutationRecord {
        PermutationRecord {
            seed: "example.com".into(),
            domain: "xample.com".into(),
            fuzzer: "omission".into(),
            registered: true,
            dns: DnsRecords::default(),
            whois: WhoisSummary {
                raw_ok: true,
                ..WhoisSummary::default()
            },
            threat_intel: ThreatIntel::default(),
            risk_score: 0,
            ml: None,
        }
    }

    fn now() -> DateTime<Utc> {
        "2025-06-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn empty_record_scores_zero() {
        assert_eq!(risk_score(&base_record(), now()), 0);
    }

    #[test]
    fn weights_match_the_documented_table() {
        let mut record = base_record();
        record.threat_intel.urlscan = Some(UrlscanReport {
            verdict: UrlscanVerdict::Malicious,
            score: 90,
            report_url: None,
            screenshot_url: None,
            scan_age_days: 1,
            source: UrlscanSource::Existing,
        });
        assert_eq!(risk_score(&record, now()), 25);

        record.threat_intel.urlscan.as_mut().unwrap().verdict = UrlscanVerdict::Suspicious;
        assert_eq!(risk_score(&record, now()), 15);

        record.threat_intel.urlscan = None;
        record.threat_intel.http_probe = Some(HttpProbeResult {
            status_code: Some(200),
            active: true,
            final_url: "https://xample.com/".into(),
            chain_length: 0,
        });
        assert_eq!(risk_score(&record, now()), 10);

        record.threat_intel.certificate_transparency = Some(CtSummary {
            count: 3,
            issuers: vec![],
            first_seen: None,
            last_seen: None,
        });
        assert_eq!(risk_score(&record, now()), 15);
    }

    #[test]
    fn recent_registration_stacks_thirty_day_bonus() {
        let mut record = base_record();
        record.whois.creation_date = Some(now() - Duration::days(60));
        assert_eq!(risk_score(&record, now()), 15);
        record.whois.creation_date = Some(now() - Duration::days(10));
        assert_eq!(risk_score(&record, now()), 25);
        record.whois.creation_date = Some(now() - Duration::days(400));
        assert_eq!(risk_score(&record, now()), 0);
    }

    #[test]
    fn fuzzer_bonuses_apply() {
        let mut record = base_record();
        record.fuzzer = "idn-homograph".into();
        assert_eq!(risk_score(&record, now()), 10);
        record.fuzzer = "combo".into();
        assert_eq!(risk_score(&record, now()), 5);
    }

    #[test]
    fn privacy_proxy_detection_matches_markers() {
        let mut record = base_record();
        record.whois.registrar = Some("WhoisGuard, Inc.".into());
        assert!(is_privacy_proxy(&record.whois));
        assert_eq!(risk_score(&record, now()), 5);

        record.whois.registrar = Some("Plain Registrar".into());
        record.whois.emails = vec!["contact@privacy-shield.example".into()];
        assert!(is_privacy_proxy(&record.whois));
    }

    #[test]
    fn maximum_signal_set_stays_in_bounds() {
        let mut record = base_record();
        record.fuzzer = "idn-homograph".into();
        record.whois.creation_date = Some(now() - Duration::days(5));
        record.whois.registrar = Some("Privacy Protect LLC".into());
        record.threat_intel.urlscan = Some(UrlscanReport {
            verdict: UrlscanVerdict::Malicious,
            score: 100,
            report_url: None,
            screenshot_url: None,
            scan_age_days: 0,
            source: UrlscanSource::Submitted,
        });
        record.threat_intel.certificate_transparency = Some(CtSummary {
            count: 1,
            issuers: vec![],
            first_seen: None,
            last_seen: None,
        });
        record.threat_intel.http_probe = Some(HttpProbeResult {
            status_code: Some(200),
            active: true,
            final_url: String::new(),
            chain_length: 0,
        });
        let score = risk_score(&record, now());
        assert_eq!(score, 80);
        assert!(score <= 100);
    }
}
