use std::collections::BTreeMap;

use typo_sniper::core::record::{
    sort_records, DnsRecords, PermutationRecord, ScanMeta, ScanReport, SeedScan, ThreatIntel,
    WhoisSummary,
};
use typo_sniper::report::{self, OutputFormat};

fn record(seed: &str, domain: &str, risk: u8) -> PermutationRecord {
    PermutationRecord {
        seed: seed.into(),
        domain: domain.into(),
        fuzzer: "omission".into(),
        registered: true,
        dns: DnsRecords::default(),
        whois: WhoisSummary {
            raw_ok: true,
            ..WhoisSummary::default()
        },
        threat_intel: ThreatIntel::default(),
        risk_score: risk,
        ml: None,
    }
}

fn seed_scan(seed: &str, mut records: Vec<PermutationRecord>) -> SeedScan {
    sort_records(&mut records);
    SeedScan {
        seed: seed.into(),
        total_candidates: records.len(),
        registered_count: records.len(),
        records,
        transient_failures: 0,
    }
}

fn report_for(results: Vec<SeedScan>) -> ScanReport {
    let seeds = results.iter().map(|r| r.seed.clone()).collect();
    ScanReport {
        meta: ScanMeta {
            tool_version: "1.0.0".into(),
            started_at: "2025-06-01T00:00:00Z".parse().unwrap(),
            finished_at: "2025-06-01T00:01:00Z".parse().unwrap(),
            seeds,
            enabled_features: vec![],
        },
        results,
        degraded: BTreeMap::new(),
    }
}

#[test]
fn exporter_rows_follow_seed_order_then_risk_then_domain() {
    // second seed finishes "first" in wall-clock terms; output order must
    // still follow the input order
    let report = report_for(vec![
        seed_scan(
            "bbb.com",
            vec![
                record("bbb.com", "zbb.com", 10),
                record("bbb.com", "abb.com", 90),
            ],
        ),
        seed_scan(
            "aaa.com",
            vec![
                record("aaa.com", "aab.com", 50),
                record("aaa.com", "aac.com", 50),
                record("aaa.com", "aaa.net", 80),
            ],
        ),
    ]);

    let dir = std::env::temp_dir().join("ts_ordering_test");
    let _ = std::fs::remove_dir_all(&dir);
    let paths = report::export(&report, &[OutputFormat::Csv], &dir).unwrap();
    let body = std::fs::read_to_string(&paths[0]).unwrap();
    let domains: Vec<&str> = body
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(1).unwrap())
        .collect();

    assert_eq!(
        domains,
        ["abb.com", "zbb.com", "aaa.net", "aab.com", "aac.com"]
    );
}

#[test]
fn every_emitted_record_is_registered() {
    let report = report_for(vec![seed_scan(
        "example.com",
        vec![record("example.com", "xample.com", 5)],
    )]);
    for scan in &report.results {
        for record in &scan.records {
            assert!(record.registered);
        }
    }
}

#[test]
fn seed_failure_flag_drives_partial_exit() {
    let mut report = report_for(vec![seed_scan("example.com", vec![])]);
    assert!(!report.any_seed_failed());
    report.results[0].transient_failures = 4;
    assert!(report.any_seed_failed());
    // a seed with records is not a failure even with transient misses
    report.results[0]
        .records
        .push(record("example.com", "xample.com", 5));
    assert!(!report.any_seed_failed());
}
