use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// DNS records of interest for the registration decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsRecords {
    pub a: Vec<String>,
    pub aaaa: Vec<String>,
    pub mx: Vec<String>,
    pub ns: Vec<String>,
}

impl DnsRecords {
    pub fn any(&self) -> bool {
        !self.a.is_empty() || !self.aaaa.is_empty() || !self.mx.is_empty() || !self.ns.is_empty()
    }
}

/// Normalized WHOIS registration metadata. `raw_ok` records whether the
/// lookup itself succeeded; individual fields stay None when the response
/// omitted them or the date failed to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WhoisSummary {
    pub registrar: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub name_servers: Vec<String>,
    pub status: Vec<String>,
    pub emails: Vec<String>,
    pub registrant: Option<String>,
    pub org: Option<String>,
    pub country: Option<String>,
    pub raw_ok: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UrlscanVerdict {
    Malicious,
    Suspicious,
    Clean,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UrlscanSource {
    Existing,
    Submitted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlscanReport {
    pub verdict: UrlscanVerdict,
    pub score: u8,
    pub report_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub scan_age_days: i64,
    pub source: UrlscanSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CtSummary {
    pub count: u64,
    pub issuers: Vec<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpProbeResult {
    pub status_code: Option<u16>,
    pub active: bool,
    pub final_url: String,
    pub chain_length: u32,
}

impl Default for HttpProbeResult {
    fn default() -> Self {
        Self {
            status_code: None,
            active: false,
            final_url: String::new(),
            chain_length: 0,
        }
    }
}

/// Threat-intel section. A None field means the enricher was disabled,
/// skipped, or failed after retries; it is never a partial structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThreatIntel {
    pub urlscan: Option<UrlscanReport>,
    pub certificate_transparency: Option<CtSummary>,
    pub http_probe: Option<HttpProbeResult>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MlVerdict {
    Typosquat,
    Legitimate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MlAssessment {
    pub risk: u8,
    pub confidence: f64,
    pub verdict: MlVerdict,
    pub needs_review: bool,
    pub explanation: String,
}

/// The unit emitted to exporters. Immutable once assembled by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermutationRecord {
    pub seed: String,
    pub domain: String,
    pub fuzzer: String,
    pub registered: bool,
    pub dns: DnsRecords,
    pub whois: WhoisSummary,
    pub threat_intel: ThreatIntel,
    pub risk_score: u8,
    pub ml: Option<MlAssessment>,
}

/// Per-seed scan outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedScan {
    pub seed: String,
    pub total_candidates: usize,
    pub registered_count: usize,
    pub records: Vec<PermutationRecord>,
    /// Candidates lost to repeated transient failures. A seed with zero
    /// emitted records and a non-zero count here flips the exit code to 2.
    pub transient_failures: u64,
}

/// Run-level metadata handed to every exporter alongside the records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMeta {
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seeds: Vec<String>,
    pub enabled_features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub meta: ScanMeta,
    pub results: Vec<SeedScan>,
    /// Enricher name -> count of lookups that degraded to None.
    pub degraded: std::collections::BTreeMap<String, u64>,
}

impl ScanReport {
    pub fn records_emitted(&self) -> usize {
        self.results.iter().map(|r| r.records.len()).sum()
    }

    pub fn any_seed_failed(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.records.is_empty() && r.transient_failures > 0)
    }
}

/// Sort records the way exporters expect within one seed: descending risk,
/// then ascending domain.
pub fn sort_records(records: &mut [PermutationRecord]) {
    records.sort_by(|a, b| {
        b.risk_score
            .cmp(&a.risk_score)
            .then_with(|| a.domain.cmp(&b.domain))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(domain: &str, risk: u8) -> PermutationRecord {
        PermutationRecord {
            seed: "example.com".into(),
            domain: domain.into(),
            fuzzer: "omission".into(),
            registered: true,
            dns: DnsRecords::default(),
            whois: WhoisSummary::default(),
            threat_intel: ThreatIntel::default(),
            risk_score: risk,
            ml: None,
        }
    }

    #[test]
    fn sort_orders_by_risk_then_domain() {
        let mut records = vec![
            record("zample.com", 20),
            record("aample.com", 20),
            record("xample.com", 45),
        ];
        sort_records(&mut records);
        let domains: Vec<&str> = records.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, ["xample.com", "aample.com", "zample.com"]);
    }
}
