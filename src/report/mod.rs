//! Report writers: pure functions over the ordered record stream plus the
//! run metadata. Row order is the scanner's emission order (seed input
//! order, then descending risk, then ascending domain) and is never
//! re-sorted here.

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook};

use crate::core::error::SniperError;
use crate::core::record::{PermutationRecord, ScanReport};
use crate::ml::ReviewCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Excel,
    Json,
    Csv,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Excel => "xlsx",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Html => "html",
        }
    }
}

const COLUMNS: &[&str] = &[
    "seed",
    "domain",
    "fuzzer",
    "risk_score",
    "urlscan_verdict",
    "ct_count",
    "http_status",
    "whois_created",
    "whois_registrar",
    "dns_a",
    "ml_risk",
    "ml_verdict",
];

pub fn export(
    report: &ScanReport,
    formats: &[OutputFormat],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, SniperError> {
    fs::create_dir_all(output_dir)?;
    let stamp = report.meta.started_at.format("%Y%m%d_%H%M%S");
    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = output_dir.join(format!("typo_sniper_{stamp}.{}", format.extension()));
        match format {
            OutputFormat::Json => write_json(report, &path)?,
            OutputFormat::Csv => write_csv(report, &path)?,
            OutputFormat::Html => write_html(report, &path)?,
            OutputFormat::Excel => write_excel(report, &path)?,
        }
        written.push(path);
    }
    Ok(written)
}

/// Sidecar list of ML predictions queued for human labeling.
pub fn write_review_queue(
    queue: &[ReviewCandidate],
    output_dir: &Path,
) -> Result<PathBuf, SniperError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join("review_queue.json");
    let json = serde_json::to_string_pretty(queue)?;
    fs::write(&path, json)?;
    Ok(path)
}

fn write_json(report: &ScanReport, path: &Path) -> Result<(), SniperError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

fn write_csv(report: &ScanReport, path: &Path) -> Result<(), SniperError> {
    let mut out = String::new();
    out.push_str(&COLUMNS.join(","));
    out.push('\n');
    for record in flattened(report) {
        let row: Vec<String> = row_values(record)
            .into_iter()
            .map(|v| csv_escape(&v))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

fn write_html(report: &ScanReport, path: &Path) -> Result<(), SniperError> {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Typo Sniper Report</title>\n<style>\n");
    out.push_str(
        "body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;width:100%}\
         th,td{border:1px solid #ccc;padding:4px 8px;text-align:left;font-size:13px}\
         th{background:#36517e;color:#fff}tr:nth-child(even){background:#f4f6fa}\
         .high{color:#b00020;font-weight:bold}.summary{color:#444}\n",
    );
    out.push_str("</style>\n</head>\n<body>\n");
    out.push_str("<h1>Typo Sniper Report</h1>\n");
    out.push_str(&format!(
        "<p class=\"summary\">Version {} &middot; started {} &middot; {} seeds &middot; {} records</p>\n",
        html_escape(&report.meta.tool_version),
        report.meta.started_at.to_rfc3339(),
        report.meta.seeds.len(),
        report.records_emitted()
    ));
    if !report.meta.enabled_features.is_empty() {
        out.push_str(&format!(
            "<p class=\"summary\">Enabled: {}</p>\n",
            html_escape(&report.meta.enabled_features.join(", "))
        ));
    }
    out.push_str("<table>\n<tr>");
    for column in COLUMNS {
        out.push_str(&format!("<th>{column}</th>"));
    }
    out.push_str("</tr>\n");
    for record in flattened(report) {
        out.push_str("<tr>");
        for (i, value) in row_values(record).into_iter().enumerate() {
            if i == 3 && record.risk_score >= 50 {
                out.push_str(&format!("<td class=\"high\">{}</td>", html_escape(&value)));
            } else {
                out.push_str(&format!("<td>{}</td>", html_escape(&value)));
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n</body>\n</html>\n");
    fs::write(path, out)?;
    Ok(())
}

fn write_excel(report: &ScanReport, path: &Path) -> Result<(), SniperError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let summary = workbook
        .add_worksheet()
        .set_name("Summary")
        .map_err(xlsx_err)?;
    for (col, title) in ["Seed", "Candidates", "Registered", "Emitted"]
        .iter()
        .enumerate()
    {
        summary
            .write_string_with_format(0, col as u16, *title, &header)
            .map_err(xlsx_err)?;
    }
    for (row, scan) in report.results.iter().enumerate() {
        let row = row as u32 + 1;
        summary
            .write_string(row, 0, &scan.seed)
            .map_err(xlsx_err)?;
        summary
            .write_number(row, 1, scan.total_candidates as f64)
            .map_err(xlsx_err)?;
        summary
            .write_number(row, 2, scan.registered_count as f64)
            .map_err(xlsx_err)?;
        summary
            .write_number(row, 3, scan.records.len() as f64)
            .map_err(xlsx_err)?;
    }

    let details = workbook
        .add_worksheet()
        .set_name("Details")
        .map_err(xlsx_err)?;
    for (col, title) in COLUMNS.iter().enumerate() {
        details
            .write_string_with_format(0, col as u16, *title, &header)
            .map_err(xlsx_err)?;
    }
    for (row, record) in flattened(report).enumerate() {
        let row = row as u32 + 1;
        for (col, value) in row_values(record).into_iter().enumerate() {
            details
                .write_string(row, col as u16, &value)
                .map_err(xlsx_err)?;
        }
    }

    workbook.save(path).map_err(xlsx_err)?;
    Ok(())
}

fn xlsx_err(err: rust_xlsxwriter::XlsxError) -> SniperError {
    SniperError::Io(std::io::Error::other(err.to_string()))
}

fn flattened(report: &ScanReport) -> impl Iterator<Item = &PermutationRecord> {
    report.results.iter().flat_map(|scan| scan.records.iter())
}

fn row_values(record: &PermutationRecord) -> Vec<String> {
    vec![
        record.seed.clone(),
        record.domain.clone(),
        record.fuzzer.clone(),
        record.risk_score.to_string(),
        record
            .threat_intel
            .urlscan
            .as_ref()
            .map(|u| format!("{:?}", u.verdict).to_lowercase())
            .unwrap_or_default(),
        record
            .threat_intel
            .certificate_transparency
            .as_ref()
            .map(|ct| ct.count.to_string())
            .unwrap_or_default(),
        record
            .threat_intel
            .http_probe
            .as_ref()
            .and_then(|probe| probe.status_code)
            .map(|status| status.to_string())
            .unwrap_or_default(),
        record
            .whois
            .creation_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        record.whois.registrar.clone().unwrap_or_default(),
        record.dns.a.join(";"),
        record
            .ml
            .as_ref()
            .map(|ml| ml.risk.to_string())
            .unwrap_or_default(),
        record
            .ml
            .as_ref()
            .map(|ml| format!("{:?}", ml.verdict).to_lowercase())
            .unwrap_or_default(),
    ]
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{
        DnsRecords, ScanMeta, SeedScan, ThreatIntel, WhoisSummary,
    };

    fn sample_report() -> ScanReport {
        let record = PermutationRecord {
            seed: "example.com".into(),
            domain: "xample.com".into(),
            fuzzer: "omission".into(),
            registered: true,
            dns: DnsRecords {
                a: vec!["192.0.2.1".into(), "192.0.2.2".into()],
                ..DnsRecords::default()
            },
            whois: WhoisSummary {
                raw_ok: true,
                registrar: Some("Registrar, Inc.".into()),
                ..WhoisSummary::default()
            },
            threat_intel: ThreatIntel::default(),
            risk_score: 55,
            ml: None,
        };
        ScanReport {
            meta: ScanMeta {
                tool_version: "1.0.0".into(),
                started_at: "2025-06-01T00:00:00Z".parse().unwrap(),
                finished_at: "2025-06-01T00:05:00Z".parse().unwrap(),
                seeds: vec!["example.com".into()],
                enabled_features: vec!["risk-scoring".into()],
            },
            results: vec![SeedScan {
                seed: "example.com".into(),
                total_candidates: 100,
                registered_count: 1,
                records: vec![record],
                transient_failures: 0,
            }],
            degraded: Default::default(),
        }
    }

    #[test]
    fn csv_has_header_and_quoted_registrar() {
        let dir = std::env::temp_dir().join("ts_report_csv_test");
        let _ = fs::remove_dir_all(&dir);
        let report = sample_report();
        let paths = export(&report, &[OutputFormat::Csv], &dir).unwrap();
        let body = fs::read_to_string(&paths[0]).unwrap();
        let mut lines = body.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("example.com,xample.com,omission,55"));
        assert!(row.contains("\"Registrar, Inc.\""));
        assert!(row.contains("192.0.2.1;192.0.2.2"));
    }

    #[test]
    fn json_round_trips_the_schema() {
        let dir = std::env::temp_dir().join("ts_report_json_test");
        let _ = fs::remove_dir_all(&dir);
        let report = sample_report();
        let paths = export(&report, &[OutputFormat::Json], &dir).unwrap();
        let body = fs::read_to_string(&paths[0]).unwrap();
        let parsed: ScanReport = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.records_emitted(), 1);
        assert_eq!(parsed.results[0].records[0].domain, "xample.com");
    }

    #[test]
    fn html_escapes_cell_content() {
        let dir = std::env::temp_dir().join("ts_report_html_test");
        let _ = fs::remove_dir_all(&dir);
        let mut report = sample_report();
        report.results[0].records[0].whois.registrar = Some("<script>x</script>".into());
        let paths = export(&report, &[OutputFormat::Html], &dir).unwrap();
        let body = fs::read_to_string(&paths[0]).unwrap();
        assert!(!body.contains("<script>x</script>"));
        assert!(body.contains("&lt;script&gt;"));
    }
}
