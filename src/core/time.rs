use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Current UTC time, overridable for deterministic runs and tests.
pub fn now_utc() -> DateTime<Utc> {
    if let Ok(value) = std::env::var("TYPO_SNIPER_FIXED_TIME") {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
            return dt.with_timezone(&Utc);
        }
    }
    Utc::now()
}

/// Cutoff for the recent-registration filter: N months of 30 days each.
pub fn months_cutoff(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now - Duration::days(30 * i64::from(months))
}

pub fn age_days(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    now.signed_duration_since(then).num_days()
}

/// Parse a timestamp in any of the formats commonly seen in WHOIS and CT
/// responses. Returns None rather than erroring so a bad date never fails
/// the lookup that carried it.
pub fn parse_loose_datetime(value: &str) -> Option<DateTime<Utc>> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.with_timezone(&Utc));
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S UTC",
        "%d-%b-%Y %H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(naive.and_utc());
        }
    }
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%d-%b-%Y",
        "%Y.%m.%d",
        "%d.%m.%Y",
        "%Y/%m/%d",
    ];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(v, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_whois_date_shapes() {
        for raw in [
            "2024-03-01T12:00:00Z",
            "2024-03-01 12:00:00",
            "2024-03-01",
            "01-Mar-2024",
            "2024.03.01",
            "2024/03/01",
        ] {
            let parsed = parse_loose_datetime(raw);
            assert!(parsed.is_some(), "failed to parse {raw}");
            assert_eq!(parsed.unwrap().date_naive().to_string(), "2024-03-01");
        }
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_loose_datetime("").is_none());
        assert!(parse_loose_datetime("before 1999").is_none());
    }
}
