//! Combo-squatting: the brand label combined with theme keywords in both
//! orders across "", "-" and "_" separators, plus single digit suffixes.
//! Underscore variants are generated for completeness and dropped later by
//! the DNS-label legality check.

use crate::permute::tables::keywords;

const SEPARATORS: &[&str] = &["", "-", "_"];

pub fn variants(label: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(keywords().len() * SEPARATORS.len() * 2 + 10);
    for keyword in keywords() {
        for sep in SEPARATORS {
            out.push(format!("{label}{sep}{keyword}"));
            out.push(format!("{keyword}{sep}{label}"));
        }
    }
    for digit in '0'..='9' {
        out.push(format!("{label}{digit}"));
    }
    out
}
