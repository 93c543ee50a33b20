//! IDN homograph candidates: substitute visually-confusable Unicode code
//! points into the label and emit the punycode form. Substitution depth is
//! capped at two positions and fifty variants per label to keep the stage
//! bounded.

use crate::permute::tables::CONFUSABLES;

const MAX_VARIANTS: usize = 50;

pub fn variants(label: &str, suffix: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let positions: Vec<(usize, &[char])> = chars
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            CONFUSABLES
                .iter()
                .find(|(from, _)| from == c)
                .map(|(_, subs)| (i, *subs))
        })
        .collect();
    if positions.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();

    // single substitutions first, then pairs
    for &(i, subs) in &positions {
        for &sub in subs {
            let mut variant = chars.clone();
            variant[i] = sub;
            push_punycoded(&variant, suffix, &mut out);
            if out.len() >= MAX_VARIANTS {
                return out;
            }
        }
    }
    for (a, &(i, subs_i)) in positions.iter().enumerate() {
        for &(j, subs_j) in positions.iter().skip(a + 1) {
            for &sub_i in subs_i {
                for &sub_j in subs_j {
                    let mut variant = chars.clone();
                    variant[i] = sub_i;
                    variant[j] = sub_j;
                    push_punycoded(&variant, suffix, &mut out);
                    if out.len() >= MAX_VARIANTS {
                        return out;
                    }
                }
            }
        }
    }
    out
}

fn push_punycoded(label_chars: &[char], suffix: &str, out: &mut Vec<String>) {
    let unicode_label: String = label_chars.iter().collect();
    let unicode_domain = format!("{unicode_label}.{suffix}");
    if let Ok(ascii) = idna::domain_to_ascii(&unicode_domain) {
        out.push(ascii);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_punycode_only() {
        let variants = variants("apple", "com");
        assert!(!variants.is_empty());
        for v in &variants {
            assert!(v.is_ascii(), "{v} is not punycoded");
            assert!(v.starts_with("xn--") || v.contains(".xn--") || v.contains("xn--"));
        }
    }

    #[test]
    fn respects_the_variant_cap() {
        assert!(variants("aeiouy", "com").len() <= MAX_VARIANTS);
    }

    #[test]
    fn label_without_confusables_yields_nothing() {
        assert!(variants("zzz", "com").is_empty());
    }
}
