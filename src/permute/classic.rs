//! Single-edit fuzzers over the registrable label. Each returns raw label
//! variants; the generator attaches the TLD, validates DNS legality and
//! deduplicates.

use crate::permute::tables::{keyboard_adjacent, ASCII_HOMOGLYPHS, VOWELS};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn addition(label: &str) -> Vec<String> {
    ALPHABET
        .iter()
        .map(|&c| format!("{label}{}", c as char))
        .collect()
}

pub fn omission(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    (0..chars.len())
        .map(|skip| {
            chars
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, c)| c)
                .collect()
        })
        .collect()
}

pub fn repetition(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    (0..chars.len())
        .map(|double| {
            let mut out = String::with_capacity(label.len() + 1);
            for (i, c) in chars.iter().enumerate() {
                out.push(*c);
                if i == double {
                    out.push(*c);
                }
            }
            out
        })
        .collect()
}

pub fn replacement(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut out = Vec::new();
    for (i, c) in chars.iter().enumerate() {
        for adjacent in keyboard_adjacent(*c).chars() {
            let mut variant: Vec<char> = chars.clone();
            variant[i] = adjacent;
            out.push(variant.into_iter().collect());
        }
    }
    out
}

pub fn transposition(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut out = Vec::new();
    for i in 0..chars.len().saturating_sub(1) {
        if chars[i] != chars[i + 1] {
            let mut variant = chars.clone();
            variant.swap(i, i + 1);
            out.push(variant.into_iter().collect());
        }
    }
    out
}

pub fn hyphenation(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    (1..chars.len())
        .map(|at| {
            let mut out = String::with_capacity(label.len() + 1);
            out.extend(&chars[..at]);
            out.push('-');
            out.extend(&chars[at..]);
            out
        })
        .collect()
}

pub fn vowel_swap(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut out = Vec::new();
    for (i, c) in chars.iter().enumerate() {
        if !VOWELS.contains(c) {
            continue;
        }
        for vowel in VOWELS {
            if vowel != c {
                let mut variant = chars.clone();
                variant[i] = *vowel;
                out.push(variant.into_iter().collect());
            }
        }
    }
    out
}

/// Flip one bit in one ASCII character, keeping only variants that stay in
/// the hostname charset.
pub fn bitsquat(label: &str) -> Vec<String> {
    let bytes = label.as_bytes();
    let mut out = Vec::new();
    for (i, &byte) in bytes.iter().enumerate() {
        for bit in 0..8u8 {
            let flipped = byte ^ (1 << bit);
            if flipped.is_ascii_lowercase() || flipped.is_ascii_digit() || flipped == b'-' {
                let mut variant = bytes.to_vec();
                variant[i] = flipped;
                if let Ok(s) = String::from_utf8(variant) {
                    out.push(s);
                }
            }
        }
    }
    out
}

/// ASCII lookalike substitutions (rn for m, 0 for o, ...).
pub fn homoglyph(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut out = Vec::new();
    for (i, c) in chars.iter().enumerate() {
        let Some((_, subs)) = ASCII_HOMOGLYPHS.iter().find(|(from, _)| from == c) else {
            continue;
        };
        for sub in *subs {
            let mut variant = String::with_capacity(label.len() + 1);
            variant.extend(&chars[..i]);
            variant.push_str(sub);
            variant.extend(&chars[i + 1..]);
            out.push(variant);
        }
    }
    out
}

/// Insert a dot inside the label, turning a prefix into a subdomain:
/// exa.mple.com.
pub fn subdomain(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut out = Vec::new();
    for at in 1..chars.len() {
        if chars[at - 1] == '-' || chars[at] == '-' {
            continue;
        }
        let mut variant = String::with_capacity(label.len() + 1);
        variant.extend(&chars[..at]);
        variant.push('.');
        variant.extend(&chars[at..]);
        out.push(variant);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omission_drops_each_position() {
        let variants = omission("abc");
        assert_eq!(variants, vec!["bc", "ac", "ab"]);
    }

    #[test]
    fn transposition_skips_equal_neighbours() {
        assert_eq!(transposition("aab"), vec!["aba"]);
    }

    #[test]
    fn bitsquat_variants_stay_in_charset() {
        for variant in bitsquat("example") {
            assert!(variant
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }

    #[test]
    fn homoglyph_covers_rn_for_m() {
        assert!(homoglyph("example").contains(&"exarnple".to_string()));
    }

    #[test]
    fn subdomain_avoids_hyphen_boundaries() {
        let variants = subdomain("a-b");
        assert!(variants.is_empty());
        assert_eq!(subdomain("abc"), vec!["a.bc", "ab.c"]);
    }
}
