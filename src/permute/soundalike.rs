//! Sound-alike candidates: every edit-distance-1 ASCII string over the
//! label whose Soundex or Metaphone code matches the label's own.

pub fn variants(label: &str) -> Vec<String> {
    let target_soundex = soundex(label);
    let target_metaphone = metaphone(label);
    let mut out = Vec::new();
    for candidate in edit_distance_one(label) {
        if candidate == label {
            continue;
        }
        if soundex(&candidate) == target_soundex || metaphone(&candidate) == target_metaphone {
            out.push(candidate);
        }
    }
    out
}

fn edit_distance_one(label: &str) -> Vec<String> {
    let chars: Vec<char> = label.chars().collect();
    let mut out = Vec::new();
    // deletions
    for skip in 0..chars.len() {
        out.push(
            chars
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, c)| c)
                .collect(),
        );
    }
    // substitutions
    for i in 0..chars.len() {
        for c in 'a'..='z' {
            if chars[i] != c {
                let mut variant = chars.clone();
                variant[i] = c;
                out.push(variant.into_iter().collect());
            }
        }
    }
    // insertions
    for at in 0..=chars.len() {
        for c in 'a'..='z' {
            let mut variant = String::with_capacity(label.len() + 1);
            variant.extend(&chars[..at]);
            variant.push(c);
            variant.extend(&chars[at..]);
            out.push(variant);
        }
    }
    out
}

/// Classic four-character Soundex.
pub fn soundex(name: &str) -> String {
    let mut chars = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase());
    let Some(first) = chars.next() else {
        return "0000".to_string();
    };
    let mut code = String::from(first);
    let mut last_digit = soundex_digit(first);
    for c in chars {
        let digit = soundex_digit(c);
        if digit != '0' && digit != last_digit {
            code.push(digit);
            if code.len() == 4 {
                break;
            }
        }
        last_digit = digit;
    }
    while code.len() < 4 {
        code.push('0');
    }
    code
}

fn soundex_digit(c: char) -> char {
    match c {
        'B' | 'F' | 'P' | 'V' => '1',
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => '2',
        'D' | 'T' => '3',
        'L' => '4',
        'M' | 'N' => '5',
        'R' => '6',
        _ => '0',
    }
}

/// Simplified Metaphone: the common digraph reductions, then vowel removal.
pub fn metaphone(name: &str) -> String {
    let upper: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if upper.is_empty() {
        return String::new();
    }

    let mut s = upper;
    for (pattern, replacement) in [
        ("PH", "F"),
        ("TCH", "CH"),
        ("SCH", "SK"),
        ("SH", "X"),
        ("CH", "X"),
        ("CK", "K"),
        ("DGE", "J"),
        ("GH", ""),
        ("GN", "N"),
        ("KN", "N"),
        ("WR", "R"),
        ("QU", "KW"),
        ("WH", "W"),
        ("X", "KS"),
        ("Z", "S"),
        ("C", "K"),
        ("Q", "K"),
    ] {
        s = s.replace(pattern, replacement);
    }

    let mut out = String::with_capacity(4);
    for (i, c) in s.chars().enumerate() {
        let is_vowel = matches!(c, 'A' | 'E' | 'I' | 'O' | 'U' | 'Y' | 'H' | 'W');
        if i == 0 || !is_vowel {
            out.push(c);
        }
        if out.len() == 4 {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soundex_matches_reference_values() {
        assert_eq!(soundex("robert"), "R163");
        assert_eq!(soundex("rupert"), "R163");
        assert_eq!(soundex("example"), soundex("examble"));
    }

    #[test]
    fn variants_share_a_phonetic_code() {
        let target = soundex("paypal");
        for variant in variants("paypal") {
            assert!(
                soundex(&variant) == target || metaphone(&variant) == metaphone("paypal"),
                "{variant} shares no code with paypal"
            );
        }
    }

    #[test]
    fn variants_never_include_the_label_itself() {
        assert!(!variants("google").contains(&"google".to_string()));
    }
}
