//! Versioned lookup tables for the fuzzers. The TLD popularity list and the
//! combo-squatting keyword list live as data files so they can evolve
//! without code changes; the smaller tables are inlined.

use std::sync::OnceLock;

static TLDS: OnceLock<Vec<&'static str>> = OnceLock::new();
static KEYWORDS: OnceLock<Vec<&'static str>> = OnceLock::new();

fn parse_list(raw: &'static str) -> Vec<&'static str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// TLD swap targets, ordered by popularity.
pub fn tlds() -> &'static [&'static str] {
    TLDS.get_or_init(|| parse_list(include_str!("../../data/tlds.txt")))
}

/// Combo-squatting keywords.
pub fn keywords() -> &'static [&'static str] {
    KEYWORDS.get_or_init(|| parse_list(include_str!("../../data/keywords.txt")))
}

/// QWERTY adjacency used by the replacement fuzzer.
pub fn keyboard_adjacent(c: char) -> &'static str {
    match c {
        'q' => "wa",
        'w' => "qes",
        'e' => "wrd",
        'r' => "etf",
        't' => "ryg",
        'y' => "tuh",
        'u' => "yij",
        'i' => "uok",
        'o' => "ipl",
        'p' => "o",
        'a' => "qsz",
        's' => "awdx",
        'd' => "sefc",
        'f' => "drgv",
        'g' => "fthb",
        'h' => "gyjn",
        'j' => "hukm",
        'k' => "jil",
        'l' => "ko",
        'z' => "asx",
        'x' => "zsc",
        'c' => "xdv",
        'v' => "cfb",
        'b' => "vgn",
        'n' => "bhm",
        'm' => "njk",
        '1' => "2q",
        '2' => "13w",
        '3' => "24e",
        '4' => "35r",
        '5' => "46t",
        '6' => "57y",
        '7' => "68u",
        '8' => "79i",
        '9' => "80o",
        '0' => "9p",
        _ => "",
    }
}

/// ASCII-renderable lookalike substitutions for the classic homoglyph
/// fuzzer.
pub const ASCII_HOMOGLYPHS: &[(char, &[&str])] = &[
    ('b', &["d"]),
    ('d', &["b", "cl"]),
    ('e', &["c"]),
    ('g', &["q"]),
    ('i', &["1", "l"]),
    ('l', &["1", "i"]),
    ('m', &["n", "rn"]),
    ('n', &["m", "r"]),
    ('o', &["0"]),
    ('q', &["g"]),
    ('u', &["v"]),
    ('v', &["u"]),
    ('w', &["vv"]),
    ('0', &["o"]),
    ('1', &["l", "i"]),
];

/// Visually-confusable Unicode code points (Cyrillic/Greek/Latin extended)
/// for the IDN homograph fuzzer. Candidates are emitted in punycode form.
pub const CONFUSABLES: &[(char, &[char])] = &[
    ('a', &['а', 'ɑ', 'α']),
    ('b', &['Ь']),
    ('c', &['с', 'ϲ']),
    ('e', &['е', 'ė']),
    ('h', &['һ']),
    ('i', &['і', 'ɩ', 'ι']),
    ('j', &['ј']),
    ('k', &['κ']),
    ('o', &['о', 'ο', 'օ']),
    ('p', &['р', 'ρ']),
    ('s', &['ѕ']),
    ('u', &['υ']),
    ('v', &['ν']),
    ('x', &['х']),
    ('y', &['у', 'ү']),
];

pub const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// Markers of WHOIS privacy/proxy services, matched case-insensitively
/// against registrar, registrant and contact emails.
pub const PRIVACY_MARKERS: &[&str] = &[
    "privacy",
    "private",
    "redacted",
    "whoisguard",
    "proxy",
    "domains by proxy",
    "withheld",
    "identity protect",
    "contact gate",
    "anonymize",
];
