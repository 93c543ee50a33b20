//! Candidate lookalike generation: the deduplicating union of the fuzzer
//! set, streamed stage by stage so consumers that only take head elements
//! never pay for the full set.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

pub mod classic;
pub mod combo;
pub mod homograph;
pub mod soundalike;
pub mod tables;

/// The transformation that produced a candidate. The tag set is open for
/// exporters; internally it is closed so the stage order is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Fuzzer {
    Original,
    Addition,
    Bitsquat,
    Combo,
    Homoglyph,
    Hyphenation,
    IdnHomograph,
    Omission,
    Repetition,
    Replacement,
    Soundalike,
    Subdomain,
    TldSwap,
    Transposition,
    VowelSwap,
}

impl Fuzzer {
    pub fn tag(&self) -> &'static str {
        match self {
            Fuzzer::Original => "original",
            Fuzzer::Addition => "addition",
            Fuzzer::Bitsquat => "bitsquat",
            Fuzzer::Combo => "combo",
            Fuzzer::Homoglyph => "homoglyph",
            Fuzzer::Hyphenation => "hyphenation",
            Fuzzer::IdnHomograph => "idn-homograph",
            Fuzzer::Omission => "omission",
            Fuzzer::Repetition => "repetition",
            Fuzzer::Replacement => "replacement",
            Fuzzer::Soundalike => "soundalike",
            Fuzzer::Subdomain => "subdomain",
            Fuzzer::TldSwap => "tld-swap",
            Fuzzer::Transposition => "transposition",
            Fuzzer::VowelSwap => "vowel-swap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub domain: String,
    pub fuzzer: Fuzzer,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOptions {
    pub combo: bool,
    pub soundalike: bool,
    pub idn_homograph: bool,
}

/// Lower-case and punycode a raw seed. Returns None when the result is not
/// a legal registrable domain.
pub fn normalize_seed(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let ascii = idna::domain_to_ascii(&lowered).ok()?;
    if is_valid_domain(&ascii) && ascii.contains('.') {
        Some(ascii)
    } else {
        None
    }
}

/// DNS legality: at most 253 chars total, labels of 1..=63 LDH characters
/// with no leading or trailing hyphen.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    domain.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Streaming generator. Stages run in lexicographic tag order, so the
/// first-wins dedup below doubles as the "lexicographically first fuzzer
/// wins" rule; the seed itself is always emitted first as `original`.
pub fn generate(seed: &str, opts: GeneratorOptions) -> Permutations {
    let (label, suffix) = seed
        .split_once('.')
        .map(|(l, s)| (l.to_string(), s.to_string()))
        .unwrap_or_else(|| (seed.to_string(), "com".to_string()));

    let mut stages = vec![Fuzzer::Addition, Fuzzer::Bitsquat];
    if opts.combo {
        stages.push(Fuzzer::Combo);
    }
    stages.push(Fuzzer::Homoglyph);
    stages.push(Fuzzer::Hyphenation);
    if opts.idn_homograph {
        stages.push(Fuzzer::IdnHomograph);
    }
    stages.extend([Fuzzer::Omission, Fuzzer::Repetition, Fuzzer::Replacement]);
    if opts.soundalike {
        stages.push(Fuzzer::Soundalike);
    }
    stages.extend([Fuzzer::Subdomain, Fuzzer::TldSwap, Fuzzer::Transposition]);
    stages.push(Fuzzer::VowelSwap);

    Permutations {
        seed: seed.to_string(),
        label,
        suffix,
        stages,
        stage_idx: 0,
        buf: VecDeque::new(),
        seen: HashSet::new(),
        emitted_original: false,
    }
}

pub struct Permutations {
    seed: String,
    label: String,
    suffix: String,
    stages: Vec<Fuzzer>,
    stage_idx: usize,
    buf: VecDeque<Candidate>,
    seen: HashSet<String>,
    emitted_original: bool,
}

impl Permutations {
    fn fill_from_stage(&mut self, stage: Fuzzer) {
        let domains: Vec<String> = match stage {
            Fuzzer::Original => return,
            Fuzzer::Addition => self.with_suffix(classic::addition(&self.label)),
            Fuzzer::Bitsquat => self.with_suffix(classic::bitsquat(&self.label)),
            Fuzzer::Combo => self.with_suffix(combo::variants(&self.label)),
            Fuzzer::Homoglyph => self.with_suffix(classic::homoglyph(&self.label)),
            Fuzzer::Hyphenation => self.with_suffix(classic::hyphenation(&self.label)),
            Fuzzer::IdnHomograph => homograph::variants(&self.label, &self.suffix),
            Fuzzer::Omission => self.with_suffix(classic::omission(&self.label)),
            Fuzzer::Repetition => self.with_suffix(classic::repetition(&self.label)),
            Fuzzer::Replacement => self.with_suffix(classic::replacement(&self.label)),
            Fuzzer::Soundalike => self.with_suffix(soundalike::variants(&self.label)),
            Fuzzer::Subdomain => self.with_suffix(classic::subdomain(&self.label)),
            Fuzzer::TldSwap => tables::tlds()
                .iter()
                .filter(|tld| **tld != self.suffix)
                .map(|tld| format!("{}.{tld}", self.label))
                .collect(),
            Fuzzer::Transposition => self.with_suffix(classic::transposition(&self.label)),
            Fuzzer::VowelSwap => self.with_suffix(classic::vowel_swap(&self.label)),
        };
        for domain in domains {
            if is_valid_domain(&domain) && self.seen.insert(domain.clone()) {
                self.buf.push_back(Candidate {
                    domain,
                    fuzzer: stage,
                });
            }
        }
    }

    fn with_suffix(&self, labels: Vec<String>) -> Vec<String> {
        labels
            .into_iter()
            .map(|label| format!("{label}.{}", self.suffix))
            .collect()
    }
}

impl Iterator for Permutations {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if !self.emitted_original {
            self.emitted_original = true;
            self.seen.insert(self.seed.clone());
            return Some(Candidate {
                domain: self.seed.clone(),
                fuzzer: Fuzzer::Original,
            });
        }
        loop {
            if let Some(candidate) = self.buf.pop_front() {
                return Some(candidate);
            }
            let stage = *self.stages.get(self.stage_idx)?;
            self.stage_idx += 1;
            self.fill_from_stage(stage);
        }
    }
}
