//! Optional ML hook: a deferred scorer applied in batches after enrichment.
//! Strictly additive: any failure inside the hook logs a warning and leaves
//! `ml = None`; it never blocks emission and never mutates other fields.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::core::record::{MlAssessment, MlVerdict, PermutationRecord, UrlscanVerdict};
use crate::core::time::now_utc;

/// Opaque model file: a logistic model as JSON weights over the extracted
/// feature names, trained offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlModel {
    pub bias: f64,
    pub weights: BTreeMap<String, f64>,
}

impl MlModel {
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&data).map_err(|e| e.to_string())
    }
}

/// A prediction near the decision boundary, queued for human labeling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub domain: String,
    pub seed: String,
    pub probability: f64,
    pub confidence: f64,
    pub reason: String,
    pub selected_at: DateTime<Utc>,
}

pub struct MlHook {
    model: MlModel,
    confidence_threshold: f64,
    active_learning: bool,
    uncertainty_threshold: f64,
    review_budget: usize,
    review_pool: Mutex<Vec<ReviewCandidate>>,
}

impl MlHook {
    /// Records are scored in batches of at most this many.
    pub const BATCH_SIZE: usize = 256;

    /// Build the hook from config; any problem (disabled, missing model,
    /// unparseable weights) disables ML for the run rather than failing it.
    pub fn load(config: &AppConfig) -> Option<Self> {
        if !config.enable_ml {
            return None;
        }
        let path = config.ml_model_path.as_deref()?;
        let model = match MlModel::load(path) {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!("ml model unavailable ({err}), ml disabled for this run");
                return None;
            }
        };
        Some(Self {
            model,
            confidence_threshold: config.ml_confidence_threshold,
            active_learning: config.ml_enable_active_learning,
            uncertainty_threshold: config.ml_uncertainty_threshold,
            review_budget: config.ml_review_budget,
            review_pool: Mutex::new(Vec::new()),
        })
    }

    #[cfg(test)]
    pub fn for_tests(model: MlModel, uncertainty_threshold: f64, review_budget: usize) -> Self {
        Self {
            model,
            confidence_threshold: 0.7,
            active_learning: true,
            uncertainty_threshold,
            review_budget,
            review_pool: Mutex::new(Vec::new()),
        }
    }

    pub async fn score_batch(&self, seed: &str, records: &mut [PermutationRecord]) {
        for record in records.iter_mut() {
            match self.score(seed, record) {
                Ok((assessment, probability)) => {
                    if self.active_learning {
                        self.consider_for_review(seed, &record.domain, probability, &assessment)
                            .await;
                    }
                    record.ml = Some(assessment);
                }
                Err(err) => {
                    tracing::warn!("ml scoring failed for {}: {err}", record.domain);
                    record.ml = None;
                }
            }
        }
    }

    fn score(
        &self,
        seed: &str,
        record: &PermutationRecord,
    ) -> Result<(MlAssessment, f64), String> {
        let features = extract_features(seed, record);
        let mut activation = self.model.bias;
        let mut contributions: Vec<(&str, f64)> = Vec::new();
        for (name, value) in &features {
            if let Some(weight) = self.model.weights.get(*name) {
                let contribution = weight * value;
                activation += contribution;
                contributions.push((*name, contribution));
            }
        }
        let probability = sigmoid(activation);
        if !probability.is_finite() {
            return Err(format!("non-finite probability from model ({activation})"));
        }

        contributions.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        let explanation = if contributions.is_empty() {
            "no model features matched".to_string()
        } else {
            let top: Vec<String> = contributions
                .iter()
                .take(3)
                .map(|(name, c)| format!("{name}{}{:.2}", if *c >= 0.0 { "+" } else { "" }, c))
                .collect();
            format!("top signals: {}", top.join(", "))
        };

        let confidence = (probability - 0.5).abs() * 2.0;
        let assessment = MlAssessment {
            risk: (probability * 100.0).round().clamp(0.0, 100.0) as u8,
            confidence,
            verdict: if probability >= 0.5 {
                MlVerdict::Typosquat
            } else {
                MlVerdict::Legitimate
            },
            needs_review: confidence < self.confidence_threshold,
            explanation,
        };
        Ok((assessment, probability))
    }

    async fn consider_for_review(
        &self,
        seed: &str,
        domain: &str,
        probability: f64,
        assessment: &MlAssessment,
    ) {
        let lo = 0.5 - self.uncertainty_threshold;
        let hi = 0.5 + self.uncertainty_threshold;
        if probability < lo || probability > hi {
            return;
        }
        let mut pool = self.review_pool.lock().await;
        pool.push(ReviewCandidate {
            domain: domain.to_string(),
            seed: seed.to_string(),
            probability,
            confidence: assessment.confidence,
            reason: format!(
                "prediction {probability:.3} within uncertainty band [{lo:.3}, {hi:.3}]"
            ),
            selected_at: now_utc(),
        });
    }

    /// Drain the accumulated uncertain predictions, keeping the ones
    /// closest to the decision boundary up to the review budget.
    pub async fn select_for_review(&self) -> Vec<ReviewCandidate> {
        let mut pool = std::mem::take(&mut *self.review_pool.lock().await);
        pool.sort_by(|a, b| {
            (a.probability - 0.5)
                .abs()
                .total_cmp(&(b.probability - 0.5).abs())
                .then_with(|| a.domain.cmp(&b.domain))
        });
        pool.truncate(self.review_budget);
        pool
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Feature extraction over the assembled record. Purely derived from record
/// fields, so predictions are reproducible.
fn extract_features(seed: &str, record: &PermutationRecord) -> Vec<(&'static str, f64)> {
    let seed_label = seed.split('.').next().unwrap_or(seed);
    let label = record.domain.split('.').next().unwrap_or(&record.domain);

    let mut features: Vec<(&'static str, f64)> = vec![
        ("label_len", label.len() as f64),
        (
            "edit_distance",
            strsim::levenshtein(seed_label, label) as f64,
        ),
        (
            "digit_count",
            label.chars().filter(|c| c.is_ascii_digit()).count() as f64,
        ),
        (
            "hyphen_count",
            label.chars().filter(|c| *c == '-').count() as f64,
        ),
        ("entropy", shannon_entropy(label)),
        ("risk_score", f64::from(record.risk_score) / 100.0),
        ("has_mx", flag(!record.dns.mx.is_empty())),
        (
            "is_punycode",
            flag(record.domain.split('.').any(|l| l.starts_with("xn--"))),
        ),
    ];
    match record.fuzzer.as_str() {
        "homoglyph" | "idn-homograph" => features.push(("fuzzer_visual", 1.0)),
        "combo" | "subdomain" => features.push(("fuzzer_structural", 1.0)),
        _ => {}
    }
    if let Some(urlscan) = &record.threat_intel.urlscan {
        features.push((
            "urlscan_malicious",
            flag(urlscan.verdict == UrlscanVerdict::Malicious),
        ));
    }
    if let Some(ct) = &record.threat_intel.certificate_transparency {
        features.push(("ct_count", (ct.count as f64).min(50.0)));
    }
    if let Some(probe) = &record.threat_intel.http_probe {
        features.push(("http_active", flag(probe.active)));
    }
    features
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut counts: BTreeMap<char, f64> = BTreeMap::new();
    for c in s.chars() {
        *counts.entry(c).or_default() += 1.0;
    }
    let len = s.chars().count() as f64;
    counts
        .values()
        .map(|count| {
            let p = count / len;
            -p * p.log2()
        })
        .sum()
}
