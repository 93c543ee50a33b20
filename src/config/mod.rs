use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::SniperError;

/// Three-valued switch for enrichers that can self-enable when a credential
/// resolves. Accepts YAML `true`/`false` or the string `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    On,
    Off,
    #[default]
    Auto,
}

impl<'de> Deserialize<'de> for Toggle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ToggleVisitor;

        impl Visitor<'_> for ToggleVisitor {
            type Value = Toggle;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a boolean or one of \"on\", \"off\", \"auto\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Toggle, E> {
                Ok(if v { Toggle::On } else { Toggle::Off })
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Toggle, E> {
                match v.to_lowercase().as_str() {
                    "on" | "true" | "force_on" => Ok(Toggle::On),
                    "off" | "false" | "force_off" => Ok(Toggle::Off),
                    "auto" => Ok(Toggle::Auto),
                    other => Err(E::custom(format!("invalid toggle value: {other}"))),
                }
            }
        }

        deserializer.deserialize_any(ToggleVisitor)
    }
}

impl FromStr for Toggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" | "true" | "force_on" => Ok(Toggle::On),
            "off" | "false" | "force_off" => Ok(Toggle::Off),
            "auto" => Ok(Toggle::Auto),
            other => Err(format!("invalid toggle value: {other}")),
        }
    }
}

/// Immutable run configuration: YAML file, overlaid by `TYPO_SNIPER_*`
/// environment variables, overlaid by CLI flags (CLI wins). Secrets are
/// resolved once at build time and stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_workers: usize,
    pub rate_limit_delay: f64,

    pub use_cache: bool,
    pub cache_dir: PathBuf,
    pub cache_ttl: u64,

    pub months_filter: u32,
    pub output_dir: PathBuf,

    pub whois_timeout: u64,
    pub whois_retry_count: u32,
    pub whois_retry_delay: u64,
    pub dns_retry_count: u32,

    pub enable_combosquatting: bool,
    pub enable_soundalike: bool,
    pub enable_idn_homograph: bool,

    pub enable_urlscan: Toggle,
    pub urlscan_api_key: Option<String>,
    pub urlscan_max_age_days: u32,
    pub urlscan_wait_timeout: u64,
    pub urlscan_visibility: String,
    pub urlscan_submit_interval: f64,

    pub enable_certificate_transparency: bool,
    pub enable_http_probe: bool,
    pub http_timeout: u64,

    pub enable_risk_scoring: bool,

    pub enable_ml: bool,
    pub ml_model_path: Option<PathBuf>,
    pub ml_confidence_threshold: f64,
    pub ml_enable_active_learning: bool,
    pub ml_uncertainty_threshold: f64,
    pub ml_review_budget: usize,

    /// Global scan deadline in seconds; 0 disables it.
    pub scan_deadline_secs: u64,

    pub whois_concurrency: usize,
    pub urlscan_concurrency: usize,
    pub ct_concurrency: usize,
    pub http_concurrency: usize,

    #[serde(skip)]
    pub debug_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            rate_limit_delay: 1.0,
            use_cache: true,
            cache_dir: default_cache_dir(),
            cache_ttl: 86_400,
            months_filter: 0,
            output_dir: PathBuf::from("results"),
            whois_timeout: 30,
            whois_retry_count: 3,
            whois_retry_delay: 5,
            dns_retry_count: 2,
            enable_combosquatting: false,
            enable_soundalike: false,
            enable_idn_homograph: false,
            enable_urlscan: Toggle::Auto,
            urlscan_api_key: None,
            urlscan_max_age_days: 7,
            urlscan_wait_timeout: 90,
            urlscan_visibility: "public".to_string(),
            urlscan_submit_interval: 1.0,
            enable_certificate_transparency: false,
            enable_http_probe: false,
            http_timeout: 10,
            enable_risk_scoring: true,
            enable_ml: false,
            ml_model_path: None,
            ml_confidence_threshold: 0.7,
            ml_enable_active_learning: false,
            ml_uncertainty_threshold: 0.15,
            ml_review_budget: 100,
            scan_deadline_secs: 0,
            whois_concurrency: 8,
            urlscan_concurrency: 4,
            ct_concurrency: 10,
            http_concurrency: 20,
            debug_mode: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".typo-sniper").join("cache"))
        .unwrap_or_else(|| PathBuf::from(".typo-sniper/cache"))
}

impl AppConfig {
    /// Load the YAML config file, falling back to defaults when no path is
    /// given. A path that does not exist is a fatal configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self, SniperError> {
        let mut cfg = match path {
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|e| {
                    SniperError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_yaml::from_str(&data)
                    .map_err(|e| SniperError::Config(format!("{}: {e}", path.display())))?
            }
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Overlay `TYPO_SNIPER_<KEY>` environment variables onto file values.
    pub fn apply_env(&mut self) {
        overlay(&mut self.max_workers, "TYPO_SNIPER_MAX_WORKERS");
        overlay(&mut self.rate_limit_delay, "TYPO_SNIPER_RATE_LIMIT_DELAY");
        overlay(&mut self.use_cache, "TYPO_SNIPER_USE_CACHE");
        overlay_path(&mut self.cache_dir, "TYPO_SNIPER_CACHE_DIR");
        overlay(&mut self.cache_ttl, "TYPO_SNIPER_CACHE_TTL");
        overlay(&mut self.months_filter, "TYPO_SNIPER_MONTHS_FILTER");
        overlay_path(&mut self.output_dir, "TYPO_SNIPER_OUTPUT_DIR");
        overlay(&mut self.whois_timeout, "TYPO_SNIPER_WHOIS_TIMEOUT");
        overlay(&mut self.whois_retry_count, "TYPO_SNIPER_WHOIS_RETRY_COUNT");
        overlay(&mut self.whois_retry_delay, "TYPO_SNIPER_WHOIS_RETRY_DELAY");
        overlay(&mut self.dns_retry_count, "TYPO_SNIPER_DNS_RETRY_COUNT");
        overlay(
            &mut self.enable_combosquatting,
            "TYPO_SNIPER_ENABLE_COMBOSQUATTING",
        );
        overlay(&mut self.enable_soundalike, "TYPO_SNIPER_ENABLE_SOUNDALIKE");
        overlay(
            &mut self.enable_idn_homograph,
            "TYPO_SNIPER_ENABLE_IDN_HOMOGRAPH",
        );
        overlay(&mut self.enable_urlscan, "TYPO_SNIPER_ENABLE_URLSCAN");
        overlay(
            &mut self.urlscan_max_age_days,
            "TYPO_SNIPER_URLSCAN_MAX_AGE_DAYS",
        );
        overlay(
            &mut self.urlscan_wait_timeout,
            "TYPO_SNIPER_URLSCAN_WAIT_TIMEOUT",
        );
        overlay_string(
            &mut self.urlscan_visibility,
            "TYPO_SNIPER_URLSCAN_VISIBILITY",
        );
        overlay(
            &mut self.enable_certificate_transparency,
            "TYPO_SNIPER_ENABLE_CERTIFICATE_TRANSPARENCY",
        );
        overlay(
            &mut self.enable_http_probe,
            "TYPO_SNIPER_ENABLE_HTTP_PROBE",
        );
        overlay(&mut self.http_timeout, "TYPO_SNIPER_HTTP_TIMEOUT");
        overlay(
            &mut self.enable_risk_scoring,
            "TYPO_SNIPER_ENABLE_RISK_SCORING",
        );
        overlay(&mut self.enable_ml, "TYPO_SNIPER_ENABLE_ML");
        overlay(
            &mut self.ml_confidence_threshold,
            "TYPO_SNIPER_ML_CONFIDENCE_THRESHOLD",
        );
        overlay(
            &mut self.ml_enable_active_learning,
            "TYPO_SNIPER_ML_ENABLE_ACTIVE_LEARNING",
        );
        overlay(
            &mut self.ml_uncertainty_threshold,
            "TYPO_SNIPER_ML_UNCERTAINTY_THRESHOLD",
        );
        overlay(&mut self.ml_review_budget, "TYPO_SNIPER_ML_REVIEW_BUDGET");
        overlay(
            &mut self.scan_deadline_secs,
            "TYPO_SNIPER_SCAN_DEADLINE_SECS",
        );
    }

    pub fn validate(&self) -> Result<(), SniperError> {
        if self.max_workers == 0 {
            return Err(SniperError::Config("max_workers must be >= 1".into()));
        }
        if self.rate_limit_delay < 0.0 {
            return Err(SniperError::Config("rate_limit_delay must be >= 0".into()));
        }
        if !matches!(
            self.urlscan_visibility.as_str(),
            "public" | "unlisted" | "private"
        ) {
            return Err(SniperError::Config(format!(
                "urlscan_visibility must be public, unlisted or private (got {})",
                self.urlscan_visibility
            )));
        }
        if self.enable_ml && self.ml_model_path.is_none() {
            return Err(SniperError::Config(
                "enable_ml requires ml_model_path".into(),
            ));
        }
        Ok(())
    }

    /// Whether URLScan runs: forced on/off by config, else auto-enabled iff
    /// a key was resolved.
    pub fn urlscan_enabled(&self) -> bool {
        match self.enable_urlscan {
            Toggle::On => true,
            Toggle::Off => false,
            Toggle::Auto => self
                .urlscan_api_key
                .as_deref()
                .is_some_and(|k| !k.is_empty()),
        }
    }

    pub fn deadline(&self) -> Option<tokio::time::Instant> {
        if self.scan_deadline_secs == 0 {
            None
        } else {
            Some(tokio::time::Instant::now() + Duration::from_secs(self.scan_deadline_secs))
        }
    }

    /// Longest enabled enricher timeout, scaled 1.5x; bounds one candidate's
    /// Phase B.
    pub fn per_candidate_deadline(&self) -> Duration {
        let mut longest = self.whois_timeout;
        if self.urlscan_enabled() {
            longest = longest.max(self.urlscan_wait_timeout);
        }
        if self.enable_certificate_transparency {
            longest = longest.max(15);
        }
        if self.enable_http_probe {
            longest = longest.max(self.http_timeout);
        }
        Duration::from_secs(longest).mul_f64(1.5)
    }

    /// Feature list recorded in ScanMeta.
    pub fn enabled_features(&self) -> Vec<String> {
        let mut features = Vec::new();
        if self.enable_combosquatting {
            features.push("combosquatting".to_string());
        }
        if self.enable_soundalike {
            features.push("soundalike".to_string());
        }
        if self.enable_idn_homograph {
            features.push("idn-homograph".to_string());
        }
        if self.urlscan_enabled() {
            features.push("urlscan".to_string());
        }
        if self.enable_certificate_transparency {
            features.push("certificate-transparency".to_string());
        }
        if self.enable_http_probe {
            features.push("http-probe".to_string());
        }
        if self.enable_risk_scoring {
            features.push("risk-scoring".to_string());
        }
        if self.enable_ml {
            features.push("ml".to_string());
        }
        features
    }

    /// Config-file fields the secret resolver may fall back to.
    pub fn secret_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        if let Some(key) = &self.urlscan_api_key {
            fields.insert("urlscan_api_key".to_string(), key.clone());
        }
        fields
    }
}

fn overlay<T: FromStr>(slot: &mut T, key: &str) {
    if let Ok(raw) = std::env::var(key) {
        if let Ok(value) = raw.trim().parse() {
            *slot = value;
        } else {
            tracing::warn!("ignoring unparseable env override {key}={raw}");
        }
    }
}

fn overlay_string(slot: &mut String, key: &str) {
    if let Ok(raw) = std::env::var(key) {
        if !raw.is_empty() {
            *slot = raw;
        }
    }
}

fn overlay_path(slot: &mut PathBuf, key: &str) {
    if let Ok(raw) = std::env::var(key) {
        if !raw.is_empty() {
            *slot = PathBuf::from(raw);
        }
    }
}
