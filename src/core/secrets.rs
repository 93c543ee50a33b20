use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::Mutex;

/// Resolves a named credential by walking a fixed source chain and returning
/// the first non-empty value:
///
/// 1. `TYPO_SNIPER_<NAME>` environment variable
/// 2. Doppler API, when `DOPPLER_TOKEN` is set
/// 3. AWS Secrets Manager JSON field, when `AWS_SECRET_NAME` is set
/// 4. unprefixed `<NAME>` environment variable
/// 5. the config-file field registered at construction
///
/// Every failure is silent; enrichers check for an empty result before
/// enabling themselves.
pub struct SecretResolver {
    config_fields: BTreeMap<String, String>,
    http: reqwest::Client,
    aws_secrets: Mutex<Option<BTreeMap<String, String>>>,
    doppler_secrets: Mutex<Option<BTreeMap<String, String>>>,
}

impl SecretResolver {
    pub fn new(config_fields: BTreeMap<String, String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            config_fields,
            http,
            aws_secrets: Mutex::new(None),
            doppler_secrets: Mutex::new(None),
        }
    }

    pub async fn resolve(&self, name: &str) -> Option<String> {
        let upper = name.to_uppercase();

        if let Some(value) = non_empty_env(&format!("TYPO_SNIPER_{upper}")) {
            return Some(value);
        }

        if let Some(token) = non_empty_env("DOPPLER_TOKEN") {
            if let Some(value) = self.from_doppler(&token, &upper).await {
                return Some(value);
            }
        }

        if let Some(secret_name) = non_empty_env("AWS_SECRET_NAME") {
            if let Some(value) = self.from_aws(&secret_name, name).await {
                return Some(value);
            }
        }

        if let Some(value) = non_empty_env(&upper) {
            return Some(value);
        }

        self.config_fields
            .get(&name.to_lowercase())
            .filter(|v| !v.is_empty())
            .cloned()
    }

    async fn from_doppler(&self, token: &str, upper_name: &str) -> Option<String> {
        let mut cached = self.doppler_secrets.lock().await;
        if cached.is_none() {
            *cached = Some(self.fetch_doppler(token).await.unwrap_or_default());
        }
        cached
            .as_ref()?
            .get(upper_name)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    async fn fetch_doppler(&self, token: &str) -> Option<BTreeMap<String, String>> {
        let response = self
            .http
            .get("https://api.doppler.com/v3/configs/config/secrets/download?format=json")
            .bearer_auth(token)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::debug!("doppler secrets download returned {}", response.status());
            return None;
        }
        response.json::<BTreeMap<String, String>>().await.ok()
    }

    async fn from_aws(&self, secret_name: &str, name: &str) -> Option<String> {
        let mut cached = self.aws_secrets.lock().await;
        if cached.is_none() {
            *cached = Some(fetch_aws_secret(secret_name).await.unwrap_or_default());
        }
        let map = cached.as_ref()?;
        map.get(&name.to_lowercase())
            .or_else(|| map.get(&name.to_uppercase()))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

async fn fetch_aws_secret(secret_name: &str) -> Option<BTreeMap<String, String>> {
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let client = aws_sdk_secretsmanager::Client::new(&config);
    let output = client
        .get_secret_value()
        .secret_id(secret_name)
        .send()
        .await
        .map_err(|err| tracing::debug!("aws secret fetch failed for {secret_name}: {err}"))
        .ok()?;
    let raw = output.secret_string()?;
    serde_json::from_str::<BTreeMap<String, serde_json::Value>>(raw)
        .ok()
        .map(|map| {
            map.into_iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, value)
                })
                .collect()
        })
}
