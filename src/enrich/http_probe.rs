use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Method, StatusCode};

use crate::core::record::HttpProbeResult;

const MAX_REDIRECTS: u32 = 5;

/// Liveness probe: HEAD (falling back to GET) against https:// then
/// http://, following up to five redirects by hand so the chain length is
/// observable. Response bodies are never read.
pub struct HttpProber {
    http: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .user_agent(concat!("typo-sniper/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    pub async fn probe(&self, domain: &str) -> HttpProbeResult {
        for scheme in ["https", "http"] {
            let url = format!("{scheme}://{domain}/");
            for method in [Method::HEAD, Method::GET] {
                if let Some(result) = self.follow(method, &url).await {
                    return result;
                }
            }
        }
        HttpProbeResult::default()
    }

    async fn follow(&self, method: Method, start_url: &str) -> Option<HttpProbeResult> {
        let mut url = start_url.to_string();
        let mut chain_length = 0u32;
        loop {
            let response = self.http.request(method.clone(), &url).send().await.ok()?;
            let status = response.status();
            if status.is_redirection() && chain_length < MAX_REDIRECTS {
                let Some(next) = next_location(&response, &url) else {
                    return Some(finish(status, url, chain_length));
                };
                chain_length += 1;
                url = next;
                continue;
            }
            // HEAD is not universally supported; let the GET pass retry
            if method == Method::HEAD
                && matches!(
                    status,
                    StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                )
            {
                return None;
            }
            return Some(finish(status, url, chain_length));
        }
    }
}

fn next_location(response: &reqwest::Response, current: &str) -> Option<String> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    if location.starts_with("http://") || location.starts_with("https://") {
        Some(location.to_string())
    } else {
        let base = reqwest::Url::parse(current).ok()?;
        base.join(location).ok().map(|u| u.to_string())
    }
}

fn finish(status: StatusCode, final_url: String, chain_length: u32) -> HttpProbeResult {
    HttpProbeResult {
        status_code: Some(status.as_u16()),
        active: (200..400).contains(&status.as_u16()),
        final_url,
        chain_length,
    }
}
