use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;

use crate::core::error::SniperError;
use crate::core::record::DnsRecords;
use crate::core::retry::RetryPolicy;

const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Registration decision for one candidate. `degraded` marks an
/// unregistered verdict reached only because every query kept failing
/// transiently; the scanner counts those toward the partial-results exit
/// code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsResolution {
    Registered(DnsRecords),
    Unregistered { degraded: bool },
}

/// Queries A, AAAA, MX and NS; a candidate counts as registered when any of
/// the four answers is non-empty. Transient resolver errors are retried
/// with backoff; exhaustion demotes the record type to an empty answer with
/// a warning, never a fatal error.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    retry: RetryPolicy,
}

impl DnsResolver {
    pub fn new(retry_count: u32) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = DNS_TIMEOUT;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
            retry: RetryPolicy::new(DNS_TIMEOUT, retry_count + 1, Duration::from_millis(500)),
        }
    }

    pub async fn resolve(&self, domain: &str) -> DnsResolution {
        let fqdn = format!("{domain}.");
        let (a, aaaa, mx, ns) = tokio::join!(
            self.query(&fqdn, RecordKind::A),
            self.query(&fqdn, RecordKind::Aaaa),
            self.query(&fqdn, RecordKind::Mx),
            self.query(&fqdn, RecordKind::Ns),
        );
        let (a, a_failed) = settle(domain, "A", a);
        let (aaaa, aaaa_failed) = settle(domain, "AAAA", aaaa);
        let (mx, mx_failed) = settle(domain, "MX", mx);
        let (ns, ns_failed) = settle(domain, "NS", ns);
        let records = DnsRecords { a, aaaa, mx, ns };
        if records.any() {
            DnsResolution::Registered(records)
        } else {
            DnsResolution::Unregistered {
                degraded: a_failed && aaaa_failed && mx_failed && ns_failed,
            }
        }
    }

    async fn query(&self, fqdn: &str, kind: RecordKind) -> Result<Vec<String>, SniperError> {
        self.retry
            .run(kind.name(), || async {
                let result = match kind {
                    RecordKind::A => self
                        .resolver
                        .ipv4_lookup(fqdn)
                        .await
                        .map(|lookup| lookup.iter().map(|a| a.0.to_string()).collect()),
                    RecordKind::Aaaa => self
                        .resolver
                        .ipv6_lookup(fqdn)
                        .await
                        .map(|lookup| lookup.iter().map(|aaaa| aaaa.0.to_string()).collect()),
                    RecordKind::Mx => self.resolver.mx_lookup(fqdn).await.map(|lookup| {
                        let mut pairs: Vec<(u16, String)> = lookup
                            .iter()
                            .map(|mx| (mx.preference(), trim_root(&mx.exchange().to_string())))
                            .collect();
                        pairs.sort();
                        pairs.into_iter().map(|(_, name)| name).collect()
                    }),
                    RecordKind::Ns => self.resolver.ns_lookup(fqdn).await.map(|lookup| {
                        let mut names: Vec<String> =
                            lookup.iter().map(|ns| trim_root(&ns.0.to_string())).collect();
                        names.sort();
                        names
                    }),
                };
                match result {
                    Ok(mut values) => {
                        if matches!(kind, RecordKind::A | RecordKind::Aaaa) {
                            values.sort();
                        }
                        Ok(values)
                    }
                    Err(err) => Err(classify(err)),
                }
            })
            .await
    }
}

#[derive(Debug, Clone, Copy)]
enum RecordKind {
    A,
    Aaaa,
    Mx,
    Ns,
}

impl RecordKind {
    fn name(&self) -> &'static str {
        match self {
            RecordKind::A => "dns-a",
            RecordKind::Aaaa => "dns-aaaa",
            RecordKind::Mx => "dns-mx",
            RecordKind::Ns => "dns-ns",
        }
    }
}

/// NXDOMAIN and authoritative empty answers are a definitive "no records";
/// anything else is transient.
fn classify(err: ResolveError) -> SniperError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => SniperError::EnrichmentMiss("empty".into()),
        ResolveErrorKind::Timeout => SniperError::Timeout,
        other => SniperError::TransientNet(other.to_string()),
    }
}

fn settle(
    domain: &str,
    kind: &str,
    outcome: Result<Vec<String>, SniperError>,
) -> (Vec<String>, bool) {
    match outcome {
        Ok(values) => (values, false),
        Err(SniperError::EnrichmentMiss(_)) => (Vec::new(), false),
        Err(err) => {
            tracing::warn!("{kind} lookup for {domain} failed after retries: {err}");
            (Vec::new(), true)
        }
    }
}

fn trim_root(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}
