//! Enrichment clients. Each is independent: one enricher failing never
//! affects the others, and a failed lookup surfaces as a None field on the
//! record rather than an error.

pub mod ct;
pub mod dns;
pub mod http_probe;
pub mod risk;
pub mod urlscan;
pub mod whois;
