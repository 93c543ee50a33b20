use std::collections::HashSet;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::flags::{Cli, OutputFormatArg};
use crate::config::AppConfig;
use crate::core::cache::Cache;
use crate::core::error::SniperError;
use crate::core::record::ScanReport;
use crate::core::secrets::SecretResolver;
use crate::permute::normalize_seed;
use crate::report::{self, OutputFormat};
use crate::scan::Scanner;

pub async fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose, cli.debug);
    match run_inner(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("fatal: {err}");
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    // secrets resolve once; the resulting config is immutable from here on
    let resolver = SecretResolver::new(config.secret_fields());
    config.urlscan_api_key = resolver.resolve("urlscan_api_key").await;
    config.validate()?;

    let seeds = load_seeds(&cli.input)?;
    tracing::info!("loaded {} seeds from {}", seeds.len(), cli.input.display());

    let cache = Arc::new(Cache::new(&config.cache_dir, config.use_cache)?);
    match cache.clear_expired() {
        Ok(0) => {}
        Ok(removed) => tracing::debug!("evicted {removed} expired cache entries"),
        Err(err) => tracing::warn!("cache sweep failed: {err}"),
    }

    let formats = resolve_formats(&cli.format);
    let config = Arc::new(config);
    let scanner = Scanner::new(config.clone(), cache)?;
    let report = scanner.scan(&seeds).await;

    let mut written = report::export(&report, &formats, &config.output_dir)
        .with_context(|| format!("writing reports to {}", config.output_dir.display()))?;
    if config.ml_enable_active_learning {
        let queue = scanner.take_review_queue().await;
        if !queue.is_empty() {
            written.push(report::write_review_queue(&queue, &config.output_dir)?);
        }
    }

    print_summary(&report, &written);

    if report.any_seed_failed() {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let default_filter = if debug {
        "typo_sniper=debug"
    } else if verbose {
        "typo_sniper=info"
    } else {
        "typo_sniper=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(months) = cli.months {
        config.months_filter = months;
    }
    if let Some(max_workers) = cli.max_workers {
        config.max_workers = max_workers;
    }
    if let Some(cache_ttl) = cli.cache_ttl {
        config.cache_ttl = cache_ttl;
    }
    if cli.no_cache {
        config.use_cache = false;
    }
    if cli.ml {
        config.enable_ml = true;
    }
    if let Some(model) = &cli.ml_model {
        config.ml_model_path = Some(model.clone());
    }
    if let Some(budget) = cli.ml_review {
        config.ml_review_budget = budget;
    }
    config.debug_mode = cli.debug;
}

fn resolve_formats(args: &[OutputFormatArg]) -> Vec<OutputFormat> {
    if args.is_empty() {
        return vec![OutputFormat::Excel];
    }
    let mut seen = HashSet::new();
    args.iter()
        .copied()
        .map(OutputFormat::from)
        .filter(|f| seen.insert(*f))
        .collect()
}

/// Load seeds: skip blank and comment lines, lower-case and punycode each
/// entry, drop invalid domains with a warning, collapse duplicates while
/// preserving input order. No valid seeds is fatal.
fn load_seeds(path: &Path) -> Result<Vec<String>, SniperError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| SniperError::Input(format!("cannot read {}: {e}", path.display())))?;
    let mut seeds = Vec::new();
    let mut seen = HashSet::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match normalize_seed(line) {
            Some(seed) => {
                if seen.insert(seed.clone()) {
                    seeds.push(seed);
                }
            }
            None => tracing::warn!("skipping invalid seed: {line}"),
        }
    }
    if seeds.is_empty() {
        return Err(SniperError::Input(format!(
            "no valid seeds in {}",
            path.display()
        )));
    }
    Ok(seeds)
}

fn print_summary(report: &ScanReport, written: &[std::path::PathBuf]) {
    println!();
    println!("Scan summary");
    println!("  seeds attempted:  {}", report.meta.seeds.len());
    println!("  records emitted:  {}", report.records_emitted());
    for scan in &report.results {
        println!(
            "    {:<32} {} candidates, {} registered, {} emitted",
            scan.seed,
            scan.total_candidates,
            scan.registered_count,
            scan.records.len()
        );
    }
    if report.degraded.is_empty() {
        println!("  degraded enrichers: none");
    } else {
        println!("  degraded enrichers:");
        for (enricher, count) in &report.degraded {
            println!("    {enricher}: {count} lookups");
        }
    }
    for path in written {
        println!("  wrote {}", path.display());
    }
}
