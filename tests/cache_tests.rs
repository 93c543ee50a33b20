use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use typo_sniper::core::cache::Cache;
use typo_sniper::core::hash::sha256_hex;
use typo_sniper::core::record::WhoisSummary;

fn temp_cache_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ts_cache_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn round_trip_within_ttl() {
    let dir = temp_cache_dir("roundtrip");
    let cache = Cache::new(&dir, true).unwrap();
    let value = WhoisSummary {
        raw_ok: true,
        registrar: Some("Registrar".into()),
        ..WhoisSummary::default()
    };
    cache
        .put("whois", "xample.com", &value, Duration::from_secs(3600))
        .unwrap();
    let hit: WhoisSummary = cache.get("whois", "xample.com").unwrap();
    assert_eq!(hit, value);
}

#[test]
fn expired_entries_miss_on_read() {
    let dir = temp_cache_dir("expiry");
    let cache = Cache::new(&dir, true).unwrap();
    cache
        .put("whois", "xample.com", &"payload", Duration::from_secs(1))
        .unwrap();
    assert_eq!(
        cache.get::<String>("whois", "xample.com").as_deref(),
        Some("payload")
    );
    std::thread::sleep(Duration::from_millis(2100));
    assert!(cache.get::<String>("whois", "xample.com").is_none());
}

#[test]
fn on_disk_layout_is_namespace_shard_digest() {
    let dir = temp_cache_dir("layout");
    let cache = Cache::new(&dir, true).unwrap();
    cache
        .put("whois", "xample.com", &1u32, Duration::from_secs(60))
        .unwrap();
    let digest = sha256_hex(b"xample.com");
    let expected = dir
        .join("whois")
        .join(&digest[..2])
        .join(format!("{digest}.entry"));
    assert!(expected.exists(), "missing {}", expected.display());
    // atomic write leaves no temp file behind
    assert!(!expected.with_extension("tmp").exists());
}

#[test]
fn clear_expired_and_stats_agree() {
    let dir = temp_cache_dir("sweep");
    let cache = Cache::new(&dir, true).unwrap();
    cache
        .put("whois", "fresh.com", &1u32, Duration::from_secs(3600))
        .unwrap();
    cache
        .put("whois", "stale.com", &2u32, Duration::from_secs(1))
        .unwrap();
    std::thread::sleep(Duration::from_millis(2100));

    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.valid_entries, 1);
    assert_eq!(stats.expired_entries, 1);

    assert_eq!(cache.clear_expired().unwrap(), 1);
    let stats = cache.get_stats().unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.expired_entries, 0);
}

#[test]
fn disabled_cache_never_hits() {
    let dir = temp_cache_dir("disabled");
    let cache = Cache::new(&dir, false).unwrap();
    cache
        .put("whois", "xample.com", &1u32, Duration::from_secs(60))
        .unwrap();
    assert!(cache.get::<u32>("whois", "xample.com").is_none());
    assert!(!dir.exists());
}

#[tokio::test]
async fn lock_key_serializes_fetchers_of_one_key() {
    let dir = temp_cache_dir("singleflight");
    let cache = Arc::new(Cache::new(&dir, true).unwrap());

    let guard = cache.lock_key("whois", "xample.com").await;
    let contender = {
        let cache = cache.clone();
        tokio::spawn(async move {
            let _guard = cache.lock_key("whois", "xample.com").await;
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!contender.is_finished(), "second fetcher ran concurrently");
    drop(guard);
    contender.await.unwrap();

    // a different key is not serialized against the first
    let _guard = cache.lock_key("whois", "other.com").await;
    let other = {
        let cache = cache.clone();
        tokio::spawn(async move {
            let _guard = cache.lock_key("ct", "xample.com").await;
        })
    };
    tokio::time::timeout(Duration::from_secs(1), other)
        .await
        .expect("independent key blocked")
        .unwrap();
}
