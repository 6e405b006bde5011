use cachewright::{Cache, CacheConfig, Outcome};
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn a_bounded_cache_evicts_down_to_max_size_minus_the_reclaim_fraction() {
    // max_size=3, reclaim_fraction=1/3 => target = 3 - floor(3 * 1/3) = 2.
    let config: CacheConfig<String, String> =
        CacheConfig::new("it-eviction-lrw").with_limit(3, 1.0 / 3.0);
    let cache = Cache::new(config).unwrap();

    for k in ["a", "b", "c"] {
        cache.put(k.to_string(), "v".to_string(), None).unwrap();
        std::thread::sleep(Duration::from_millis(2));
    }
    cache.put("d".to_string(), "v".to_string(), None).unwrap();

    assert_eq!(cache.size().unwrap(), Outcome::Ok(2));
    for k in ["a", "b"] {
        assert_eq!(cache.get(&k.to_string()).unwrap(), Outcome::Missing);
    }
    for k in ["c", "d"] {
        assert!(cache.get(&k.to_string()).unwrap().is_ok());
    }
}

#[test]
#[serial]
fn enforcement_reclaims_expired_entries_before_evicting_live_ones() {
    let config: CacheConfig<String, String> = CacheConfig::new("it-eviction-reclaim-expired")
        .with_limit(2, 0.5)
        .with_lazy_expiration(true);
    let cache = Cache::new(config).unwrap();

    cache.put("a".to_string(), "v".to_string(), Some(10)).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    cache.put("b".to_string(), "v".to_string(), None).unwrap();
    // Pushing past the limit should reclaim the already-expired "a" instead
    // of evicting the live "b".
    cache.put("c".to_string(), "v".to_string(), None).unwrap();

    assert_eq!(cache.get(&"b".to_string()).unwrap(), Outcome::Ok("v".to_string()));
    assert_eq!(cache.get(&"c".to_string()).unwrap(), Outcome::Ok("v".to_string()));
}

#[test]
#[serial]
fn a_cache_with_no_limit_never_evicts() {
    let cache = Cache::<String, i32>::new(CacheConfig::new("it-eviction-unbounded")).unwrap();
    for i in 0..50 {
        cache.put(format!("k{i}"), i, None).unwrap();
    }
    assert_eq!(cache.size().unwrap(), Outcome::Ok(50));
}
