use cachewright::{Cache, CacheConfig, Outcome};
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn expired_entry_reads_as_missing_and_is_deleted_on_read() {
    let cache = Cache::<String, String>::new(CacheConfig::new("it-lazy-expiration")).unwrap();

    cache.put("a".to_string(), "v".to_string(), Some(100)).unwrap();
    std::thread::sleep(Duration::from_millis(150));

    assert_eq!(cache.get(&"a".to_string()).unwrap(), Outcome::Missing);
    assert_eq!(cache.size().unwrap(), Outcome::Ok(0));
}

#[test]
#[serial]
fn entries_with_no_expiration_survive_indefinitely() {
    let cache = Cache::<String, String>::new(CacheConfig::new("it-lazy-expiration-none")).unwrap();
    cache.put("a".to_string(), "v".to_string(), None).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(cache.get(&"a".to_string()).unwrap(), Outcome::Ok("v".to_string()));
}

#[test]
#[serial]
fn disabling_lazy_expiration_leaves_expired_entries_readable_as_missing_without_deleting_them() {
    let config = CacheConfig::<String, String>::new("it-lazy-expiration-disabled").with_lazy_expiration(false);
    let cache = Cache::new(config).unwrap();

    cache.put("a".to_string(), "v".to_string(), Some(50)).unwrap();
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(cache.get(&"a".to_string()).unwrap(), Outcome::Missing);
    // Nothing swept it, so it's still physically present in the store.
    assert_eq!(cache.size().unwrap(), Outcome::Ok(1));
}
