use cachewright::{Cache, CacheConfig};
use simple_logger::SimpleLogger;

fn main() {
    // enable logs for example purposes
    SimpleLogger::new().init().unwrap();

    let config = CacheConfig::<String, String>::new("demo-basic")
        .with_default_expiration(500)
        .with_janitor_interval(200)
        .with_limit(1_000, 0.25);
    let cache = Cache::new(config).unwrap();

    for i in 0..10_000 {
        cache.put(format!("key-{i}"), format!("value-{i}"), None).unwrap();
    }

    println!("size after 10k inserts against a 1k limit: {:?}", cache.size().unwrap());
    println!("key-9999 -> {:?}", cache.get(&"key-9999".to_string()).unwrap());
    println!("key-0 -> {:?}", cache.get(&"key-0".to_string()).unwrap());

    cache.shutdown();
}
