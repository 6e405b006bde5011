use cachewright::{Cache, CacheConfig, CustomCommand, Outcome};
use serial_test::serial;

// The popped head is a scalar result, independent of the list-valued `V`
// this command is attached to.
fn lpop() -> CustomCommand<Vec<i32>> {
    CustomCommand::write(|current: Option<&Vec<i32>>| -> (i32, Option<Vec<i32>>) {
        match current {
            Some(list) if !list.is_empty() => {
                let mut rest = list.clone();
                let head = rest.remove(0);
                (head, Some(rest))
            }
            _ => (0, None),
        }
    })
}

#[test]
#[serial]
fn invoking_a_write_command_pops_the_head_of_a_list_and_writes_back_the_rest() {
    let config = CacheConfig::<String, Vec<i32>>::new("it-custom-commands-lpop").with_command("lpop", lpop());
    let cache = Cache::new(config).unwrap();
    cache.put("queue".to_string(), vec![1, 2, 3], None).unwrap();

    let result: Outcome<i32> = cache.invoke(&"queue".to_string(), "lpop").unwrap();
    assert_eq!(result, Outcome::Ok(1));
    assert_eq!(cache.get(&"queue".to_string()).unwrap(), Outcome::Ok(vec![2, 3]));
}

#[test]
#[serial]
fn invoking_a_write_command_on_a_missing_key_does_not_create_one() {
    let config = CacheConfig::<String, Vec<i32>>::new("it-custom-commands-missing").with_command("lpop", lpop());
    let cache = Cache::new(config).unwrap();

    let result: Outcome<i32> = cache.invoke(&"missing".to_string(), "lpop").unwrap();
    assert_eq!(result, Outcome::Ok(0));
    assert_eq!(cache.get(&"missing".to_string()).unwrap(), Outcome::Missing);
}

#[test]
#[serial]
fn invoking_an_unattached_command_name_is_an_error() {
    let cache = Cache::<String, Vec<i32>>::new(CacheConfig::new("it-custom-commands-unknown")).unwrap();
    assert!(cache.invoke::<i32>(&"k".to_string(), "lpop").is_err());
}

#[test]
#[serial]
fn a_read_command_never_writes_back() {
    let config = CacheConfig::<String, i32>::new("it-custom-commands-read")
        .with_command("peek", CustomCommand::read(|v| v.copied().unwrap_or(-1)));
    let cache = Cache::new(config).unwrap();

    assert_eq!(cache.invoke(&"missing".to_string(), "peek").unwrap(), Outcome::Ok(-1));
    assert_eq!(cache.get(&"missing".to_string()).unwrap(), Outcome::Missing);

    cache.put("k".to_string(), 7, None).unwrap();
    assert_eq!(cache.invoke(&"k".to_string(), "peek").unwrap(), Outcome::Ok(7));
}
