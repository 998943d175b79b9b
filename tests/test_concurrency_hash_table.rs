use std::cmp::Ordering;
use std::sync::Arc;
use std::thread;

use rand::Rng;

use hivedb::buffer::buffer_pool_manager::BufferPoolManagerInstance;
use hivedb::buffer::replacer::LruReplacer;
use hivedb::container::hash::extendible_hash_table::ExtendibleHashTable;
use hivedb::container::hash::hash_table::HashTable;
use hivedb::storage::disk::disk_manager::FakeDiskManager;

type TestPool = BufferPoolManagerInstance<LruReplacer, FakeDiskManager>;
type TestTable = ExtendibleHashTable<i32, i32, fn(&i32, &i32) -> Ordering, TestPool>;

fn int_cmp(a: &i32, b: &i32) -> Ordering {
    a.cmp(b)
}

fn create_table(pool_size: usize) -> Arc<TestTable> {
    let bpm = Arc::new(BufferPoolManagerInstance::new_default(pool_size));
    Arc::new(ExtendibleHashTable::new(
        bpm,
        int_cmp as fn(&i32, &i32) -> Ordering,
    ))
}

#[test]
fn test_concurrent_inserts_of_disjoint_ranges() {
    let table = create_table(16);
    let threads = 4;
    let keys_per_thread = 600;

    let mut handlers = vec![];
    for tid in 0..threads {
        let table = table.clone();
        handlers.push(thread::spawn(move || {
            let base = tid * keys_per_thread;
            for key in base..base + keys_per_thread {
                assert!(table.insert(&key, &(key * 2)));
            }
        }));
    }
    for handler in handlers {
        handler.join().unwrap();
    }

    table.verify_integrity();
    for key in 0..threads * keys_per_thread {
        assert_eq!(table.get_value(&key), vec![key * 2]);
    }
}

#[test]
fn test_concurrent_insert_get_remove_on_key_stripes() {
    // each thread owns the keys congruent to its id, so per-key results stay
    // deterministic while splits and merges interleave across threads
    let table = create_table(16);
    let threads = 4;

    let mut handlers = vec![];
    for tid in 0..threads {
        let table = table.clone();
        handlers.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..1500 {
                let key = rng.gen_range(0..500) * threads + tid;
                let value = key * 10;

                assert!(table.insert(&key, &value));
                assert_eq!(table.get_value(&key), vec![value]);
                assert!(table.remove(&key, &value));
                assert!(table.get_value(&key).is_empty());
            }
        }));
    }
    for handler in handlers {
        handler.join().unwrap();
    }

    table.verify_integrity();
}

#[test]
fn test_concurrent_growth_then_shrink_back() {
    let table = create_table(16);
    let threads = 4;
    let keys_per_thread = 600;

    let mut handlers = vec![];
    for tid in 0..threads {
        let table = table.clone();
        handlers.push(thread::spawn(move || {
            let base = tid * keys_per_thread;
            for key in base..base + keys_per_thread {
                assert!(table.insert(&key, &key));
            }
            for key in base..base + keys_per_thread {
                assert!(table.remove(&key, &key));
            }
        }));
    }
    for handler in handlers {
        handler.join().unwrap();
    }

    table.verify_integrity();
    for key in 0..threads * keys_per_thread {
        assert!(table.get_value(&key).is_empty());
    }
}
