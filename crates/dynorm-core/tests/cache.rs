//! Cache layer scenarios: negative caching and write-back.

mod common;

use common::*;
use dynorm_core::api::{CacheEntry, CachedTable, Record, Table};
use dynorm_core::store::MemoryStore;

fn customers(db: &MemoryStore) -> CachedTable<Customer, &MemoryStore> {
    CachedTable::new(Table::open(db, customer_schema()).unwrap())
}

#[test]
fn test_single_store_read_per_key() {
    let db = db();
    let mut cache = customers(&db);
    let base = db.stats().gets;

    for _ in 0..5 {
        for id in ["A", "B", "C"] {
            assert!(cache.find(id, None).unwrap().is_none());
        }
    }
    assert_eq!(db.stats().gets - base, 3);
    assert_eq!(cache.stats().store_reads, 3);
    assert_eq!(cache.stats().hits, 12);
}

#[test]
fn test_save_replaces_sentinel() {
    let db = db();
    let mut cache = customers(&db);
    assert!(cache.get("CUSTOMER1", None).unwrap_err().is_not_found());
    assert_eq!(cache.state("CUSTOMER1", None).unwrap(), CacheEntry::NotFound);

    let record = Record::new(Customer {
        customer_id: "CUSTOMER1".into(),
        first_name: "Ann".into(),
        ..Default::default()
    })
    .unwrap();
    cache.save(record).unwrap();
    assert_eq!(cache.len(), 1);

    let reads = db.stats().gets;
    assert_eq!(cache.get("CUSTOMER1", None).unwrap().first_name, "Ann");
    assert_eq!(db.stats().gets, reads);

    cache.save_data(false).unwrap();
    let stored = cache.table().get("CUSTOMER1", None).unwrap();
    assert_eq!(stored.first_name, "Ann");
}

#[test]
fn test_mutations_through_cache_are_written_back() {
    let db = db();
    let mut cache = customers(&db);
    cache
        .table()
        .save(
            &mut Record::new(Customer {
                customer_id: "CUSTOMER1".into(),
                first_name: "Ann".into(),
                last_name: "Lee".into(),
                ..Default::default()
            })
            .unwrap(),
        )
        .unwrap();

    cache.get("CUSTOMER1", None).unwrap().first_name = "Anna".into();
    let report = cache.save_data(false).unwrap();
    assert_eq!(report.saved, 1);

    let stored = cache.table().get("CUSTOMER1", None).unwrap();
    assert_eq!(stored.first_name, "Anna");
    assert_eq!(stored.last_name, "Lee");
    assert_eq!(db.stats().updates, 1);
}

#[test]
fn test_batched_write_back_of_thirty_entries() {
    let db = db();
    let mut cache = customers(&db).with_load_from_store(false);
    for i in 0..30 {
        let customer = cache.get(format!("CUSTOMER{i}"), None).unwrap();
        customer.first_name = format!("Name{i}");
    }
    assert_eq!(cache.get_data().len(), 30);

    let flushes = db.stats().batch_flushes;
    let report = cache.save_data_batch(false).unwrap();
    assert_eq!(report.saved, 30);
    assert_eq!(db.stats().batch_flushes - flushes, 2);
    assert_eq!(db.item_count("customer").unwrap(), 30);
}

#[test]
fn test_sentinels_are_not_written_back() {
    let db = db();
    let mut cache = customers(&db);
    assert!(cache.find("GHOST", None).unwrap().is_none());
    cache.get_or_create("REAL", None).unwrap();
    let report = cache.save_data_batch(false).unwrap();
    assert_eq!(report.saved, 1);
    assert_eq!(db.item_count("customer").unwrap(), 1);
    assert!(cache.table().find("GHOST", None).unwrap().is_none());
}

#[test]
fn test_ignore_errors_reports_first_error() {
    let db = db();
    let mut cache = customers(&db).with_load_from_store(false);
    cache.get("A", None).unwrap().gender = "robot".into();
    cache.get("B", None).unwrap();
    cache.get("C", None).unwrap().gender = "alien".into();

    let report = cache.save_data(true).unwrap();
    assert_eq!(report.saved, 1);
    assert_eq!(report.failed, 2);
    let message = report.first_error.unwrap().to_string();
    assert!(message.contains("robot"), "{message}");

    assert!(cache.save_data(false).is_err());
}

#[test]
fn test_counter_increments_survive_write_back() {
    let db = db();
    let mut cache = customers(&db);
    cache
        .table()
        .save(&mut Record::new(Customer {
            customer_id: "CUSTOMER1".into(),
            ..Default::default()
        })
        .unwrap())
        .unwrap();
    assert_eq!(cache.get("CUSTOMER1", None).unwrap().thanks_count, 0);

    cache
        .table()
        .update_counter("CUSTOMER1", None, "thanks_count", 5)
        .unwrap();
    cache
        .table()
        .update_counter("CUSTOMER1", None, "thanks_count", 5)
        .unwrap();
    cache.get("CUSTOMER1", None).unwrap().first_name = "Ann".into();
    cache.save_data(false).unwrap();

    let stored = cache.table().get("CUSTOMER1", None).unwrap();
    assert_eq!(stored.thanks_count, 10);
    assert_eq!(stored.first_name, "Ann");
    assert_eq!(cache.get("CUSTOMER1", None).unwrap().thanks_count, 0);
}

#[test]
fn test_oversized_record_fails_alone_in_batched_write_back() {
    let db = db();
    let mut cache = customers(&db).with_load_from_store(false);
    for i in 0..30 {
        let customer = cache.get(format!("CUSTOMER{i:02}"), None).unwrap();
        customer.first_name = format!("Name{i}");
        if i == 3 {
            customer.last_name = "x".repeat(500 * 1024);
        }
    }

    let report = cache.save_data_batch(true).unwrap();
    assert_eq!(report.saved, 29);
    assert_eq!(report.failed, 1);
    assert!(report.first_error.is_some());
    assert_eq!(db.item_count("customer").unwrap(), 29);
    assert!(cache.table().find("CUSTOMER03", None).unwrap().is_none());
}
