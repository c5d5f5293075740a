//! RecordStore interface tests.
//!
//! These tests verify the contract of the RecordStore trait.
//! Each storage implementation should run these tests.

use serde_json::{json, Value};
use uuid::Uuid;

use revreg::record::{IssuerRevRegRecord, RecordState, RegistryOptions};
use revreg::storage::{RecordStore, StorageError};

const TEST_DID: &str = "55GkHamhTU1ZbTbV2ab9DE";

/// A cred def id no other test uses, so a shared store stays isolated.
pub fn unique_cred_def() -> String {
    format!("{TEST_DID}:3:CL:{}:default", Uuid::new_v4().simple())
}

pub fn make_record(cred_def_id: &str) -> IssuerRevRegRecord {
    IssuerRevRegRecord::new(TEST_DID, cred_def_id, RegistryOptions::default())
}

/// Overwrite serialized fields of a record, as a later lifecycle step would.
pub fn with_fields(record: &IssuerRevRegRecord, fields: Value) -> IssuerRevRegRecord {
    let mut value = serde_json::to_value(record).expect("record should serialize");
    for (key, field) in fields.as_object().expect("fields should be an object") {
        value[key] = field.clone();
    }
    serde_json::from_value(value).expect("patched record should deserialize")
}

fn revoc_reg_id_for(cred_def_id: &str, record: &IssuerRevRegRecord) -> String {
    format!("{TEST_DID}:4:{cred_def_id}:CL_ACCUM:{}", record.tag())
}

// =============================================================================
// RecordStore::insert tests
// =============================================================================

pub async fn test_insert_assigns_increasing_sequence<S: RecordStore>(store: &S) {
    let cred_def = unique_cred_def();

    let first = store
        .insert(make_record(&cred_def))
        .await
        .expect("insert should succeed");
    let second = store
        .insert(make_record(&cred_def))
        .await
        .expect("insert should succeed");

    assert!(first.sequence_id().is_assigned());
    assert!(second.sequence_id() > first.sequence_id());
    assert!(first < second);
}

pub async fn test_insert_duplicate_record_id<S: RecordStore>(store: &S) {
    let record = make_record(&unique_cred_def());
    store
        .insert(record.clone())
        .await
        .expect("first insert should succeed");

    let err = store.insert(record.clone()).await.unwrap_err();
    assert!(
        matches!(err, StorageError::AlreadyExists(id) if id == record.record_id()),
        "unexpected error: {err}"
    );
}

pub async fn test_insert_duplicate_revoc_reg_id<S: RecordStore>(store: &S) {
    let cred_def = unique_cred_def();
    let first = make_record(&cred_def);
    let revoc_reg_id = revoc_reg_id_for(&cred_def, &first);
    let first = with_fields(&first, json!({"revoc_reg_id": revoc_reg_id}));
    store.insert(first).await.expect("insert should succeed");

    let second = with_fields(
        &make_record(&cred_def),
        json!({"revoc_reg_id": revoc_reg_id}),
    );
    let err = store.insert(second).await.unwrap_err();
    assert!(
        matches!(err, StorageError::DuplicateRevocRegId(ref id) if *id == revoc_reg_id),
        "unexpected error: {err}"
    );
}

// =============================================================================
// RecordStore::get / update tests
// =============================================================================

pub async fn test_get_returns_inserted<S: RecordStore>(store: &S) {
    let inserted = store
        .insert(make_record(&unique_cred_def()))
        .await
        .expect("insert should succeed");

    let loaded = store
        .get(inserted.record_id())
        .await
        .expect("get should succeed");
    assert_eq!(loaded, inserted);
    assert_eq!(loaded.sequence_id(), inserted.sequence_id());
}

pub async fn test_get_missing<S: RecordStore>(store: &S) {
    let err = store.get(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)), "unexpected error: {err}");
}

pub async fn test_update_persists_changes<S: RecordStore>(store: &S) {
    let cred_def = unique_cred_def();
    let inserted = store
        .insert(make_record(&cred_def))
        .await
        .expect("insert should succeed");
    let revoc_reg_id = revoc_reg_id_for(&cred_def, &inserted);

    let updated = with_fields(
        &inserted,
        json!({
            "state": "active",
            "revoc_reg_id": revoc_reg_id,
            "pending_pub": ["1", "2"],
        }),
    );
    store.update(&updated).await.expect("update should succeed");

    let loaded = store
        .get(inserted.record_id())
        .await
        .expect("get should succeed");
    assert_eq!(loaded, updated);
    assert_eq!(loaded.state(), RecordState::Active);
    assert_eq!(loaded.sequence_id(), inserted.sequence_id());

    let by_id = store
        .find_by_revoc_reg_id(&revoc_reg_id)
        .await
        .expect("find should succeed")
        .expect("record should be indexed by revocation registry id");
    assert_eq!(by_id.record_id(), inserted.record_id());
}

pub async fn test_update_missing<S: RecordStore>(store: &S) {
    let record = make_record(&unique_cred_def());
    let err = store.update(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)), "unexpected error: {err}");
}

pub async fn test_update_rejects_taken_revoc_reg_id<S: RecordStore>(store: &S) {
    let cred_def = unique_cred_def();
    let first = make_record(&cred_def);
    let revoc_reg_id = revoc_reg_id_for(&cred_def, &first);
    store
        .insert(with_fields(&first, json!({"revoc_reg_id": revoc_reg_id})))
        .await
        .expect("insert should succeed");
    let second = store
        .insert(make_record(&cred_def))
        .await
        .expect("insert should succeed");

    let err = store
        .update(&with_fields(&second, json!({"revoc_reg_id": revoc_reg_id})))
        .await
        .unwrap_err();
    assert!(
        matches!(err, StorageError::DuplicateRevocRegId(_)),
        "unexpected error: {err}"
    );
}

// =============================================================================
// Query tests
// =============================================================================

pub async fn test_find_by_revoc_reg_id_missing<S: RecordStore>(store: &S) {
    let found = store
        .find_by_revoc_reg_id("unknown:4:registry")
        .await
        .expect("find should succeed");
    assert!(found.is_none());
}

pub async fn test_find_by_cred_def_filters_and_orders<S: RecordStore>(store: &S) {
    let cred_def = unique_cred_def();
    let other_cred_def = unique_cred_def();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let record = store
            .insert(make_record(&cred_def))
            .await
            .expect("insert should succeed");
        ids.push(record.record_id());
    }
    store
        .insert(make_record(&other_cred_def))
        .await
        .expect("insert should succeed");

    let middle = store.get(ids[1]).await.expect("get should succeed");
    store
        .update(&with_fields(&middle, json!({"state": "generated"})))
        .await
        .expect("update should succeed");

    let all: Vec<_> = store
        .find_by_cred_def(&cred_def, None)
        .await
        .expect("find should succeed")
        .iter()
        .map(IssuerRevRegRecord::record_id)
        .collect();
    assert_eq!(all, ids);

    let init: Vec<_> = store
        .find_by_cred_def(&cred_def, Some(RecordState::Init))
        .await
        .expect("find should succeed")
        .iter()
        .map(IssuerRevRegRecord::record_id)
        .collect();
    assert_eq!(init, vec![ids[0], ids[2]]);

    let generated = store
        .find_by_cred_def(&cred_def, Some(RecordState::Generated))
        .await
        .expect("find should succeed");
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].record_id(), ids[1]);

    let active = store
        .find_by_cred_def(&cred_def, Some(RecordState::Active))
        .await
        .expect("find should succeed");
    assert!(active.is_empty());
}

pub async fn test_find_pending<S: RecordStore>(store: &S) {
    let cred_def = unique_cred_def();

    let mut records = Vec::new();
    for _ in 0..3 {
        records.push(
            store
                .insert(make_record(&cred_def))
                .await
                .expect("insert should succeed"),
        );
    }
    for record in [&records[2], &records[0]] {
        store
            .update(&with_fields(record, json!({"pending_pub": ["7"]})))
            .await
            .expect("update should succeed");
    }

    let pending: Vec<_> = store
        .find_pending()
        .await
        .expect("find should succeed")
        .into_iter()
        .filter(|r| r.cred_def_id() == Some(cred_def.as_str()))
        .map(|r| r.record_id())
        .collect();
    assert_eq!(pending, vec![records[0].record_id(), records[2].record_id()]);

    store
        .update(&records[0])
        .await
        .expect("update should succeed");
    let pending = store
        .find_pending()
        .await
        .expect("find should succeed")
        .into_iter()
        .filter(|r| r.cred_def_id() == Some(cred_def.as_str()))
        .count();
    assert_eq!(pending, 1);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all RecordStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_record_store_tests {
    ($store:expr) => {
        use $crate::storage::record_store_tests::*;

        // insert tests
        test_insert_assigns_increasing_sequence($store).await;
        println!("  test_insert_assigns_increasing_sequence: PASSED");

        test_insert_duplicate_record_id($store).await;
        println!("  test_insert_duplicate_record_id: PASSED");

        test_insert_duplicate_revoc_reg_id($store).await;
        println!("  test_insert_duplicate_revoc_reg_id: PASSED");

        // get / update tests
        test_get_returns_inserted($store).await;
        println!("  test_get_returns_inserted: PASSED");

        test_get_missing($store).await;
        println!("  test_get_missing: PASSED");

        test_update_persists_changes($store).await;
        println!("  test_update_persists_changes: PASSED");

        test_update_missing($store).await;
        println!("  test_update_missing: PASSED");

        test_update_rejects_taken_revoc_reg_id($store).await;
        println!("  test_update_rejects_taken_revoc_reg_id: PASSED");

        // query tests
        test_find_by_revoc_reg_id_missing($store).await;
        println!("  test_find_by_revoc_reg_id_missing: PASSED");

        test_find_by_cred_def_filters_and_orders($store).await;
        println!("  test_find_by_cred_def_filters_and_orders: PASSED");

        test_find_pending($store).await;
        println!("  test_find_pending: PASSED");
    };
}
