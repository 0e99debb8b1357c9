use quiz_core::model::{ResetScope, SyncDelta, SyncKey, SyncState, UserEmail};
use quiz_core::time::fixed_now;
use storage::repository::{KvStore, Storage, StorageError};
use storage::sqlite::SqliteRepository;

fn key(email: &str) -> SyncKey {
    SyncKey::for_user(&UserEmail::parse(email).unwrap())
}

#[tokio::test]
async fn sqlite_kv_put_get_delete() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get("sync:a@b.c").await.unwrap(), None);
    repo.put("sync:a@b.c", "{}").await.unwrap();
    repo.put("sync:a@b.c", r#"{"updatedAt":1}"#).await.unwrap();
    assert_eq!(
        repo.get("sync:a@b.c").await.unwrap().as_deref(),
        Some(r#"{"updatedAt":1}"#)
    );
    assert!(repo.delete("sync:a@b.c").await.unwrap());
    assert!(!repo.delete("sync:a@b.c").await.unwrap());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn sqlite_storage_persists_sync_state() {
    let storage = Storage::sqlite("sqlite:file:memdb_sync_state?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");

    let alice = key("alice@example.com");
    let bob = key("bob@example.com");

    let delta: SyncDelta = serde_json::from_str(
        r#"{
            "correctDelta": {"20250926-001": 3},
            "streak3Delta": {"20250926-001": 1},
            "streak3TodayDelta": {"day": 20250926, "qids": ["20250926-001"]}
        }"#,
    )
    .unwrap();
    let mut state = SyncState::default();
    state.merge(&delta, fixed_now()).unwrap();
    storage.sync_states.save(&alice, &state).await.unwrap();

    let loaded = storage.sync_states.load(&alice).await.unwrap().unwrap();
    assert_eq!(loaded, state);
    assert_eq!(storage.sync_states.load(&bob).await.unwrap(), None);

    let mut reset = loaded;
    reset.reset(ResetScope::Streak3Today, fixed_now());
    storage.sync_states.save(&alice, &reset).await.unwrap();
    let reloaded = storage.sync_states.load(&alice).await.unwrap().unwrap();
    assert!(reloaded.streak3_today().is_none());
    assert_eq!(reloaded.correct().len(), 1);
}

#[tokio::test]
async fn sqlite_storage_reports_corrupt_records() {
    let storage = Storage::sqlite("sqlite:file:memdb_corrupt?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let alice = key("alice@example.com");
    storage
        .kv
        .put(alice.as_str(), r#"{"correct": {"20250926-001": "three"}}"#)
        .await
        .unwrap();

    let err = storage.sync_states.load(&alice).await.unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}
