mod common;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::json;
use tower_sessions_sdb_store::{
    Adapter, AdapterError, Attributes, Filter, SdbStore, SeaOrmAdapter, Select, Serialization,
    SessionData, SweepOutcome, BATCH_DELETE_LIMIT, EXPIRES_ATTRIBUTE,
};

async fn connect() -> DatabaseConnection {
    // One connection: every in-memory SQLite connection is its own database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    Database::connect(opt).await.unwrap()
}

async fn adapter() -> SeaOrmAdapter {
    let adapter = SeaOrmAdapter::new(connect().await);
    adapter.create_table_if_missing().await.unwrap();
    adapter
}

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn expired_before(domain: &str, value: i64) -> Select {
    Select {
        domain: domain.to_string(),
        filter: Filter::LessThan {
            attribute: EXPIRES_ATTRIBUTE.to_string(),
            value,
        },
        limit: BATCH_DELETE_LIMIT,
    }
}

#[tokio::test]
async fn put_get_and_overwrite() {
    let adapter = adapter().await;

    adapter
        .put_record("d", "k", attrs(&[("a", "1"), ("expires", "100")]))
        .await
        .unwrap();
    adapter
        .put_record("d", "k", attrs(&[("b", "2")]))
        .await
        .unwrap();

    assert_eq!(
        adapter.get_record("d", "k").await.unwrap(),
        Some(attrs(&[("b", "2")]))
    );
    assert_eq!(adapter.record_count("d").await.unwrap(), 1);
    assert_eq!(adapter.get_record("d", "missing").await.unwrap(), None);
}

#[tokio::test]
async fn select_uses_expires_and_skips_missing_values() {
    let adapter = adapter().await;

    adapter.put_record("d", "old", attrs(&[("expires", "10")])).await.unwrap();
    adapter.put_record("d", "new", attrs(&[("expires", "5000")])).await.unwrap();
    adapter.put_record("d", "undated", attrs(&[("x", "1")])).await.unwrap();
    adapter.put_record("other", "old", attrs(&[("expires", "10")])).await.unwrap();

    let hits = adapter.select(&expired_before("d", 1000)).await.unwrap();
    let names: Vec<&str> = hits.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["old"]);
    assert_eq!(hits[0].attributes, attrs(&[("expires", "10")]));
}

#[tokio::test]
async fn select_respects_the_limit() {
    let adapter = adapter().await;
    common::seed_expired(&adapter, "d", 30).await;

    let hits = adapter.select(&expired_before("d", 1000)).await.unwrap();
    assert_eq!(hits.len(), BATCH_DELETE_LIMIT);
}

#[tokio::test]
async fn batch_delete_is_scoped_and_bounded() {
    let adapter = adapter().await;
    common::seed_expired(&adapter, "d", 3).await;
    common::seed_expired(&adapter, "other", 3).await;

    let keys = vec!["expired-000".to_string(), "expired-001".to_string()];
    adapter.batch_delete("d", &keys).await.unwrap();

    assert_eq!(adapter.record_count("d").await.unwrap(), 1);
    assert_eq!(adapter.record_count("other").await.unwrap(), 3);

    let too_many: Vec<String> = (0..26).map(|i| i.to_string()).collect();
    assert!(matches!(
        adapter.batch_delete("d", &too_many).await,
        Err(AdapterError::BatchTooLarge { .. })
    ));
}

#[tokio::test]
async fn drop_domain_leaves_other_domains() {
    let adapter = adapter().await;
    common::seed_expired(&adapter, "d", 2).await;
    common::seed_expired(&adapter, "other", 2).await;

    adapter.drop_domain("d").await.unwrap();

    assert_eq!(adapter.record_count("d").await.unwrap(), 0);
    assert_eq!(adapter.record_count("other").await.unwrap(), 2);
}

#[tokio::test]
async fn store_lifecycle_over_sql() {
    let store = SdbStore::builder()
        .adapter(adapter().await)
        .with_serialization(Serialization::PerField)
        .with_cleanup_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    store.stop_cleanup().await;

    let session: SessionData = serde_json::from_value(json!({ "value": 1, "list": [1, 2] })).unwrap();
    store.commit("s1", &session).await.unwrap();
    assert_eq!(store.fetch("s1").await.unwrap(), Some(session));

    common::seed_expired(store.adapter(), "sessions", 30).await;
    assert_eq!(store.sweep_expired().await, SweepOutcome::Deleted(25));
    assert_eq!(store.sweep_expired().await, SweepOutcome::Deleted(5));
    assert_eq!(store.count().await.unwrap(), 1);

    store.destroy("s1").await.unwrap();
    assert_eq!(store.fetch("s1").await.unwrap(), None);
}

#[cfg(feature = "migration")]
#[tokio::test]
async fn migration_creates_a_usable_table() {
    use tower_sessions_sdb_store::migration::{Migrator, MigratorTrait};

    let conn = connect().await;
    Migrator::up(&conn, None).await.unwrap();

    let adapter = SeaOrmAdapter::new(conn);
    adapter.put_record("d", "k", attrs(&[("expires", "1")])).await.unwrap();
    assert_eq!(adapter.select(&expired_before("d", 2)).await.unwrap().len(), 1);
}
