//! Runs against a live PostgreSQL/CockroachDB server.
//!
//! `DATABASE_URL=postgres://... cargo test -p cartomc-storage -- --ignored`

use std::sync::Arc;

use cartomc_storage::config::{DatabaseConfig, DEFAULT_PROPERTIES};
use cartomc_storage::database::Database;
use cartomc_storage::postgres::DatabaseTileStore;
use cartomc_storage::realtime::{RealtimeDataStore, RealtimeKind};
use cartomc_storage::{blank_tile, TileKey, TileStore};
use image::Rgba;

async fn connect(suffix: &str) -> Arc<Database> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
    let mut config = DatabaseConfig::parse(DEFAULT_PROPERTIES)
        .unwrap()
        .with_url_override(Some(url));
    config.tiles_table = format!("test_tiles_{}", suffix);
    config.realtime_table = format!("test_realtime_{}", suffix);
    Arc::new(Database::connect(&config).await.expect("setup failed"))
}

fn tile(shade: u8) -> image::RgbaImage {
    let mut tile = blank_tile();
    for i in 0..32 {
        tile.put_pixel(i, 100, Rgba([shade, shade, 0, 255]));
    }
    tile
}

#[tokio::test]
#[ignore]
async fn test_tile_round_trip_and_overwrite() {
    let db = connect("roundtrip").await;
    let store = DatabaseTileStore::new(db.clone());
    let key = TileKey::new("world", 12, -40, 1);

    store.save(&tile(1), &key).await.unwrap();
    assert_eq!(store.load(&key).await, tile(1));

    store.save(&tile(2), &key).await.unwrap();
    assert_eq!(store.load(&key).await, tile(2));

    let client = db.client().await.unwrap();
    let row = client
        .query_one(
            "SELECT count(*) FROM test_tiles_roundtrip WHERE world = $1 AND x = $2 AND z = $3 AND zoom = $4",
            &[&key.world, &key.x, &key.z, &key.zoom],
        )
        .await
        .unwrap();
    let count: i64 = row.get(0);
    assert_eq!(count, 1);

    store.shutdown().await;
    store.shutdown().await;
    assert!(db.is_closed());
}

#[tokio::test]
#[ignore]
async fn test_missing_tile_is_blank() {
    let db = connect("missing").await;
    let store = DatabaseTileStore::new(db);
    assert_eq!(store.load(&TileKey::new("nowhere", 0, 0, 0)).await, blank_tile());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_saves_for_distinct_keys() {
    let db = connect("concurrent").await;
    let store = Arc::new(DatabaseTileStore::new(db));

    let mut handles = Vec::new();
    for x in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.save(&tile(x as u8), &TileKey::new("world", x, 0, 0)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for x in 0..16 {
        assert_eq!(store.load(&TileKey::new("world", x, 0, 0)).await, tile(x as u8));
    }
}

#[tokio::test]
#[ignore]
async fn test_realtime_slots() {
    let db = connect("realtime").await;
    let store = RealtimeDataStore::new(db);

    store.update_players(r#"{"players":[]}"#).await.unwrap();
    store.update_markers(r#"{"markers":[1]}"#).await.unwrap();
    store.update_players(r#"{"players":["Notch"]}"#).await.unwrap();

    assert_eq!(store.players().await, r#"{"players":["Notch"]}"#);
    assert_eq!(store.get_realtime_data(RealtimeKind::Markers).await, r#"{"markers":[1]}"#);
}
