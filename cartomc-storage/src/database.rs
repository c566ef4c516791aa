//! Connection pool handle shared by the database tile store and the realtime store.

use anyhow::{Context, Result};
use deadpool_postgres::{Object, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::config::DatabaseConfig;
use crate::SetupError;

/// SQL flavours we know how to upsert into.
///
/// Detected once per pool from `SELECT version()`. Anything outside this list
/// is refused at setup; there is no generic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Cockroach,
}

impl Dialect {
    /// Pick the dialect from the server's version banner, e.g.
    /// `PostgreSQL 16.2 on x86_64-pc-linux-gnu, ...`.
    pub fn from_version(version: &str) -> Result<Self, SetupError> {
        let product = version.split_whitespace().next().unwrap_or("");
        let lower = version.to_lowercase();
        match product.to_lowercase().as_str() {
            // Redshift claims to be PostgreSQL 8 but has no ON CONFLICT.
            "postgresql" if !lower.contains("redshift") => Ok(Dialect::Postgres),
            "cockroachdb" => Ok(Dialect::Cockroach),
            _ => Err(SetupError::UnsupportedDialect {
                product: product.to_string(),
                version: version.trim().to_string(),
            }),
        }
    }

    fn upsert_tile_template(self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "INSERT INTO %table% (world, x, z, zoom, tile) VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (world, x, z, zoom) DO UPDATE SET tile = EXCLUDED.tile"
            }
            Dialect::Cockroach => "UPSERT INTO %table% (world, x, z, zoom, tile) VALUES ($1, $2, $3, $4, $5)",
        }
    }
}

/// Statements with the configured table names filled in.
#[derive(Debug, Clone)]
pub struct Queries {
    pub upsert_tile: String,
    pub select_tile: String,
    pub update_realtime: String,
    pub select_realtime: String,
    create_tiles: String,
    create_realtime: String,
    seed_realtime: String,
}

fn sql(template: &str, table: &str) -> String {
    template.replace("%table%", table)
}

impl Queries {
    pub fn new(dialect: Dialect, tiles_table: &str, realtime_table: &str) -> Self {
        Self {
            upsert_tile: sql(dialect.upsert_tile_template(), tiles_table),
            select_tile: sql(
                "SELECT tile FROM %table% WHERE world = $1 AND x = $2 AND z = $3 AND zoom = $4",
                tiles_table,
            ),
            update_realtime: sql("UPDATE %table% SET data = $1 WHERE type = $2", realtime_table),
            select_realtime: sql("SELECT data FROM %table% WHERE type = $1", realtime_table),
            create_tiles: sql(
                "CREATE TABLE IF NOT EXISTS %table% (
                    world TEXT NOT NULL,
                    x INT NOT NULL,
                    z INT NOT NULL,
                    zoom INT NOT NULL,
                    tile BYTEA NOT NULL,
                    PRIMARY KEY (world, x, z, zoom)
                )",
                tiles_table,
            ),
            create_realtime: sql(
                "CREATE TABLE IF NOT EXISTS %table% (
                    type TEXT PRIMARY KEY,
                    data TEXT NOT NULL DEFAULT ''
                )",
                realtime_table,
            ),
            seed_realtime: sql(
                "INSERT INTO %table% (type, data) VALUES ('P', ''), ('M', '') ON CONFLICT (type) DO NOTHING",
                realtime_table,
            ),
        }
    }
}

/// Owns the connection pool. Created by [`Database::connect`], closed by
/// [`Database::shutdown`]; nothing outside this module keeps a connection
/// longer than one statement.
pub struct Database {
    pool: Pool,
    dialect: Dialect,
    queries: Queries,
}

impl Database {
    /// Build the pool, probe the dialect and make sure the schema exists.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SetupError> {
        let pool = config.pool_config().create_pool(Some(Runtime::Tokio1), NoTls)?;

        let result = async {
            let client = pool.get().await?;
            let row = client.query_one("SELECT version()", &[]).await?;
            let version: String = row.try_get(0)?;
            let dialect = Dialect::from_version(&version)?;
            log::info!("Connected to {:?} database: {}", dialect, version);

            let queries = Queries::new(dialect, &config.tiles_table, &config.realtime_table);
            client.batch_execute(&queries.create_tiles).await?;
            client.batch_execute(&queries.create_realtime).await?;
            client.batch_execute(&queries.seed_realtime).await?;
            Ok::<_, SetupError>((dialect, queries))
        }
        .await;

        match result {
            Ok((dialect, queries)) => Ok(Self { pool, dialect, queries }),
            Err(e) => {
                pool.close();
                Err(e)
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    /// Check a connection out of the pool. It goes back when dropped.
    pub async fn client(&self) -> Result<Object> {
        debug_assert!(!self.pool.is_closed(), "database used after shutdown");
        self.pool.get().await.context("Failed to get DB connection")
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Close the pool. Calling it again is a no-op.
    pub fn shutdown(&self) {
        if !self.pool.is_closed() {
            log::info!("Closing database pool");
            self.pool.close();
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
    }
}
