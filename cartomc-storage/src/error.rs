use std::path::PathBuf;

/// Fatal errors raised while bringing the storage subsystem up.
///
/// None of these are recoverable at tile granularity: if setup fails the
/// subsystem stays down.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("unsupported database {product} ({version})")]
    UnsupportedDialect { product: String, version: String },

    #[error("failed to install default config at {path}: {source}")]
    ConfigInstall {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("config key `{0}` is missing")]
    MissingKey(&'static str),

    #[error("invalid value for config key `{key}`: {value:?}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("failed to create connection pool: {0}")]
    Pool(#[from] deadpool_postgres::CreatePoolError),

    #[error("failed to connect to database: {0}")]
    Connect(#[from] deadpool_postgres::PoolError),

    #[error("database error during setup: {0}")]
    Sql(#[from] tokio_postgres::Error),

    #[error("failed to prepare tile directory {path}: {source}")]
    TileDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SetupError {
    /// Connection failures may clear up on their own (database still booting);
    /// everything else needs an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SetupError::Connect(_))
    }
}
