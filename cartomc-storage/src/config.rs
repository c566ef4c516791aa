//! `database.properties` handling.
//!
//! The file lives in the data directory. On first run the bundled template is
//! written there so operators have something to edit.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod};
use ini::Ini;

use crate::SetupError;

pub const PROPERTIES_FILE: &str = "database.properties";
pub const DEFAULT_PROPERTIES: &str = include_str!("../resources/database.properties");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: usize,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tiles_table: String,
    pub realtime_table: String,
}

impl DatabaseConfig {
    /// Install the template if needed, then read `database.properties` from `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self, SetupError> {
        let path = install_default(data_dir)?;
        let ini = Ini::load_from_file(&path).map_err(|source| SetupError::ConfigRead {
            path: path.clone(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    pub fn parse(text: &str) -> Result<Self, SetupError> {
        let ini = Ini::load_from_str(text).map_err(|e| SetupError::ConfigRead {
            path: PathBuf::from("<inline>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, SetupError> {
        let props = ini.general_section();
        let get = |key: &'static str| -> Option<String> {
            props
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let required = |key: &'static str| get(key).ok_or(SetupError::MissingKey(key));

        let pool_size = match get("pool-size") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(SetupError::InvalidConfig { key: "pool-size", value: raw }),
            },
            None => 10,
        };

        Ok(Self {
            url: required("url")?,
            pool_size,
            username: get("username"),
            password: get("password"),
            tiles_table: table_name("tiles-table", required("tiles-table")?)?,
            realtime_table: table_name("realtime-table", required("realtime-table")?)?,
        })
    }

    /// Replace the configured url, e.g. with `DATABASE_URL`.
    pub fn with_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.url = url;
        }
        self
    }

    pub(crate) fn pool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.url = Some(self.url.clone());
        cfg.user = self.username.clone();
        cfg.password = self.password.clone();
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(self.pool_size));
        cfg
    }
}

/// Table names are spliced into SQL, so only plain identifiers are accepted.
fn table_name(key: &'static str, value: String) -> Result<String, SetupError> {
    let valid = value
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(value)
    } else {
        Err(SetupError::InvalidConfig { key, value })
    }
}

/// Write the bundled template to `<data_dir>/database.properties` unless the
/// file already exists. Returns the path either way.
pub fn install_default(data_dir: &Path) -> Result<PathBuf, SetupError> {
    let path = data_dir.join(PROPERTIES_FILE);
    let install_err = |source| SetupError::ConfigInstall { path: path.clone(), source };

    std::fs::create_dir_all(data_dir).map_err(install_err)?;
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            file.write_all(DEFAULT_PROPERTIES.as_bytes()).map_err(install_err)?;
            log::info!("Installed default database config at {}", path.display());
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => return Err(install_err(e)),
    }
    Ok(path)
}
