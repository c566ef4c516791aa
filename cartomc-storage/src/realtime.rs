//! The two live JSON documents (players and markers) the web map polls.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::database::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeKind {
    Players,
    Markers,
}

impl RealtimeKind {
    /// Value of the `type` column.
    pub fn code(self) -> &'static str {
        match self {
            RealtimeKind::Players => "P",
            RealtimeKind::Markers => "M",
        }
    }
}

impl FromStr for RealtimeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "players" | "p" => Ok(RealtimeKind::Players),
            "markers" | "m" => Ok(RealtimeKind::Markers),
            other => anyhow::bail!("unknown realtime kind {:?} (expected players or markers)", other),
        }
    }
}

/// One row per [`RealtimeKind`]; writes overwrite.
pub struct RealtimeDataStore {
    db: Arc<Database>,
}

impl RealtimeDataStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn set_realtime_data(&self, kind: RealtimeKind, json: &str) -> Result<()> {
        let result = self.update(kind, json).await;
        if let Err(e) = &result {
            log::error!("Unable to store realtime data {:?}: {:?}", kind, e);
        }
        result
    }

    /// The stored document, or an empty string if there is none or the query failed.
    pub async fn get_realtime_data(&self, kind: RealtimeKind) -> String {
        match self.select(kind).await {
            Ok(data) => data.unwrap_or_default(),
            Err(e) => {
                log::error!("Unable to read realtime data {:?}: {:?}", kind, e);
                String::new()
            }
        }
    }

    pub async fn update_players(&self, json: &str) -> Result<()> {
        self.set_realtime_data(RealtimeKind::Players, json).await
    }

    pub async fn update_markers(&self, json: &str) -> Result<()> {
        self.set_realtime_data(RealtimeKind::Markers, json).await
    }

    pub async fn players(&self) -> String {
        self.get_realtime_data(RealtimeKind::Players).await
    }

    pub async fn markers(&self) -> String {
        self.get_realtime_data(RealtimeKind::Markers).await
    }

    async fn update(&self, kind: RealtimeKind, json: &str) -> Result<()> {
        let client = self.db.client().await?;
        let query = &self.db.queries().update_realtime;
        let updated = client
            .execute(query.as_str(), &[&json, &kind.code()])
            .await
            .with_context(|| format!("Unable to execute query `{}`", query))?;
        if updated == 0 {
            log::warn!("Realtime row {} is missing; run `cartomc init` to recreate it", kind.code());
        }
        Ok(())
    }

    async fn select(&self, kind: RealtimeKind) -> Result<Option<String>> {
        let client = self.db.client().await?;
        let query = &self.db.queries().select_realtime;
        let row = client
            .query_opt(query.as_str(), &[&kind.code()])
            .await
            .with_context(|| format!("Unable to execute query `{}`", query))?;
        match row {
            Some(row) => Ok(row.try_get(0)?),
            None => Ok(None),
        }
    }
}
