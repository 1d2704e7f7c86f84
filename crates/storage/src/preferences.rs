//! Durable user preferences: the last search text and the favorites layout.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::watch;
use tracing::debug;

use crate::Storage;

const SEARCH_QUERY_KEY: &str = "search_query";
const IS_FAVORITES_GRID_KEY: &str = "is_favorites_grid";

/// Two independent keys. Each write is a single upsert, then the new value is
/// pushed to that key's subscribers.
#[derive(Clone)]
pub struct Preferences {
    pool: Pool<Sqlite>,
    search_text: Arc<watch::Sender<String>>,
    favorites_grid: Arc<watch::Sender<bool>>,
}

impl Preferences {
    pub async fn open(storage: &Storage) -> Result<Self> {
        let pool = storage.pool().clone();
        let search_text = load_value(&pool, SEARCH_QUERY_KEY)
            .await?
            .unwrap_or_default();
        let favorites_grid = load_value(&pool, IS_FAVORITES_GRID_KEY)
            .await?
            .map(|raw| raw == "true")
            .unwrap_or(false);

        let (search_text, _) = watch::channel(search_text);
        let (favorites_grid, _) = watch::channel(favorites_grid);
        Ok(Self {
            pool,
            search_text: Arc::new(search_text),
            favorites_grid: Arc::new(favorites_grid),
        })
    }

    pub fn search_text(&self) -> String {
        self.search_text.borrow().clone()
    }

    pub fn is_favorites_grid(&self) -> bool {
        *self.favorites_grid.borrow()
    }

    pub async fn set_search_text(&self, text: &str) -> Result<()> {
        store_value(&self.pool, SEARCH_QUERY_KEY, text).await?;
        debug!(search_text = text, "search text persisted");
        self.search_text.send_replace(text.to_string());
        Ok(())
    }

    pub async fn set_favorites_grid(&self, is_grid: bool) -> Result<()> {
        store_value(&self.pool, IS_FAVORITES_GRID_KEY, if is_grid { "true" } else { "false" })
            .await?;
        debug!(is_grid, "favorites layout persisted");
        self.favorites_grid.send_replace(is_grid);
        Ok(())
    }

    pub fn subscribe_search_text(&self) -> watch::Receiver<String> {
        self.search_text.subscribe()
    }

    pub fn subscribe_favorites_grid(&self) -> watch::Receiver<bool> {
        self.favorites_grid.subscribe()
    }
}

async fn load_value(pool: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to read preference '{key}'"))?;
    Ok(row.map(|r| r.get::<String, _>(0)))
}

async fn store_value(pool: &Pool<Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO preferences (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .with_context(|| format!("failed to write preference '{key}'"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_when_nothing_is_stored() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let preferences = Preferences::open(&storage).await.expect("preferences");
        assert_eq!(preferences.search_text(), "");
        assert!(!preferences.is_favorites_grid());
    }

    #[tokio::test]
    async fn writes_are_pushed_to_subscribers() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let preferences = Preferences::open(&storage).await.expect("preferences");
        let mut text_rx = preferences.subscribe_search_text();
        let mut grid_rx = preferences.subscribe_favorites_grid();

        preferences.set_search_text("JFK").await.expect("text");
        text_rx.changed().await.expect("text changed");
        assert_eq!(*text_rx.borrow(), "JFK");

        preferences.set_favorites_grid(true).await.expect("grid");
        grid_rx.changed().await.expect("grid changed");
        assert!(*grid_rx.borrow());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let preferences = Preferences::open(&storage).await.expect("preferences");
        preferences.set_favorites_grid(true).await.expect("grid");
        preferences.set_search_text("LA").await.expect("text");
        preferences.set_search_text("").await.expect("clear text");

        let reopened = Preferences::open(&storage).await.expect("reopen");
        assert_eq!(reopened.search_text(), "");
        assert!(reopened.is_favorites_grid());
    }
}
