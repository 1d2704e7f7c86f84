use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Airport, AirportId, Favorite, FavoriteId};

pub mod dataset;
pub mod favorites;
pub mod preferences;

pub use dataset::{install_bundled_dataset, DatasetError, DatasetInstall};
pub use favorites::FavoriteRepository;
pub use preferences::Preferences;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply schema migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Airports whose name or IATA code contains `query` (case-sensitive),
    /// busiest first. Equal passenger counts keep row order.
    pub async fn airports_matching(&self, query: &str) -> Result<Vec<Airport>> {
        let rows = sqlx::query(
            "SELECT id, iata_code, name, passengers
             FROM airport
             WHERE instr(name, ?1) > 0 OR instr(iata_code, ?1) > 0
             ORDER BY passengers DESC, id ASC",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("airport search failed for query '{query}'"))?;
        Ok(rows.iter().map(airport_from_row).collect())
    }

    pub async fn list_airports(&self) -> Result<Vec<Airport>> {
        let rows = sqlx::query("SELECT id, iata_code, name, passengers FROM airport ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("failed to list airports")?;
        Ok(rows.iter().map(airport_from_row).collect())
    }

    pub async fn airport_by_code(&self, iata_code: &str) -> Result<Option<Airport>> {
        let row = sqlx::query(
            "SELECT id, iata_code, name, passengers FROM airport WHERE iata_code = ? LIMIT 1",
        )
        .bind(iata_code)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("airport lookup failed for code '{iata_code}'"))?;
        Ok(row.as_ref().map(airport_from_row))
    }

    pub async fn insert_favorite(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<FavoriteId> {
        let rec = sqlx::query(
            "INSERT INTO favorite (departure_code, destination_code) VALUES (?, ?) RETURNING id",
        )
        .bind(departure_code)
        .bind(destination_code)
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!("failed to insert favorite {departure_code} -> {destination_code}")
        })?;
        Ok(FavoriteId(rec.get::<i64, _>(0)))
    }

    /// Deletes every row for the pair and returns how many went away.
    pub async fn delete_favorites_by_codes(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM favorite WHERE departure_code = ? AND destination_code = ?",
        )
        .bind(departure_code)
        .bind(destination_code)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!("failed to delete favorite {departure_code} -> {destination_code}")
        })?;
        Ok(result.rows_affected())
    }

    pub async fn favorite_by_codes(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<Option<Favorite>> {
        let row = sqlx::query(
            "SELECT id, departure_code, destination_code
             FROM favorite
             WHERE departure_code = ? AND destination_code = ?
             ORDER BY id
             LIMIT 1",
        )
        .bind(departure_code)
        .bind(destination_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(favorite_from_row))
    }

    pub async fn list_favorites(&self) -> Result<Vec<Favorite>> {
        let rows =
            sqlx::query("SELECT id, departure_code, destination_code FROM favorite ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .context("failed to list favorites")?;
        Ok(rows.iter().map(favorite_from_row).collect())
    }
}

fn airport_from_row(row: &SqliteRow) -> Airport {
    Airport {
        id: AirportId(row.get::<i64, _>("id")),
        iata_code: row.get::<String, _>("iata_code"),
        name: row.get::<String, _>("name"),
        passengers: row.get::<i64, _>("passengers"),
    }
}

fn favorite_from_row(row: &SqliteRow) -> Favorite {
    Favorite {
        id: FavoriteId(row.get::<i64, _>("id")),
        departure_code: row.get::<String, _>("departure_code"),
        destination_code: row.get::<String, _>("destination_code"),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// Filesystem path behind a `sqlite:` url, or `None` for in-memory databases.
pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
