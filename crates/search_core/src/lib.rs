use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::domain::{Airport, Favorite};
use storage::{FavoriteRepository, Preferences, Storage};
use tokio::sync::watch;

pub mod error;
mod route_locks;
mod view_model;
pub mod view_state;

pub use error::SearchError;
pub use route_locks::{RouteGuard, RouteLocks};
pub use view_model::SearchViewModel;
pub use view_state::{DisplayMode, UnresolvedDisplay, ViewState};

/// Read-only access to the airport dataset.
#[async_trait]
pub trait AirportLookup: Send + Sync {
    /// Case-sensitive substring match on name or code, busiest first.
    /// Never called with an empty query.
    async fn find_by_text(&self, query: &str) -> Result<Vec<Airport>>;
    async fn list_all(&self) -> Result<Vec<Airport>>;
    async fn find_by_code(&self, iata_code: &str) -> Result<Option<Airport>>;
}

#[async_trait]
pub trait FavoriteStore: Send + Sync {
    async fn add(&self, departure_code: &str, destination_code: &str) -> Result<()>;
    async fn remove_by_codes(&self, departure_code: &str, destination_code: &str) -> Result<()>;
    async fn find_by_codes(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<Option<Favorite>>;
    /// Live listing; the receiver starts at the current rows and sees every
    /// change until it is dropped.
    fn subscribe(&self) -> watch::Receiver<Vec<Favorite>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn save_search_text(&self, text: &str) -> Result<()>;
    async fn save_favorites_grid(&self, is_grid: bool) -> Result<()>;
    fn subscribe_search_text(&self) -> watch::Receiver<String>;
    fn subscribe_favorites_grid(&self) -> watch::Receiver<bool>;
}

#[async_trait]
impl AirportLookup for Storage {
    async fn find_by_text(&self, query: &str) -> Result<Vec<Airport>> {
        self.airports_matching(query).await
    }

    async fn list_all(&self) -> Result<Vec<Airport>> {
        self.list_airports().await
    }

    async fn find_by_code(&self, iata_code: &str) -> Result<Option<Airport>> {
        self.airport_by_code(iata_code).await
    }
}

#[async_trait]
impl FavoriteStore for FavoriteRepository {
    async fn add(&self, departure_code: &str, destination_code: &str) -> Result<()> {
        FavoriteRepository::add(self, departure_code, destination_code)
            .await
            .map(|_| ())
    }

    async fn remove_by_codes(&self, departure_code: &str, destination_code: &str) -> Result<()> {
        FavoriteRepository::remove_by_codes(self, departure_code, destination_code)
            .await
            .map(|_| ())
    }

    async fn find_by_codes(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<Option<Favorite>> {
        FavoriteRepository::find_by_codes(self, departure_code, destination_code).await
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Favorite>> {
        FavoriteRepository::subscribe(self)
    }
}

#[async_trait]
impl PreferenceStore for Preferences {
    async fn save_search_text(&self, text: &str) -> Result<()> {
        self.set_search_text(text).await
    }

    async fn save_favorites_grid(&self, is_grid: bool) -> Result<()> {
        self.set_favorites_grid(is_grid).await
    }

    fn subscribe_search_text(&self) -> watch::Receiver<String> {
        Preferences::subscribe_search_text(self)
    }

    fn subscribe_favorites_grid(&self) -> watch::Receiver<bool> {
        Preferences::subscribe_favorites_grid(self)
    }
}

/// Everything the view model needs, built once at the application root and
/// handed down.
#[derive(Clone)]
pub struct SearchContext {
    pub airports: Arc<dyn AirportLookup>,
    pub favorites: Arc<dyn FavoriteStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

impl SearchContext {
    pub async fn from_storage(storage: Storage) -> Result<Self> {
        let favorites = FavoriteRepository::open(storage.clone())
            .await
            .context("failed to load favorites")?;
        let preferences = Preferences::open(&storage)
            .await
            .context("failed to load preferences")?;
        Ok(Self {
            airports: Arc::new(storage),
            favorites: Arc::new(favorites),
            preferences: Arc::new(preferences),
        })
    }

    pub async fn open(database_url: &str) -> Result<Self> {
        let storage = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to open flight database at '{database_url}'"))?;
        Self::from_storage(storage).await
    }
}
