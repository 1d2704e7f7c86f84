//! Favorite routes with a push-based listing.

use std::sync::Arc;

use anyhow::Result;
use shared::domain::{Favorite, FavoriteId};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::Storage;

/// CRUD over the `favorite` table. Every mutation republishes the full
/// listing to all subscribers.
#[derive(Clone)]
pub struct FavoriteRepository {
    storage: Storage,
    listing: Arc<watch::Sender<Vec<Favorite>>>,
    // Serializes query+publish so an older listing never overwrites a newer one.
    publish_gate: Arc<Mutex<()>>,
}

impl FavoriteRepository {
    pub async fn open(storage: Storage) -> Result<Self> {
        let initial = storage.list_favorites().await?;
        let (listing, _) = watch::channel(initial);
        Ok(Self {
            storage,
            listing: Arc::new(listing),
            publish_gate: Arc::new(Mutex::new(())),
        })
    }

    pub async fn add(&self, departure_code: &str, destination_code: &str) -> Result<FavoriteId> {
        let id = self
            .storage
            .insert_favorite(departure_code, destination_code)
            .await?;
        debug!(favorite_id = id.0, departure_code, destination_code, "favorite added");
        self.republish().await;
        Ok(id)
    }

    pub async fn remove_by_codes(&self, departure_code: &str, destination_code: &str) -> Result<u64> {
        let removed = self
            .storage
            .delete_favorites_by_codes(departure_code, destination_code)
            .await?;
        debug!(removed, departure_code, destination_code, "favorite removed");
        self.republish().await;
        Ok(removed)
    }

    pub async fn find_by_codes(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<Option<Favorite>> {
        self.storage
            .favorite_by_codes(departure_code, destination_code)
            .await
    }

    pub async fn list_all(&self) -> Result<Vec<Favorite>> {
        self.storage.list_favorites().await
    }

    /// Receiver that starts at the current listing and sees every later one.
    /// Dropping it ends the subscription.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Favorite>> {
        self.listing.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listing.receiver_count()
    }

    async fn republish(&self) {
        let _gate = self.publish_gate.lock().await;
        match self.storage.list_favorites().await {
            Ok(favorites) => {
                self.listing.send_replace(favorites);
            }
            Err(error) => {
                // Subscribers keep the previous listing.
                warn!(%error, "failed to refresh favorites listing");
            }
        }
    }
}
