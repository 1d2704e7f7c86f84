//! The search/selection state machine behind the flight search screen.
//!
//! Every transition runs under one session lock, so readers of the published
//! [`ViewState`] never see a half-applied update. Lookups run outside the lock
//! and are tagged with the generation that issued them; a result whose
//! generation is no longer current is dropped.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex as StdMutex, Weak},
};

use shared::domain::{Airport, Favorite, RouteKey};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{error::SearchError, route_locks::RouteLocks, SearchContext, ViewState};

struct Session {
    /// Bumped by every transition that makes in-flight lookups stale.
    generation: u64,
}

pub struct SearchViewModel {
    ctx: SearchContext,
    session: Mutex<Session>,
    state: watch::Sender<ViewState>,
    route_locks: RouteLocks,
    pending_search_text: watch::Sender<(u64, String)>,
    persisted_seq: Arc<watch::Sender<u64>>,
    restored: watch::Sender<bool>,
    subscriptions: StdMutex<Vec<JoinHandle<()>>>,
}

impl SearchViewModel {
    /// Builds the view model and starts its background work: restoring the
    /// persisted search text, mirroring the favorites listing and layout
    /// preference, and writing typed search text back to preferences.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(ctx: SearchContext) -> Arc<Self> {
        let (state, _) = watch::channel(ViewState::default());
        let (pending_search_text, pending_rx) = watch::channel((0, String::new()));
        let (persisted_seq, _) = watch::channel(0);
        let persisted_seq = Arc::new(persisted_seq);
        let (restored, _) = watch::channel(false);

        let view_model = Arc::new(Self {
            ctx,
            session: Mutex::new(Session { generation: 0 }),
            state,
            route_locks: RouteLocks::default(),
            pending_search_text,
            persisted_seq,
            restored,
            subscriptions: StdMutex::new(Vec::new()),
        });

        let subscriptions = vec![
            tokio::spawn(watch_favorites(
                Arc::downgrade(&view_model),
                view_model.ctx.favorites.subscribe(),
            )),
            tokio::spawn(watch_favorites_grid(
                Arc::downgrade(&view_model),
                view_model.ctx.preferences.subscribe_favorites_grid(),
            )),
            tokio::spawn(restore_search_text(
                Arc::downgrade(&view_model),
                view_model.ctx.preferences.subscribe_search_text(),
            )),
        ];
        *view_model
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = subscriptions;

        // Not tracked with the subscriptions: it drains the last queued write
        // and exits on its own once the view model is gone.
        tokio::spawn(persist_search_text(
            Arc::clone(&view_model.ctx.preferences),
            pending_rx,
            Arc::clone(&view_model.persisted_seq),
        ));

        view_model
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// The user typed. Resets any selection, queues the text for persistence
    /// and derives the result set for it.
    pub async fn on_search_text_changed(&self, text: &str) -> Result<(), SearchError> {
        let generation = {
            let mut session = self.session.lock().await;
            let generation = Self::advance(&mut session);
            self.state.send_modify(|view| {
                view.search_text = text.to_string();
                view.airports_selected = false;
                view.selected_airport = None;
                view.destinations.clear();
            });
            self.queue_search_text_write(text);
            generation
        };
        self.derive_results(generation, text).await
    }

    /// The user picked a departure airport from the candidates.
    pub async fn on_airport_selected(&self, airport: Airport) -> Result<(), SearchError> {
        let generation = {
            let mut session = self.session.lock().await;
            Self::advance(&mut session)
        };

        let all = self.ctx.airports.list_all().await.map_err(|error| {
            warn!(
                error = %format!("{error:#}"),
                departure = %airport.iata_code,
                "failed to load destinations"
            );
            SearchError::Lookup(error)
        })?;
        let destinations: Vec<Airport> = all
            .into_iter()
            .filter(|candidate| candidate.iata_code != airport.iata_code)
            .collect();

        let session = self.session.lock().await;
        if session.generation != generation {
            debug!(departure = %airport.iata_code, "selection superseded, dropping destinations");
            return Ok(());
        }
        info!(
            departure = %airport.iata_code,
            destinations = destinations.len(),
            "airport selected"
        );
        self.state.send_modify(|view| {
            view.search_text = airport.iata_code.clone();
            view.destinations = destinations;
            view.selected_airport = Some(airport);
            view.airports_selected = true;
        });
        Ok(())
    }

    /// Drops the selected airport and its destinations, then derives results
    /// for the text that is left. Supersedes any in-flight selection or search.
    pub async fn clear_selected_airport(&self) -> Result<(), SearchError> {
        let (generation, text) = {
            let mut session = self.session.lock().await;
            let generation = Self::advance(&mut session);
            let mut text = String::new();
            self.state.send_modify(|view| {
                view.airports_selected = false;
                view.selected_airport = None;
                view.destinations.clear();
                text = view.search_text.clone();
            });
            (generation, text)
        };
        self.derive_results(generation, &text).await
    }

    /// Flips the saved state of a route and returns whether it is now a
    /// favorite. Toggles on the same route are serialized end to end.
    pub async fn toggle_favorite(
        &self,
        departure_code: &str,
        destination_code: &str,
    ) -> Result<bool, SearchError> {
        let route = RouteKey::new(departure_code, destination_code);
        let _route_guard = self.route_locks.lock(&route).await;

        let existing = self
            .ctx
            .favorites
            .find_by_codes(departure_code, destination_code)
            .await
            .map_err(|error| favorite_store_failed(&route, error))?;

        let now_favorite = if existing.is_some() {
            self.ctx
                .favorites
                .remove_by_codes(departure_code, destination_code)
                .await
                .map_err(|error| favorite_store_failed(&route, error))?;
            false
        } else {
            self.ctx
                .favorites
                .add(departure_code, destination_code)
                .await
                .map_err(|error| favorite_store_failed(&route, error))?;
            true
        };

        let _session = self.session.lock().await;
        self.state.send_modify(|view| {
            if now_favorite {
                view.favorite_routes.insert(route.clone());
            } else {
                view.favorite_routes.remove(&route);
            }
        });
        info!(%route, now_favorite, "favorite toggled");
        Ok(now_favorite)
    }

    /// Answers from the published index only; never queries the store.
    pub fn is_favorite(&self, departure_code: &str, destination_code: &str) -> bool {
        self.state
            .borrow()
            .is_favorite(departure_code, destination_code)
    }

    pub async fn set_favorites_grid(&self, is_grid: bool) -> Result<(), SearchError> {
        self.ctx
            .preferences
            .save_favorites_grid(is_grid)
            .await
            .map_err(|error| {
                warn!(error = %format!("{error:#}"), is_grid, "failed to persist favorites layout");
                SearchError::Preferences(error)
            })?;
        self.apply_favorites_grid(is_grid).await;
        Ok(())
    }

    pub async fn airport_by_code(&self, iata_code: &str) -> Result<Option<Airport>, SearchError> {
        self.ctx
            .airports
            .find_by_code(iata_code)
            .await
            .map_err(SearchError::Lookup)
    }

    /// Resolves once the startup restore has run (or was skipped because the
    /// user searched first).
    pub async fn ready(&self) {
        let mut restored = self.restored.subscribe();
        let _ = restored.wait_for(|done| *done).await;
    }

    /// Resolves once every search text queued so far has been written (or
    /// has failed to write) to the preference store.
    pub async fn flush_preferences(&self) {
        let target = self.pending_search_text.borrow().0;
        let mut persisted = self.persisted_seq.subscribe();
        let _ = persisted.wait_for(|seq| *seq >= target).await;
    }

    fn advance(session: &mut Session) -> u64 {
        session.generation += 1;
        session.generation
    }

    fn queue_search_text_write(&self, text: &str) {
        self.pending_search_text.send_modify(|(seq, pending)| {
            *seq += 1;
            *pending = text.to_string();
        });
    }

    async fn derive_results(&self, generation: u64, text: &str) -> Result<(), SearchError> {
        if text.is_empty() {
            // The published listing is read under the session lock, so it is
            // never older than the index a completed toggle left behind.
            let listing = self.ctx.favorites.subscribe();
            self.apply_if_current(generation, |view| {
                let favorites = listing.borrow().clone();
                debug!(favorites = favorites.len(), "favorites loaded");
                view.favorite_routes = route_index(&favorites);
                view.favorites = favorites;
                view.candidate_airports.clear();
            })
            .await;
        } else {
            let airports = self.ctx.airports.find_by_text(text).await.map_err(|error| {
                warn!(error = %format!("{error:#}"), query = text, "airport search failed");
                SearchError::Lookup(error)
            })?;
            self.apply_if_current(generation, |view| {
                debug!(query = text, airports = airports.len(), "airports loaded");
                view.candidate_airports = airports;
                view.favorites.clear();
            })
            .await;
        }
        Ok(())
    }

    async fn apply_if_current(&self, generation: u64, apply: impl FnOnce(&mut ViewState)) {
        let session = self.session.lock().await;
        if session.generation != generation {
            debug!(
                generation,
                current = session.generation,
                "discarding superseded results"
            );
            return;
        }
        self.state.send_modify(|view| {
            if !view.airports_selected {
                apply(view);
            }
        });
    }

    async fn apply_favorites_listing(&self, listing: &mut watch::Receiver<Vec<Favorite>>) {
        let _session = self.session.lock().await;
        let favorites = listing.borrow_and_update().clone();
        self.state.send_modify(|view| {
            view.favorite_routes = route_index(&favorites);
            if !view.airports_selected && view.search_text.is_empty() {
                view.favorites = favorites;
            }
        });
    }

    async fn apply_favorites_grid(&self, is_grid: bool) {
        let _session = self.session.lock().await;
        self.state.send_if_modified(|view| {
            let changed = view.is_favorites_grid != is_grid;
            view.is_favorites_grid = is_grid;
            changed
        });
    }

    /// Seeds the search text from preferences unless the user already acted.
    async fn restore(&self, saved_text: String) {
        let generation = {
            let mut session = self.session.lock().await;
            if session.generation != 0 {
                debug!("skipping search text restore, user already searched");
                self.restored.send_replace(true);
                return;
            }
            let generation = Self::advance(&mut session);
            self.state.send_modify(|view| view.search_text = saved_text.clone());
            generation
        };
        info!(search_text = %saved_text, "restored search text");
        // Failures are already logged and leave the restored text in place.
        let _ = self.derive_results(generation, &saved_text).await;
        self.restored.send_replace(true);
    }
}

impl Drop for SearchViewModel {
    fn drop(&mut self) {
        let subscriptions = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for task in subscriptions.drain(..) {
            task.abort();
        }
    }
}

fn favorite_store_failed(route: &RouteKey, error: anyhow::Error) -> SearchError {
    warn!(error = %format!("{error:#}"), %route, "favorite toggle failed");
    SearchError::FavoriteStore(error)
}

fn route_index(favorites: &[Favorite]) -> HashSet<RouteKey> {
    favorites.iter().map(Favorite::route).collect()
}

async fn watch_favorites(
    view_model: Weak<SearchViewModel>,
    mut listing: watch::Receiver<Vec<Favorite>>,
) {
    loop {
        let Some(vm) = view_model.upgrade() else {
            return;
        };
        vm.apply_favorites_listing(&mut listing).await;
        drop(vm);
        if listing.changed().await.is_err() {
            return;
        }
    }
}

async fn watch_favorites_grid(view_model: Weak<SearchViewModel>, mut grid: watch::Receiver<bool>) {
    loop {
        let is_grid = *grid.borrow_and_update();
        let Some(vm) = view_model.upgrade() else {
            return;
        };
        vm.apply_favorites_grid(is_grid).await;
        drop(vm);
        if grid.changed().await.is_err() {
            return;
        }
    }
}

async fn restore_search_text(view_model: Weak<SearchViewModel>, saved: watch::Receiver<String>) {
    let saved_text = saved.borrow().clone();
    drop(saved);
    if let Some(vm) = view_model.upgrade() {
        vm.restore(saved_text).await;
    }
}

async fn persist_search_text(
    preferences: Arc<dyn crate::PreferenceStore>,
    mut pending: watch::Receiver<(u64, String)>,
    persisted_seq: Arc<watch::Sender<u64>>,
) {
    while pending.changed().await.is_ok() {
        let (seq, text) = pending.borrow_and_update().clone();
        if let Err(error) = preferences.save_search_text(&text).await {
            warn!(error = %format!("{error:#}"), "failed to persist search text");
        }
        persisted_seq.send_replace(seq);
    }
}

#[cfg(test)]
#[path = "tests/view_model_tests.rs"]
mod tests;
