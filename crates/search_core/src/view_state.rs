//! The state rendered by the presentation layer and the display mode derived
//! from it.

use std::collections::HashSet;

use serde::Serialize;
use shared::domain::{Airport, Favorite, RouteKey};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub search_text: String,
    pub candidate_airports: Vec<Airport>,
    pub destinations: Vec<Airport>,
    pub favorites: Vec<Favorite>,
    pub selected_airport: Option<Airport>,
    pub airports_selected: bool,
    pub is_favorites_grid: bool,
    pub favorite_routes: HashSet<RouteKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Destinations reachable from the selected departure airport.
    Destinations,
    /// Autocomplete candidates for the typed text.
    Candidates,
    Favorites,
    /// Nothing typed and nothing saved.
    Empty,
}

/// A state none of the four display modes covers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnresolvedDisplay {
    #[error("no airports match '{search_text}'")]
    NoCandidates { search_text: String },
    #[error("airport {departure_code} is selected but has no destinations")]
    NoDestinations { departure_code: String },
}

impl ViewState {
    pub fn display_mode(&self) -> Result<DisplayMode, UnresolvedDisplay> {
        let showing_destinations = self.selected_airport.is_some() && !self.destinations.is_empty();
        match (
            showing_destinations,
            self.search_text.is_empty(),
            self.candidate_airports.is_empty(),
            self.favorites.is_empty(),
        ) {
            (true, _, _, _) => Ok(DisplayMode::Destinations),
            (false, false, false, _) => Ok(DisplayMode::Candidates),
            (false, true, _, false) => Ok(DisplayMode::Favorites),
            (false, true, _, true) => Ok(DisplayMode::Empty),
            (false, false, true, _) => Err(match &self.selected_airport {
                Some(airport) => UnresolvedDisplay::NoDestinations {
                    departure_code: airport.iata_code.clone(),
                },
                None => UnresolvedDisplay::NoCandidates {
                    search_text: self.search_text.clone(),
                },
            }),
        }
    }

    pub fn is_favorite(&self, departure_code: &str, destination_code: &str) -> bool {
        self.favorite_routes
            .contains(&RouteKey::new(departure_code, destination_code))
    }
}
