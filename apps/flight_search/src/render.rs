//! Plain-text and JSON rendering of the view state.

use std::fmt::Write;

use search_core::{DisplayMode, UnresolvedDisplay, ViewState};
use serde::Serialize;
use shared::domain::{Airport, Favorite};

const GRID_COLUMNS: usize = 3;

#[derive(Serialize)]
struct Snapshot<'a> {
    display_mode: Option<DisplayMode>,
    unresolved: Option<String>,
    state: &'a ViewState,
}

pub fn to_json(state: &ViewState) -> serde_json::Result<String> {
    let (display_mode, unresolved) = match state.display_mode() {
        Ok(mode) => (Some(mode), None),
        Err(unresolved) => (None, Some(unresolved.to_string())),
    };
    serde_json::to_string_pretty(&Snapshot {
        display_mode,
        unresolved,
        state,
    })
}

pub fn to_text(state: &ViewState) -> Result<String, UnresolvedDisplay> {
    let mut out = String::new();
    match state.display_mode()? {
        DisplayMode::Destinations => {
            let Some(departure) = &state.selected_airport else {
                return Ok(out);
            };
            let _ = writeln!(out, "Flights from {}", airport_label(departure));
            for destination in &state.destinations {
                let star = if state.is_favorite(&departure.iata_code, &destination.iata_code) {
                    '*'
                } else {
                    ' '
                };
                let _ = writeln!(
                    out,
                    "  [{star}] {} -> {}",
                    departure.iata_code,
                    airport_label(destination)
                );
            }
        }
        DisplayMode::Candidates => {
            for airport in &state.candidate_airports {
                let _ = writeln!(
                    out,
                    "  {}  ({} passengers)",
                    airport_label(airport),
                    airport.passengers
                );
            }
        }
        DisplayMode::Favorites if state.is_favorites_grid => {
            let _ = writeln!(out, "Favorite routes");
            for row in state.favorites.chunks(GRID_COLUMNS) {
                let cells: Vec<String> = row.iter().map(route_label).collect();
                let _ = writeln!(out, "  {}", cells.join("    "));
            }
        }
        DisplayMode::Favorites => {
            let _ = writeln!(out, "Favorite routes");
            for favorite in &state.favorites {
                let _ = writeln!(out, "  {}", route_label(favorite));
            }
        }
        DisplayMode::Empty => {
            let _ = writeln!(
                out,
                "No favorite routes yet. Search for an airport to get started."
            );
        }
    }
    Ok(out)
}

fn airport_label(airport: &Airport) -> String {
    format!("{} {}", airport.iata_code, airport.name)
}

fn route_label(favorite: &Favorite) -> String {
    favorite.route().to_string()
}
