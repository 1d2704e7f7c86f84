use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(AirportId);
id_newtype!(FavoriteId);

/// A row of the bundled airport dataset. Never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airport {
    pub id: AirportId,
    pub iata_code: String,
    pub name: String,
    pub passengers: i64,
}

/// A saved departure -> destination pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub departure_code: String,
    pub destination_code: String,
}

impl Favorite {
    pub fn route(&self) -> RouteKey {
        RouteKey::new(&self.departure_code, &self.destination_code)
    }
}

/// Ordered (departure, destination) pair. `JFK -> LAX` and `LAX -> JFK` are
/// distinct routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub departure_code: String,
    pub destination_code: String,
}

impl RouteKey {
    pub fn new(departure_code: impl Into<String>, destination_code: impl Into<String>) -> Self {
        Self {
            departure_code: departure_code.into(),
            destination_code: destination_code.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.departure_code, self.destination_code)
    }
}
