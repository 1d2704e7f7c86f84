use thiserror::Error;

/// A failed store or lookup call. The view state is left as it was before
/// the call.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("airport lookup failed: {0:#}")]
    Lookup(anyhow::Error),
    #[error("favorite store failed: {0:#}")]
    FavoriteStore(anyhow::Error),
    #[error("preference store failed: {0:#}")]
    Preferences(anyhow::Error),
}
