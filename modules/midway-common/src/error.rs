use thiserror::Error;

#[derive(Error, Debug)]
pub enum MidwayError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Geocoding error: {0}")]
    Geocode(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("No usable coordinates to compute a meeting point")]
    NoCoordinates,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
