//! tripscout: Places search orchestration
//!
//! One façade ([`PlacesEngine`]) over four cooperating parts:
//! - Result cache (TTL + capacity bound, text search and details)
//! - Debounced request controller (one per operation kind)
//! - Provider adapters (unified API first, legacy callback API as fallback)
//! - Metrics accumulator (rolling latency window)

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod model;
pub mod provider;
pub mod state;

pub use config::{PlacesConfig, ProviderMode};
pub use engine::{EngineCacheStats, PlacesEngine};
pub use error::{ErrorKind, PlacesError, Result};
pub use model::{
    AutocompleteOptions, BoundingBox, LatLng, NearbySearchOptions, OperationKind, PlaceRecord,
    Prediction, SearchResult, SourceQuery, TextSearchOptions,
};
pub use state::{ServiceState, SharedState};
