pub mod center;
pub mod enrich;
pub mod fetch;
pub mod listing;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod retry;
pub mod traits;
