pub mod admin;
pub mod app;
pub mod backfill;
pub mod cache; // series snapshots + staleness-driven reads
pub mod catalog;
pub mod config;
pub mod coordination; // fetch lock, work queue, kick lock, progress
pub mod error;
pub mod events;
pub mod feed;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod testing; // in-process doubles for NRK and pacing
pub mod utils;
pub mod worker;

pub use app::App;
pub use cache::{CacheMissMode, SeriesCache, SeriesStore};
pub use error::{NrssError, Result};
pub use feed::{FeedService, SeriesLookup};
pub use model::{Episode, Series};
pub use worker::{KickOutcome, Worker};
