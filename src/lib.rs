// Library interface for rust_anime_scraper
// The CLI and the integration tests drive sources through these modules

pub mod config;
pub mod error;
pub mod filters;
pub mod helpers;
pub mod hosters;
pub mod http_client;
pub mod metrics;
pub mod models;
pub mod preferences;
pub mod registry;
pub mod resolver;
pub mod sorting;
pub mod source;
pub mod sources;

pub use error::{Result, SourceError};
pub use registry::SourceRegistry;
pub use source::{AnimeSource, SourceContext};
