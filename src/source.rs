//! The contract every anime source implements.

use crate::error::{Result, SourceError};
use crate::filters::FilterList;
use crate::hosters::HosterDispatcher;
use crate::http_client::EnhancedHttpClient;
use crate::metrics::MetricsTracker;
use crate::models::{AnimeDetails, AnimesPage, EpisodeRef, ListingItem, StreamDescriptor};
use crate::preferences::{PreferenceOption, PreferenceStore, SourcePreferences};
use async_trait::async_trait;
use std::sync::Arc;

/// Shared collaborators handed to every source at construction.
#[derive(Clone)]
pub struct SourceContext {
    pub client: EnhancedHttpClient,
    pub store: Arc<dyn PreferenceStore>,
    pub metrics: MetricsTracker,
}

impl SourceContext {
    pub fn new(client: EnhancedHttpClient, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            client,
            store,
            metrics: MetricsTracker::new(),
        }
    }

    pub fn preferences(&self, source_id: &str) -> SourcePreferences {
        SourcePreferences::new(self.store.clone(), source_id)
    }

    /// Dispatcher with every extractor, recording into the shared metrics.
    /// Extractors get a single-attempt client: a failed mirror is dropped.
    pub fn dispatcher(&self) -> HosterDispatcher {
        HosterDispatcher::new(&self.client.without_retries()).with_metrics(self.metrics.clone())
    }
}

#[async_trait]
pub trait AnimeSource: Send + Sync {
    /// Stable identifier, also the preference namespace.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn lang(&self) -> &'static str;

    fn base_url(&self) -> String;

    fn supports_latest(&self) -> bool;

    async fn list_popular(&self, page: u32) -> Result<AnimesPage>;

    async fn list_latest(&self, _page: u32) -> Result<AnimesPage> {
        Err(SourceError::Unsupported("latest updates"))
    }

    async fn search(&self, page: u32, query: &str, filters: &FilterList) -> Result<AnimesPage>;

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails>;

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>>;

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>>;

    fn filter_list(&self) -> FilterList {
        FilterList::default()
    }

    async fn configurable_options(&self) -> Vec<PreferenceOption> {
        Vec::new()
    }

    /// Deep-link search query for a site URL, if the source understands one.
    fn query_from_url(&self, _url: &str) -> Option<String> {
        None
    }
}
