//! Registry of every source, keyed by source id.

use crate::error::{Result, SourceError};
use crate::source::{AnimeSource, SourceContext};
use crate::sources::{
    animesonlinex::AnimesOnlineX, einfach::Einfach, jellyfin::Jellyfin, latanime::Latanime,
    vizer::Vizer, voircartoon::VoirCartoon, zoro::Zoro,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct SourceRegistry {
    sources: HashMap<&'static str, Arc<dyn AnimeSource>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.ids())
            .finish()
    }
}

impl SourceRegistry {
    /// Registry with all available sources.
    pub fn new(ctx: &SourceContext) -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(Einfach::new(ctx)));
        registry.register(Arc::new(Zoro::new(ctx)));
        registry.register(Arc::new(Latanime::new(ctx)));
        registry.register(Arc::new(AnimesOnlineX::new(ctx)));
        registry.register(Arc::new(VoirCartoon::new(ctx)));
        registry.register(Arc::new(Jellyfin::new(ctx)));
        registry.register(Arc::new(Vizer::new(ctx)));

        log::debug!("Registered {} sources", registry.sources.len());
        registry
    }

    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Add a source, replacing any source with the same id.
    pub fn register(&mut self, source: Arc<dyn AnimeSource>) {
        if self.sources.insert(source.id(), source.clone()).is_some() {
            log::warn!("Source '{}' registered twice, keeping the latest", source.id());
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn AnimeSource>> {
        self.sources
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSource(id.to_string()))
    }

    /// Sorted source ids.
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.sources.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn all(&self) -> Vec<Arc<dyn AnimeSource>> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.sources.get(id).cloned())
            .collect()
    }
}
