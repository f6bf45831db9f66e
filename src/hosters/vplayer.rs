use super::Extractor;
use crate::error::Result;
use crate::helpers::query_param;
use crate::models::StreamDescriptor;
use async_trait::async_trait;

/// Player pages of the form `/vplayer/?source=<direct url>`; no request needed.
pub struct VPlayerExtractor;

#[async_trait]
impl Extractor for VPlayerExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        Ok(query_param(url, "source")
            .filter(|source| !source.is_empty())
            .map(|source| {
                let quality = if prefix.is_empty() {
                    "VPlayer".to_string()
                } else {
                    format!("VPlayer - {}", prefix)
                };
                vec![StreamDescriptor::new(source, quality)]
            })
            .unwrap_or_default())
    }
}
