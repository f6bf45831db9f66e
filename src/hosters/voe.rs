use super::playlist::fetch_variants;
use super::Extractor;
use crate::error::Result;
use crate::http_client::{referer_headers, EnhancedHttpClient};
use crate::models::StreamDescriptor;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HLS_SOURCE: Regex = Regex::new(r#"['"]hls['"]\s*:\s*['"]([^'"]+)['"]"#).unwrap();
    static ref VIDEO_HEIGHT: Regex = Regex::new(r#"['"]video_height['"]\s*:\s*(\d+)"#).unwrap();
}

pub struct VoeExtractor {
    client: EnhancedHttpClient,
}

impl VoeExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

pub(crate) fn hls_source(page: &str) -> Option<(String, Option<u32>)> {
    let url = HLS_SOURCE.captures(page)?.get(1)?.as_str().to_string();
    let height = VIDEO_HEIGHT
        .captures(page)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    Some((url, height))
}

#[async_trait]
impl Extractor for VoeExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let page = self.client.get_text(url).await?;
        let Some((master_url, height)) = hls_source(&page) else {
            return Ok(Vec::new());
        };

        let fallback = match height {
            Some(h) => format!("{}p", h),
            None => "HLS".to_string(),
        };

        let variants = match fetch_variants(&self.client, &master_url, &referer_headers(url)).await {
            Ok(variants) => variants,
            Err(e) => {
                log::debug!("Voe master playlist unavailable, using it as-is: {}", e);
                return Ok(vec![StreamDescriptor::new(
                    master_url,
                    format!("{}Voe: {}", prefix, fallback),
                )]);
            }
        };

        Ok(variants
            .into_iter()
            .map(|variant| {
                let quality = format!("{}Voe: {}", prefix, variant.quality_or(&fallback));
                StreamDescriptor::new(variant.url, quality)
            })
            .collect())
    }
}
