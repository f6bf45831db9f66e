use super::playlist::fetch_variants;
use super::Extractor;
use crate::error::Result;
use crate::helpers::{origin_of, substring_after_last, substring_before};
use crate::http_client::{header_map, referer_headers, EnhancedHttpClient};
use crate::models::{StreamDescriptor, Track};
use async_trait::async_trait;
use serde::Deserialize;

/// RapidCloud / MegaCloud embeds: `getSources` JSON, then the HLS master playlist.
pub struct RapidCloudExtractor {
    client: EnhancedHttpClient,
}

impl RapidCloudExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct SourcesResponse {
    /// An array of files when unencrypted, an opaque string otherwise.
    #[serde(default)]
    sources: serde_json::Value,
    #[serde(default)]
    tracks: Vec<TrackDto>,
}

#[derive(Deserialize)]
struct SourceFile {
    file: String,
}

#[derive(Deserialize)]
struct TrackDto {
    file: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    kind: String,
}

pub(crate) fn sources_url(embed_url: &str) -> Option<String> {
    let host = origin_of(embed_url)?;
    let id = substring_before(substring_after_last(embed_url, "/"), "?");
    if id.is_empty() {
        return None;
    }
    Some(format!("{}/ajax/embed-6/getSources?id={}", host, id))
}

/// Master playlist URL and caption tracks; `None` when sources are encrypted or missing.
fn parse_sources(body: &str) -> Result<Option<(String, Vec<Track>)>> {
    let response: SourcesResponse = serde_json::from_str(body)?;
    if !response.sources.is_array() {
        return Ok(None);
    }
    let files: Vec<SourceFile> = serde_json::from_value(response.sources)?;
    let Some(master) = files.into_iter().next() else {
        return Ok(None);
    };

    let captions = response
        .tracks
        .into_iter()
        .filter(|t| t.kind == "captions")
        .map(|t| Track::new(t.file, t.label))
        .collect();
    Ok(Some((master.file, captions)))
}

#[async_trait]
impl Extractor for RapidCloudExtractor {
    /// `prefix` is the episode type ("sub"/"dub") and ends up after the resolution.
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let Some(api) = sources_url(url) else {
            return Ok(Vec::new());
        };
        let headers = header_map(&[("Referer", url), ("X-Requested-With", "XMLHttpRequest")]);
        let body = self.client.get_text_with_headers(&api, &headers).await?;

        let Some((master_url, subtitles)) = parse_sources(&body)? else {
            log::debug!("RapidCloud sources unavailable for {}", url);
            return Ok(Vec::new());
        };

        let variants = fetch_variants(&self.client, &master_url, &referer_headers(url)).await?;
        Ok(variants
            .into_iter()
            .map(|variant| {
                let resolution = variant.quality_or("auto");
                let quality = if prefix.is_empty() {
                    resolution
                } else {
                    format!("{} - {}", resolution, prefix)
                };
                StreamDescriptor::new(variant.url, quality).with_subtitles(subtitles.clone())
            })
            .collect())
    }
}
