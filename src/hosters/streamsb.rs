use super::playlist::fetch_variants;
use super::Extractor;
use crate::error::Result;
use crate::helpers::{origin_of, substring_after, substring_before};
use crate::http_client::{header_map, EnhancedHttpClient};
use crate::models::{StreamDescriptor, Track};
use async_trait::async_trait;
use serde::Deserialize;

const SOURCES_PATH: &str = "sources16";

pub struct StreamSbExtractor {
    client: EnhancedHttpClient,
}

impl StreamSbExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct SourcesResponse {
    stream_data: StreamData,
}

#[derive(Deserialize)]
struct StreamData {
    file: String,
    #[serde(default)]
    subs: Vec<Subtitle>,
}

#[derive(Deserialize)]
struct Subtitle {
    file: String,
    label: String,
}

fn to_hex(input: &str) -> String {
    input.bytes().map(|b| format!("{:02x}", b)).collect()
}

/// Video id from `/e/<id>.html`, `/play/<id>?...` or `/<id>` embed URLs.
pub(crate) fn video_id(url: &str) -> String {
    let tail = if url.contains("/e/") {
        substring_after(url, "/e/")
    } else if url.contains("/play/") {
        substring_after(url, "/play/")
    } else {
        crate::helpers::substring_after_last(url, "/")
    };
    substring_before(substring_before(tail, ".html"), "?").to_string()
}

pub(crate) fn sources_url(host: &str, id: &str) -> String {
    format!(
        "{}/{}/{}/",
        host,
        SOURCES_PATH,
        to_hex(&format!("||{}||||streamsb", id))
    )
}

#[async_trait]
impl Extractor for StreamSbExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let Some(host) = origin_of(url) else {
            return Ok(Vec::new());
        };
        let referer = format!("{}/", host);
        let headers = header_map(&[("Referer", referer.as_str()), ("watchsb", "sbstream")]);

        let response: SourcesResponse = self
            .client
            .get_json(&sources_url(&host, &video_id(url)), Some(&headers))
            .await?;

        let subtitles: Vec<Track> = response
            .stream_data
            .subs
            .into_iter()
            .map(|s| Track::new(s.file, s.label))
            .collect();

        let variants = fetch_variants(&self.client, &response.stream_data.file, &headers).await?;
        Ok(variants
            .into_iter()
            .map(|variant| {
                StreamDescriptor::new(
                    variant.url.clone(),
                    format!("{}StreamSB:{}", prefix, variant.quality_or("auto")),
                )
                .with_header("Referer", referer.clone())
                .with_subtitles(subtitles.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id() {
        assert_eq!(video_id("https://watchsb.com/e/abc123.html"), "abc123");
        assert_eq!(video_id("https://sbfull.com/play/xyz?auto=1"), "xyz");
        assert_eq!(video_id("https://sbplay.one/def"), "def");
    }

    #[test]
    fn test_sources_url_is_hex_encoded() {
        assert_eq!(
            sources_url("https://watchsb.com", "ab"),
            "https://watchsb.com/sources16/7c7c61627c7c7c7c73747265616d7362/"
        );
    }
}
