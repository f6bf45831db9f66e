//! Hosters serving a JW Player (or plain `<video>`) page whose setup lists the
//! stream as `file:"…"`, `src:"…"` or `sources:["…"]`, often inside a packed script.

use super::playlist::fetch_variants;
use super::{unpacker, Extractor};
use crate::error::Result;
use crate::helpers::{absolute_url, origin_of};
use crate::http_client::{referer_headers, EnhancedHttpClient};
use crate::models::StreamDescriptor;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SETUP_SOURCE: Regex = Regex::new(
        r#"(?:file|src|sources)\s*:\s*\[?\s*\{?\s*(?:file\s*:\s*)?["']([^"']+\.(?:m3u8|mp4)[^"']*)["']"#
    )
    .unwrap();
    static ref SOURCE_TAG: Regex =
        Regex::new(r#"<source[^>]+src=["']([^"']+)["']"#).unwrap();
}

pub struct JwPlayerExtractor {
    client: EnhancedHttpClient,
    name: &'static str,
    referer: Option<&'static str>,
}

impl JwPlayerExtractor {
    pub fn new(client: EnhancedHttpClient, name: &'static str) -> Self {
        Self {
            client,
            name,
            referer: None,
        }
    }

    /// Referer the hoster expects on the page and stream requests.
    pub fn with_referer(mut self, referer: &'static str) -> Self {
        self.referer = Some(referer);
        self
    }

    fn referer_for(&self, url: &str) -> String {
        match self.referer {
            Some(referer) => referer.to_string(),
            None => origin_of(url)
                .map(|origin| format!("{}/", origin))
                .unwrap_or_else(|| url.to_string()),
        }
    }
}

/// Stream URLs in document order, without duplicates. Packed scripts are
/// unpacked and searched as well.
pub(crate) fn find_sources(page_url: &str, page: &str) -> Vec<String> {
    let mut haystack = page.to_string();
    if unpacker::is_packed(page) {
        if let Some(unpacked) = unpacker::unpack(page) {
            haystack.push('\n');
            haystack.push_str(&unpacked);
        }
    }

    let mut sources: Vec<String> = Vec::new();
    let found = SETUP_SOURCE
        .captures_iter(&haystack)
        .chain(SOURCE_TAG.captures_iter(&haystack))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().replace("\\/", "/")));
    for source in found {
        let source = absolute_url(page_url, &source);
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

#[async_trait]
impl Extractor for JwPlayerExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let referer = self.referer_for(url);
        let headers = referer_headers(&referer);
        let page = self.client.get_text_with_headers(url, &headers).await?;

        let mut videos = Vec::new();
        for source in find_sources(url, &page) {
            if !source.contains(".m3u8") {
                videos.push(
                    StreamDescriptor::new(source, format!("{}{}", prefix, self.name))
                        .with_header("Referer", referer.clone()),
                );
                continue;
            }

            match fetch_variants(&self.client, &source, &headers).await {
                Ok(variants) => videos.extend(variants.into_iter().map(|variant| {
                    let quality = format!("{}{} - {}", prefix, self.name, variant.quality_or("HLS"));
                    StreamDescriptor::new(variant.url, quality)
                        .with_header("Referer", referer.clone())
                })),
                Err(e) => {
                    log::debug!("{}: playlist {} unavailable: {}", self.name, source, e);
                    videos.push(
                        StreamDescriptor::new(source, format!("{}{} - HLS", prefix, self.name))
                            .with_header("Referer", referer.clone()),
                    );
                }
            }
        }
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwplayer_setup() {
        let page = r#"<script>jwplayer("vplayer").setup({sources:[{file:"https://cdn.example/hls/master.m3u8?t=1"}],image:"x.jpg"});</script>"#;
        assert_eq!(
            find_sources("https://filemoon.sx/e/1", page),
            vec!["https://cdn.example/hls/master.m3u8?t=1"]
        );
    }

    #[test]
    fn test_plain_file_and_source_tag() {
        let page = r#"<video><source src="/videos/abc.mp4" type="video/mp4"></video>
            <script>player.src({ src: "https://cdn.example/abc.mp4" }); var file: 'https://cdn.example/abc.mp4';</script>"#;
        assert_eq!(
            find_sources("https://vidoza.net/embed-abc.html", page),
            vec![
                "https://cdn.example/abc.mp4".to_string(),
                "https://vidoza.net/videos/abc.mp4".to_string(),
            ]
        );
    }

    #[test]
    fn test_uqload_sources_array() {
        let page = r#"var player = new Clappr.Player({sources: ["https://m1.uqload.example/v.mp4"]});"#;
        assert_eq!(
            find_sources("https://uqload.com/embed-1.html", page),
            vec!["https://m1.uqload.example/v.mp4"]
        );
    }

    #[test]
    fn test_packed_setup() {
        let page = r#"<script>eval(function(p,a,c,k,e,d){return p}('0.1({2:[{3:"4://5.6/7.8"}]})',10,9,'jwplayer|setup|sources|file|https|cdn|example|stream|m3u8'.split('|'),0,{}))</script>"#;
        assert_eq!(
            find_sources("https://lulustream.com/e/1", page),
            vec!["https://cdn.example/stream.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_referer_defaults_to_origin() {
        let client = EnhancedHttpClient::new().unwrap();
        let extractor = JwPlayerExtractor::new(client.clone(), "Filemoon");
        assert_eq!(extractor.referer_for("https://filemoon.sx/e/abc"), "https://filemoon.sx/");
        let extractor = JwPlayerExtractor::new(client, "Mp4upload").with_referer("https://mp4upload.com/");
        assert_eq!(extractor.referer_for("https://www.mp4upload.com/embed-1.html"), "https://mp4upload.com/");
    }
}
