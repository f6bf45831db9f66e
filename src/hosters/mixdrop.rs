use super::{unpacker, Extractor};
use crate::error::Result;
use crate::helpers::{origin_of, substring_after, substring_before};
use crate::http_client::EnhancedHttpClient;
use crate::models::{StreamDescriptor, Track};
use async_trait::async_trait;

pub struct MixDropExtractor {
    client: EnhancedHttpClient,
}

impl MixDropExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

fn core_value<'a>(script: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("MDCore.{}=\"", key);
    if !script.contains(&marker) {
        return None;
    }
    Some(substring_before(substring_after(script, &marker), "\""))
        .filter(|value| !value.is_empty())
}

fn with_scheme(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

/// Stream URL and optional remote subtitle from an unpacked MDCore script.
pub(crate) fn parse_core(unpacked: &str) -> Option<(String, Option<String>)> {
    let video = core_value(unpacked, "wurl").map(with_scheme)?;
    let subtitle = core_value(unpacked, "remotesub").map(|sub| {
        urlencoding::decode(sub)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| sub.to_string())
    });
    Some((video, subtitle))
}

#[async_trait]
impl Extractor for MixDropExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let embed_url = url.replace("/f/", "/e/");
        let page = self.client.get_text(&embed_url).await?;

        let Some(unpacked) = unpacker::unpack(&page) else {
            log::debug!("MixDrop page without packed player: {}", embed_url);
            return Ok(Vec::new());
        };
        let Some((video_url, subtitle)) = parse_core(&unpacked) else {
            return Ok(Vec::new());
        };

        let referer = origin_of(&embed_url)
            .map(|origin| format!("{}/", origin))
            .unwrap_or_else(|| "https://mixdrop.co/".to_string());

        let subtitles = subtitle
            .map(|sub| vec![Track::new(sub, "sub")])
            .unwrap_or_default();

        Ok(vec![StreamDescriptor::new(video_url, format!("{}MixDrop", prefix))
            .with_header("Referer", referer)
            .with_subtitles(subtitles)])
    }
}
