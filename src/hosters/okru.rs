use super::Extractor;
use crate::error::Result;
use crate::helpers::select_first;
use crate::http_client::EnhancedHttpClient;
use crate::models::StreamDescriptor;
use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;

pub struct OkruExtractor {
    client: EnhancedHttpClient,
}

impl OkruExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct DataOptions {
    flashvars: Flashvars,
}

#[derive(Deserialize)]
struct Flashvars {
    /// JSON document encoded as a string.
    #[serde(default)]
    metadata: String,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(default)]
    videos: Vec<OkVideo>,
}

#[derive(Deserialize)]
struct OkVideo {
    name: String,
    url: String,
}

fn quality_name(name: &str) -> &str {
    match name {
        "ultra" => "2160p",
        "quad" => "1440p",
        "full" => "1080p",
        "hd" => "720p",
        "sd" => "480p",
        "low" => "360p",
        "lowest" => "240p",
        "mobile" => "144p",
        other => other,
    }
}

/// Streams listed in the player's `data-options` attribute, best quality first.
pub(crate) fn parse_player(page: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
    let document = Html::parse_document(page);
    let Some(options) = select_first(document.root_element(), "div[data-options]")
        .and_then(|div| div.value().attr("data-options"))
    else {
        return Ok(Vec::new());
    };

    let options: DataOptions = serde_json::from_str(options)?;
    if options.flashvars.metadata.is_empty() {
        return Ok(Vec::new());
    }
    let metadata: Metadata = serde_json::from_str(&options.flashvars.metadata)?;

    Ok(metadata
        .videos
        .into_iter()
        .rev()
        .filter(|video| video.url.starts_with("http"))
        .map(|video| {
            let quality = format!("{}Okru: {}", prefix, quality_name(&video.name));
            StreamDescriptor::new(video.url, quality)
        })
        .collect())
}

#[async_trait]
impl Extractor for OkruExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let page = self.client.get_text(url).await?;
        parse_player(&page, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_options_metadata() {
        let metadata = r#"{"videos":[{"name":"mobile","url":"https://vd.okcdn.ru/?q=0"},{"name":"sd","url":"https://vd.okcdn.ru/?q=2"},{"name":"hd","url":"https://vd.okcdn.ru/?q=3"}]}"#;
        let options = serde_json::json!({ "flashvars": { "metadata": metadata } }).to_string();
        let page = format!(
            r#"<html><body><div data-module="OKVideo" data-options="{}"></div></body></html>"#,
            options.replace('"', "&quot;")
        );

        let videos = parse_player(&page, "Latino - ").unwrap();
        let qualities: Vec<&str> = videos.iter().map(|v| v.quality.as_str()).collect();
        assert_eq!(
            qualities,
            vec!["Latino - Okru: 720p", "Latino - Okru: 480p", "Latino - Okru: 144p"]
        );
        assert_eq!(videos[0].url, "https://vd.okcdn.ru/?q=3");
    }

    #[test]
    fn test_page_without_player() {
        assert!(parse_player("<html></html>", "").unwrap().is_empty());
    }
}
