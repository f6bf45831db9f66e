//! HLS master playlist expansion.

use crate::error::Result;
use crate::helpers::absolute_url;
use crate::http_client::EnhancedHttpClient;
use reqwest::header::HeaderMap;

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub url: String,
    pub height: Option<u32>,
    pub bandwidth: Option<u64>,
}

impl Variant {
    /// `"1080p"`, or `fallback` when the playlist gave no resolution.
    pub fn quality_or(&self, fallback: &str) -> String {
        match self.height {
            Some(h) => format!("{}p", h),
            None => fallback.to_string(),
        }
    }
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attrs.split(',').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}

/// Parse a master playlist. A media playlist (no variants) yields the master
/// URL itself as the only variant.
pub fn parse_master_playlist(master_url: &str, body: &str) -> Vec<Variant> {
    let mut variants = Vec::new();
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    while let Some(line) = lines.next() {
        let Some(attrs) = line.strip_prefix(STREAM_INF) else {
            continue;
        };
        let Some(uri) = lines.next() else {
            break;
        };
        if uri.starts_with('#') {
            continue;
        }

        let height = attribute(attrs, "RESOLUTION")
            .and_then(|res| res.split_once('x'))
            .and_then(|(_, h)| h.parse().ok());
        let bandwidth = attribute(attrs, "BANDWIDTH").and_then(|b| b.parse().ok());

        variants.push(Variant {
            url: absolute_url(master_url, uri),
            height,
            bandwidth,
        });
    }

    if variants.is_empty() {
        variants.push(Variant {
            url: master_url.to_string(),
            height: None,
            bandwidth: None,
        });
    }
    variants
}

pub async fn fetch_variants(
    client: &EnhancedHttpClient,
    master_url: &str,
    headers: &HeaderMap,
) -> Result<Vec<Variant>> {
    let body = client.get_text_with_headers(master_url, headers).await?;
    Ok(parse_master_playlist(master_url, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=1200000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
        index-f1-v1-a1.m3u8\n\
        #EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=2500000,RESOLUTION=1920x1080\n\
        https://cdn2.example/hd/index.m3u8\n";

    #[test]
    fn test_variants_in_order_with_relative_uris() {
        let variants = parse_master_playlist("https://cdn.example/hls/abc/master.m3u8", MASTER);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].url, "https://cdn.example/hls/abc/index-f1-v1-a1.m3u8");
        assert_eq!(variants[0].height, Some(720));
        assert_eq!(variants[0].bandwidth, Some(1_200_000));
        assert_eq!(variants[1].url, "https://cdn2.example/hd/index.m3u8");
        assert_eq!(variants[1].quality_or("auto"), "1080p");
    }

    #[test]
    fn test_media_playlist_is_single_variant() {
        let variants = parse_master_playlist(
            "https://cdn.example/v.m3u8",
            "#EXTM3U\n#EXTINF:10,\nseg1.ts\n",
        );
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].url, "https://cdn.example/v.m3u8");
        assert_eq!(variants[0].quality_or("Voe"), "Voe");
    }
}
