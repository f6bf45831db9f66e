use super::Extractor;
use crate::error::Result;
use crate::helpers::{substring_after, substring_before};
use crate::http_client::EnhancedHttpClient;
use crate::models::StreamDescriptor;
use async_trait::async_trait;

const ROBOTLINK: &str = "document.getElementById('robotlink')";

pub struct StreamtapeExtractor {
    client: EnhancedHttpClient,
}

impl StreamtapeExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

/// Rebuild the video URL from the `robotlink` assignment:
/// `innerHTML = '<head>' + ('xcd<tail>')`.
pub(crate) fn robotlink_url(page: &str) -> Option<String> {
    if !page.contains(ROBOTLINK) {
        return None;
    }
    let assignment = substring_after(page, &format!("{}.innerHTML = '", ROBOTLINK));
    let head = substring_before(assignment, "'");
    let tail = substring_before(substring_after(assignment, "+ ('xcd"), "'");
    if head.is_empty() {
        return None;
    }

    let joined = format!("{}{}", head, tail);
    Some(if joined.starts_with("//") {
        format!("https:{}", joined)
    } else {
        joined
    })
}

#[async_trait]
impl Extractor for StreamtapeExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let embed_url = url.replace("/v/", "/e/");
        let page = self.client.get_text(&embed_url).await?;

        Ok(robotlink_url(&page)
            .map(|video_url| vec![StreamDescriptor::new(video_url, format!("{}Streamtape", prefix))])
            .unwrap_or_default())
    }
}
