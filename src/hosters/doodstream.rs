use super::Extractor;
use crate::error::Result;
use crate::helpers::{origin_of, substring_after, substring_after_last, substring_before};
use crate::http_client::{referer_headers, EnhancedHttpClient};
use crate::models::StreamDescriptor;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

const PASS_MD5: &str = "'/pass_md5/";

pub struct DoodExtractor {
    client: EnhancedHttpClient,
}

impl DoodExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }

    fn random_suffix() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect()
    }
}

#[async_trait]
impl Extractor for DoodExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let embed_headers = referer_headers(url);
        let (final_url, body) = self
            .client
            .get_following_redirects(url, &embed_headers)
            .await?;

        if !body.contains(PASS_MD5) {
            log::debug!("Doodstream page without pass_md5: {}", final_url);
            return Ok(Vec::new());
        }
        let Some(host) = origin_of(&final_url) else {
            return Ok(Vec::new());
        };

        let md5_path = substring_before(substring_after(&body, PASS_MD5), "'");
        let token = substring_after_last(md5_path, "/");
        let pass_url = format!("{}/pass_md5/{}", host, md5_path);

        let video_start = self
            .client
            .get_text_with_headers(&pass_url, &referer_headers(&final_url))
            .await?;
        let expiry = chrono::Utc::now().timestamp_millis();
        let video_url = format!(
            "{}{}?token={}&expiry={}",
            video_start.trim(),
            Self::random_suffix(),
            token,
            expiry
        );

        let title = crate::helpers::collapse_whitespace(substring_before(
            substring_after(&body, "<title>"),
            "</title>",
        ));
        let quality = if title.contains("1080p") {
            format!("{}Doodstream 1080p", prefix)
        } else if title.contains("720p") {
            format!("{}Doodstream 720p", prefix)
        } else {
            format!("{}Doodstream", prefix)
        };

        Ok(vec![StreamDescriptor::new(video_url, quality)
            .with_header("Referer", format!("{}/", host))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_suffix() {
        let suffix = DoodExtractor::random_suffix();
        assert_eq!(suffix.len(), 10);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
