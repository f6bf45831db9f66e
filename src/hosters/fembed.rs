use super::Extractor;
use crate::error::Result;
use crate::http_client::{header_map, EnhancedHttpClient};
use crate::models::StreamDescriptor;
use async_trait::async_trait;
use serde::Deserialize;

pub struct FembedExtractor {
    client: EnhancedHttpClient,
}

impl FembedExtractor {
    pub fn new(client: EnhancedHttpClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct SourceResponse {
    #[serde(default)]
    success: bool,
    /// A list of files on success, an error message otherwise.
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct SourceFile {
    file: String,
    label: String,
}

/// `/v/<id>` or `/f/<id>` embed URL → `/api/source/<id>`.
pub(crate) fn api_url(url: &str) -> String {
    url.replace("\\/", "/")
        .replace("https://www.fembed.com", "https://vanfem.com")
        .replace("/v/", "/api/source/")
        .replace("/f/", "/api/source/")
}

pub(crate) fn parse_sources(body: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
    let response: SourceResponse = serde_json::from_str(body)?;
    if !response.success {
        return Ok(Vec::new());
    }
    let files: Vec<SourceFile> = serde_json::from_value(response.data)?;
    Ok(files
        .into_iter()
        .map(|f| StreamDescriptor::new(f.file, format!("{}Fembed:{}", prefix, f.label)))
        .collect())
}

#[async_trait]
impl Extractor for FembedExtractor {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
        let api = api_url(url);
        let headers = header_map(&[("Referer", url), ("X-Requested-With", "XMLHttpRequest")]);
        let body = self.client.post_form_text(&api, &[], &headers).await?;
        parse_sources(&body, prefix)
    }
}
