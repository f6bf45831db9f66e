use super::{image_url, join_url, listing_item, parse_listing};
use crate::error::{Result, SourceError};
use crate::filters::FilterList;
use crate::helpers::{
    attr, decode_iframe_src, element_text, own_text, parse_date_millis, select, select_first,
    substring_after_last,
};
use crate::hosters::HosterDispatcher;
use crate::http_client::EnhancedHttpClient;
use crate::models::{
    AnimeDetails, AnimeStatus, AnimesPage, EpisodeRef, ListingItem, MirrorCandidate,
    StreamDescriptor,
};
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html};

const BASE_URL: &str = "https://einfach.to";
const PREFIX_SEARCH: &str = "path:";
const DATE_FORMAT: &str = "%B %d, %Y";

const LISTING_SELECTOR: &str = "article.box > div.bx > a.tip";
const NEXT_PAGE_SELECTOR: &str = "div.pagination > a.next";
const EPISODE_SELECTOR: &str = "div.epsdlist > ul > li > a";
const PLAYER_SELECTOR: &str = "div.lserv > ul > li > a";

/// Einfach (German series and movies). Player options carry their embed
/// as a base64 `<iframe>` and are dispatched by their label.
pub struct Einfach {
    client: EnhancedHttpClient,
    base_url: String,
    dispatcher: HosterDispatcher,
}

impl Einfach {
    pub fn new(ctx: &SourceContext) -> Self {
        Self::with_base_url(ctx, BASE_URL)
    }

    pub fn with_base_url(ctx: &SourceContext, base_url: &str) -> Self {
        Self {
            client: ctx.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            dispatcher: ctx.dispatcher(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: HosterDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    fn parse_item(&self, element: ElementRef) -> Option<ListingItem> {
        let thumbnail = select_first(element, "img").and_then(|img| image_url(img, &self.base_url));
        listing_item(&attr(element, "href"), attr(element, "title"), thumbnail)
    }

    async fn fetch_listing(&self, url: &str) -> Result<AnimesPage> {
        let html = self.client.get_text(url).await?;
        Ok(parse_listing(&html, LISTING_SELECTOR, Some(NEXT_PAGE_SELECTOR), |el| {
            self.parse_item(el)
        }))
    }

    /// Value of the info row whose bold label contains `label`.
    fn info(scope: ElementRef, label: &str) -> Option<String> {
        select(scope, "li")
            .into_iter()
            .find(|li| select(*li, "b").iter().any(|b| element_text(*b).contains(label)))
            .and_then(|li| select_first(li, "span.colspan"))
            .map(element_text)
            .map(|value| value.trim().to_string())
    }

    pub(crate) fn parse_details(&self, html: &str) -> Result<AnimeDetails> {
        let document = Html::parse_document(html);
        let info = select_first(document.root_element(), "article div > div.infl")
            .ok_or_else(|| SourceError::parse("Einfach details block not found"))?;

        let title = select_first(info, "h1.entry-title")
            .map(element_text)
            .ok_or_else(|| SourceError::parse("Einfach title not found"))?;

        let status = match Self::info(info, "Status:").as_deref() {
            Some("Ongoing") => AnimeStatus::Ongoing,
            _ => AnimeStatus::Completed,
        };

        Ok(AnimeDetails {
            title,
            thumbnail_url: select_first(info, "img").and_then(|img| image_url(img, &self.base_url)),
            description: select_first(info, "div.entry-content > p").map(own_text),
            genres: Self::info(info, "Genre:")
                .map(|g| g.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            status,
            author: Self::info(info, "Network:"),
            artist: Self::info(info, "Stars:"),
        })
    }

    fn parse_episode(element: ElementRef) -> Option<EpisodeRef> {
        let href = attr(element, "href");
        if href.is_empty() {
            return None;
        }
        let epl_num = select_first(element, ".epl-num")
            .map(element_text)
            .unwrap_or_default();
        let number = substring_after_last(&epl_num, " ").parse::<f32>().unwrap_or(1.0);
        let heading = if epl_num.is_empty() { "S1 EP 1".to_string() } else { epl_num };
        let title = select_first(element, ".epl-title")
            .map(element_text)
            .unwrap_or_default();

        Some(EpisodeRef {
            number,
            name: format!("{} - {}", heading, title),
            url: crate::helpers::url_without_domain(&href),
            date_upload: select_first(element, ".epl-date")
                .and_then(|d| parse_date_millis(&element_text(d), DATE_FORMAT)),
        })
    }

    pub(crate) fn parse_episodes(html: &str) -> Vec<EpisodeRef> {
        let document = Html::parse_document(html);
        let mut episodes: Vec<EpisodeRef> = select(document.root_element(), EPISODE_SELECTOR)
            .into_iter()
            .filter_map(Self::parse_episode)
            .collect();
        episodes.reverse();
        episodes
    }

    /// Player options in document order; options without a decodable iframe are dropped.
    pub(crate) fn parse_mirrors(html: &str) -> Vec<MirrorCandidate> {
        let document = Html::parse_document(html);
        select(document.root_element(), PLAYER_SELECTOR)
            .into_iter()
            .filter_map(|element| {
                let src = decode_iframe_src(&attr(element, "data-em"))?;
                let url = if src.starts_with("//") {
                    format!("https:{}", src)
                } else {
                    src
                };
                Some(MirrorCandidate::new(element_text(element).to_lowercase(), url))
            })
            .collect()
    }
}

#[async_trait]
impl AnimeSource for Einfach {
    fn id(&self) -> &'static str {
        "einfach"
    }

    fn name(&self) -> &'static str {
        "Einfach"
    }

    fn lang(&self) -> &'static str {
        "de"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supports_latest(&self) -> bool {
        true
    }

    /// The site has no popularity ranking; recent series updates stand in for it.
    async fn list_popular(&self, page: u32) -> Result<AnimesPage> {
        self.fetch_listing(&format!("{}/series/page/{}", self.base_url, page))
            .await
    }

    async fn list_latest(&self, page: u32) -> Result<AnimesPage> {
        self.fetch_listing(&format!("{}/filme/page/{}", self.base_url, page))
            .await
    }

    async fn search(&self, page: u32, query: &str, _filters: &FilterList) -> Result<AnimesPage> {
        if let Some(path) = query.strip_prefix(PREFIX_SEARCH) {
            let url = join_url(&self.base_url, path);
            let html = self.client.get_text(&url).await?;
            let details = self.parse_details(&html)?;
            let item = ListingItem {
                title: details.title,
                url: format!("/{}", path.trim_start_matches('/')),
                thumbnail_url: details.thumbnail_url,
            };
            return Ok(AnimesPage::new(vec![item], false));
        }

        self.fetch_listing(&format!(
            "{}/page/{}/?s={}",
            self.base_url,
            page,
            urlencoding::encode(query)
        ))
        .await
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        self.parse_details(&html)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        if item.url.contains("/filme/") {
            return Ok(vec![EpisodeRef {
                number: 1.0,
                name: format!("Movie - {}", item.title),
                url: item.url.clone(),
                date_upload: None,
            }]);
        }

        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        Ok(Self::parse_episodes(&html))
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let html = self
            .client
            .get_text(&join_url(&self.base_url, &episode.url))
            .await?;
        let mirrors = Self::parse_mirrors(&html);
        log::debug!("Einfach: {} mirror(s) for {}", mirrors.len(), episode.url);
        Ok(self.dispatcher.resolve_all(mirrors).await)
    }

    fn query_from_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let path = parsed.path().trim_start_matches('/');
        if path.is_empty() {
            return None;
        }
        Some(format!("{}{}", PREFIX_SEARCH, path))
    }
}
