//! zoro.to: listings are plain HTML, while episodes and servers come from
//! ajax endpoints that wrap an HTML fragment in JSON. Every server is a
//! RapidCloud embed.

use super::{join_url, listing_item, parse_listing};
use crate::error::{Result, SourceError};
use crate::filters::FilterList;
use crate::helpers::{
    attr, element_text, select, select_first, substring_after, substring_after_last,
    substring_before, unescape_json_string,
};
use crate::hosters::{HosterDispatcher, HosterKind};
use crate::http_client::{referer_headers, EnhancedHttpClient};
use crate::models::{
    AnimeDetails, AnimeStatus, AnimesPage, EpisodeRef, ListingItem, MirrorCandidate,
    StreamDescriptor,
};
use crate::preferences::{PreferenceOption, SourcePreferences};
use crate::resolver::parallel_catching_flat_map;
use crate::sorting::{prefer_quality, prefer_track_lang};
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Deserialize;

const BASE_URL: &str = "https://zoro.to";

const LISTING_SELECTOR: &str = "div.flw-item";
const NEXT_PAGE_SELECTOR: &str = "li.page-item a[title=Next]";

const PREF_QUALITY_KEY: &str = "preferred_quality";
const PREF_QUALITY_VALUES: &[&str] = &["360p", "720p", "1080p"];
const PREF_QUALITY_DEFAULT: &str = "720p";

const PREF_TYPE_KEY: &str = "preferred_type";
const PREF_TYPE_VALUES: &[&str] = &["sub", "dub"];
const PREF_TYPE_DEFAULT: &str = "dub";

const PREF_SUB_KEY: &str = "preferred_subLang";
const PREF_SUB_VALUES: &[&str] = &[
    "English", "Spanish", "Portuguese", "French", "German", "Italian", "Japanese", "Russian",
];
const PREF_SUB_DEFAULT: &str = "English";

/// Servers skipped before their sources are requested.
const IGNORED_SERVERS: &[&str] = &["StreamSB", "StreamTape"];

#[derive(Deserialize)]
struct HtmlResponse {
    html: String,
}

#[derive(Deserialize)]
struct LinkResponse {
    link: String,
}

/// A `div.server-item` from the servers fragment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Server {
    pub name: String,
    pub id: String,
    pub kind: String,
}

pub struct Zoro {
    client: EnhancedHttpClient,
    base_url: String,
    preferences: SourcePreferences,
    dispatcher: HosterDispatcher,
}

impl Zoro {
    pub fn new(ctx: &SourceContext) -> Self {
        Self::with_base_url(ctx, BASE_URL)
    }

    pub fn with_base_url(ctx: &SourceContext, base_url: &str) -> Self {
        Self {
            client: ctx.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            preferences: ctx.preferences("zoro"),
            dispatcher: ctx.dispatcher().with_exclusions(IGNORED_SERVERS),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: HosterDispatcher) -> Self {
        self.dispatcher = dispatcher.with_exclusions(IGNORED_SERVERS);
        self
    }

    fn parse_item(element: ElementRef) -> Option<ListingItem> {
        let detail = select_first(element, "div.film-detail a")?;
        let thumbnail = select_first(element, "div.film-poster > img")
            .map(|img| attr(img, "data-src"))
            .filter(|src| !src.is_empty());
        listing_item(&attr(detail, "href"), attr(detail, "data-jname"), thumbnail)
    }

    async fn fetch_listing(&self, url: &str) -> Result<AnimesPage> {
        let html = self.client.get_text(url).await?;
        Ok(parse_listing(&html, LISTING_SELECTOR, Some(NEXT_PAGE_SELECTOR), Self::parse_item))
    }

    /// Single value of the `div.item-title` row containing `tag`.
    fn info(scope: ElementRef, tag: &str) -> Option<String> {
        select(scope, "div.item-title")
            .into_iter()
            .find(|row| element_text(*row).contains(tag))
            .and_then(|row| select_first(row, ".name, .text"))
            .map(element_text)
    }

    fn info_list(scope: ElementRef, tag: &str) -> Vec<String> {
        select(scope, "div.item-list")
            .into_iter()
            .filter(|row| element_text(*row).contains(tag))
            .flat_map(|row| select(row, "a"))
            .map(element_text)
            .collect()
    }

    pub(crate) fn parse_details(html: &str) -> Result<AnimeDetails> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let info = select_first(root, "div.anisc-info")
            .ok_or_else(|| SourceError::parse("zoro details block not found"))?;

        let title = select_first(root, "div.anisc-detail h2")
            .map(|h2| attr(h2, "data-jname"))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SourceError::parse("zoro title not found"))?;

        let mut description = Self::info(info, "Overview:").unwrap_or_default();
        description.push('\n');
        for tag in ["Aired:", "Premiered:", "Synonyms:", "Japanese:"] {
            if let Some(value) = Self::info(info, tag) {
                description.push_str(&format!("\n{} {}", tag, value));
            }
        }

        let status = match Self::info(info, "Status:").as_deref() {
            Some("Currently Airing") => AnimeStatus::Ongoing,
            Some("Finished Airing") => AnimeStatus::Completed,
            _ => AnimeStatus::Unknown,
        };

        Ok(AnimeDetails {
            title,
            thumbnail_url: select_first(root, "div.anisc-poster img").map(|img| attr(img, "src")),
            description: Some(description),
            genres: Self::info_list(info, "Genres:"),
            status,
            author: Self::info(info, "Studios:"),
            artist: None,
        })
    }

    /// HTML fragment of an ajax response, falling back to raw extraction when
    /// the payload is not valid JSON.
    pub(crate) fn ajax_html(body: &str) -> String {
        match serde_json::from_str::<HtmlResponse>(body) {
            Ok(response) => response.html,
            Err(_) => {
                let raw = substring_before(substring_after(body, "\"html\":\""), "<script>");
                unescape_json_string(raw)
            }
        }
    }

    pub(crate) fn parse_episodes(body: &str) -> Vec<EpisodeRef> {
        let fragment = Html::parse_fragment(&Self::ajax_html(body));
        let mut episodes: Vec<EpisodeRef> = select(fragment.root_element(), "a.ep-item")
            .into_iter()
            .filter_map(|item| {
                let data_number = attr(item, "data-number");
                let number = data_number.parse::<f32>().ok()?;
                Some(EpisodeRef {
                    number,
                    name: format!("Episode {}: {}", data_number, attr(item, "title")),
                    url: attr(item, "href"),
                    date_upload: None,
                })
            })
            .collect();
        episodes.reverse();
        episodes
    }

    pub(crate) fn parse_servers(body: &str) -> Vec<Server> {
        let fragment = Html::parse_fragment(&Self::ajax_html(body));
        select(fragment.root_element(), "div.server-item")
            .into_iter()
            .map(|server| Server {
                name: element_text(server),
                id: attr(server, "data-id"),
                kind: attr(server, "data-type"),
            })
            .collect()
    }

    /// Embed link of one server, with the autoplay parameters the player expects.
    pub(crate) fn parse_source_link(body: &str) -> Option<String> {
        let link = match serde_json::from_str::<LinkResponse>(body) {
            Ok(response) => response.link,
            Err(_) => substring_before(substring_after(body, "\"link\":\""), "\"").to_string(),
        };
        if link.is_empty() || !link.starts_with("http") {
            return None;
        }
        Some(format!("{}&autoPlay=1&oa=0", link))
    }

    async fn resolve_server(&self, server: Server, referer: &str) -> Result<Vec<StreamDescriptor>> {
        let url = format!("{}/ajax/v2/episode/sources?id={}", self.base_url, server.id);
        let body = self
            .client
            .get_text_with_headers(&url, &referer_headers(referer))
            .await?;
        let Some(link) = Self::parse_source_link(&body) else {
            return Err(SourceError::parse(format!("no link for server {}", server.name)));
        };

        let candidate = MirrorCandidate::new(server.name, link)
            .with_hoster(HosterKind::RapidCloud)
            .with_prefix(server.kind);
        self.dispatcher.resolve(&candidate).await
    }

    /// Type preference first, then quality, so quality dominates. Subtitle
    /// tracks of every stream get the preferred language first.
    fn sort_videos(&self, videos: Vec<StreamDescriptor>) -> Vec<StreamDescriptor> {
        let kind = self.preferences.get_or(PREF_TYPE_KEY, PREF_TYPE_DEFAULT);
        let quality = self.preferences.get_or(PREF_QUALITY_KEY, PREF_QUALITY_DEFAULT);
        let sub_lang = self.preferences.get_or(PREF_SUB_KEY, PREF_SUB_DEFAULT);

        let videos = prefer_quality(prefer_quality(videos, &kind), &quality);
        videos
            .into_iter()
            .map(|mut video| {
                video.subtitle_tracks = prefer_track_lang(video.subtitle_tracks, &sub_lang);
                video
            })
            .collect()
    }
}

#[async_trait]
impl AnimeSource for Zoro {
    fn id(&self) -> &'static str {
        "zoro"
    }

    fn name(&self) -> &'static str {
        "zoro.to (experimental)"
    }

    fn lang(&self) -> &'static str {
        "en"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supports_latest(&self) -> bool {
        true
    }

    async fn list_popular(&self, page: u32) -> Result<AnimesPage> {
        self.fetch_listing(&format!("{}/most-popular?page={}", self.base_url, page))
            .await
    }

    async fn list_latest(&self, page: u32) -> Result<AnimesPage> {
        self.fetch_listing(&format!("{}/top-airing?page={}", self.base_url, page))
            .await
    }

    async fn search(&self, page: u32, query: &str, _filters: &FilterList) -> Result<AnimesPage> {
        self.fetch_listing(&format!(
            "{}/search?keyword={}&page={}",
            self.base_url,
            urlencoding::encode(query),
            page
        ))
        .await
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        Self::parse_details(&html)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        let id = substring_after_last(&item.url, "-");
        let url = format!("{}/ajax/v2/episode/list/{}", self.base_url, id);
        let referer = join_url(&self.base_url, &item.url);
        let body = self
            .client
            .get_text_with_headers(&url, &referer_headers(&referer))
            .await?;
        Ok(Self::parse_episodes(&body))
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let id = substring_after_last(&episode.url, "?ep=");
        let referer = join_url(&self.base_url, &episode.url);
        let url = format!("{}/ajax/v2/episode/servers?episodeId={}", self.base_url, id);
        let body = self
            .client
            .get_text_with_headers(&url, &referer_headers(&referer))
            .await?;

        let servers: Vec<Server> = Self::parse_servers(&body)
            .into_iter()
            .filter(|server| !self.dispatcher.is_excluded(&server.name))
            .collect();
        log::debug!("zoro: {} server(s) for episode {}", servers.len(), id);

        let referer = referer.as_str();
        let videos = parallel_catching_flat_map(servers, |server| async move {
            self.resolve_server(server, referer).await
        })
        .await;
        Ok(self.sort_videos(videos))
    }

    async fn configurable_options(&self) -> Vec<PreferenceOption> {
        vec![
            PreferenceOption::list(
                PREF_QUALITY_KEY,
                "Preferred video quality",
                PREF_QUALITY_VALUES,
                PREF_QUALITY_DEFAULT,
            ),
            PreferenceOption::list(
                PREF_TYPE_KEY,
                "Preferred episode type/mode",
                PREF_TYPE_VALUES,
                PREF_TYPE_DEFAULT,
            ),
            PreferenceOption::list(
                PREF_SUB_KEY,
                "Preferred sub language",
                PREF_SUB_VALUES,
                PREF_SUB_DEFAULT,
            ),
        ]
    }
}
