//! Vizer. Listings and episodes come from the site's ajax JSON endpoints;
//! every player goes through `embed/getPlay.php`, which redirects to the
//! real MixDrop or Streamtape embed.

use super::join_url;
use crate::error::{Result, SourceError};
use crate::filters::{Filter, FilterList};
use crate::helpers::{attr, element_text, select, select_first};
use crate::hosters::{HosterDispatcher, HosterKind};
use crate::http_client::{header_map, referer_headers, EnhancedHttpClient};
use crate::models::{
    AnimeDetails, AnimeStatus, AnimesPage, EpisodeRef, ListingItem, MirrorCandidate,
    StreamDescriptor,
};
use crate::preferences::{PreferenceOption, SourcePreferences};
use crate::resolver::parallel_catching_flat_map;
use crate::sorting::prefer_quality;
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use chrono::Datelike;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;
use std::collections::HashMap;

const BASE_URL: &str = "https://vizer.tv";

/// Full pages hold this many items.
const PAGE_SIZE: usize = 35;

const PREF_LANGUAGE_KEY: &str = "preferred_language";
const PREF_LANGUAGE_DEFAULT: &str = "Legendado";
const PREF_PLAYER_KEY: &str = "preferred_player";
const PREF_PLAYER_DEFAULT: &str = "MixDrop";

const TYPE_KEY: &str = "type";
const SORT_KEY: &str = "sort";

lazy_static! {
    static ref REDIRECT_TARGET: Regex =
        Regex::new(r#"window\.location\.href\s*=\s*["']([^"']+)["']"#).unwrap();
}

#[derive(Debug, Deserialize)]
struct SearchResultDto {
    #[serde(default)]
    quantity: usize,
    #[serde(rename = "list", default)]
    items: HashMap<String, SearchItemDto>,
}

#[derive(Debug, Deserialize)]
struct SearchItemDto {
    id: String,
    title: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct EpisodeListDto {
    #[serde(rename = "list", default)]
    episodes: HashMap<String, EpisodeItemDto>,
}

#[derive(Debug, Deserialize)]
struct EpisodeItemDto {
    id: String,
    name: String,
    released: bool,
    title: String,
}

#[derive(Debug, Deserialize)]
struct VideoListDto {
    #[serde(rename = "list", default)]
    videos: HashMap<String, VideoDto>,
}

#[derive(Debug, Deserialize)]
struct VideoDto {
    id: String,
    lang: String,
    /// JSON-encoded [`HostersDto`].
    #[serde(default)]
    players: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct HostersDto {
    #[serde(default)]
    mixdrop: u8,
    #[serde(default)]
    streamtape: u8,
}

impl VideoDto {
    /// Hosters flagged as available; an unreadable `players` string means none.
    fn hosters(&self) -> Vec<(&'static str, HosterKind)> {
        let hosters: HostersDto = self
            .players
            .as_deref()
            .and_then(|players| serde_json::from_str(players).ok())
            .unwrap_or_default();
        let mut available = Vec::new();
        if hosters.mixdrop == 1 {
            available.push(("mixdrop", HosterKind::Mixdrop));
        }
        if hosters.streamtape == 1 {
            available.push(("streamtape", HosterKind::Streamtape));
        }
        available
    }

    fn prefix(&self) -> &'static str {
        if self.lang == "1" {
            "Legendado - "
        } else {
            "Dublado - "
        }
    }
}

/// Values of a `{"1": .., "2": ..}` object in numeric key order.
fn ordered_values<T>(map: HashMap<String, T>) -> Vec<T> {
    let mut entries: Vec<(u64, T)> = map
        .into_iter()
        .map(|(key, value)| (key.parse().unwrap_or(u64::MAX), value))
        .collect();
    entries.sort_by_key(|(key, _)| *key);
    entries.into_iter().map(|(_, value)| value).collect()
}

pub struct Vizer {
    client: EnhancedHttpClient,
    base_url: String,
    preferences: SourcePreferences,
    dispatcher: HosterDispatcher,
}

impl Vizer {
    pub fn new(ctx: &SourceContext) -> Self {
        Self::with_base_url(ctx, BASE_URL)
    }

    pub fn with_base_url(ctx: &SourceContext, base_url: &str) -> Self {
        Self {
            client: ctx.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            preferences: ctx.preferences("vizer"),
            dispatcher: ctx.dispatcher(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: HosterDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/includes/ajax/{}", self.base_url, endpoint)
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let referer = format!("{}/", self.base_url);
        header_map(&[
            ("Referer", referer.as_str()),
            ("X-Requested-With", "XMLHttpRequest"),
        ])
    }

    fn pagination_url(&self, page: u32, params: &[(&str, &str)]) -> Result<String> {
        let page = page.saturating_sub(1).to_string();
        let max_year = chrono::Utc::now().year().to_string();
        let mut url = Url::parse(&self.api_url("ajaxPagination.php"))
            .map_err(|e| SourceError::Config(format!("invalid Vizer URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("page", &page)
            .append_pair("categoryFilterYearMin", "1950")
            .append_pair("categoryFilterYearMax", &max_year)
            .append_pair("categoryFilterMinRating", "0")
            .append_pair("saga", "0")
            .extend_pairs(params);
        Ok(url.to_string())
    }

    async fn fetch_page(&self, url: &str) -> Result<AnimesPage> {
        let result: SearchResultDto = self.client.get_json(url, Some(&self.headers())).await?;
        Ok(self.parse_search_result(result))
    }

    fn parse_search_result(&self, result: SearchResultDto) -> AnimesPage {
        let has_next = result.quantity == PAGE_SIZE;
        let items = ordered_values(result.items)
            .into_iter()
            .map(|item| {
                let kind = if item.url.starts_with("filme") {
                    "movies"
                } else {
                    "series"
                };
                ListingItem {
                    title: item.title,
                    url: format!("/{}", item.url.trim_start_matches('/')),
                    thumbnail_url: Some(format!(
                        "{}/content/{}/posterPt/342/{}.webp",
                        self.base_url, kind, item.id
                    )),
                }
            })
            .collect();
        AnimesPage::new(items, has_next)
    }

    pub(crate) fn parse_details(html: &str) -> Result<AnimeDetails> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let title = select_first(root, "section.ai h2")
            .map(element_text)
            .ok_or_else(|| SourceError::parse("Vizer title not found"))?;

        let mut description = select_first(root, "span.desc")
            .map(element_text)
            .unwrap_or_default();
        let facts: Vec<String> = select(root, "div.infos > div")
            .into_iter()
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect();
        if !facts.is_empty() {
            description.push_str("\n\n");
            description.push_str(&facts.join("\n"));
        }

        Ok(AnimeDetails {
            title,
            thumbnail_url: select_first(root, "meta[property=og:image]")
                .map(|meta| attr(meta, "content"))
                .filter(|url| !url.is_empty()),
            description: Some(description.trim().to_string()).filter(|d| !d.is_empty()),
            genres: select(root, "div.tags > a")
                .into_iter()
                .map(element_text)
                .collect(),
            status: AnimeStatus::Unknown,
            author: None,
            artist: None,
        })
    }

    /// Movie pages carry the video id directly; series pages list seasons as
    /// `(season id, season number)`.
    pub(crate) fn parse_title_page(html: &str) -> TitlePage {
        let document = Html::parse_document(html);
        let root = document.root_element();
        if let Some(player) = select_first(root, "[data-load-player]") {
            return TitlePage::Movie(attr(player, "data-load-player"));
        }
        TitlePage::Seasons(
            select(root, "div#seasonsList div.item[data-season-id]")
                .into_iter()
                .map(|season| (attr(season, "data-season-id"), element_text(season)))
                .collect(),
        )
    }

    fn parse_season(season: &str, list: EpisodeListDto) -> Vec<EpisodeRef> {
        ordered_values(list.episodes)
            .into_iter()
            .filter(|episode| episode.released)
            .map(|episode| EpisodeRef {
                number: episode.name.trim().parse().unwrap_or(0.0),
                name: format!("Temp {}: Ep {} - {}", season, episode.name, episode.title),
                url: episode.id,
                date_upload: None,
            })
            .collect()
    }

    fn candidates(list: VideoListDto, base_url: &str) -> Vec<MirrorCandidate> {
        ordered_values(list.videos)
            .into_iter()
            .flat_map(|video| {
                let prefix = video.prefix();
                video
                    .hosters()
                    .into_iter()
                    .map(|(name, kind)| {
                        MirrorCandidate::new(
                            name,
                            format!("{}/embed/getPlay.php?id={}&sv={}", base_url, video.id, name),
                        )
                        .with_hoster(kind)
                        .with_prefix(prefix)
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Follow `getPlay.php` to the hoster embed and hand it to the dispatcher.
    async fn resolve_player(&self, candidate: MirrorCandidate) -> Result<Vec<StreamDescriptor>> {
        let body = self
            .client
            .get_text_with_headers(&candidate.url, &referer_headers(&format!("{}/", self.base_url)))
            .await?;
        let target = REDIRECT_TARGET
            .captures(&body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SourceError::parse(format!("no redirect in {}", candidate.url)))?;
        self.dispatcher
            .resolve(&MirrorCandidate { url: target, ..candidate })
            .await
    }

    fn sort_videos(&self, videos: Vec<StreamDescriptor>) -> Vec<StreamDescriptor> {
        let player = self.preferences.get_or(PREF_PLAYER_KEY, PREF_PLAYER_DEFAULT);
        let language = self
            .preferences
            .get_or(PREF_LANGUAGE_KEY, PREF_LANGUAGE_DEFAULT);
        prefer_quality(prefer_quality(videos, &player), &language)
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum TitlePage {
    Movie(String),
    Seasons(Vec<(String, String)>),
}

#[async_trait]
impl AnimeSource for Vizer {
    fn id(&self) -> &'static str {
        "vizer"
    }

    fn name(&self) -> &'static str {
        "Vizer.tv"
    }

    fn lang(&self) -> &'static str {
        "pt-BR"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supports_latest(&self) -> bool {
        true
    }

    async fn list_popular(&self, page: u32) -> Result<AnimesPage> {
        let url = self.pagination_url(
            page,
            &[
                ("categoryFilterOrderBy", "vzViews"),
                ("categoryFilterOrderWay", "desc"),
                ("categoriesListSeries", "all"),
                ("anime", "1"),
            ],
        )?;
        self.fetch_page(&url).await
    }

    async fn list_latest(&self, page: u32) -> Result<AnimesPage> {
        let url = self.pagination_url(
            page,
            &[
                ("categoryFilterOrderBy", "id"),
                ("categoryFilterOrderWay", "desc"),
                ("categoriesListSeries", "all"),
                ("anime", "1"),
            ],
        )?;
        self.fetch_page(&url).await
    }

    async fn search(&self, page: u32, query: &str, filters: &FilterList) -> Result<AnimesPage> {
        let defaults = self.filter_list();
        let filters = if filters.is_empty() { &defaults } else { filters };
        let kind = filters.selected(TYPE_KEY).unwrap_or("anime");
        let order = filters.selected(SORT_KEY).unwrap_or("vzViews");

        let mut params = vec![
            ("categoryFilterOrderBy", order),
            ("categoryFilterOrderWay", "desc"),
        ];
        match kind {
            "movie" => params.push(("categoriesListMovies", "all")),
            "serie" => params.push(("categoriesListSeries", "all")),
            _ => {
                params.push(("categoriesListSeries", "all"));
                params.push(("anime", "1"));
            }
        }
        let query = query.trim();
        if !query.is_empty() {
            params.push(("search", query));
        }
        let url = self.pagination_url(page, &params)?;
        self.fetch_page(&url).await
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        let mut details = Self::parse_details(&html)?;
        if details.thumbnail_url.is_none() {
            details.thumbnail_url = item.thumbnail_url.clone();
        }
        Ok(details)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        let seasons = match Self::parse_title_page(&html) {
            TitlePage::Movie(video_id) => {
                return Ok(vec![EpisodeRef {
                    number: 1.0,
                    name: "Filme".to_string(),
                    url: video_id,
                    date_upload: None,
                }])
            }
            TitlePage::Seasons(seasons) => seasons,
        };

        let mut episodes = Vec::new();
        for (season_id, season) in seasons {
            let body = self
                .client
                .post_form_text(
                    &self.api_url("publicFunctions.php"),
                    &[("getEpisodes", season_id.as_str())],
                    &self.headers(),
                )
                .await?;
            let list: EpisodeListDto = serde_json::from_str(&body)?;
            episodes.extend(Self::parse_season(&season, list));
        }
        episodes.reverse();
        Ok(episodes)
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let body = self
            .client
            .post_form_text(
                &self.api_url("publicFunctions.php"),
                &[("getEpisodeData", episode.url.as_str())],
                &self.headers(),
            )
            .await?;
        let list: VideoListDto = serde_json::from_str(&body)?;
        let candidates = Self::candidates(list, &self.base_url);
        log::debug!("Vizer: {} player(s) for episode {}", candidates.len(), episode.url);

        let videos =
            parallel_catching_flat_map(candidates, |candidate| self.resolve_player(candidate)).await;
        Ok(self.sort_videos(videos))
    }

    fn filter_list(&self) -> FilterList {
        FilterList::new(vec![
            Filter::select(
                TYPE_KEY,
                "Tipo",
                &[("Animes", "anime"), ("Filmes", "movie"), ("Séries", "serie")],
            ),
            Filter::select(
                SORT_KEY,
                "Ordenar por",
                &[
                    ("Popularidade", "vzViews"),
                    ("Ano", "year"),
                    ("Título", "title"),
                    ("Avaliação", "rating"),
                ],
            ),
        ])
    }

    async fn configurable_options(&self) -> Vec<PreferenceOption> {
        vec![
            PreferenceOption::list(
                PREF_LANGUAGE_KEY,
                "Língua preferida",
                &["Legendado", "Dublado"],
                PREF_LANGUAGE_DEFAULT,
            ),
            PreferenceOption::list(
                PREF_PLAYER_KEY,
                "Player preferido",
                &["MixDrop", "Streamtape"],
                PREF_PLAYER_DEFAULT,
            ),
        ]
    }
}
