use super::{join_url, listing_item, parse_listing};
use crate::error::{Result, SourceError};
use crate::filters::{Filter, FilterList};
use crate::helpers::{
    absolute_url, attr, deep_link_query, element_text, parse_year_millis, select, select_first,
    substring_after, url_without_domain,
};
use crate::hosters::{HosterDispatcher, HosterKind};
use crate::http_client::{header_map, EnhancedHttpClient};
use crate::models::{
    AnimeDetails, AnimeStatus, AnimesPage, EpisodeRef, ListingItem, MirrorCandidate,
    StreamDescriptor,
};
use crate::preferences::{PreferenceOption, SourcePreferences};
use crate::resolver::parallel_catching_flat_map;
use crate::sorting::prefer_quality;
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::HeaderMap;
use scraper::{ElementRef, Html};

const BASE_URL: &str = "https://animesonlinex.cc";
const PREFIX_SEARCH: &str = "id:";
const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7";

const POPULAR_SELECTOR: &str = "article.w_item_a > a";
const LATEST_SELECTOR: &str = "div.content article > div.poster";
const SEARCH_SELECTOR: &str = "div.result-item div.details div.title a";
const NEXT_PAGE_SELECTOR: &str = "div.resppages > a > span.fa-chevron-right";

const PREF_QUALITY_KEY: &str = "preferred_quality";
const PREF_QUALITY_VALUES: &[&str] = &["SD", "HD"];
const PREF_QUALITY_DEFAULT: &str = "HD";

const GENRE_KEY: &str = "genre";
const GENRES: &[(&str, &str)] = &[
    ("Ação", "acao"),
    ("Artes Marciais", "artes-marciais"),
    ("Aventura", "aventura"),
    ("Comédia", "comedia"),
    ("Demônios", "demonios"),
    ("Drama", "drama"),
    ("Ecchi", "ecchi"),
    ("Escolar", "escolar"),
    ("Esporte", "esporte"),
    ("Fantasia", "fantasia"),
    ("Ficção Científica", "ficcao-cientifica"),
    ("Harém", "harem"),
    ("Isekai", "isekai"),
    ("Magia", "magia"),
    ("Mecha", "mecha"),
    ("Mistério", "misterio"),
    ("Psicológico", "psicologico"),
    ("Romance", "romance"),
    ("Seinen", "seinen"),
    ("Shoujo", "shoujo"),
    ("Shounen", "shounen"),
    ("Slice of Life", "slice-of-life"),
    ("Sobrenatural", "sobrenatural"),
    ("Suspense", "suspense"),
];

lazy_static! {
    static ref VPLAYER_LINK: Regex =
        Regex::new(r#"["'](https?://[^"']*/vplayer/\?source=[^"']+)["']"#).unwrap();
}

pub struct AnimesOnlineX {
    client: EnhancedHttpClient,
    base_url: String,
    headers: HeaderMap,
    preferences: SourcePreferences,
    dispatcher: HosterDispatcher,
}

impl AnimesOnlineX {
    pub fn new(ctx: &SourceContext) -> Self {
        Self::with_base_url(ctx, BASE_URL)
    }

    pub fn with_base_url(ctx: &SourceContext, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            client: ctx.client.clone(),
            headers: header_map(&[
                ("Referer", base_url.as_str()),
                ("Accept-Language", ACCEPT_LANGUAGE),
            ]),
            base_url,
            preferences: ctx.preferences("animesonlinex"),
            dispatcher: ctx.dispatcher(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: HosterDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    async fn get(&self, url: &str) -> Result<String> {
        self.client.get_text_with_headers(url, &self.headers).await
    }

    /// Poster cards: the link is either the element itself or its first `<a>`.
    fn parse_poster(element: ElementRef) -> Option<ListingItem> {
        let href = select_first(element, "a")
            .map(|a| attr(a, "href"))
            .unwrap_or_else(|| attr(element, "href"));
        let img = select_first(element, "img");
        let title = img.map(|img| attr(img, "alt")).unwrap_or_default();
        let thumbnail = img.map(|img| attr(img, "src")).filter(|s| !s.is_empty());
        listing_item(&href, title, thumbnail)
    }

    fn parse_search_result(element: ElementRef) -> Option<ListingItem> {
        listing_item(&attr(element, "href"), element_text(element), None)
    }

    /// Episode pages link back to their anime through the menu button; the
    /// anime page is the document that holds details and the episode list.
    async fn real_document(&self, html: String) -> Result<String> {
        let menu_link = {
            let document = Html::parse_document(&html);
            select(document.root_element(), "div.pag_episodes div.item a[href]")
                .into_iter()
                .find(|a| select_first(*a, "i.fa-bars").is_some())
                .map(|a| attr(a, "href"))
        };
        match menu_link {
            Some(href) if !href.is_empty() => {
                log::debug!("AnimesOnlineX: following anime menu link {}", href);
                self.get(&absolute_url(&self.base_url, &href)).await
            }
            _ => Ok(html),
        }
    }

    /// `"\n{key}: {value}"` of the custom field containing `label`.
    fn custom_field(scope: ElementRef, label: &str) -> Option<String> {
        let field = select(scope, "div.custom_fields")
            .into_iter()
            .find(|f| element_text(*f).contains(label))?;
        let key = select_first(field, "b").map(element_text)?;
        let value = select_first(field, "span").map(element_text)?;
        Some(format!("\n{}: {}", key, value))
    }

    pub(crate) fn parse_details(html: &str) -> Result<AnimeDetails> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let sheader = select_first(root, "div.sheader")
            .ok_or_else(|| SourceError::parse("AnimesOnlineX header not found"))?;

        let title = select_first(sheader, "div.data > h1")
            .map(element_text)
            .ok_or_else(|| SourceError::parse("AnimesOnlineX title not found"))?;
        let alert = select_first(sheader, "div.alert").map(element_text);

        let mut description = String::new();
        if let Some(info) = select_first(root, "div#info") {
            if let Some(p) = select_first(info, "p") {
                description.push_str(&element_text(p));
                description.push('\n');
            }
            if let Some(alert) = &alert {
                description.push('\n');
                description.push_str(alert);
            }
            for label in ["Título", "Ano", "Temporadas", "Episódios"] {
                if let Some(field) = Self::custom_field(info, label) {
                    description.push_str(&field);
                }
            }
        }

        Ok(AnimeDetails {
            title,
            thumbnail_url: select_first(sheader, "div.poster > img").map(|img| attr(img, "src")),
            description: Some(description),
            genres: select(sheader, "div.data > div.sgeneros > a")
                .into_iter()
                .map(element_text)
                .collect(),
            // An airing notice is only shown while new episodes are coming.
            status: if alert.is_some() {
                AnimeStatus::Ongoing
            } else {
                AnimeStatus::Completed
            },
            author: None,
            artist: None,
        })
    }

    fn parse_episode(element: ElementRef) -> Option<EpisodeRef> {
        let numbering = select_first(element, "div.numerando").map(element_text)?;
        let href = select_first(element, "a").map(|a| attr(a, "href"))?;
        let mut number: f32 = substring_after(&numbering, "-").trim().parse().ok()?;
        if numbering.contains("Dub") {
            number += 0.5;
        }
        Some(EpisodeRef {
            number,
            name: format!("Temp {}", numbering.replace(" - ", ": Ep ")),
            url: url_without_domain(&href),
            date_upload: select_first(element, "span.date")
                .and_then(|d| parse_year_millis(&element_text(d))),
        })
    }

    /// Episodes of the anime document, oldest first. Movies have no list and
    /// become a single episode pointing at `page_url`.
    pub(crate) fn parse_episodes(html: &str, page_url: &str) -> Vec<EpisodeRef> {
        let document = Html::parse_document(html);
        let rows = select(document.root_element(), "ul.episodios > li");
        if rows.is_empty() {
            return vec![EpisodeRef {
                number: 1.0,
                name: "Filme".to_string(),
                url: url_without_domain(page_url),
                date_upload: None,
            }];
        }
        rows.into_iter().rev().filter_map(Self::parse_episode).collect()
    }

    /// Redirect links paired with the resolution label shown for each player.
    pub(crate) fn parse_players(html: &str) -> Vec<(String, String)> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let links = select(root, "div.source-box:not(#source-player-trailer) div.pframe a")
            .into_iter()
            .map(|a| attr(a, "href"));
        let resolutions: Vec<String> = select(root, "ul#playeroptionsul > li > span.resol")
            .into_iter()
            .map(element_text)
            .collect();
        links
            .enumerate()
            .filter(|(_, href)| !href.is_empty())
            .map(|(i, href)| (href, resolutions.get(i).cloned().unwrap_or_default()))
            .collect()
    }

    /// VPlayer URL behind a redirect page: either where the redirects land or
    /// a link embedded in the final page.
    pub(crate) fn vplayer_url(final_url: &str, body: &str) -> Option<String> {
        if final_url.contains("/vplayer/?source") {
            return Some(final_url.to_string());
        }
        VPLAYER_LINK
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace("&amp;", "&"))
    }

    async fn resolve_player(&self, link: String, resolution: String) -> Result<Vec<StreamDescriptor>> {
        let (final_url, body) = self.client.get_following_redirects(&link, &self.headers).await?;
        let Some(url) = Self::vplayer_url(&final_url, &body) else {
            log::debug!("AnimesOnlineX: no vplayer behind {}", link);
            return Ok(Vec::new());
        };
        let candidate = MirrorCandidate::new(resolution.clone(), url)
            .with_hoster(HosterKind::VPlayer)
            .with_prefix(resolution);
        self.dispatcher.resolve(&candidate).await
    }

    async fn search_by_id(&self, slug: &str) -> Result<AnimesPage> {
        let path = format!("/animes/{}", slug);
        let html = self.get(&join_url(&self.base_url, &path)).await?;
        let html = self.real_document(html).await?;
        let details = Self::parse_details(&html)?;
        let item = ListingItem {
            title: details.title,
            url: path,
            thumbnail_url: details.thumbnail_url,
        };
        Ok(AnimesPage::new(vec![item], false))
    }
}

#[async_trait]
impl AnimeSource for AnimesOnlineX {
    fn id(&self) -> &'static str {
        "animesonlinex"
    }

    fn name(&self) -> &'static str {
        "AnimesOnlineX"
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

    /// Single page listing every anime.
    async fn list_popular(&self, _page: u32) -> Result<AnimesPage> {
        let html = self.get(&format!("{}/animes/", self.base_url)).await?;
        Ok(parse_listing(&html, POPULAR_SELECTOR, None, Self::parse_poster))
    }

    async fn list_latest(&self, page: u32) -> Result<AnimesPage> {
        let html = self
            .get(&format!("{}/episodio/page/{}", self.base_url, page))
            .await?;
        Ok(parse_listing(
            &html,
            LATEST_SELECTOR,
            Some(NEXT_PAGE_SELECTOR),
            Self::parse_poster,
        ))
    }

    async fn search(&self, page: u32, query: &str, filters: &FilterList) -> Result<AnimesPage> {
        if let Some(slug) = query.strip_prefix(PREFIX_SEARCH) {
            return self.search_by_id(slug).await;
        }

        if query.trim().is_empty() {
            let genre = filters
                .selected(GENRE_KEY)
                .unwrap_or(GENRES[0].1)
                .to_string();
            let mut url = format!("{}/generos/{}", self.base_url, genre);
            if page > 1 {
                url.push_str(&format!("/page/{}", page));
            }
            let html = self.get(&url).await?;
            return Ok(parse_listing(
                &html,
                LATEST_SELECTOR,
                Some(NEXT_PAGE_SELECTOR),
                Self::parse_poster,
            ));
        }

        let url = format!(
            "{}/page/{}/?s={}",
            self.base_url,
            page,
            urlencoding::encode(query.trim())
        );
        let html = self.get(&url).await?;
        Ok(parse_listing(
            &html,
            SEARCH_SELECTOR,
            Some(NEXT_PAGE_SELECTOR),
            Self::parse_search_result,
        ))
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let html = self.get(&join_url(&self.base_url, &item.url)).await?;
        let html = self.real_document(html).await?;
        Self::parse_details(&html)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        let url = join_url(&self.base_url, &item.url);
        let html = self.get(&url).await?;
        let html = self.real_document(html).await?;
        Ok(Self::parse_episodes(&html, &url))
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let html = self.get(&join_url(&self.base_url, &episode.url)).await?;
        let players = Self::parse_players(&html);
        log::debug!("AnimesOnlineX: {} player(s) for {}", players.len(), episode.url);

        let videos = parallel_catching_flat_map(players, |(link, resolution)| {
            self.resolve_player(link, resolution)
        })
        .await;
        let quality = self.preferences.get_or(PREF_QUALITY_KEY, PREF_QUALITY_DEFAULT);
        Ok(prefer_quality(videos, &quality))
    }

    fn filter_list(&self) -> FilterList {
        FilterList::new(vec![
            Filter::Header("A busca por texto ignora o filtro de gênero".to_string()),
            Filter::select(GENRE_KEY, "Gênero", GENRES),
        ])
    }

    async fn configurable_options(&self) -> Vec<PreferenceOption> {
        vec![PreferenceOption::list(
            PREF_QUALITY_KEY,
            "Qualidade preferida",
            PREF_QUALITY_VALUES,
            PREF_QUALITY_DEFAULT,
        )]
    }

    fn query_from_url(&self, url: &str) -> Option<String> {
        deep_link_query(url, PREFIX_SEARCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deep_link_becomes_id_query() {
        let ctx = crate::source::SourceContext::new(
            crate::http_client::EnhancedHttpClient::new().unwrap(),
            std::sync::Arc::new(crate::preferences::InMemoryPreferences::new()),
        );
        let source = AnimesOnlineX::new(&ctx);
        assert_eq!(
            source.query_from_url("https://animesonlinex.cc/animes/one-piece/").as_deref(),
            Some("id:one-piece")
        );
        assert_eq!(source.query_from_url("https://animesonlinex.cc/animes/"), None);
    }

    #[test]
    fn test_episodes_oldest_first() {
        let html = r#"<ul class="episodios">
            <li><div class="numerando">1 - 2</div><a href="https://animesonlinex.cc/episodio/x-2/"></a></li>
            <li><div class="numerando">1 - 1</div><a href="https://animesonlinex.cc/episodio/x-1/"></a></li>
        </ul>"#;
        let episodes = AnimesOnlineX::parse_episodes(html, "https://animesonlinex.cc/animes/x/");
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].number, 1.0);
        assert_eq!(episodes[0].name, "Temp 1: Ep 1");
        assert_eq!(episodes[1].number, 2.0);
        assert_eq!(episodes[1].url, "/episodio/x-2/");
    }

    #[test]
    fn test_dub_episode_gets_half_step() {
        let html = r#"<ul class="episodios">
            <li><div class="numerando">Dub 1 - 3</div><a href="/episodio/x-3-dub/"></a><span class="date">2021</span></li>
        </ul>"#;
        let episodes = AnimesOnlineX::parse_episodes(html, "https://animesonlinex.cc/animes/x/");
        assert_eq!(episodes[0].number, 3.5);
        assert!(episodes[0].date_upload.is_some());
    }

    #[test]
    fn test_movie_fallback() {
        let episodes = AnimesOnlineX::parse_episodes(
            "<div>no list</div>",
            "https://animesonlinex.cc/filmes/the-movie/",
        );
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].name, "Filme");
        assert_eq!(episodes[0].url, "/filmes/the-movie/");
    }

    #[test]
    fn test_players_skip_trailer() {
        let html = r#"<div class="source-box" id="source-player-trailer"><div class="pframe"><a href="https://youtube.example/t"></a></div></div>
            <div class="source-box" id="source-player-1"><div class="pframe"><a href="https://go.example/r/1"></a></div></div>
            <div class="source-box" id="source-player-2"><div class="pframe"><a href="https://go.example/r/2"></a></div></div>
            <ul id="playeroptionsul"><li><span class="resol">HD</span></li><li><span class="resol">SD</span></li></ul>"#;
        assert_eq!(
            AnimesOnlineX::parse_players(html),
            vec![
                ("https://go.example/r/1".to_string(), "HD".to_string()),
                ("https://go.example/r/2".to_string(), "SD".to_string()),
            ]
        );
    }

    #[test]
    fn test_vplayer_url_from_redirect_or_body() {
        assert_eq!(
            AnimesOnlineX::vplayer_url("https://animesonlinex.cc/vplayer/?source=https://cdn/v.mp4", "").as_deref(),
            Some("https://animesonlinex.cc/vplayer/?source=https://cdn/v.mp4")
        );
        let body = r#"<a id="link" href="https://animesonlinex.cc/vplayer/?source=https%3A%2F%2Fcdn%2Fv.mp4&amp;x=1">Continuar</a>"#;
        assert_eq!(
            AnimesOnlineX::vplayer_url("https://guia.example/r", body).as_deref(),
            Some("https://animesonlinex.cc/vplayer/?source=https%3A%2F%2Fcdn%2Fv.mp4&x=1")
        );
        assert_eq!(AnimesOnlineX::vplayer_url("https://guia.example/r", "<p>nada</p>"), None);
    }

    #[test]
    fn test_details_status_from_alert() {
        let html = r#"<div class="sheader"><div class="poster"><img src="https://img/p.jpg"></div>
            <div class="data"><h1>Naruto</h1><div class="sgeneros"><a>Ação</a><a>Shounen</a></div></div>
            <div class="alert">Em lançamento</div></div>
            <div id="info"><p>Ninjas.</p><div class="custom_fields"><b>Ano</b><span>2002</span></div></div>"#;
        let details = AnimesOnlineX::parse_details(html).unwrap();
        assert_eq!(details.title, "Naruto");
        assert_eq!(details.status, AnimeStatus::Ongoing);
        assert_eq!(details.genres, vec!["Ação", "Shounen"]);
        assert_eq!(
            details.description.as_deref(),
            Some("Ninjas.\n\nEm lançamento\nAno: 2002")
        );
    }
}
