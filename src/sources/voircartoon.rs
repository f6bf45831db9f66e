//! VoirCartoon, a DooPlay theme site. Player options are resolved through
//! the theme's `ajax-get-link-stream` endpoint, one request per option.

use super::{image_url, join_url, listing_item, parse_listing};
use crate::error::{Result, SourceError};
use crate::filters::FilterList;
use crate::helpers::{attr, element_text, own_text, select, select_first, substring_after_last, url_without_domain};
use crate::hosters::{HosterDispatcher, HosterKind};
use crate::http_client::{referer_headers, EnhancedHttpClient};
use crate::models::{
    AnimeDetails, AnimeStatus, AnimesPage, EpisodeRef, ListingItem, MirrorCandidate,
    StreamDescriptor,
};
use crate::resolver::parallel_catching_flat_map;
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html};

const BASE_URL: &str = "https://voircartoon.com";

const POPULAR_SELECTOR: &str = "div#archive-content > article";
const SEARCH_SELECTOR: &str = "div.result-item div.image a";
const NEXT_PAGE_SELECTOR: &str = "div.pagination a.arrow_pag > i#nextpagination";
const EPISODE_SELECTOR: &str = "ul.episodios > li";
const PLAYER_OPTION_SELECTOR: &str = "nav.player select > option";

const EPISODE_MOVIE_TEXT: &str = "Movie";

lazy_static! {
    static ref EPISODE_NUMBER: Regex = Regex::new(r"(\d+)$").unwrap();
}

pub struct VoirCartoon {
    client: EnhancedHttpClient,
    base_url: String,
    dispatcher: HosterDispatcher,
}

impl VoirCartoon {
    pub fn new(ctx: &SourceContext) -> Self {
        Self::with_base_url(ctx, BASE_URL)
    }

    pub fn with_base_url(ctx: &SourceContext, base_url: &str) -> Self {
        Self {
            client: ctx.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            dispatcher: ctx.dispatcher().with_exclusions(&["hydrax"]),
        }
    }

    /// Swap the dispatcher, keeping the Hydrax exclusion.
    pub fn with_dispatcher(mut self, dispatcher: HosterDispatcher) -> Self {
        self.dispatcher = dispatcher.with_exclusions(&["hydrax"]);
        self
    }

    fn parse_article(&self, element: ElementRef) -> Option<ListingItem> {
        let link = select_first(element, "div.data h3 a")?;
        let thumbnail = select_first(element, "div.poster img")
            .and_then(|img| image_url(img, &self.base_url));
        listing_item(&attr(link, "href"), element_text(link), thumbnail)
    }

    fn parse_search_result(&self, element: ElementRef) -> Option<ListingItem> {
        let img = select_first(element, "img");
        let title = img.map(|img| attr(img, "alt")).unwrap_or_default();
        let thumbnail = img.and_then(|img| image_url(img, &self.base_url));
        listing_item(&attr(element, "href"), title, thumbnail)
    }

    pub(crate) fn parse_details(&self, html: &str) -> Result<AnimeDetails> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let sheader = select_first(root, "div.sheader")
            .ok_or_else(|| SourceError::parse("VoirCartoon header not found"))?;

        let title = select_first(sheader, "div.data > h1")
            .map(element_text)
            .ok_or_else(|| SourceError::parse("VoirCartoon title not found"))?;

        let status_text = select(root, "div.mvic-info p")
            .into_iter()
            .find(|p| element_text(*p).contains("Status:"))
            .and_then(|p| select_first(p, "a[rel]"))
            .map(element_text);
        let status = match status_text.as_deref() {
            Some("Ongoing") => AnimeStatus::Ongoing,
            Some("Completed") => AnimeStatus::Completed,
            _ => AnimeStatus::Unknown,
        };

        let description = select(root, "div#info div.wp-content p, div#info > p")
            .into_iter()
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(AnimeDetails {
            title,
            thumbnail_url: select_first(sheader, "div.poster > img")
                .and_then(|img| image_url(img, &self.base_url)),
            description: Some(description).filter(|d| !d.is_empty()),
            genres: select(sheader, "div.data div.sgeneros > a")
                .into_iter()
                .map(element_text)
                .collect(),
            status,
            author: None,
            artist: None,
        })
    }

    fn parse_episode(element: ElementRef) -> Option<EpisodeRef> {
        let numbering = select_first(element, "div.numerando")
            .map(element_text)
            .unwrap_or_default();
        let number = EPISODE_NUMBER
            .captures(numbering.trim())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f32>().ok())
            .unwrap_or(0.0);
        let link = select_first(element, "a[href]")?;
        Some(EpisodeRef {
            number,
            name: format!("Saison{}", substring_after_last(&own_text(link), "Saison")),
            url: url_without_domain(&attr(link, "href")),
            date_upload: None,
        })
    }

    pub(crate) fn parse_episodes(html: &str, page_url: &str) -> Vec<EpisodeRef> {
        let document = Html::parse_document(html);
        let rows = select(document.root_element(), EPISODE_SELECTOR);
        if rows.is_empty() {
            return vec![EpisodeRef {
                number: 1.0,
                name: EPISODE_MOVIE_TEXT.to_string(),
                url: url_without_domain(page_url),
                date_upload: None,
            }];
        }
        let mut episodes: Vec<EpisodeRef> = rows.into_iter().filter_map(Self::parse_episode).collect();
        episodes.reverse();
        episodes
    }

    /// Post id and the (label, server value) of every player option.
    pub(crate) fn parse_player_options(html: &str) -> Option<(String, Vec<(String, String)>)> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let id = select_first(root, "input[name=idpost]").map(|input| attr(input, "value"))?;
        let options = select(root, PLAYER_OPTION_SELECTOR)
            .into_iter()
            .map(|option| (element_text(option), attr(option, "value")))
            .collect();
        Some((id, options))
    }

    async fn fetch_stream_link(&self, server: String, post_id: &str, referer: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/ajax-get-link-stream/?server={}&filmId={}",
            self.base_url, server, post_id
        );
        let body = self
            .client
            .get_text_with_headers(&url, &referer_headers(referer))
            .await?;
        let link = body.trim().to_string();
        Ok(if link.is_empty() { Vec::new() } else { vec![link] })
    }
}

/// Links in first-seen order without duplicates; only ComedyShow links are kept.
pub(crate) fn comedy_candidates(links: Vec<String>) -> Vec<MirrorCandidate> {
    let mut seen: Vec<String> = Vec::new();
    for link in links {
        if !seen.contains(&link) {
            seen.push(link);
        }
    }
    seen.into_iter()
        .filter(|link| link.contains("comedy"))
        .map(|link| MirrorCandidate::new("ComedyShow", link).with_hoster(HosterKind::ComedyShow))
        .collect()
}

#[async_trait]
impl AnimeSource for VoirCartoon {
    fn id(&self) -> &'static str {
        "voircartoon"
    }

    fn name(&self) -> &'static str {
        "VoirCartoon"
    }

    fn lang(&self) -> &'static str {
        "fr"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supports_latest(&self) -> bool {
        false
    }

    async fn list_popular(&self, page: u32) -> Result<AnimesPage> {
        let html = self
            .client
            .get_text(&format!("{}/tendance/page/{}/", self.base_url, page))
            .await?;
        Ok(parse_listing(&html, POPULAR_SELECTOR, Some(NEXT_PAGE_SELECTOR), |el| {
            self.parse_article(el)
        }))
    }

    async fn search(&self, page: u32, query: &str, _filters: &FilterList) -> Result<AnimesPage> {
        let html = self
            .client
            .get_text(&format!(
                "{}/page/{}/?s={}",
                self.base_url,
                page,
                urlencoding::encode(query.trim())
            ))
            .await?;
        Ok(parse_listing(&html, SEARCH_SELECTOR, Some(NEXT_PAGE_SELECTOR), |el| {
            self.parse_search_result(el)
        }))
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        self.parse_details(&html)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        let url = join_url(&self.base_url, &item.url);
        let html = self.client.get_text(&url).await?;
        Ok(Self::parse_episodes(&html, &url))
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let page_url = join_url(&self.base_url, &episode.url);
        let html = self.client.get_text(&page_url).await?;
        let Some((post_id, options)) = Self::parse_player_options(&html) else {
            log::debug!("VoirCartoon: no post id on {}", page_url);
            return Ok(Vec::new());
        };

        let servers: Vec<String> = options
            .into_iter()
            .filter(|(label, _)| !self.dispatcher.is_excluded(label))
            .map(|(_, server)| server)
            .collect();

        let (post_id, page_url) = (post_id.as_str(), page_url.as_str());
        let links = parallel_catching_flat_map(servers, |server| {
            self.fetch_stream_link(server, post_id, page_url)
        })
        .await;

        Ok(self.dispatcher.resolve_all(comedy_candidates(links)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::InMemoryPreferences;
    use std::sync::Arc;

    #[test]
    fn test_episodes_trailing_number_and_season_name() {
        let html = r#"<ul class="episodios">
            <li><div class="numerando">1 - 2</div><a href="https://voircartoon.com/episode/x-2/">Show Saison 1 Episode 2</a></li>
            <li><div class="numerando">1 - 1</div><a href="https://voircartoon.com/episode/x-1/">Show Saison 1 Episode 1</a></li>
            <li><div class="numerando">Special</div><a href="https://voircartoon.com/episode/x-sp/">Special</a></li>
        </ul>"#;
        let episodes = VoirCartoon::parse_episodes(html, "https://voircartoon.com/anime/x/");
        let numbers: Vec<f32> = episodes.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![0.0, 1.0, 2.0]);
        assert_eq!(episodes[1].name, "Saison 1 Episode 1");
        assert_eq!(episodes[2].url, "/episode/x-2/");
    }

    #[test]
    fn test_movie_fallback() {
        let episodes = VoirCartoon::parse_episodes("<div></div>", "https://voircartoon.com/film/y/");
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].name, "Movie");
        assert_eq!(episodes[0].number, 1.0);
    }

    #[test]
    fn test_player_options() {
        let html = r#"<input name="idpost" value="4821">
            <nav class="player"><select>
              <option value="1">ComedyShow</option>
              <option value="2">Hydrax</option>
            </select></nav>"#;
        let (id, options) = VoirCartoon::parse_player_options(html).unwrap();
        assert_eq!(id, "4821");
        assert_eq!(options[1], ("Hydrax".to_string(), "2".to_string()));
        assert!(VoirCartoon::parse_player_options("<nav></nav>").is_none());
    }

    #[test]
    fn test_comedy_candidates_are_deduplicated() {
        let candidates = comedy_candidates(vec![
            "https://comedyshow.to/e/1".to_string(),
            "https://other.example/e/2".to_string(),
            "https://comedyshow.to/e/1".to_string(),
            "https://comedyshow.to/e/3".to_string(),
        ]);
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://comedyshow.to/e/1", "https://comedyshow.to/e/3"]);
        assert!(candidates.iter().all(|c| c.hoster == Some(HosterKind::ComedyShow)));
    }

    #[tokio::test]
    async fn test_details_status() {
        let ctx = SourceContext::new(
            EnhancedHttpClient::new().unwrap(),
            Arc::new(InMemoryPreferences::new()),
        );
        let source = VoirCartoon::new(&ctx);
        assert!(source.dispatcher.is_excluded("Hydrax HD"));

        let html = r#"<div class="sheader"><div class="poster"><img src="/p.jpg"></div>
            <div class="data"><h1>Totally Spies</h1><div class="sgeneros"><a>Action</a></div></div></div>
            <div class="mvic-info"><p>Status: <a rel="tag">Completed</a></p></div>
            <div id="info"><div class="wp-content"><p>Trois espionnes.</p></div></div>"#;
        let details = source.parse_details(html).unwrap();
        assert_eq!(details.title, "Totally Spies");
        assert_eq!(details.status, AnimeStatus::Completed);
        assert_eq!(details.description.as_deref(), Some("Trois espionnes."));
        assert_eq!(details.thumbnail_url.as_deref(), Some("https://voircartoon.com/p.jpg"));
    }
}
