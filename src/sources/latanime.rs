use super::{join_url, listing_item};
use crate::error::{Result, SourceError};
use crate::filters::{Filter, FilterList};
use crate::helpers::{attr, decode_base64, element_text, select, select_first, substring_after};
use crate::hosters::{HosterDispatcher, HosterKind};
use crate::http_client::EnhancedHttpClient;
use crate::models::{
    AnimeDetails, AnimesPage, EpisodeRef, ListingItem, MirrorCandidate, StreamDescriptor,
};
use crate::preferences::{PreferenceOption, SourcePreferences};
use crate::sorting::prefer_quality;
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html};

const BASE_URL: &str = "https://latanime.org";

const EPISODE_SELECTOR: &str = "div.row > div > div.row > div > a";
const PLAYER_SELECTOR: &str = "li#play-video > a.play-video";

const PREF_QUALITY_KEY: &str = "preferred_quality";
const PREF_QUALITY_ENTRIES: &[&str] = &["1080p", "720p", "480p", "360p", "240p"];
const PREF_QUALITY_VALUES: &[&str] = &["1080", "720", "480", "360", "240"];
const PREF_QUALITY_DEFAULT: &str = "1080";

/// Hosters this site's players are resolved with; anything else is ignored.
const SUPPORTED_HOSTERS: &[HosterKind] = &[
    HosterKind::Fembed,
    HosterKind::Okru,
    HosterKind::Mp4upload,
    HosterKind::Uqload,
    HosterKind::Doodstream,
    HosterKind::YourUpload,
    HosterKind::StreamSB,
];

const YEAR_KEY: &str = "fecha";
const GENRE_KEY: &str = "genero";
const LETTER_KEY: &str = "letra";
const UNSELECTED: (&str, &str) = ("Seleccionar", "false");

const GENRES: &[(&str, &str)] = &[
    ("Acción", "accion"),
    ("Aventura", "aventura"),
    ("Carreras", "carreras"),
    ("Ciencia Ficción", "ciencia-ficcion"),
    ("Comedia", "comedia"),
    ("Cyberpunk", "cyberpunk"),
    ("Deportes", "deportes"),
    ("Drama", "drama"),
    ("Ecchi", "ecchi"),
    ("Escolares", "escolares"),
    ("Fantasía", "fantasia"),
    ("Gore", "gore"),
    ("Harem", "harem"),
    ("Horror", "horror"),
    ("Josei", "josei"),
    ("Lucha", "lucha"),
    ("Magia", "magia"),
    ("Mecha", "mecha"),
    ("Militar", "militar"),
    ("Misterio", "misterio"),
    ("Música", "musica"),
    ("Parodias", "parodias"),
    ("Psicológico", "psicologico"),
    ("Recuerdos de la vida", "recuerdos-de-la-vida"),
    ("Seinen", "seinen"),
    ("Shojo", "shojo"),
    ("Shonen", "shonen"),
    ("Sobrenatural", "sobrenatural"),
    ("Vampiros", "vampiros"),
    ("Yaoi", "yaoi"),
    ("Yuri", "yuri"),
    ("Latino", "latino"),
    ("Espacial", "espacial"),
    ("Histórico", "historico"),
    ("Samurai", "samurai"),
    ("Artes Marciales", "artes-marciales"),
    ("Demonios", "demonios"),
    ("Romance", "romance"),
    ("Dementia", "dementia"),
    ("Policía", "policia"),
    ("Castellano", "castellano"),
    ("Historia paralela", "historia-paralela"),
    ("Aenime", "aenime"),
    ("Donghua", "donghua"),
    ("Blu-ray", "blu-ray"),
    ("Monogatari", "monogatari"),
];

pub struct Latanime {
    client: EnhancedHttpClient,
    base_url: String,
    preferences: SourcePreferences,
    dispatcher: HosterDispatcher,
}

impl Latanime {
    pub fn new(ctx: &SourceContext) -> Self {
        Self::with_base_url(ctx, BASE_URL)
    }

    pub fn with_base_url(ctx: &SourceContext, base_url: &str) -> Self {
        Self {
            client: ctx.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            preferences: ctx.preferences("latanime"),
            dispatcher: ctx.dispatcher(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: HosterDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    fn parse_item(element: ElementRef) -> Option<ListingItem> {
        let link = select_first(element, "a")?;
        let href = attr(link, "href");
        let path = Url::parse(&href)
            .map(|u| u.path().to_string())
            .unwrap_or(href);
        let title = select_first(element, "div.seriedetails > h3")
            .map(element_text)
            .unwrap_or_default();
        let thumbnail = select_first(element, "img")
            .map(|img| attr(img, "src"))
            .filter(|src| !src.is_empty());
        listing_item(&path, title, thumbnail)
    }

    /// A page follows when any pagination entry after the active one holds a link.
    fn has_next_page(root: ElementRef) -> bool {
        select(root, "ul.pagination > li.active ~ li")
            .into_iter()
            .any(|li| select_first(li, "a").is_some())
    }

    pub(crate) fn parse_listing(html: &str) -> AnimesPage {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let items = select(root, "div.row > div")
            .into_iter()
            .filter_map(Self::parse_item)
            .collect();
        AnimesPage::new(items, Self::has_next_page(root))
    }

    async fn fetch_listing(&self, url: &str) -> Result<AnimesPage> {
        let html = self.client.get_text(url).await?;
        Ok(Self::parse_listing(&html))
    }

    pub(crate) fn search_url(&self, page: u32, query: &str, filters: &FilterList) -> String {
        if !query.trim().is_empty() {
            return format!(
                "{}/buscar?q={}&p={}",
                self.base_url,
                urlencoding::encode(query.trim()),
                page
            );
        }

        let defaults = self.filter_list();
        let filters = if filters.is_empty() { &defaults } else { filters };
        let part = |key: &str| filters.selected(key).unwrap_or(UNSELECTED.1).to_string();
        format!(
            "{}/animes?fecha={}&genero={}&letra={}",
            self.base_url,
            part(YEAR_KEY),
            part(GENRE_KEY),
            part(LETTER_KEY)
        )
    }

    pub(crate) fn parse_details(html: &str) -> Result<AnimeDetails> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = select(root, "div.row > div > h2")
            .into_iter()
            .map(element_text)
            .collect::<Vec<_>>()
            .join(" ");
        if title.is_empty() {
            return Err(SourceError::parse("Latanime title not found"));
        }

        let genres = select(root, "div.row > div > a")
            .into_iter()
            .filter(|a| select_first(*a, "div.btn").is_some())
            .map(element_text)
            .collect();

        Ok(AnimeDetails {
            title,
            description: select_first(root, "div.row > div > p.my-2").map(element_text),
            genres,
            ..Default::default()
        })
    }

    pub(crate) fn parse_episodes(html: &str) -> Vec<EpisodeRef> {
        let document = Html::parse_document(html);
        let mut episodes: Vec<EpisodeRef> = select(document.root_element(), EPISODE_SELECTOR)
            .into_iter()
            .map(|element| {
                let title = element_text(element);
                let href = attr(element, "href");
                EpisodeRef {
                    number: substring_after(&title, "Capitulo ")
                        .trim()
                        .parse()
                        .unwrap_or(0.0),
                    name: title.replace("- ", ""),
                    url: Url::parse(&href)
                        .map(|u| u.path().to_string())
                        .unwrap_or(href),
                    date_upload: None,
                }
            })
            .collect();
        episodes.reverse();
        episodes
    }

    /// Player options whose decoded URL belongs to a supported hoster.
    pub(crate) fn parse_mirrors(html: &str) -> Vec<MirrorCandidate> {
        let document = Html::parse_document(html);
        select(document.root_element(), PLAYER_SELECTOR)
            .into_iter()
            .filter_map(|element| {
                let url = decode_base64(&attr(element, "data-player"))?;
                let kind = HosterKind::from_url(&url).filter(|k| SUPPORTED_HOSTERS.contains(k))?;
                let label = element_text(element);
                let prefix = format!("{} - ", label);
                Some(
                    MirrorCandidate::new(label, url.trim())
                        .with_hoster(kind)
                        .with_prefix(prefix),
                )
            })
            .collect()
    }
}

#[async_trait]
impl AnimeSource for Latanime {
    fn id(&self) -> &'static str {
        "latanime"
    }

    fn name(&self) -> &'static str {
        "Latanime"
    }

    fn lang(&self) -> &'static str {
        "es"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supports_latest(&self) -> bool {
        false
    }

    async fn list_popular(&self, page: u32) -> Result<AnimesPage> {
        self.fetch_listing(&format!("{}/emision?p={}", self.base_url, page))
            .await
    }

    async fn search(&self, page: u32, query: &str, filters: &FilterList) -> Result<AnimesPage> {
        self.fetch_listing(&self.search_url(page, query, filters)).await
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        let mut details = Self::parse_details(&html)?;
        details.thumbnail_url = item.thumbnail_url.clone();
        Ok(details)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        let html = self.client.get_text(&join_url(&self.base_url, &item.url)).await?;
        Ok(Self::parse_episodes(&html))
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let html = self
            .client
            .get_text(&join_url(&self.base_url, &episode.url))
            .await?;
        let videos = self.dispatcher.resolve_all(Self::parse_mirrors(&html)).await;
        let quality = self.preferences.get_or(PREF_QUALITY_KEY, PREF_QUALITY_DEFAULT);
        Ok(prefer_quality(videos, &quality))
    }

    fn filter_list(&self) -> FilterList {
        let years: Vec<String> = (1982..=2023).rev().map(|y| y.to_string()).collect();
        let mut year_options = vec![UNSELECTED];
        year_options.extend(years.iter().map(|y| (y.as_str(), y.as_str())));

        let mut genre_options = vec![UNSELECTED];
        genre_options.extend_from_slice(GENRES);

        let letters: Vec<String> = ('A'..='Z').map(|c| c.to_string()).collect();
        let mut letter_options = vec![UNSELECTED, ("0-9", "09")];
        letter_options.extend(letters.iter().map(|l| (l.as_str(), l.as_str())));

        FilterList::new(vec![
            Filter::Header("La busqueda por texto ignora el filtro".to_string()),
            Filter::select(YEAR_KEY, "Año", &year_options),
            Filter::select(GENRE_KEY, "Genéros", &genre_options),
            Filter::select(LETTER_KEY, "Letra", &letter_options),
        ])
    }

    async fn configurable_options(&self) -> Vec<PreferenceOption> {
        vec![PreferenceOption::list_with_entries(
            PREF_QUALITY_KEY,
            "Preferred quality",
            PREF_QUALITY_ENTRIES,
            PREF_QUALITY_VALUES,
            PREF_QUALITY_DEFAULT,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::encode_base64;
    use crate::preferences::InMemoryPreferences;
    use std::sync::Arc;

    fn source() -> Latanime {
        let ctx = SourceContext::new(
            EnhancedHttpClient::new().unwrap(),
            Arc::new(InMemoryPreferences::new()),
        );
        Latanime::new(&ctx)
    }

    #[test]
    fn test_listing_and_pagination() {
        let html = r#"<div class="row">
            <div><a href="https://latanime.org/anime/one-piece"><img src="https://img/op.jpg"><div class="seriedetails"><h3>One Piece</h3></div></a></div>
            <div><span>ad</span></div>
          </div>
          <ul class="pagination"><li class="active"><a href="?p=1">1</a></li><li><a href="?p=2">2</a></li></ul>"#;
        let page = Latanime::parse_listing(html);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].url, "/anime/one-piece");
        assert_eq!(page.items[0].title, "One Piece");
        assert!(page.has_next_page);

        let last = r#"<ul class="pagination"><li><a href="?p=1">1</a></li><li class="active"><span>2</span></li><li class="disabled"><span>»</span></li></ul>"#;
        assert!(!Latanime::parse_listing(last).has_next_page);
    }

    #[test]
    fn test_episode_numbers() {
        let html = r#"<div class="row"><div><div class="row">
            <div><a href="https://latanime.org/ver/x-episodio-2">Capitulo 2</a></div>
            <div><a href="https://latanime.org/ver/x-episodio-1">Capitulo 1</a></div>
            <div><a href="https://latanime.org/ver/x-especial">Especial - OVA</a></div>
        </div></div></div>"#;
        let episodes = Latanime::parse_episodes(html);
        let numbers: Vec<f32> = episodes.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![0.0, 1.0, 2.0]);
        assert_eq!(episodes[0].name, "Especial OVA");
        assert_eq!(episodes[2].url, "/ver/x-episodio-2");
    }

    #[test]
    fn test_only_supported_hosters_become_mirrors() {
        let html = format!(
            r#"<ul><li id="play-video"><a class="play-video" data-player="{}">Okru</a></li>
               <li id="play-video"><a class="play-video" data-player="{}">Voe</a></li>
               <li id="play-video"><a class="play-video" data-player="{}">Dood</a></li></ul>"#,
            encode_base64("https://ok.ru/videoembed/123"),
            encode_base64("https://voe.sx/e/1"),
            encode_base64("https://doodstream.com/e/abc"),
        );
        let mirrors = Latanime::parse_mirrors(&html);
        assert_eq!(mirrors.len(), 2);
        assert_eq!(mirrors[0].hoster, Some(HosterKind::Okru));
        assert_eq!(mirrors[0].prefix.as_deref(), Some("Okru - "));
        assert_eq!(mirrors[1].hoster, Some(HosterKind::Doodstream));
    }

    #[tokio::test]
    async fn test_search_urls() {
        let latanime = source();
        assert_eq!(
            latanime.search_url(2, "one piece", &FilterList::default()),
            "https://latanime.org/buscar?q=one%20piece&p=2"
        );
        assert_eq!(
            latanime.search_url(1, "", &FilterList::default()),
            "https://latanime.org/animes?fecha=false&genero=false&letra=false"
        );

        let mut filters = latanime.filter_list();
        assert!(filters.set_value(GENRE_KEY, "mecha"));
        assert!(filters.set_value(YEAR_KEY, "1999"));
        assert_eq!(
            latanime.search_url(1, "  ", &filters),
            "https://latanime.org/animes?fecha=1999&genero=mecha&letra=false"
        );
    }
}
