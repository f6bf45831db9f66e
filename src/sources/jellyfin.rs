//! Jellyfin media server. Everything comes from the server's JSON API; the
//! host URL, API key and user are preferences, read on every call so a
//! changed setting applies immediately.

use crate::error::{Result, SourceError};
use crate::filters::{Filter, FilterList};
use crate::http_client::EnhancedHttpClient;
use crate::models::{
    AnimeDetails, AnimeStatus, AnimesPage, EpisodeRef, ListingItem, StreamDescriptor, Track,
};
use crate::preferences::{PreferenceOption, SourcePreferences};
use crate::sorting::partition_preferred;
use crate::source::{AnimeSource, SourceContext};
use async_trait::async_trait;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;

const PREF_HOST_KEY: &str = "host_url";
const PREF_API_KEY: &str = "api_key";
const PREF_USER_KEY: &str = "user_id";
const PREF_LIBRARY_KEY: &str = "library_pref";
const PREF_SUB_KEY: &str = "preferred_sub";
const PREF_SUB_DEFAULT: &str = "eng";
const PREF_AUDIO_KEY: &str = "preferred_audio";
const PREF_AUDIO_DEFAULT: &str = "jpn";

const LANGUAGES: &[(&str, &str)] = &[
    ("English", "eng"),
    ("Japanese", "jpn"),
    ("French", "fre"),
    ("German", "ger"),
    ("Spanish", "spa"),
    ("Portuguese", "por"),
    ("Italian", "ita"),
    ("Russian", "rus"),
    ("Chinese", "chi"),
    ("Korean", "kor"),
];

const GENRE_KEY: &str = "genre";
const GENRES: &[&str] = &[
    "Action & Adventure",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Disney",
    "Drama",
    "Family",
    "Fantasy",
    "History",
    "Horror",
    "Kids",
    "Music",
    "Mystery",
    "Reality",
    "Romance",
    "Sci-Fi & Fantasy",
    "Science Fiction",
    "Thriller",
    "War",
    "War & Politics",
    "Western",
];

/// Transcoding rungs from lowest to highest: max width, max height, bitrate, label.
const QUALITY_LADDER: &[(u32, u32, u32, &str)] = &[
    (640, 360, 420_000, "360p - 420 kbps"),
    (854, 480, 720_000, "480p - 720 kbps"),
    (854, 480, 1_500_000, "480p - 1.5 Mbps"),
    (1280, 720, 2_000_000, "720p - 2 Mbps"),
    (1280, 720, 3_000_000, "720p - 3 Mbps"),
    (1920, 1080, 4_000_000, "1080p - 4 Mbps"),
    (1920, 1080, 8_000_000, "1080p - 8 Mbps"),
    (1920, 1080, 20_000_000, "1080p - 20 Mbps"),
    (3840, 2160, 40_000_000, "4K - 40 Mbps"),
    (3840, 2160, 80_000_000, "4K - 80 Mbps"),
];

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<ItemDto>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "Type", default)]
    kind: Option<String>,
    #[serde(default)]
    series_id: Option<String>,
    #[serde(default)]
    series_name: Option<String>,
    #[serde(default)]
    location_type: Option<String>,
    #[serde(default)]
    image_tags: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    index_number: Option<f32>,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    studios: Vec<NamedDto>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NamedDto {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PlaybackInfo {
    #[serde(default)]
    play_session_id: String,
    #[serde(default)]
    media_sources: Vec<MediaSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaSource {
    #[serde(default)]
    media_streams: Vec<MediaStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaStream {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    index: u32,
    #[serde(default)]
    codec: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    display_title: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Episode list payload: a single movie item, or the episodes of a season.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpisodesPayload {
    Movie(ItemDto),
    Episodes(ItemsResponse),
}

/// Connection settings, all required.
#[derive(Debug, Clone, PartialEq)]
struct Server {
    host: String,
    api_key: String,
    user_id: String,
}

impl Server {
    /// `{host}{path}` with `api_key` and the given query parameters.
    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.host, path))
            .map_err(|e| SourceError::Config(format!("invalid Jellyfin URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                query.append_pair(name, value);
            }
            query.append_pair("api_key", &self.api_key);
        }
        Ok(url.to_string())
    }
}

pub struct Jellyfin {
    client: EnhancedHttpClient,
    preferences: SourcePreferences,
}

impl Jellyfin {
    pub fn new(ctx: &SourceContext) -> Self {
        Self {
            client: ctx.client.clone(),
            preferences: ctx.preferences("jellyfin"),
        }
    }

    fn server(&self) -> Result<Server> {
        let read = |key: &str| {
            self.preferences
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let host = read(PREF_HOST_KEY)
            .ok_or_else(|| SourceError::NotConfigured("Jellyfin host URL".to_string()))?;
        let api_key = read(PREF_API_KEY)
            .ok_or_else(|| SourceError::NotConfigured("Jellyfin API key".to_string()))?;
        let user_id = read(PREF_USER_KEY)
            .ok_or_else(|| SourceError::NotConfigured("Jellyfin user id".to_string()))?;
        Ok(Server {
            host: host.trim_end_matches('/').to_string(),
            api_key,
            user_id,
        })
    }

    fn library(&self) -> String {
        self.preferences.get_or(PREF_LIBRARY_KEY, "")
    }

    /// Seasons and movies under `parent_id`.
    async fn fetch_items(
        &self,
        server: &Server,
        parent_id: &str,
        sort_by: &str,
        sort_order: &str,
        extra: &[(&str, &str)],
    ) -> Result<Vec<ListingItem>> {
        let mut params = vec![
            ("SortBy", sort_by),
            ("SortOrder", sort_order),
            ("IncludeItemTypes", "Season,Movie"),
            ("Recursive", "true"),
            ("ImageTypeLimit", "1"),
            ("EnableImageTypes", "Primary,Backdrop,Banner,Thumb"),
            ("StartIndex", "0"),
            ("Limit", "100"),
            ("ParentId", parent_id),
        ];
        params.extend_from_slice(extra);
        let url = server.url(&format!("/Users/{}/Items", server.user_id), &params)?;
        let response: ItemsResponse = self.client.get_json(&url, None).await?;
        Ok(listing_items(server, response.items))
    }

    async fn first_search_hit(&self, server: &Server, query: &str) -> Result<Option<String>> {
        let url = server.url(
            &format!("/Users/{}/Items", server.user_id),
            &[
                ("searchTerm", query),
                ("Limit", "2"),
                ("Recursive", "true"),
                ("IncludeItemTypes", "Series,Movie"),
            ],
        )?;
        let response: ItemsResponse = self.client.get_json(&url, None).await?;
        Ok(response.items.into_iter().next().map(|item| item.id))
    }

    async fn fetch_libraries(&self, server: &Server) -> Result<Vec<(String, String)>> {
        let url = server.url(&format!("/Users/{}/Items", server.user_id), &[])?;
        let response: ItemsResponse = self.client.get_json(&url, None).await?;
        Ok(response
            .items
            .into_iter()
            .map(|item| (item.name.unwrap_or_default(), item.id))
            .collect())
    }
}

/// Listing entries for seasons and movies; other item types are skipped.
fn listing_items(server: &Server, items: Vec<ItemDto>) -> Vec<ListingItem> {
    let image = |id: &str| {
        format!(
            "{}/Items/{}/Images/Primary?api_key={}",
            server.host, id, server.api_key
        )
    };

    items
        .into_iter()
        .filter_map(|item| match item.kind.as_deref() {
            Some("Season") => {
                let series_id = item.series_id.clone().unwrap_or_default();
                let series_name = item.series_name.clone().unwrap_or_default();
                // A virtual season means the show has no season folders.
                let is_virtual = item.location_type.as_deref() == Some("Virtual");
                let title = if is_virtual {
                    series_name
                } else {
                    format!("{} {}", series_name, item.name.clone().unwrap_or_default())
                };
                let has_own_image = item.image_tags.as_ref().map_or(false, |tags| !tags.is_empty());
                let thumbnail = if is_virtual || !has_own_image {
                    image(&series_id)
                } else {
                    image(&item.id)
                };
                Some(ListingItem {
                    title,
                    url: format!("/Shows/{}/Episodes?SeasonId={}", series_id, item.id),
                    thumbnail_url: Some(thumbnail),
                })
            }
            Some("Movie") => Some(ListingItem {
                title: item.name.clone().unwrap_or_default(),
                url: format!("/Users/{}/Items/{}", server.user_id, item.id),
                thumbnail_url: Some(image(&item.id)),
            }),
            _ => None,
        })
        .collect()
}

/// Item id behind a listing URL: `/Shows/{id}/Episodes…` or `/Users/{user}/Items/{id}`.
fn item_id(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["Shows", id, ..] => Some(id.to_string()),
        ["Users", _, "Items", id, ..] => Some(id.to_string()),
        _ => None,
    }
}

fn parse_details(item: ItemDto) -> AnimeDetails {
    let description = item.overview.as_deref().map(|overview| {
        let marked = overview.replace("<br>", "br2n");
        let text: String = Html::parse_fragment(&marked).root_element().text().collect();
        text.replace("br2n", "\n")
    });
    let status = match item.status.as_deref() {
        Some("Continuing") => AnimeStatus::Ongoing,
        Some("Ended") => AnimeStatus::Completed,
        _ => AnimeStatus::Unknown,
    };
    AnimeDetails {
        title: item
            .original_title
            .or(item.name)
            .unwrap_or_default(),
        thumbnail_url: None,
        description,
        genres: item.genres,
        status,
        author: item.studios.into_iter().next().map(|s| s.name),
        artist: None,
    }
}

fn parse_episodes(server: &Server, payload: EpisodesPayload) -> Vec<EpisodeRef> {
    let url = |id: &str| format!("/Users/{}/Items/{}", server.user_id, id);
    match payload {
        EpisodesPayload::Movie(movie) => vec![EpisodeRef {
            number: 1.0,
            name: movie.name.clone().unwrap_or_default(),
            url: url(&movie.id),
            date_upload: None,
        }],
        EpisodesPayload::Episodes(response) => {
            let mut episodes: Vec<EpisodeRef> = response
                .items
                .into_iter()
                .map(|item| {
                    let number = item.index_number.unwrap_or(0.0);
                    EpisodeRef {
                        number,
                        name: format!("{} {}", number, item.name.unwrap_or_default()),
                        url: url(&item.id),
                        date_upload: None,
                    }
                })
                .collect();
            episodes.reverse();
            episodes
        }
    }
}

/// Subtitle tracks with the preferred language first, the chosen audio stream
/// index, and the source dimensions.
fn inspect_streams(
    server: &Server,
    item_id: &str,
    streams: &[MediaStream],
    pref_sub: &str,
    pref_audio: &str,
) -> (Vec<Track>, u32, u32, u32) {
    let mut subtitles: Vec<(Track, bool)> = Vec::new();
    let mut audio_index = 1;
    let (mut width, mut height) = (1920, 1080);

    for stream in streams {
        match stream.kind.as_str() {
            "Subtitle" => {
                let url = format!(
                    "{}/Videos/{id}/{id}/Subtitles/{}/0/Stream.{}?api_key={}",
                    server.host,
                    stream.index,
                    stream.codec.as_deref().unwrap_or("srt"),
                    server.api_key,
                    id = item_id,
                );
                let label = stream.display_title.clone().unwrap_or_default();
                let preferred = stream.language.as_deref() == Some(pref_sub);
                subtitles.push((Track::new(url, label), preferred));
            }
            "Audio" => {
                if stream.language.as_deref() == Some(pref_audio) {
                    audio_index = stream.index;
                }
            }
            "Video" => {
                width = stream.width.unwrap_or(width);
                height = stream.height.unwrap_or(height);
            }
            _ => {}
        }
    }

    let subtitles = partition_preferred(subtitles, |(_, preferred)| *preferred)
        .into_iter()
        .map(|(track, _)| track)
        .collect();
    (subtitles, audio_index, width, height)
}

/// Transcoded HLS rungs up to the source size plus the static original
/// ("Best"), highest quality first.
fn quality_ladder(
    server: &Server,
    item_id: &str,
    session_id: &str,
    audio_index: u32,
    (width, height): (u32, u32),
    subtitles: &[Track],
) -> Vec<StreamDescriptor> {
    let best = StreamDescriptor::new(
        format!(
            "{}/Videos/{}/stream?static=True&api_key={}",
            server.host, item_id, server.api_key
        ),
        "Best",
    );

    let mut videos = Vec::new();
    for (max_width, max_height, bitrate, label) in QUALITY_LADDER {
        if width < *max_width && height < *max_height {
            break;
        }
        let url = format!(
            "{}/videos/{}/main.m3u8?VideoCodec=h264&AudioCodec=aac,mp3&AudioStreamIndex={}\
             &VideoBitrate={}&AudioBitrate=384000&MaxWidth={}&MaxHeight={}\
             &PlaySessionId={}&api_key={}&TranscodingMaxAudioChannels=6&RequireAvc=false\
             &SegmentContainer=ts&MinSegments=1&BreakOnNonKeyFrames=True\
             &h264-profile=high,main,baseline,constrainedbaseline&h264-level=51",
            server.host,
            item_id,
            audio_index,
            bitrate,
            max_width,
            max_height,
            session_id,
            server.api_key
        );
        videos.push(StreamDescriptor::new(url, *label).with_subtitles(subtitles.to_vec()));
    }
    videos.push(best);
    videos.reverse();
    videos
}

#[async_trait]
impl AnimeSource for Jellyfin {
    fn id(&self) -> &'static str {
        "jellyfin"
    }

    fn name(&self) -> &'static str {
        "Jellyfin"
    }

    fn lang(&self) -> &'static str {
        "all"
    }

    fn base_url(&self) -> String {
        self.preferences
            .get_or(PREF_HOST_KEY, "")
            .trim_end_matches('/')
            .to_string()
    }

    fn supports_latest(&self) -> bool {
        true
    }

    /// Library contents sorted by title. The server returns everything in one page.
    async fn list_popular(&self, _page: u32) -> Result<AnimesPage> {
        let server = self.server()?;
        let mut items = self
            .fetch_items(&server, &self.library(), "SortName", "Ascending", &[])
            .await?;
        items.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(AnimesPage::new(items, false))
    }

    async fn list_latest(&self, _page: u32) -> Result<AnimesPage> {
        let server = self.server()?;
        let items = self
            .fetch_items(&server, &self.library(), "DateCreated", "Descending", &[])
            .await?;
        Ok(AnimesPage::new(items, false))
    }

    /// Text search picks the first matching series or movie and lists its
    /// seasons; a blank query lists the library filtered by genre.
    async fn search(&self, _page: u32, query: &str, filters: &FilterList) -> Result<AnimesPage> {
        let server = self.server()?;

        let mut items = if !query.trim().is_empty() {
            let Some(parent_id) = self.first_search_hit(&server, query.trim()).await? else {
                return Ok(AnimesPage::default());
            };
            self.fetch_items(&server, &parent_id, "SortName", "Ascending", &[])
                .await?
        } else {
            let genre = filters.selected(GENRE_KEY).unwrap_or("");
            let extra: Vec<(&str, &str)> = if genre.is_empty() {
                Vec::new()
            } else {
                vec![("Genres", genre)]
            };
            self.fetch_items(&server, &self.library(), "SortName", "Ascending", &extra)
                .await?
        };

        items.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(AnimesPage::new(items, false))
    }

    async fn fetch_details(&self, item: &ListingItem) -> Result<AnimeDetails> {
        let server = self.server()?;
        let id = item_id(&item.url)
            .ok_or_else(|| SourceError::parse(format!("no Jellyfin item id in {}", item.url)))?;
        let url = server.url(
            &format!("/Users/{}/Items/{}", server.user_id, id),
            &[("fields", "DateCreated,Studios")],
        )?;
        let dto: ItemDto = self.client.get_json(&url, None).await?;
        let mut details = parse_details(dto);
        details.thumbnail_url = item.thumbnail_url.clone();
        Ok(details)
    }

    async fn fetch_episodes(&self, item: &ListingItem) -> Result<Vec<EpisodeRef>> {
        let server = self.server()?;
        let (path, query) = item.url.split_once('?').unwrap_or((item.url.as_str(), ""));
        let pairs = url_pairs(query);
        let params: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let url = server.url(path, &params)?;
        let payload: EpisodesPayload = self.client.get_json(&url, None).await?;
        Ok(parse_episodes(&server, payload))
    }

    async fn fetch_videos(&self, episode: &EpisodeRef) -> Result<Vec<StreamDescriptor>> {
        let server = self.server()?;
        let item: ItemDto = self
            .client
            .get_json(&server.url(&episode.url, &[])?, None)
            .await?;

        let url = server.url(
            &format!("/Items/{}/PlaybackInfo", item.id),
            &[("userId", server.user_id.as_str())],
        )?;
        let info: PlaybackInfo = self.client.get_json(&url, None).await?;
        let streams = info
            .media_sources
            .first()
            .map(|source| source.media_streams.as_slice())
            .unwrap_or_default();

        let pref_sub = self.preferences.get_or(PREF_SUB_KEY, PREF_SUB_DEFAULT);
        let pref_audio = self.preferences.get_or(PREF_AUDIO_KEY, PREF_AUDIO_DEFAULT);
        let (subtitles, audio_index, width, height) =
            inspect_streams(&server, &item.id, streams, &pref_sub, &pref_audio);

        Ok(quality_ladder(
            &server,
            &item.id,
            &info.play_session_id,
            audio_index,
            (width, height),
            &subtitles,
        ))
    }

    fn filter_list(&self) -> FilterList {
        let mut genres = vec![("Any", "")];
        genres.extend(GENRES.iter().map(|g| (*g, *g)));
        FilterList::new(vec![
            Filter::Header("NOTE: Ignored if using text search!".to_string()),
            Filter::Separator,
            Filter::select(GENRE_KEY, "Genres", &genres),
        ])
    }

    async fn configurable_options(&self) -> Vec<PreferenceOption> {
        let names: Vec<&str> = LANGUAGES.iter().map(|(name, _)| *name).collect();
        let codes: Vec<&str> = LANGUAGES.iter().map(|(_, code)| *code).collect();

        let library = match self.server() {
            Ok(server) => {
                let libraries = self.fetch_libraries(&server).await.unwrap_or_else(|e| {
                    log::warn!("Jellyfin: could not list libraries: {}", e);
                    Vec::new()
                });
                let entries: Vec<&str> = libraries.iter().map(|(name, _)| name.as_str()).collect();
                let values: Vec<&str> = libraries.iter().map(|(_, id)| id.as_str()).collect();
                PreferenceOption::list_with_entries(PREF_LIBRARY_KEY, "Media Library", &entries, &values, "")
            }
            Err(_) => PreferenceOption::list_with_entries(
                PREF_LIBRARY_KEY,
                "Please Set Host url, API key, and User first",
                &[],
                &[],
                "",
            ),
        };

        vec![
            PreferenceOption::text(PREF_HOST_KEY, "Host URL", "", false),
            PreferenceOption::text(PREF_API_KEY, "API Key", "", true),
            PreferenceOption::text(PREF_USER_KEY, "User ID", "", false),
            PreferenceOption::list_with_entries(
                PREF_SUB_KEY,
                "Preferred sub language",
                &names,
                &codes,
                PREF_SUB_DEFAULT,
            ),
            PreferenceOption::list_with_entries(
                PREF_AUDIO_KEY,
                "Preferred audio language",
                &names,
                &codes,
                PREF_AUDIO_DEFAULT,
            ),
            library,
        ]
    }
}

fn url_pairs(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }
    Url::parse(&format!("http://localhost/?{}", query))
        .map(|url| {
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::InMemoryPreferences;
    use std::sync::Arc;

    fn server() -> Server {
        Server {
            host: "http://jf.local:8096".into(),
            api_key: "KEY".into(),
            user_id: "U1".into(),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_server_is_an_error() {
        let ctx = SourceContext::new(
            EnhancedHttpClient::new().unwrap(),
            Arc::new(InMemoryPreferences::new()),
        );
        let jellyfin = Jellyfin::new(&ctx);
        assert!(matches!(
            jellyfin.list_popular(1).await,
            Err(SourceError::NotConfigured(_))
        ));

        let options = jellyfin.configurable_options().await;
        assert_eq!(options.len(), 6);
        assert_eq!(options[5].key(), PREF_LIBRARY_KEY);
    }

    #[test]
    fn test_listing_items_seasons_and_movies() {
        let json = r#"{"Items":[
            {"Id":"s1","Type":"Season","Name":"Season 1","SeriesId":"show","SeriesName":"Mushishi","LocationType":"Virtual","ImageTags":{"Primary":"x"}},
            {"Id":"s2","Type":"Season","Name":"Season 2","SeriesId":"show","SeriesName":"Mushishi","LocationType":"FileSystem","ImageTags":{}},
            {"Id":"m1","Type":"Movie","Name":"Akira"},
            {"Id":"f1","Type":"Folder","Name":"Extras"}
        ]}"#;
        let response: ItemsResponse = serde_json::from_str(json).unwrap();
        let items = listing_items(&server(), response.items);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Mushishi");
        assert_eq!(items[0].url, "/Shows/show/Episodes?SeasonId=s1");
        assert_eq!(
            items[1].thumbnail_url.as_deref(),
            Some("http://jf.local:8096/Items/show/Images/Primary?api_key=KEY")
        );
        assert_eq!(items[1].title, "Mushishi Season 2");
        assert_eq!(items[2].url, "/Users/U1/Items/m1");
    }

    #[test]
    fn test_item_id_from_urls() {
        assert_eq!(item_id("/Shows/show/Episodes?SeasonId=s1").as_deref(), Some("show"));
        assert_eq!(item_id("/Users/U1/Items/m1").as_deref(), Some("m1"));
        assert_eq!(item_id("/Other/x"), None);
    }

    #[test]
    fn test_episodes_movie_and_season() {
        let movie: EpisodesPayload =
            serde_json::from_str(r#"{"Id":"m1","Type":"Movie","Name":"Akira"}"#).unwrap();
        let episodes = parse_episodes(&server(), movie);
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].name, "Akira");

        let season: EpisodesPayload = serde_json::from_str(
            r#"{"Items":[{"Id":"e1","Name":"Pilot","IndexNumber":1},{"Id":"e2","Name":"Two","IndexNumber":2},{"Id":"sp","Name":"Special"}]}"#,
        )
        .unwrap();
        let episodes = parse_episodes(&server(), season);
        let numbers: Vec<f32> = episodes.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![0.0, 2.0, 1.0]);
        assert_eq!(episodes[2].name, "1 Pilot");
        assert_eq!(episodes[2].url, "/Users/U1/Items/e1");
    }

    #[test]
    fn test_details_overview_and_status() {
        let dto: ItemDto = serde_json::from_str(
            r#"{"Id":"show","Name":"Mushi-shi","OriginalTitle":"Mushishi","Overview":"Line one<br>Line <i>two</i>","Genres":["Drama"],"Studios":[{"Name":"Artland"}],"Status":"Continuing"}"#,
        )
        .unwrap();
        let details = parse_details(dto);
        assert_eq!(details.title, "Mushishi");
        assert_eq!(details.description.as_deref(), Some("Line one\nLine two"));
        assert_eq!(details.status, AnimeStatus::Ongoing);
        assert_eq!(details.author.as_deref(), Some("Artland"));
    }

    #[test]
    fn test_streams_and_ladder() {
        let streams: Vec<MediaStream> = serde_json::from_str(
            r#"[
                {"Type":"Video","Index":0,"Width":1280,"Height":720},
                {"Type":"Audio","Index":1,"Language":"eng"},
                {"Type":"Audio","Index":2,"Language":"jpn"},
                {"Type":"Subtitle","Index":3,"Codec":"ass","Language":"fre","DisplayTitle":"French"},
                {"Type":"Subtitle","Index":4,"Codec":"srt","Language":"eng","DisplayTitle":"English"},
                {"Type":"Subtitle","Index":5,"Codec":"ass","Language":"eng","DisplayTitle":"English Signs"}
            ]"#,
        )
        .unwrap();
        let (subs, audio, width, height) = inspect_streams(&server(), "ep", &streams, "eng", "jpn");
        let labels: Vec<&str> = subs.iter().map(|t| t.lang.as_str()).collect();
        assert_eq!(labels, vec!["English", "English Signs", "French"]);
        assert_eq!(subs[2].url, "http://jf.local:8096/Videos/ep/ep/Subtitles/3/0/Stream.ass?api_key=KEY");
        assert_eq!(audio, 2);

        let videos = quality_ladder(&server(), "ep", "sess", audio, (width, height), &subs);
        let qualities: Vec<&str> = videos.iter().map(|v| v.quality.as_str()).collect();
        assert_eq!(
            qualities,
            vec!["Best", "720p - 3 Mbps", "720p - 2 Mbps", "480p - 1.5 Mbps", "480p - 720 kbps", "360p - 420 kbps"]
        );
        assert!(videos[1].url.contains("AudioStreamIndex=2"));
        assert!(videos[1].url.contains("PlaySessionId=sess"));
        assert_eq!(videos[1].subtitle_tracks.len(), 3);
        assert!(videos[0].subtitle_tracks.is_empty());
    }
}
