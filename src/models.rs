use crate::hosters::HosterKind;
use serde::{Deserialize, Serialize};

/// One entry of a popular/latest/search listing.
///
/// `url` is stored without the domain so it can be resolved against the
/// source's current base URL.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ListingItem {
    pub title: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnimesPage {
    pub items: Vec<ListingItem>,
    pub has_next_page: bool,
}

impl AnimesPage {
    pub fn new(items: Vec<ListingItem>, has_next_page: bool) -> Self {
        Self {
            items,
            has_next_page,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimeStatus {
    #[default]
    Unknown,
    Ongoing,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnimeDetails {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub status: AnimeStatus,
    pub author: Option<String>,
    pub artist: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EpisodeRef {
    /// Half steps (e.g. 3.5) are used by some sites for dub/alt variants.
    pub number: f32,
    pub name: String,
    pub url: String,
    /// Epoch milliseconds.
    pub date_upload: Option<i64>,
}

/// A player option found on an episode page, before hoster resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorCandidate {
    pub label: String,
    pub url: String,
    /// Set when the site already knows which hoster serves this option.
    pub hoster: Option<HosterKind>,
    /// Prepended to the quality label of every resolved stream.
    pub prefix: Option<String>,
}

impl MirrorCandidate {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            hoster: None,
            prefix: None,
        }
    }

    pub fn with_hoster(mut self, hoster: HosterKind) -> Self {
        self.hoster = Some(hoster);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Track {
    pub url: String,
    pub lang: String,
}

impl Track {
    pub fn new(url: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            lang: lang.into(),
        }
    }
}

/// A playable stream handed back to the host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub url: String,
    pub quality: String,
    /// Headers the player must send, usually a Referer.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub subtitle_tracks: Vec<Track>,
    #[serde(default)]
    pub audio_tracks: Vec<Track>,
}

impl StreamDescriptor {
    pub fn new(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            headers: Vec::new(),
            subtitle_tracks: Vec::new(),
            audio_tracks: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_subtitles(mut self, tracks: Vec<Track>) -> Self {
        self.subtitle_tracks = tracks;
        self
    }

    pub fn with_audio_tracks(mut self, tracks: Vec<Track>) -> Self {
        self.audio_tracks = tracks;
        self
    }
}
