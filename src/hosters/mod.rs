//! Video hosters and the dispatcher that routes mirror candidates to them.
//!
//! Every hoster the sources know about is a [`HosterKind`]. A candidate is
//! classified by the hoster a site attached to it, then by its label, then by
//! substrings of its URL. Unknown hosters resolve to nothing.

pub mod doodstream;
pub mod fembed;
pub mod jwplayer;
pub mod mixdrop;
pub mod okru;
pub mod playlist;
pub mod rapidcloud;
pub mod streamsb;
pub mod streamtape;
pub mod unpacker;
pub mod voe;
pub mod vplayer;

use crate::error::Result;
use crate::http_client::EnhancedHttpClient;
use crate::metrics::{track_resolution, MetricsTracker};
use crate::models::{MirrorCandidate, StreamDescriptor};
use crate::resolver::parallel_catching_flat_map;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

/// Turns one hoster embed URL into playable streams.
///
/// `prefix` is site-supplied context for the quality label (a server name,
/// "sub"/"dub", a language); each extractor decides where it goes.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HosterKind {
    VPlayer,
    RapidCloud,
    Fembed,
    StreamSB,
    Okru,
    Mp4upload,
    Uqload,
    Doodstream,
    YourUpload,
    Streamtape,
    Mixdrop,
    Filemoon,
    StreamWish,
    FileLions,
    LuLuStream,
    Vidoza,
    MyStream,
    ComedyShow,
    Voe,
}

impl HosterKind {
    /// Table order; URL matching takes the first hit.
    pub const ALL: [HosterKind; 19] = [
        HosterKind::VPlayer,
        HosterKind::RapidCloud,
        HosterKind::Fembed,
        HosterKind::StreamSB,
        HosterKind::Okru,
        HosterKind::Mp4upload,
        HosterKind::Uqload,
        HosterKind::Doodstream,
        HosterKind::YourUpload,
        HosterKind::Streamtape,
        HosterKind::Mixdrop,
        HosterKind::Filemoon,
        HosterKind::StreamWish,
        HosterKind::FileLions,
        HosterKind::LuLuStream,
        HosterKind::Vidoza,
        HosterKind::MyStream,
        HosterKind::ComedyShow,
        HosterKind::Voe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HosterKind::VPlayer => "VPlayer",
            HosterKind::RapidCloud => "RapidCloud",
            HosterKind::Fembed => "Fembed",
            HosterKind::StreamSB => "StreamSB",
            HosterKind::Okru => "Okru",
            HosterKind::Mp4upload => "Mp4upload",
            HosterKind::Uqload => "Uqload",
            HosterKind::Doodstream => "Doodstream",
            HosterKind::YourUpload => "YourUpload",
            HosterKind::Streamtape => "Streamtape",
            HosterKind::Mixdrop => "MixDrop",
            HosterKind::Filemoon => "Filemoon",
            HosterKind::StreamWish => "StreamWish",
            HosterKind::FileLions => "FileLions",
            HosterKind::LuLuStream => "LuLuStream",
            HosterKind::Vidoza => "Vidoza",
            HosterKind::MyStream => "MyStream",
            HosterKind::ComedyShow => "ComedyShow",
            HosterKind::Voe => "Voe",
        }
    }

    /// Normalized player labels sites use for this hoster.
    pub fn label_aliases(self) -> &'static [&'static str] {
        match self {
            HosterKind::VPlayer => &["vplayer"],
            HosterKind::RapidCloud => &["rapidcloud", "rapid cloud", "vidstreaming", "megacloud"],
            HosterKind::Fembed => &["fembed", "fembed hd"],
            HosterKind::StreamSB => &["streamsb", "sbplay", "streamsb hd"],
            HosterKind::Okru => &["okru", "ok.ru", "ok"],
            HosterKind::Mp4upload => &["mp4upload"],
            HosterKind::Uqload => &["uqload"],
            HosterKind::Doodstream => &["doodstream", "dood"],
            HosterKind::YourUpload => &["yourupload"],
            HosterKind::Streamtape => &["streamtape", "stape"],
            HosterKind::Mixdrop => &["mixdrop"],
            HosterKind::Filemoon => &["filemoon"],
            HosterKind::StreamWish => &["streamwish"],
            HosterKind::FileLions => &["filelions"],
            HosterKind::LuLuStream => &["lulustream"],
            HosterKind::Vidoza => &["vidoza"],
            HosterKind::MyStream => &["stream in hd", "mystream"],
            HosterKind::ComedyShow => &["comedyshow"],
            HosterKind::Voe => &["voe"],
        }
    }

    /// Domain fragments found in this hoster's embed URLs.
    pub fn domain_aliases(self) -> &'static [&'static str] {
        match self {
            HosterKind::VPlayer => &["/vplayer/?source"],
            HosterKind::RapidCloud => &["rapid-cloud.co", "megacloud.tv"],
            HosterKind::Fembed => &[
                "fembed.com", "anime789.com", "24hd.club", "fembad.org", "vcdn.io",
                "sharinglink.club", "moviemaniac.org", "votrefiles.club", "femoload.xyz",
                "albavido.xyz", "feurl.com", "dailyplanet.pw", "ncdnstm.com", "jplayer.net",
                "xstreamcdn.com", "fembed-hd.com", "gcloud.live", "vcdnplay.com",
                "superplayxyz.club", "vidohd.com", "vidsource.me", "cinegrabber.com",
                "votrefile.xyz", "zidiplay.com", "ndrama.xyz", "fcdn.stream", "mediashore.org",
                "suzihaza.com", "there.to", "femax20.com", "javstream.top", "viplayer.cc",
                "sexhd.co", "fembed.net", "mrdhan.com", "votrefilms.xyz", "embedsito.com",
                "dutrag.com", "youvideos.ru", "streamm4u.club", "moviepl.xyz", "asianclub.tv",
                "vidcloud.fun", "fplayer.info", "diasfem.com", "javpoll.com", "vanfem.com",
            ],
            HosterKind::StreamSB => &[
                "sbembed.com", "sbembed1.com", "sbplay.org", "sbvideo.net", "streamsb.net",
                "sbplay.one", "cloudemb.com", "playersb.com", "tubesb.com", "sbplay1.com",
                "embedsb.com", "watchsb.com", "sbplay2.com", "japopav.tv", "viewsb.com",
                "sbfast", "sbfull.com", "javplaya.com", "ssbstream.net", "p1ayerjavseen.com",
                "sbthe.com", "sbchill.com", "sblongvu.com", "sbanh.com", "sblanh.com",
            ],
            HosterKind::Okru => &["ok.ru"],
            HosterKind::Mp4upload => &["mp4upload.com"],
            HosterKind::Uqload => &["uqload"],
            HosterKind::Doodstream => &["doodstream", "dood.", "ds2play", "d0000d"],
            HosterKind::YourUpload => &["yourupload"],
            HosterKind::Streamtape => &["streamtape", "strtape", "stape.fun"],
            HosterKind::Mixdrop => &["mixdrop", "mixdrp"],
            HosterKind::Filemoon => &["filemoon", "kerapoxy"],
            HosterKind::StreamWish => &["streamwish", "wishembed", "awish.pro"],
            HosterKind::FileLions => &["filelions"],
            HosterKind::LuLuStream => &["lulustream", "luluvdo"],
            HosterKind::Vidoza => &["vidoza"],
            HosterKind::MyStream => &["mystream"],
            HosterKind::ComedyShow => &["comedy"],
            HosterKind::Voe => &["voe.sx", "voe"],
        }
    }

    pub fn from_label(label: &str) -> Option<HosterKind> {
        let label = normalize_label(label);
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.label_aliases().contains(&label.as_str()))
    }

    pub fn from_url(url: &str) -> Option<HosterKind> {
        let url = url.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.domain_aliases().iter().any(|alias| url.contains(alias)))
    }
}

/// Lowercase, trimmed, inner whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Classify a candidate: site pre-classification, then label, then URL.
pub fn classify(candidate: &MirrorCandidate) -> Option<HosterKind> {
    candidate
        .hoster
        .or_else(|| HosterKind::from_label(&candidate.label))
        .or_else(|| HosterKind::from_url(&candidate.url))
}

/// Routes candidates to extractors, honoring a per-site exclusion list.
pub struct HosterDispatcher {
    extractors: HashMap<HosterKind, Box<dyn Extractor>>,
    excluded: Vec<String>,
    metrics: MetricsTracker,
}

impl HosterDispatcher {
    /// Dispatcher with every known extractor wired to `client`.
    pub fn new(client: &EnhancedHttpClient) -> Self {
        let mut extractors: HashMap<HosterKind, Box<dyn Extractor>> = HashMap::new();
        for kind in HosterKind::ALL {
            extractors.insert(kind, build_extractor(kind, client));
        }

        Self {
            extractors,
            excluded: Vec::new(),
            metrics: MetricsTracker::new(),
        }
    }

    /// Dispatcher with no extractors registered; everything resolves to nothing
    /// until [`with_extractor`](Self::with_extractor) is called.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
            excluded: Vec::new(),
            metrics: MetricsTracker::new(),
        }
    }

    /// Labels containing any of these tokens are never resolved.
    pub fn with_exclusions(mut self, tokens: &[&str]) -> Self {
        self.excluded = tokens.iter().map(|t| normalize_label(t)).collect();
        self
    }

    pub fn with_extractor(mut self, kind: HosterKind, extractor: Box<dyn Extractor>) -> Self {
        self.extractors.insert(kind, extractor);
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsTracker) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        let label = normalize_label(label);
        self.excluded.iter().any(|token| label.contains(token.as_str()))
    }

    /// Resolve a single candidate. Excluded or unknown hosters yield an empty list.
    pub async fn resolve(&self, candidate: &MirrorCandidate) -> Result<Vec<StreamDescriptor>> {
        if self.is_excluded(&candidate.label) {
            log::debug!("Skipping excluded mirror '{}'", candidate.label);
            return Ok(Vec::new());
        }

        let Some(kind) = classify(candidate) else {
            log::debug!("No hoster for mirror '{}' ({})", candidate.label, candidate.url);
            return Ok(Vec::new());
        };

        let Some(extractor) = self.extractors.get(&kind) else {
            return Ok(Vec::new());
        };

        let prefix = candidate.prefix.as_deref().unwrap_or("");
        track_resolution(
            &self.metrics,
            kind.name(),
            extractor.videos_from_url(&candidate.url, prefix),
        )
        .await
    }

    /// Resolve all candidates concurrently; failures are logged and dropped.
    pub async fn resolve_all(&self, candidates: Vec<MirrorCandidate>) -> Vec<StreamDescriptor> {
        parallel_catching_flat_map(candidates, |candidate| async move {
            self.resolve(&candidate).await
        })
        .await
    }
}

fn build_extractor(kind: HosterKind, client: &EnhancedHttpClient) -> Box<dyn Extractor> {
    use jwplayer::JwPlayerExtractor;

    let client = client.clone();
    match kind {
        HosterKind::VPlayer => Box::new(vplayer::VPlayerExtractor),
        HosterKind::RapidCloud => Box::new(rapidcloud::RapidCloudExtractor::new(client)),
        HosterKind::Fembed => Box::new(fembed::FembedExtractor::new(client)),
        HosterKind::StreamSB => Box::new(streamsb::StreamSbExtractor::new(client)),
        HosterKind::Okru => Box::new(okru::OkruExtractor::new(client)),
        HosterKind::Doodstream => Box::new(doodstream::DoodExtractor::new(client)),
        HosterKind::Streamtape => Box::new(streamtape::StreamtapeExtractor::new(client)),
        HosterKind::Mixdrop => Box::new(mixdrop::MixDropExtractor::new(client)),
        HosterKind::Voe => Box::new(voe::VoeExtractor::new(client)),
        HosterKind::Mp4upload => Box::new(
            JwPlayerExtractor::new(client, kind.name()).with_referer("https://mp4upload.com/"),
        ),
        HosterKind::Uqload => Box::new(
            JwPlayerExtractor::new(client, kind.name()).with_referer("https://uqload.com/"),
        ),
        HosterKind::YourUpload => Box::new(
            JwPlayerExtractor::new(client, kind.name())
                .with_referer("https://www.yourupload.com/"),
        ),
        HosterKind::Filemoon
        | HosterKind::StreamWish
        | HosterKind::FileLions
        | HosterKind::LuLuStream
        | HosterKind::Vidoza
        | HosterKind::MyStream
        | HosterKind::ComedyShow => Box::new(JwPlayerExtractor::new(client, kind.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingExtractor {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Extractor for CountingExtractor {
        async fn videos_from_url(&self, url: &str, prefix: &str) -> Result<Vec<StreamDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(crate::error::SourceError::parse("broken hoster"));
            }
            Ok(vec![StreamDescriptor::new(url, format!("{}Stub", prefix))])
        }
    }

    fn counting(fail: bool) -> (Box<dyn Extractor>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(CountingExtractor {
                calls: calls.clone(),
                fail,
            }),
            calls,
        )
    }

    #[test]
    fn test_label_classification_is_normalized() {
        assert_eq!(HosterKind::from_label("  Stream   in HD "), Some(HosterKind::MyStream));
        assert_eq!(HosterKind::from_label("DoodStream"), Some(HosterKind::Doodstream));
        assert_eq!(HosterKind::from_label("unknown player"), None);
    }

    #[test]
    fn test_url_classification() {
        assert_eq!(HosterKind::from_url("https://OK.RU/videoembed/1"), Some(HosterKind::Okru));
        assert_eq!(
            HosterKind::from_url("https://www.fembed.com/v/abc"),
            Some(HosterKind::Fembed)
        );
        assert_eq!(HosterKind::from_url("https://watchsb.com/e/x.html"), Some(HosterKind::StreamSB));
        assert_eq!(
            HosterKind::from_url("https://site/vplayer/?source=https://cdn/v.mp4"),
            Some(HosterKind::VPlayer)
        );
        assert_eq!(HosterKind::from_url("https://example.org/e/1"), None);
    }

    #[test]
    fn test_pre_classification_wins() {
        let candidate = MirrorCandidate::new("voe", "https://mixdrop.co/e/1")
            .with_hoster(HosterKind::RapidCloud);
        assert_eq!(classify(&candidate), Some(HosterKind::RapidCloud));

        let by_label = MirrorCandidate::new("voe", "https://mixdrop.co/e/1");
        assert_eq!(classify(&by_label), Some(HosterKind::Voe));

        let by_url = MirrorCandidate::new("Opción 1", "https://mixdrop.co/e/1");
        assert_eq!(classify(&by_url), Some(HosterKind::Mixdrop));
    }

    #[tokio::test]
    async fn test_excluded_label_makes_no_call() {
        let (extractor, calls) = counting(false);
        let dispatcher = HosterDispatcher::empty()
            .with_extractor(HosterKind::Voe, extractor)
            .with_exclusions(&["Hydrax"]);

        let candidate = MirrorCandidate::new("Voe Hydrax", "https://voe.sx/e/1");
        assert!(dispatcher.resolve(&candidate).await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_hoster_is_empty_not_error() {
        let dispatcher = HosterDispatcher::empty();
        let candidate = MirrorCandidate::new("mystery", "https://nowhere.example/e/1");
        assert!(dispatcher.resolve(&candidate).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_all_tolerates_failures_and_records_metrics() {
        let (voe, voe_calls) = counting(false);
        let (mixdrop, mixdrop_calls) = counting(true);
        let dispatcher = HosterDispatcher::empty()
            .with_extractor(HosterKind::Voe, voe)
            .with_extractor(HosterKind::Mixdrop, mixdrop);

        let streams = dispatcher
            .resolve_all(vec![
                MirrorCandidate::new("voe", "https://voe.sx/e/1").with_prefix("A - "),
                MirrorCandidate::new("mixdrop", "https://mixdrop.co/e/2"),
                MirrorCandidate::new("voe", "https://voe.sx/e/3"),
            ])
            .await;

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].quality, "A - Stub");
        assert_eq!(streams[1].url, "https://voe.sx/e/3");
        assert_eq!(voe_calls.load(Ordering::SeqCst), 2);
        assert_eq!(mixdrop_calls.load(Ordering::SeqCst), 1);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.get_metrics("Voe").unwrap().successful_resolutions, 2);
        assert_eq!(metrics.get_metrics("MixDrop").unwrap().failed_resolutions, 1);
    }
}
