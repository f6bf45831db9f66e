use crate::models::{StreamDescriptor, Track};

/// Move every item matching `pred` to the front, keeping the relative order
/// inside both the matching and the non-matching groups.
pub fn partition_preferred<T, F>(items: Vec<T>, pred: F) -> Vec<T>
where
    F: Fn(&T) -> bool,
{
    let (mut preferred, rest): (Vec<T>, Vec<T>) = items.into_iter().partition(|item| pred(item));
    preferred.extend(rest);
    preferred
}

/// Bring streams whose quality label contains `token` to the front.
pub fn prefer_quality(videos: Vec<StreamDescriptor>, token: &str) -> Vec<StreamDescriptor> {
    if token.is_empty() {
        return videos;
    }
    partition_preferred(videos, |video| video.quality.contains(token))
}

/// Bring tracks in language `lang` to the front.
pub fn prefer_track_lang(tracks: Vec<Track>, lang: &str) -> Vec<Track> {
    partition_preferred(tracks, |track| track.lang == lang)
}
