//! Now-playing track decoding.
//!
//! A `CurrentTrackMetaData` value is a DIDL-Lite document. Only items of the
//! music-track class become a [`Track`]; radio streams, line-in and empty
//! queues decode to `None`, which is a valid "nothing to report" answer
//! rather than an error.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::common::{DidlItem, DidlLite};
use crate::error::ParseResult;

/// Item class identifying a music track
pub const MUSIC_TRACK_CLASS: &str = "object.item.audioItem.musicTrack";

/// A decoded now-playing track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: Option<String>,
    /// Artist as reported in `dc:creator`
    pub creator: Option<String>,
    /// Playable resource URI from `res`
    pub resource_uri: Option<Url>,
    pub album: Album,
}

/// Album information attached to a [`Track`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: Option<String>,
    pub image_url: Option<Url>,
}

impl Track {
    /// Build a track from a DIDL-Lite item, or `None` if the item is not a
    /// music track.
    ///
    /// Relative URIs are resolved against `base` when one is given; URIs
    /// that still cannot be parsed leave the field unset.
    pub fn from_didl_item(item: &DidlItem, base: Option<&Url>) -> Option<Self> {
        if item.class.as_deref() != Some(MUSIC_TRACK_CLASS) {
            return None;
        }

        let resource_uri = item
            .res
            .as_ref()
            .and_then(|res| res.uri.as_deref())
            .and_then(|uri| resolve_uri(uri, base));

        Some(Track {
            title: item.title.clone(),
            creator: item.creator.clone(),
            resource_uri,
            album: Album {
                name: item.album.clone(),
                image_url: item
                    .album_art_uri
                    .as_deref()
                    .and_then(|uri| resolve_uri(uri, base)),
            },
        })
    }
}

/// Decode a metadata document into a track.
///
/// Returns `Ok(None)` for any item class other than [`MUSIC_TRACK_CLASS`]
/// and an error if the XML is malformed.
pub fn decode_track(xml: &str) -> ParseResult<Option<Track>> {
    decode_track_with_base(xml, None)
}

/// Like [`decode_track`], resolving relative URIs (Sonos serves album art as
/// `/getaa?...`) against the device base URL.
pub fn decode_track_with_base(xml: &str, base: Option<&Url>) -> ParseResult<Option<Track>> {
    let didl = DidlLite::from_xml(xml)?;
    Ok(didl
        .item
        .as_ref()
        .and_then(|item| Track::from_didl_item(item, base)))
}

fn resolve_uri(raw: &str, base: Option<&Url>) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let resolved = base.and_then(|b| b.join(raw).ok());
            if resolved.is_none() {
                tracing::debug!(uri = raw, "dropping relative URI without a base");
            }
            resolved
        }
        Err(e) => {
            tracing::debug!(uri = raw, error = %e, "dropping unparseable URI");
            None
        }
    }
}
