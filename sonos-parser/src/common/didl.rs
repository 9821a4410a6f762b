//! DIDL-Lite metadata as carried in `CurrentTrackMetaData`

use serde::{Deserialize, Serialize};

use crate::common::xml_decode;
use crate::error::ParseResult;

/// Root of a DIDL-Lite document, after namespace stripping.
///
/// Sonos sends at most one item describing the current track:
///
/// ```xml
/// <DIDL-Lite xmlns:dc="..." xmlns:upnp="..." xmlns="...">
///   <item id="-1" parentID="-1" restricted="true">
///     <res protocolInfo="sonos.com-http:*:audio/mp4:*">x-sonos-http:...</res>
///     <upnp:albumArtURI>/getaa?s=1&amp;u=...</upnp:albumArtURI>
///     <upnp:class>object.item.audioItem.musicTrack</upnp:class>
///     <dc:title>Mr. Brightside</dc:title>
///     <dc:creator>The Killers</dc:creator>
///     <upnp:album>Hot Fuss</upnp:album>
///   </item>
/// </DIDL-Lite>
/// ```
///
/// An empty queue or a container produces a document without an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DidlLite {
    #[serde(default)]
    pub item: Option<DidlItem>,
}

impl DidlLite {
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        xml_decode::parse(xml)
    }
}

/// The `item` element. Every child is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DidlItem {
    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(default)]
    pub res: Option<DidlResource>,

    /// `upnp:albumArtURI`, often relative to the device
    #[serde(rename = "albumArtURI", default)]
    pub album_art_uri: Option<String>,

    /// `upnp:class`
    #[serde(default)]
    pub class: Option<String>,

    /// `dc:title`
    #[serde(default)]
    pub title: Option<String>,

    /// `dc:creator`
    #[serde(default)]
    pub creator: Option<String>,

    /// `upnp:album`
    #[serde(default)]
    pub album: Option<String>,
}

/// The `res` element: playable URI plus its protocol info
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DidlResource {
    #[serde(rename = "@protocolInfo", default)]
    pub protocol_info: Option<String>,

    #[serde(rename = "$text", default)]
    pub uri: Option<String>,
}
