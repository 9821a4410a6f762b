//! LastChange notification decoding.
//!
//! Sonos reports AVTransport and RenderingControl state through a single
//! `LastChange` state variable whose value is itself an XML document:
//!
//! ```xml
//! <Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/">
//!   <InstanceID val="0">
//!     <TransportState val="PLAYING"/>
//!     <CurrentTrackMetaData val="&lt;DIDL-Lite ...&gt;"/>
//!   </InstanceID>
//! </Event>
//! ```
//!
//! RenderingControl uses the same envelope with per-channel elements
//! (`<Volume channel="Master" val="31"/>`). [`decode_last_change`] turns
//! either shape into an ordered list of [`StateDelta`]s.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::common::{xml_decode, ChannelAttribute, ValueAttribute};
use crate::error::{ParseError, ParseResult};
use crate::track::{decode_track_with_base, Track};

/// Playback lifecycle state of a device.
///
/// Pause and stop are deliberately not distinguished: both raw codes map to
/// [`TransportState::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportState {
    Stopped,
    Transitioning,
    Playing,
}

impl TransportState {
    /// Map a raw `TransportState` code. Unrecognized codes return `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "STOPPED" | "PAUSED_PLAYBACK" => Some(TransportState::Stopped),
            "TRANSITIONING" => Some(TransportState::Transitioning),
            "PLAYING" => Some(TransportState::Playing),
            _ => None,
        }
    }
}

/// One typed unit of state change extracted from a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateDelta {
    TrackChanged(Track),
    TransportChanged(TransportState),
    /// Master channel volume, 0-100
    VolumeChanged(u8),
    /// Master channel mute
    MuteChanged(bool),
}

/// Root of a decoded LastChange document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename = "Event")]
pub struct LastChangeEvent {
    #[serde(rename = "InstanceID", default)]
    pub instances: Vec<InstanceState>,
}

/// State variables reported for one transport instance
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstanceState {
    /// Instance ID (always "0" on Sonos)
    #[serde(rename = "@val", default)]
    pub id: String,

    #[serde(rename = "TransportState", default)]
    pub transport_state: Option<ValueAttribute>,

    /// Escaped DIDL-Lite document, empty when nothing is loaded
    #[serde(rename = "CurrentTrackMetaData", default)]
    pub current_track_metadata: Option<ValueAttribute>,

    #[serde(rename = "Volume", default)]
    pub volume: Vec<ChannelAttribute>,

    #[serde(rename = "Mute", default)]
    pub mute: Vec<ChannelAttribute>,
}

impl LastChangeEvent {
    /// Parse a LastChange document without interpreting its values.
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        xml_decode::parse(xml)
    }

    /// Interpret every instance into deltas.
    ///
    /// Per instance the order is track, transport, volume, mute. Any value
    /// that cannot be interpreted fails the whole document, so callers never
    /// see a partial set of deltas.
    pub fn deltas(&self, base: Option<&Url>) -> ParseResult<Vec<StateDelta>> {
        let mut deltas = Vec::new();
        for instance in &self.instances {
            instance.collect_deltas(base, &mut deltas)?;
        }
        Ok(deltas)
    }
}

impl InstanceState {
    fn collect_deltas(&self, base: Option<&Url>, deltas: &mut Vec<StateDelta>) -> ParseResult<()> {
        let metadata = self
            .current_track_metadata
            .as_ref()
            .map(|m| m.val.as_str())
            .filter(|val| !val.is_empty());
        if let Some(metadata) = metadata {
            if let Some(track) = decode_track_with_base(metadata, base)? {
                deltas.push(StateDelta::TrackChanged(track));
            }
        }

        if let Some(state) = &self.transport_state {
            match TransportState::from_code(&state.val) {
                Some(mapped) => deltas.push(StateDelta::TransportChanged(mapped)),
                None => tracing::debug!(code = %state.val, "ignoring unrecognized transport state"),
            }
        }

        if let Some(volume) = self.volume.iter().find(|v| v.is_master()) {
            deltas.push(StateDelta::VolumeChanged(parse_volume(&volume.val)?));
        }

        if let Some(mute) = self.mute.iter().find(|m| m.is_master()) {
            deltas.push(StateDelta::MuteChanged(parse_mute(&mute.val)?));
        }

        Ok(())
    }
}

/// Decode a LastChange document into deltas.
pub fn decode_last_change(xml: &str) -> ParseResult<Vec<StateDelta>> {
    decode_last_change_with_base(xml, None)
}

/// Like [`decode_last_change`], resolving relative track URIs against the
/// device base URL.
pub fn decode_last_change_with_base(xml: &str, base: Option<&Url>) -> ParseResult<Vec<StateDelta>> {
    LastChangeEvent::from_xml(xml)?.deltas(base)
}

fn parse_volume(raw: &str) -> ParseResult<u8> {
    raw.trim()
        .parse::<u8>()
        .map(|level| level.min(100))
        .map_err(|_| ParseError::InvalidValue {
            field: "Volume",
            value: raw.to_string(),
        })
}

fn parse_mute(raw: &str) -> ParseResult<bool> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other if other.eq_ignore_ascii_case("true") => Ok(true),
        other if other.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ParseError::InvalidValue {
            field: "Mute",
            value: raw.to_string(),
        }),
    }
}
