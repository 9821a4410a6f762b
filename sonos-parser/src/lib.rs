//! # sonos-parser
//!
//! Decoders for the XML a Sonos speaker sends while it is being watched:
//! GENA `propertyset` notification bodies, the `LastChange` documents they
//! carry, and the DIDL-Lite metadata describing the current track.
//!
//! ## Usage
//!
//! ```rust
//! use sonos_parser::{decode_last_change, StateDelta, TransportState};
//!
//! let xml = r#"<Event><InstanceID val="0"><TransportState val="PLAYING"/></InstanceID></Event>"#;
//! let deltas = decode_last_change(xml).unwrap();
//! assert_eq!(deltas, vec![StateDelta::TransportChanged(TransportState::Playing)]);
//! ```
//!
//! Decoding is pure: nothing here performs I/O or keeps state, so the
//! functions can be called from any thread.

pub mod common;
pub mod error;
pub mod last_change;
pub mod property_set;
pub mod track;

pub use common::{ChannelAttribute, DidlItem, DidlLite, DidlResource, ValueAttribute};
pub use error::{ParseError, ParseResult};
pub use last_change::{
    decode_last_change, decode_last_change_with_base, InstanceState, LastChangeEvent, StateDelta,
    TransportState,
};
pub use property_set::{decode_property_set, StateVariable};
pub use track::{decode_track, decode_track_with_base, Album, Track, MUSIC_TRACK_CLASS};
