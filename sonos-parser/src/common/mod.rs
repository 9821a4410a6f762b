//! Common utilities shared by the track and notification decoders
//!
//! - [`xml_decode`]: namespace stripping and the serde entry point
//! - [`attributes`]: helper types for `val`/`channel` attribute patterns
//! - [`didl`]: DIDL-Lite structures for media metadata

pub mod xml_decode;
pub mod attributes;
pub mod didl;

pub use attributes::{ChannelAttribute, ValueAttribute};
pub use didl::{DidlItem, DidlLite, DidlResource};
