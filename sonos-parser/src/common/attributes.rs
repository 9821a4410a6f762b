//! Helper types for the UPnP "value in an attribute" pattern.

use serde::{Deserialize, Serialize};

/// An element whose payload is its `val` attribute.
///
/// ```xml
/// <TransportState val="PLAYING"/>
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ValueAttribute {
    /// The value from the `val` attribute
    #[serde(rename = "@val", default)]
    pub val: String,
}

/// A per-channel element from RenderingControl events.
///
/// ```xml
/// <Volume channel="Master" val="31"/>
/// <Mute channel="LF" val="0"/>
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ChannelAttribute {
    /// Channel name: `Master`, `LF` or `RF`
    #[serde(rename = "@channel", default)]
    pub channel: String,

    /// The value from the `val` attribute
    #[serde(rename = "@val", default)]
    pub val: String,
}

impl ChannelAttribute {
    /// Whether this element describes the master channel
    pub fn is_master(&self) -> bool {
        self.channel == "Master"
    }
}
