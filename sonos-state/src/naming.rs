//! Room and role derivation from announced device names
//!
//! A media renderer announces itself as `"<room> - <role> Media Renderer"`,
//! e.g. `"Kitchen - ZP120 Media Renderer"`. The suffix is dropped, `" - "`
//! becomes `':'`, and the colon-separated segments give the room (first) and
//! the role (second). Model names that contain a colon themselves
//! (`"PLAY:1"`) split further and only their first half ends up as the role.

use url::Url;

use crate::error::{Result, StateError};

const RENDERER_SUFFIX: &str = " Media Renderer";

/// Room and role parsed from a friendly name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceName {
    pub room: String,
    pub role: String,
}

/// Split a friendly name into room and role.
pub fn parse_friendly_name(friendly_name: &str) -> Result<DeviceName> {
    let normalized = friendly_name
        .replace(RENDERER_SUFFIX, "")
        .replace(" - ", ":");
    let mut segments = normalized.split(':');

    let room = segments.next().unwrap_or_default();
    let role = segments.next().ok_or_else(|| StateError::NamingConvention {
        friendly_name: friendly_name.to_string(),
        reason: "no ' - ' delimiter between room and role".to_string(),
    })?;

    if room.trim().is_empty() {
        return Err(StateError::NamingConvention {
            friendly_name: friendly_name.to_string(),
            reason: "empty room name".to_string(),
        });
    }

    Ok(DeviceName {
        room: room.to_string(),
        role: role.to_string(),
    })
}

/// Host of a device descriptor URL such as
/// `http://192.168.1.20:1400/xml/device_description.xml`.
pub fn address_from_descriptor_url(descriptor_url: &str) -> Result<String> {
    let url = Url::parse(descriptor_url)
        .map_err(|e| StateError::InvalidDescriptorUrl(format!("{}: {}", descriptor_url, e)))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(StateError::InvalidDescriptorUrl(descriptor_url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Kitchen - ZP120 Media Renderer", "Kitchen", "ZP120")]
    #[case("Living Room - Sonos Playbar Media Renderer", "Living Room", "Sonos Playbar")]
    #[case("Office - ZP90", "Office", "ZP90")]
    #[case("Bedroom - Sonos PLAY:1 Media Renderer", "Bedroom", "Sonos PLAY")]
    #[case("Den:Sub", "Den", "Sub")]
    fn test_parse_friendly_name(#[case] name: &str, #[case] room: &str, #[case] role: &str) {
        let parsed = parse_friendly_name(name).unwrap();
        assert_eq!(parsed.room, room);
        assert_eq!(parsed.role, role);
    }

    #[rstest]
    #[case("Kitchen Media Renderer")]
    #[case("Kitchen")]
    #[case("")]
    #[case(" - ZP120 Media Renderer")]
    fn test_malformed_friendly_name(#[case] name: &str) {
        assert!(matches!(
            parse_friendly_name(name),
            Err(StateError::NamingConvention { .. })
        ));
    }

    #[rstest]
    #[case("http://192.168.1.20:1400/xml/device_description.xml", "192.168.1.20")]
    #[case("http://10.0.0.5/desc.xml", "10.0.0.5")]
    #[case("http://[fe80::1]:1400/xml/device_description.xml", "[fe80::1]")]
    fn test_address_from_descriptor_url(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(address_from_descriptor_url(url).unwrap(), expected);
    }

    #[rstest]
    #[case("not a url")]
    #[case("/xml/device_description.xml")]
    #[case("mailto:someone@example.com")]
    fn test_invalid_descriptor_url(#[case] url: &str) {
        assert!(matches!(
            address_from_descriptor_url(url),
            Err(StateError::InvalidDescriptorUrl(_))
        ));
    }
}
