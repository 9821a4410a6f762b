//! Error types for sonos-state

use std::fmt;

use soap_client::SoapError;
use sonos_parser::ParseError;

/// Result type for sonos-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while tracking or controlling devices
///
/// Every variant is scoped to the single notification, command or discovery
/// event that produced it.
#[derive(Debug)]
pub enum StateError {
    /// A notification or its embedded track metadata could not be decoded
    Decode(ParseError),

    /// An outbound command to one device failed
    Transport { device: String, source: SoapError },

    /// One or more members of a room failed a fanned-out command
    FanOut {
        room: String,
        attempted: usize,
        failures: Vec<StateError>,
    },

    /// A friendly name did not follow the `<room> - <role>` convention
    NamingConvention { friendly_name: String, reason: String },

    /// A descriptor URL without a usable host
    InvalidDescriptorUrl(String),

    /// Requested volume outside 0..=100
    InvalidVolume(u8),

    /// The device is already a member of a room
    AlreadyInRoom { device: String, room: String },

    /// The discovery transport failed
    Discovery(String),
}

impl StateError {
    /// First member failure of a fanned-out command, or `self` otherwise
    pub fn first_failure(&self) -> &StateError {
        match self {
            StateError::FanOut { failures, .. } => failures.first().unwrap_or(self),
            _ => self,
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Decode(err) => write!(f, "Decode error: {}", err),
            StateError::Transport { device, source } => {
                write!(f, "Command to {} failed: {}", device, source)
            }
            StateError::FanOut {
                room,
                attempted,
                failures,
            } => write!(
                f,
                "{} of {} devices in room '{}' failed",
                failures.len(),
                attempted,
                room
            ),
            StateError::NamingConvention {
                friendly_name,
                reason,
            } => write!(f, "Unexpected device name '{}': {}", friendly_name, reason),
            StateError::InvalidDescriptorUrl(url) => write!(f, "Invalid descriptor URL: {}", url),
            StateError::InvalidVolume(level) => {
                write!(f, "Volume {} is out of range (0-100)", level)
            }
            StateError::AlreadyInRoom { device, room } => {
                write!(f, "Device {} already belongs to room '{}'", device, room)
            }
            StateError::Discovery(msg) => write!(f, "Discovery error: {}", msg),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::Decode(err) => Some(err),
            StateError::Transport { source, .. } => Some(source),
            StateError::FanOut { failures, .. } => failures
                .first()
                .map(|e| e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<ParseError> for StateError {
    fn from(err: ParseError) -> Self {
        StateError::Decode(err)
    }
}

impl From<url::ParseError> for StateError {
    fn from(err: url::ParseError) -> Self {
        StateError::InvalidDescriptorUrl(err.to_string())
    }
}
