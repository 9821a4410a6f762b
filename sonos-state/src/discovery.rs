//! Discovery collaborator contract and the session that drives it
//!
//! The network search itself (SSDP, GENA subscriptions) is provided by a
//! [`DiscoveryTransport`]. This module only defines what the controller
//! consumes from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifies one advertised service of one device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId {
    pub descriptor_url: String,
    pub service_type: String,
}

/// A service that appeared on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAnnouncement {
    pub manufacturer: String,
    /// e.g. `urn:schemas-upnp-org:service:RenderingControl:1`
    pub service_type: String,
    /// e.g. `http://192.168.1.20:1400/xml/device_description.xml`
    pub descriptor_url: String,
    /// e.g. `Kitchen - ZP120 Media Renderer`
    pub friendly_name: String,
}

impl ServiceAnnouncement {
    pub fn id(&self) -> ServiceId {
        ServiceId {
            descriptor_url: self.descriptor_url.clone(),
            service_type: self.service_type.clone(),
        }
    }
}

/// Events delivered by a [`DiscoveryTransport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryEvent {
    SearchStarted,
    ServiceAdded(ServiceAnnouncement),
    /// A subscribed service reported a state variable change
    StateVariableChanged {
        service: ServiceId,
        name: String,
        value: String,
    },
    SearchEnded,
}

/// Network search and event subscription provider
pub trait DiscoveryTransport: Send {
    /// Start or stop searching
    fn set_active(&mut self, active: bool) -> Result<()>;

    /// Wait up to `timeout` for the next event. `None` means nothing arrived.
    fn next_event(&mut self, timeout: Duration) -> Option<DiscoveryEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Searching,
}

/// Owns a [`DiscoveryTransport`] and mirrors its search lifecycle.
///
/// The state follows the transport's own `SearchStarted`/`SearchEnded`
/// events, not the calls made to [`start`](Self::start) and
/// [`stop`](Self::stop).
pub struct DiscoverySession {
    transport: Box<dyn DiscoveryTransport>,
    state: SearchState,
}

impl DiscoverySession {
    pub fn new(transport: Box<dyn DiscoveryTransport>) -> Self {
        Self {
            transport,
            state: SearchState::Idle,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn start(&mut self) -> Result<()> {
        self.transport.set_active(true)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.transport.set_active(false)
    }

    pub fn next_event(&mut self, timeout: Duration) -> Option<DiscoveryEvent> {
        let event = self.transport.next_event(timeout)?;
        match event {
            DiscoveryEvent::SearchStarted => self.state = SearchState::Searching,
            DiscoveryEvent::SearchEnded => self.state = SearchState::Idle,
            _ => {}
        }
        Some(event)
    }
}

impl std::fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("state", &self.state)
            .finish()
    }
}
