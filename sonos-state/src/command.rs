//! Outbound control commands and the transport seam that sends them

use serde::{Deserialize, Serialize};
use soap_client::{SoapClient, SoapError};

/// UPnP services a device is controlled through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    /// Playback control (play, pause)
    AVTransport,

    /// Audio rendering (volume)
    RenderingControl,
}

/// Control endpoint and service type of a [`Service`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Control path relative to the device base URL
    pub endpoint: &'static str,

    /// Service type URN used in the SOAP envelope and SOAPACTION header
    pub service_uri: &'static str,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::AVTransport => "AVTransport",
            Service::RenderingControl => "RenderingControl",
        }
    }

    pub fn info(&self) -> ServiceInfo {
        match self {
            Service::AVTransport => ServiceInfo {
                endpoint: "/MediaRenderer/AVTransport/Control",
                service_uri: "urn:schemas-upnp-org:service:AVTransport:1",
            },
            Service::RenderingControl => ServiceInfo {
                endpoint: "/MediaRenderer/RenderingControl/Control",
                service_uri: "urn:schemas-upnp-org:service:RenderingControl:1",
            },
        }
    }
}

/// A command a device or room can be asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    Play,
    Pause,
    /// Master volume, 0-100
    SetVolume(u8),
}

/// A fully specified SOAP action, ready to be sent to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub service: Service,
    pub action: &'static str,
    /// Argument elements placed inside the action element
    pub payload: String,
}

impl ControlCommand {
    pub fn request(&self) -> ControlRequest {
        match self {
            ControlCommand::Play => ControlRequest {
                service: Service::AVTransport,
                action: "Play",
                payload: "<InstanceID>0</InstanceID><Speed>1</Speed>".to_string(),
            },
            ControlCommand::Pause => ControlRequest {
                service: Service::AVTransport,
                action: "Pause",
                payload: "<InstanceID>0</InstanceID>".to_string(),
            },
            ControlCommand::SetVolume(level) => ControlRequest {
                service: Service::RenderingControl,
                action: "SetVolume",
                payload: format!(
                    "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredVolume>{}</DesiredVolume>",
                    level
                ),
            },
        }
    }
}

impl ControlRequest {
    /// Value of the SOAPACTION header for this request
    pub fn soap_action(&self) -> String {
        soap_client::soap_action_header(self.service.info().service_uri, self.action)
    }
}

/// Sends control requests to devices.
///
/// A call either succeeds or fails as a whole. Implementations do not retry
/// and the response body is not interpreted beyond fault detection.
pub trait CommandTransport: Send + Sync {
    fn send(&self, address: &str, request: &ControlRequest) -> Result<(), SoapError>;
}

impl CommandTransport for SoapClient {
    fn send(&self, address: &str, request: &ControlRequest) -> Result<(), SoapError> {
        let info = request.service.info();
        self.call(
            address,
            info.endpoint,
            info.service_uri,
            request.action,
            &request.payload,
        )
        .map(|_| ())
    }
}
