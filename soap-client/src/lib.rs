//! Private SOAP client for UPnP device control
//!
//! This crate provides a minimal SOAP client for issuing control actions
//! (play, pause, volume) to UPnP media renderers like Sonos speakers. Each
//! call is a one-shot HTTP POST: no retries, no connection state beyond the
//! pooled agent.

mod error;

pub use error::SoapError;

use std::time::Duration;
use xmltree::Element;

/// Port Sonos devices serve their UPnP control endpoints on
pub const DEFAULT_CONTROL_PORT: u16 = 1400;

/// User agent sent with every control request
pub const DEFAULT_USER_AGENT: &str = "Linux UPnP/1.0 Sonos/28.1-86200 (WDCR:Microsoft Windows NT 6.2.9200.0)";

/// Connection settings for [`SoapClient`]
#[derive(Debug, Clone)]
pub struct SoapClientConfig {
    /// Timeout for establishing the TCP connection
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Timeout for reading the device's response
    /// Default: 10 seconds
    pub read_timeout: Duration,

    /// Port the control endpoints are served on
    /// Default: 1400
    pub port: u16,

    /// Value of the USER-AGENT header
    pub user_agent: String,
}

impl Default for SoapClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            port: DEFAULT_CONTROL_PORT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// A minimal SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
    port: u16,
}

impl SoapClient {
    /// Create a new SOAP client with default configuration
    pub fn new() -> Self {
        Self::with_config(SoapClientConfig::default())
    }

    /// Create a SOAP client with custom timeouts, port, or user agent
    pub fn with_config(config: SoapClientConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(config.connect_timeout)
                .timeout_read(config.read_timeout)
                .user_agent(&config.user_agent)
                .build(),
            port: config.port,
        }
    }

    /// Port this client addresses devices on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send a SOAP action and return the `<{action}Response>` element
    ///
    /// # Arguments
    /// * `ip` - Device IP address
    /// * `endpoint` - Control path, e.g. `/MediaRenderer/AVTransport/Control`
    /// * `service_uri` - Service type URN the action belongs to
    /// * `action` - Action name, e.g. `Play`
    /// * `payload` - Argument elements placed inside the action element
    pub fn call(
        &self,
        ip: &str,
        endpoint: &str,
        service_uri: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element, SoapError> {
        let body = envelope(service_uri, action, payload);
        let url = control_url(ip, self.port, endpoint);

        tracing::debug!(%url, action, "sending SOAP action");

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action_header(service_uri, action))
            .send_string(&body);

        let xml_text = match response {
            Ok(response) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            // UPnP devices report action failures as HTTP 500 with a fault body
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                return match Element::parse(text.as_bytes()) {
                    Ok(xml) => match extract_response(&xml, action) {
                        Err(SoapError::Fault(code)) => Err(SoapError::Fault(code)),
                        _ => Err(SoapError::Network(format!("HTTP {}", status))),
                    },
                    Err(_) => Err(SoapError::Network(format!("HTTP {}", status))),
                };
            }
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml = Element::parse(xml_text.as_bytes())
            .map_err(|e| SoapError::Parse(e.to_string()))?;

        extract_response(&xml, action)
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the SOAP 1.1 envelope for an action
pub fn envelope(service_uri: &str, action: &str, payload: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_uri}">{payload}</u:{action}></s:Body></s:Envelope>"#,
        action = action,
        service_uri = service_uri,
        payload = payload
    )
}

/// Value of the SOAPACTION header, quoted as UPnP requires
pub fn soap_action_header(service_uri: &str, action: &str) -> String {
    format!("\"{}#{}\"", service_uri, action)
}

/// Absolute control URL for a device endpoint
pub fn control_url(ip: &str, port: u16, endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        format!("http://{}:{}{}", ip, port, endpoint)
    } else {
        format!("http://{}:{}/{}", ip, port, endpoint)
    }
}

fn extract_response(xml: &Element, action: &str) -> Result<Element, SoapError> {
    let body = xml
        .get_child("Body")
        .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

    if let Some(fault) = body.get_child("Fault") {
        let error_code = fault
            .get_child("detail")
            .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")))
            .and_then(|e| e.get_child("errorCode"))
            .and_then(|c| c.get_text())
            .and_then(|t| t.trim().parse::<u16>().ok())
            .unwrap_or(500);
        return Err(SoapError::Fault(error_code));
    }

    let response_name = format!("{}Response", action);
    body.get_child(response_name.as_str())
        .cloned()
        .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
}
