//! GENA `propertyset` decoding.
//!
//! A UPnP event notification body lists changed state variables, one per
//! `property` element:
//!
//! ```xml
//! <e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
//!   <e:property><LastChange>&lt;Event ...&gt;</LastChange></e:property>
//! </e:propertyset>
//! ```
//!
//! Variable names are dynamic, so this decoder walks the document with the
//! streaming reader instead of going through serde.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::common::xml_decode;
use crate::error::{ParseError, ParseResult};

/// A single changed state variable with its unescaped value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVariable {
    pub name: String,
    pub value: String,
}

/// Decode a GENA notification body into its state variables, in document
/// order.
pub fn decode_property_set(xml: &str) -> ParseResult<Vec<StateVariable>> {
    let stripped = xml_decode::strip_namespaces(xml)?;
    let mut reader = Reader::from_str(&stripped);

    let mut variables = Vec::new();
    let mut in_property = false;
    let mut current: Option<StateVariable> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;

        match event {
            Event::Start(start) => {
                let name = local(start.local_name().as_ref())?;
                if name == "property" {
                    in_property = true;
                } else if in_property && current.is_none() {
                    current = Some(StateVariable {
                        name,
                        value: String::new(),
                    });
                }
            }
            Event::Empty(start) => {
                if in_property && current.is_none() {
                    variables.push(StateVariable {
                        name: local(start.local_name().as_ref())?,
                        value: String::new(),
                    });
                }
            }
            Event::Text(text) => {
                if let Some(variable) = current.as_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;
                    variable.value.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(variable) = current.as_mut() {
                    variable.value.push_str(&local(&data)?);
                }
            }
            Event::End(end) => {
                let name = local(end.local_name().as_ref())?;
                if name == "property" {
                    in_property = false;
                } else if current.as_ref().map_or(false, |v| v.name == name) {
                    if let Some(variable) = current.take() {
                        variables.push(variable);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(variables)
}

fn local(bytes: &[u8]) -> ParseResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))
}
