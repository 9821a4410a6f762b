//! XML front end shared by every decoder.
//!
//! Sonos payloads mix several namespaces (`dc:`, `upnp:`, `r:`, the AVT and
//! RCS event namespaces). Decoding happens in two steps: the document is
//! first re-emitted with every prefix dropped, which also validates that it
//! is well-formed, and the result is then handed to serde.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;

use crate::error::{ParseError, ParseResult};

/// Parse XML into a deserializable type after stripping namespace prefixes.
///
/// Malformed input is reported as [`ParseError::InvalidXmlStructure`]; input
/// that is well-formed but does not fit `T` is reported as
/// [`ParseError::XmlDeserializationFailed`].
pub fn parse<T: DeserializeOwned>(xml: &str) -> ParseResult<T> {
    let stripped = strip_namespaces(xml)?;
    quick_xml::de::from_str(&stripped)
        .map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
}

/// Re-emit `xml` with namespace prefixes removed from element and attribute
/// names and with `xmlns` declarations dropped.
///
/// Text and attribute values are copied through still escaped, so a nested
/// document carried in an attribute survives for a second decoding pass.
///
/// # Example
///
/// Input: `<e:propertyset xmlns:e="urn:x"><dc:title>Song</dc:title></e:propertyset>`
/// Output: `<propertyset><title>Song</title></propertyset>`
pub fn strip_namespaces(xml: &str) -> ParseResult<String> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(true);

    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut open_elements = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseError::InvalidXmlStructure(format!(
                "at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        let written = match event {
            Event::Start(start) => {
                open_elements += 1;
                writer.write_event(Event::Start(local_start(&start)?))
            }
            Event::Empty(start) => writer.write_event(Event::Empty(local_start(&start)?)),
            Event::End(end) => {
                open_elements = open_elements.saturating_sub(1);
                let name = utf8(end.local_name().as_ref())?.to_owned();
                writer.write_event(Event::End(BytesEnd::new(name)))
            }
            Event::Eof => break,
            other => writer.write_event(other),
        };
        written.map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;
    }

    if open_elements != 0 {
        return Err(ParseError::InvalidXmlStructure(format!(
            "{} element(s) left unclosed",
            open_elements
        )));
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))
}

fn local_start(start: &BytesStart<'_>) -> ParseResult<BytesStart<'static>> {
    let name = utf8(start.local_name().as_ref())?.to_owned();
    let mut stripped = BytesStart::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))?;
        let key = attr.key;
        let is_declaration = key.as_ref() == b"xmlns"
            || key.prefix().map_or(false, |p| p.as_ref() == b"xmlns");
        if is_declaration {
            continue;
        }
        stripped.push_attribute((key.local_name().as_ref(), attr.value.as_ref()));
    }

    Ok(stripped)
}

fn utf8(bytes: &[u8]) -> ParseResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidXmlStructure(e.to_string()))
}
