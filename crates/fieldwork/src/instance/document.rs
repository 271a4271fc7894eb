//! Instance document model.
//!
//! An ODK instance is read into a tree of [`XmlValue`]s, shaped the way
//! form tooling usually sees XML as a dictionary:
//! - an empty element without attributes is `Null`
//! - an element holding only text is `Text`
//! - an element with children or attributes is a `Mapping`; attributes
//!   become `@name` keys and any text becomes `#text`
//! - an element name repeated under one parent collapses into a `List`

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

/// Key used for element text that sits next to children or attributes.
pub const TEXT_KEY: &str = "#text";
/// Prefix marking keys that came from XML attributes.
pub const ATTRIBUTE_PREFIX: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum XmlValue {
    Null,
    Text(String),
    Mapping(Vec<(String, XmlValue)>),
    List(Vec<XmlValue>),
}

impl XmlValue {
    /// Short shape name for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            XmlValue::Null => "null",
            XmlValue::Text(_) => "text",
            XmlValue::Mapping(_) => "mapping",
            XmlValue::List(_) => "list",
        }
    }

    /// Look up a direct child of a mapping.
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        match self {
            XmlValue::Mapping(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A parsed instance: the root element's name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root_name: String,
    pub root: XmlValue,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("instance is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("instance contains no root element")]
    Empty,

    #[error("instance has more than one root element (second is <{0}>)")]
    MultipleRoots(String),
}

struct Frame {
    name: String,
    fields: Vec<(String, XmlValue)>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>, position: u64) -> Result<Self, DocumentError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let mut fields = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| DocumentError::Malformed {
                position,
                message: e.to_string(),
            })?;
            let key = format!(
                "{}{}",
                ATTRIBUTE_PREFIX,
                String::from_utf8_lossy(attr.key.as_ref())
            );
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::Malformed {
                    position,
                    message: e.to_string(),
                })?
                .to_string();
            fields.push((key, XmlValue::Text(value)));
        }
        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, XmlValue) {
        let text = self.text.trim().to_string();
        let value = if self.fields.is_empty() {
            if text.is_empty() {
                XmlValue::Null
            } else {
                XmlValue::Text(text)
            }
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.push((TEXT_KEY.to_string(), XmlValue::Text(text)));
            }
            XmlValue::Mapping(fields)
        };
        (self.name, value)
    }

    fn add_child(&mut self, name: String, value: XmlValue) {
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, XmlValue::List(items))) => items.push(value),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, XmlValue::Null);
                *existing = XmlValue::List(vec![first, value]);
            }
            None => self.fields.push((name, value)),
        }
    }
}

/// Parse raw instance bytes into a [`Document`].
pub fn parse_document(bytes: &[u8]) -> Result<Document, DocumentError> {
    let text = std::str::from_utf8(bytes)?;
    // Untrimmed events; `Frame::close` trims the joined text
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<Frame> = Vec::new();
    let mut document: Option<Document> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| DocumentError::Malformed {
            position,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                if stack.is_empty() && document.is_some() {
                    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                    return Err(DocumentError::MultipleRoots(name));
                }
                stack.push(Frame::open(&start, position)?);
            }
            Event::Empty(start) => {
                if stack.is_empty() && document.is_some() {
                    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                    return Err(DocumentError::MultipleRoots(name));
                }
                let (name, value) = Frame::open(&start, position)?.close();
                attach(&mut stack, &mut document, name, value);
            }
            Event::End(_) => {
                let frame = stack.pop().ok_or_else(|| DocumentError::Malformed {
                    position,
                    message: "closing tag without an open element".to_string(),
                })?;
                let (name, value) = frame.close();
                attach(&mut stack, &mut document, name, value);
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(|e| DocumentError::Malformed {
                    position,
                    message: e.to_string(),
                })?;
                match stack.last_mut() {
                    Some(frame) => frame.text.push_str(&unescaped),
                    None if unescaped.trim().is_empty() => {}
                    None => {
                        return Err(DocumentError::Malformed {
                            position,
                            message: "text outside the root element".to_string(),
                        })
                    }
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(frame) = stack.last() {
        return Err(DocumentError::Malformed {
            position: reader.buffer_position() as u64,
            message: format!("unclosed element <{}>", frame.name),
        });
    }

    document.ok_or(DocumentError::Empty)
}

fn attach(
    stack: &mut [Frame],
    document: &mut Option<Document>,
    name: String,
    value: XmlValue,
) {
    match stack.last_mut() {
        Some(parent) => parent.add_child(name, value),
        None => {
            *document = Some(Document {
                root_name: name,
                root: value,
            })
        }
    }
}
