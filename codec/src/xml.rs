//! Canonical XML mapping for [Document] trees.
//!
//! Scalars map to typed elements (`<int>`, `<float>`, `<bool>`, `<str>`,
//! `<null/>`), containers to `<array>` and `<map>`/`<entry key="…">`. The
//! standard archive wraps the value in a `<document version="M.m">` root;
//! the imported variant omits the wrapper so that externally produced XML
//! can travel without it.

use crate::document::Document;
use crate::errors::{CodecError, Result};
use crate::version::SchemaVersion;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

pub(crate) fn write_document(
    doc: &Document,
    version: SchemaVersion,
    wrap_root: bool,
) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    if wrap_root {
        let mut root = BytesStart::new("document");
        root.push_attribute(("version", version.to_string().as_str()));
        write_event(&mut writer, Event::Start(root))?;
        write_value(&mut writer, doc)?;
        write_event(&mut writer, Event::End(BytesEnd::new("document")))?;
    } else {
        write_value(&mut writer, doc)?;
    }

    Ok(writer.into_inner())
}

pub(crate) fn parse_document(bytes: &[u8], wrapped: bool) -> Result<(Document, SchemaVersion)> {
    let mut parser = Parser::new(bytes);

    if wrapped {
        let root = parser.next_element()?;
        let start = root.start();
        if start.name().as_ref() != b"document" {
            return Err(malformed("expected <document> root"));
        }

        let mut version = SchemaVersion::default();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| CodecError::DecodeFailure(e.into()))?;
            if attribute.key.as_ref() == b"version" {
                let text = attribute
                    .unescape_value()
                    .map_err(|e| CodecError::DecodeFailure(e.into()))?;
                version = text.parse()?;
            }
        }

        let inner = parser.next_element()?;
        let doc = parser.parse_value(inner)?;
        parser.expect_end(b"document")?;
        Ok((doc, version))
    } else {
        let root = parser.next_element()?;
        let doc = parser.parse_value(root)?;
        Ok((doc, SchemaVersion::default()))
    }
}

fn write_value(writer: &mut Writer<Vec<u8>>, doc: &Document) -> Result<()> {
    match doc {
        Document::Null => write_event(writer, Event::Empty(BytesStart::new("null"))),
        Document::Bool(b) => write_scalar(writer, "bool", if *b { "true" } else { "false" }),
        Document::Int(i) => write_scalar(writer, "int", &i.to_string()),
        Document::Float(f) => write_scalar(writer, "float", &f.to_string()),
        Document::Str(s) => write_scalar(writer, "str", s),
        Document::Array(items) => {
            write_event(writer, Event::Start(BytesStart::new("array")))?;
            for item in items {
                write_value(writer, item)?;
            }
            write_event(writer, Event::End(BytesEnd::new("array")))
        }
        Document::Map(entries) => {
            write_event(writer, Event::Start(BytesStart::new("map")))?;
            for (key, value) in entries {
                let mut entry = BytesStart::new("entry");
                entry.push_attribute(("key", key.as_str()));
                write_event(writer, Event::Start(entry))?;
                write_value(writer, value)?;
                write_event(writer, Event::End(BytesEnd::new("entry")))?;
            }
            write_event(writer, Event::End(BytesEnd::new("map")))
        }
    }
}

fn write_scalar(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    write_event(writer, Event::Start(BytesStart::new(tag)))?;
    write_event(writer, Event::Text(BytesText::new(text)))?;
    write_event(writer, Event::End(BytesEnd::new(tag)))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| CodecError::EncodeFailure(e.into()))
}

fn malformed(message: &str) -> CodecError {
    CodecError::MalformedXml(message.to_owned())
}

/// Element opening, with the empty-element case kept apart so callers can
/// tell `<null/>` from `<array>…</array>`.
enum Element {
    Start(BytesStart<'static>),
    Empty(BytesStart<'static>),
}

impl Element {
    fn start(&self) -> &BytesStart<'static> {
        match self {
            Element::Start(e) | Element::Empty(e) => e,
        }
    }
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            reader: Reader::from_reader(bytes),
            buf: Vec::new(),
        }
    }

    fn next_event(&mut self) -> Result<Event<'static>> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(|e| CodecError::DecodeFailure(e.into()))?;
            match event {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                // Whitespace between elements is markup formatting, not data.
                Event::Text(t) if t.iter().all(|b| b.is_ascii_whitespace()) => continue,
                other => return Ok(other.into_owned()),
            }
        }
    }

    fn next_element(&mut self) -> Result<Element> {
        match self.next_event()? {
            Event::Start(e) => Ok(Element::Start(e)),
            Event::Empty(e) => Ok(Element::Empty(e)),
            Event::Eof => Err(malformed("unexpected end of archive")),
            _ => Err(malformed("expected element")),
        }
    }

    fn expect_end(&mut self, name: &[u8]) -> Result<()> {
        match self.next_event()? {
            Event::End(e) if e.name().as_ref() == name => Ok(()),
            _ => Err(malformed("unbalanced element")),
        }
    }

    fn parse_value(&mut self, element: Element) -> Result<Document> {
        let name = element.start().name().as_ref().to_vec();
        match (name.as_slice(), &element) {
            (b"null", Element::Empty(_)) => Ok(Document::Null),
            (b"null", Element::Start(_)) => {
                self.expect_end(b"null")?;
                Ok(Document::Null)
            }
            (b"bool", _) => {
                let text = self.scalar_text(&element, b"bool")?;
                match text.as_str() {
                    "true" => Ok(Document::Bool(true)),
                    "false" => Ok(Document::Bool(false)),
                    _ => Err(malformed("invalid boolean literal")),
                }
            }
            (b"int", _) => {
                let text = self.scalar_text(&element, b"int")?;
                text.parse()
                    .map(Document::Int)
                    .map_err(|_| malformed("invalid integer literal"))
            }
            (b"float", _) => {
                let text = self.scalar_text(&element, b"float")?;
                text.parse()
                    .map(Document::Float)
                    .map_err(|_| malformed("invalid float literal"))
            }
            (b"str", _) => Ok(Document::Str(self.scalar_text(&element, b"str")?)),
            (b"array", Element::Empty(_)) => Ok(Document::Array(Vec::new())),
            (b"array", Element::Start(_)) => {
                let mut items = Vec::new();
                loop {
                    match self.next_event()? {
                        Event::Start(e) => items.push(self.parse_value(Element::Start(e))?),
                        Event::Empty(e) => items.push(self.parse_value(Element::Empty(e))?),
                        Event::End(e) if e.name().as_ref() == b"array" => break,
                        _ => return Err(malformed("unexpected content in <array>")),
                    }
                }
                Ok(Document::Array(items))
            }
            (b"map", Element::Empty(_)) => Ok(Document::Map(BTreeMap::new())),
            (b"map", Element::Start(_)) => {
                let mut entries = BTreeMap::new();
                loop {
                    match self.next_event()? {
                        Event::Start(e) if e.name().as_ref() == b"entry" => {
                            let key = entry_key(&e)?;
                            let child = self.next_element()?;
                            let value = self.parse_value(child)?;
                            self.expect_end(b"entry")?;
                            entries.insert(key, value);
                        }
                        Event::End(e) if e.name().as_ref() == b"map" => break,
                        _ => return Err(malformed("expected <entry> in <map>")),
                    }
                }
                Ok(Document::Map(entries))
            }
            _ => Err(malformed("unknown element in archive")),
        }
    }

    fn scalar_text(&mut self, element: &Element, name: &[u8]) -> Result<String> {
        if matches!(element, Element::Empty(_)) {
            return Ok(String::new());
        }

        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => {
                    text.push_str(&t.unescape().map_err(|e| CodecError::DecodeFailure(e.into()))?)
                }
                Event::CData(raw) => {
                    text.push_str(
                        std::str::from_utf8(&raw).map_err(|_| malformed("non-UTF-8 CDATA"))?,
                    );
                }
                Event::End(e) if e.name().as_ref() == name => break,
                _ => return Err(malformed("unexpected content in scalar element")),
            }
        }
        Ok(text)
    }
}

fn entry_key(start: &BytesStart<'_>) -> Result<String> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| CodecError::DecodeFailure(e.into()))?;
        if attribute.key.as_ref() == b"key" {
            let value = attribute
                .unescape_value()
                .map_err(|e| CodecError::DecodeFailure(e.into()))?;
            return Ok(value.into_owned());
        }
    }
    Err(malformed("<entry> without key attribute"))
}
