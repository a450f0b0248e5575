//! Shared XML helpers for report generation.

use std::borrow::Cow;
use std::io::Write;

use anyhow::Result;
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

/// Escape an attribute value, leaving apostrophes intact so XPath string
/// literals stay readable.
pub fn escape_attribute(value: &str) -> String {
    partial_escape(value).replace('"', "&quot;")
}

/// Start tag with the given attributes; `None` values are omitted.
pub fn element<'a>(name: &'a str, attributes: &[(&str, Option<&str>)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        if let Some(value) = value {
            push_attribute(&mut start, key, value);
        }
    }
    start
}

pub fn push_attribute(start: &mut BytesStart<'_>, key: &str, value: &str) {
    start.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escape_attribute(value).into_bytes()),
    });
}

pub fn write_empty<W: Write>(writer: &mut Writer<W>, start: BytesStart<'_>) -> Result<()> {
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

pub fn write_start<W: Write>(writer: &mut Writer<W>, start: BytesStart<'_>) -> Result<()> {
    writer.write_event(Event::Start(start))?;
    Ok(())
}

pub fn write_end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write a simple text element.
pub fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write `<text><locale id=".."/></text>`, with `<argument>` children
/// when the message takes arguments.
pub fn write_locale_text<W: Write>(writer: &mut Writer<W>, locale_id: &str, arguments: &[String]) -> Result<()> {
    write_start(writer, BytesStart::new("text"))?;
    let locale = element("locale", &[("id", Some(locale_id))]);
    if arguments.is_empty() {
        write_empty(writer, locale)?;
    } else {
        write_start(writer, locale)?;
        for argument in arguments {
            write_text_element(writer, "argument", argument)?;
        }
        write_end(writer, "locale")?;
    }
    write_end(writer, "text")
}

pub fn xml_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Capitalized booleans used by schedule fixtures.
pub fn fixture_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
