//! Pull-style element event stream over quick-xml.
//!
//! Every document type minimaven reads (POMs, per-version snapshot metadata,
//! artifact-level version metadata) is consumed as the same narrow sequence of
//! [`XmlEvent`]s: an element opens, and later closes carrying its text.
//!
//! Text aggregation follows one rule: character data (text, CDATA and entity
//! references) arriving between a start tag and its matching end tag is
//! concatenated in arrival order and trimmed once, at the end tag. Only leaf
//! elements report text; character data before the root element, after it, or
//! interleaved with child elements is dropped so mixed content can never leak
//! into a leaf value.

use crate::error::{MinimavenError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start of an element, by local name (namespace prefix stripped).
    Open(String),
    /// End of an element. `text` is present only for leaf elements that
    /// received character data.
    Close { name: String, text: Option<String> },
}

pub struct ElementReader<'a> {
    reader: Reader<&'a [u8]>,
    context: String,
    text: String,
    got_text: bool,
    leaf: bool,
    depth: usize,
    saw_root: bool,
    pending: Option<XmlEvent>,
}

impl<'a> ElementReader<'a> {
    /// Creates a reader over `content`. `context` names the document in errors.
    pub fn new(content: &'a str, context: impl Into<String>) -> Self {
        Self {
            reader: Reader::from_str(content),
            context: context.into(),
            text: String::new(),
            got_text: false,
            leaf: false,
            depth: 0,
            saw_root: false,
            pending: None,
        }
    }

    /// Creates a reader over raw bytes, rejecting invalid UTF-8.
    pub fn from_bytes(content: &'a [u8], context: impl Into<String>) -> Result<Self> {
        let context = context.into();
        let text = std::str::from_utf8(content).map_err(|e| MinimavenError::parse(&context, e))?;
        Ok(Self::new(text, context))
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Current element nesting depth (1 inside the root element).
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the next element event, or `None` at the end of a well-formed document.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if let Some(event) = self.pending.take() {
            return Ok(Some(event));
        }

        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| MinimavenError::parse(&self.context, e))?;

            match event {
                Event::Start(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    self.open();
                    return Ok(Some(XmlEvent::Open(name)));
                }
                Event::Empty(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    self.open();
                    self.pending = Some(self.close(name.clone()));
                    return Ok(Some(XmlEvent::Open(name)));
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    return Ok(Some(self.close(name)));
                }
                Event::Text(ref e) => {
                    if self.depth > 0 {
                        let text = e
                            .decode()
                            .map_err(|err| MinimavenError::parse(&self.context, err))?;
                        self.push_text(&text);
                    }
                }
                Event::CData(ref e) => {
                    if self.depth > 0 {
                        let text = e
                            .decode()
                            .map_err(|err| MinimavenError::parse(&self.context, err))?;
                        self.push_text(&text);
                    }
                }
                Event::GeneralRef(ref e) => {
                    if self.depth > 0 {
                        let name = e
                            .decode()
                            .map_err(|err| MinimavenError::parse(&self.context, err))?;
                        let reference = format!("&{name};");
                        let resolved = quick_xml::escape::unescape(&reference)
                            .map_err(|err| MinimavenError::parse(&self.context, err))?;
                        self.push_text(&resolved);
                    }
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(MinimavenError::parse(
                            &self.context,
                            "unexpected end of document inside an element",
                        ));
                    }
                    if !self.saw_root {
                        return Err(MinimavenError::parse(&self.context, "no root element"));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn open(&mut self) {
        self.depth += 1;
        self.saw_root = true;
        self.text.clear();
        self.got_text = false;
        self.leaf = true;
    }

    fn close(&mut self, name: String) -> XmlEvent {
        self.depth = self.depth.saturating_sub(1);
        let text = (self.leaf && self.got_text).then(|| self.text.trim().to_string());
        self.text.clear();
        self.got_text = false;
        self.leaf = false;
        XmlEvent::Close { name, text }
    }

    fn push_text(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        self.got_text = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(xml: &str) -> Result<Vec<XmlEvent>> {
        let mut reader = ElementReader::new(xml, "test.xml");
        let mut events = Vec::new();
        while let Some(event) = reader.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    fn close(name: &str, text: Option<&str>) -> XmlEvent {
        XmlEvent::Close {
            name: name.into(),
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn test_leaf_text_is_trimmed() {
        let events = collect("<a>\n  <b>  1.0.0 \n</b>\n</a>").unwrap();
        assert_eq!(
            events,
            vec![
                XmlEvent::Open("a".into()),
                XmlEvent::Open("b".into()),
                close("b", Some("1.0.0")),
                close("a", None),
            ]
        );
    }

    #[test]
    fn test_mixed_content_does_not_leak_into_parent() {
        let events = collect("<a>before<b>x</b>after</a>").unwrap();
        assert_eq!(events[2], close("b", Some("x")));
        assert_eq!(events[3], close("a", None));
    }

    #[test]
    fn test_text_before_root_is_discarded() {
        let events = collect("<?xml version=\"1.0\"?>\n<!-- c --><v>1</v>").unwrap();
        assert_eq!(events, vec![XmlEvent::Open("v".into()), close("v", Some("1"))]);
    }

    #[test]
    fn test_entities_and_cdata_are_concatenated() {
        let events = collect("<a>x &amp; <![CDATA[<y>]]> z</a>").unwrap();
        assert_eq!(events[1], close("a", Some("x & <y> z")));
    }

    #[test]
    fn test_self_closing_element() {
        let events = collect("<a><b/></a>").unwrap();
        assert_eq!(
            events,
            vec![
                XmlEvent::Open("a".into()),
                XmlEvent::Open("b".into()),
                close("b", None),
                close("a", None),
            ]
        );
    }

    #[test]
    fn test_namespace_prefix_is_stripped() {
        let events = collect(r#"<p:project xmlns:p="urn:x"><p:version>2</p:version></p:project>"#)
            .unwrap();
        assert_eq!(events[0], XmlEvent::Open("project".into()));
        assert_eq!(events[2], close("version", Some("2")));
    }

    #[test]
    fn test_empty_leaf_reports_empty_text() {
        let events = collect("<a><b>   </b></a>").unwrap();
        assert_eq!(events[2], close("b", Some("")));
    }

    #[test]
    fn test_mismatched_end_tag_is_an_error() {
        let result = collect("<a><b></a></b>");
        assert!(matches!(result, Err(MinimavenError::Parse { .. })));
    }

    #[test]
    fn test_unclosed_document_is_an_error() {
        let result = collect("<a><b>1</b>");
        assert!(matches!(result, Err(MinimavenError::Parse { .. })));
    }

    #[test]
    fn test_empty_document_is_an_error() {
        assert!(collect("").is_err());
        assert!(collect("just text").is_err());
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let result = ElementReader::from_bytes(&[0x3c, 0xff, 0x3e], "bad.xml");
        assert!(result.is_err());
    }
}
