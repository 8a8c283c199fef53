//! Minimal element tree over quick-xml: strict parsing and a deterministic
//! pretty-printer.
//!
//! The tree keeps exactly what the receipt schema needs: element names,
//! attributes in source order, and trimmed text. Comments, processing
//! instructions and doctypes are dropped, whitespace-only text is dropped,
//! and CDATA becomes ordinary text. Every parse yields a fresh owned value.
//!
//! ## Canonical form
//!
//! ```text
//! <?xml version="1.0" ?>          (optional)
//! <receipt>
//!   <store_info>
//!     <name>Cafe</name>           text-only element stays on one line
//!     <phone/>                    empty element self-closes
//!   </store_info>
//! </receipt>
//! ```
//!
//! No line of the output is blank, so rendering a parse of the canonical
//! text reproduces it byte for byte.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

/// A parse error with the byte offset reported by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupError {
    pub message: String,
    pub position: u64,
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.position)
    }
}

impl std::error::Error for MarkupError {}

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Child elements named `name`, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// Follow a `/`-separated path of child names, first match at each step.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|seg| !seg.is_empty())
            .try_fold(self, |el, seg| el.child(seg))
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Parse `input` into a single root element.
///
/// Fails on malformed markup, mismatched or unclosed tags, unknown entities,
/// a missing root, a second root, or non-whitespace text outside the root.
pub fn parse_markup(input: &str) -> Result<Element, MarkupError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let pos = reader.buffer_position();
        let event = reader.read_event().map_err(|e| MarkupError {
            message: e.to_string(),
            position: reader.error_position(),
        })?;
        let fail = |message: &str| MarkupError {
            message: message.to_string(),
            position: pos,
        };

        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(fail("element after the root element"));
                }
                stack.push(open_element(&e, pos)?);
            }
            Event::Empty(e) => {
                let el = open_element(&e, pos)?;
                attach(&mut stack, &mut root, el).map_err(|m| fail(m))?;
            }
            Event::End(_) => {
                let el = stack.pop().ok_or_else(|| fail("closing tag without an open element"))?;
                attach(&mut stack, &mut root, el).map_err(|m| fail(m))?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| fail(&e.to_string()))?;
                push_text(&mut stack, &text).map_err(|m| fail(m))?;
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                let text = String::from_utf8_lossy(&raw);
                push_text(&mut stack, &text).map_err(|m| fail(m))?;
            }
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(MarkupError {
            message: format!("unclosed element <{}>", open.name),
            position: input.len() as u64,
        });
    }
    root.ok_or_else(|| MarkupError {
        message: "no root element".to_string(),
        position: 0,
    })
}

fn open_element(start: &BytesStart<'_>, pos: u64) -> Result<Element, MarkupError> {
    let fail = |message: String| MarkupError {
        message,
        position: pos,
    };
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| fail(format!("element name is not UTF-8: {e}")))?
        .to_string();

    let mut el = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| fail(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| fail(format!("attribute name is not UTF-8: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| fail(e.to_string()))?
            .into_owned();
        el.attributes.push((key, value));
    }
    Ok(el)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), &'static str> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(el));
        Ok(())
    } else if root.is_some() {
        Err("more than one root element")
    } else {
        *root = Some(el);
        Ok(())
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), &'static str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match stack.last_mut() {
        Some(parent) => {
            // Text interrupted by a comment or CDATA arrives as several events.
            if let Some(Node::Text(prev)) = parent.children.last_mut() {
                prev.push_str(text);
                let joined = prev.trim().to_string();
                *prev = joined;
            } else {
                parent.children.push(Node::Text(trimmed.to_string()));
            }
            Ok(())
        }
        None => Err("text outside the root element"),
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Declaration line emitted when [`RenderOptions::declaration`] is set.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" ?>"#;

/// Knobs for [`render_canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Emit [`XML_DECLARATION`] as the first line.
    pub declaration: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            declaration: true,
        }
    }
}

/// Render `root` in canonical form (no trailing newline).
pub fn render_canonical(root: &Element, opts: &RenderOptions) -> String {
    let mut lines: Vec<String> = Vec::new();
    if opts.declaration {
        lines.push(XML_DECLARATION.to_string());
    }
    render_element(root, 0, opts.indent, &mut lines);

    lines
        .iter()
        .flat_map(|l| l.lines())
        .filter(|l| !l.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_element(el: &Element, depth: usize, indent: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(depth * indent);
    let open = open_tag(el);

    match el.children.as_slice() {
        [] => out.push(format!("{pad}<{open}/>")),
        [Node::Text(t)] => out.push(format!("{pad}<{open}>{}</{}>", escape_text(t), el.name)),
        children => {
            out.push(format!("{pad}<{open}>"));
            for child in children {
                match child {
                    Node::Element(e) => render_element(e, depth + 1, indent, out),
                    Node::Text(t) => {
                        let inner = " ".repeat((depth + 1) * indent);
                        out.push(format!("{inner}{}", escape_text(t)));
                    }
                }
            }
            out.push(format!("{pad}</{}>", el.name));
        }
    }
}

fn open_tag(el: &Element) -> String {
    let mut s = el.name.clone();
    for (k, v) in &el.attributes {
        s.push_str(&format!(" {k}=\"{}\"", escape_attr(v)));
    }
    s
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s)
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}
