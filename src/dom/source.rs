//! Source snapshots and the markup parser.
//!
//! A [`SourceNode`] is an owned, detached copy of a subtree: the form in which
//! templates remember their original content and components carry their
//! markup. [`parse_markup`] turns HTML-like text into source nodes; the
//! [`Document`](super::Document) instantiates them into live nodes.

use indexmap::IndexMap;

/// Elements that never have children or a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// Whether `tag` is a void element.
pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Errors from markup parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkupError {
    #[error("unexpected end of input inside {0}")]
    UnexpectedEof(&'static str),
    #[error("mismatched closing tag at byte {position}: expected </{expected}>, found </{found}>")]
    MismatchedClose {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("closing tag </{tag}> at byte {position} has no open element")]
    StrayClose { position: usize, tag: String },
}

// ---------------------------------------------------------------------------
// SourceNode
// ---------------------------------------------------------------------------

/// An owned snapshot of a document subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceNode {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        children: Vec<SourceNode>,
    },
    Text(String),
    Comment(String),
}

impl SourceNode {
    pub fn element(tag: impl Into<String>) -> Self {
        SourceNode::Element {
            tag: tag.into().to_ascii_lowercase(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        SourceNode::Text(text.into())
    }

    /// Add an attribute (builder). No-op on non-elements.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let SourceNode::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Append a child (builder). No-op on non-elements.
    pub fn with_child(mut self, child: SourceNode) -> Self {
        if let SourceNode::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    pub fn is_element(&self) -> bool {
        matches!(self, SourceNode::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SourceNode::Text(_))
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            SourceNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            SourceNode::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attributes in source order (empty for non-elements).
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        let attrs = match self {
            SourceNode::Element { attributes, .. } => Some(attributes),
            _ => None,
        };
        attrs
            .into_iter()
            .flat_map(|a| a.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn children(&self) -> &[SourceNode] {
        match self {
            SourceNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Text content of a text or comment node.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            SourceNode::Text(t) | SourceNode::Comment(t) => Some(t),
            SourceNode::Element { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// An element still waiting for its closing tag.
struct OpenElement {
    tag: String,
    attributes: IndexMap<String, String>,
    children: Vec<SourceNode>,
}

impl OpenElement {
    fn close(self) -> SourceNode {
        SourceNode::Element {
            tag: self.tag,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

struct MarkupParser<'a> {
    input: &'a str,
    pos: usize,
    roots: Vec<SourceNode>,
    open: Vec<OpenElement>,
}

/// Parse an HTML-like fragment into source nodes.
///
/// Unclosed elements at end of input are closed implicitly. Whitespace text is
/// preserved.
pub fn parse_markup(input: &str) -> Result<Vec<SourceNode>, MarkupError> {
    let mut parser = MarkupParser {
        input,
        pos: 0,
        roots: Vec::new(),
        open: Vec::new(),
    };
    parser.run()?;
    Ok(parser.roots)
}

impl<'a> MarkupParser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn push_node(&mut self, node: SourceNode) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn run(&mut self) -> Result<(), MarkupError> {
        while self.pos < self.input.len() {
            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.parse_comment()?;
            } else if rest.starts_with("</") {
                self.parse_close()?;
            } else if starts_tag(rest) {
                self.parse_open()?;
            } else {
                self.parse_text();
            }
        }
        while let Some(element) = self.open.pop() {
            self.push_node(element.close());
        }
        Ok(())
    }

    fn parse_comment(&mut self) -> Result<(), MarkupError> {
        let body_start = self.pos + 4;
        let end = self.input[body_start..]
            .find("-->")
            .ok_or(MarkupError::UnexpectedEof("comment"))?;
        let text = self.input[body_start..body_start + end].to_owned();
        self.pos = body_start + end + 3;
        self.push_node(SourceNode::Comment(text));
        Ok(())
    }

    fn parse_close(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        let end = self
            .rest()
            .find('>')
            .ok_or(MarkupError::UnexpectedEof("closing tag"))?;
        let tag = self.input[start + 2..start + end].trim().to_ascii_lowercase();
        self.pos = start + end + 1;
        match self.open.pop() {
            Some(element) if element.tag == tag => {
                self.push_node(element.close());
                Ok(())
            }
            Some(element) => Err(MarkupError::MismatchedClose {
                position: start,
                expected: element.tag,
                found: tag,
            }),
            None => Err(MarkupError::StrayClose {
                position: start,
                tag,
            }),
        }
    }

    fn parse_text(&mut self) {
        let rest = self.rest();
        // Skip the first char so a lone '<' that does not start a tag is consumed as text.
        let skip = rest.chars().next().map_or(0, char::len_utf8);
        let mut end = rest.len();
        let mut search = skip;
        while let Some(offset) = rest[search..].find('<') {
            let at = search + offset;
            let candidate = &rest[at..];
            if candidate.starts_with("<!--") || candidate.starts_with("</") || starts_tag(candidate)
            {
                end = at;
                break;
            }
            search = at + 1;
        }
        let text = decode_entities(&rest[..end]);
        self.pos += end;
        self.push_node(SourceNode::Text(text));
    }

    fn parse_open(&mut self) -> Result<(), MarkupError> {
        self.pos += 1;
        let tag = self.take_while(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':');
        let tag = tag.to_ascii_lowercase();
        let mut attributes = IndexMap::new();
        let self_closed = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(MarkupError::UnexpectedEof("tag"));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            let name = self.take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/');
            if name.is_empty() {
                // A stray '/' inside the tag.
                self.pos += 1;
                continue;
            }
            let name = name.to_ascii_lowercase();
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.parse_attr_value()?
            } else {
                String::new()
            };
            attributes.insert(name, value);
        };

        if self_closed || is_void(&tag) {
            self.push_node(SourceNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
            return Ok(());
        }

        if RAW_TEXT_TAGS.contains(&tag.as_str()) {
            let close = format!("</{tag}");
            let end = self
                .rest()
                .to_ascii_lowercase()
                .find(&close)
                .ok_or(MarkupError::UnexpectedEof("raw text element"))?;
            let raw = self.rest()[..end].to_owned();
            self.pos += end;
            let mut element = OpenElement {
                tag,
                attributes,
                children: Vec::new(),
            };
            if !raw.is_empty() {
                element.children.push(SourceNode::Text(raw));
            }
            self.open.push(element);
            return Ok(());
        }

        self.open.push(OpenElement {
            tag,
            attributes,
            children: Vec::new(),
        });
        Ok(())
    }

    fn parse_attr_value(&mut self) -> Result<String, MarkupError> {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let end = rest[1..]
                    .find(quote)
                    .ok_or(MarkupError::UnexpectedEof("attribute value"))?;
                let value = decode_entities(&rest[1..1 + end]);
                self.pos += end + 2;
                Ok(value)
            }
            _ => {
                let raw = self.take_while(|c| !c.is_whitespace() && c != '>');
                Ok(decode_entities(raw))
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map_or(rest.len(), |(ix, _)| ix);
        self.pos += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }
}

fn starts_tag(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}
