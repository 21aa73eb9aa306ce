//! Stack-based element tree construction from open/text/close events.

use thiserror::Error;

use super::style::parse_style;
use crate::models::{Child, ElementNode, MAX_NESTING_DEPTH};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("content found after the root element was closed")]
    ContentAfterRoot,

    #[error("close of <{0}> without a matching open")]
    UnbalancedClose(String),

    #[error("markup produced no root element")]
    Empty,

    #[error("elements nest deeper than {0} levels")]
    TooDeep(usize),

    #[error("markup stream failed: {0}")]
    Stream(String),
}

/// One signal from a forward-only markup stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Open {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Close(String),
}

/// Builds an [`ElementNode`] tree from markup events in document order.
///
/// Nodes still open when [`TreeBuilder::finish`] is called are closed
/// implicitly, so sources that never signal some closes are tolerated.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: Vec<ElementNode>,
    root: Option<ElementNode>,
    last_was_text: bool,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: MarkupEvent) -> Result<(), TreeError> {
        match event {
            MarkupEvent::Open { tag, attributes } => self.open(&tag, &attributes),
            MarkupEvent::Text(content) => self.text(&content),
            MarkupEvent::Close(tag) => self.close(&tag),
        }
    }

    pub fn open(&mut self, tag: &str, attributes: &[(String, String)]) -> Result<(), TreeError> {
        if self.root.is_some() {
            return Err(TreeError::ContentAfterRoot);
        }
        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(TreeError::TooDeep(MAX_NESTING_DEPTH));
        }
        self.last_was_text = false;
        self.stack.push(element_from_attributes(tag, attributes));
        Ok(())
    }

    /// Empty text is ignored; adjacent text chunks are merged.
    pub fn text(&mut self, content: &str) -> Result<(), TreeError> {
        if content.is_empty() {
            return Ok(());
        }
        let Some(node) = self.stack.last_mut() else {
            return Err(TreeError::ContentAfterRoot);
        };

        match node.props.children.last_mut() {
            Some(Child::Text(previous)) if self.last_was_text => previous.push_str(content),
            _ => node.props.children.push(Child::Text(content.to_string())),
        }
        self.last_was_text = true;
        Ok(())
    }

    /// Closes the innermost open element named `tag`, implicitly closing
    /// anything opened inside it. A close matching no open element is ignored.
    pub fn close(&mut self, tag: &str) -> Result<(), TreeError> {
        if self.stack.is_empty() {
            return Err(TreeError::UnbalancedClose(tag.to_string()));
        }
        let Some(depth) = self
            .stack
            .iter()
            .rposition(|node| node.tag_name.eq_ignore_ascii_case(tag))
        else {
            tracing::debug!(tag = %tag, "Ignoring close without matching open element");
            return Ok(());
        };

        self.last_was_text = false;
        while self.stack.len() > depth {
            if let Some(node) = self.stack.pop() {
                self.attach(node);
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<ElementNode, TreeError> {
        while let Some(node) = self.stack.pop() {
            tracing::debug!(tag = %node.tag_name, "Closing unterminated element");
            self.attach(node);
        }
        self.root.ok_or(TreeError::Empty)
    }

    fn attach(&mut self, node: ElementNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.props.children.push(Child::Element(node)),
            None => self.root = Some(node),
        }
    }
}

fn element_from_attributes(tag: &str, attributes: &[(String, String)]) -> ElementNode {
    let mut node = ElementNode::new(tag);
    let attribute = |name: &str| find_attribute(attributes, name);

    if let Some(raw) = attribute("style") {
        let style = parse_style(raw);
        if !style.is_empty() {
            node.props.style = Some(style);
        }
    }

    if let Some(src) = attribute("src") {
        node.props.src = Some(src.to_string());
        match (attribute("width"), attribute("height")) {
            (Some(width), Some(height)) => {
                node.props.width = Some(width.to_string());
                node.props.height = Some(height.to_string());
            }
            _ => {
                tracing::warn!(
                    tag = %tag,
                    src = %src,
                    "Image missing width or height attribute required for layout"
                );
            }
        }
    }

    node
}

fn find_attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
        .filter(|value| !value.is_empty())
}
