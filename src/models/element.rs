//! Element tree consumed by the layout engine.
//!
//! The serialized shape follows the layout engine's calling convention:
//! `{"type": "div", "props": {"style": {..}, "children": [..]}}`.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Deepest element nesting accepted anywhere in the pipeline. The root
/// element is level one.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Ordered map of camelCase CSS property to value.
pub type StyleMap = Map<String, Value>;

/// One markup element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub tag_name: String,
    #[serde(default)]
    pub props: Props,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Props {
    /// Never present as an empty map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub width: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "string_or_number"
    )]
    pub height: Option<String>,

    #[serde(default, deserialize_with = "deserialize_children")]
    pub children: Vec<Child>,

    /// Props the layout engine ignores but callers may pass through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    Text(String),
    Element(ElementNode),
}

impl ElementNode {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            props: Props::default(),
        }
    }

    pub fn children(&self) -> &[Child] {
        &self.props.children
    }

    pub fn style(&self) -> Option<&StyleMap> {
        self.props.style.as_ref()
    }

    /// Element children in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &ElementNode> {
        self.children().iter().filter_map(|child| match child {
            Child::Element(el) => Some(el),
            Child::Text(_) => None,
        })
    }

    /// Number of element nodes in this subtree, including `self`.
    pub fn element_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.child_elements());
        }
        count
    }

    /// Nesting levels of this subtree; a node without element children has
    /// depth one.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.child_elements().map(|child| (child, level + 1)));
        }
        deepest
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Children may arrive as a single string, a single element, or a (nested)
/// array of both. Booleans and nulls are dropped.
fn deserialize_children<'de, D>(deserializer: D) -> Result<Vec<Child>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let mut children = Vec::new();
    collect_children(value, &mut children).map_err(de::Error::custom)?;
    Ok(children)
}

fn collect_children(value: Value, out: &mut Vec<Child>) -> Result<(), serde_json::Error> {
    match value {
        Value::Null | Value::Bool(_) => {}
        Value::String(s) => out.push(Child::Text(s)),
        Value::Number(n) => out.push(Child::Text(n.to_string())),
        Value::Array(items) => {
            for item in items {
                collect_children(item, out)?;
            }
        }
        object @ Value::Object(_) => out.push(Child::Element(serde_json::from_value(object)?)),
    }
    Ok(())
}
