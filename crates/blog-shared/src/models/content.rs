//! Structured post bodies.
//!
//! A post body is an ordered list of blocks. Text blocks hold a tree of rich
//! text nodes (or a plain markdown string); media blocks hold opaque
//! attributes. Parsing is lenient: any JSON value deserializes into these
//! types, and shapes that don't fit collapse to "no content" instead of
//! failing the request.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const TEXT_BLOCK: &str = "blog.text-block";
pub const SINGLE_IMAGE_BLOCK: &str = "blog.single-image";
pub const MULTIPLE_IMAGES_BLOCK: &str = "blog.multiple-images";
pub const YOUTUBE_EMBED_BLOCK: &str = "blog.you-tube-embed";

/// A node in a rich text tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    /// Inline text run. `marks` holds the node type and formatting flags such as `bold`.
    Text {
        text: String,
        marks: Map<String, Value>,
    },
    /// Structural node (paragraph, heading, list, link, ...).
    Element {
        kind: Option<String>,
        text: Option<String>,
        children: Vec<ContentNode>,
        attrs: Map<String, Value>,
    },
}

impl ContentNode {
    pub fn text(text: impl Into<String>) -> Self {
        ContentNode::Text {
            text: text.into(),
            marks: Map::new(),
        }
    }

    pub fn element(kind: impl Into<String>, children: Vec<ContentNode>) -> Self {
        ContentNode::Element {
            kind: Some(kind.into()),
            text: None,
            children,
            attrs: Map::new(),
        }
    }

    /// Own text of this node, not including children.
    pub fn own_text(&self) -> Option<&str> {
        match self {
            ContentNode::Text { text, .. } => Some(text),
            ContentNode::Element { text, .. } => text.as_deref(),
        }
    }

    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Text { .. } => &[],
            ContentNode::Element { children, .. } => children,
        }
    }

    /// Returns `None` for anything that isn't a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = obj.get("text").and_then(Value::as_str).map(str::to_owned);

        match obj.get("children").and_then(Value::as_array) {
            Some(children) => {
                let attrs = without_keys(obj, &["type", "text", "children"]);
                Some(ContentNode::Element {
                    kind: obj.get("type").and_then(Value::as_str).map(str::to_owned),
                    text,
                    children: nodes_from_array(children),
                    attrs,
                })
            }
            None => match text {
                Some(text) => Some(ContentNode::Text {
                    text,
                    marks: without_keys(obj, &["text"]),
                }),
                None => Some(ContentNode::Element {
                    kind: obj.get("type").and_then(Value::as_str).map(str::to_owned),
                    text: None,
                    children: Vec::new(),
                    attrs: without_keys(obj, &["type", "children"]),
                }),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ContentNode::Text { text, marks } => {
                let mut obj = marks.clone();
                obj.entry("type").or_insert_with(|| Value::from("text"));
                obj.insert("text".into(), Value::from(text.as_str()));
                Value::Object(obj)
            }
            ContentNode::Element {
                kind,
                text,
                children,
                attrs,
            } => {
                let mut obj = attrs.clone();
                if let Some(kind) = kind {
                    obj.insert("type".into(), Value::from(kind.as_str()));
                }
                if let Some(text) = text {
                    obj.insert("text".into(), Value::from(text.as_str()));
                }
                obj.insert(
                    "children".into(),
                    Value::Array(children.iter().map(ContentNode::to_value).collect()),
                );
                Value::Object(obj)
            }
        }
    }
}

fn nodes_from_array(values: &[Value]) -> Vec<ContentNode> {
    values.iter().filter_map(ContentNode::from_value).collect()
}

fn without_keys(obj: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Text payload of a block.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BlockContent {
    /// Rich text tree.
    Nodes(Vec<ContentNode>),
    /// Markdown or plain string.
    Text(String),
    /// Media blocks, or a `content` of an unexpected type.
    #[default]
    None,
}

impl BlockContent {
    pub fn is_empty(&self) -> bool {
        match self {
            BlockContent::Nodes(nodes) => nodes.is_empty(),
            BlockContent::Text(text) => text.is_empty(),
            BlockContent::None => true,
        }
    }
}

/// One section of a post body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentBlock {
    /// Component discriminator, e.g. `blog.text-block`.
    pub component: Option<String>,
    pub id: Option<i64>,
    pub content: BlockContent,
    /// Remaining component fields (image, url, caption, ...), kept verbatim.
    pub attributes: Map<String, Value>,
}

impl ContentBlock {
    pub fn rich_text(nodes: Vec<ContentNode>) -> Self {
        Self {
            component: Some(TEXT_BLOCK.to_string()),
            content: BlockContent::Nodes(nodes),
            ..Default::default()
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            component: Some(TEXT_BLOCK.to_string()),
            content: BlockContent::Text(text.into()),
            ..Default::default()
        }
    }

    /// A block referenced only by component and id, as relation-only payloads carry them.
    pub fn reference(component: impl Into<String>, id: i64) -> Self {
        Self {
            component: Some(component.into()),
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Non-object values become an empty block.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let content = match obj.get("content") {
            Some(Value::Array(nodes)) => BlockContent::Nodes(nodes_from_array(nodes)),
            Some(Value::String(text)) => BlockContent::Text(text.clone()),
            _ => BlockContent::None,
        };

        Self {
            component: obj
                .get("__component")
                .and_then(Value::as_str)
                .map(str::to_owned),
            id: obj.get("id").and_then(Value::as_i64),
            content,
            attributes: without_keys(obj, &["__component", "id", "content"]),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = self.attributes.clone();
        if let Some(component) = &self.component {
            obj.insert("__component".into(), Value::from(component.as_str()));
        }
        if let Some(id) = self.id {
            obj.insert("id".into(), Value::from(id));
        }
        match &self.content {
            BlockContent::Nodes(nodes) => {
                obj.insert(
                    "content".into(),
                    Value::Array(nodes.iter().map(ContentNode::to_value).collect()),
                );
            }
            BlockContent::Text(text) => {
                obj.insert("content".into(), Value::from(text.as_str()));
            }
            BlockContent::None => {}
        }
        Value::Object(obj)
    }
}

/// Full body of a post: blocks in reading order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body(pub Vec<ContentBlock>);

impl Body {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self(blocks)
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when at least one block carries inline text, as opposed to a
    /// payload that only references existing components by id.
    pub fn has_inline_content(&self) -> bool {
        self.0.iter().any(ContentBlock::has_content)
    }

    /// Fill blocks that only reference a stored component (`__component` and
    /// `id` without `content`) from `stored`. Attributes sent in the reference
    /// take precedence over stored ones; unmatched blocks are kept as sent.
    pub fn resolve_references(self, stored: &Body) -> Body {
        let blocks = self
            .0
            .into_iter()
            .map(|block| {
                if block.content != BlockContent::None || block.id.is_none() {
                    return block;
                }
                let Some(existing) = stored
                    .0
                    .iter()
                    .find(|s| s.id == block.id && s.component == block.component)
                else {
                    return block;
                };

                let mut attributes = existing.attributes.clone();
                attributes.extend(block.attributes);
                ContentBlock {
                    component: block.component,
                    id: block.id,
                    content: existing.content.clone(),
                    attributes,
                }
            })
            .collect();
        Body(blocks)
    }

    /// Anything other than an array yields an empty body.
    pub fn from_value(value: &Value) -> Self {
        match value.as_array() {
            Some(blocks) => Self(blocks.iter().map(ContentBlock::from_value).collect()),
            None => Self::default(),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(ContentBlock::to_value).collect())
    }
}

impl From<Vec<ContentBlock>> for Body {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self(blocks)
    }
}

impl Serialize for ContentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ContentNode::from_value(&value).unwrap_or(ContentNode::Element {
            kind: None,
            text: None,
            children: Vec::new(),
            attrs: Map::new(),
        }))
    }
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ContentBlock::from_value(&value))
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Body::from_value(&value))
    }
}
