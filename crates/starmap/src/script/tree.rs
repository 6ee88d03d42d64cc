//! Tree representation of Rosetta scripts.
//!
//! Rough form of the production rules, where `*` means 0 or more, `+` means at least 1:
//!
//! - `<document> -> <tag>+`
//! - `<tag> -> <self-closing tag> | <paired tag>`
//! - `<self-closing tag> -> '<' <name> <attribute>* '/' '>'`
//! - `<paired tag> -> '<' <name> <attribute>* '>' <tag>* '<' '/' <name> '>'`
//! - `<attribute> -> <name> '=' <value>`
//! - `<name>` -> ASCII letters, digits and underscores.
//! - `<value>` -> ASCII letters, digits, underscores, periods and percent signs,
//!     or a double quoted string without newlines.
//!
//! Whitespace between tokens is insignificant.

use super::error::ParseError;

/// A `name="value"` pair on a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: &str) -> Attribute {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Name and attributes of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    pub name: String,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
}

impl Tag {
    pub fn new(name: &str) -> Tag {
        Tag {
            name: name.into(),
            attributes: vec![],
        }
    }

    /// Builder-style helper that appends an attribute.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Tag {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Returns the value of the first attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    /// Returns true if the tag has an attribute with the given name and value.
    pub fn has_attribute(&self, name: &str, value: &str) -> bool {
        self.attributes
            .iter()
            .any(|attribute| attribute.name == name && attribute.value == value)
    }
}

/// Node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    /// A tag of the form `<Name a="1"/>`.
    SelfClosing(Tag),
    /// A tag of the form `<Name a="1"> ... </Name>`.
    ///
    /// A paired tag with no children is still output with a separate closing tag.
    Paired { tag: Tag, children: Vec<Node> },
    /// A deleted node.
    ///
    /// Deletions leave this placeholder behind so that sibling positions are stable
    ///     while an edit is in progress.
    /// Compaction removes it.
    Cleared,
}

impl Node {
    /// Returns the tag, or [`None`] for cleared nodes.
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Node::SelfClosing(tag) | Node::Paired { tag, .. } => Some(tag),
            Node::Cleared => None,
        }
    }

    pub fn tag_mut(&mut self) -> Option<&mut Tag> {
        match self {
            Node::SelfClosing(tag) | Node::Paired { tag, .. } => Some(tag),
            Node::Cleared => None,
        }
    }

    /// Returns the name of the tag, or [`None`] for cleared nodes.
    pub fn name(&self) -> Option<&str> {
        self.tag().map(|tag| tag.name.as_str())
    }

    /// Returns the child nodes. Self-closing and cleared nodes have no children.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Paired { children, .. } => children,
            Node::SelfClosing(_) | Node::Cleared => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Paired { children, .. } => Some(children),
            Node::SelfClosing(_) | Node::Cleared => None,
        }
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, Node::Cleared)
    }

    /// Size of the node when viewed as a flat group of its parts.
    ///
    /// This counts one for the tag name, one per attribute, one per child
    ///     (including cleared children) and, for paired tags, one more for the closing name.
    /// Cleared nodes have size 0.
    pub fn group_len(&self) -> usize {
        match self {
            Node::SelfClosing(tag) => 1 + tag.attributes.len(),
            Node::Paired { tag, children } => 2 + tag.attributes.len() + children.len(),
            Node::Cleared => 0,
        }
    }
}

/// A parsed Rosetta script.
///
/// A document may contain more than one top-level tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document(pub Vec<Node>);

impl Document {
    /// Parse a document from source code.
    pub fn from_source_code(source: &str) -> Result<Document, ParseError> {
        super::parser::parse(source)
    }

    /// Returns all tags in the document in depth-first order.
    pub fn tags(&self) -> Vec<&Tag> {
        fn walk<'a>(nodes: &'a [Node], tags: &mut Vec<&'a Tag>) {
            for node in nodes {
                if let Some(tag) = node.tag() {
                    tags.push(tag);
                }
                walk(node.children(), tags);
            }
        }
        let mut tags = vec![];
        walk(&self.0, &mut tags);
        tags
    }

    /// Returns the tags with the given name in depth-first order.
    pub fn tags_named<'a>(&'a self, name: &str) -> Vec<&'a Tag> {
        self.tags()
            .into_iter()
            .filter(|tag| tag.name == name)
            .collect()
    }

    /// Returns true if any node in the document is [`Node::Cleared`].
    pub fn has_cleared_nodes(&self) -> bool {
        fn any_cleared(nodes: &[Node]) -> bool {
            nodes
                .iter()
                .any(|node| node.is_cleared() || any_cleared(node.children()))
        }
        any_cleared(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_len_counts_flat_parts() {
        let self_closing = Node::SelfClosing(Tag::new("Add").with_attribute("mover", "relax"));
        assert_eq!(self_closing.group_len(), 2);

        let paired = Node::Paired {
            tag: Tag::new("FastRelax")
                .with_attribute("name", "relax")
                .with_attribute("repeats", "5"),
            children: vec![Node::SelfClosing(Tag::new("MoveMap")), Node::Cleared],
        };
        assert_eq!(paired.group_len(), 6);
        assert_eq!(Node::Cleared.group_len(), 0);
    }

    #[test]
    fn attribute_lookup() {
        let tag = Tag::new("CartesianSampler")
            .with_attribute("name", "cen5_50")
            .with_attribute("strategy", "auto");
        assert_eq!(tag.attribute("strategy"), Some("auto"));
        assert_eq!(tag.attribute("residues"), None);
        assert!(tag.has_attribute("name", "cen5_50"));
        assert!(!tag.has_attribute("name", "cen5_60"));
    }

    #[test]
    fn tags_in_depth_first_order() {
        let document = Document(vec![
            Node::Paired {
                tag: Tag::new("MOVERS"),
                children: vec![
                    Node::SelfClosing(Tag::new("A")),
                    Node::Cleared,
                    Node::SelfClosing(Tag::new("B")),
                ],
            },
            Node::SelfClosing(Tag::new("A")),
        ]);
        let names: Vec<&str> = document.tags().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["MOVERS", "A", "B", "A"]);
        assert_eq!(document.tags_named("A").len(), 2);
        assert!(document.has_cleared_nodes());
    }
}
