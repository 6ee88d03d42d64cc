//! Serialization of documents back to Rosetta script markup.
//!
//! Each tag is written on its own line, indented by one tab per level of nesting.
//! Attribute values are always double quoted.

use super::tree::{Document, Node, Tag};

impl Document {
    /// Display the document as Rosetta script markup.
    pub fn display(&self) -> impl std::fmt::Display + '_ {
        DisplaySlice {
            nodes: &self.0,
            depth: 0,
        }
    }
}

impl Node {
    /// Display the node, indented as if it appeared at the given depth.
    pub fn display(&self, depth: usize) -> impl std::fmt::Display + '_ {
        DisplayNode { node: self, depth }
    }
}

/// Helper type for displaying slices of nodes.
struct DisplaySlice<'a> {
    nodes: &'a [Node],
    depth: usize,
}

impl<'a> std::fmt::Display for DisplaySlice<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for node in self.nodes {
            write!(f, "{}", node.display(self.depth))?;
        }
        Ok(())
    }
}

/// Helper type for displaying nodes.
struct DisplayNode<'a> {
    node: &'a Node,
    depth: usize,
}

impl<'a> std::fmt::Display for DisplayNode<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let indent = "\t".repeat(self.depth);
        match self.node {
            Node::Cleared => {}
            Node::SelfClosing(tag) => {
                write!(f, "{indent}")?;
                write_opening(f, tag)?;
                writeln!(f, "/>")?;
            }
            Node::Paired { tag, children } => {
                write!(f, "{indent}")?;
                write_opening(f, tag)?;
                writeln!(f, ">")?;
                write!(
                    f,
                    "{}",
                    DisplaySlice {
                        nodes: children,
                        depth: self.depth + 1,
                    }
                )?;
                writeln!(f, "{indent}</{}>", tag.name)?;
            }
        }
        Ok(())
    }
}

fn write_opening(f: &mut std::fmt::Formatter<'_>, tag: &Tag) -> std::fmt::Result {
    write!(f, "<{}", tag.name)?;
    for attribute in &tag.attributes {
        write!(f, " {}=\"{}\"", attribute.name, attribute.value)?;
    }
    Ok(())
}
