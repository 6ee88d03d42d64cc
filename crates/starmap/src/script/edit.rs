//! Structural edits on Rosetta script documents.
//!
//! Primitive operations work on slices of nodes and never fail when nothing matches.
//! Deleting a node replaces it with [`Node::Cleared`]; [`compact`] removes these placeholders.
//!
//! Composite operations live on [`EditContext`].
//! They run their primitives on a copy of the document and only write it back when every step succeeds,
//!     so a failed composite leaves the document as it was.

use std::collections::BTreeMap;

use super::error::EditError;
use super::tree::{Attribute, Document, Node};
use tracing::debug;

/// Attribute that names a definition tag, e.g. `<FastRelax name="relax"/>`.
pub const NAME_ATTRIBUTE: &str = "name";
/// Name of the tag that references a mover in a protocol.
pub const MOVER_REFERENCE_TAG: &str = "Add";
/// Attribute of [`MOVER_REFERENCE_TAG`] holding the referenced mover name.
pub const MOVER_ATTRIBUTE: &str = "mover";
pub const STRATEGY_ATTRIBUTE: &str = "strategy";
pub const RESIDUES_ATTRIBUTE: &str = "residues";
/// Strategy value that requests user selected residues.
pub const USER_STRATEGY: &str = "user";

/// Condition on the shape of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePredicate {
    /// The tag has the given [`Node::group_len`].
    GroupLength(usize),
    /// Every tag matches.
    Any,
}

impl ShapePredicate {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            ShapePredicate::GroupLength(n) => node.group_len() == *n,
            ShapePredicate::Any => !node.is_cleared(),
        }
    }
}

/// Table of tags that deletion by tag name must leave in place.
///
/// A tag is protected if its name is in the table and its shape matches the predicate.
/// The default table protects `FastRelax` tags with a group length of 6,
///     which torsion refinement relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedTags(BTreeMap<String, ShapePredicate>);

impl ProtectedTags {
    /// A table that protects nothing.
    pub fn none() -> ProtectedTags {
        ProtectedTags(BTreeMap::new())
    }

    pub fn with(mut self, name: &str, predicate: ShapePredicate) -> ProtectedTags {
        self.0.insert(name.into(), predicate);
        self
    }

    pub fn protects(&self, node: &Node) -> bool {
        match node.name().and_then(|name| self.0.get(name)) {
            None => false,
            Some(predicate) => predicate.matches(node),
        }
    }
}

impl Default for ProtectedTags {
    fn default() -> Self {
        ProtectedTags::none().with("FastRelax", ShapePredicate::GroupLength(6))
    }
}

/// Summary of a composite deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Number of tags deleted.
    pub tags: usize,
    /// Number of `<Add mover=.../>` references deleted.
    pub references: usize,
    /// Names whose references were searched for.
    pub names: Vec<String>,
}

/// State shared by the steps of a composite edit.
///
/// The context holds the protected tag table and two accumulators filled by the find operations.
/// Composite operations reset the accumulators before they start.
#[derive(Debug, Clone, Default)]
pub struct EditContext {
    protected: ProtectedTags,
    found_tags: Vec<Node>,
    found_values: Vec<String>,
}

impl EditContext {
    pub fn new(protected: ProtectedTags) -> EditContext {
        EditContext {
            protected,
            found_tags: vec![],
            found_values: vec![],
        }
    }

    /// Clear both accumulators.
    pub fn reset(&mut self) {
        self.found_tags.clear();
        self.found_values.clear();
    }

    /// Snapshots of the tags collected by [`EditContext::find_tags_by_name`].
    pub fn found_tags(&self) -> &[Node] {
        &self.found_tags
    }

    /// Values collected by [`EditContext::find_values_by_attr`].
    pub fn found_values(&self) -> &[String] {
        &self.found_values
    }

    /// Recursively collect a copy of every tag with the given name.
    pub fn find_tags_by_name(&mut self, nodes: &[Node], name: &str) {
        for node in nodes {
            if node.name() == Some(name) {
                self.found_tags.push(node.clone());
            }
            self.find_tags_by_name(node.children(), name);
        }
    }

    /// Recursively collect the value of every attribute with the given name.
    pub fn find_values_by_attr(&mut self, nodes: &[Node], attribute: &str) {
        for node in nodes {
            if let Some(tag) = node.tag() {
                self.found_values.extend(
                    tag.attributes
                        .iter()
                        .filter(|a| a.name == attribute)
                        .map(|a| a.value.clone()),
                );
            }
            self.find_values_by_attr(node.children(), attribute);
        }
    }

    /// Delete every tag with the given name together with all mover references to those tags.
    ///
    /// The names of the deleted tags (and of any named tags nested inside them)
    ///     are collected first; then the tags are deleted;
    ///     then every `<Add mover="name"/>` for a collected name is deleted.
    /// Protected tags are kept, but references to them are still deleted.
    pub fn delete_tag_and_its_movers(
        &mut self,
        document: &mut Document,
        tag_name: &str,
    ) -> Result<Removal, EditError> {
        self.reset();
        self.find_tags_by_name(&document.0, tag_name);
        let found = self.found_tags.clone();
        self.find_values_by_attr(&found, NAME_ATTRIBUTE);

        let mut nodes = document.0.clone();
        let tags = delete_subtree_by_tag(&mut nodes, tag_name, &self.protected);
        let mut references = 0;
        for name in &self.found_values {
            references += delete_mover_reference(&mut nodes, name)?;
        }
        compact(&mut nodes);
        document.0 = nodes;

        debug!(
            tag = tag_name,
            tags,
            references,
            names = ?self.found_values,
            "deleted tag and its movers"
        );
        Ok(Removal {
            tags,
            references,
            names: self.found_values.clone(),
        })
    }

    /// Delete every tag named by the given value together with all mover references to it.
    pub fn delete_value_and_its_movers(
        &mut self,
        document: &mut Document,
        value: &str,
    ) -> Result<Removal, EditError> {
        self.reset();
        let mut nodes = document.0.clone();
        let tags = delete_subtree_by_attr_value(&mut nodes, value);
        let references = delete_mover_reference(&mut nodes, value)?;
        compact(&mut nodes);
        document.0 = nodes;

        debug!(value, tags, references, "deleted value and its movers");
        Ok(Removal {
            tags,
            references,
            names: vec![value.to_string()],
        })
    }
}

/// Recursively clear every tag with the given name unless it is protected.
///
/// Returns the number of tags cleared.
/// Protected tags are left untouched, including their children.
pub fn delete_subtree_by_tag(nodes: &mut [Node], name: &str, protected: &ProtectedTags) -> usize {
    let mut n = 0;
    for node in nodes.iter_mut() {
        if node.name() == Some(name) {
            if protected.protects(node) {
                debug!(tag = name, len = node.group_len(), "keeping protected tag");
            } else {
                *node = Node::Cleared;
                n += 1;
            }
            continue;
        }
        if let Some(children) = node.children_mut() {
            n += delete_subtree_by_tag(children, name, protected);
        }
    }
    n
}

/// Recursively clear every tag that carries the attribute `name="value"`.
///
/// Returns the number of tags cleared.
pub fn delete_subtree_by_attr_value(nodes: &mut [Node], value: &str) -> usize {
    let mut n = 0;
    for node in nodes.iter_mut() {
        if node
            .tag()
            .is_some_and(|tag| tag.has_attribute(NAME_ATTRIBUTE, value))
        {
            *node = Node::Cleared;
            n += 1;
            continue;
        }
        if let Some(children) = node.children_mut() {
            n += delete_subtree_by_attr_value(children, value);
        }
    }
    n
}

/// Recursively clear every `<Add mover="mover"/>` reference.
///
/// A tag that references the mover but has any other shape is an error;
///     in this case nothing is cleared.
pub fn delete_mover_reference(nodes: &mut [Node], mover: &str) -> Result<usize, EditError> {
    check_mover_references(nodes, mover)?;
    Ok(clear_mover_references(nodes, mover))
}

fn is_reference_to(node: &Node, mover: &str) -> bool {
    node.tag().is_some_and(|tag| {
        tag.name == MOVER_REFERENCE_TAG && tag.has_attribute(MOVER_ATTRIBUTE, mover)
    })
}

fn check_mover_references(nodes: &[Node], mover: &str) -> Result<(), EditError> {
    for node in nodes {
        if is_reference_to(node, mover) {
            let well_formed = matches!(node, Node::SelfClosing(tag) if tag.attributes.len() == 1);
            if !well_formed {
                return Err(EditError::MalformedMoverReference {
                    mover: mover.into(),
                });
            }
        }
        check_mover_references(node.children(), mover)?;
    }
    Ok(())
}

fn clear_mover_references(nodes: &mut [Node], mover: &str) -> usize {
    let mut n = 0;
    for node in nodes.iter_mut() {
        if is_reference_to(node, mover) {
            *node = Node::Cleared;
            n += 1;
            continue;
        }
        if let Some(children) = node.children_mut() {
            n += clear_mover_references(children, mover);
        }
    }
    n
}

/// Recursively remove every [`Node::Cleared`] placeholder.
pub fn compact(nodes: &mut Vec<Node>) {
    nodes.retain(|node| !node.is_cleared());
    for node in nodes.iter_mut() {
        if let Some(children) = node.children_mut() {
            compact(children);
        }
    }
}

/// Set the residue selection on every tag with the given name.
///
/// An existing `residues` attribute is overwritten.
/// Otherwise, if the tag has `strategy="user"`, a `residues` attribute is appended.
/// Returns the number of tags changed.
pub fn substitute_attr_value(
    nodes: &mut [Node],
    tag_name: &str,
    residues: &str,
) -> Result<usize, EditError> {
    check_unique_residues(nodes, tag_name)?;
    Ok(set_residues(nodes, tag_name, residues))
}

fn check_unique_residues(nodes: &[Node], tag_name: &str) -> Result<(), EditError> {
    for node in nodes {
        if let Some(tag) = node.tag() {
            let count = tag
                .attributes
                .iter()
                .filter(|a| a.name == RESIDUES_ATTRIBUTE)
                .count();
            if tag.name == tag_name && count > 1 {
                return Err(EditError::AmbiguousAttribute {
                    tag: tag_name.into(),
                    attribute: RESIDUES_ATTRIBUTE.into(),
                });
            }
        }
        check_unique_residues(node.children(), tag_name)?;
    }
    Ok(())
}

fn set_residues(nodes: &mut [Node], tag_name: &str, residues: &str) -> usize {
    let mut n = 0;
    for node in nodes.iter_mut() {
        if let Some(tag) = node.tag_mut() {
            if tag.name == tag_name {
                let user_strategy = tag.has_attribute(STRATEGY_ATTRIBUTE, USER_STRATEGY);
                match tag
                    .attributes
                    .iter_mut()
                    .find(|a| a.name == RESIDUES_ATTRIBUTE)
                {
                    Some(existing) => {
                        existing.value = residues.into();
                        n += 1;
                    }
                    None if user_strategy => {
                        tag.attributes
                            .push(Attribute::new(RESIDUES_ATTRIBUTE, residues));
                        n += 1;
                    }
                    None => {}
                }
            }
        }
        if let Some(children) = node.children_mut() {
            n += set_residues(children, tag_name, residues);
        }
    }
    n
}

/// Rename attribute values in document order, changing at most `limit` of them.
///
/// Returns the number of values renamed.
pub fn rename_attr_values(
    nodes: &mut [Node],
    attribute: &str,
    from: &str,
    to: &str,
    limit: usize,
) -> usize {
    let mut remaining = limit;
    rename_recursive(nodes, attribute, from, to, &mut remaining);
    limit - remaining
}

fn rename_recursive(
    nodes: &mut [Node],
    attribute: &str,
    from: &str,
    to: &str,
    remaining: &mut usize,
) {
    for node in nodes.iter_mut() {
        if *remaining == 0 {
            return;
        }
        if let Some(tag) = node.tag_mut() {
            for a in tag.attributes.iter_mut() {
                if *remaining > 0 && a.name == attribute && a.value == from {
                    a.value = to.into();
                    *remaining -= 1;
                }
            }
        }
        if let Some(children) = node.children_mut() {
            rename_recursive(children, attribute, from, to, remaining);
        }
    }
}
