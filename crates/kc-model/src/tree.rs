//! Group hierarchy and path resolution.
//!
//! A [`GroupTree`] owns its nodes top-down: every [`GroupNode`] owns its
//! children in creation order. The upward edge is a plain id index, so
//! there is no reference cycle between parents and children.
//!
//! ## Path resolution
//!
//! Because group names may contain the separator, a path such as
//! `defaultGroup1/Team Child 2018/2019` is resolved against the existing
//! structure instead of being split. At each level the children whose name
//! is a separator-bounded prefix of the unconsumed input are candidates;
//! the longest name is tried first and creation order breaks ties. If a
//! candidate leads to a dead end the next one is tried.

use std::cmp::Reverse;
use std::collections::HashMap;

use uuid::Uuid;

use crate::group::{Group, GroupPath, PATH_SEPARATOR};

/// A group together with its owned children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    /// The group at this node.
    pub group: Group,
    /// Child nodes in creation order.
    pub children: Vec<GroupNode>,
}

impl GroupNode {
    /// Returns the group id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.group.id
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.group.name
    }

    /// Finds a direct child by exact name.
    #[must_use]
    pub fn child_by_name(&self, name: &str) -> Option<&GroupNode> {
        self.children.iter().find(|c| c.group.name == name)
    }

    fn collect_ids(&self, out: &mut Vec<Uuid>) {
        out.push(self.group.id);
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    parent_id: Option<Uuid>,
    name: String,
}

/// A snapshot of a realm's group hierarchy.
///
/// The root is virtual: top-level groups are the tree's `roots`.
#[derive(Debug, Clone, Default)]
pub struct GroupTree {
    roots: Vec<GroupNode>,
    index: HashMap<Uuid, IndexEntry>,
}

impl GroupTree {
    /// Builds a tree from a flat list of groups.
    ///
    /// Siblings are ordered by creation time. Groups whose parent is not in
    /// the list are unreachable from the root and are left out.
    #[must_use]
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        let mut by_parent: HashMap<Option<Uuid>, Vec<Group>> = HashMap::new();
        for group in groups {
            by_parent.entry(group.parent_id).or_default().push(group);
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        }

        let mut index = HashMap::new();
        let roots = build_level(None, &mut by_parent, &mut index);
        Self { roots, index }
    }

    /// Returns the top-level nodes.
    #[must_use]
    pub fn roots(&self) -> &[GroupNode] {
        &self.roots
    }

    /// Returns the number of groups reachable from the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the tree has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Checks whether a group is part of the tree.
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    /// Returns the parent id of a group (`None` for top-level or unknown groups).
    #[must_use]
    pub fn parent_of(&self, id: Uuid) -> Option<Uuid> {
        self.index.get(&id).and_then(|e| e.parent_id)
    }

    /// Finds a node by group id.
    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<&GroupNode> {
        if !self.index.contains_key(&id) {
            return None;
        }
        let path = self.id_chain(id);
        let mut nodes = &self.roots;
        let mut found = None;
        for step in path {
            let node = nodes.iter().find(|n| n.group.id == step)?;
            nodes = &node.children;
            found = Some(node);
        }
        found
    }

    /// Finds the node at an explicit segment path (exact name match per level).
    #[must_use]
    pub fn find_by_segments(&self, path: &GroupPath) -> Option<&GroupNode> {
        let mut nodes = &self.roots;
        let mut found = None;
        for segment in &path.segments {
            let node = nodes.iter().find(|n| &n.group.name == segment)?;
            nodes = &node.children;
            found = Some(node);
        }
        found
    }

    /// Resolves a path string to exactly one node.
    ///
    /// A leading separator is optional. Returns `None` when no arrangement
    /// of existing names consumes the whole string.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&GroupNode> {
        let rest = path.strip_prefix(PATH_SEPARATOR).unwrap_or(path);
        if rest.is_empty() {
            return None;
        }
        resolve_in(&self.roots, rest)
    }

    /// Returns the segment path of a group, root first.
    #[must_use]
    pub fn path_of(&self, id: Uuid) -> Option<GroupPath> {
        if !self.index.contains_key(&id) {
            return None;
        }
        let segments = self
            .id_chain(id)
            .into_iter()
            .filter_map(|step| self.index.get(&step).map(|e| e.name.clone()))
            .collect::<Vec<_>>();
        Some(GroupPath { segments })
    }

    /// Formats the path string of a group (e.g. `/Team 2016/2017`).
    #[must_use]
    pub fn format(&self, id: Uuid) -> Option<String> {
        self.path_of(id).map(|p| p.to_path_string())
    }

    /// Returns the id of a group and all its descendants, parents first.
    #[must_use]
    pub fn subtree_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        if let Some(node) = self.find(id) {
            node.collect_ids(&mut out);
        }
        out
    }

    /// Iterates over all nodes in depth-first pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &GroupNode> {
        let mut stack: Vec<&GroupNode> = self.roots.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Ids from the top-level ancestor down to `id`.
    fn id_chain(&self, id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(step) = current {
            chain.push(step);
            current = self.index.get(&step).and_then(|e| e.parent_id);
        }
        chain.reverse();
        chain
    }
}

fn build_level(
    parent_id: Option<Uuid>,
    by_parent: &mut HashMap<Option<Uuid>, Vec<Group>>,
    index: &mut HashMap<Uuid, IndexEntry>,
) -> Vec<GroupNode> {
    let siblings = by_parent.remove(&parent_id).unwrap_or_default();
    siblings
        .into_iter()
        .map(|group| {
            index.insert(
                group.id,
                IndexEntry {
                    parent_id,
                    name: group.name.clone(),
                },
            );
            let children = build_level(Some(group.id), by_parent, index);
            GroupNode { group, children }
        })
        .collect()
}

/// Checks that `name` is a prefix of `rest` ending at a separator or at the end.
fn segment_matches(name: &str, rest: &str) -> bool {
    !name.is_empty()
        && rest.starts_with(name)
        && (rest.len() == name.len() || rest[name.len()..].starts_with(PATH_SEPARATOR))
}

fn resolve_in<'a>(nodes: &'a [GroupNode], rest: &str) -> Option<&'a GroupNode> {
    let mut candidates: Vec<&GroupNode> = nodes
        .iter()
        .filter(|n| segment_matches(&n.group.name, rest))
        .collect();
    // stable: equal lengths keep creation order
    candidates.sort_by_key(|n| Reverse(n.group.name.len()));

    for node in candidates {
        let remainder = &rest[node.group.name.len()..];
        if remainder.is_empty() {
            return Some(node);
        }
        let remainder = &remainder[PATH_SEPARATOR.len_utf8()..];
        if let Some(found) = resolve_in(&node.children, remainder) {
            return Some(found);
        }
    }
    None
}
