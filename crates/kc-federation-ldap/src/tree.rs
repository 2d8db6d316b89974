//! Directory group hierarchy.
//!
//! With group inheritance preserved, a directory group listed as a member
//! of another directory group is its child. Each group may have at most one
//! parent and the graph must be acyclic, otherwise the local tree could not
//! mirror it. Groups that land on a path already taken (same name under
//! different bases, inheritance off) are left out with a warning.

use std::collections::HashMap;

use kc_federation::{FederationError, FederationResult};
use kc_model::GroupPath;

use crate::adapter::DirectoryGroup;
use crate::dn;

/// A directory group placed in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedGroup {
    /// Path relative to the mapper's groups path.
    pub path: GroupPath,
    /// The directory group.
    pub group: DirectoryGroup,
}

/// The directory groups of one mapper, in depth-first pre-order.
#[derive(Debug, Clone, Default)]
pub struct DirectoryGroupTree {
    entries: Vec<MappedGroup>,
    by_dn: HashMap<String, usize>,
    by_path: HashMap<GroupPath, usize>,
}

impl DirectoryGroupTree {
    /// Arranges directory groups into a tree.
    ///
    /// Siblings are ordered by name.
    ///
    /// ## Errors
    ///
    /// Returns `FederationError::Sync` if, with `preserve_inheritance`, a
    /// group has more than one parent or the groups form a cycle.
    pub fn build(groups: Vec<DirectoryGroup>, preserve_inheritance: bool) -> FederationResult<Self> {
        let index: HashMap<String, usize> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (dn::normalize(&g.dn), i))
            .collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
        let mut parent: Vec<Option<usize>> = vec![None; groups.len()];

        if preserve_inheritance {
            for (i, group) in groups.iter().enumerate() {
                for member in &group.members {
                    let Some(&child) = index.get(&dn::normalize(member)) else {
                        continue;
                    };
                    if let Some(existing) = parent[child] {
                        if existing != i {
                            return Err(FederationError::sync(format!(
                                "Group '{}' has more than one parent group: '{}' and '{}'",
                                groups[child].name, groups[existing].name, group.name
                            )));
                        }
                        continue;
                    }
                    parent[child] = Some(i);
                    children[i].push(child);
                }
            }
        }

        let by_name = |a: &usize, b: &usize| groups[*a].name.cmp(&groups[*b].name);
        for list in &mut children {
            list.sort_by(by_name);
        }
        let mut roots: Vec<usize> = (0..groups.len()).filter(|i| parent[*i].is_none()).collect();
        roots.sort_by(by_name);

        // Pre-order walk; anything not reached hangs off a cycle.
        let mut order: Vec<(usize, GroupPath)> = Vec::with_capacity(groups.len());
        let mut stack: Vec<(usize, GroupPath)> = roots
            .iter()
            .rev()
            .map(|&r| (r, GroupPath::from_segments([groups[r].name.clone()])))
            .collect();
        while let Some((i, path)) = stack.pop() {
            for &child in children[i].iter().rev() {
                stack.push((child, path.child(groups[child].name.clone())));
            }
            order.push((i, path));
        }

        if order.len() != groups.len() {
            let mut reached = vec![false; groups.len()];
            for (i, _) in &order {
                reached[*i] = true;
            }
            let cyclic: Vec<&str> = groups
                .iter()
                .enumerate()
                .filter(|(i, _)| !reached[*i])
                .map(|(_, g)| g.name.as_str())
                .collect();
            return Err(FederationError::sync(format!(
                "Group inheritance contains a cycle: {}",
                cyclic.join(", ")
            )));
        }

        let mut slots: Vec<Option<DirectoryGroup>> = groups.into_iter().map(Some).collect();
        let mut tree = Self::default();
        for (i, path) in order {
            let Some(group) = slots[i].take() else {
                continue;
            };
            if let Some(&kept) = tree.by_path.get(&path) {
                tracing::warn!(
                    group = %path,
                    dn = %group.dn,
                    kept = %tree.entries[kept].group.dn,
                    "Directory group maps to a path already taken, skipping it"
                );
                continue;
            }
            let pos = tree.entries.len();
            tree.by_dn.insert(dn::normalize(&group.dn), pos);
            tree.by_path.insert(path.clone(), pos);
            tree.entries.push(MappedGroup { path, group });
        }
        Ok(tree)
    }

    /// Returns the groups in depth-first pre-order, parents before children.
    #[must_use]
    pub fn entries(&self) -> &[MappedGroup] {
        &self.entries
    }

    /// Iterates over the groups in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &MappedGroup> {
        self.entries.iter()
    }

    /// Finds a group by DN.
    #[must_use]
    pub fn by_dn(&self, group_dn: &str) -> Option<&MappedGroup> {
        self.by_dn
            .get(&dn::normalize(group_dn))
            .map(|&i| &self.entries[i])
    }

    /// Finds a group by its relative path.
    #[must_use]
    pub fn by_path(&self, path: &GroupPath) -> Option<&MappedGroup> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    /// Returns the number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
