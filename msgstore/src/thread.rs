/*
 * meli - msgstore - thread module
 *
 * Copyright 2019 Manos Pitsidianakis
 *
 * This file is part of meli.
 *
 * meli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * meli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with meli. If not, see <http://www.gnu.org/licenses/>.
 */

/*!
 * Conversation forests.
 *
 * A [`Threads`] value is an arena of [`ThreadNode`]s: parents and children
 * are stored as indices into the arena, and siblings are found through the
 * parent's child list (or the root list). Backends that thread natively
 * deliver the owned, nested [`ThreadTree`] form; [`ThreadBuilder`] computes
 * the forest locally from envelope references for those that don't.
 */

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use crate::email::Uid;

mod builder;
mod iterators;
pub use builder::*;
pub use iterators::*;

#[cfg(test)]
mod tests;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ThreadTree {
    pub uid: Uid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ThreadTree>,
}

impl ThreadTree {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            children: vec![],
        }
    }

    pub fn with_children(uid: Uid, children: Vec<Self>) -> Self {
        Self { uid, children }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ThreadNode {
    uid: Uid,
    parent: Option<usize>,
    children: SmallVec<[usize; 4]>,
    /// No summary is known for this message.
    hidden: bool,
    /// Deleted in place until the next rebuild.
    deleted: bool,
}

impl ThreadNode {
    fn new(uid: Uid) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

#[derive(Clone, Debug, Default)]
pub struct Threads {
    nodes: Vec<ThreadNode>,
    roots: Vec<usize>,
    index: HashMap<Uid, usize>,
}

impl std::ops::Index<usize> for Threads {
    type Output = ThreadNode;

    fn index(&self, index: usize) -> &ThreadNode {
        &self.nodes[index]
    }
}

impl Threads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the arena from a delivered forest. A UID occurring more than
    /// once is kept at its first position.
    pub fn from_trees(trees: &[ThreadTree]) -> Self {
        let mut ret = Self::new();
        for tree in trees {
            if let Some(idx) = ret.insert_tree(tree, None) {
                ret.roots.push(idx);
            }
        }
        ret
    }

    fn insert_tree(&mut self, tree: &ThreadTree, parent: Option<usize>) -> Option<usize> {
        if self.index.contains_key(&tree.uid) {
            log::warn!("UID {} occurs twice in thread forest, ignoring", tree.uid);
            return None;
        }
        let idx = self.push_node(tree.uid);
        self.nodes[idx].parent = parent;
        for child in &tree.children {
            if let Some(child_idx) = self.insert_tree(child, Some(idx)) {
                self.nodes[idx].children.push(child_idx);
            }
        }
        Some(idx)
    }

    fn push_node(&mut self, uid: Uid) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(ThreadNode::new(uid));
        self.index.insert(uid, idx);
        idx
    }

    pub fn to_trees(&self) -> Vec<ThreadTree> {
        fn subtree(threads: &Threads, idx: usize) -> ThreadTree {
            ThreadTree {
                uid: threads.nodes[idx].uid,
                children: threads.nodes[idx]
                    .children
                    .iter()
                    .map(|&c| subtree(threads, c))
                    .collect(),
            }
        }
        self.roots.iter().map(|&r| subtree(self, r)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn find(&self, uid: Uid) -> Option<usize> {
        self.index.get(&uid).copied()
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.index.contains_key(&uid)
    }

    pub fn root_of(&self, mut idx: usize) -> usize {
        while let Some(p) = self.nodes[idx].parent {
            idx = p;
        }
        idx
    }

    /// The child list `idx` belongs to, including `idx` itself.
    pub fn siblings(&self, idx: usize) -> &[usize] {
        match self.nodes[idx].parent {
            Some(p) => self.nodes[p].children.as_slice(),
            None => self.roots.as_slice(),
        }
    }

    pub fn next_sibling(&self, idx: usize) -> Option<usize> {
        let siblings = self.siblings(idx);
        let pos = siblings.iter().position(|&s| s == idx)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prev_sibling(&self, idx: usize) -> Option<usize> {
        let siblings = self.siblings(idx);
        let pos = siblings.iter().position(|&s| s == idx)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    pub fn depth(&self, mut idx: usize) -> usize {
        let mut ret = 0;
        while let Some(p) = self.nodes[idx].parent {
            idx = p;
            ret += 1;
        }
        ret
    }

    pub fn iter(&self) -> ThreadsIterator<'_> {
        ThreadsIterator {
            roots: &self.roots,
            pos: 0,
            stack: SmallVec::new(),
            nodes: &self.nodes,
        }
    }

    pub fn thread_iter(&self, idx: usize) -> ThreadIterator<'_> {
        ThreadIterator {
            group: idx,
            pos: 0,
            stack: SmallVec::new(),
            nodes: &self.nodes,
        }
    }

    /// The forest as a UID sequence: the walk of the newest (last) thread
    /// ends up at the end, reversed, so that reading the sequence from the
    /// end gives the display order.
    pub fn uids(&self) -> Vec<Uid> {
        let mut ret = Vec::with_capacity(self.nodes.len());
        for &root in self.roots.iter().rev() {
            ret.extend(self.thread_iter(root).map(|(_, idx)| self.nodes[idx].uid));
        }
        ret.reverse();
        ret
    }

    /// Tombstone the nodes of `uids`. Returns the number of nodes marked.
    pub fn mark_deleted(&mut self, uids: &HashSet<Uid>) -> usize {
        let mut ret = 0;
        for uid in uids {
            if let Some(&idx) = self.index.get(uid) {
                if !self.nodes[idx].deleted {
                    self.nodes[idx].deleted = true;
                    ret += 1;
                }
            }
        }
        ret
    }
}
