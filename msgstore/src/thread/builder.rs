/*
 * meli - msgstore - client side threading
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

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;

use super::{ThreadNode, Threads};
use crate::{conf::StoreConf, email::MessageSummary, email::Uid};

#[derive(Clone, Debug)]
struct Indexed {
    message_id: Option<String>,
    /// Closest ancestor first.
    parents: SmallVec<[String; 4]>,
    arrival: u64,
}

/// Incremental index of message references.
///
/// [`ThreadBuilder::update`] is fed every summary as it arrives;
/// [`ThreadBuilder::build`] then threads any UID sequence against the index.
#[derive(Clone, Debug, Default)]
pub struct ThreadBuilder {
    messages: HashMap<Uid, Indexed>,
    message_ids: HashMap<String, Uid>,
    arrivals: u64,
    reverse_thread_order: bool,
    sort_thread_siblings: bool,
}

impl ThreadBuilder {
    pub fn new(conf: &StoreConf) -> Self {
        Self {
            reverse_thread_order: conf.reverse_thread_order,
            sort_thread_siblings: conf.sort_thread_siblings,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.messages.contains_key(&uid)
    }

    /// Index `summary`. Summaries without an envelope are ignored.
    pub fn update(&mut self, summary: &MessageSummary) {
        let Some(envelope) = summary.envelope.as_ref() else {
            return;
        };
        let message_id = summary.message_id().map(str::to_string);
        let parents = envelope.parent_ids().map(str::to_string).collect();
        let known = self
            .messages
            .get(&summary.uid)
            .map(|old| (old.arrival, old.message_id != message_id));
        let arrival = match known {
            Some((arrival, id_changed)) => {
                if id_changed {
                    self.forget_message_id(summary.uid);
                }
                arrival
            }
            None => {
                self.arrivals += 1;
                self.arrivals
            }
        };
        if let Some(id) = message_id.as_ref() {
            self.message_ids.insert(id.clone(), summary.uid);
        }
        self.messages.insert(
            summary.uid,
            Indexed {
                message_id,
                parents,
                arrival,
            },
        );
    }

    pub fn remove(&mut self, uid: Uid) {
        self.forget_message_id(uid);
        self.messages.remove(&uid);
    }

    fn forget_message_id(&mut self, uid: Uid) {
        if let Some(id) = self.messages.get(&uid).and_then(|m| m.message_id.as_ref()) {
            if self.message_ids.get(id) == Some(&uid) {
                self.message_ids.remove(id);
            }
        }
    }

    /// Thread `uids`. The returned forest contains every UID of `uids`
    /// exactly once; UIDs in `deleted` are marked as such.
    pub fn build(&self, uids: &[Uid], deleted: &HashSet<Uid>) -> Threads {
        let mut threads = Threads::new();
        let mut positions: HashMap<Uid, usize> = HashMap::with_capacity(uids.len());
        for &uid in uids {
            if threads.contains(uid) {
                continue;
            }
            positions.insert(uid, positions.len());
            let idx = threads.push_node(uid);
            let node = &mut threads.nodes[idx];
            node.hidden = !self.messages.contains_key(&uid);
            node.deleted = deleted.contains(&uid);
        }

        for idx in 0..threads.nodes.len() {
            let uid = threads.nodes[idx].uid;
            let Some(indexed) = self.messages.get(&uid) else {
                continue;
            };
            for parent_id in indexed.parents.iter() {
                let Some(&parent_idx) = self
                    .message_ids
                    .get(parent_id)
                    .and_then(|parent_uid| threads.index.get(parent_uid))
                else {
                    continue;
                };
                if Self::is_ancestor(&threads.nodes, idx, parent_idx) {
                    continue;
                }
                threads.nodes[idx].parent = Some(parent_idx);
                break;
            }
        }

        let sort_key = |node: &ThreadNode| -> (u64, u64) {
            if self.sort_thread_siblings {
                (positions[&node.uid] as u64, 0)
            } else {
                let arrival = self
                    .messages
                    .get(&node.uid)
                    .map(|m| m.arrival)
                    .unwrap_or(u64::MAX);
                (arrival, u64::from(node.uid))
            }
        };
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut roots = vec![];
        for (idx, node) in threads.nodes.iter().enumerate() {
            match node.parent {
                Some(p) => children.entry(p).or_default().push(idx),
                None => roots.push(idx),
            }
        }
        for (parent, mut list) in children {
            list.sort_by_key(|&c| sort_key(&threads.nodes[c]));
            if self.reverse_thread_order {
                list.reverse();
            }
            threads.nodes[parent].children = list.into_iter().collect();
        }

        let mut newest: Vec<(usize, usize)> = roots
            .iter()
            .map(|&root| {
                let newest = threads
                    .thread_iter(root)
                    .map(|(_, idx)| positions[&threads.nodes[idx].uid])
                    .max()
                    .unwrap_or_default();
                (newest, root)
            })
            .collect();
        newest.sort_unstable();
        threads.roots = newest.into_iter().map(|(_, root)| root).collect();
        threads
    }

    /// Whether `node` is `candidate` or one of its ancestors.
    fn is_ancestor(nodes: &[ThreadNode], node: usize, mut candidate: usize) -> bool {
        loop {
            if candidate == node {
                return true;
            }
            match nodes[candidate].parent {
                Some(p) => candidate = p,
                None => return false,
            }
        }
    }
}
