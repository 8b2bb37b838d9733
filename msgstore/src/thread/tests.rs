/*
 * meli - msgstore - thread tests
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

use std::collections::HashSet;

use super::*;
use crate::{
    conf::StoreConf,
    email::{Envelope, MessageSummary},
};

fn summary(uid: Uid, message_id: &str, in_reply_to: Option<&str>, references: &[&str]) -> MessageSummary {
    let mut ret = MessageSummary::new(uid);
    ret.envelope = Some(Envelope {
        message_id: message_id.to_string(),
        in_reply_to: in_reply_to.map(str::to_string),
        references: references.iter().map(|r| r.to_string()).collect(),
        ..Envelope::default()
    });
    ret
}

fn tree(uid: Uid, children: Vec<ThreadTree>) -> ThreadTree {
    ThreadTree::with_children(uid, children)
}

fn leaf(uid: Uid) -> ThreadTree {
    ThreadTree::new(uid)
}

#[test]
fn test_thread_from_trees_uids() {
    let threads = Threads::from_trees(&[tree(1, vec![leaf(2)]), tree(3, vec![leaf(4), leaf(5)])]);
    assert_eq!(threads.len(), 5);
    assert_eq!(threads.roots().len(), 2);
    // Reading from the end gives the newest thread first, root first.
    assert_eq!(threads.uids(), vec![2, 1, 5, 4, 3]);
    assert_eq!(
        threads.to_trees(),
        vec![tree(1, vec![leaf(2)]), tree(3, vec![leaf(4), leaf(5)])]
    );
}

#[test]
fn test_thread_from_trees_duplicate_uid() {
    let threads = Threads::from_trees(&[tree(1, vec![leaf(2)]), leaf(2), leaf(3)]);
    assert_eq!(threads.len(), 3);
    assert_eq!(threads.to_trees(), vec![tree(1, vec![leaf(2)]), leaf(3)]);
}

#[test]
fn test_thread_iterators_and_siblings() {
    let threads = Threads::from_trees(&[
        tree(1, vec![leaf(2)]),
        tree(3, vec![tree(4, vec![leaf(6)]), leaf(5)]),
    ]);
    let walk: Vec<(usize, Uid, bool)> = threads
        .iter()
        .map(|(depth, idx, has_sibling)| (depth, threads[idx].uid(), has_sibling))
        .collect();
    assert_eq!(
        walk,
        vec![
            (0, 1, false),
            (1, 2, false),
            (0, 3, false),
            (1, 4, true),
            (2, 6, false),
            (1, 5, false),
        ]
    );

    let four = threads.find(4).unwrap();
    let five = threads.find(5).unwrap();
    let six = threads.find(6).unwrap();
    assert_eq!(threads.next_sibling(four), Some(five));
    assert_eq!(threads.prev_sibling(five), Some(four));
    assert_eq!(threads.prev_sibling(four), None);
    assert_eq!(threads.next_sibling(five), None);
    assert_eq!(threads.depth(six), 2);
    assert_eq!(threads[threads.root_of(six)].uid(), 3);
    assert_eq!(
        threads.next_sibling(threads.find(1).unwrap()),
        threads.find(3)
    );

    let subtree: Vec<Uid> = threads
        .thread_iter(four)
        .map(|(_, idx)| threads[idx].uid())
        .collect();
    assert_eq!(subtree, vec![4, 6]);
}

#[test]
fn test_thread_builder_references() {
    let mut builder = ThreadBuilder::new(&StoreConf::default());
    builder.update(&summary(1, "a@example.com", None, &[]));
    builder.update(&summary(2, "b@example.com", Some("a@example.com"), &["a@example.com"]));
    builder.update(&summary(3, "c@example.com", None, &[]));
    builder.update(&summary(4, "d@example.com", Some("c@example.com"), &[]));
    builder.update(&summary(
        5,
        "e@example.com",
        Some("b@example.com"),
        &["a@example.com", "b@example.com"],
    ));
    assert_eq!(builder.len(), 5);

    let threads = builder.build(&[1, 2, 3, 4, 5], &HashSet::new());
    assert_eq!(threads.len(), 5);
    // The thread holding UID 5 has the newest message, so it is last.
    assert_eq!(
        threads.to_trees(),
        vec![tree(3, vec![leaf(4)]), tree(1, vec![tree(2, vec![leaf(5)])])]
    );
    assert_eq!(threads.uids(), vec![4, 3, 5, 2, 1]);
}

#[test]
fn test_thread_builder_missing_parent() {
    let mut builder = ThreadBuilder::new(&StoreConf::default());
    builder.update(&summary(1, "a@example.com", None, &[]));
    builder.update(&summary(2, "b@example.com", Some("a@example.com"), &[]));
    builder.update(&summary(
        3,
        "c@example.com",
        Some("unknown@example.com"),
        &["a@example.com", "unknown@example.com"],
    ));

    // UID 1 is not part of the sequence: its reply becomes a root.
    let threads = builder.build(&[2, 3], &HashSet::new());
    assert_eq!(threads.to_trees(), vec![leaf(2), leaf(3)]);

    // An unknown In-Reply-To falls back to References.
    let threads = builder.build(&[1, 2, 3], &HashSet::new());
    assert_eq!(threads.to_trees(), vec![tree(1, vec![leaf(2), leaf(3)])]);
}

#[test]
fn test_thread_builder_rejects_cycles() {
    let mut builder = ThreadBuilder::new(&StoreConf::default());
    builder.update(&summary(1, "a@example.com", Some("b@example.com"), &[]));
    builder.update(&summary(2, "b@example.com", Some("a@example.com"), &[]));
    builder.update(&summary(3, "c@example.com", None, &[]));

    let threads = builder.build(&[1, 2, 3], &HashSet::new());
    assert_eq!(threads.len(), 3);
    assert_eq!(threads.iter().count(), 3);
    assert_eq!(threads.to_trees(), vec![tree(2, vec![leaf(1)]), leaf(3)]);

    let mut builder = ThreadBuilder::new(&StoreConf::default());
    builder.update(&summary(1, "a@example.com", Some("a@example.com"), &[]));
    let threads = builder.build(&[1], &HashSet::new());
    assert_eq!(threads.to_trees(), vec![leaf(1)]);
}

#[test]
fn test_thread_builder_hidden_and_deleted() {
    let mut builder = ThreadBuilder::new(&StoreConf::default());
    builder.update(&summary(1, "a@example.com", None, &[]));
    builder.update(&summary(2, "b@example.com", Some("a@example.com"), &[]));
    // Placeholders and summaries without envelopes are not indexed.
    builder.update(&MessageSummary::new(7));
    assert!(!builder.contains(7));

    let deleted: HashSet<Uid> = [2].into_iter().collect();
    let threads = builder.build(&[1, 2, 7, 2], &deleted);
    assert_eq!(threads.len(), 3);
    let seven = threads.find(7).unwrap();
    assert!(threads[seven].is_hidden());
    assert!(threads[seven].is_root());
    let two = threads.find(2).unwrap();
    assert!(threads[two].is_deleted());
    assert!(!threads[two].is_hidden());
    assert!(!threads[threads.find(1).unwrap()].is_deleted());
}

#[test]
fn test_thread_builder_sibling_order() {
    let mut conf = StoreConf::default();
    let feed = |builder: &mut ThreadBuilder| {
        builder.update(&summary(1, "a@example.com", None, &[]));
        builder.update(&summary(3, "c@example.com", Some("a@example.com"), &[]));
        builder.update(&summary(2, "b@example.com", Some("a@example.com"), &[]));
    };

    let mut builder = ThreadBuilder::new(&conf);
    feed(&mut builder);
    let threads = builder.build(&[1, 2, 3], &HashSet::new());
    // Arrival order.
    assert_eq!(threads.to_trees(), vec![tree(1, vec![leaf(3), leaf(2)])]);

    conf.reverse_thread_order = true;
    let mut builder = ThreadBuilder::new(&conf);
    feed(&mut builder);
    let threads = builder.build(&[1, 2, 3], &HashSet::new());
    assert_eq!(threads.to_trees(), vec![tree(1, vec![leaf(2), leaf(3)])]);

    conf.reverse_thread_order = false;
    conf.sort_thread_siblings = true;
    let mut builder = ThreadBuilder::new(&conf);
    feed(&mut builder);
    let threads = builder.build(&[1, 2, 3], &HashSet::new());
    assert_eq!(threads.to_trees(), vec![tree(1, vec![leaf(2), leaf(3)])]);
}

#[test]
fn test_thread_builder_message_id_change() {
    let mut builder = ThreadBuilder::new(&StoreConf::default());
    builder.update(&summary(1, "a@example.com", None, &[]));
    builder.update(&summary(2, "b@example.com", Some("a@example.com"), &[]));
    builder.update(&summary(1, "z@example.com", None, &[]));
    let threads = builder.build(&[1, 2], &HashSet::new());
    assert_eq!(threads.to_trees(), vec![leaf(1), leaf(2)]);

    builder.remove(1);
    assert!(!builder.contains(1));
    assert_eq!(builder.len(), 1);
}

#[test]
fn test_thread_mark_deleted() {
    let mut threads = Threads::from_trees(&[tree(1, vec![leaf(2)]), leaf(3)]);
    let uids: HashSet<Uid> = [2, 3, 9].into_iter().collect();
    assert_eq!(threads.mark_deleted(&uids), 2);
    assert_eq!(threads.mark_deleted(&uids), 0);
    assert!(threads[threads.find(2).unwrap()].is_deleted());
    assert!(!threads[threads.find(1).unwrap()].is_deleted());
    // Tombstoned nodes keep their place.
    assert_eq!(threads.uids(), vec![2, 1, 3]);
}
