/*
 * meli - msgstore - thread iterators
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

use smallvec::SmallVec;

use super::ThreadNode;

/* `ThreadsIterator` walks every thread in root order, depth first. For
 * example, for the following threads:
 *
 *  ```
 *  A_
 *   |_ B
 *   |_C
 *  D
 *  E_
 *   |_F
 *   ```
 *
 *   the iterator returns them as `A, B, C, D, E, F`. Unlike the display
 *   iterators hidden containers are returned too.
 */

pub struct ThreadsIterator<'a> {
    pub(super) roots: &'a [usize],
    pub(super) pos: usize,
    pub(super) stack: SmallVec<[usize; 16]>,
    pub(super) nodes: &'a [ThreadNode],
}

impl<'a> Iterator for ThreadsIterator<'a> {
    /// `(depth, node index, has a following sibling)`
    type Item = (usize, usize, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let mut tree = self.roots;
        for i in self.stack.iter() {
            tree = &self.nodes[tree[*i]].children;
        }
        loop {
            if self.pos == tree.len() {
                let p = self.stack.pop()?;
                self.pos = p + 1;
                tree = self.roots;
                for i in self.stack.iter() {
                    tree = &self.nodes[tree[*i]].children;
                }
                continue;
            }
            let idx = tree[self.pos];
            let ret = (
                self.stack.len(),
                idx,
                !self.stack.is_empty() && (self.pos < (tree.len() - 1)),
            );
            if self.nodes[idx].children.is_empty() {
                self.pos += 1;
            } else {
                self.stack.push(self.pos);
                self.pos = 0;
            }
            return Some(ret);
        }
    }
}

/* `ThreadIterator` returns the nodes of a single thread (or subtree)
 * depth first. For the following thread:
 *
 *  ```
 *  A_
 *   |_ B
 *   |_C
 *   |_D
 *   ```
 *
 *   the iterator returns them as `A, B, C, D`
 */

pub struct ThreadIterator<'a> {
    pub(super) group: usize,
    pub(super) pos: usize,
    pub(super) stack: SmallVec<[usize; 16]>,
    pub(super) nodes: &'a [ThreadNode],
}

impl<'a> Iterator for ThreadIterator<'a> {
    /// `(depth, node index)`
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let group = [self.group];
        loop {
            let mut tree = &group[..];
            for i in self.stack.iter() {
                tree = &self.nodes[tree[*i]].children;
            }
            if self.pos == tree.len() {
                self.pos = self.stack.pop()? + 1;
                continue;
            }
            let idx = tree[self.pos];
            let ret = (self.stack.len(), idx);
            if self.nodes[idx].children.is_empty() {
                self.pos += 1;
            } else {
                self.stack.push(self.pos);
                self.pos = 0;
            }
            return Some(ret);
        }
    }
}
