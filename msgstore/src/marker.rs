/*
 * meli - msgstore - marker module
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

//! Marked messages of a store, including visual (range) marking.

use indexmap::IndexSet;

use crate::email::Uid;

#[derive(Clone, Debug)]
struct VisualMark {
    anchor: Uid,
    /// Marks that existed when visual mode started.
    base: IndexSet<Uid>,
}

#[derive(Clone, Debug, Default)]
pub struct Marker {
    marked: IndexSet<Uid>,
    last_marked: IndexSet<Uid>,
    visual: Option<VisualMark>,
}

impl Marker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, uid: Uid) {
        self.marked.insert(uid);
    }

    pub fn unmark(&mut self, uid: Uid) {
        self.marked.shift_remove(&uid);
    }

    pub fn toggle_mark(&mut self, uid: Uid) {
        if !self.marked.shift_remove(&uid) {
            self.marked.insert(uid);
        }
    }

    pub fn is_marked(&self, uid: Uid) -> bool {
        self.marked.contains(&uid)
    }

    /// Marked UIDs in marking order.
    pub fn marked(&self) -> Vec<Uid> {
        self.marked.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    /// Unmark everything; the cleared set can be restored with
    /// [`Marker::remark`].
    pub fn clear(&mut self) {
        self.visual = None;
        if !self.marked.is_empty() {
            self.last_marked = std::mem::take(&mut self.marked);
        }
    }

    pub fn remark(&mut self) {
        self.marked = self.last_marked.clone();
    }

    pub fn is_visual_mark_active(&self) -> bool {
        self.visual.is_some()
    }

    /// Enter or leave visual mode. Entering anchors the range at `selected`;
    /// with `clear` existing marks are dropped first. Leaving keeps the
    /// marks made.
    pub fn toggle_visual_mark(&mut self, clear: bool, selected: Option<Uid>) {
        if self.visual.take().is_some() {
            return;
        }
        let Some(anchor) = selected else {
            return;
        };
        if clear {
            self.clear();
        }
        self.visual = Some(VisualMark {
            anchor,
            base: self.marked.clone(),
        });
        self.marked.insert(anchor);
    }

    /// In visual mode, mark the contiguous range of `uids` between the
    /// anchor and `selected`, on top of the marks visual mode started with.
    pub fn update_visual_mark(&mut self, uids: &[Uid], selected: Uid) {
        let Some(visual) = self.visual.as_ref() else {
            return;
        };
        let Some(anchor_pos) = uids.iter().position(|&u| u == visual.anchor) else {
            return;
        };
        let Some(selected_pos) = uids.iter().position(|&u| u == selected) else {
            return;
        };
        let (start, end) = if anchor_pos <= selected_pos {
            (anchor_pos, selected_pos)
        } else {
            (selected_pos, anchor_pos)
        };
        let mut marked = visual.base.clone();
        marked.extend(uids[start..=end].iter().copied());
        self.marked = marked;
    }

    /// Forget UIDs that no longer exist.
    pub fn retain(&mut self, mut keep: impl FnMut(Uid) -> bool) {
        self.marked.retain(|&u| keep(u));
        self.last_marked.retain(|&u| keep(u));
        if let Some(visual) = self.visual.as_mut() {
            visual.base.retain(|&u| keep(u));
            if !keep(visual.anchor) {
                self.visual = None;
            }
        }
    }
}
