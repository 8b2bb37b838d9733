//
// msgstore - integration tests
//
// Copyright 2024 Emmanouil Pitsidianakis <manos@pitsidianak.is>
//
// This file is part of meli.
//
// meli is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// meli is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with meli. If not, see <http://www.gnu.org/licenses/>.
//
// SPDX-License-Identifier: EUPL-1.2 OR GPL-3.0-or-later

mod mock;
mod registry;
mod sync;

use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use msgstore::{MessageStore, ThreadEvent};

/// Process events until `done` holds.
#[track_caller]
pub fn pump(
    store: &mut MessageStore,
    events: &Receiver<ThreadEvent>,
    mut done: impl FnMut(&MessageStore) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done(store) {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(timeout) {
            Ok(event) => store.process_event(event),
            Err(err) => panic!("store did not settle: {}", err),
        }
    }
}

/// Process events until none arrive for a while.
pub fn drain(store: &mut MessageStore, events: &Receiver<ThreadEvent>) {
    while let Ok(event) = events.recv_timeout(Duration::from_millis(200)) {
        store.process_event(event);
    }
}
