/*
 * meli - msgstore - jobs module
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

//! Re-armable single-shot timers used to coalesce bursts of work.
//!
//! A [`Debouncer`] fires once, [`Debouncer::delay`] after its most recent
//! [`rearm`](Debouncer::rearm). The fire happens on the `smol` executor and
//! is only a notification: it sends [`ThreadEvent::Timer`] to the owning
//! context, which then asks [`Debouncer::claim`] whether the event is still
//! current before doing the actual work there.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use crossbeam::channel::Sender;

use crate::worker::ThreadEvent;

uuid_hash_type!(TimerId);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimerEvent {
    pub id: TimerId,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct TimerPrivate {
    /// Bumped on every rearm and disable.
    generation: u64,
    active: bool,
    handle: Option<smol::Task<()>>,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct Debouncer {
    id: TimerId,
    delay: Duration,
    sender: Sender<ThreadEvent>,
    inner: Mutex<TimerPrivate>,
}

impl Debouncer {
    pub fn new(delay: Duration, sender: Sender<ThreadEvent>) -> Self {
        Self {
            id: TimerId::new(),
            delay,
            sender,
            inner: Mutex::new(TimerPrivate::default()),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn lock(&self) -> MutexGuard<'_, TimerPrivate> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// Schedule a fire after the delay, replacing any pending one. Returns
    /// `true` if a pending fire was superseded.
    pub fn rearm(&self) -> bool {
        let mut timer = self.lock();
        let superseded = Self::stop(&mut timer);
        timer.generation = timer.generation.wrapping_add(1);
        let event = TimerEvent {
            id: self.id,
            generation: timer.generation,
        };
        let cancel = Arc::new(AtomicBool::new(false));
        let delay = self.delay;
        let sender = self.sender.clone();
        let handle = {
            let cancel = cancel.clone();
            smol::spawn(async move {
                smol::Timer::after(delay).await;
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                if sender.send(ThreadEvent::Timer(event)).is_err() {
                    log::trace!("timer {} fired after its owner hung up", event.id);
                }
            })
        };
        timer.handle = Some(handle);
        timer.cancel = cancel;
        timer.active = true;
        superseded
    }

    /// Stop and discard a pending fire. A fire already in flight is
    /// rejected by [`Debouncer::claim`].
    pub fn disable(&self) {
        let mut timer = self.lock();
        Self::stop(&mut timer);
        timer.generation = timer.generation.wrapping_add(1);
    }

    fn stop(timer: &mut TimerPrivate) -> bool {
        let was_active = timer.active;
        timer.active = false;
        timer.cancel.store(true, Ordering::SeqCst);
        // Dropping a `smol::Task` cancels it.
        timer.handle = None;
        was_active
    }

    /// Accept `event` in the owning context. Returns `true` exactly once per
    /// arming, and only for the current generation.
    pub fn claim(&self, event: &TimerEvent) -> bool {
        if event.id != self.id {
            return false;
        }
        let mut timer = self.lock();
        if !timer.active || timer.generation != event.generation {
            return false;
        }
        timer.active = false;
        timer.handle = None;
        true
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.disable();
    }
}
