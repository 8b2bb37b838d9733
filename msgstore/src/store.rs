/*
 * meli - msgstore - message store
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
 * The message store of one directory.
 *
 * A [`MessageStore`] caches what a backend worker reported about a directory
 * (the UID sequence, message summaries, threads) and offers navigation,
 * search and mutation on top of it. Operations post [`Action`]s through the
 * store's [`Worker`] and return immediately. The owning context feeds every
 * [`ThreadEvent`] it receives back through [`MessageStore::process_event`],
 * which routes worker replies to the request that caused them and
 * reconciles the cache in [`MessageStore::update`].
 *
 * Order of the UID sequence is oldest first: index `0` is the oldest
 * message and the last index the newest, which is displayed at the top.
 */

use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    mem,
    rc::Rc,
};

use crossbeam::channel::Sender;
use futures::channel::oneshot;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    conf::StoreConf,
    email::{BodyPart, Flag, FullMessage, MessageSummary, Uid},
    error::{Error, ErrorKind, Result},
    jobs::{Debouncer, TimerEvent},
    marker::Marker,
    sort::{sort_by, SortCriterion},
    thread::{ThreadBuilder, Threads},
    worker::{
        Action, ActionId, Capabilities, DirectoryInfo, Response, ThreadEvent, Worker,
        WorkerMessage,
    },
};


/// Receives the terminal result of an operation.
pub type DoneCallback = Box<dyn FnOnce(Result<()>)>;
pub type BodyCallback = Rc<dyn Fn(&FullMessage)>;
pub type BodyPartCallback = Box<dyn FnOnce(&BodyPart)>;
pub type SearchCallback = Box<dyn FnOnce(Result<Vec<Uid>>)>;
pub type UpdateCallback = Box<dyn FnMut(&MessageStore)>;
pub type DirsCallback = Box<dyn FnMut()>;
pub type NewMailTrigger = Box<dyn FnMut(&MessageSummary)>;
pub type DirectoryChangeTrigger = Box<dyn FnMut()>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Selection {
    /// Stands for the newest message until first accessed.
    #[default]
    Unresolved,
    Resolved(Uid),
}

enum Waiter {
    Callback(BodyCallback),
    Channel(oneshot::Sender<FullMessage>),
}

/// Everyone waiting for the body of one UID.
#[derive(Default)]
struct BodyWaiters(SmallVec<[Waiter; 2]>);

impl BodyWaiters {
    fn push(&mut self, waiter: Waiter) {
        self.0.push(waiter);
    }

    fn resolve(self, msg: &FullMessage) {
        for waiter in self.0 {
            match waiter {
                Waiter::Callback(cb) => cb(msg),
                Waiter::Channel(tx) => {
                    // The receiver may have been dropped.
                    _ = tx.send(msg.clone());
                }
            }
        }
    }
}

/// An in-flight action and what to do when it completes.
enum Request {
    FetchHeaders {
        uids: Vec<Uid>,
        on_finish: Option<DoneCallback>,
    },
    FetchFull {
        uids: Vec<Uid>,
    },
    FetchBodyPart {
        on_part: Option<BodyPartCallback>,
    },
    FetchFlags,
    /// Delete and move remove messages optimistically.
    Delete {
        uids: Vec<Uid>,
        on_finish: Option<DoneCallback>,
    },
    Move {
        uids: Vec<Uid>,
        on_finish: Option<DoneCallback>,
    },
    Sort {
        on_finish: Option<DoneCallback>,
    },
    Search {
        on_results: Option<SearchCallback>,
    },
    Generic {
        name: &'static str,
        on_finish: Option<DoneCallback>,
    },
}

impl Request {
    const fn name(&self) -> &'static str {
        match self {
            Self::FetchHeaders { .. } => "fetch-headers",
            Self::FetchFull { .. } => "fetch-full",
            Self::FetchBodyPart { .. } => "fetch-body-part",
            Self::FetchFlags => "fetch-flags",
            Self::Delete { .. } => "delete",
            Self::Move { .. } => "move",
            Self::Sort { .. } => "sort",
            Self::Search { .. } => "search",
            Self::Generic { name, .. } => *name,
        }
    }
}

/// Drop the pending mark of `uid` if `owner` is still the action fetching it.
fn release_pending(pending: &mut HashMap<Uid, ActionId>, uid: Uid, owner: ActionId) -> bool {
    if pending.get(&uid) == Some(&owner) {
        pending.remove(&uid);
        true
    } else {
        false
    }
}

fn finish(on_finish: Option<DoneCallback>, result: Result<()>) {
    if let Some(cb) = on_finish {
        cb(result);
    }
}

pub struct MessageStore {
    worker: Worker,
    dir_info: DirectoryInfo,
    conf: StoreConf,

    /// `None` is a placeholder for a UID whose headers are not known yet.
    messages: HashMap<Uid, Option<MessageSummary>>,
    uids: Vec<Uid>,
    deleted: HashSet<Uid>,
    marker: Marker,

    selected: Selection,
    /// Index to select once the next client thread rebuild is done.
    reselect_index: Option<usize>,

    results: Vec<Uid>,
    result_index: Option<usize>,
    filter: Vec<String>,
    sort_criteria: Vec<SortCriterion>,
    sorting: bool,

    /// Pending UIDs and the action currently fetching each.
    pending_headers: HashMap<Uid, ActionId>,
    pending_bodies: HashMap<Uid, ActionId>,
    body_waiters: HashMap<Uid, BodyWaiters>,
    requests: IndexMap<ActionId, Request>,

    threaded_view: bool,
    build_threads: bool,
    threads: Threads,
    /// UID sequence in client thread order, valid in client threaded view.
    thread_uids: Vec<Uid>,
    builder: ThreadBuilder,
    thread_debounce: Debouncer,

    needs_flags: Vec<Uid>,
    flags_debounce: Debouncer,

    on_update: Option<UpdateCallback>,
    on_filter_change: Option<UpdateCallback>,
    on_update_dirs: Option<DirsCallback>,
    trigger_new_email: Option<NewMailTrigger>,
    trigger_directory_change: Option<DirectoryChangeTrigger>,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct(stringify!(MessageStore))
            .field("worker", &self.worker.name())
            .field("directory", &self.dir_info.name)
            .field("uids", &self.uids.len())
            .field("selected", &self.selected)
            .field("threaded_view", &self.threaded_view)
            .field("build_threads", &self.build_threads)
            .field("requests", &self.requests.len())
            .finish_non_exhaustive()
    }
}

impl MessageStore {
    /// `sender` is the owning context's event channel; timers deliver their
    /// fires there.
    pub fn new(
        worker: Worker,
        dir_info: DirectoryInfo,
        conf: StoreConf,
        sender: Sender<ThreadEvent>,
    ) -> Result<Self> {
        let sort_criteria = conf.sort_criteria()?;
        // Without native threads, threads are always built locally.
        let build_threads = conf.force_client_threads || !dir_info.caps.thread;
        Ok(Self {
            worker,
            threaded_view: conf.threading_enabled,
            build_threads,
            builder: ThreadBuilder::new(&conf),
            thread_debounce: Debouncer::new(conf.client_threads_delay(), sender.clone()),
            flags_debounce: Debouncer::new(conf.flags_refetch_delay(), sender),
            dir_info,
            conf,
            messages: HashMap::default(),
            uids: vec![],
            deleted: HashSet::default(),
            marker: Marker::new(),
            selected: Selection::Unresolved,
            reselect_index: None,
            results: vec![],
            result_index: None,
            filter: vec![],
            sort_criteria,
            sorting: false,
            pending_headers: HashMap::default(),
            pending_bodies: HashMap::default(),
            body_waiters: HashMap::default(),
            requests: IndexMap::default(),
            threads: Threads::new(),
            thread_uids: vec![],
            needs_flags: vec![],
            on_update: None,
            on_filter_change: None,
            on_update_dirs: None,
            trigger_new_email: None,
            trigger_directory_change: None,
        })
    }

    pub fn with_new_mail_trigger(mut self, trigger: impl FnMut(&MessageSummary) + 'static) -> Self {
        self.trigger_new_email = Some(Box::new(trigger));
        self
    }

    pub fn with_directory_change_trigger(mut self, trigger: impl FnMut() + 'static) -> Self {
        self.trigger_directory_change = Some(Box::new(trigger));
        self
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn conf(&self) -> &StoreConf {
        &self.conf
    }

    pub fn dir_info(&self) -> &DirectoryInfo {
        &self.dir_info
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.dir_info.caps
    }

    /// The UID sequence in effect: the client thread order in client
    /// threaded view, the backend's order otherwise.
    pub fn uids(&self) -> &[Uid] {
        if self.threaded_view && self.build_threads {
            &self.thread_uids
        } else {
            &self.uids
        }
    }

    pub fn len(&self) -> usize {
        self.uids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uids().is_empty()
    }

    /// `None` for UIDs that are unknown or still placeholders.
    pub fn summary(&self, uid: Uid) -> Option<&MessageSummary> {
        self.messages.get(&uid).and_then(Option::as_ref)
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.messages.contains_key(&uid)
    }

    pub fn is_deleted(&self, uid: Uid) -> bool {
        self.deleted.contains(&uid)
    }

    pub fn is_header_pending(&self, uid: Uid) -> bool {
        self.pending_headers.contains_key(&uid)
    }

    pub fn is_body_pending(&self, uid: Uid) -> bool {
        self.pending_bodies.contains_key(&uid)
    }

    pub fn is_sorting(&self) -> bool {
        self.sorting
    }

    pub fn current_sort_criteria(&self) -> &[SortCriterion] {
        &self.sort_criteria
    }

    pub fn filter(&self) -> &[String] {
        &self.filter
    }

    pub fn results(&self) -> &[Uid] {
        &self.results
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn marker_mut(&mut self) -> &mut Marker {
        &mut self.marker
    }

    pub fn threads(&self) -> &Threads {
        &self.threads
    }

    pub fn threaded_view(&self) -> bool {
        self.threaded_view
    }

    pub fn build_threads(&self) -> bool {
        self.build_threads
    }

    /// Number of actions posted that have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }

    pub fn on_update(&mut self, cb: impl FnMut(&Self) + 'static) {
        self.on_update = Some(Box::new(cb));
    }

    pub fn on_filter_change(&mut self, cb: impl FnMut(&Self) + 'static) {
        self.on_filter_change = Some(Box::new(cb));
    }

    pub fn on_update_dirs(&mut self, cb: impl FnMut() + 'static) {
        self.on_update_dirs = Some(Box::new(cb));
    }

    /* ---------------------------------------------------------------- */
    /* Event processing                                                  */
    /* ---------------------------------------------------------------- */

    pub fn process_event(&mut self, event: ThreadEvent) {
        match event {
            ThreadEvent::Worker(msg) => self.process_message(msg),
            ThreadEvent::Timer(ev) => {
                self.handle_timer(&ev);
            }
        }
    }

    /// Route `msg` to the request it answers, then reconcile the cache.
    pub fn process_message(&mut self, msg: WorkerMessage) {
        let WorkerMessage {
            in_response_to,
            response,
        } = msg;
        if let Some(id) = in_response_to {
            self.process_reply(id, &response);
        }
        self.update(response);
    }

    fn process_reply(&mut self, id: ActionId, response: &Response) {
        if let Some(result) = response.outcome() {
            match self.requests.shift_remove(&id) {
                Some(request) => {
                    log::trace!(
                        "[{}] {} {} finished: {:?}",
                        self.worker.name(),
                        request.name(),
                        id,
                        result
                    );
                    self.finish_request(id, request, result);
                }
                None => log::warn!(
                    "[{}] dropping {:?} for unknown action {}",
                    self.worker.name(),
                    response,
                    id
                ),
            }
            return;
        }
        match response {
            Response::SearchResults { uids } => {
                let cb = match self.requests.get_mut(&id) {
                    Some(Request::Search { on_results }) => on_results.take(),
                    _ => None,
                };
                if let Some(cb) = cb {
                    cb(Ok(self.intersect(uids)));
                }
            }
            Response::MessageBodyPart(part) => {
                let cb = match self.requests.get_mut(&id) {
                    Some(Request::FetchBodyPart { on_part }) => on_part.take(),
                    _ => None,
                };
                if let Some(cb) = cb {
                    cb(part);
                }
            }
            _ => {}
        }
    }

    fn finish_request(&mut self, id: ActionId, request: Request, result: Result<()>) {
        match request {
            Request::FetchHeaders { uids, on_finish } => {
                if let Err(err) = result.as_ref() {
                    log::debug!("[{}] header fetch failed: {}", self.worker.name(), err);
                    for uid in uids.iter() {
                        release_pending(&mut self.pending_headers, *uid, id);
                    }
                }
                finish(on_finish, result);
            }
            Request::FetchFull { uids } => {
                if let Err(err) = result.as_ref() {
                    log::debug!("[{}] body fetch failed: {}", self.worker.name(), err);
                }
                // Whatever this fetch still owns will not arrive anymore.
                for uid in uids.iter() {
                    if release_pending(&mut self.pending_bodies, *uid, id) {
                        if result.is_ok() {
                            log::warn!(
                                "[{}] body fetch finished without content for UID {}",
                                self.worker.name(),
                                uid
                            );
                        }
                        self.body_waiters.remove(uid);
                    }
                }
            }
            Request::FetchBodyPart { .. } => {}
            Request::FetchFlags => {
                if let Err(err) = result {
                    log::warn!("[{}] flag fetch failed: {}", self.worker.name(), err);
                }
            }
            Request::Delete { uids, on_finish } | Request::Move { uids, on_finish } => {
                if result.is_err() {
                    self.revert_deleted(&uids);
                }
                finish(on_finish, result);
            }
            Request::Sort { on_finish } => {
                if let Some(uid) = self.selected_uid() {
                    self.select(uid);
                }
                self.sorting = false;
                finish(on_finish, result);
            }
            Request::Search { on_results } => {
                // Only reached if no results were delivered.
                if let Some(cb) = on_results {
                    cb(result.map(|()| vec![]));
                }
            }
            Request::Generic { name, on_finish } => {
                if let Err(err) = result.as_ref() {
                    log::debug!("[{}] {} failed: {}", self.worker.name(), name, err);
                }
                finish(on_finish, result);
            }
        }
    }

    /// Post `action`, remembering `request` until its terminal reply.
    fn post(&mut self, action: Action, request: Request) {
        self.post_as(ActionId::new(), action, request);
    }

    /// Like [`Self::post`], for requests whose id was handed out before
    /// posting.
    fn post_as(&mut self, id: ActionId, action: Action, request: Request) {
        match self.worker.post_action(id, action) {
            Ok(()) => {
                self.requests.insert(id, request);
            }
            Err(err) => {
                log::warn!(
                    "[{}] could not post {}: {}",
                    self.worker.name(),
                    request.name(),
                    err
                );
                self.finish_request(id, request, Err(err));
            }
        }
    }

    /// Reconcile the cache with `response`.
    pub fn update(&mut self, response: Response) {
        let mut update = false;
        let mut update_threads = false;
        let mut directory_change = false;
        match response {
            Response::DirectoryInfo { info, skip_sort } => {
                self.dir_info = info;
                if !skip_sort {
                    self.sort(self.sort_criteria.clone(), None);
                }
                update = true;
            }
            Response::DirectoryContents { uids } => {
                let old_index = self.selected_index();
                directory_change = self.replace_uids(uids);
                if self.threaded_view && self.build_threads {
                    // Notifies on its own.
                    self.run_thread_builder_now();
                } else {
                    self.thread_uids.clear();
                    self.threads = Threads::new();
                    self.reconcile_selection(old_index);
                    update = true;
                }
            }
            Response::DirectoryThreaded { threads } => {
                let old_index = self.selected_index();
                let threads = Threads::from_trees(&threads);
                directory_change = self.replace_uids(threads.uids());
                self.threads = threads;
                self.thread_uids.clear();
                self.reconcile_selection(old_index);
                update = true;
            }
            Response::MessageInfo { info, needs_flags } => {
                let uid = info.uid;
                let has_envelope = info.envelope.is_some();
                match self.messages.get_mut(&uid) {
                    Some(Some(existing)) => existing.merge(&info),
                    _ if has_envelope => {
                        self.messages.insert(uid, Some((*info).clone()));
                    }
                    _ => {}
                }
                if needs_flags {
                    self.needs_flags.push(uid);
                    self.fetch_flags();
                }
                if info.is_new() {
                    if let Some(trigger) = self.trigger_new_email.as_mut() {
                        trigger(info.as_ref());
                    }
                }
                if has_envelope {
                    self.pending_headers.remove(&uid);
                }
                if let Some(Some(summary)) = self.messages.get(&uid) {
                    self.builder.update(summary);
                }
                update = true;
                update_threads = true;
            }
            Response::FullMessage(msg) => {
                if self.pending_bodies.remove(&msg.uid).is_some() {
                    if let Some(waiters) = self.body_waiters.remove(&msg.uid) {
                        waiters.resolve(&msg);
                    }
                }
            }
            Response::MessagesDeleted { uids } => {
                if self.uids.len() < uids.len() {
                    let err = Error::new(format!(
                        "backend deleted {} messages but only {} are known",
                        uids.len(),
                        self.uids.len()
                    ))
                    .set_kind(ErrorKind::Inconsistent);
                    log::warn!("[{}] {}, resynchronizing", self.worker.name(), err.summary);
                    self.resync();
                } else {
                    self.remove_uids(&uids);
                    update_threads = true;
                }
                update = true;
            }
            Response::MessagesCopied { .. } | Response::MessagesMoved { .. } => {}
            Response::Done
            | Response::Error(_)
            | Response::Unsupported
            | Response::SearchResults { .. }
            | Response::MessageBodyPart(_) => {}
        }

        if update {
            self.notify(update_threads);
        }
        if directory_change {
            if let Some(trigger) = self.trigger_directory_change.as_mut() {
                trigger();
            }
        }
    }

    /// Install a new UID sequence, keeping known summaries. Returns whether
    /// any UID is new. Repeated UIDs keep their first position.
    fn replace_uids(&mut self, uids: Vec<Uid>) -> bool {
        let mut directory_change = false;
        let mut messages = HashMap::with_capacity(uids.len());
        let mut sequence = Vec::with_capacity(uids.len());
        for uid in uids {
            if messages.contains_key(&uid) {
                continue;
            }
            let summary = self.messages.remove(&uid).unwrap_or_else(|| {
                directory_change = true;
                None
            });
            messages.insert(uid, summary);
            sequence.push(uid);
        }
        self.messages = messages;
        self.uids = sequence;
        directory_change
    }

    fn remove_uids(&mut self, uids: &[Uid]) {
        let old_index = self.selected_index();
        let to_delete: HashSet<Uid> = uids.iter().copied().collect();
        for uid in uids {
            self.messages.remove(uid);
            self.deleted.remove(uid);
            self.builder.remove(*uid);
        }
        self.uids.retain(|uid| !to_delete.contains(uid));
        self.thread_uids.retain(|uid| !to_delete.contains(uid));
        self.results.retain(|uid| !to_delete.contains(uid));
        if let Some(idx) = self.result_index {
            if idx >= self.results.len() {
                self.result_index = self.results.len().checked_sub(1);
            }
        }
        self.marker.retain(|uid| !to_delete.contains(&uid));
        self.threads.mark_deleted(&to_delete);
        self.dir_info.exists = self.dir_info.exists.saturating_sub(to_delete.len());
        self.dir_info.accurate_counts = false;
        self.reconcile_selection(old_index);
    }

    /// Keep the selection valid after the UID sequence changed: by UID if it
    /// survived, else by clamping its former index.
    fn reconcile_selection(&mut self, old_index: Option<usize>) {
        let Selection::Resolved(uid) = self.selected else {
            return;
        };
        let uids = self.uids();
        if uids.contains(&uid) {
            return;
        }
        let selected = match (uids.last(), old_index) {
            (None, _) => Selection::Unresolved,
            (Some(_), Some(idx)) => Selection::Resolved(uids[idx.min(uids.len() - 1)]),
            (Some(&last), None) => Selection::Resolved(last),
        };
        self.selected = selected;
    }

    fn notify_update(&mut self) {
        if let Some(mut cb) = self.on_update.take() {
            cb(&*self);
            // The callback may have installed a replacement.
            if self.on_update.is_none() {
                self.on_update = Some(cb);
            }
        }
    }

    fn notify_filter_change(&mut self) {
        if let Some(mut cb) = self.on_filter_change.take() {
            cb(&*self);
            if self.on_filter_change.is_none() {
                self.on_filter_change = Some(cb);
            }
        }
    }

    fn notify(&mut self, threads: bool) {
        self.notify_update();
        if let Some(cb) = self.on_update_dirs.as_mut() {
            cb();
        }
        if threads && self.build_threads && self.threaded_view {
            self.run_thread_builder();
        }
    }

    /* ---------------------------------------------------------------- */
    /* Timers                                                            */
    /* ---------------------------------------------------------------- */

    /// Run the work of a timer owned by this store. Returns `false` if the
    /// event is stale or belongs to another timer.
    pub fn handle_timer(&mut self, event: &TimerEvent) -> bool {
        if self.thread_debounce.claim(event) {
            log::debug!("[{}] running debounced thread rebuild", self.worker.name());
            self.run_thread_builder_now();
            true
        } else if self.flags_debounce.claim(event) {
            self.flush_flags_refetch();
            true
        } else {
            false
        }
    }

    fn fetch_flags(&mut self) {
        if self.flags_debounce.rearm() {
            log::trace!("[{}] flag refetch debounced", self.worker.name());
        }
    }

    fn flush_flags_refetch(&mut self) {
        let uids = mem::take(&mut self.needs_flags);
        if uids.is_empty() {
            return;
        }
        self.post(Action::FetchMessageFlags { uids }, Request::FetchFlags);
    }

    fn run_thread_builder(&mut self) {
        if self.thread_debounce.rearm() {
            log::debug!("[{}] thread rebuild debounced", self.worker.name());
        }
    }

    fn run_thread_builder_now(&mut self) {
        self.thread_debounce.disable();
        let old_index = self.selected_index();
        let threads = self.builder.build(&self.uids, &self.deleted);
        self.thread_uids = threads.uids();
        self.threads = threads;
        let reselect = self
            .reselect_index
            .take()
            .and_then(|idx| self.uids().get(idx).copied());
        match reselect {
            Some(uid) => self.selected = Selection::Resolved(uid),
            None => self.reconcile_selection(old_index),
        }
        self.notify_update();
    }

    /* ---------------------------------------------------------------- */
    /* Fetching                                                          */
    /* ---------------------------------------------------------------- */

    /// Fetch headers of the `uids` that are not being fetched already.
    pub fn fetch_headers(&mut self, uids: &[Uid], on_finish: Option<DoneCallback>) {
        let id = ActionId::new();
        let mut to_fetch = vec![];
        for &uid in uids {
            if let Entry::Vacant(entry) = self.pending_headers.entry(uid) {
                entry.insert(id);
                to_fetch.push(uid);
            }
        }
        if to_fetch.is_empty() {
            return;
        }
        self.post_as(
            id,
            Action::FetchMessageHeaders {
                uids: to_fetch.clone(),
            },
            Request::FetchHeaders {
                uids: to_fetch,
                on_finish,
            },
        );
    }

    /// Fetch message bodies; `cb` is called once per UID when its content
    /// arrives. Callers asking for a UID already in flight share the fetch.
    pub fn fetch_full(&mut self, uids: &[Uid], cb: impl Fn(&FullMessage) + 'static) {
        let cb: BodyCallback = Rc::new(cb);
        let id = ActionId::new();
        let mut seen = HashSet::with_capacity(uids.len());
        let mut to_fetch = vec![];
        for &uid in uids {
            if seen.insert(uid) && self.add_body_waiter(uid, Waiter::Callback(cb.clone()), id) {
                to_fetch.push(uid);
            }
        }
        self.post_full_fetch(id, to_fetch);
    }

    /// Fetch one message body, resolved through a channel. The receiver
    /// sees `Canceled` if the fetch fails.
    pub fn fetch_full_future(&mut self, uid: Uid) -> oneshot::Receiver<FullMessage> {
        let (tx, rx) = oneshot::channel();
        let id = ActionId::new();
        if self.add_body_waiter(uid, Waiter::Channel(tx), id) {
            self.post_full_fetch(id, vec![uid]);
        }
        rx
    }

    /// Returns `true` if `uid` needs a fetch, which `id` then owns, and
    /// `false` if one is in flight.
    fn add_body_waiter(&mut self, uid: Uid, waiter: Waiter, id: ActionId) -> bool {
        self.body_waiters.entry(uid).or_default().push(waiter);
        match self.pending_bodies.entry(uid) {
            Entry::Vacant(entry) => {
                entry.insert(id);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    fn post_full_fetch(&mut self, id: ActionId, to_fetch: Vec<Uid>) {
        if to_fetch.is_empty() {
            return;
        }
        self.post_as(
            id,
            Action::FetchFullMessages {
                uids: to_fetch.clone(),
            },
            Request::FetchFull { uids: to_fetch },
        );
    }

    /// Fetch one MIME part, `part` being the 1-based index path.
    pub fn fetch_body_part(
        &mut self,
        uid: Uid,
        part: Vec<usize>,
        cb: impl FnOnce(&BodyPart) + 'static,
    ) {
        self.post(
            Action::FetchMessageBodyPart { uid, part },
            Request::FetchBodyPart {
                on_part: Some(Box::new(cb)),
            },
        );
    }

    /* ---------------------------------------------------------------- */
    /* Mutations                                                         */
    /* ---------------------------------------------------------------- */

    pub fn delete(&mut self, uids: &[Uid], on_finish: Option<DoneCallback>) {
        self.deleted.extend(uids.iter().copied());
        self.notify(false);
        self.post(
            Action::DeleteMessages {
                uids: uids.to_vec(),
            },
            Request::Delete {
                uids: uids.to_vec(),
                on_finish,
            },
        );
    }

    fn revert_deleted(&mut self, uids: &[Uid]) {
        for uid in uids {
            self.deleted.remove(uid);
        }
        self.notify(false);
    }

    /// Create `destination` if missing; failures are not reported.
    fn create_directory_quietly(&mut self, destination: &str) {
        self.post(
            Action::CreateDirectory {
                directory: destination.to_string(),
                quiet: true,
            },
            Request::Generic {
                name: "create-directory",
                on_finish: None,
            },
        );
    }

    pub fn copy_messages(
        &mut self,
        uids: &[Uid],
        destination: &str,
        create_destination: bool,
        on_finish: Option<DoneCallback>,
    ) {
        if create_destination {
            self.create_directory_quietly(destination);
        }
        self.post(
            Action::CopyMessages {
                destination: destination.to_string(),
                uids: uids.to_vec(),
            },
            Request::Generic {
                name: "copy",
                on_finish,
            },
        );
    }

    pub fn move_messages(
        &mut self,
        uids: &[Uid],
        destination: &str,
        create_destination: bool,
        on_finish: Option<DoneCallback>,
    ) {
        self.deleted.extend(uids.iter().copied());
        self.notify(false);
        if create_destination {
            self.create_directory_quietly(destination);
        }
        self.post(
            Action::MoveMessages {
                destination: destination.to_string(),
                uids: uids.to_vec(),
            },
            Request::Move {
                uids: uids.to_vec(),
                on_finish,
            },
        );
    }

    pub fn flag(&mut self, uids: &[Uid], flag: Flag, enable: bool, on_finish: Option<DoneCallback>) {
        self.post(
            Action::FlagMessages {
                uids: uids.to_vec(),
                flag,
                enable,
            },
            Request::Generic {
                name: "set-flag",
                on_finish,
            },
        );
    }

    pub fn answered(&mut self, uids: &[Uid], answered: bool, on_finish: Option<DoneCallback>) {
        self.post(
            Action::AnsweredMessages {
                uids: uids.to_vec(),
                answered,
            },
            Request::Generic {
                name: "set-answered",
                on_finish,
            },
        );
    }

    pub fn modify_labels(
        &mut self,
        uids: &[Uid],
        add: &[String],
        remove: &[String],
        on_finish: Option<DoneCallback>,
    ) {
        self.post(
            Action::ModifyLabels {
                uids: uids.to_vec(),
                add: add.to_vec(),
                remove: remove.to_vec(),
            },
            Request::Generic {
                name: "modify-labels",
                on_finish,
            },
        );
    }

    /// Add the counts of `uids`, copied or moved here from `source`, to this
    /// directory. Counts stay accurate only if every summary was loaded.
    pub fn update_dir_counts(&mut self, source: &Self, uids: &[Uid]) {
        let mut recent = 0;
        let mut unseen = 0;
        let mut accurate = true;
        for uid in uids {
            match source.messages.get(uid) {
                Some(Some(summary)) => {
                    if summary.flags.contains(Flag::RECENT) {
                        recent += 1;
                    }
                    if !summary.is_seen() {
                        unseen += 1;
                    }
                }
                _ => {
                    accurate = false;
                    break;
                }
            }
        }
        self.dir_info.exists += uids.len();
        if accurate {
            self.dir_info.recent += recent;
            self.dir_info.unseen += unseen;
        } else {
            self.dir_info.accurate_counts = false;
        }
        if let Some(cb) = self.on_update_dirs.as_mut() {
            cb();
        }
    }

    /* ---------------------------------------------------------------- */
    /* Sorting, filtering and searching                                  */
    /* ---------------------------------------------------------------- */

    /// Ask the backend for the directory listing in `criteria` order.
    pub fn sort(&mut self, criteria: Vec<SortCriterion>, on_finish: Option<DoneCallback>) {
        self.sort_criteria = criteria;
        self.sorting = true;
        let sort = self.sort_criteria.clone();
        let filter = self.filter.clone();
        let action = if self.threaded_view && !self.build_threads {
            Action::FetchDirectoryThreaded { sort, filter }
        } else {
            Action::FetchDirectoryContents { sort, filter }
        };
        self.post(action, Request::Sort { on_finish });
    }

    /// Re-request the listing with the current criteria.
    pub fn resync(&mut self) {
        self.sort(self.sort_criteria.clone(), None);
    }

    pub fn set_filter(&mut self, terms: &[String]) {
        self.filter.extend(terms.iter().cloned());
    }

    pub fn apply_filter(&mut self, on_finish: Option<DoneCallback>) {
        self.notify_filter_change();
        self.sort(self.sort_criteria.clone(), on_finish);
    }

    pub fn apply_clear(&mut self) {
        self.filter.clear();
        self.results.clear();
        self.result_index = None;
        self.notify_filter_change();
        self.resync();
    }

    /// Search the directory; `cb` receives the matches present in the
    /// current UID sequence, in sequence order.
    pub fn search(&mut self, args: &[String], cb: impl FnOnce(Result<Vec<Uid>>) + 'static) {
        self.post(
            Action::SearchDirectory {
                argv: args.to_vec(),
            },
            Request::Search {
                on_results: Some(Box::new(cb)),
            },
        );
    }

    fn intersect(&self, found: &[Uid]) -> Vec<Uid> {
        let known: HashSet<Uid> = self.uids().iter().copied().collect();
        let mut ret: Vec<Uid> = found
            .iter()
            .copied()
            .filter(|uid| known.contains(uid))
            .collect::<HashSet<Uid>>()
            .into_iter()
            .collect();
        sort_by(&mut ret, self.uids());
        ret
    }

    /// Install `results`, keeping those in the UID sequence.
    pub fn apply_search(&mut self, results: Vec<Uid>) {
        self.results = self.intersect(&results);
        self.result_index = None;
        self.next_result();
    }

    /// Select the next (older) search result, wrapping around.
    pub fn next_result(&mut self) {
        self.next_prev_result(1);
    }

    pub fn prev_result(&mut self) {
        self.next_prev_result(-1);
    }

    fn next_prev_result(&mut self, delta: isize) {
        let len = self.results.len();
        if len == 0 {
            return;
        }
        let len = len as isize;
        let index = self.result_index.map_or(-1, |i| i as isize);
        let index = (index + delta).rem_euclid(len);
        self.result_index = Some(index as usize);
        let uid = self.results[(len - index - 1) as usize];
        self.select(uid);
        self.notify(false);
    }

    /* ---------------------------------------------------------------- */
    /* Selection and navigation                                          */
    /* ---------------------------------------------------------------- */

    pub fn selection(&self) -> Selection {
        self.selected
    }

    fn peek_selected_uid(&self) -> Option<Uid> {
        match self.selected {
            Selection::Resolved(uid) => Some(uid),
            Selection::Unresolved => self.uids().last().copied(),
        }
    }

    /// The selected UID; the first access to an unresolved selection settles
    /// on the newest message.
    pub fn selected_uid(&mut self) -> Option<Uid> {
        if self.selected == Selection::Unresolved {
            if let Some(&uid) = self.uids().last() {
                self.selected = Selection::Resolved(uid);
            }
        }
        self.peek_selected_uid()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.peek_selected_uid()
            .and_then(|uid| self.find_index_by_uid(uid))
    }

    pub fn selected(&self) -> Option<&MessageSummary> {
        self.peek_selected_uid().and_then(|uid| self.summary(uid))
    }

    /// Node of the selected message in [`MessageStore::threads`].
    pub fn selected_thread(&self) -> Option<usize> {
        self.peek_selected_uid()
            .and_then(|uid| self.threads.find(uid))
    }

    pub fn find_index_by_uid(&self, uid: Uid) -> Option<usize> {
        self.uids().iter().position(|&u| u == uid)
    }

    /// Select `uid`. Discards any selection deferred to the next thread
    /// rebuild.
    pub fn select(&mut self, uid: Uid) {
        self.reselect_index = None;
        self.selected = Selection::Resolved(uid);
        let uids = if self.threaded_view && self.build_threads {
            &self.thread_uids
        } else {
            &self.uids
        };
        self.marker.update_visual_mark(uids, uid);
    }

    /// Move down the display, towards older messages.
    pub fn next(&mut self) {
        self.next_prev(1);
    }

    /// Move up the display, towards newer messages.
    pub fn prev(&mut self) {
        self.next_prev(-1);
    }

    pub fn next_prev(&mut self, delta: isize) {
        let Some(uid) = self.selected_uid() else {
            return;
        };
        let len = self.uids().len() as isize;
        let Some(index) = self.find_index_by_uid(uid) else {
            if let Some(&last) = self.uids().last() {
                self.select(last);
            }
            return;
        };
        let new_index = (index as isize - delta).clamp(0, len - 1) as usize;
        let new_uid = self.uids()[new_index];
        self.select(new_uid);

        if self.build_threads && self.threaded_view {
            // A pending rebuild may reorder the sequence under the cursor.
            self.reselect_index = Some(new_index);
        }

        if let Some(result_index) = self.result_index {
            let results_len = self.results.len() as isize;
            let candidate = results_len - result_index as isize - 1 - delta;
            if (0..results_len).contains(&candidate) && self.results[candidate as usize] == new_uid
            {
                self.result_index = Some((result_index as isize + delta) as usize);
            }
        }
    }

    /// Switch between threaded and flat view.
    pub fn set_threaded_view(&mut self, thread: bool) {
        self.threaded_view = thread;
        if self.build_threads {
            if thread {
                self.run_thread_builder_now();
            } else {
                self.thread_debounce.disable();
                self.reselect_index = None;
                self.reconcile_selection(None);
                self.notify_update();
            }
            return;
        }
        self.resync();
    }
}
