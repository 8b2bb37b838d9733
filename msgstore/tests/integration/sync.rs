//
// msgstore - synchronization tests
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

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam::channel::{unbounded, Receiver};
use msgstore::{
    AccountSettings, BackendRegistry, DirectoryInfo, DoneCallback, Flag, MessageStore, Result,
    StoreConf, ThreadEvent, Uid,
};

use crate::{drain, mock::MockBackend, pump};

struct Account {
    store: MessageStore,
    events: Receiver<ThreadEvent>,
    shut_down: Arc<AtomicBool>,
}

fn account(conf: StoreConf) -> Account {
    let shut_down = Arc::new(AtomicBool::new(false));
    let mut registry = BackendRegistry::new();
    registry
        .register(MockBackend::FORMAT, MockBackend::entry(shut_down.clone()))
        .unwrap();
    let mut settings = AccountSettings::new("personal", MockBackend::FORMAT);
    settings.store = conf;
    let (tx, events) = unbounded();
    let worker = registry.spawn(&settings, tx.clone()).unwrap();
    let dir_info = DirectoryInfo {
        name: "INBOX".to_string(),
        exists: 5,
        ..DirectoryInfo::default()
    };
    let store = MessageStore::new(worker, dir_info, settings.store.clone(), tx).unwrap();
    Account {
        store,
        events,
        shut_down,
    }
}

fn load(account: &mut Account) {
    account.store.resync();
    pump(&mut account.store, &account.events, |s| !s.is_sorting());
    let uids = account.store.uids().to_vec();
    account.store.fetch_headers(&uids, None);
    pump(&mut account.store, &account.events, |s| {
        s.uids().iter().all(|&uid| s.summary(uid).is_some())
    });
}

#[test]
fn test_sync_listing_and_headers() {
    let mut account = account(StoreConf::default());
    load(&mut account);
    let store = &mut account.store;
    assert_eq!(store.uids(), &[1, 2, 3, 4, 5]);
    assert_eq!(store.summary(4).map(|s| s.subject()), Some("message 4"));
    assert_eq!(store.selected_uid(), Some(5));
    assert_eq!(store.in_flight(), 0);
    assert!(!store.is_header_pending(1));
}

#[test]
fn test_sync_client_threads() {
    let mut account = account(StoreConf {
        threading_enabled: true,
        client_threads_delay: 10,
        ..StoreConf::default()
    });
    load(&mut account);
    drain(&mut account.store, &account.events);
    let store = &account.store;
    // 1 <- 2, 3 <- 4, 5
    assert_eq!(store.threads().roots().len(), 3);
    assert_eq!(store.uids(), &[2, 1, 4, 3, 5]);
}

#[test]
fn test_sync_fetch_bodies() {
    let mut account = account(StoreConf::default());
    load(&mut account);
    let bodies = Rc::new(RefCell::new(vec![]));
    {
        let bodies = bodies.clone();
        account.store.fetch_full(&[3, 4], move |msg| {
            bodies
                .borrow_mut()
                .push((msg.uid, String::from_utf8_lossy(&msg.content).to_string()))
        });
    }
    let mut rx = account.store.fetch_full_future(4);
    pump(&mut account.store, &account.events, |s| {
        !s.is_body_pending(3) && !s.is_body_pending(4)
    });
    assert_eq!(
        *bodies.borrow(),
        vec![
            (3, "Subject: message 3\r\n\r\nbody 3".to_string()),
            (4, "Subject: message 4\r\n\r\nbody 4".to_string()),
        ]
    );
    let msg = rx.try_recv().unwrap().unwrap();
    assert_eq!(msg.uid, 4);
}

#[test]
fn test_sync_delete_and_flag() {
    let mut account = account(StoreConf::default());
    load(&mut account);
    let results: Rc<RefCell<Vec<Result<()>>>> = Rc::new(RefCell::new(vec![]));

    let cb: DoneCallback = {
        let results = results.clone();
        Box::new(move |r: Result<()>| results.borrow_mut().push(r))
    };
    account.store.delete(&[3], Some(cb));
    pump(&mut account.store, &account.events, |_| results.borrow().len() == 1);
    assert!(results.borrow()[0].is_ok());
    assert_eq!(account.store.uids(), &[1, 2, 4, 5]);
    assert!(!account.store.is_deleted(3));
    assert_eq!(account.store.dir_info().exists, 4);

    // The backend no longer has 3: the deletion is rolled back.
    let cb: DoneCallback = {
        let results = results.clone();
        Box::new(move |r: Result<()>| results.borrow_mut().push(r))
    };
    account.store.delete(&[3, 4], Some(cb));
    assert!(account.store.is_deleted(4));
    pump(&mut account.store, &account.events, |_| results.borrow().len() == 2);
    assert!(results.borrow()[1].is_err());
    assert!(!account.store.is_deleted(4));
    assert_eq!(account.store.uids(), &[1, 2, 4, 5]);

    account.store.flag(&[5], Flag::SEEN, true, None);
    pump(&mut account.store, &account.events, |s| {
        s.summary(5).map_or(false, |m| m.is_seen())
    });
    // Flag updates keep the headers.
    assert_eq!(account.store.summary(5).map(|s| s.subject()), Some("message 5"));
    assert!(account.store.summary(5).unwrap().flags.contains(Flag::RECENT));
}

#[test]
fn test_sync_search_and_filter() {
    let mut account = account(StoreConf::default());
    load(&mut account);
    let found: Rc<RefCell<Option<Vec<Uid>>>> = Rc::new(RefCell::new(None));
    {
        let found = found.clone();
        account
            .store
            .search(&["message".to_string()], move |r| *found.borrow_mut() = r.ok());
    }
    pump(&mut account.store, &account.events, |_| found.borrow().is_some());
    assert_eq!(found.borrow().as_deref(), Some(&[1, 2, 3, 4, 5][..]));

    account.store.set_filter(&["-u".to_string()]);
    account.store.apply_filter(None);
    pump(&mut account.store, &account.events, |s| !s.is_sorting());
    assert_eq!(account.store.uids(), &[3, 4, 5]);

    account.store.apply_clear();
    pump(&mut account.store, &account.events, |s| !s.is_sorting());
    assert_eq!(account.store.uids(), &[1, 2, 3, 4, 5]);
}

#[test]
fn test_sync_unsupported_action() {
    let mut account = account(StoreConf::default());
    load(&mut account);
    let result: Rc<RefCell<Option<Result<()>>>> = Rc::new(RefCell::new(None));
    {
        let result = result.clone();
        account.store.move_messages(
            &[1],
            "Archive",
            true,
            Some(Box::new(move |r: Result<()>| *result.borrow_mut() = Some(r))),
        );
    }
    assert!(account.store.is_deleted(1));
    pump(&mut account.store, &account.events, |_| result.borrow().is_some());
    let err = result.borrow_mut().take().unwrap().unwrap_err();
    assert!(err.kind.is_not_supported());
    assert!(!account.store.is_deleted(1));
    assert_eq!(account.store.in_flight(), 0);
}

#[test]
fn test_sync_worker_exits_with_store() {
    let mut account = account(StoreConf::default());
    load(&mut account);
    let Account {
        store, shut_down, ..
    } = account;
    drop(store);
    for _ in 0..100 {
        if shut_down.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("worker thread did not exit");
}
