/*
 * meli - msgstore - backends module
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

//! Backend registry and the per-account worker thread.
//!
//! A [`BackendRegistry`] is built once at startup and passed to whatever
//! constructs accounts. [`BackendRegistry::spawn`] creates a backend
//! instance for an account and runs it on its own named thread, returning
//! the [`Worker`] handle a [`MessageStore`](crate::store::MessageStore)
//! posts actions through.

use std::{collections::HashMap, thread};

use crossbeam::channel::{unbounded, Sender};

use crate::{
    conf::AccountSettings,
    error::{Error, ErrorKind, Result, ResultIntoError},
    worker::{Action, ActionId, Responder, ThreadEvent, Worker, WorkerRequest},
};

/// A mail backend.
///
/// Implementations run on their worker thread and must answer every action
/// with exactly one terminal response ([`Responder::done`],
/// [`Responder::error`] or [`Responder::unsupported`]), optionally preceded
/// by data responses.
pub trait Backend: Send {
    fn handle_action(&mut self, id: ActionId, action: Action, responder: &Responder);

    /// Called once after the store side hangs up, before the worker thread
    /// exits.
    fn shutdown(&mut self) {}
}

pub type BackendCreator = Box<dyn Fn(&AccountSettings) -> Result<Box<dyn Backend>> + Send + Sync>;

pub struct BackendEntry {
    pub create_fn: BackendCreator,
    pub validate_conf_fn: Box<dyn Fn(&AccountSettings) -> Result<()> + Send + Sync>,
}

impl BackendEntry {
    pub fn new(create_fn: BackendCreator) -> Self {
        Self {
            create_fn,
            validate_conf_fn: Box::new(|_| Ok(())),
        }
    }
}

impl std::fmt::Debug for BackendEntry {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct(stringify!(BackendEntry)).finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct BackendRegistry {
    map: HashMap<String, BackendEntry>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: &str, backend: BackendEntry) -> Result<()> {
        if self.map.contains_key(key) {
            return Err(Error::new(format!("{} is an already registered backend", key))
                .set_kind(ErrorKind::Configuration));
        }
        self.map.insert(key.to_string(), backend);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn get(&self, key: &str) -> Result<&BackendEntry> {
        self.map.get(key).ok_or_else(|| {
            Error::new(format!("{} is not a valid mail backend", key))
                .set_kind(ErrorKind::NotFound)
        })
    }

    pub fn validate_config(&self, settings: &AccountSettings) -> Result<()> {
        settings.validate()?;
        (self.get(&settings.format)?.validate_conf_fn)(settings)
    }

    /// Create the backend for `settings` and start its worker thread.
    ///
    /// Responses are sent as [`ThreadEvent::Worker`] on `sender`. The thread
    /// exits when the returned [`Worker`] and all its clones are dropped.
    pub fn spawn(&self, settings: &AccountSettings, sender: Sender<ThreadEvent>) -> Result<Worker> {
        self.validate_config(settings)?;
        let mut backend = (self.get(&settings.format)?.create_fn)(settings)
            .chain_err_summary(|| format!("Could not create backend for `{}`", settings.name))?;
        let (tx, rx) = unbounded::<WorkerRequest>();
        let responder = Responder::new(sender);
        let thread_name = format!("{}-worker", settings.name);
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                for WorkerRequest { id, action } in rx.iter() {
                    log::trace!("{} handling {} {}", thread_name, action.name(), id);
                    backend.handle_action(id, action, &responder);
                }
                backend.shutdown();
                log::trace!("{} exiting", thread_name);
            })
            .chain_err_summary(|| format!("Could not start worker for `{}`", settings.name))?;
        Ok(Worker::new(&settings.name, tx))
    }
}
