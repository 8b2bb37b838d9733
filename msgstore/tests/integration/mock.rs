//
// msgstore - mock backend
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

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use indexmap::IndexMap;
use msgstore::{
    AccountSettings, Action, ActionId, Backend, BackendCreator, BackendEntry, Envelope, Error,
    ErrorKind, Flag, FullMessage, MessageSummary, Responder, Response, Result, Uid,
};

#[derive(Clone, Debug)]
struct MockMessage {
    summary: MessageSummary,
    body: Vec<u8>,
}

/// An in-memory directory. Even UIDs reply to the UID before them.
pub struct MockBackend {
    messages: IndexMap<Uid, MockMessage>,
    shut_down: Arc<AtomicBool>,
}

impl MockBackend {
    pub const FORMAT: &'static str = "mock";

    pub fn new(settings: &AccountSettings, shut_down: Arc<AtomicBool>) -> Result<Self> {
        let count: Uid = settings
            .extra
            .get("messages")
            .map(|c| c.parse::<Uid>().map_err(|err| Error::new(err.to_string())))
            .transpose()?
            .unwrap_or(5);
        let messages = (1..=count)
            .map(|uid| {
                let mut summary = MessageSummary::new(uid);
                summary.envelope = Some(Envelope {
                    date: 1_700_000_000 + u64::from(uid) * 60,
                    subject: format!("message {}", uid),
                    message_id: format!("{}@mock", uid),
                    in_reply_to: (uid % 2 == 0).then(|| format!("{}@mock", uid - 1)),
                    ..Envelope::default()
                });
                summary.flags = if uid <= 2 { Flag::SEEN } else { Flag::RECENT };
                summary.size = 100 + uid as usize;
                let body = format!("Subject: message {}\r\n\r\nbody {}", uid, uid).into_bytes();
                (uid, MockMessage { summary, body })
            })
            .collect();
        Ok(Self {
            messages,
            shut_down,
        })
    }

    pub fn validate_config(settings: &AccountSettings) -> Result<()> {
        if let Some(count) = settings.extra.get("messages") {
            count.parse::<Uid>().map_err(|err| {
                Error::new(format!("Invalid `messages` value `{}`: {}", count, err))
                    .set_kind(ErrorKind::Configuration)
            })?;
        }
        Ok(())
    }

    pub fn entry(shut_down: Arc<AtomicBool>) -> BackendEntry {
        let create_fn: BackendCreator = Box::new(move |settings| {
            Ok(Box::new(Self::new(settings, shut_down.clone())?) as Box<dyn Backend>)
        });
        BackendEntry {
            create_fn,
            validate_conf_fn: Box::new(Self::validate_config),
        }
    }

    fn process(&mut self, id: ActionId, action: Action, responder: &Responder) -> Result<()> {
        match action {
            Action::FetchDirectoryContents { filter, .. } => {
                let unseen_only = filter.iter().any(|f| f == "-u");
                let uids = self
                    .messages
                    .values()
                    .filter(|m| !unseen_only || !m.summary.is_seen())
                    .map(|m| m.summary.uid)
                    .collect();
                responder.respond(id, Response::DirectoryContents { uids })?;
            }
            Action::FetchMessageHeaders { uids } => {
                for uid in uids {
                    if let Some(m) = self.messages.get(&uid) {
                        responder.respond(
                            id,
                            Response::MessageInfo {
                                info: Box::new(m.summary.clone()),
                                needs_flags: false,
                            },
                        )?;
                    }
                }
            }
            Action::FetchFullMessages { uids } => {
                for uid in uids {
                    if let Some(m) = self.messages.get(&uid) {
                        responder
                            .respond(id, Response::FullMessage(FullMessage::new(uid, m.body.clone())))?;
                    }
                }
            }
            Action::DeleteMessages { uids } => {
                if let Some(missing) = uids.iter().find(|uid| !self.messages.contains_key(*uid)) {
                    return Err(Error::new(format!("No message with UID {}", missing))
                        .set_kind(ErrorKind::NotFound));
                }
                for uid in uids.iter() {
                    self.messages.shift_remove(uid);
                }
                responder.respond(id, Response::MessagesDeleted { uids })?;
            }
            Action::FlagMessages { uids, flag, enable } => {
                for uid in uids {
                    if let Some(m) = self.messages.get_mut(&uid) {
                        m.summary.flags.set(flag, enable);
                        let mut info = MessageSummary::new(uid);
                        info.flags = m.summary.flags;
                        info.labels = m.summary.labels.clone();
                        responder.respond(
                            id,
                            Response::MessageInfo {
                                info: Box::new(info),
                                needs_flags: false,
                            },
                        )?;
                    }
                }
            }
            Action::SearchDirectory { argv } => {
                let needle = argv.join(" ");
                let uids = self
                    .messages
                    .values()
                    .filter(|m| m.summary.subject().contains(&needle))
                    .map(|m| m.summary.uid)
                    .collect();
                responder.respond(id, Response::SearchResults { uids })?;
            }
            _ => {
                responder.unsupported(id)?;
                return Ok(());
            }
        }
        responder.done(id)
    }
}

impl Backend for MockBackend {
    fn handle_action(&mut self, id: ActionId, action: Action, responder: &Responder) {
        if let Err(err) = self.process(id, action, responder) {
            _ = responder.error(id, err);
        }
    }

    fn shutdown(&mut self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
