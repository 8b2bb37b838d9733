/*
 * meli - msgstore
 *
 * Copyright 2020 Manos Pitsidianakis
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
 * The request/response protocol between a [`MessageStore`] and its backend
 * worker.
 *
 * A store posts [`Action`]s through a [`Worker`]. Each posted action gets an
 * [`ActionId`]. The backend answers with [`WorkerMessage`]s whose
 * `in_response_to` field names the action they belong to; a backend may also
 * send unsolicited messages (`in_response_to: None`), for example when new
 * mail arrives. Every action receives exactly one terminal response:
 * [`Response::Done`], [`Response::Error`] or [`Response::Unsupported`].
 *
 * Messages travel to the store's owning context as [`ThreadEvent`]s on a
 * `crossbeam` channel, together with timer events, so that all store state is
 * only ever touched from that context.
 *
 * [`MessageStore`]: crate::store::MessageStore
 */

use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::{
    email::{BodyPart, Flag, FullMessage, MessageSummary, Uid},
    error::{Error, Result},
    jobs::TimerEvent,
    sort::SortCriterion,
    thread::ThreadTree,
};

uuid_hash_type!(ActionId);

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Capabilities {
    /// Backend can sort directory listings.
    pub sort: bool,
    /// Backend can deliver threaded listings.
    pub thread: bool,
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DirectoryInfo {
    pub name: String,
    pub exists: usize,
    pub recent: usize,
    pub unseen: usize,
    /// `false` when `recent` and `unseen` are estimates that need a recount.
    pub accurate_counts: bool,
    pub caps: Capabilities,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    FetchDirectoryContents {
        sort: Vec<SortCriterion>,
        filter: Vec<String>,
    },
    FetchDirectoryThreaded {
        sort: Vec<SortCriterion>,
        filter: Vec<String>,
    },
    FetchMessageHeaders {
        uids: Vec<Uid>,
    },
    FetchFullMessages {
        uids: Vec<Uid>,
    },
    FetchMessageBodyPart {
        uid: Uid,
        part: Vec<usize>,
    },
    FetchMessageFlags {
        uids: Vec<Uid>,
    },
    DeleteMessages {
        uids: Vec<Uid>,
    },
    /// With `quiet`, an already existing directory is not an error.
    CreateDirectory {
        directory: String,
        quiet: bool,
    },
    CopyMessages {
        destination: String,
        uids: Vec<Uid>,
    },
    MoveMessages {
        destination: String,
        uids: Vec<Uid>,
    },
    FlagMessages {
        uids: Vec<Uid>,
        flag: Flag,
        enable: bool,
    },
    AnsweredMessages {
        uids: Vec<Uid>,
        answered: bool,
    },
    ModifyLabels {
        uids: Vec<Uid>,
        add: Vec<String>,
        remove: Vec<String>,
    },
    SearchDirectory {
        argv: Vec<String>,
    },
}

impl Action {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FetchDirectoryContents { .. } => "fetch-directory-contents",
            Self::FetchDirectoryThreaded { .. } => "fetch-directory-threaded",
            Self::FetchMessageHeaders { .. } => "fetch-headers",
            Self::FetchFullMessages { .. } => "fetch-full",
            Self::FetchMessageBodyPart { .. } => "fetch-body-part",
            Self::FetchMessageFlags { .. } => "fetch-flags",
            Self::DeleteMessages { .. } => "delete",
            Self::CreateDirectory { .. } => "create-directory",
            Self::CopyMessages { .. } => "copy",
            Self::MoveMessages { .. } => "move",
            Self::FlagMessages { .. } => "set-flag",
            Self::AnsweredMessages { .. } => "set-answered",
            Self::ModifyLabels { .. } => "modify-labels",
            Self::SearchDirectory { .. } => "search",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Response {
    Done,
    Error(Error),
    Unsupported,
    DirectoryInfo {
        info: DirectoryInfo,
        skip_sort: bool,
    },
    DirectoryContents {
        uids: Vec<Uid>,
    },
    DirectoryThreaded {
        threads: Vec<ThreadTree>,
    },
    MessageInfo {
        info: Box<MessageSummary>,
        /// The backend could not include flags; they must be fetched
        /// separately.
        needs_flags: bool,
    },
    FullMessage(FullMessage),
    MessageBodyPart(BodyPart),
    MessagesDeleted {
        uids: Vec<Uid>,
    },
    MessagesCopied {
        destination: String,
        uids: Vec<Uid>,
    },
    MessagesMoved {
        destination: String,
        uids: Vec<Uid>,
    },
    SearchResults {
        uids: Vec<Uid>,
    },
}

impl Response {
    /// Whether this response completes the action it answers.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_) | Self::Unsupported)
    }

    /// The outcome a terminal response reports, `None` for data responses.
    pub fn outcome(&self) -> Option<Result<()>> {
        match self {
            Self::Done => Some(Ok(())),
            Self::Error(err) => Some(Err(err.clone())),
            Self::Unsupported => Some(Err(Error::unsupported())),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkerMessage {
    pub in_response_to: Option<ActionId>,
    pub response: Response,
}

impl WorkerMessage {
    pub const fn unsolicited(response: Response) -> Self {
        Self {
            in_response_to: None,
            response,
        }
    }

    pub const fn reply(id: ActionId, response: Response) -> Self {
        Self {
            in_response_to: Some(id),
            response,
        }
    }
}

/// Events delivered to the context that owns a store.
#[derive(Clone, Debug)]
pub enum ThreadEvent {
    Worker(WorkerMessage),
    Timer(TimerEvent),
}

#[derive(Clone, Debug)]
pub struct WorkerRequest {
    pub id: ActionId,
    pub action: Action,
}

/// The store-side end of a worker channel.
#[derive(Clone, Debug)]
pub struct Worker {
    name: Arc<str>,
    actions: Sender<WorkerRequest>,
}

impl Worker {
    pub fn new(name: &str, actions: Sender<WorkerRequest>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand `action` to the backend under `id`, which its replies will
    /// carry. Never blocks; fails only if the backend thread has gone away.
    pub fn post_action(&self, id: ActionId, action: Action) -> Result<()> {
        log::trace!("[{}] posting {} {}", self.name, action.name(), id);
        self.actions.send(WorkerRequest { id, action })?;
        Ok(())
    }
}

/// The backend-side end of a worker channel.
#[derive(Clone, Debug)]
pub struct Responder {
    sender: Sender<ThreadEvent>,
}

impl Responder {
    pub fn new(sender: Sender<ThreadEvent>) -> Self {
        Self { sender }
    }

    pub fn respond(&self, id: ActionId, response: Response) -> Result<()> {
        self.sender
            .send(ThreadEvent::Worker(WorkerMessage::reply(id, response)))?;
        Ok(())
    }

    pub fn done(&self, id: ActionId) -> Result<()> {
        self.respond(id, Response::Done)
    }

    pub fn error(&self, id: ActionId, err: Error) -> Result<()> {
        self.respond(id, Response::Error(err))
    }

    pub fn unsupported(&self, id: ActionId) -> Result<()> {
        self.respond(id, Response::Unsupported)
    }

    pub fn notify(&self, response: Response) -> Result<()> {
        self.sender
            .send(ThreadEvent::Worker(WorkerMessage::unsolicited(response)))?;
        Ok(())
    }
}
