/*
 * meli - msgstore email module
 *
 * Copyright 2017 Manos Pitsidianakis
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
 * Message metadata as the store caches it.
 *
 * A [`MessageSummary`] is what a backend delivers for a message in
 * response to a header fetch: an optional [`Envelope`], an optional
 * [`BodyStructure`], the message's [`Flag`]s and labels. Backends may
 * deliver a summary in several pieces (for example headers first, flags
 * later), so summaries are combined with [`MessageSummary::merge`] which never
 * erases data it already knows.
 */

use std::{io::Cursor, sync::Arc};

use smallvec::SmallVec;

use crate::utils::datetime::UnixTimestamp;

/// Backend-scoped message identifier, unique within a directory snapshot.
pub type Uid = u32;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
    pub struct Flag: u8 {
        const SEEN      = 0b0000_0001;
        const RECENT    = 0b0000_0010;
        const ANSWERED  = 0b0000_0100;
        const FLAGGED   = 0b0000_1000;
        const DELETED   = 0b0001_0000;
        const DRAFT     = 0b0010_0000;
        const FORWARDED = 0b0100_0000;
    }
}

impl PartialEq<&str> for Flag {
    fn eq(&self, other: &&str) -> bool {
        (other.eq_ignore_ascii_case("seen") && self.contains(Self::SEEN))
            || (other.eq_ignore_ascii_case("recent") && self.contains(Self::RECENT))
            || (other.eq_ignore_ascii_case("answered") && self.contains(Self::ANSWERED))
            || (other.eq_ignore_ascii_case("flagged") && self.contains(Self::FLAGGED))
            || (other.eq_ignore_ascii_case("deleted") && self.contains(Self::DELETED))
            || (other.eq_ignore_ascii_case("draft") && self.contains(Self::DRAFT))
            || (other.eq_ignore_ascii_case("forwarded") && self.contains(Self::FORWARDED))
    }
}

impl std::str::FromStr for Flag {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Ok(match s.trim() {
            s if s.eq_ignore_ascii_case("seen") => Self::SEEN,
            s if s.eq_ignore_ascii_case("recent") => Self::RECENT,
            s if s.eq_ignore_ascii_case("answered") => Self::ANSWERED,
            s if s.eq_ignore_ascii_case("flagged") => Self::FLAGGED,
            s if s.eq_ignore_ascii_case("deleted") => Self::DELETED,
            s if s.eq_ignore_ascii_case("draft") => Self::DRAFT,
            s if s.eq_ignore_ascii_case("forwarded") => Self::FORWARDED,
            other => {
                return Err(crate::error::Error::new(format!("Unknown flag `{}`.", other))
                    .set_kind(crate::error::ErrorKind::NotFound))
            }
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Address {
    pub name: Option<String>,
    pub email: String,
}

impl Address {
    pub fn new(name: Option<&str>, email: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            email: email.to_string(),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => write!(fmt, "{} <{}>", name, self.email),
            _ => write!(fmt, "{}", self.email),
        }
    }
}

/// Parsed header summary.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Envelope {
    pub date: UnixTimestamp,
    pub subject: String,
    pub from: SmallVec<[Address; 1]>,
    pub to: SmallVec<[Address; 1]>,
    pub cc: SmallVec<[Address; 1]>,
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

impl Envelope {
    /// Message ids this message replies to, closest ancestor first.
    pub fn parent_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.in_reply_to
            .as_deref()
            .into_iter()
            .chain(self.references.iter().rev().map(String::as_str))
            .filter(|id| !id.is_empty())
    }
}

/// MIME structure of a message, without content.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BodyStructure {
    pub mime_type: String,
    pub mime_subtype: String,
    pub params: Vec<(String, String)>,
    pub description: Option<String>,
    pub encoding: Option<String>,
    pub size: usize,
    pub parts: Vec<BodyStructure>,
}

impl BodyStructure {
    /// Look up a part by its index path: `[]` is the message itself, `[1]`
    /// the first child, `[1, 2]` the second child of the first child.
    pub fn part_at(&self, path: &[usize]) -> Option<&Self> {
        match path.split_first() {
            None => Some(self),
            Some((&idx, rest)) => idx
                .checked_sub(1)
                .and_then(|i| self.parts.get(i))
                .and_then(|p| p.part_at(rest)),
        }
    }

    pub fn full_mime_type(&self) -> String {
        format!(
            "{}/{}",
            self.mime_type.to_ascii_lowercase(),
            self.mime_subtype.to_ascii_lowercase()
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MessageSummary {
    pub uid: Uid,
    pub envelope: Option<Envelope>,
    pub body_structure: Option<BodyStructure>,
    pub flags: Flag,
    pub labels: Vec<String>,
    pub size: usize,
    /// `0` when the backend did not report it.
    pub internal_date: UnixTimestamp,
}

impl MessageSummary {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }

    /// Combine `from` into `self` without erasing known data: envelope, body
    /// structure, size and internal date are only replaced by non-empty
    /// values. Flags and labels are snapshots of backend state and are always
    /// taken from `from`.
    pub fn merge(&mut self, from: &Self) {
        if let Some(body_structure) = from.body_structure.as_ref() {
            self.body_structure = Some(body_structure.clone());
        }
        if let Some(envelope) = from.envelope.as_ref() {
            self.envelope = Some(envelope.clone());
        }
        self.flags = from.flags;
        self.labels.clone_from(&from.labels);
        if from.size != 0 {
            self.size = from.size;
        }
        if from.internal_date != 0 {
            self.internal_date = from.internal_date;
        }
    }

    pub fn is_seen(&self) -> bool {
        self.flags.contains(Flag::SEEN)
    }

    /// New mail is recent and not yet seen.
    pub fn is_new(&self) -> bool {
        self.flags.contains(Flag::RECENT) && !self.flags.contains(Flag::SEEN)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.envelope
            .as_ref()
            .map(|e| e.message_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn subject(&self) -> &str {
        self.envelope
            .as_ref()
            .map(|e| e.subject.as_str())
            .unwrap_or_default()
    }

    pub fn date(&self) -> UnixTimestamp {
        match self.envelope.as_ref() {
            Some(e) if e.date != 0 => e.date,
            _ => self.internal_date,
        }
    }
}

/// Full content of a message, shared by every waiter of a fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FullMessage {
    pub uid: Uid,
    pub content: Arc<Vec<u8>>,
}

impl FullMessage {
    pub fn new(uid: Uid, content: Vec<u8>) -> Self {
        Self {
            uid,
            content: Arc::new(content),
        }
    }

    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.content.as_slice())
    }
}

/// Decoded content of one MIME part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyPart {
    pub uid: Uid,
    pub part: Vec<usize>,
    pub content: Arc<Vec<u8>>,
}

impl BodyPart {
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.content.as_slice())
    }
}
