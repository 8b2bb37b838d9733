/*
 * meli - msgstore
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

//! Sort criteria sent to backends with directory listing requests.

use std::{collections::HashMap, fmt, str::FromStr};

use crate::{
    email::Uid,
    error::{Error, ErrorKind, Result},
};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SortField {
    Arrival,
    Cc,
    #[default]
    Date,
    From,
    Read,
    Size,
    Subject,
    To,
    Flagged,
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "arrival" => Ok(Self::Arrival),
            "cc" => Ok(Self::Cc),
            "date" | "d" => Ok(Self::Date),
            "from" => Ok(Self::From),
            "read" => Ok(Self::Read),
            "size" => Ok(Self::Size),
            "subject" | "s" | "sub" | "sbj" | "subj" => Ok(Self::Subject),
            "to" => Ok(Self::To),
            "flagged" => Ok(Self::Flagged),
            other => Err(Error::new(format!("Unknown sort field `{}`.", other))
                .set_kind(ErrorKind::Configuration)),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}",
            match self {
                Self::Arrival => "arrival",
                Self::Cc => "cc",
                Self::Date => "date",
                Self::From => "from",
                Self::Read => "read",
                Self::Size => "size",
                Self::Subject => "subject",
                Self::To => "to",
                Self::Flagged => "flagged",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SortCriterion {
    pub field: SortField,
    pub reverse: bool,
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.reverse {
            write!(fmt, "-r {}", self.field)
        } else {
            write!(fmt, "{}", self.field)
        }
    }
}

/// Parse criteria such as `"-r date from"`, where `-r` reverses the field
/// that follows it.
pub fn parse_sort_criteria(s: &str) -> Result<Vec<SortCriterion>> {
    let mut ret = vec![];
    let mut reverse = false;
    for token in s.split_whitespace() {
        if token == "-r" {
            if reverse {
                return Err(Error::new(format!("Duplicate `-r` in sort criteria `{}`.", s))
                    .set_kind(ErrorKind::Configuration));
            }
            reverse = true;
            continue;
        }
        ret.push(SortCriterion {
            field: token.parse()?,
            reverse,
        });
        reverse = false;
    }
    if reverse {
        return Err(
            Error::new(format!("Sort criteria `{}` end with a dangling `-r`.", s))
                .set_kind(ErrorKind::Configuration),
        );
    }
    Ok(ret)
}

/// Reorder `uids` to follow their relative order in `by`. UIDs missing from
/// `by` are moved to the end, keeping their order.
pub fn sort_by(uids: &mut [Uid], by: &[Uid]) {
    let positions = by
        .iter()
        .enumerate()
        .map(|(i, uid)| (*uid, i))
        .collect::<HashMap<Uid, usize>>();
    uids.sort_by_key(|uid| positions.get(uid).copied().unwrap_or(usize::MAX));
}
