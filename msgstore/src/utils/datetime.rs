/*
 * meli - msgstore
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

//! Unix timestamps.

use chrono::{DateTime, Utc};

pub type UnixTimestamp = u64;

/// Current time as seconds since the UNIX epoch. Clocks set before the epoch
/// yield `0`.
pub fn now() -> UnixTimestamp {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn timestamp_to_string_utc(timestamp: UnixTimestamp) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
