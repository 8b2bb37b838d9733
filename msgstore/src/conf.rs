/*
 * meli - msgstore - configuration module
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

//! Account and store settings.
//!
//! Loading configuration files is left to the application; these structs
//! deserialize from any `serde` format.

use std::{collections::HashMap, time::Duration};

use crate::{
    error::{Error, ErrorKind, Result, ResultIntoError},
    sort::{parse_sort_criteria, SortCriterion},
};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AccountSettings {
    pub name: String,
    /// Backend scheme, the key the backend was registered with in
    /// [`BackendRegistry`](crate::backends::BackendRegistry).
    pub format: String,
    #[serde(default)]
    pub root_mailbox: String,
    #[serde(default)]
    pub store: StoreConf,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl AccountSettings {
    pub fn new(name: &str, format: &str) -> Self {
        Self {
            name: name.to_string(),
            format: format.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::new("Account name cannot be empty.").set_kind(ErrorKind::Configuration));
        }
        if self.format.trim().is_empty() {
            return Err(Error::new(format!(
                "Account `{}` has no backend format configured.",
                self.name
            ))
            .set_kind(ErrorKind::Configuration));
        }
        self.store
            .validate()
            .chain_err_summary(|| format!("Invalid store settings for account `{}`", self.name))
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConf {
    /// Start directories in threaded view.
    pub threading_enabled: bool,
    /// Build threads locally even if the backend can thread.
    pub force_client_threads: bool,
    /// Debounce delay for client thread rebuilds, in milliseconds.
    pub client_threads_delay: u64,
    /// Debounce delay for batching flag refetches, in milliseconds.
    pub flags_refetch_delay: u64,
    pub reverse_thread_order: bool,
    pub sort_thread_siblings: bool,
    /// Default sort criteria, e.g. `"-r date"`.
    pub sort: String,
}

impl Default for StoreConf {
    fn default() -> Self {
        Self {
            threading_enabled: false,
            force_client_threads: false,
            client_threads_delay: 50,
            flags_refetch_delay: 50,
            reverse_thread_order: false,
            sort_thread_siblings: false,
            sort: String::new(),
        }
    }
}

impl StoreConf {
    pub fn client_threads_delay(&self) -> Duration {
        Duration::from_millis(self.client_threads_delay)
    }

    pub fn flags_refetch_delay(&self) -> Duration {
        Duration::from_millis(self.flags_refetch_delay)
    }

    pub fn sort_criteria(&self) -> Result<Vec<SortCriterion>> {
        parse_sort_criteria(&self.sort)
    }

    pub fn validate(&self) -> Result<()> {
        self.sort_criteria().map(|_| ())
    }
}
