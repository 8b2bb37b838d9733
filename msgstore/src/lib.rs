/*
 * meli - msgstore library
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

#![deny(
    unsafe_op_in_unsafe_fn,
    /* groups */
    clippy::correctness,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::style,
    /* restriction */
    clippy::dbg_macro,
    clippy::rc_buffer,
    clippy::as_underscore,
    /* rustdoc */
    rustdoc::broken_intra_doc_links,
    /* pedantic */
    clippy::doc_markdown,
    clippy::expect_fun_call,
    clippy::or_fun_call,
)]
#![allow(
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::significant_drop_tightening,
    clippy::multiple_crate_versions,
    clippy::type_complexity,
    clippy::len_without_is_empty,
    clippy::should_implement_trait
)]
#![doc = include_str!("../README.md")]
//!
//! ## Description
//!
//! - The [`MessageStore`] of a directory (see module [`store`])
//! - The action/response protocol spoken with backend workers (see module
//!   [`worker`]) and the [`Backend`] trait with its registry (see module
//!   [`backends`])
//! - Client side threading through `In-Reply-To` and `References` (see
//!   module [`thread`])
//! - Debouncing timers (see module [`jobs`])

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate bitflags;
pub extern crate crossbeam;
pub extern crate futures;
pub extern crate indexmap;
pub extern crate log;
pub extern crate smallvec;
pub extern crate smol;
pub extern crate uuid;

macro_rules! uuid_hash_type {
    ($n:ident) => {
        #[derive(PartialEq, Hash, Eq, Copy, Clone, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $n(uuid::Uuid);

        impl std::fmt::Debug for $n {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::fmt::Display for $n {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $n {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $n {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            pub fn null() -> Self {
                Self(uuid::Uuid::nil())
            }
        }
    };
}

pub mod utils;
pub use utils::{
    datetime::UnixTimestamp,
    logging::{LogLevel, StderrLogger},
};

pub mod error;
pub use error::*;
pub mod email;
pub use email::*;
pub mod sort;
pub use sort::*;
pub mod conf;
pub use conf::*;
pub mod jobs;
pub use jobs::*;
pub mod worker;
pub use worker::*;
pub mod backends;
pub use backends::*;
pub mod thread;
pub use thread::*;
pub mod marker;
pub use marker::*;
pub mod store;
pub use store::*;
