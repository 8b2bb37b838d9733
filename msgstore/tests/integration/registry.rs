//
// msgstore - backend registry tests
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

use std::sync::{atomic::AtomicBool, Arc};

use crossbeam::channel::unbounded;
use msgstore::{AccountSettings, BackendRegistry, ErrorKind};

use crate::mock::MockBackend;

#[test]
fn test_registry_register_and_lookup() {
    let mut registry = BackendRegistry::new();
    assert!(!registry.contains(MockBackend::FORMAT));
    registry
        .register(
            MockBackend::FORMAT,
            MockBackend::entry(Arc::new(AtomicBool::new(false))),
        )
        .unwrap();
    assert!(registry.contains(MockBackend::FORMAT));
    let err = registry
        .register(
            MockBackend::FORMAT,
            MockBackend::entry(Arc::new(AtomicBool::new(false))),
        )
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);

    let (tx, _rx) = unbounded();
    let err = registry
        .spawn(&AccountSettings::new("personal", "imap"), tx.clone())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let mut settings: AccountSettings = toml::from_str(
        r#"
name = "personal"
format = "mock"
messages = "many"
"#,
    )
    .unwrap();
    let err = registry.spawn(&settings, tx.clone()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);

    settings.extra.insert("messages".to_string(), "3".to_string());
    let worker = registry.spawn(&settings, tx).unwrap();
    assert_eq!(worker.name(), "personal");
}
