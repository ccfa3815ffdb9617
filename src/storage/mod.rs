// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable local store: engine trait, SQLite and in-memory engines, and the
//! expiry-aware [`LocalStore`] every other component talks to.

pub mod traits;
pub mod sql;
pub mod memory;
pub mod local;

pub use traits::{Collection, DurableStore, StorageError, StoredItem};
pub use sql::SqlStore;
pub use memory::InMemoryStore;
pub use local::LocalStore;
