//! Shared services used across clients.

mod store;

pub use store::{ChangeKind, GuardedWrite, LocalStore, Table, TableChange};
