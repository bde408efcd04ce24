//! Session and profile synchronization between the local cache and the remote store.

mod controller;
mod error;
mod load;

pub use controller::{ProfileUpdate, SyncController};
pub use error::{SyncError, SyncResult};
pub use load::ProfileSource;
