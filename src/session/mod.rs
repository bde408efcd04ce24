//! Local, durable projection of the signed-in user.
//!
//! The remote store stays authoritative; this cache only lets screens show
//! something immediately and keeps the login flag across restarts.

mod storage;
mod traits;

pub use storage::{MemorySessionCache, SqliteSessionCache};
pub use traits::{SessionCache, SessionKey, SessionSnapshot};
