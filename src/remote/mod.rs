//! The authoritative user store: identities and profile records.

mod api_types;
pub mod firebase;
#[cfg(test)]
pub mod mock;
mod store;
mod types;

pub use firebase::FirebaseUserStore;
pub use store::{AuthError, RemoteUserStore};
#[cfg(test)]
pub use store::StoreError;
pub use types::{RecordKey, User};
