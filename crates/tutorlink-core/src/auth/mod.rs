//! Authentication state for the signed-in principal.
//!
//! This module provides:
//! - `Credential`: The user profile snapshot plus the access/refresh token pair
//! - `CredentialStore`: The shared, write-through holder of the current `Credential`
//! - `CredentialStorage`: Durable backends (file, OS keychain, memory)
//!
//! Every store mutation is mirrored to the configured backend, so a restart
//! restores the last known session without a network round trip.

pub mod credential;
pub mod storage;
pub mod store;

pub use credential::{Credential, PersistedCredential, PERSIST_VERSION};
pub use storage::{CredentialStorage, FileStorage, KeyringStorage, MemoryStorage, STORAGE_KEY};
pub use store::CredentialStore;
