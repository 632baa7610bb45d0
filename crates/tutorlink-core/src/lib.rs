//! Core library for tutorlink.
//!
//! The authenticated API-access layer of the tutoring marketplace:
//!
//! - [`auth`]: the credential store and its durable backends
//! - [`api`]: the authenticated request gateway and the typed auth client
//! - [`models`]: users, profiles and auth payloads
//! - [`config`]: on-disk configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use reqwest::Method;

pub use api::{ApiClient, ApiError, ApiRequest, Gateway, GatewayOptions, RefreshError, SessionEvent};
pub use auth::{Credential, CredentialStorage, CredentialStore};
pub use config::{Config, StorageBackend};
