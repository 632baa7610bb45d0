//! REST API access for the tutoring marketplace backend.
//!
//! This module provides the `Gateway`, which attaches the bearer token to
//! every call and recovers once from an expired access token, and the
//! `ApiClient`, which adds typed calls for the `/auth/...` endpoints.
//!
//! The API uses JWT access/refresh token pairs issued at login.

pub mod client;
pub mod error;
pub mod gateway;
pub mod request;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::{Gateway, GatewayOptions, RefreshError, SessionEvent};
pub use request::ApiRequest;
