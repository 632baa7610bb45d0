//! Data models for the tutoring marketplace API.
//!
//! This module contains the structures exchanged with the remote API and
//! persisted by the credential store:
//!
//! - `User`, `Role`: The signed-in principal and its profile snapshot
//! - `StudentProfile`, `TeacherProfile`: Role-specific sub-profiles
//! - Auth payloads: `AuthTokens`, `LoginRequest`, `RegisterRequest`, `AuthResponse`, ...

pub mod auth;
pub mod user;

pub use auth::{
    AuthResponse, AuthTokens, LoginRequest, LogoutRequest, RefreshRequest, RefreshResponse,
    RegisterRequest, ResendVerificationRequest, VerifyEmailResponse,
};
pub use user::{Role, StudentProfile, TeacherProfile, User};
