//! Command-line arguments
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tutorlink - command-line client for the tutoring marketplace API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// API base URL (overrides config and TUTORLINK_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password
    Login {
        /// Defaults to the last email used
        #[arg(long)]
        email: Option<String>,
    },

    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// STUDENT or TEACHER
        #[arg(long, default_value = "STUDENT")]
        role: String,
        #[arg(long)]
        phone_number: Option<String>,
    },

    /// Confirm an email address from the verification link
    VerifyEmail { uidb64: String, token: String },

    /// Send the verification email again
    ResendVerification { email: String },

    /// Revoke the session and clear stored credentials
    Logout,

    /// Show the stored session without contacting the server
    Whoami,

    /// Fetch the profile from the server
    Profile,

    /// Renew the access token now
    Refresh,

    /// Send an authenticated request, e.g. `request GET /courses/`
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
}
