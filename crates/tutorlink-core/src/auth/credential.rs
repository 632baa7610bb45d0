use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuthTokens, User};

/// Version of the persisted document layout. Documents with any other
/// version are discarded on hydration.
pub const PERSIST_VERSION: u32 = 0;

/// The currently signed-in principal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Credential {
    pub user: Option<User>,
    pub tokens: Option<AuthTokens>,
}

impl Credential {
    pub fn new(user: User, tokens: AuthTokens) -> Self {
        Self {
            user: Some(user),
            tokens: Some(tokens),
        }
    }

    /// True iff the token pair is present.
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh.as_str())
    }
}

/// On-disk envelope for a `Credential`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCredential {
    pub state: Credential,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
}

impl PersistedCredential {
    pub fn new(state: Credential) -> Self {
        Self {
            state,
            version: PERSIST_VERSION,
            saved_at: Utc::now(),
        }
    }
}
