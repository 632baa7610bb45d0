use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::credential::{Credential, PersistedCredential, PERSIST_VERSION};
use super::storage::{CredentialStorage, MemoryStorage};
use crate::models::{AuthTokens, User};

/// Holder of the current `Credential`, shared by handle across the app.
///
/// Mutations replace the whole value. Each one is written to durable storage
/// before it becomes visible in memory; if the write fails the mutation is
/// rejected and readers keep seeing the previous value. `logout` is the
/// exception and always clears memory.
pub struct CredentialStore {
    storage: Arc<dyn CredentialStorage>,
    state: RwLock<Arc<Credential>>,
    loading: AtomicBool,
}

impl CredentialStore {
    /// Create an empty store backed by `storage` without reading from it.
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self {
            storage,
            state: RwLock::new(Arc::new(Credential::default())),
            loading: AtomicBool::new(true),
        }
    }

    /// Create a store and hydrate it from `storage`.
    ///
    /// A document that cannot be parsed, or that carries an unknown version,
    /// is discarded and the store starts empty.
    pub fn open(storage: Arc<dyn CredentialStorage>) -> Result<Self> {
        let contents = storage
            .read()
            .context("Failed to read persisted credentials")?;
        let store = Self::new(storage);

        if let Some(contents) = contents {
            match serde_json::from_str::<PersistedCredential>(&contents) {
                Ok(persisted) if persisted.version == PERSIST_VERSION => {
                    debug!(
                        authenticated = persisted.state.is_authenticated(),
                        saved_at = %persisted.saved_at,
                        "Hydrated credentials from storage"
                    );
                    *store.write_guard() = Arc::new(persisted.state);
                }
                Ok(persisted) => {
                    warn!(version = persisted.version, "Discarding persisted credentials with unknown version");
                }
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted credentials");
                }
            }
        }

        Ok(store)
    }

    /// Store with no durable backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    // ===== Readers =====

    /// The whole current value.
    pub fn snapshot(&self) -> Arc<Credential> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn user(&self) -> Option<User> {
        self.snapshot().user.clone()
    }

    pub fn tokens(&self) -> Option<AuthTokens> {
        self.snapshot().tokens.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.snapshot().access_token().map(str::to_string)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.snapshot().refresh_token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    // ===== Mutators =====

    /// Replace the profile snapshot, keeping the tokens.
    pub fn set_user(&self, user: User) -> Result<()> {
        self.replace(|current| Credential {
            user: Some(user),
            tokens: current.tokens.clone(),
        })
    }

    /// Replace the token pair, keeping the profile.
    pub fn set_tokens(&self, tokens: AuthTokens) -> Result<()> {
        self.replace(|current| Credential {
            user: current.user.clone(),
            tokens: Some(tokens),
        })
    }

    /// Replace only the access token. Returns `false` without writing
    /// anything when there is no token pair to update.
    pub fn set_access_token(&self, access: String) -> Result<bool> {
        let mut guard = self.write_guard();
        let Some(tokens) = guard.tokens.as_ref() else {
            return Ok(false);
        };
        let next = Credential {
            user: guard.user.clone(),
            tokens: Some(AuthTokens::new(access, tokens.refresh.clone())),
        };
        self.persist(&next)?;
        *guard = Arc::new(next);
        Ok(true)
    }

    /// Install an access token minted from `refresh_used`.
    ///
    /// Returns `false` when the session moved on while the exchange was in
    /// flight (logout, or a new login with a different refresh token).
    pub fn apply_refresh(&self, refresh_used: &str, access: String) -> Result<bool> {
        let mut guard = self.write_guard();
        let Some(tokens) = guard.tokens.as_ref().filter(|t| t.refresh == refresh_used) else {
            return Ok(false);
        };
        let next = Credential {
            user: guard.user.clone(),
            tokens: Some(AuthTokens::new(access, tokens.refresh.clone())),
        };
        self.persist(&next)?;
        *guard = Arc::new(next);
        Ok(true)
    }

    /// Replace profile and tokens together and clear the loading flag.
    pub fn set_auth(&self, user: User, tokens: AuthTokens) -> Result<()> {
        self.replace(|_| Credential::new(user, tokens))?;
        self.set_loading(false);
        Ok(())
    }

    /// Drop profile and tokens. Memory is cleared even if storage fails.
    pub fn logout(&self) -> Result<()> {
        let mut guard = self.write_guard();
        *guard = Arc::new(Credential::default());
        self.storage
            .clear()
            .context("Failed to clear persisted credentials")
    }

    /// Drop the session a failed refresh of `refresh_used` belonged to.
    ///
    /// Clears only while that refresh token is still stored, or when no token
    /// pair exists at all. Returns `false` and leaves a newer session alone
    /// otherwise. As with `logout`, memory is cleared even if storage fails.
    pub fn expire_if_current(&self, refresh_used: Option<&str>) -> Result<bool> {
        let mut guard = self.write_guard();
        let current = match (guard.refresh_token(), refresh_used) {
            (None, _) => true,
            (Some(stored), Some(used)) => stored == used,
            (Some(_), None) => false,
        };
        if !current {
            return Ok(false);
        }

        *guard = Arc::new(Credential::default());
        self.storage
            .clear()
            .context("Failed to clear persisted credentials")?;
        Ok(true)
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }

    fn replace(&self, next: impl FnOnce(&Credential) -> Credential) -> Result<()> {
        let mut guard = self.write_guard();
        let next = next(&guard);
        self.persist(&next)?;
        *guard = Arc::new(next);
        Ok(())
    }

    fn persist(&self, credential: &Credential) -> Result<()> {
        let contents = serde_json::to_string(&PersistedCredential::new(credential.clone()))
            .context("Failed to serialize credentials")?;
        self.storage
            .write(&contents)
            .context("Failed to persist credentials")
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Arc<Credential>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
