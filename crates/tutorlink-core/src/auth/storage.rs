use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use keyring::Entry;

/// Name under which the serialized credential document is kept, whatever the backend.
pub const STORAGE_KEY: &str = "auth-storage";

/// Keychain service name used by `KeyringStorage::default()`
const SERVICE_NAME: &str = "tutorlink";

/// Durable home for the serialized credential document.
///
/// Implementations hold exactly one document under `STORAGE_KEY`.
pub trait CredentialStorage: Send + Sync {
    /// Read the stored document, `None` if nothing has been written yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored document.
    fn write(&self, contents: &str) -> Result<()>;

    /// Remove the stored document. Clearing an empty backend is not an error.
    fn clear(&self) -> Result<()>;
}

/// JSON file in a data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", STORAGE_KEY))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", STORAGE_KEY))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CredentialStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credential file: {}", path.display()))?;
        Ok(Some(contents))
    }

    fn write(&self, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {}", self.dir.display()))?;

        // Write then rename so a crash never leaves a half-written document.
        let temp = self.temp_path();
        match std::fs::remove_file(&temp) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("Failed to remove stale credential file"),
        }

        // Tokens are readable by the owner only
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
        let mut file = options.open(&temp).context("Failed to create credential file")?;
        file.write_all(contents.as_bytes())
            .context("Failed to write credential file")?;
        drop(file);
        std::fs::rename(&temp, self.path()).context("Failed to replace credential file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

/// OS keychain entry.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, STORAGE_KEY).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl CredentialStorage for KeyringStorage {
    fn read(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(contents) => Ok(Some(contents)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read credentials from keychain"),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        self.entry()?
            .set_password(contents)
            .context("Failed to store credentials in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credentials from keychain"),
        }
    }
}

/// Process-local storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with an existing document.
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }
}

impl CredentialStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        Ok(self
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
