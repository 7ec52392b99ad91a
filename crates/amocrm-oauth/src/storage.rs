//! Token persistence.
//!
//! [`TokenStorage`] is the boundary between a session and wherever tokens
//! outlive the process. Anything implementing the two methods qualifies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::token::Token;

/// Default token file name.
pub const TOKEN_FILE: &str = "amocrm_token.json";

/// Load/save boundary for a single [`Token`].
#[async_trait]
pub trait TokenStorage: Send + Sync + std::fmt::Debug {
    /// Load the stored token.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet. Stored data that
    /// fails to decode is an error, never `None`.
    async fn get_token(&self) -> Result<Option<Token>, StorageError>;

    /// Replace the stored token as a whole.
    async fn set_token(&self, token: &Token) -> Result<(), StorageError>;
}

/// Shared token storage for use across async contexts.
pub type SharedTokenStorage = Arc<dyn TokenStorage>;

// ============================================================================
// JsonFileTokenStorage
// ============================================================================

/// Flat JSON file holding one token.
///
/// Not safe for concurrent writers across processes.
#[derive(Debug, Clone)]
pub struct JsonFileTokenStorage {
    path: PathBuf,
}

impl JsonFileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at [`TOKEN_FILE`] inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl TokenStorage for JsonFileTokenStorage {
    async fn get_token(&self) -> Result<Option<Token>, StorageError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No stored token");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let token: Token =
            serde_json::from_slice(&content).map_err(|source| StorageError::CorruptTokenStore {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(token))
    }

    async fn set_token(&self, token: &Token) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_vec_pretty(token).map_err(StorageError::Serialize)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::info!("Token saved to {}", self.path.display());
        Ok(())
    }
}

// ============================================================================
// InMemoryTokenStorage
// ============================================================================

/// In-process storage, mainly for tests.
#[derive(Debug, Default)]
pub struct InMemoryTokenStorage {
    token: RwLock<Option<Token>>,
    save_count: AtomicU32,
}

impl InMemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: RwLock::new(Some(token)),
            save_count: AtomicU32::new(0),
        }
    }

    /// Number of successful `set_token` calls.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn get_token(&self) -> Result<Option<Token>, StorageError> {
        Ok(self.token.read().await.clone())
    }

    async fn set_token(&self, token: &Token) -> Result<(), StorageError> {
        *self.token.write().await = Some(token.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
