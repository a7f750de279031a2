use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{JsonFile, RoleId, StoreError, TriggerTables, TriggerWord};

/// What a mutation did, for "added" vs "updated" style reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Created,
    Updated { previous: T },
    Removed { previous: T },
    NotFound,
}

impl<T> Change<T> {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    #[must_use]
    pub const fn previous(&self) -> Option<&T> {
        match self {
            Self::Updated { previous } | Self::Removed { previous } => Some(previous),
            Self::Created | Self::NotFound => None,
        }
    }
}

/// Single owner of the trigger tables.
///
/// Readers get an `Arc` snapshot that later mutations never touch. Mutations
/// hold the write lock while they build the next table set, flush it, and
/// publish it, so no two flushes interleave and nobody sees a half-applied
/// change. A failed flush publishes nothing.
#[derive(Debug)]
pub struct TriggerStore {
    file: JsonFile,
    tables: RwLock<Arc<TriggerTables>>,
}

impl TriggerStore {
    /// Loads the tables from `file`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or malformed. Callers should treat
    /// this as fatal rather than run with a partial table.
    pub async fn open(file: JsonFile) -> Result<Self, StoreError> {
        let tables = file.load().await?;
        info!(
            path = %file.path().display(),
            responders = tables.responders().len(),
            role_words = tables.role_words().len(),
            "Loaded trigger tables"
        );
        Ok(Self {
            file,
            tables: RwLock::new(Arc::new(tables)),
        })
    }

    #[must_use]
    pub const fn file(&self) -> &JsonFile {
        &self.file
    }

    pub async fn snapshot(&self) -> Arc<TriggerTables> {
        Arc::clone(&*self.tables.read().await)
    }

    pub async fn responder(&self, word: &str) -> Option<String> {
        let word = TriggerWord::new(word).ok()?;
        self.tables
            .read()
            .await
            .responders()
            .get(word.as_str())
            .cloned()
    }

    pub async fn role_word(&self, word: &str) -> Option<RoleId> {
        let word = TriggerWord::new(word).ok()?;
        self.tables
            .read()
            .await
            .role_words()
            .get(word.as_str())
            .cloned()
    }

    /// # Errors
    ///
    /// Rejects blank words or replies, and reports flush failures.
    pub async fn set_responder(&self, word: &str, text: &str) -> Result<Change<String>, StoreError> {
        let word = TriggerWord::new(word)?;
        if text.trim().is_empty() {
            return Err(StoreError::EmptyReply);
        }
        let text = text.to_owned();
        self.mutate(move |tables| match tables.insert_responder(word, text) {
            Some(previous) => Change::Updated { previous },
            None => Change::Created,
        })
        .await
    }

    /// # Errors
    ///
    /// Rejects blank words and reports flush failures. A word that is not
    /// present is `Ok(Change::NotFound)`.
    pub async fn remove_responder(&self, word: &str) -> Result<Change<String>, StoreError> {
        let word = TriggerWord::new(word)?;
        self.mutate(move |tables| {
            tables
                .remove_responder(&word)
                .map_or(Change::NotFound, |previous| Change::Removed { previous })
        })
        .await
    }

    /// # Errors
    ///
    /// Rejects blank words and reports flush failures.
    pub async fn set_role_word(&self, word: &str, role: RoleId) -> Result<Change<RoleId>, StoreError> {
        let word = TriggerWord::new(word)?;
        self.mutate(move |tables| match tables.insert_role_word(word, role) {
            Some(previous) => Change::Updated { previous },
            None => Change::Created,
        })
        .await
    }

    /// # Errors
    ///
    /// Rejects blank words and reports flush failures.
    pub async fn remove_role_word(&self, word: &str) -> Result<Change<RoleId>, StoreError> {
        let word = TriggerWord::new(word)?;
        self.mutate(move |tables| {
            tables
                .remove_role_word(&word)
                .map_or(Change::NotFound, |previous| Change::Removed { previous })
        })
        .await
    }

    async fn mutate<T, F>(&self, apply: F) -> Result<Change<T>, StoreError>
    where
        F: FnOnce(&mut TriggerTables) -> Change<T>,
    {
        let mut guard = self.tables.write().await;
        let mut next = TriggerTables::clone(&guard);
        let change = apply(&mut next);
        if change.is_not_found() {
            return Ok(change);
        }
        if let Err(e) = self.file.save(&next).await {
            warn!(error = %e, path = %self.file.path().display(), "Failed to persist trigger change; keeping previous tables");
            return Err(e);
        }
        *guard = Arc::new(next);
        drop(guard);
        Ok(change)
    }
}
