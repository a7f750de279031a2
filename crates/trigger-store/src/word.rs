use core::{borrow::Borrow, fmt};

use serde::Serialize;

use crate::StoreError;

/// A normalized trigger key: trimmed, lowercased and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TriggerWord(String);

impl TriggerWord {
    /// Normalizes `raw` into a trigger word.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidWord`] when nothing is left after trimming.
    pub fn new(raw: &str) -> Result<Self, StoreError> {
        let word = raw.trim().to_lowercase();
        if word.is_empty() {
            return Err(StoreError::InvalidWord);
        }
        Ok(Self(word))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl Borrow<str> for TriggerWord {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TriggerWord {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
