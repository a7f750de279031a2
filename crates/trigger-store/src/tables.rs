use core::{fmt, marker::PhantomData};

use indexmap::IndexMap;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as _, MapAccess, Visitor},
};

use crate::{RoleId, StoreError, TriggerWord};

/// Both trigger tables, in insertion order. This is the unit that gets
/// persisted and handed out as a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriggerTables {
    responders: IndexMap<TriggerWord, String>,
    role_words: IndexMap<TriggerWord, RoleId>,
}

impl TriggerTables {
    #[must_use]
    pub const fn responders(&self) -> &IndexMap<TriggerWord, String> {
        &self.responders
    }

    #[must_use]
    pub const fn role_words(&self) -> &IndexMap<TriggerWord, RoleId> {
        &self.role_words
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responders.is_empty() && self.role_words.is_empty()
    }

    /// Builder used to assemble fixtures and seed data.
    ///
    /// # Errors
    ///
    /// Fails on a blank word or blank reply text.
    pub fn with_responder(mut self, word: &str, text: &str) -> Result<Self, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyReply);
        }
        self.insert_responder(TriggerWord::new(word)?, text.to_owned());
        Ok(self)
    }

    /// # Errors
    ///
    /// Fails on a blank word.
    pub fn with_role_word(mut self, word: &str, role: RoleId) -> Result<Self, StoreError> {
        self.insert_role_word(TriggerWord::new(word)?, role);
        Ok(self)
    }

    // Overwriting keeps the entry's original position.
    pub(crate) fn insert_responder(&mut self, word: TriggerWord, text: String) -> Option<String> {
        self.responders.insert(word, text)
    }

    pub(crate) fn remove_responder(&mut self, word: &TriggerWord) -> Option<String> {
        self.responders.shift_remove(word.as_str())
    }

    pub(crate) fn insert_role_word(&mut self, word: TriggerWord, role: RoleId) -> Option<RoleId> {
        self.role_words.insert(word, role)
    }

    pub(crate) fn remove_role_word(&mut self, word: &TriggerWord) -> Option<RoleId> {
        self.role_words.shift_remove(word.as_str())
    }

    fn from_stored(stored: StoredTables) -> Result<Self, String> {
        let mut tables = Self::default();
        for (raw, text) in stored.responders {
            let word = TriggerWord::new(&raw)
                .map_err(|_| "empty trigger word in `responders`".to_owned())?;
            if text.trim().is_empty() {
                return Err(format!("empty reply for `{word}` in `responders`"));
            }
            if tables.insert_responder(word.clone(), text).is_some() {
                return Err(format!("`{word}` appears twice in `responders`"));
            }
        }
        for (raw, role) in stored.role_words {
            let word = TriggerWord::new(&raw)
                .map_err(|_| "empty trigger word in `role_words`".to_owned())?;
            if tables.insert_role_word(word.clone(), role).is_some() {
                return Err(format!("`{word}` appears twice in `role_words`"));
            }
        }
        Ok(tables)
    }
}

#[derive(Deserialize)]
struct StoredTables {
    #[serde(default, deserialize_with = "entries")]
    responders: Vec<(String, String)>,
    #[serde(default, deserialize_with = "entries")]
    role_words: Vec<(String, RoleId)>,
}

// Reads a JSON object as its raw key/value pairs. A map type would keep only
// the last of two identical keys; here both reach the collision check.
fn entries<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct Entries<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for Entries<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of trigger words")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, V>()? {
                out.push(entry);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(Entries(PhantomData))
}

// Keys on disk may have been hand-edited, so they are normalized and checked
// for collisions instead of trusted.
impl<'de> Deserialize<'de> for TriggerTables {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = StoredTables::deserialize(deserializer)?;
        Self::from_stored(stored).map_err(D::Error::custom)
    }
}
