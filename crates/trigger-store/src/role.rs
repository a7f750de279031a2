use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque reference to a role owned by the chat platform.
///
/// Older data files store numeric ids; both shapes load, and ids are always
/// written back as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<u64> for RoleId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRoleId {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for RoleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match StoredRoleId::deserialize(deserializer)? {
            StoredRoleId::Text(id) => Self(id),
            StoredRoleId::Number(id) => Self::from(id),
        })
    }
}

/// A role as currently known to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Resolves stored role ids against the live role registry. A role that no
/// longer exists resolves to `None`; that is never an error.
pub trait RoleLookup {
    fn resolve_role(&self, id: &RoleId) -> Option<Role>;
}

impl<F> RoleLookup for F
where
    F: Fn(&RoleId) -> Option<Role>,
{
    fn resolve_role(&self, id: &RoleId) -> Option<Role> {
        self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_load_as_strings() {
        let id: RoleId = serde_json::from_str("123456789012345678").unwrap();
        assert_eq!(id.as_str(), "123456789012345678");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"123456789012345678\"");
    }

    #[test]
    fn closures_act_as_lookups() {
        let lookup = |id: &RoleId| {
            (id.as_str() == "mod").then(|| Role {
                id: id.clone(),
                name: "Moderator".to_owned(),
            })
        };
        assert!(lookup.resolve_role(&RoleId::from("mod")).is_some());
        assert!(lookup.resolve_role(&RoleId::from("gone")).is_none());
    }
}
