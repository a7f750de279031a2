//! Roles as configured power-level tiers.
//!
//! Matrix rooms have no named roles, so each role is declared in config with
//! the power level it stands for. Granting a role raises the member to that
//! level in the room the trigger fired in.

use anyhow::{Context as _, Result};
use matrix_sdk::{
    room::Room,
    ruma::{Int, UserId},
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use trigger_store::{Role, RoleId, RoleLookup};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoleDef {
    pub id: String,
    pub name: String,
    pub power_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Granted,
    /// The member already sits at or above the role's level; nothing is lowered.
    AlreadyHeld,
    /// The role was removed from config after the role word was set.
    UnknownRole,
}

#[derive(Debug, Default)]
pub struct RoleCatalog {
    roles: Vec<RoleDef>,
}

impl RoleCatalog {
    pub fn new(roles: Vec<RoleDef>) -> Self {
        let mut kept: Vec<RoleDef> = Vec::with_capacity(roles.len());
        for role in roles {
            if kept.iter().any(|r| r.id == role.id) {
                warn!(role = %role.id, "Duplicate role id in config; keeping the first");
                continue;
            }
            kept.push(role);
        }
        Self { roles: kept }
    }

    #[must_use]
    pub fn get(&self, id: &RoleId) -> Option<&RoleDef> {
        self.roles.iter().find(|r| r.id == id.as_str())
    }

    /// Resolves what a user typed: an exact id first, then a name ignoring
    /// case. Surrounding quotes are ignored.
    #[must_use]
    pub fn find(&self, query: &str) -> Option<&RoleDef> {
        let query = query.trim().trim_matches('"').trim();
        self.roles
            .iter()
            .find(|r| r.id == query)
            .or_else(|| self.roles.iter().find(|r| r.name.eq_ignore_ascii_case(query)))
    }

    #[must_use]
    pub fn roles(&self) -> &[RoleDef] {
        &self.roles
    }

    /// Raises `user` to the role's power level in `room`.
    ///
    /// # Errors
    ///
    /// Fails when the power levels cannot be read or updated, e.g. when the
    /// bot itself lacks the permission.
    pub async fn grant(&self, room: &Room, user: &UserId, id: &RoleId) -> Result<Grant> {
        let Some(role) = self.get(id) else {
            return Ok(Grant::UnknownRole);
        };
        let target = Int::from(role.power_level);
        let levels = room
            .power_levels()
            .await
            .context("reading room power levels")?;
        let current = levels
            .users
            .get(user)
            .copied()
            .unwrap_or(levels.users_default);
        if current >= target {
            return Ok(Grant::AlreadyHeld);
        }
        room.update_power_levels(vec![(user, target)])
            .await
            .with_context(|| format!("raising {user} to power level {target}"))?;
        Ok(Grant::Granted)
    }
}

impl RoleLookup for RoleCatalog {
    fn resolve_role(&self, id: &RoleId) -> Option<Role> {
        self.get(id).map(|def| Role {
            id: id.clone(),
            name: def.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RoleCatalog {
        let yaml = r"
- id: member
  name: Member
  power_level: 10
- id: mod
  name: Senior Moderator
  power_level: 50
- id: member
  name: Shadowed
  power_level: 99
";
        RoleCatalog::new(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let catalog = catalog();
        assert_eq!(catalog.roles().len(), 2);
        assert_eq!(catalog.get(&RoleId::from("member")).unwrap().name, "Member");
    }

    #[test]
    fn find_accepts_ids_and_names() {
        let catalog = catalog();
        assert_eq!(catalog.find("mod").unwrap().power_level, 50);
        assert_eq!(catalog.find("senior moderator").unwrap().id, "mod");
        assert_eq!(catalog.find("\"Senior Moderator\"").unwrap().id, "mod");
        assert!(catalog.find("admin").is_none());
    }

    #[test]
    fn lookup_degrades_for_removed_roles() {
        let catalog = catalog();
        let role = catalog.resolve_role(&RoleId::from("mod")).unwrap();
        assert_eq!(role.name, "Senior Moderator");
        assert!(catalog.resolve_role(&RoleId::from("retired")).is_none());
    }
}
