pub mod roles;

pub use roles::{Grant, RoleCatalog, RoleDef};

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use matrix_sdk::{
    Client,
    room::Room,
    ruma::{
        OwnedUserId,
        events::room::message::{OriginalSyncRoomMessageEvent, RoomMessageEventContent},
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use trigger_store::{MatchEngine, TriggerStore};

/// Everything a plugin needs to handle one message.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub client: Client,
    pub room: Room,
    pub sender: OwnedUserId,
    /// Normalized command token (e.g. `!list`) when invoked as a command.
    pub trigger: Option<String>,
    pub registry: Arc<PluginRegistry>,
    pub triggers: Arc<TriggerStore>,
    pub roles: Arc<RoleCatalog>,
    pub engine: MatchEngine,
    pub footer: Option<Arc<str>>,
    pub managers: Arc<[String]>,
}

impl PluginContext {
    /// Whether the sender may change trigger tables. An empty manager list
    /// leaves management open to everyone.
    #[must_use]
    pub fn can_manage(&self) -> bool {
        self.managers.is_empty() || self.managers.iter().any(|m| m == self.sender.as_str())
    }
}

/// Per-message facts the dispatcher has already worked out.
#[derive(Debug, Clone, Copy)]
pub struct RoomMessageMeta<'a> {
    pub body: Option<&'a str>,
    /// Set when the message was dispatched as a command.
    pub command: Option<&'a str>,
    /// Sent by this bot or by an ignored account.
    pub from_bot: bool,
}

#[async_trait]
pub trait Plugin: Send + Sync + core::fmt::Debug {
    fn id(&self) -> &'static str;
    fn help(&self) -> &'static str;
    fn spec(&self) -> PluginSpec {
        PluginSpec::new(self.id())
    }
    fn handles_room_messages(&self) -> bool {
        false
    }
    async fn run(&self, ctx: &PluginContext, args: &str, spec: &PluginSpec) -> Result<()>;

    async fn on_room_message(
        &self,
        _ctx: &PluginContext,
        _event: &OriginalSyncRoomMessageEvent,
        _spec: &PluginSpec,
        _meta: &RoomMessageMeta<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PluginTriggers {
    #[serde(default)]
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginSpec {
    pub id: String,
    #[serde(default = "enabled_true")]
    pub enabled: bool,
    #[serde(default)]
    pub triggers: PluginTriggers,
}

impl PluginSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            triggers: PluginTriggers::default(),
        }
    }
}

const fn enabled_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub spec: PluginSpec,
    pub plugin: Arc<dyn Plugin>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_id: HashMap<String, PluginEntry>,
    by_command: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, spec: PluginSpec, plugin: Arc<dyn Plugin>) -> Option<PluginEntry> {
        let mut inner = self.inner.write().await;
        let id = spec.id.clone();
        let previous = inner.by_id.insert(
            id.clone(),
            PluginEntry {
                spec: spec.clone(),
                plugin,
            },
        );
        inner.by_command.retain(|_, existing| *existing != id);
        for cmd in &spec.triggers.commands {
            inner.by_command.insert(normalize_cmd(cmd), id.clone());
        }
        previous
    }

    pub async fn entry(&self, id: &str) -> Option<PluginEntry> {
        let inner = self.inner.read().await;
        inner.by_id.get(id).cloned()
    }

    pub async fn entry_by_command(&self, token: &str) -> Option<PluginEntry> {
        let inner = self.inner.read().await;
        inner
            .by_command
            .get(&normalize_cmd(token))
            .and_then(|id| inner.by_id.get(id))
            .cloned()
    }

    pub async fn entries(&self) -> Vec<(String, PluginEntry)> {
        let inner = self.inner.read().await;
        inner
            .by_id
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    pub async fn commands(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut commands: Vec<String> = inner.by_command.keys().cloned().collect();
        commands.sort();
        commands
    }

    #[must_use]
    pub async fn is_enabled(&self, id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.by_id.get(id).is_some_and(|entry| entry.spec.enabled)
    }
}

/// Commands are matched case-insensitively and always carry the `!` prefix.
#[must_use]
pub fn normalize_cmd(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    if lowered.starts_with('!') {
        lowered
    } else {
        format!("!{lowered}")
    }
}

#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[must_use]
pub fn sanitize_line(s: &str, max: usize) -> String {
    let compact = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&compact, max)
}

#[must_use]
fn decorate_footer(text: &str, footer: Option<&str>) -> String {
    match footer {
        Some(footer) if !footer.trim().is_empty() => format!("{text}\n\n{footer}"),
        _ => text.to_owned(),
    }
}

/// Send a text message to the room in `ctx`, with the configured footer.
///
/// # Errors
///
/// Fails when the homeserver rejects the message.
pub async fn send_text(ctx: &PluginContext, text: impl Into<String>) -> Result<()> {
    let body = decorate_footer(&text.into(), ctx.footer.as_deref());
    ctx.room.send(RoomMessageEventContent::text_plain(body)).await?;
    Ok(())
}
