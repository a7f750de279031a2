mod args;
mod render;

use anyhow::Result;
use async_trait::async_trait;
use matrix_sdk::ruma::events::room::message::OriginalSyncRoomMessageEvent;
use plugin_core::{
    Grant, Plugin, PluginContext, PluginSpec, PluginTriggers, RoleCatalog, RoomMessageMeta,
    send_text,
};
use tracing::{debug, info, warn};
use trigger_store::{
    Action, Change, InboundMessage, ReplyAction, RoleGrantAction, RoleId, StoreError, TriggerStore,
};

use crate::args::split_word;

const HELP: &str = "!help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    AddResponder,
    RemoveResponder,
    SetRoleWord,
    RemoveRoleWord,
    List,
}

impl Command {
    const ALL: [Self; 5] = [
        Self::AddResponder,
        Self::RemoveResponder,
        Self::SetRoleWord,
        Self::RemoveRoleWord,
        Self::List,
    ];

    const fn token(self) -> &'static str {
        match self {
            Self::AddResponder => "!addresponder",
            Self::RemoveResponder => "!removeresponder",
            Self::SetRoleWord => "!setroleword",
            Self::RemoveRoleWord => "!removeroleword",
            Self::List => "!list",
        }
    }

    const fn usage(self) -> &'static str {
        match self {
            Self::AddResponder => "!addresponder <word> <response>",
            Self::RemoveResponder => "!removeresponder <word>",
            Self::SetRoleWord => "!setroleword <word> <role>",
            Self::RemoveRoleWord => "!removeroleword <word>",
            Self::List => "!list",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.token().eq_ignore_ascii_case(token))
    }

    const fn mutates(self) -> bool {
        !matches!(self, Self::List)
    }
}

/// Autoresponders and role words: the management commands plus the passive
/// listener that fires them.
#[derive(Debug)]
pub struct Triggers;

#[async_trait]
impl Plugin for Triggers {
    fn id(&self) -> &'static str {
        "triggers"
    }

    fn help(&self) -> &'static str {
        "Autoresponders reply to trigger words; role words grant a role to whoever says them."
    }

    fn spec(&self) -> PluginSpec {
        PluginSpec {
            triggers: PluginTriggers {
                commands: Command::ALL
                    .iter()
                    .map(|c| c.token())
                    .chain([HELP])
                    .map(ToOwned::to_owned)
                    .collect(),
            },
            ..PluginSpec::new(self.id())
        }
    }

    fn handles_room_messages(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &PluginContext, args: &str, _spec: &PluginSpec) -> Result<()> {
        let Some(token) = ctx.trigger.as_deref() else {
            return Ok(());
        };
        if token.eq_ignore_ascii_case(HELP) {
            return send_text(ctx, render::help(&enabled_plugin_help(ctx).await)).await;
        }
        let Some(command) = Command::parse(token) else {
            return Ok(());
        };
        if command.mutates() && !ctx.can_manage() {
            info!(sender = %ctx.sender, command = command.token(), "Refusing trigger change from non-manager");
            return send_text(ctx, render::not_allowed()).await;
        }
        let reply = handle(command, args, &ctx.triggers, &ctx.roles).await;
        send_text(ctx, reply).await
    }

    async fn on_room_message(
        &self,
        ctx: &PluginContext,
        _event: &OriginalSyncRoomMessageEvent,
        _spec: &PluginSpec,
        meta: &RoomMessageMeta<'_>,
    ) -> Result<()> {
        let Some(body) = matchable_body(meta) else {
            return Ok(());
        };
        let message = InboundMessage {
            author: ctx.sender.as_str(),
            is_bot: meta.from_bot,
            text: body,
            channel: ctx.room.room_id().as_str(),
        };
        let snapshot = ctx.triggers.snapshot().await;
        let evaluation = ctx.engine.evaluate(&message, &snapshot, ctx.roles.as_ref());

        if let Some(stale) = &evaluation.stale_role {
            debug!(word = %stale.word, role = %stale.role_id, "Role word matched a role that no longer exists");
        }

        for action in evaluation.actions() {
            match action {
                Action::Reply(reply) => {
                    if let Err(e) = send_reply(ctx, reply).await {
                        warn!(error = %e, "Failed to send autoresponse");
                    }
                }
                Action::GrantRole(grant) => {
                    if let Err(e) = apply_grant(ctx, grant).await {
                        warn!(error = %e, "Failed to grant role");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Text to run through the match engine. Messages that changed the tables
/// are left alone so a new trigger does not answer its own definition;
/// read-only commands match like any other message.
fn matchable_body<'a>(meta: &RoomMessageMeta<'a>) -> Option<&'a str> {
    let changes_tables = meta
        .command
        .and_then(Command::parse)
        .is_some_and(Command::mutates);
    if changes_tables {
        return None;
    }
    meta.body
}

async fn enabled_plugin_help(ctx: &PluginContext) -> Vec<&'static str> {
    let mut about: Vec<(String, &'static str)> = ctx
        .registry
        .entries()
        .await
        .into_iter()
        .filter(|(_, entry)| entry.spec.enabled)
        .map(|(id, entry)| (id, entry.plugin.help()))
        .collect();
    about.sort_unstable();
    about.into_iter().map(|(_, help)| help).collect()
}

async fn send_reply(ctx: &PluginContext, reply: ReplyAction) -> Result<()> {
    info!(word = %reply.word, room_id = %reply.channel, "Autoresponder fired");
    send_text(ctx, reply.text).await
}

async fn apply_grant(ctx: &PluginContext, grant: RoleGrantAction) -> Result<()> {
    match ctx.roles.grant(&ctx.room, &ctx.sender, &grant.role.id).await? {
        Grant::Granted => {
            info!(word = %grant.word, role = %grant.role.id, user = %grant.recipient, "Granted role");
            send_text(ctx, render::granted(&grant.recipient, &grant.role.name)).await
        }
        Grant::AlreadyHeld => {
            debug!(role = %grant.role.id, user = %grant.recipient, "Member already holds role");
            Ok(())
        }
        Grant::UnknownRole => {
            debug!(role = %grant.role.id, "Role vanished before it could be granted");
            Ok(())
        }
    }
}

async fn handle(command: Command, args: &str, store: &TriggerStore, roles: &RoleCatalog) -> String {
    match command {
        Command::AddResponder => {
            let Some((word, response)) = split_word(args).filter(|(_, rest)| !rest.is_empty())
            else {
                return render::usage(command);
            };
            match store.set_responder(word, response).await {
                Ok(Change::Updated { previous }) => {
                    render::responder_updated(word, response, &previous)
                }
                Ok(Change::Created | Change::Removed { .. } | Change::NotFound) => {
                    render::responder_added(word, response)
                }
                Err(e) => failure(&e),
            }
        }
        Command::RemoveResponder => {
            let Some((word, _)) = split_word(args) else {
                return render::usage(command);
            };
            match store.remove_responder(word).await {
                Ok(Change::Removed { previous }) => render::responder_removed(word, &previous),
                Ok(Change::NotFound | Change::Created | Change::Updated { .. }) => {
                    render::responder_missing(word)
                }
                Err(e) => failure(&e),
            }
        }
        Command::SetRoleWord => {
            let Some((word, query)) = split_word(args).filter(|(_, rest)| !rest.is_empty())
            else {
                return render::usage(command);
            };
            let Some(role) = roles.find(query) else {
                return render::unknown_role(roles, query);
            };
            match store.set_role_word(word, RoleId::new(role.id.clone())).await {
                Ok(_) => render::role_word_set(word, &role.name),
                Err(e) => failure(&e),
            }
        }
        Command::RemoveRoleWord => {
            let Some((word, _)) = split_word(args) else {
                return render::usage(command);
            };
            match store.remove_role_word(word).await {
                Ok(Change::Removed { previous }) => render::role_word_removed(roles, word, &previous),
                Ok(Change::NotFound | Change::Created | Change::Updated { .. }) => {
                    render::role_word_missing(word)
                }
                Err(e) => failure(&e),
            }
        }
        Command::List => render::listing(&*store.snapshot().await, roles),
    }
}

fn failure(err: &StoreError) -> String {
    if matches!(err, StoreError::Io { .. } | StoreError::Format { .. }) {
        warn!(error = %err, "Trigger change failed");
    }
    render::store_error(err)
}
