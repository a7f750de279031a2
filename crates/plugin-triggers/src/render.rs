use core::fmt::Write as _;

use plugin_core::{RoleCatalog, sanitize_line};
use trigger_store::{RoleId, StoreError, TriggerTables};

use crate::Command;

const MISSING_ROLE: &str = "(Role not found)";
const LIST_LINE_MAX: usize = 200;

fn role_label(roles: &RoleCatalog, id: &RoleId) -> String {
    roles
        .get(id)
        .map_or_else(|| MISSING_ROLE.to_owned(), |role| role.name.clone())
}

pub(crate) fn responder_added(word: &str, response: &str) -> String {
    format!("Autoresponder Added\nWord: `{word}`\nResponse: `{response}`")
}

pub(crate) fn responder_updated(word: &str, response: &str, previous: &str) -> String {
    format!("Autoresponder Updated\nWord: `{word}`\nResponse: `{response}`\nWas: `{previous}`")
}

pub(crate) fn responder_removed(word: &str, response: &str) -> String {
    format!("Autoresponder Removed\nWord: `{word}`\nResponse: `{response}`")
}

pub(crate) fn responder_missing(word: &str) -> String {
    format!("Error\nNo autoresponder found for `{word}`")
}

pub(crate) fn role_word_set(word: &str, role: &str) -> String {
    format!("Role Word Set\nWord: `{word}`\nRole: {role}")
}

pub(crate) fn role_word_removed(roles: &RoleCatalog, word: &str, id: &RoleId) -> String {
    format!(
        "Role Word Removed\nWord: `{word}`\nRole: `{}`",
        role_label(roles, id)
    )
}

pub(crate) fn role_word_missing(word: &str) -> String {
    format!("Error\nNo role word found for `{word}`")
}

pub(crate) fn unknown_role(roles: &RoleCatalog, query: &str) -> String {
    let mut out = format!("Error\nNo role named `{query}`");
    if roles.roles().is_empty() {
        out.push_str("\nNo roles are configured.");
    } else {
        let known = roles
            .roles()
            .iter()
            .map(|r| format!("`{}` ({})", r.id, r.name))
            .collect::<Vec<_>>()
            .join(", ");
        _ = write!(out, "\nKnown roles: {known}");
    }
    out
}

pub(crate) fn usage(command: Command) -> String {
    format!("Usage: {}", command.usage())
}

pub(crate) fn not_allowed() -> String {
    "Error\nYou are not allowed to change triggers.".to_owned()
}

pub(crate) fn store_error(err: &StoreError) -> String {
    match err {
        StoreError::InvalidWord => "Error\nThe trigger word cannot be empty.".to_owned(),
        StoreError::EmptyReply => "Error\nThe response cannot be empty.".to_owned(),
        StoreError::Io { .. } | StoreError::Format { .. } => {
            "Error\nCould not save the change; nothing was modified.".to_owned()
        }
    }
}

pub(crate) fn help(about: &[&str]) -> String {
    let mut out = String::from("Help\n");
    for line in about {
        _ = writeln!(out, "{line}");
    }
    out.push_str("\nCommands\n");
    for command in Command::ALL {
        _ = writeln!(out, "`{}`", command.usage());
    }
    _ = write!(out, "`{}`", crate::HELP);
    out
}

pub(crate) fn granted(user: &str, role: &str) -> String {
    format!("Gave {user} the role {role}")
}

pub(crate) fn listing(tables: &TriggerTables, roles: &RoleCatalog) -> String {
    let mut out = String::from("Bot Responses & Role Words\n\nAutoresponders\n");
    if tables.responders().is_empty() {
        out.push_str("No autoresponders set.\n");
    } else {
        for (word, response) in tables.responders() {
            _ = writeln!(out, "`{word}` → {}", sanitize_line(response, LIST_LINE_MAX));
        }
    }

    out.push_str("\nRole Words\n");
    if tables.role_words().is_empty() {
        out.push_str("No role words set.");
    } else {
        let lines = tables
            .role_words()
            .iter()
            .map(|(word, id)| format!("`{word}` → {}", role_label(roles, id)))
            .collect::<Vec<_>>();
        out.push_str(&lines.join("\n"));
    }
    out
}
