use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Role, RoleId, RoleLookup, TriggerTables, TriggerWord};

/// How a trigger word has to appear in a message to count as a hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Anywhere in the text, first entry in insertion order wins. "ban" fires
    /// on "banana".
    #[default]
    Substring,
    /// Not glued to a letter or digit on either side; first entry wins.
    WholeWord,
    /// Anywhere in the text; the longest matching word wins, ties go to the
    /// earlier entry.
    Longest,
}

#[derive(Debug, Clone, Copy)]
pub struct InboundMessage<'a> {
    pub author: &'a str,
    pub is_bot: bool,
    pub text: &'a str,
    pub channel: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAction {
    pub word: TriggerWord,
    pub text: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrantAction {
    pub word: TriggerWord,
    pub role: Role,
    pub recipient: String,
    pub channel: String,
}

/// A role word matched but its role is gone from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleRoleMatch {
    pub word: TriggerWord,
    pub role_id: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(ReplyAction),
    GrantRole(RoleGrantAction),
}

/// Outcome of one message: at most one reply and at most one grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub reply: Option<ReplyAction>,
    pub grant: Option<RoleGrantAction>,
    pub stale_role: Option<StaleRoleMatch>,
}

impl Evaluation {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.reply.is_none() && self.grant.is_none()
    }

    #[must_use]
    pub fn actions(self) -> Vec<Action> {
        self.reply
            .map(Action::Reply)
            .into_iter()
            .chain(self.grant.map(Action::GrantRole))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine {
    mode: MatchMode,
}

impl MatchEngine {
    #[must_use]
    pub const fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    #[must_use]
    pub const fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Decides what `message` fires against `tables`. The two tables are
    /// scanned independently; nothing is executed here.
    pub fn evaluate<R>(
        &self,
        message: &InboundMessage<'_>,
        tables: &TriggerTables,
        roles: &R,
    ) -> Evaluation
    where
        R: RoleLookup + ?Sized,
    {
        if message.is_bot {
            return Evaluation::default();
        }
        let content = message.text.to_lowercase();

        let reply = self
            .find(&content, tables.responders())
            .map(|(word, text)| ReplyAction {
                word: word.clone(),
                text: text.clone(),
                channel: message.channel.to_owned(),
            });

        let mut evaluation = Evaluation {
            reply,
            ..Evaluation::default()
        };

        if let Some((word, role_id)) = self.find(&content, tables.role_words()) {
            match roles.resolve_role(role_id) {
                Some(role) => {
                    evaluation.grant = Some(RoleGrantAction {
                        word: word.clone(),
                        role,
                        recipient: message.author.to_owned(),
                        channel: message.channel.to_owned(),
                    });
                }
                None => {
                    evaluation.stale_role = Some(StaleRoleMatch {
                        word: word.clone(),
                        role_id: role_id.clone(),
                    });
                }
            }
        }

        evaluation
    }

    fn find<'t, V>(
        &self,
        content: &str,
        table: &'t IndexMap<TriggerWord, V>,
    ) -> Option<(&'t TriggerWord, &'t V)> {
        match self.mode {
            MatchMode::Substring => table
                .iter()
                .find(|(word, _)| content.contains(word.as_str())),
            MatchMode::WholeWord => table
                .iter()
                .find(|(word, _)| contains_whole_word(content, word.as_str())),
            MatchMode::Longest => table
                .iter()
                .filter(|(word, _)| content.contains(word.as_str()))
                .reduce(|best, candidate| {
                    if candidate.0.char_len() > best.0.char_len() {
                        candidate
                    } else {
                        best
                    }
                }),
        }
    }
}

fn contains_whole_word(content: &str, word: &str) -> bool {
    content.match_indices(word).any(|(start, found)| {
        let before = content[..start].chars().next_back();
        let after = content[start + found.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> InboundMessage<'_> {
        InboundMessage {
            author: "@alice:example.org",
            is_bot: false,
            text,
            channel: "!room:example.org",
        }
    }

    fn known_roles(id: &RoleId) -> Option<Role> {
        (id.as_str() == "member").then(|| Role {
            id: id.clone(),
            name: "Member".to_owned(),
        })
    }

    fn responders(entries: &[(&str, &str)]) -> TriggerTables {
        entries
            .iter()
            .try_fold(TriggerTables::default(), |t, (w, r)| t.with_responder(w, r))
            .unwrap()
    }

    #[test]
    fn substring_fires_inside_longer_words() {
        let tables = responders(&[("ban", "no banning here")]);
        let actions = MatchEngine::default()
            .evaluate(&message("banana split"), &tables, &known_roles)
            .actions();
        assert_eq!(actions.len(), 1);
        let Action::Reply(reply) = &actions[0] else {
            panic!("expected a reply, got {actions:?}");
        };
        assert_eq!(reply.text, "no banning here");
        assert_eq!(reply.channel, "!room:example.org");
    }

    #[test]
    fn first_inserted_match_wins() {
        let tables = responders(&[("hi", "A"), ("hello", "B")]);
        let eval = MatchEngine::default().evaluate(&message("hello there"), &tables, &known_roles);
        // "hi" is not in "hello there", so the scan reaches "hello".
        assert_eq!(eval.reply.map(|r| r.text).as_deref(), Some("B"));

        let tables = responders(&[("he", "A"), ("hello", "B")]);
        let eval = MatchEngine::default().evaluate(&message("hello there"), &tables, &known_roles);
        assert_eq!(eval.reply.map(|r| r.text).as_deref(), Some("A"));
    }

    #[test]
    fn message_case_is_ignored() {
        let tables = responders(&[("hello", "hi!")]);
        let eval = MatchEngine::default().evaluate(&message("HeLLo World"), &tables, &known_roles);
        assert!(eval.reply.is_some());
    }

    #[test]
    fn no_match_yields_nothing() {
        let tables = responders(&[("hello", "hi!")]);
        let eval = MatchEngine::default().evaluate(&message("goodbye"), &tables, &known_roles);
        assert!(eval.is_empty());
        assert!(eval.actions().is_empty());
    }

    #[test]
    fn reply_and_grant_fire_together() {
        let tables = responders(&[("welcome", "Glad you're here")])
            .with_role_word("welcome", RoleId::from("member"))
            .unwrap();
        let actions = MatchEngine::default()
            .evaluate(&message("welcome everyone"), &tables, &known_roles)
            .actions();
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], Action::Reply(r) if r.text == "Glad you're here"));
        assert!(matches!(
            &actions[1],
            Action::GrantRole(g) if g.role.name == "Member" && g.recipient == "@alice:example.org"
        ));
    }

    #[test]
    fn only_first_role_word_is_considered() {
        let tables = TriggerTables::default()
            .with_role_word("verify", RoleId::from("gone"))
            .and_then(|t| t.with_role_word("ver", RoleId::from("member")))
            .unwrap();
        let eval = MatchEngine::default().evaluate(&message("please verify me"), &tables, &known_roles);
        // The first hit points at a missing role; the scan does not fall through.
        assert!(eval.grant.is_none());
        assert_eq!(
            eval.stale_role,
            Some(StaleRoleMatch {
                word: TriggerWord::new("verify").unwrap(),
                role_id: RoleId::from("gone"),
            })
        );
    }

    #[test]
    fn stale_role_is_not_an_action() {
        let tables = TriggerTables::default()
            .with_role_word("join", RoleId::from("deleted"))
            .unwrap();
        let eval = MatchEngine::default().evaluate(&message("join"), &tables, &known_roles);
        assert!(eval.is_empty());
        assert!(eval.stale_role.is_some());
    }

    #[test]
    fn bot_messages_are_ignored() {
        let tables = responders(&[("hello", "hi!")]);
        let mut msg = message("hello");
        msg.is_bot = true;
        let eval = MatchEngine::default().evaluate(&msg, &tables, &known_roles);
        assert_eq!(eval, Evaluation::default());
    }

    #[test]
    fn whole_word_mode_skips_embedded_hits() {
        let tables = responders(&[("ban", "no banning"), ("split", "splitting")]);
        let engine = MatchEngine::new(MatchMode::WholeWord);
        let eval = engine.evaluate(&message("banana split"), &tables, &known_roles);
        assert_eq!(eval.reply.map(|r| r.text).as_deref(), Some("splitting"));

        let eval = engine.evaluate(&message("don't ban me!"), &tables, &known_roles);
        assert_eq!(eval.reply.map(|r| r.text).as_deref(), Some("no banning"));
    }

    #[test]
    fn whole_word_mode_checks_every_occurrence() {
        let tables = responders(&[("cat", "meow")]);
        let engine = MatchEngine::new(MatchMode::WholeWord);
        let eval = engine.evaluate(&message("concatenate the cat"), &tables, &known_roles);
        assert!(eval.reply.is_some());
    }

    #[test]
    fn longest_mode_prefers_longer_words() {
        let tables = responders(&[("he", "A"), ("hello", "B"), ("there", "C")]);
        let engine = MatchEngine::new(MatchMode::Longest);
        let eval = engine.evaluate(&message("hello there"), &tables, &known_roles);
        // "hello" and "there" tie on length; the earlier entry wins.
        assert_eq!(eval.reply.map(|r| r.text).as_deref(), Some("B"));
    }

    #[test]
    fn match_mode_parses_from_config_names() {
        let mode: MatchMode = serde_json::from_str("\"whole_word\"").unwrap();
        assert_eq!(mode, MatchMode::WholeWord);
    }
}
