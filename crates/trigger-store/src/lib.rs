//! Trigger tables for the chat bot: the persisted word→reply and word→role
//! mappings, the store that serializes every change through one lock, and the
//! engine that decides what an inbound message fires.

mod error;
mod matcher;
mod persist;
mod role;
mod store;
mod tables;
mod word;

pub use error::StoreError;
pub use matcher::{
    Action, Evaluation, InboundMessage, MatchEngine, MatchMode, ReplyAction, RoleGrantAction,
    StaleRoleMatch,
};
pub use persist::JsonFile;
pub use role::{Role, RoleId, RoleLookup};
pub use store::{Change, TriggerStore};
pub use tables::TriggerTables;
pub use word::TriggerWord;
