use tracing::{error, info};

use whitelist_store::{StoreError, WhitelistStore};

use crate::reply::{format_uid_list, CommandReply, Severity};

/// Errors raised while resolving a command invocation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("command '{command}' requires argument <{argument}>")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
}

/// One entry of the administrative command table.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Name of the required argument, if the command takes one.
    pub argument: Option<&'static str>,
    handler: fn(&WhitelistStore, &str) -> CommandReply,
}

impl CommandSpec {
    /// Usage line, e.g. `adduid <uid>`.
    pub fn usage(&self) -> String {
        match self.argument {
            Some(arg) => format!("{} <{arg}>", self.name),
            None => self.name.to_string(),
        }
    }
}

/// Every administrative command, in display order.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "checkuid",
        description: "Check if a UID exists in whitelist",
        argument: Some("uid"),
        handler: check_uid,
    },
    CommandSpec {
        name: "adduid",
        description: "Add a UID to whitelist",
        argument: Some("uid"),
        handler: add_uid,
    },
    CommandSpec {
        name: "removeuid",
        description: "Remove a UID from whitelist",
        argument: Some("uid"),
        handler: remove_uid,
    },
    CommandSpec {
        name: "listuids",
        description: "List all whitelisted UIDs",
        argument: None,
        handler: list_handler,
    },
];

/// Look up a command by name.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Resolve `name` in the command table and run it against `store`.
///
/// Store failures are rendered as an error reply; only an unknown command or
/// a missing required argument is an `Err`.
pub fn dispatch(
    store: &WhitelistStore,
    name: &str,
    argument: Option<&str>,
) -> Result<CommandReply, CommandError> {
    let entry = find(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

    let argument = match entry.argument {
        Some(required) => match argument.map(str::trim).filter(|a| !a.is_empty()) {
            Some(arg) => arg,
            None => {
                return Err(CommandError::MissingArgument {
                    command: entry.name,
                    argument: required,
                })
            }
        },
        None => "",
    };

    info!(command = entry.name, argument, "running admin command");
    Ok((entry.handler)(store, argument))
}

pub fn check_uid(store: &WhitelistStore, uid: &str) -> CommandReply {
    const TITLE: &str = "Check UID";
    match store.exists(uid) {
        Ok(true) => CommandReply::new(
            TITLE,
            format!("\u{2705} UID `{uid}` exists."),
            Severity::Success,
        ),
        Ok(false) => CommandReply::new(
            TITLE,
            format!("\u{274C} UID `{uid}` does not exist."),
            Severity::Error,
        ),
        Err(err) => store_failure(TITLE, err),
    }
}

pub fn add_uid(store: &WhitelistStore, uid: &str) -> CommandReply {
    const TITLE: &str = "Add UID";
    match store.add(uid) {
        Ok(true) => CommandReply::new(
            TITLE,
            format!("\u{2705} UID `{uid}` added."),
            Severity::Success,
        ),
        Ok(false) => CommandReply::new(
            TITLE,
            format!("\u{26A0}\u{FE0F} UID `{uid}` already exists."),
            Severity::Warning,
        ),
        Err(err) => store_failure(TITLE, err),
    }
}

pub fn remove_uid(store: &WhitelistStore, uid: &str) -> CommandReply {
    const TITLE: &str = "Remove UID";
    match store.remove(uid) {
        Ok(true) => CommandReply::new(
            TITLE,
            format!("\u{2705} UID `{uid}` removed."),
            Severity::Success,
        ),
        Ok(false) => CommandReply::new(
            TITLE,
            format!("\u{26A0}\u{FE0F} UID `{uid}` not found."),
            Severity::Warning,
        ),
        Err(err) => store_failure(TITLE, err),
    }
}

pub fn list_uids(store: &WhitelistStore) -> CommandReply {
    const TITLE: &str = "Whitelist UIDs";
    match store.list() {
        Ok(uids) => CommandReply::new(TITLE, format_uid_list(&uids), Severity::Info),
        Err(err) => store_failure(TITLE, err),
    }
}

fn list_handler(store: &WhitelistStore, _: &str) -> CommandReply {
    list_uids(store)
}

fn store_failure(title: &'static str, err: StoreError) -> CommandReply {
    error!(%err, command = title, "whitelist operation failed");
    CommandReply::new(
        title,
        format!("\u{274C} Whitelist unavailable: {err}"),
        Severity::Error,
    )
}
