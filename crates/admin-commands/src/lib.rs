//! # admin-commands
//!
//! Administrative command surface for the whitelist. Commands are a static
//! table ([`COMMANDS`]) mapping a name to its required argument, the store
//! operation it runs, and how its outcome is rendered. A chat gateway (or
//! the bundled console) iterates the table to register commands and calls
//! [`dispatch`] to run them.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use admin_commands::dispatch;
//! use whitelist_store::WhitelistStore;
//!
//! let store = WhitelistStore::open("database/uids.json").unwrap();
//! let reply = dispatch(&store, "adduid", Some("123")).unwrap();
//! println!("{}: {}", reply.title, reply.description);
//! ```

mod reply;
mod table;

pub use reply::{format_uid_list, CommandReply, Severity};
pub use table::{
    add_uid, check_uid, dispatch, find, list_uids, remove_uid, CommandError, CommandSpec,
    COMMANDS,
};
