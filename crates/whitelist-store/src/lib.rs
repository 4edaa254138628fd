//! # whitelist-store
//!
//! Durable set of client identifiers backed by a single JSON record on disk.
//!
//! The record is the source of truth: every operation re-reads it, and every
//! mutation rewrites it in full. All operations against one
//! [`WhitelistStore`] are serialised behind a single lock so concurrent adds
//! and removes from the interception pipeline and the admin surface never
//! lose each other's updates.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use whitelist_store::WhitelistStore;
//!
//! let store = WhitelistStore::open("database/uids.json").unwrap();
//! assert!(store.add("123").unwrap());
//! assert!(store.exists(" 123 ").unwrap());
//! assert_eq!(store.list().unwrap(), vec!["123".to_string()]);
//! ```

mod error;
pub mod record;
mod store;

pub use error::StoreError;
pub use record::{WhitelistRecord, WHITELIST_FIELD};
pub use store::WhitelistStore;
