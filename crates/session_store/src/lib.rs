//! Append-only JSONL persistence for rubber-duck conversations.
//!
//! One log per watched file lives under `<workspace>/.rhizome/vscodestate/rubber/`.
//! Logs are only ever appended to; a log is archived (renamed) on formal close
//! and deleted only when it holds zero entries.

mod error;
mod hash;
mod paths;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use hash::{file_content_hash, line_hash, LINE_HASH_LEN, LINE_HASH_PREFIX_CHARS, PATH_HASH_LEN};
pub use paths::{
    archived_file_name, path_hash, storage_file_name, storage_root, workspace_relative,
    ACTIVE_SUFFIX, ARCHIVED_SUFFIX, STORAGE_DIR,
};
pub use schema::{ConversationEntry, EntryValidationError};
pub use store::{ActiveSessionInfo, SessionStore};
