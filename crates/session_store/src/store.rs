use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::SessionStoreError;
use crate::hash::line_hash;
use crate::paths::{
    archived_file_name, storage_file_name, storage_root, workspace_relative, ACTIVE_SUFFIX,
    ARCHIVED_SUFFIX,
};
use crate::schema::ConversationEntry;

/// Discovery record for one active log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSessionInfo {
    pub file_name: String,
    pub modified: SystemTime,
    pub entry_count: usize,
}

/// Storage for all conversation logs of one workspace.
///
/// The store holds no open handles; every operation touches the filesystem
/// directly and propagates failures to the caller.
#[derive(Debug, Clone)]
pub struct SessionStore {
    workspace_root: PathBuf,
    root: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let root = storage_root(&workspace_root);
        Self {
            workspace_root,
            root,
        }
    }

    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active log path for a watched file.
    pub fn log_path(&self, file_path: &Path) -> Result<PathBuf, SessionStoreError> {
        let relative = workspace_relative(&self.workspace_root, file_path);
        let file_name = storage_file_name(&relative).ok_or_else(|| {
            SessionStoreError::MissingFileName {
                path: file_path.to_path_buf(),
            }
        })?;
        Ok(self.root.join(file_name))
    }

    pub fn archived_path(&self, file_path: &Path) -> Result<PathBuf, SessionStoreError> {
        let relative = workspace_relative(&self.workspace_root, file_path);
        let file_name = archived_file_name(&relative).ok_or_else(|| {
            SessionStoreError::MissingFileName {
                path: file_path.to_path_buf(),
            }
        })?;
        Ok(self.root.join(file_name))
    }

    /// Appends one entry as a single JSON line, creating the log on first use.
    pub fn append_entry(
        &self,
        file_path: &Path,
        line_num: usize,
        line_content: &str,
        duck: &str,
        user_response: &str,
    ) -> Result<ConversationEntry, SessionStoreError> {
        let path = self.log_path(file_path)?;
        let entry = ConversationEntry {
            line_num,
            line_hash: line_hash(line_content, line_num),
            line_content: line_content.to_string(),
            duck: duck.to_string(),
            user_response: user_response.to_string(),
            timestamp: now_rfc3339()?,
        };
        entry
            .validate()
            .map_err(|source| SessionStoreError::InvalidAppend {
                path: path.clone(),
                source,
            })?;

        let mut record = serde_json::to_string(&entry)
            .map_err(|source| SessionStoreError::json_serialize(&path, source))?;
        record.push('\n');

        fs::create_dir_all(&self.root)
            .map_err(|source| SessionStoreError::io("creating storage directory", &self.root, source))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SessionStoreError::io("opening log for append", &path, source))?;
        file.write_all(record.as_bytes())
            .map_err(|source| SessionStoreError::io("appending entry", &path, source))?;
        file.sync_data()
            .map_err(|source| SessionStoreError::io("syncing log", &path, source))?;

        debug!(path = %path.display(), line_num, "appended conversation entry");
        Ok(entry)
    }

    /// Loads every entry of the active log in append order.
    ///
    /// A missing log is the normal first-session case and yields no entries.
    pub fn load_session(&self, file_path: &Path) -> Result<Vec<ConversationEntry>, SessionStoreError> {
        read_log(&self.log_path(file_path)?)
    }

    /// Loads the archived log with the same strict rules as [`Self::load_session`].
    pub fn load_archived(
        &self,
        file_path: &Path,
    ) -> Result<Vec<ConversationEntry>, SessionStoreError> {
        read_log(&self.archived_path(file_path)?)
    }

    /// Removes the active log when it holds no entries. Returns whether a file was removed.
    ///
    /// A log that fails to parse is reported, never removed.
    pub fn delete_session_if_empty(&self, file_path: &Path) -> Result<bool, SessionStoreError> {
        let path = self.log_path(file_path)?;
        if !path.exists() || !read_log(&path)?.is_empty() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .map_err(|source| SessionStoreError::io("removing empty log", &path, source))?;
        info!(path = %path.display(), "removed empty conversation log");
        Ok(true)
    }

    /// Lists active logs sorted by file name. Archived logs are never included.
    pub fn list_active_sessions(&self) -> Result<Vec<ActiveSessionInfo>, SessionStoreError> {
        let mut sessions = Vec::new();

        for (path, file_name) in self.storage_files(ACTIVE_SUFFIX)? {
            let modified = fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .map_err(|source| SessionStoreError::io("reading log metadata", &path, source))?;
            let content = fs::read_to_string(&path)
                .map_err(|source| SessionStoreError::io("reading log", &path, source))?;
            let entry_count = content.lines().filter(|line| !line.trim().is_empty()).count();

            sessions.push(ActiveSessionInfo {
                file_name,
                modified,
                entry_count,
            });
        }

        sessions.sort_by(|left, right| left.file_name.cmp(&right.file_name));
        Ok(sessions)
    }

    /// Moves the active log to its archived name. No-op when there is no active log.
    ///
    /// An existing archive for the same file is extended rather than replaced.
    pub fn archive_session(&self, file_path: &Path) -> Result<Option<PathBuf>, SessionStoreError> {
        let active = self.log_path(file_path)?;
        let archived = self.archived_path(file_path)?;

        if !active.exists() {
            return Ok(None);
        }

        if archived.exists() {
            let content = fs::read(&active)
                .map_err(|source| SessionStoreError::io("reading log", &active, source))?;
            let mut file = OpenOptions::new()
                .append(true)
                .open(&archived)
                .map_err(|source| SessionStoreError::io("opening archive for append", &archived, source))?;
            file.write_all(&content)
                .map_err(|source| SessionStoreError::io("extending archive", &archived, source))?;
            file.sync_data()
                .map_err(|source| SessionStoreError::io("syncing archive", &archived, source))?;
            fs::remove_file(&active)
                .map_err(|source| SessionStoreError::io("removing archived log", &active, source))?;
        } else {
            fs::rename(&active, &archived)
                .map_err(|source| SessionStoreError::io("archiving log", &active, source))?;
        }

        info!(from = %active.display(), to = %archived.display(), "archived conversation log");
        Ok(Some(archived))
    }

    /// Deletes archived logs last modified longer than `max_age` ago.
    pub fn prune_archives(&self, max_age: Duration) -> Result<Vec<PathBuf>, SessionStoreError> {
        let now = SystemTime::now();
        let mut removed = Vec::new();

        for (path, _) in self.storage_files(ARCHIVED_SUFFIX)? {
            let modified = fs::metadata(&path)
                .and_then(|metadata| metadata.modified())
                .map_err(|source| SessionStoreError::io("reading archive metadata", &path, source))?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            fs::remove_file(&path)
                .map_err(|source| SessionStoreError::io("pruning archive", &path, source))?;
            info!(path = %path.display(), age_secs = age.as_secs(), "pruned archived log");
            removed.push(path);
        }

        Ok(removed)
    }

    fn storage_files(&self, suffix: &str) -> Result<Vec<(PathBuf, String)>, SessionStoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionStoreError::io("listing storage directory", &self.root, source))
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                SessionStoreError::io("listing storage directory", &self.root, source)
            })?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(suffix) && entry.path().is_file() {
                files.push((entry.path(), file_name));
            }
        }

        Ok(files)
    }
}

pub(crate) fn read_log(path: &Path) -> Result<Vec<ConversationEntry>, SessionStoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(SessionStoreError::io("opening log", path, source)),
    };

    let mut entries = Vec::new();
    for (line_index, line_result) in BufReader::new(file).lines().enumerate() {
        let line_number = line_index + 1;
        let line = line_result
            .map_err(|source| SessionStoreError::io_line(path, line_number, source))?;
        entries.push(parse_entry_line(path, line_number, &line)?);
    }

    Ok(entries)
}

pub(crate) fn parse_entry_line(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<ConversationEntry, SessionStoreError> {
    let entry = serde_json::from_str::<ConversationEntry>(line)
        .map_err(|source| SessionStoreError::json_line(path, line_number, line, source))?;
    entry
        .validate()
        .map_err(|source| SessionStoreError::InvalidEntry {
            path: path.to_path_buf(),
            line: line_number,
            content: line.to_string(),
            source,
        })?;
    Ok(entry)
}

fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}
