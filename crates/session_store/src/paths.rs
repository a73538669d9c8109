use std::path::{Component, Path, PathBuf};

use crate::hash::{truncated_hex, PATH_HASH_LEN};

pub const STORAGE_DIR: [&str; 3] = [".rhizome", "vscodestate", "rubber"];
pub const ACTIVE_SUFFIX: &str = ".rubber.jsonl";
pub const ARCHIVED_SUFFIX: &str = ".rubber.archived.jsonl";

#[must_use]
pub fn storage_root(workspace_root: &Path) -> PathBuf {
    STORAGE_DIR
        .iter()
        .fold(workspace_root.to_path_buf(), |path, segment| path.join(segment))
}

/// Resolves `file_path` relative to the workspace. Paths outside the workspace
/// are kept as given so they still hash deterministically.
#[must_use]
pub fn workspace_relative(workspace_root: &Path, file_path: &Path) -> PathBuf {
    if file_path.is_absolute() {
        if let Ok(relative) = file_path.strip_prefix(workspace_root) {
            return relative.to_path_buf();
        }
    }

    file_path.to_path_buf()
}

/// Hash of the `/`-joined relative path, stable across platforms.
#[must_use]
pub fn path_hash(relative_path: &Path) -> String {
    let normalized = relative_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    truncated_hex(normalized.as_bytes(), PATH_HASH_LEN)
}

fn file_stem_for(relative_path: &Path) -> Option<String> {
    let base_name = relative_path.file_name()?.to_string_lossy();
    Some(format!("{base_name}-{}", path_hash(relative_path)))
}

#[must_use]
pub fn storage_file_name(relative_path: &Path) -> Option<String> {
    file_stem_for(relative_path).map(|stem| format!("{stem}{ACTIVE_SUFFIX}"))
}

#[must_use]
pub fn archived_file_name(relative_path: &Path) -> Option<String> {
    file_stem_for(relative_path).map(|stem| format!("{stem}{ARCHIVED_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_root_nests_under_rhizome_state() {
        let root = storage_root(Path::new("/ws"));
        assert_eq!(root, PathBuf::from("/ws/.rhizome/vscodestate/rubber"));
    }

    #[test]
    fn file_names_share_stem_and_differ_by_suffix() {
        let relative = Path::new("src/main.rs");
        let active = storage_file_name(relative).expect("file name");
        let archived = archived_file_name(relative).expect("file name");

        let hash = path_hash(relative);
        assert_eq!(hash.len(), PATH_HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(active, format!("main.rs-{hash}{ACTIVE_SUFFIX}"));
        assert_eq!(archived, format!("main.rs-{hash}{ARCHIVED_SUFFIX}"));
    }

    #[test]
    fn same_base_name_in_different_directories_does_not_collide() {
        assert_ne!(
            storage_file_name(Path::new("src/a")),
            storage_file_name(Path::new("lib/a"))
        );
    }

    #[test]
    fn absolute_paths_inside_workspace_are_made_relative() {
        let relative = workspace_relative(Path::new("/ws"), Path::new("/ws/src/lib.rs"));
        assert_eq!(relative, PathBuf::from("src/lib.rs"));
        assert_eq!(
            path_hash(&relative),
            path_hash(Path::new("./src/lib.rs"))
        );
    }

    #[test]
    fn path_without_file_name_has_no_storage_name() {
        assert_eq!(storage_file_name(Path::new("/")), None);
    }
}
