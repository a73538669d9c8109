use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use session_store::file_content_hash;

/// Snapshot of the watched file taken at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    lines: Vec<String>,
    language: &'static str,
    content_hash: String,
}

impl SourceFile {
    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_content(path, &content))
    }

    #[must_use]
    pub fn from_content(path: impl Into<PathBuf>, content: &str) -> Self {
        let path = path.into();
        Self {
            language: detect_language(&path),
            lines: content.lines().map(str::to_string).collect(),
            content_hash: file_content_hash(content),
            path,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn language(&self) -> &'static str {
        self.language
    }

    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// 1-indexed line lookup.
    #[must_use]
    pub fn line(&self, line_num: usize) -> Option<&str> {
        line_num
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    /// Up to `count` lines immediately before `line_num`, oldest first.
    #[must_use]
    pub fn preceding_context(&self, line_num: usize, count: usize) -> Vec<String> {
        let end = line_num.saturating_sub(1).min(self.lines.len());
        let start = end.saturating_sub(count);
        self.lines[start..end].to_vec()
    }
}

/// Makes `path` absolute against `base` and folds `.` and `..` lexically, so a
/// file names the same log whichever directory the command runs from.
#[must_use]
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

#[must_use]
pub fn detect_language(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "rs" => "rust",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "rb" => "ruby",
        "sh" | "bash" | "zsh" => "shell",
        "md" | "markdown" => "markdown",
        "toml" => "toml",
        "json" | "jsonl" => "json",
        "yml" | "yaml" => "yaml",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "def greet(name):\n    \"\"\"Say hi.\"\"\"\n\n    return f\"hi {name}\"\n";

    #[test]
    fn lines_are_one_indexed() {
        let source = SourceFile::from_content("test.py", SAMPLE);
        assert_eq!(source.total_lines(), 4);
        assert_eq!(source.line(1), Some("def greet(name):"));
        assert_eq!(source.line(3), Some(""));
        assert_eq!(source.line(0), None);
        assert_eq!(source.line(5), None);
        assert_eq!(source.language(), "python");
    }

    #[test]
    fn preceding_context_stops_at_file_start() {
        let source = SourceFile::from_content("test.py", SAMPLE);
        assert!(source.preceding_context(1, 5).is_empty());
        assert_eq!(
            source.preceding_context(4, 2),
            vec!["    \"\"\"Say hi.\"\"\"".to_string(), String::new()]
        );
        assert_eq!(source.preceding_context(3, 10).len(), 2);
    }

    #[test]
    fn crlf_line_endings_are_stripped() {
        let source = SourceFile::from_content("a.ts", "let a = 1;\r\nlet b = 2;\r\n");
        assert_eq!(source.line(2), Some("let b = 2;"));
        assert_eq!(source.language(), "typescript");
    }

    #[cfg(unix)]
    #[test]
    fn resolve_path_anchors_relative_paths_at_base() {
        let base = Path::new("/ws/src");
        assert_eq!(resolve_path(base, Path::new("a.py")), PathBuf::from("/ws/src/a.py"));
        assert_eq!(
            resolve_path(base, Path::new("../lib/./a.py")),
            PathBuf::from("/ws/lib/a.py")
        );
        assert_eq!(resolve_path(base, Path::new(".")), PathBuf::from("/ws/src"));
        assert_eq!(resolve_path(base, Path::new("/other/b.rs")), PathBuf::from("/other/b.rs"));
    }

    #[test]
    fn unknown_extensions_are_plaintext() {
        assert_eq!(detect_language(Path::new("notes")), "plaintext");
        assert_eq!(detect_language(Path::new("Cargo.TOML")), "toml");
    }
}
