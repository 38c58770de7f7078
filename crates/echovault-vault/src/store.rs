//! Session file storage: append, enumerate, replay, delete.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};
use walkdir::WalkDir;

use echovault_types::Memory;

use crate::entry::{parse_entries, render_entry};
use crate::error::VaultError;
use crate::lock::SessionLock;

const SESSION_SUFFIX: &str = "-session.md";

/// One session file, newest first in listings.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub project: String,
    pub date: String,
    pub path: PathBuf,
    pub entry_count: usize,
}

/// The Markdown vault rooted at `<home>/vault`. All paths are injected,
/// so tests run against temporary roots.
pub struct VaultStore {
    root: PathBuf,
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the vault directory if it does not exist yet.
    pub fn ensure_layout(&self) -> Result<(), VaultError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Today's session file for a project.
    pub fn session_path(&self, project: &str) -> PathBuf {
        let date = Local::now().format("%Y-%m-%d");
        self.root
            .join(sanitize(project))
            .join(format!("{date}{SESSION_SUFFIX}"))
    }

    /// Append one memory to the current session file, creating the file
    /// (with a heading) on first write. Serialized against concurrent
    /// invocations by the session lock.
    pub fn append(&self, memory: &Memory) -> Result<PathBuf, VaultError> {
        let path = self.session_path(&memory.project);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let _lock = SessionLock::acquire(&path)?;
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            let date = Local::now().format("%Y-%m-%d");
            writeln!(file, "# Session {date} ({})\n", memory.project)?;
        }
        file.write_all(render_entry(memory)?.as_bytes())?;
        writeln!(file)?;
        file.flush()?;

        debug!(id = %memory.id, file = %path.display(), "memory appended");
        Ok(path)
    }

    /// Replay every session file for one project, file-then-in-file
    /// order. Entries for the same id are all returned; callers fold
    /// them last-wins.
    pub fn read_project(&self, project: &str) -> Result<Vec<Memory>, VaultError> {
        self.read_dir(&self.root.join(sanitize(project)))
    }

    /// Replay the whole vault across projects.
    pub fn read_all(&self) -> Result<Vec<Memory>, VaultError> {
        self.read_dir(&self.root)
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<Memory>, VaultError> {
        let mut memories = Vec::new();
        for path in session_files(dir) {
            let content = fs::read_to_string(&path)?;
            let parsed = parse_entries(&content, &path.display().to_string())?;
            memories.extend(parsed.into_iter().map(|e| e.memory));
        }
        Ok(memories)
    }

    /// Remove every entry carrying `id` from the vault, rewriting only
    /// the affected files and only the targeted byte ranges. Returns
    /// how many entries were removed.
    pub fn delete(&self, id: &str) -> Result<usize, VaultError> {
        let mut removed = 0;
        for path in session_files(&self.root) {
            let _lock = SessionLock::acquire(&path)?;
            let content = fs::read_to_string(&path)?;
            let parsed = parse_entries(&content, &path.display().to_string())?;
            let doomed: Vec<_> = parsed.iter().filter(|e| e.memory.id == id).collect();
            if doomed.is_empty() {
                continue;
            }

            let mut rewritten = String::with_capacity(content.len());
            let mut cursor = 0;
            for entry in &doomed {
                rewritten.push_str(&content[cursor..entry.range.start]);
                cursor = entry.range.end;
            }
            rewritten.push_str(&content[cursor..]);
            fs::write(&path, rewritten)?;
            removed += doomed.len();
            info!(id, file = %path.display(), "vault entries removed");
        }
        Ok(removed)
    }

    /// Session files, newest first, optionally scoped to one project.
    pub fn list_sessions(&self, project: Option<&str>) -> Result<Vec<SessionInfo>, VaultError> {
        let dir = match project {
            Some(p) => self.root.join(sanitize(p)),
            None => self.root.clone(),
        };
        let mut sessions = Vec::new();
        for path in session_files(&dir) {
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            let date = file_name
                .strip_suffix(SESSION_SUFFIX)
                .unwrap_or(&file_name)
                .to_string();
            let project = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let content = fs::read_to_string(&path)?;
            let entry_count = parse_entries(&content, &path.display().to_string())?.len();
            sessions.push(SessionInfo {
                project,
                date,
                path,
                entry_count,
            });
        }
        sessions.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.project.cmp(&b.project)));
        Ok(sessions)
    }
}

/// All session files under `dir`, sorted by path for a stable replay
/// order.
fn session_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SESSION_SUFFIX))
        })
        .collect();
    files.sort();
    files
}

/// Project keys become directory names; anything path-hostile is
/// flattened to '-'.
fn sanitize(project: &str) -> String {
    project
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use echovault_types::{Category, MemoryDraft};
    use tempfile::TempDir;

    fn draft(project: &str, title: &str) -> Memory {
        Memory::from_draft(
            MemoryDraft::new(title, "something happened").with_category(Category::Context),
            project,
        )
    }

    #[test]
    fn test_append_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        let memory = draft("p1", "first note");

        let path = store.append(&memory).unwrap();
        assert!(path.exists());

        let all = store.read_project("p1").unwrap();
        assert_eq!(all, vec![memory]);
    }

    #[test]
    fn test_appends_accumulate_in_order() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        let a = draft("p1", "one");
        let b = draft("p1", "two");
        store.append(&a).unwrap();
        store.append(&b).unwrap();

        let all = store.read_project("p1").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "one");
        assert_eq!(all[1].title, "two");
    }

    #[test]
    fn test_delete_removes_only_target_entry() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        let keep = draft("p1", "keep");
        let doomed = draft("p1", "doomed");
        store.append(&keep).unwrap();
        store.append(&doomed).unwrap();

        let removed = store.delete(&doomed.id).unwrap();
        assert_eq!(removed, 1);

        let all = store.read_project("p1").unwrap();
        assert_eq!(all, vec![keep]);
    }

    #[test]
    fn test_delete_missing_id_is_silent() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        store.append(&draft("p1", "only")).unwrap();
        assert_eq!(store.delete("01NOPE").unwrap(), 0);
    }

    #[test]
    fn test_read_all_spans_projects() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        store.append(&draft("p1", "a")).unwrap();
        store.append(&draft("p2", "b")).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_list_sessions_scoped_and_counted() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        store.append(&draft("p1", "a")).unwrap();
        store.append(&draft("p1", "b")).unwrap();
        store.append(&draft("p2", "c")).unwrap();

        let sessions = store.list_sessions(Some("p1")).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].project, "p1");
        assert_eq!(sessions[0].entry_count, 2);

        let all = store.list_sessions(None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_project_names_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::new(dir.path());
        let memory = draft("my/odd project", "note");
        store.append(&memory).unwrap();
        assert!(dir.path().join("my-odd-project").is_dir());
        assert_eq!(store.read_project("my/odd project").unwrap().len(), 1);
    }
}
