use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MAX_HISTORY_SIZE: usize = 10_000;

/// The shell's command history: an in-memory list backed by
/// `~/.marlin_history` when HOME is available.
///
/// Every accepted line is recorded, duplicates included, so the 1-based
/// indices printed by the `history` builtin match the session.
pub struct History {
    entries: Vec<String>,
    /// Path to `~/.marlin_history`, or `None` when HOME is not set.
    path: Option<PathBuf>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Create a history store loaded from `~/.marlin_history`.
    pub fn new() -> Self {
        let mut history = History {
            entries: Vec::new(),
            path: None,
        };
        if let Some(path) = storage_path() {
            // A missing or unreadable file just means no prior history.
            let _ = history.load_from(&path);
            history.path = Some(path);
        }
        history
    }

    /// An empty, non-persistent store (used where the real history is
    /// out of reach, e.g. builtin stages running mid-pipeline).
    pub fn empty() -> Self {
        History {
            entries: Vec::new(),
            path: None,
        }
    }

    /// Record `line` and append it to the history file.
    ///
    /// Empty lines (after trimming) are ignored. The in-memory list is
    /// trimmed to `MAX_HISTORY_SIZE`.
    pub fn push(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        self.entries.push(trimmed.to_string());
        if self.entries.len() > MAX_HISTORY_SIZE {
            let excess = self.entries.len() - MAX_HISTORY_SIZE;
            self.entries.drain(..excess);
        }
        self.persist(trimmed);
    }

    /// Append the entries stored in `path` (backs `history -r FILE`).
    pub fn load_from(&mut self, path: &Path) -> io::Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.entries
            .extend(contents.lines().filter(|l| !l.is_empty()).map(str::to_string));
        Ok(())
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-effort append to the backing file; history must keep
    /// working in sessions where the file cannot be written.
    fn persist(&self, line: &str) {
        let Some(path) = &self.path else { return };
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{line}");
        }
    }
}

fn storage_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(Path::new(&home).join(".marlin_history"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lines_are_not_recorded() {
        let mut h = History::empty();
        h.push("");
        h.push("   ");
        assert!(h.is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        let mut h = History::empty();
        h.push("ls");
        h.push("ls");
        h.push("ls");
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn lines_are_trimmed_before_recording() {
        let mut h = History::empty();
        h.push("  echo hi  ");
        assert_eq!(h.entries(), ["echo hi"]);
    }

    #[test]
    fn capped_at_max_size() {
        let mut h = History::empty();
        for i in 0..MAX_HISTORY_SIZE + 5 {
            h.push(&format!("cmd-{i}"));
        }
        assert_eq!(h.len(), MAX_HISTORY_SIZE);
        // Oldest entries evicted; newest still present.
        assert_eq!(
            h.entries().last().unwrap(),
            &format!("cmd-{}", MAX_HISTORY_SIZE + 4)
        );
    }

    #[test]
    fn load_from_appends_file_entries() {
        let file = std::env::temp_dir().join(format!("marlin_hist_{}", std::process::id()));
        std::fs::write(&file, "first\nsecond\n\nthird\n").unwrap();

        let mut h = History::empty();
        h.push("existing");
        h.load_from(&file).unwrap();
        assert_eq!(h.entries(), ["existing", "first", "second", "third"]);

        let _ = std::fs::remove_file(&file);
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let mut h = History::empty();
        assert!(h.load_from(Path::new("/no/such/history/file")).is_err());
        assert!(h.is_empty());
    }

    #[test]
    fn persisted_lines_survive_a_reload() {
        let dir = std::env::temp_dir().join(format!("marlin_hist_dir_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".marlin_history");

        let mut h = History {
            entries: Vec::new(),
            path: Some(path.clone()),
        };
        h.push("echo persisted");

        let mut reloaded = History::empty();
        reloaded.load_from(&path).unwrap();
        assert_eq!(reloaded.entries(), ["echo persisted"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
