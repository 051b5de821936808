use std::path::{Path, PathBuf};

/// Resolve a command name to the program path to execute.
///
/// Names containing a path separator (`/foo`, `./foo`, `a/b`) bypass the
/// PATH search and are used verbatim; a bad path surfaces later as an
/// exec failure. Bare names are searched on PATH.
pub fn resolve(cmd: &str) -> Option<PathBuf> {
    if cmd.contains('/') {
        return Some(PathBuf::from(cmd));
    }
    find_in_path(cmd)
}

/// Search PATH for an executable with the given name.
///
/// PATH is rescanned on every call; nothing is cached between lookups.
pub fn find_in_path(cmd: &str) -> Option<PathBuf> {
    let path_var = std::env::var("PATH").ok()?;
    search_path(&path_var, cmd)
}

fn search_path(path_var: &str, cmd: &str) -> Option<PathBuf> {
    for dir in path_var.split(path_separator()) {
        let full_path = Path::new(dir).join(cmd);
        if is_executable(&full_path) {
            return Some(full_path);
        }
        // On Windows, also try common executable extensions
        if cfg!(windows) {
            for ext in &["exe", "cmd", "bat", "com"] {
                let with_ext = full_path.with_extension(ext);
                if is_executable(&with_ext) {
                    return Some(with_ext);
                }
            }
        }
    }
    None
}

/// Names of executables on PATH starting with `prefix`, in PATH order.
///
/// Lazily walks each PATH directory; unreadable directories are skipped.
/// Calling it again restarts the scan, so the sequence is restartable.
pub fn executables_matching(prefix: &str) -> impl Iterator<Item = String> {
    let prefix = prefix.to_string();
    let dirs: Vec<PathBuf> = std::env::var("PATH")
        .unwrap_or_default()
        .split(path_separator())
        .map(PathBuf::from)
        .collect();

    dirs.into_iter().flat_map(move |dir| {
        let prefix = prefix.clone();
        std::fs::read_dir(dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(move |entry| {
                let name = entry.file_name().into_string().ok()?;
                if name.starts_with(&prefix) && is_executable(&entry.path()) {
                    Some(name)
                } else {
                    None
                }
            })
    })
}

/// Check if a path points to an executable regular file.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    // On Unix, check the executable permission bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        return meta.permissions().mode() & 0o111 != 0;
    }

    // On Windows, being a file with the right extension is sufficient
    #[cfg(not(unix))]
    {
        let extension = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return false,
        };

        let pathext =
            std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
        pathext
            .split(';')
            .any(|ext| extension == ext.trim_start_matches('.').to_ascii_lowercase())
    }
}

fn path_separator() -> char {
    if cfg!(windows) { ';' } else { ':' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_names_bypass_path_search() {
        assert_eq!(
            resolve("/definitely/not/on/path"),
            Some(PathBuf::from("/definitely/not/on/path"))
        );
        assert_eq!(resolve("./local"), Some(PathBuf::from("./local")));
    }

    #[cfg(unix)]
    #[test]
    fn search_path_finds_first_executable_match() {
        use std::os::unix::fs::PermissionsExt;

        let base = std::env::temp_dir().join(format!("marlin_path_{}", std::process::id()));
        let first = base.join("first");
        let second = base.join("second");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();

        // Same executable name in both dirs — the earlier PATH entry must win.
        for dir in [&first, &second] {
            let file = dir.join("tool");
            std::fs::write(&file, "#!/bin/sh\n").unwrap();
            std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let path_var = format!("{}:{}", first.display(), second.display());
        let found = search_path(&path_var, "tool").unwrap();
        assert_eq!(found, first.join("tool"));

        let _ = std::fs::remove_dir_all(&base);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_files_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let base = std::env::temp_dir().join(format!("marlin_noexec_{}", std::process::id()));
        std::fs::create_dir_all(&base).unwrap();
        let file = base.join("plain");
        std::fs::write(&file, "data").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(!is_executable(&file));
        assert!(search_path(&base.display().to_string(), "plain").is_none());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn missing_entries_do_not_match() {
        assert!(search_path("/nonexistent-dir-xyz", "anything").is_none());
    }

    #[test]
    fn directories_are_not_executable_files() {
        assert!(!is_executable(Path::new("/")));
    }
}
