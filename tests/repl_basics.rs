use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

// ── Helpers ───────────────────────────────────────────────────────────────────

static HOME_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// RAII temp HOME — keeps each shell's `.marlin_history` isolated so
/// concurrent tests cannot race on the real one.
struct TempHome(PathBuf);

impl TempHome {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!(
            "marlin_test_home_{}_{}",
            std::process::id(),
            HOME_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).expect("create temp home");
        TempHome(dir)
    }
}

impl Drop for TempHome {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Spawn the shell with an isolated HOME, feed `lines` via stdin
/// (followed by `exit`), and return the full output.
fn run_shell(lines: &[&str]) -> std::process::Output {
    let home = TempHome::new();
    let mut child = Command::new(env!("CARGO_BIN_EXE_marlin-shell"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("HOME", &home.0)
        .env("USERPROFILE", &home.0)
        .spawn()
        .expect("spawn marlin-shell");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

fn stdout_of(lines: &[&str]) -> String {
    String::from_utf8_lossy(&run_shell(lines).stdout).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn echo_preserves_quoted_whitespace() {
    let stdout = stdout_of(&["echo 'hello   world'"]);
    assert!(stdout.contains("hello   world"), "stdout was: {stdout}");
}

#[test]
fn echo_double_quote_escapes() {
    let stdout = stdout_of(&[r#"echo "a\"b" c"#]);
    assert!(stdout.contains(r#"a"b c"#), "stdout was: {stdout}");
}

#[test]
fn echo_joins_adjacent_quoted_segments() {
    let stdout = stdout_of(&["echo a'b'c"]);
    assert!(stdout.contains("abc"), "stdout was: {stdout}");
}

#[test]
fn pwd_prints_the_working_directory() {
    let cwd = std::env::current_dir().unwrap();
    let stdout = stdout_of(&["pwd"]);
    assert!(
        stdout.contains(&cwd.display().to_string()),
        "stdout was: {stdout}"
    );
}

#[test]
fn type_reports_builtin_and_external() {
    let stdout = stdout_of(&["type type", "type echo"]);
    assert!(stdout.contains("type is a shell builtin"), "stdout was: {stdout}");
    assert!(stdout.contains("echo is a shell builtin"), "stdout was: {stdout}");
}

#[cfg(unix)]
#[test]
fn type_resolves_external_commands_on_path() {
    let stdout = stdout_of(&["type ls"]);
    assert!(stdout.contains("ls is /"), "stdout was: {stdout}");
}

#[test]
fn type_reports_unknown_names() {
    let stdout = stdout_of(&["type definitely-not-a-command-xyz"]);
    assert!(
        stdout.contains("definitely-not-a-command-xyz: not found"),
        "stdout was: {stdout}"
    );
}

#[test]
fn unknown_command_is_reported_and_shell_continues() {
    let stdout = stdout_of(&["nosuchcmd-xyz", "echo STILL_ALIVE"]);
    assert!(
        stdout.contains("nosuchcmd-xyz: command not found"),
        "stdout was: {stdout}"
    );
    assert!(stdout.contains("STILL_ALIVE"), "stdout was: {stdout}");
}

#[test]
fn empty_lines_are_skipped() {
    let output = run_shell(&["", "   ", "echo after-blanks"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("after-blanks"), "stdout was: {stdout}");
}

#[test]
fn exit_terminates_with_status_zero() {
    let output = run_shell(&[]);
    assert!(output.status.success());

    let output = run_shell(&["exit 0"]);
    assert!(output.status.success());
}

#[test]
fn eof_terminates_with_status_zero() {
    let home = TempHome::new();
    let mut child = Command::new(env!("CARGO_BIN_EXE_marlin-shell"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("HOME", &home.0)
        .env("USERPROFILE", &home.0)
        .spawn()
        .expect("spawn marlin-shell");
    // Close stdin without sending `exit`.
    drop(child.stdin.take());
    let output = child.wait_with_output().expect("wait output");
    assert!(output.status.success());
}

#[cfg(unix)]
#[test]
fn cd_changes_directory_for_later_commands() {
    let stdout = stdout_of(&["cd /", "pwd"]);
    assert!(stdout.contains("$ /\n"), "stdout was: {stdout}");
}

#[test]
fn cd_failure_is_reported_with_the_argument() {
    let output = run_shell(&["cd /no/such/dir/anywhere", "echo STILL_ALIVE"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stderr.contains("cd: /no/such/dir/anywhere: No such file or directory"),
        "stderr was: {stderr}"
    );
    assert!(stdout.contains("STILL_ALIVE"), "stdout was: {stdout}");
}

#[test]
fn history_lists_commands_with_indices() {
    let stdout = stdout_of(&["echo one", "echo two", "history"]);
    assert!(stdout.contains(" 1 echo one"), "stdout was: {stdout}");
    assert!(stdout.contains(" 2 echo two"), "stdout was: {stdout}");
    assert!(stdout.contains(" 3 history"), "stdout was: {stdout}");
}

#[test]
fn history_with_count_prints_the_tail_with_absolute_indices() {
    let stdout = stdout_of(&["echo one", "echo two", "history 2"]);
    assert!(!stdout.contains(" 1 echo one"), "stdout was: {stdout}");
    assert!(stdout.contains(" 2 echo two"), "stdout was: {stdout}");
    assert!(stdout.contains(" 3 history 2"), "stdout was: {stdout}");
}

#[test]
fn history_r_loads_entries_from_a_file() {
    let file = std::env::temp_dir().join(format!("marlin_hist_load_{}", std::process::id()));
    std::fs::write(&file, "loaded alpha\nloaded beta\n").unwrap();

    let cmd = format!("history -r {}", file.display());
    let stdout = stdout_of(&[cmd.as_str(), "history"]);
    assert!(stdout.contains("loaded alpha"), "stdout was: {stdout}");
    assert!(stdout.contains("loaded beta"), "stdout was: {stdout}");

    let _ = std::fs::remove_file(&file);
}

#[test]
fn history_file_written_in_home() {
    let home = TempHome::new();
    let marker = "echo HISTORY_WRITTEN_MARKER";
    let mut child = Command::new(env!("CARGO_BIN_EXE_marlin-shell"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("HOME", &home.0)
        .env("USERPROFILE", &home.0)
        .spawn()
        .expect("spawn marlin-shell");
    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "{marker}").unwrap();
        writeln!(stdin, "exit").unwrap();
    }
    let output = child.wait_with_output().expect("wait output");
    assert!(output.status.success());

    let contents = std::fs::read_to_string(home.0.join(".marlin_history"))
        .expect("read .marlin_history");
    assert!(contents.contains(marker), "history file was:\n{contents}");
}
