use std::io::Write;
use std::path::Path;

use crate::history::History;
use crate::path;

/// The list of all builtin command names.
pub const BUILTINS: &[&str] = &["cd", "pwd", "exit", "echo", "type", "history"];

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// What the driver should do after a builtin runs.
#[derive(Debug)]
pub enum BuiltinAction {
    Continue(i32),
    Exit(i32),
}

/// Execute a builtin command, writing output to the provided streams.
pub fn execute(
    program: &str,
    args: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    history: &mut History,
) -> BuiltinAction {
    let code = match program {
        "cd" => builtin_cd(args, stderr),
        "pwd" => builtin_pwd(stdout, stderr),
        "exit" => return builtin_exit(args),
        "echo" => builtin_echo(args, stdout),
        "type" => builtin_type(args, stdout),
        "history" => builtin_history(args, stdout, stderr, history),
        _ => {
            let _ = writeln!(stderr, "marlin: unknown builtin: {program}");
            1
        }
    };
    BuiltinAction::Continue(code)
}

fn builtin_cd(args: &[String], stderr: &mut dyn Write) -> i32 {
    // No argument: nothing to do.
    let Some(arg) = args.first() else {
        return 0;
    };

    let target = if arg == "~" {
        match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                let _ = writeln!(stderr, "cd: HOME not set");
                return 1;
            }
        }
    } else {
        arg.clone()
    };

    if std::env::set_current_dir(&target).is_err() {
        let _ = writeln!(stderr, "cd: {arg}: No such file or directory");
        return 1;
    }

    0
}

fn builtin_pwd(stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    match std::env::current_dir() {
        Ok(path) => {
            let _ = writeln!(stdout, "{}", path.display());
            0
        }
        Err(e) => {
            let _ = writeln!(stderr, "pwd: {e}");
            1
        }
    }
}

fn builtin_exit(args: &[String]) -> BuiltinAction {
    // `exit` and `exit 0` leave with status 0; any other numeric
    // argument is passed through.
    let code = args.first().and_then(|s| s.parse().ok()).unwrap_or(0);
    BuiltinAction::Exit(code)
}

fn builtin_echo(args: &[String], stdout: &mut dyn Write) -> i32 {
    let _ = writeln!(stdout, "{}", args.join(" "));
    0
}

fn builtin_type(args: &[String], stdout: &mut dyn Write) -> i32 {
    let mut exit_code = 0;
    for arg in args {
        if is_builtin(arg) {
            let _ = writeln!(stdout, "{arg} is a shell builtin");
        } else {
            match path::find_in_path(arg) {
                Some(path) => {
                    let _ = writeln!(stdout, "{arg} is {}", path.display());
                }
                None => {
                    let _ = writeln!(stdout, "{arg}: not found");
                    exit_code = 1;
                }
            }
        }
    }
    exit_code
}

fn builtin_history(
    args: &[String],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    history: &mut History,
) -> i32 {
    // history -r FILE: load entries from FILE into the store.
    if args.len() == 2 && args[0] == "-r" {
        if let Err(e) = history.load_from(Path::new(&args[1])) {
            let _ = writeln!(stderr, "history: {}: {e}", args[1]);
            return 1;
        }
        return 0;
    }

    // A single numeric argument prints the last N entries; anything
    // else prints the whole list. Indices stay 1-based and absolute.
    let entries = history.entries();
    let start = match args.first().and_then(|s| s.parse::<usize>().ok()) {
        Some(n) => entries.len().saturating_sub(n),
        None => 0,
    };

    for (idx, entry) in entries.iter().enumerate().skip(start) {
        let _ = writeln!(stdout, " {} {}", idx + 1, entry);
    }
    0
}
