use os_pipe::{PipeReader, pipe};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::process::{Command, Stdio};

use crate::builtins::{self, BuiltinAction};
#[cfg(unix)]
use crate::fd_guard;
use crate::history::History;
use crate::parser;
use crate::path;
use crate::redirect::{RedirectMode, RedirectTarget, RedirectionSet};
use crate::status;

#[derive(Debug)]
pub enum ExecutionAction {
    Continue(i32),
    Exit(i32),
}

/// Execute a parsed command with optional redirections.
/// Builtins are checked first, then external programs.
pub fn execute(
    cmd: &parser::Command,
    redirections: &RedirectionSet,
    history: &mut History,
) -> ExecutionAction {
    if builtins::is_builtin(&cmd.program) {
        return run_builtin(cmd, redirections, history);
    }

    ExecutionAction::Continue(run_external(cmd, redirections))
}

/// Execute a `|`-separated token sequence as a pipeline.
///
/// Each stage gets its stdin from the previous pipe's read end and its
/// stdout into the next pipe's write end. External stages are spawned
/// as children; builtin stages run in-process — the last one
/// synchronously against the real history, earlier ones on threads so
/// the pipe has a writer-side producer without blocking the loop. The
/// parent relinquishes every pipe handle before waiting, then reaps
/// all children.
pub fn execute_pipeline(tokens: &[String], history: &mut History) -> ExecutionAction {
    let stages = match split_stages(tokens) {
        Ok(stages) => stages,
        Err(msg) => {
            eprintln!("{msg}");
            return ExecutionAction::Continue(2);
        }
    };

    if stages.len() == 1 {
        return execute(&stages[0], &RedirectionSet::default(), history);
    }

    if stages.iter().any(|cmd| cmd.program == "exit") {
        eprintln!("marlin: 'exit' is not supported in pipelines");
        return ExecutionAction::Continue(1);
    }

    let last_is_external = stages
        .last()
        .is_some_and(|cmd| !builtins::is_builtin(&cmd.program));

    let mut children: Vec<std::process::Child> = Vec::new();
    let mut builtin_threads: Vec<std::thread::JoinHandle<()>> = Vec::new();
    let mut prev_pipe: Option<PipeReader> = None;
    let mut last_status = 0;
    let mut last_external_index: Option<usize> = None;

    for (idx, stage) in stages.iter().enumerate() {
        let is_last = idx + 1 == stages.len();
        let stdin_pipe = prev_pipe.take();

        let (stdout_pipe, next_pipe_reader) = if !is_last {
            match pipe() {
                Ok((reader, writer)) => (Some(writer), Some(reader)),
                Err(e) => {
                    eprintln!("marlin: failed to create pipe: {e}");
                    wait_children(&mut children);
                    return ExecutionAction::Continue(1);
                }
            }
        } else {
            (None, None)
        };

        if builtins::is_builtin(&stage.program) {
            // No builtin reads stdin; dropping the handle closes the
            // read end so the upstream writer is not left hanging.
            drop(stdin_pipe);

            let mut writer: Box<dyn Write + Send> = match stdout_pipe {
                Some(w) => Box::new(w),
                None => Box::new(io::stdout()),
            };

            if is_last {
                // Last stage: run synchronously so it sees the real
                // history and yields the pipeline's final status.
                let status = match builtins::execute(
                    &stage.program,
                    &stage.args,
                    writer.as_mut(),
                    &mut io::stderr(),
                    history,
                ) {
                    BuiltinAction::Continue(code) | BuiltinAction::Exit(code) => code,
                };
                let _ = writer.flush();
                last_status = status;
            } else {
                // Non-last stage: the downstream stage hasn't been
                // spawned yet, so running the builtin here would
                // deadlock once its output exceeds the OS pipe buffer.
                // Run it on a thread instead — external stages are
                // already concurrent processes. `history` mid-pipeline
                // reads a throwaway empty store.
                let program = stage.program.clone();
                let args = stage.args.clone();
                let handle = std::thread::spawn(move || {
                    let mut local_history = History::empty();
                    let _ = builtins::execute(
                        &program,
                        &args,
                        writer.as_mut(),
                        &mut io::stderr(),
                        &mut local_history,
                    );
                    let _ = writer.flush();
                });
                builtin_threads.push(handle);
            }
        } else {
            match path::resolve(&stage.program) {
                None => {
                    // The stage's pipe handles drop here, so its
                    // neighbors see EOF and the rest of the line runs.
                    println!("{}: command not found", stage.program);
                }
                Some(program) => {
                    let mut process = Command::new(&program);
                    process.args(&stage.args);
                    restore_default_sigpipe(&mut process);
                    process.stdin(stdin_pipe.map(Stdio::from).unwrap_or_else(Stdio::inherit));
                    process.stdout(stdout_pipe.map(Stdio::from).unwrap_or_else(Stdio::inherit));

                    match process.spawn() {
                        Ok(child) => {
                            last_external_index = Some(children.len());
                            children.push(child);
                        }
                        Err(e) => {
                            eprintln!("execvp: {e}");
                        }
                    }
                }
            }
        }

        prev_pipe = next_pipe_reader;
    }

    // Join builtin threads before waiting on children so every pipe
    // writer is closed (EOF for downstream readers) by the time we
    // block in wait().
    for handle in builtin_threads {
        let _ = handle.join();
    }

    for (idx, child) in children.iter_mut().enumerate() {
        match child.wait() {
            Ok(status) => {
                if last_is_external && Some(idx) == last_external_index {
                    last_status = status::exit_code(status);
                }
            }
            Err(e) => {
                eprintln!("marlin: failed waiting for pipeline stage: {e}");
                last_status = 1;
            }
        }
    }

    ExecutionAction::Continue(last_status)
}

/// Split a token sequence on `|` into per-stage commands.
/// An empty stage (leading, trailing, or doubled `|`) is a syntax error.
fn split_stages(tokens: &[String]) -> Result<Vec<parser::Command>, String> {
    let mut stages = Vec::new();
    for segment in tokens.split(|t| t.as_str() == "|") {
        if segment.is_empty() {
            return Err("marlin: syntax error near unexpected token `|'".to_string());
        }
        stages.push(parser::Command {
            program: segment[0].clone(),
            args: segment[1..].to_vec(),
        });
    }
    Ok(stages)
}

// ── Builtin execution with redirections ──

/// Run a builtin in-process, rebinding the shell's own stdio fds for
/// the duration when redirections are present. The guard restores the
/// original fds on every exit path.
#[cfg(unix)]
fn run_builtin(
    cmd: &parser::Command,
    redirections: &RedirectionSet,
    history: &mut History,
) -> ExecutionAction {
    let _guard = if redirections.is_empty() {
        None
    } else {
        match fd_guard::RedirectGuard::apply(redirections) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("open: {e}");
                return ExecutionAction::Continue(1);
            }
        }
    };

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let action = match builtins::execute(&cmd.program, &cmd.args, &mut stdout, &mut stderr, history)
    {
        BuiltinAction::Continue(code) => ExecutionAction::Continue(code),
        BuiltinAction::Exit(code) => ExecutionAction::Exit(code),
    };

    // Flush while the redirection is still in place; the guard then
    // restores the shell's stdio on drop.
    let _ = stdout.flush();
    let _ = stderr.flush();

    action
}

/// Non-unix fallback: hand the opened files to the builtin as its
/// output streams instead of rebinding process-wide fds.
#[cfg(not(unix))]
fn run_builtin(
    cmd: &parser::Command,
    redirections: &RedirectionSet,
    history: &mut History,
) -> ExecutionAction {
    let mut stdout_writer: Box<dyn Write> = match &redirections.stdout {
        Some(target) => match open_redirect_file(target) {
            Ok(file) => Box::new(file),
            Err(e) => {
                eprintln!("open: {e}");
                return ExecutionAction::Continue(1);
            }
        },
        None => Box::new(io::stdout()),
    };
    let mut stderr_writer: Box<dyn Write> = match &redirections.stderr {
        Some(target) => match open_redirect_file(target) {
            Ok(file) => Box::new(file),
            Err(e) => {
                eprintln!("open: {e}");
                return ExecutionAction::Continue(1);
            }
        },
        None => Box::new(io::stderr()),
    };

    let action = match builtins::execute(
        &cmd.program,
        &cmd.args,
        stdout_writer.as_mut(),
        stderr_writer.as_mut(),
        history,
    ) {
        BuiltinAction::Continue(code) => ExecutionAction::Continue(code),
        BuiltinAction::Exit(code) => ExecutionAction::Exit(code),
    };

    let _ = stdout_writer.flush();
    let _ = stderr_writer.flush();

    action
}

// ── External command execution with redirections ──

/// Resolve and spawn an external program, wiring redirection targets
/// onto the child's stdio. The shell's own streams are untouched.
fn run_external(cmd: &parser::Command, redirections: &RedirectionSet) -> i32 {
    let Some(program) = path::resolve(&cmd.program) else {
        println!("{}: command not found", cmd.program);
        return 127;
    };

    let mut process = Command::new(&program);
    process.args(&cmd.args);
    restore_default_sigpipe(&mut process);

    if let Some(target) = &redirections.stdout {
        match open_redirect_file(target) {
            Ok(file) => {
                process.stdout(Stdio::from(file));
            }
            Err(e) => {
                eprintln!("open: {e}");
                return 1;
            }
        }
    }
    if let Some(target) = &redirections.stderr {
        match open_redirect_file(target) {
            Ok(file) => {
                process.stderr(Stdio::from(file));
            }
            Err(e) => {
                eprintln!("open: {e}");
                return 1;
            }
        }
    }

    match process.spawn() {
        Ok(mut child) => match child.wait() {
            Ok(status) => status::exit_code(status),
            Err(e) => {
                eprintln!("marlin: {}: {e}", cmd.program);
                1
            }
        },
        Err(e) => {
            eprintln!("execvp: {e}");
            1
        }
    }
}

/// Restore SIGPIPE to its default disposition in spawned children.
///
/// The Rust runtime ignores SIGPIPE and SIG_IGN survives exec(), so
/// without this a pipeline stage writing into a closed pipe would see
/// EPIPE errors instead of dying the way shells expect.
#[cfg(unix)]
fn restore_default_sigpipe(process: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        process.pre_exec(|| {
            if libc::signal(libc::SIGPIPE, libc::SIG_DFL) == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn restore_default_sigpipe(_process: &mut Command) {}

/// Open a redirection target: create + truncate, or create + append.
pub(crate) fn open_redirect_file(target: &RedirectTarget) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match target.mode {
        RedirectMode::Truncate => {
            options.write(true).truncate(true);
        }
        RedirectMode::Append => {
            options.append(true);
        }
    }
    options.open(&target.path)
}

fn wait_children(children: &mut Vec<std::process::Child>) {
    for mut child in children.drain(..) {
        let _ = child.wait();
    }
}
