mod builtins;
mod completion;
mod editor;
mod executor;
#[cfg(unix)]
mod fd_guard;
mod history;
mod parser;
mod path;
mod redirect;
mod status;

use std::io::{self, Write};
use std::sync::atomic::Ordering;

const PROMPT: &str = "$ ";

fn main() {
    ctrlc::set_handler(|| {
        // While the editor holds the terminal in raw mode, Ctrl-C arrives as
        // a key event and is handled there; only print the fresh line when a
        // real SIGINT reaches us at the prompt.
        if !editor::RAW_INPUT_ACTIVE.load(Ordering::Relaxed) {
            println!();
            let _ = io::stdout().flush();
        }
    })
    .expect("Failed to set Ctrl-C handler");

    let mut editor = editor::LineEditor::new();

    loop {
        let line = match editor.read_line(PROMPT) {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("marlin: error reading input: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        editor.add_to_history(trimmed);

        // `exit` / `exit 0` as raw lines short-circuit before tokenization.
        if trimmed == "exit" || trimmed == "exit 0" {
            break;
        }

        let tokens = parser::tokenize(trimmed);
        if tokens.is_empty() {
            continue;
        }

        // Separate the redirection (if any) from the argument tokens.
        let (args, redirections) = redirect::extract_redirections(&tokens);
        if args.is_empty() {
            continue;
        }

        let action = if args.iter().any(|t| t == "|") {
            // A redirection extracted from a pipeline line is ignored.
            executor::execute_pipeline(&args, editor.history_mut())
        } else {
            let cmd = parser::Command {
                program: args[0].clone(),
                args: args[1..].to_vec(),
            };
            executor::execute(&cmd, &redirections, editor.history_mut())
        };

        if let executor::ExecutionAction::Exit(code) = action {
            std::process::exit(code);
        }
    }

    std::process::exit(0);
}
