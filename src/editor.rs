use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor::{MoveTo, MoveToColumn},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    terminal::{self, Clear, ClearType},
    tty::IsTty,
};

use crate::completion;
use crate::history::History;

/// Set while the prompt owns the terminal in raw mode. The SIGINT
/// handler in `main.rs` checks it: with raw mode on, Ctrl-C arrives as
/// a key event and is handled here, so the handler's fresh-line print
/// is only wanted for signals that land between reads.
pub static RAW_INPUT_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Holds the terminal in raw mode for the lifetime of the value; drop
/// order guarantees cooked mode comes back even on a panic.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        RAW_INPUT_ACTIVE.store(true, Ordering::Relaxed);
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        RAW_INPUT_ACTIVE.store(false, Ordering::Relaxed);
        let _ = terminal::disable_raw_mode();
    }
}

// ── Key decoding ──────────────────────────────────────────────────────────────

/// What a keystroke asks the editor to do. Decoding is a pure function
/// separate from applying, so the keymap and the buffer edits can be
/// tested without a terminal.
#[derive(Debug, PartialEq, Eq)]
enum Edit {
    Insert(char),
    DeleteBack,
    DeleteForward,
    /// Ctrl-D: end of input on an empty line, delete-forward otherwise.
    DeleteOrEof,
    Move(Caret),
    KillToEnd,
    KillToStart,
    KillWord,
    BrowseOlder,
    BrowseNewer,
    Complete,
    ClearScreen,
    CancelLine,
    Submit,
    Ignore,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Caret {
    Left,
    Right,
    Start,
    End,
}

fn decode(key: KeyEvent) -> Edit {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('a') => Edit::Move(Caret::Start),
            KeyCode::Char('b') => Edit::Move(Caret::Left),
            KeyCode::Char('c') => Edit::CancelLine,
            KeyCode::Char('d') => Edit::DeleteOrEof,
            KeyCode::Char('e') => Edit::Move(Caret::End),
            KeyCode::Char('f') => Edit::Move(Caret::Right),
            KeyCode::Char('k') => Edit::KillToEnd,
            KeyCode::Char('l') => Edit::ClearScreen,
            KeyCode::Char('u') => Edit::KillToStart,
            KeyCode::Char('w') => Edit::KillWord,
            _ => Edit::Ignore,
        };
    }

    match key.code {
        KeyCode::Enter => Edit::Submit,
        KeyCode::Tab => Edit::Complete,
        KeyCode::Backspace => Edit::DeleteBack,
        KeyCode::Delete => Edit::DeleteForward,
        KeyCode::Left => Edit::Move(Caret::Left),
        KeyCode::Right => Edit::Move(Caret::Right),
        KeyCode::Home => Edit::Move(Caret::Start),
        KeyCode::End => Edit::Move(Caret::End),
        KeyCode::Up => Edit::BrowseOlder,
        KeyCode::Down => Edit::BrowseNewer,
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::ALT) => Edit::Insert(c),
        _ => Edit::Ignore,
    }
}

// ── Line buffer ───────────────────────────────────────────────────────────────

/// The line under edit: chars plus a caret index. Chars rather than a
/// byte string keep caret arithmetic valid for multibyte input.
#[derive(Default)]
struct LineBuffer {
    chars: Vec<char>,
    caret: usize,
}

impl LineBuffer {
    fn text(&self) -> String {
        self.chars.iter().collect()
    }

    fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    fn clear(&mut self) {
        self.chars.clear();
        self.caret = 0;
    }

    /// Replace the whole line, caret at the end.
    fn set_text(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.caret = self.chars.len();
    }

    fn insert(&mut self, c: char) {
        self.chars.insert(self.caret, c);
        self.caret += 1;
    }

    fn delete_back(&mut self) {
        if self.caret > 0 {
            self.caret -= 1;
            self.chars.remove(self.caret);
        }
    }

    fn delete_forward(&mut self) {
        if self.caret < self.chars.len() {
            self.chars.remove(self.caret);
        }
    }

    fn move_caret(&mut self, motion: Caret) {
        self.caret = match motion {
            Caret::Left => self.caret.saturating_sub(1),
            Caret::Right => (self.caret + 1).min(self.chars.len()),
            Caret::Start => 0,
            Caret::End => self.chars.len(),
        };
    }

    fn kill_to_end(&mut self) {
        self.chars.truncate(self.caret);
    }

    fn kill_to_start(&mut self) {
        self.chars.drain(..self.caret);
        self.caret = 0;
    }

    /// Delete the word left of the caret, plus the whitespace run
    /// separating it from the caret.
    fn kill_word(&mut self) {
        let mut i = self.caret;
        while i > 0 && self.chars[i - 1].is_whitespace() {
            i -= 1;
        }
        while i > 0 && !self.chars[i - 1].is_whitespace() {
            i -= 1;
        }
        self.chars.drain(i..self.caret);
        self.caret = i;
    }

    /// Everything left of the caret, as a string.
    fn head(&self) -> String {
        self.chars[..self.caret].iter().collect()
    }

    /// Swap the text left of the caret for `new_head`; the tail stays.
    fn replace_head(&mut self, new_head: &str) {
        let tail = self.chars.split_off(self.caret);
        self.chars = new_head.chars().collect();
        self.caret = self.chars.len();
        self.chars.extend(tail);
    }
}

// ── History browsing ──────────────────────────────────────────────────────────

/// An active Up/Down walk through history: the entry currently shown
/// and the unfinished line stashed when the walk began.
struct Browse {
    index: usize,
    stash: String,
}

// ── Line editor ───────────────────────────────────────────────────────────────

/// Prompt-line editor: Emacs-style keys, history walking, and command
/// completion, with a plain `read_line` fallback when stdin is piped.
pub struct LineEditor {
    line: LineBuffer,
    history: History,
    browse: Option<Browse>,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

/// What `apply` decided the current read should do next.
enum Outcome {
    Pending,
    Line(String),
    Eof,
}

impl LineEditor {
    /// Create an editor with history loaded from `~/.marlin_history`.
    pub fn new() -> Self {
        LineEditor {
            line: LineBuffer::default(),
            history: History::new(),
            browse: None,
        }
    }

    /// The history store, for the `history` builtin and the REPL driver.
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// Record `line` in the history store (and its backing file).
    pub fn add_to_history(&mut self, line: &str) {
        self.history.push(line);
    }

    /// Read one line of input, displaying `prompt` to the left.
    ///
    /// Returns `Ok(Some(line))` for a submitted line, `Ok(None)` on end
    /// of input (Ctrl-D on an empty line, or stdin closed), `Err` on an
    /// I/O failure. Interactive editing needs a keyboard on the input
    /// side, so anything but a TTY stdin takes the plain-read path —
    /// which is also what lets piped tests drive the shell.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return self.read_line_plain(prompt);
        }

        self.line.clear();
        self.browse = None;

        let _raw = RawMode::enable()?;
        let mut out = io::stdout();
        write!(out, "{prompt}")?;
        out.flush()?;

        loop {
            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            // Only key presses matter; releases (seen on Windows),
            // mouse, resize and paste events are skipped.
            let Event::Key(key) = ev else { continue };
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                continue;
            }

            match self.apply(decode(key), prompt, &mut out)? {
                Outcome::Pending => {}
                Outcome::Line(text) => return Ok(Some(text)),
                Outcome::Eof => return Ok(None),
            }
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Non-TTY path: emit the prompt, then one buffered line.
    fn read_line_plain(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    }

    /// Perform one decoded edit, then repaint. Every edit funnels
    /// through the same single repaint at the bottom, so no arm has to
    /// remember to redraw.
    fn apply(&mut self, edit: Edit, prompt: &str, out: &mut impl Write) -> io::Result<Outcome> {
        match edit {
            Edit::Submit => {
                // Raw mode suppressed the terminal's own newline.
                write!(out, "\r\n")?;
                out.flush()?;
                return Ok(Outcome::Line(self.line.text()));
            }
            Edit::DeleteOrEof => {
                if self.line.is_empty() {
                    write!(out, "\r\n")?;
                    out.flush()?;
                    return Ok(Outcome::Eof);
                }
                self.line.delete_forward();
            }
            Edit::CancelLine => {
                // Raw mode turns Ctrl-C into a key event instead of a
                // SIGINT, so abandoning the line happens right here.
                write!(out, "^C\r\n")?;
                self.line.clear();
                self.browse = None;
            }
            Edit::Insert(c) => self.line.insert(c),
            Edit::DeleteBack => self.line.delete_back(),
            Edit::DeleteForward => self.line.delete_forward(),
            Edit::Move(motion) => self.line.move_caret(motion),
            Edit::KillToEnd => self.line.kill_to_end(),
            Edit::KillToStart => self.line.kill_to_start(),
            Edit::KillWord => self.line.kill_word(),
            Edit::BrowseOlder => self.browse_older(),
            Edit::BrowseNewer => self.browse_newer(),
            Edit::Complete => self.complete_command(out)?,
            Edit::ClearScreen => queue!(out, Clear(ClearType::All), MoveTo(0, 0))?,
            Edit::Ignore => return Ok(Outcome::Pending),
        }

        self.paint(out, prompt)?;
        Ok(Outcome::Pending)
    }

    /// Repaint the prompt line from scratch and park the terminal
    /// cursor at the caret. One unconditional path keeps screen state
    /// and buffer state from drifting apart.
    fn paint(&self, out: &mut impl Write, prompt: &str) -> io::Result<()> {
        let caret_col = (prompt.chars().count() + self.line.caret) as u16;
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        write!(out, "{prompt}{}", self.line.text())?;
        queue!(out, MoveToColumn(caret_col))?;
        out.flush()
    }

    /// Step to the next-older history entry. The first step stashes
    /// whatever was being typed; at the oldest entry further steps
    /// hold position.
    fn browse_older(&mut self) {
        let index = match &self.browse {
            None => self.history.len().checked_sub(1),
            Some(b) => b.index.checked_sub(1),
        };
        let Some(index) = index else { return };

        match &mut self.browse {
            Some(b) => b.index = index,
            None => {
                self.browse = Some(Browse {
                    index,
                    stash: self.line.text(),
                })
            }
        }
        let entry = self.history.entries()[index].clone();
        self.line.set_text(&entry);
    }

    /// Step back toward the present; walking past the newest entry
    /// ends the browse and restores the stashed line.
    fn browse_newer(&mut self) {
        let Some(b) = &mut self.browse else { return };
        b.index += 1;

        if b.index < self.history.len() {
            let entry = self.history.entries()[b.index].clone();
            self.line.set_text(&entry);
        } else {
            let stash = self.browse.take().map(|b| b.stash).unwrap_or_default();
            self.line.set_text(&stash);
        }
    }

    /// Complete the command word against builtin names and PATH
    /// executables. Past the first word Tab just rings the bell.
    fn complete_command(&mut self, out: &mut impl Write) -> io::Result<()> {
        let head = self.line.head();
        if head.is_empty() || head.contains(' ') {
            return write!(out, "\x07");
        }

        let mut names: Vec<String> = completion::candidates(&head).collect();
        names.sort();
        names.dedup();

        match names.as_slice() {
            [] => write!(out, "\x07")?,
            [single] => self.line.replace_head(&format!("{single} ")),
            _ => {
                let stem = completion::longest_common_prefix(&names);
                if stem.chars().count() > head.chars().count() {
                    self.line.replace_head(&stem);
                } else {
                    // Nothing left to extend — show the choices; the
                    // repaint after this redraws the prompt below them.
                    write!(out, "\r\n{}\r\n", names.join("  "))?;
                }
            }
        }
        Ok(())
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
