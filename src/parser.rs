/// A parsed command with a program name and its arguments.
#[derive(Debug, Clone)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

/// States for the tokenizer state machine.
enum State {
    /// Between or inside unquoted text — whitespace delimits tokens
    Outside,
    /// Inside single quotes — everything is literal
    SingleQuote,
    /// Inside double quotes — whitespace is preserved
    DoubleQuote,
}

/// Tokenize a shell input line into a list of words.
///
/// Handles:
/// - Unquoted words split by whitespace
/// - Single-quoted strings ('hello world' → one token, everything literal)
/// - Double-quoted strings ("hello world" → one token, \" and \\ escaped)
/// - Backslash escapes outside quotes (hello\ world → one token)
///
/// Adjacent quoted and unquoted segments concatenate into one token
/// (a'b'c → abc). Unterminated quotes are tolerated: the rest of the
/// line is taken literally. Empty tokens are never produced.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut state = State::Outside;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            // ── Outside quotes ──
            (State::Outside, ' ' | '\t') => {
                // Delimiter: flush the token in progress, if any
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            (State::Outside, '\'') => {
                state = State::SingleQuote;
            }
            (State::Outside, '"') => {
                state = State::DoubleQuote;
            }
            (State::Outside, '\\') => {
                // Escape: take the next character literally.
                // A trailing backslash with nothing after it is dropped.
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (State::Outside, c) => {
                current.push(c);
            }

            // ── Inside '...' ──
            (State::SingleQuote, '\'') => {
                state = State::Outside;
            }
            (State::SingleQuote, c) => {
                // Everything is literal inside single quotes — no escaping at all
                current.push(c);
            }

            // ── Inside "..." ──
            (State::DoubleQuote, '"') => {
                state = State::Outside;
            }
            (State::DoubleQuote, '\\') => {
                // Inside double quotes, backslash only escapes: " and \
                match chars.peek() {
                    Some(&'"' | &'\\') => {
                        current.push(chars.next().unwrap());
                    }
                    _ => {
                        current.push('\\');
                    }
                }
            }
            (State::DoubleQuote, c) => {
                current.push(c);
            }
        }
    }

    // Flush the last token if we were mid-word (also covers an
    // unterminated quote, whose bytes accumulated literally).
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
