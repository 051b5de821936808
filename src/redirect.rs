/// How a redirection target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Write to file, truncating existing contents
    Truncate,
    /// Write to file, appending to existing contents
    Append,
}

/// A single output redirection: a target path and how to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub path: String,
    pub mode: RedirectMode,
}

impl RedirectTarget {
    fn new(path: &str, mode: RedirectMode) -> Self {
        Self {
            path: path.to_string(),
            mode,
        }
    }
}

/// The redirections attached to one command: at most one per stream.
#[derive(Debug, Clone, Default)]
pub struct RedirectionSet {
    pub stdout: Option<RedirectTarget>,
    pub stderr: Option<RedirectTarget>,
}

impl RedirectionSet {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }

    fn set(&mut self, stream: Stream, target: RedirectTarget) {
        match stream {
            Stream::Stdout => self.stdout = Some(target),
            Stream::Stderr => self.stderr = Some(target),
        }
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Separate the first redirection from the argument tokens.
///
/// Scans left to right. When an operator is recognized — standalone
/// (`>`, `>>`, `1>`, `1>>`, `2>`, `2>>`, target in the next token) or
/// attached (`>file`, `2>>file`, …, target in the same token) — the
/// operator and its target are removed and the scan stops, so the first
/// redirection wins. A standalone operator with no following token
/// extracts nothing and the token vector is returned as-is.
pub fn extract_redirections(tokens: &[String]) -> (Vec<String>, RedirectionSet) {
    let mut redirections = RedirectionSet::default();

    for (i, token) in tokens.iter().enumerate() {
        // Standalone operators: the target is the next token.
        let standalone = match token.as_str() {
            "2>>" => Some((Stream::Stderr, RedirectMode::Append)),
            ">>" | "1>>" => Some((Stream::Stdout, RedirectMode::Append)),
            "2>" => Some((Stream::Stderr, RedirectMode::Truncate)),
            ">" | "1>" => Some((Stream::Stdout, RedirectMode::Truncate)),
            _ => None,
        };

        if let Some((stream, mode)) = standalone {
            let Some(target) = tokens.get(i + 1) else {
                // Dangling operator: nothing extracted, everything kept.
                return (tokens.to_vec(), redirections);
            };
            redirections.set(stream, RedirectTarget::new(target, mode));
            let mut args = tokens[..i].to_vec();
            args.extend_from_slice(&tokens[i + 2..]);
            return (args, redirections);
        }

        // Attached operators: the operator is a strict prefix of the
        // token and the target is the remainder. Longest match first so
        // `2>>f` is append-to-stderr rather than `2>` with target `>f`.
        let attached = [
            ("2>>", Stream::Stderr, RedirectMode::Append),
            ("1>>", Stream::Stdout, RedirectMode::Append),
            (">>", Stream::Stdout, RedirectMode::Append),
            ("2>", Stream::Stderr, RedirectMode::Truncate),
            ("1>", Stream::Stdout, RedirectMode::Truncate),
            (">", Stream::Stdout, RedirectMode::Truncate),
        ]
        .into_iter()
        .find_map(|(op, stream, mode)| {
            token
                .strip_prefix(op)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (stream, RedirectTarget::new(rest, mode)))
        });

        if let Some((stream, target)) = attached {
            redirections.set(stream, target);
            let mut args = tokens[..i].to_vec();
            args.extend_from_slice(&tokens[i + 1..]);
            return (args, redirections);
        }
    }

    (tokens.to_vec(), redirections)
}
