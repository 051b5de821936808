use crate::builtins;
use crate::path;

/// Candidate command names for a prefix: builtin names first, then
/// executables found on PATH, in PATH order.
///
/// The sequence is lazy and restartable — each call rescans PATH, so
/// candidates reflect the environment at the moment of the keystroke.
/// Callers dedupe/sort as needed for display.
pub fn candidates(prefix: &str) -> impl Iterator<Item = String> {
    let owned = prefix.to_string();
    let builtin_names = builtins::BUILTINS
        .iter()
        .filter(move |name| name.starts_with(&owned))
        .map(|name| name.to_string());

    builtin_names.chain(path::executables_matching(prefix))
}

/// The longest prefix shared by every candidate.
pub fn longest_common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };

    let mut prefix = first.as_str();
    for candidate in &candidates[1..] {
        let common = prefix
            .char_indices()
            .zip(candidate.chars())
            .take_while(|((_, a), b)| a == b)
            .count();
        let end = prefix
            .char_indices()
            .nth(common)
            .map(|(i, _)| i)
            .unwrap_or(prefix.len());
        prefix = &prefix[..end];
        if prefix.is_empty() {
            break;
        }
    }
    prefix.to_string()
}
