//! Spoken command recognition
//!
//! Matches a transcribed utterance against the small navigation grammar:
//!
//! ```text
//! (take me to | navigate to | go to) [the] [nearest] (train station | bus stop | subway [station])
//! stop [navigation] | cancel navigation
//! ```

use crate::providers::TransitKind;

/// Something the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Walk to the nearest stop of this kind
    Navigate(TransitKind),
    /// End the current navigation session
    Stop,
}

const NAVIGATE_PREFIXES: &[&str] = &["take me to ", "navigate to ", "go to "];

const STOP_PHRASES: &[&str] = &[
    "stop",
    "stop navigation",
    "stop navigating",
    "cancel navigation",
];

/// Parse a transcribed utterance
///
/// Case and punctuation are ignored. Returns `None` for anything outside the
/// grammar.
#[must_use]
pub fn parse(text: &str) -> Option<Command> {
    let normalized = normalize(text);
    let phrase = normalized.strip_prefix("please ").unwrap_or(&normalized);

    if STOP_PHRASES.contains(&phrase) {
        return Some(Command::Stop);
    }

    let rest = NAVIGATE_PREFIXES
        .iter()
        .find_map(|prefix| phrase.strip_prefix(prefix))?;
    let rest = rest.strip_prefix("the ").unwrap_or(rest);
    let rest = rest.strip_prefix("nearest ").unwrap_or(rest);

    let kind = match rest {
        "train station" => TransitKind::Train,
        "bus stop" => TransitKind::Bus,
        "subway" | "subway station" => TransitKind::Subway,
        _ => return None,
    };
    Some(Command::Navigate(kind))
}

/// Lowercase, drop punctuation, collapse whitespace
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
