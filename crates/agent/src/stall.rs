//! Stall detection: is the model repeating itself?

use wayfarer_core::message::{Message, Role};

/// Instruction prepended to the next-step prompt once a stall is seen.
pub const STALL_CORRECTION: &str = "Repeated response observed. Consider a new strategy and avoid \
     repeating paths that were already tried without success.";

/// Whether the latest assistant turn repeats earlier ones.
///
/// Looks at the most recent assistant turn and counts earlier assistant
/// turns with exactly the same text. The run is stalled once that count
/// reaches `threshold`, i.e. the same output has appeared `threshold + 1`
/// times. Empty assistant text (pure tool invocations) never counts.
pub fn is_stalled(messages: &[Message], threshold: usize) -> bool {
    if messages.len() < 2 {
        return false;
    }

    let Some(last_idx) = messages.iter().rposition(|m| m.role == Role::Assistant) else {
        return false;
    };
    let last = &messages[last_idx].content;
    if last.is_empty() {
        return false;
    }

    let repeats = messages[..last_idx]
        .iter()
        .filter(|m| m.role == Role::Assistant && m.content == *last)
        .count();

    repeats >= threshold
}

/// The next-step prompt after a stall: correction first, then the old text.
pub fn with_correction(next_step_prompt: &str) -> String {
    format!("{STALL_CORRECTION}\n{next_step_prompt}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(texts: &[(Role, &str)]) -> Vec<Message> {
        texts
            .iter()
            .map(|(role, text)| match role {
                Role::User => Message::user(*text),
                Role::Assistant => Message::assistant(*text),
                Role::System => Message::system(*text),
                Role::Tool => Message::tool_result("call", *text),
            })
            .collect()
    }

    #[test]
    fn fewer_than_two_turns_is_not_stalled() {
        assert!(!is_stalled(&[], 0));
        assert!(!is_stalled(&turns(&[(Role::Assistant, "OK")]), 0));
    }

    #[test]
    fn threshold_plus_one_occurrences_stall() {
        let msgs = turns(&[
            (Role::User, "go"),
            (Role::Assistant, "OK"),
            (Role::Assistant, "OK"),
            (Role::Assistant, "OK"),
        ]);
        assert!(is_stalled(&msgs, 2));
    }

    #[test]
    fn threshold_occurrences_do_not_stall() {
        let msgs = turns(&[
            (Role::User, "go"),
            (Role::Assistant, "OK"),
            (Role::Assistant, "OK"),
        ]);
        assert!(!is_stalled(&msgs, 2));
    }

    #[test]
    fn only_exact_matches_count() {
        let msgs = turns(&[
            (Role::User, "go"),
            (Role::Assistant, "OK"),
            (Role::Assistant, "ok"),
            (Role::Assistant, "OK "),
            (Role::Assistant, "OK"),
        ]);
        assert!(!is_stalled(&msgs, 2));
    }

    #[test]
    fn user_and_tool_turns_are_ignored() {
        let msgs = turns(&[
            (Role::User, "OK"),
            (Role::Tool, "OK"),
            (Role::Assistant, "OK"),
            (Role::Tool, "OK"),
            (Role::Assistant, "OK"),
            (Role::Tool, "result"),
        ]);
        assert!(!is_stalled(&msgs, 2));
        assert!(is_stalled(&msgs, 1));
    }

    #[test]
    fn empty_assistant_text_is_never_stalled() {
        let msgs = turns(&[
            (Role::User, "go"),
            (Role::Assistant, ""),
            (Role::Assistant, ""),
            (Role::Assistant, ""),
        ]);
        assert!(!is_stalled(&msgs, 2));
    }

    #[test]
    fn no_assistant_turn_is_not_stalled() {
        let msgs = turns(&[(Role::User, "a"), (Role::User, "a")]);
        assert!(!is_stalled(&msgs, 0));
    }

    #[test]
    fn detection_is_idempotent() {
        let msgs = turns(&[
            (Role::User, "go"),
            (Role::Assistant, "OK"),
            (Role::Assistant, "OK"),
            (Role::Assistant, "OK"),
        ]);
        let first = is_stalled(&msgs, 2);
        let second = is_stalled(&msgs, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn correction_is_prepended_with_newline() {
        let next = with_correction("Pick the next tool.");
        assert!(next.starts_with(STALL_CORRECTION));
        assert!(next.ends_with("\nPick the next tool."));
    }
}
