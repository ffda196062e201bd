//! Prompt canonicalization and provider output sanitization.
//!
//! Canonical keys drive both the static answer table and the response cache.
//! Sanitization turns raw model output into a single clean line and strips
//! a leading echo of the prompt, which text-generation endpoints commonly
//! prepend to their output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Control characters plus the markdown noise `*`, `#` and `\`.
static NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{Cc}*#\\]").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonical lookup key for a prompt: trimmed and lower-cased.
pub fn canonicalize(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Sanitize raw provider output for the given prompt.
///
/// 1. Replace control characters, `*`, `#` and `\` with a space.
/// 2. Collapse whitespace runs into one space.
/// 3. Strip a leading case-insensitive echo of `prompt` together with the
///    non-word characters that follow it.
/// 4. Trim.
///
/// Echoes are stripped until none is left, so the function is idempotent.
pub fn sanitize_output(prompt: &str, raw: &str) -> String {
    let mut text = collapse(raw);

    if let Some(echo) = echo_pattern(prompt) {
        while let Some(m) = echo.find(&text) {
            if m.end() == 0 {
                break;
            }
            text = text[m.end()..].trim_start().to_string();
        }
    }

    text.trim().to_string()
}

fn collapse(text: &str) -> String {
    let spaced = NOISE_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(&spaced, " ").trim().to_string()
}

/// Anchored pattern matching the prompt at the start of already-collapsed text.
///
/// The prompt goes through the same collapsing as the output so that an echo
/// containing newlines or markdown still matches. No word boundary is
/// required after the echo: output never starts with the prompt once stripped.
fn echo_pattern(prompt: &str) -> Option<Regex> {
    let needle = collapse(prompt);
    if needle.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)^{}\W*", regex::escape(&needle));
    Regex::new(&pattern).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_trims_and_lowercases() {
        assert_eq!(canonicalize("  Ciao \n"), "ciao");
        assert_eq!(canonicalize("BUONGIORNO"), "buongiorno");
        assert_eq!(canonicalize("Che Ore Sono?"), "che ore sono?");
    }

    #[test]
    fn test_canonicalize_keeps_inner_whitespace() {
        assert_eq!(canonicalize(" come  stai "), "come  stai");
    }

    #[test]
    fn test_strips_echoed_prompt() {
        let out = sanitize_output(
            "Tell me a joke",
            "Tell me a joke\nWhy did the chicken cross the road?",
        );
        assert_eq!(out, "Why did the chicken cross the road?");
    }

    #[test]
    fn test_echo_match_is_case_insensitive() {
        let out = sanitize_output("tell me a joke", "TELL ME A JOKE: knock knock");
        assert_eq!(out, "knock knock");
    }

    #[test]
    fn test_removes_newlines_and_markdown_noise() {
        let out = sanitize_output("x", "## Title\r\n**bold**\\n text\t\tend");
        assert!(!out.contains('\n'));
        assert!(!out.contains('\r'));
        assert!(!out.contains('*'));
        assert!(!out.contains('#'));
        assert!(!out.contains('\\'));
        assert_eq!(out, "Title bold n text end");
    }

    #[test]
    fn test_prompt_with_regex_metacharacters() {
        let out = sanitize_output("what is 2+2?", "What is 2+2? It is 4.");
        assert_eq!(out, "It is 4.");
    }

    #[test]
    fn test_echo_stripped_even_when_glued_to_next_word() {
        assert_eq!(sanitize_output("hi", "Hi5 there"), "5 there");
        assert_eq!(sanitize_output("hi", "his name is Bob"), "s name is Bob");
    }

    #[test]
    fn test_output_never_starts_with_prompt() {
        let samples = [
            ("hi", "Hi5 there"),
            ("ha", "hahaha ok"),
            ("Ciao", "CIAO!!! ciao, come va?"),
            ("tell me", "Tell meTell me more"),
        ];
        for (prompt, raw) in samples {
            let out = sanitize_output(prompt, raw);
            assert!(
                !out.to_lowercase().starts_with(&prompt.to_lowercase()),
                "{out:?} still starts with {prompt:?}"
            );
            assert_eq!(sanitize_output(prompt, &out), out);
        }
    }

    #[test]
    fn test_echo_only_in_middle_is_kept() {
        let out = sanitize_output("joke", "Here is a joke for you");
        assert_eq!(out, "Here is a joke for you");
    }

    #[test]
    fn test_multiline_prompt_echo_stripped() {
        let out = sanitize_output("line one\nline two", "line one line two - answer");
        assert_eq!(out, "answer");
    }

    #[test]
    fn test_repeated_echo_is_idempotent() {
        let prompt = "joke";
        let once = sanitize_output(prompt, "joke joke joke punchline");
        assert_eq!(once, "punchline");
        assert_eq!(sanitize_output(prompt, &once), once);
    }

    #[test]
    fn test_idempotent_across_samples() {
        let samples = [
            ("Ciao", "Ciao!\n\nCiao a te, come va?"),
            ("Tell me a joke", "Tell me a joke\nWhy did the chicken cross the road?"),
            ("hello", "   *** hello ***   world  "),
            ("", "plain\ttext\n"),
            ("what?", "What? what? fine"),
        ];
        for (prompt, raw) in samples {
            let once = sanitize_output(prompt, raw);
            let twice = sanitize_output(prompt, &once);
            assert_eq!(once, twice, "not idempotent for prompt {prompt:?}");
            assert!(!once.contains('\n'));
        }
    }

    #[test]
    fn test_output_that_is_only_echo_becomes_empty() {
        assert_eq!(sanitize_output("Ciao", "Ciao!"), "");
    }

    #[test]
    fn test_empty_prompt_skips_echo_stripping() {
        assert_eq!(sanitize_output("   ", "  some text "), "some text");
    }
}
