//! Prompt construction for the two rewrite flows
//!
//! Pure functions with no failure mode: (mode, source text) in, final
//! instruction string out. The model is instructed to return only the
//! rewritten text, so the daemon can inject the response verbatim.

use crate::config::RewriteMode;

/// Mode name that triggers tone-matching instead of verbatim instructions.
///
/// A mode with this exact name treats its prompt text as a tone description
/// rather than as the instruction itself.
pub const TONE_MODE_NAME: &str = "My Tone";

/// Build the one-shot grammar correction prompt.
pub fn grammar_prompt(text: &str) -> String {
    format!(
        "Fix any grammar, spelling, and punctuation errors in the following text. \
         Preserve the original meaning, tone, and formatting. \
         Return ONLY the corrected text. \
         Do NOT wrap output in quotes or markdown formatting. \
         Do NOT add any explanations or comments.\n\n{}",
        text
    )
}

/// Build the prompt for a rewrite mode.
///
/// The source text is always the trailing part of the returned string.
pub fn rewrite_prompt(mode: &RewriteMode, text: &str) -> String {
    let instruction = if mode.name == TONE_MODE_NAME {
        format!(
            "Rewrite the following text to match this tone: {}. \
             Fix any grammar, spelling, and punctuation errors in the process. \
             Preserve the original meaning and key information.",
            mode.prompt
        )
    } else {
        mode.prompt.clone()
    };

    format!(
        "{} \
         Never use em dashes or semicolons. Use commas or periods instead. \
         Return ONLY the rewritten text. \
         Do NOT wrap output in quotes or markdown formatting. \
         Do NOT add any explanations or comments.\n\n{}",
        instruction, text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeId;

    fn mode(name: &str, prompt: &str) -> RewriteMode {
        RewriteMode {
            id: ModeId::new(),
            name: name.to_string(),
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn test_grammar_prompt_ends_with_source_text() {
        let prompt = grammar_prompt("teh quick brown fox");
        assert!(prompt.ends_with("\n\nteh quick brown fox"));
        assert!(prompt.contains("grammar, spelling, and punctuation"));
    }

    #[test]
    fn test_rewrite_prompt_uses_mode_prompt_verbatim() {
        let m = mode("Formal", "Rewrite this text in a formal register.");
        let prompt = rewrite_prompt(&m, "hey there");
        assert!(prompt.starts_with("Rewrite this text in a formal register."));
        assert!(prompt.ends_with("\n\nhey there"));
    }

    #[test]
    fn test_tone_mode_wraps_prompt_as_tone_description() {
        let m = mode(TONE_MODE_NAME, "casual, direct");
        let prompt = rewrite_prompt(&m, "some text");
        assert!(prompt.contains("match this tone: casual, direct"));
        assert!(prompt.contains("Preserve the original meaning and key information"));
        assert!(prompt.ends_with("\n\nsome text"));
    }

    #[test]
    fn test_rewrite_prompt_forbids_em_dashes_and_semicolons() {
        let m = mode("Formal", "Make it formal.");
        let prompt = rewrite_prompt(&m, "text");
        assert!(prompt.contains("Never use em dashes or semicolons"));
    }

    #[test]
    fn test_empty_mode_prompt_is_passthrough() {
        // An untitled mode with an empty prompt still produces a valid
        // instruction: just the consistency rules plus the source text.
        let m = mode("", "");
        let prompt = rewrite_prompt(&m, "unchanged text");
        assert!(prompt.ends_with("\n\nunchanged text"));
    }
}
