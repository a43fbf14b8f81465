//! Prompt construction for script generation.

use std::fmt::Write as _;

use crate::content::{Script, ScriptOptions, ScriptStyle};

/// Speaking rate used to turn a target duration into a word count.
pub const WORDS_PER_MINUTE: u32 = 150;

/// Maximum transcript characters sent to the model.
pub const MAX_TRANSCRIPT_CHARS: usize = 24_000;

/// Footer appended to scripts generated on tiers without watermark-free output.
pub const WATERMARK: &str = "\n\n---\nGenerated with ScriptForge AI (free plan)";

/// System prompt shared by every generation.
pub const SYSTEM_PROMPT: &str = "You are ScriptForge, a professional video scriptwriter. \
You turn source transcripts into original, well-structured scripts ready to be read on camera. \
Write only the script itself: no preamble, no notes to the user, no markdown code fences.";

/// A chat prompt: system and user messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System message.
    pub system: String,
    /// User message.
    pub user: String,
}

/// Inputs to a fresh generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationBrief<'a> {
    /// Video title, for context.
    pub title: &'a str,
    /// Joined transcript text.
    pub transcript: &'a str,
    /// Requested style.
    pub style: ScriptStyle,
    /// Target duration.
    pub duration_minutes: u32,
    /// Intended audience.
    pub audience: &'a str,
    /// Content toggles.
    pub options: ScriptOptions,
}

/// Target word count for a duration.
#[must_use]
pub const fn target_words(duration_minutes: u32) -> u32 {
    duration_minutes.saturating_mul(WORDS_PER_MINUTE)
}

fn style_guidance(style: ScriptStyle) -> &'static str {
    match style {
        ScriptStyle::Professional => {
            "Use a clear, confident, businesslike voice. Favor precise language and short paragraphs."
        }
        ScriptStyle::Casual => {
            "Sound like a friend talking to camera. Use contractions, plain words and a relaxed rhythm."
        }
        ScriptStyle::Educational => {
            "Teach. Introduce each idea, explain it step by step, and recap the key points at the end."
        }
        ScriptStyle::Entertaining => {
            "Keep the energy high. Use humor, vivid examples and quick pacing to hold attention."
        }
        ScriptStyle::Persuasive => {
            "Build an argument. State the problem, present evidence, handle objections and drive toward a decision."
        }
        ScriptStyle::Narrative => {
            "Tell a story with a clear beginning, tension and resolution. Use scenes and concrete detail."
        }
        ScriptStyle::Academic => {
            "Use a formal, rigorous register. Define terms, qualify claims and attribute ideas to the source."
        }
    }
}

fn push_options(out: &mut String, options: ScriptOptions) {
    if options.include_hook {
        out.push_str("- Open with a strong hook in the first two sentences.\n");
    }
    if options.include_call_to_action {
        out.push_str("- Close with a clear call to action.\n");
    }
    if options.include_timestamps {
        out.push_str("- Prefix each section with an approximate timestamp like [00:00].\n");
    }
    if options.include_b_roll {
        out.push_str("- Suggest B-roll shots in square brackets, e.g. [B-ROLL: city skyline].\n");
    }
}

/// Cut `text` to at most `max_chars` characters on a word boundary.
#[must_use]
pub fn truncate_transcript(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        None => text,
        Some((cut, _)) => {
            let head = &text[..cut];
            head.rfind(char::is_whitespace)
                .map_or(head, |space| head[..space].trim_end())
        }
    }
}

/// Build the prompt for a new script.
#[must_use]
pub fn build_generation_prompt(brief: &GenerationBrief<'_>) -> Prompt {
    let transcript = truncate_transcript(brief.transcript, MAX_TRANSCRIPT_CHARS);
    let mut user = String::new();

    let _ = writeln!(
        user,
        "Write a {} video script of about {} words (roughly {} minute{}).",
        brief.style,
        target_words(brief.duration_minutes),
        brief.duration_minutes,
        if brief.duration_minutes == 1 { "" } else { "s" },
    );
    let _ = writeln!(user, "Audience: {}.", brief.audience.trim());
    let _ = writeln!(user, "Style: {}", style_guidance(brief.style));
    user.push_str("Requirements:\n");
    user.push_str("- Rework the ideas in your own words; do not copy the transcript.\n");
    push_options(&mut user, brief.options);
    let _ = writeln!(user, "\nSource video: {}", brief.title.trim());
    user.push_str("Source transcript:\n\"\"\"\n");
    user.push_str(transcript);
    user.push_str("\n\"\"\"\n");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Build the prompt for remixing an existing script into new parameters.
#[must_use]
pub fn build_remix_prompt(
    source: &Script,
    style: ScriptStyle,
    duration_minutes: u32,
    audience: &str,
    options: ScriptOptions,
) -> Prompt {
    let source_text = strip_watermark(&source.content);
    let source_text = truncate_transcript(source_text, MAX_TRANSCRIPT_CHARS);
    let mut user = String::new();

    let _ = writeln!(
        user,
        "Rewrite the following {} script as a {} script of about {} words.",
        source.style,
        style,
        target_words(duration_minutes),
    );
    let _ = writeln!(user, "Audience: {}.", audience.trim());
    let _ = writeln!(user, "Style: {}", style_guidance(style));
    user.push_str("Requirements:\n");
    user.push_str("- Keep the core message; change structure, tone and length as needed.\n");
    push_options(&mut user, options);
    user.push_str("\nOriginal script:\n\"\"\"\n");
    user.push_str(source_text);
    user.push_str("\n\"\"\"\n");

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Append the watermark footer.
#[must_use]
pub fn apply_watermark(content: &str) -> String {
    let mut out = content.trim_end().to_string();
    out.push_str(WATERMARK);
    out
}

/// Remove a trailing watermark footer, if present.
#[must_use]
pub fn strip_watermark(content: &str) -> &str {
    content.strip_suffix(WATERMARK).unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(transcript: &str) -> GenerationBrief<'_> {
        GenerationBrief {
            title: "How Rust works",
            transcript,
            style: ScriptStyle::Educational,
            duration_minutes: 4,
            audience: "beginner programmers",
            options: ScriptOptions {
                include_hook: true,
                include_b_roll: true,
                ..ScriptOptions::default()
            },
        }
    }

    #[test]
    fn prompt_carries_parameters() {
        let prompt = build_generation_prompt(&brief("ownership and borrowing"));
        assert_eq!(prompt.system, SYSTEM_PROMPT);
        assert!(prompt.user.contains("educational video script of about 600 words"));
        assert!(prompt.user.contains("Audience: beginner programmers."));
        assert!(prompt.user.contains("strong hook"));
        assert!(prompt.user.contains("B-roll"));
        assert!(!prompt.user.contains("call to action"));
        assert!(prompt.user.contains("ownership and borrowing"));
    }

    #[test]
    fn long_transcripts_are_truncated_on_word_boundary() {
        let transcript = "word ".repeat(10_000);
        let cut = truncate_transcript(&transcript, 23);
        assert_eq!(cut, "word word word word");

        let prompt = build_generation_prompt(&brief(&transcript));
        assert!(prompt.user.len() < MAX_TRANSCRIPT_CHARS + 2_000);
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_transcript("héllo wörld", 100), "héllo wörld");
    }

    #[test]
    fn watermark_round_trip() {
        let marked = apply_watermark("Script body\n\n");
        assert!(marked.ends_with(WATERMARK));
        assert_eq!(strip_watermark(&marked), "Script body");
    }

    #[test]
    fn words_per_minute() {
        assert_eq!(target_words(1), 150);
        assert_eq!(target_words(60), 9_000);
    }
}
