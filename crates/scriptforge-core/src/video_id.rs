//! YouTube video id extraction.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Length of a YouTube video id.
pub const VIDEO_ID_LEN: usize = 11;

fn bare_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("bare id pattern compiles"))
}

fn url_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^(?:https?://)?
            (?:(?:www|m|music)\.)?
            (?:
                youtube(?:-nocookie)?\.com/
                (?:
                    watch\?(?:[^\#\s]*&)?v=
                  | embed/
                  | shorts/
                  | live/
                  | v/
                )
              | youtu\.be/
            )
            ([A-Za-z0-9_-]{11})
            (?:[?&\#/].*)?$",
        )
        .expect("url pattern compiles")
    })
}

/// Extract the 11-character video id from a YouTube URL or a bare id.
///
/// Accepts `watch?v=`, `youtu.be/`, `/embed/`, `/shorts/`, `/live/` and `/v/`
/// forms, with or without scheme and `www.`/`m.` host prefixes.
///
/// # Errors
///
/// Returns [`Error::InvalidVideoUrl`] when no id can be found.
pub fn extract_video_id(input: &str) -> Result<String> {
    let input = input.trim();

    if bare_id().is_match(input) {
        return Ok(input.to_string());
    }

    url_id()
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidVideoUrl {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn accepts_common_url_shapes() {
        let inputs = [
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?rel=0",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "  https://youtu.be/dQw4w9WgXcQ  ",
        ];
        for input in inputs {
            assert_eq!(extract_video_id(input).unwrap(), ID, "{input}");
        }
    }

    #[test]
    fn rejects_other_inputs() {
        let inputs = [
            "",
            "dQw4w9WgXc",
            "dQw4w9WgXcQQ",
            "https://vimeo.com/123456789",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/channel/UCabcdefghijk",
            "https://notyoutube.com/watch?v=dQw4w9WgXcQ",
        ];
        for input in inputs {
            assert!(
                matches!(extract_video_id(input), Err(Error::InvalidVideoUrl { .. })),
                "{input}"
            );
        }
    }
}
