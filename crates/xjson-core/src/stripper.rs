//! Phase 1: comment stripping.
//!
//! Walks the raw buffer byte-by-byte and blanks out `//` and `/* ... */`
//! comments, replacing every non-newline byte with a space so that every
//! downstream byte offset (and therefore every line/column a JSON parse
//! error reports) still lines up with the original source. `#INCLUDE <...>`
//! directives are left untouched even when they appear inside a comment,
//! since that's the documented way to comment out everything *except* an
//! include.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    String,
    StringEscape,
    LineComment,
    BlockComment,
    /// Seen `/` while in `Code`, waiting to see whether the next byte opens
    /// a comment or is just a stray slash.
    MaybeComment,
    /// Seen `*` inside a block comment, waiting to see whether the next
    /// byte closes it.
    MaybeBlockEnd,
}

const INCLUDE_MARKER: &str = "#INCLUDE";

/// Strip comments from `src`, returning a same-length buffer.
///
/// Every stripped byte becomes a space; newlines inside comments are kept
/// as newlines so line numbers downstream still match the original text.
pub fn strip(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut state = State::Code;
    let mut i = 0;

    // Non-ASCII bytes never carry JSON/comment syntax meaning on their own
    // (`"`, `/`, `*`, `\`, `\n` are all single-byte ASCII), so every
    // multi-byte UTF-8 character is handled as one atomic unit: passed
    // through untouched in Code/String states, or blanked to that many
    // ASCII spaces (preserving byte length) inside a comment.
    while i < bytes.len() {
        let b = bytes[i];
        let char_len = utf8_len(b);
        match state {
            State::Code => match b {
                b'"' => {
                    state = State::String;
                    out.push('"');
                }
                b'/' => {
                    state = State::MaybeComment;
                }
                _ => out.push_str(&src[i..i + char_len]),
            },
            State::MaybeComment => match b {
                b'/' => {
                    state = State::LineComment;
                    out.push_str("  ");
                }
                b'*' => {
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => {
                    // wasn't a comment opener after all
                    out.push('/');
                    state = State::Code;
                    continue;
                }
            },
            State::String => match b {
                b'"' => {
                    state = State::Code;
                    out.push('"');
                }
                b'\\' => {
                    state = State::StringEscape;
                    out.push('\\');
                }
                _ => out.push_str(&src[i..i + char_len]),
            },
            State::StringEscape => {
                state = State::String;
                out.push_str(&src[i..i + char_len]);
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                    out.push('\n');
                } else if at_include_marker(bytes, i) {
                    let marker_len = copy_include_directive(bytes, i, &mut out);
                    i += marker_len;
                    continue;
                } else {
                    blank(&mut out, char_len);
                }
            }
            State::BlockComment => {
                if b == b'\n' {
                    out.push('\n');
                } else if b == b'*' {
                    state = State::MaybeBlockEnd;
                    blank(&mut out, 1);
                } else if at_include_marker(bytes, i) {
                    let marker_len = copy_include_directive(bytes, i, &mut out);
                    i += marker_len;
                    continue;
                } else {
                    blank(&mut out, char_len);
                }
            }
            State::MaybeBlockEnd => {
                if b == b'/' {
                    state = State::Code;
                    blank(&mut out, 1);
                } else if b == b'\n' {
                    state = State::BlockComment;
                    out.push('\n');
                } else if b == b'*' {
                    blank(&mut out, 1);
                } else {
                    state = State::BlockComment;
                    blank(&mut out, char_len);
                }
            }
        }
        i += char_len;
    }

    // A trailing bare `/` with nothing after it: not a comment, emit as-is.
    if state == State::MaybeComment {
        out.push('/');
    }

    debug_assert_eq!(out.len(), src.len(), "stripper must preserve byte length");
    out
}

/// Byte length of the UTF-8 character starting with lead byte `b`.
fn utf8_len(b: u8) -> usize {
    if b & 0x80 == 0 {
        1
    } else if b & 0xE0 == 0xC0 {
        2
    } else if b & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

fn blank(out: &mut String, byte_len: usize) {
    for _ in 0..byte_len {
        out.push(' ');
    }
}

fn at_include_marker(bytes: &[u8], i: usize) -> bool {
    bytes[i..].starts_with(INCLUDE_MARKER.as_bytes())
}

/// Copy `#INCLUDE <...>` verbatim into `out`, returning how many bytes were
/// consumed. The directive runs to the matching `>` or to end-of-line,
/// whichever comes first.
fn copy_include_directive(bytes: &[u8], start: usize, out: &mut String) -> usize {
    let mut end = start;
    let mut seen_open = false;
    while end < bytes.len() {
        let b = bytes[end];
        if b == b'\n' {
            break;
        }
        if b == b'<' {
            seen_open = true;
        }
        end += 1;
        if seen_open && b == b'>' {
            break;
        }
    }
    let text = std::str::from_utf8(&bytes[start..end]).expect("ASCII-safe slice");
    let _ = write!(out, "{text}");
    end - start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_length_and_newlines() {
        let src = "{\n  // a comment\n  \"a\": 1 /* inline */\n}\n";
        let out = strip(src);
        assert_eq!(out.len(), src.len());
        assert_eq!(
            src.chars().filter(|&c| c == '\n').count(),
            out.chars().filter(|&c| c == '\n').count()
        );
    }

    #[test]
    fn blanks_line_comments() {
        let src = "{\"a\": 1} // trailing\n";
        let out = strip(src);
        assert!(!out.contains("trailing"));
        assert!(out.starts_with("{\"a\": 1}"));
    }

    #[test]
    fn blanks_block_comments_across_lines() {
        let src = "/* line one\nline two */{}";
        let out = strip(src);
        assert!(!out.contains("line"));
        assert!(out.trim_end().ends_with("{}"));
    }

    #[test]
    fn leaves_strings_alone() {
        let src = r#"{"a": "// not a comment /* either */"}"#;
        let out = strip(src);
        assert_eq!(out, src);
    }

    #[test]
    fn string_escapes_do_not_close_early() {
        let src = r#"{"a": "esc \" still string // nope"}"#;
        let out = strip(src);
        assert_eq!(out, src);
    }

    #[test]
    fn preserves_include_inside_line_comment() {
        let src = "// #INCLUDE <other.json>\n{}";
        let out = strip(src);
        assert!(out.contains("#INCLUDE <other.json>"));
        assert_eq!(out.len(), src.len());
    }

    #[test]
    fn non_ascii_string_content_survives_untouched() {
        let src = r#"{"city": "café", "note": "日本語 // not a comment"}"#;
        let out = strip(src);
        assert_eq!(out, src);
    }

    #[test]
    fn non_ascii_inside_a_block_comment_is_blanked_without_changing_length() {
        let src = "/* café 日本語 */{}";
        let out = strip(src);
        assert!(!out.contains("café"));
        assert!(!out.contains("日本語"));
        assert_eq!(out.len(), src.len());
        assert!(out.trim_end().ends_with("{}"));
    }

    #[test]
    fn preserves_include_inside_block_comment() {
        let src = "/* #INCLUDE <other.json> */{}";
        let out = strip(src);
        assert!(out.contains("#INCLUDE <other.json>"));
        assert_eq!(out.len(), src.len());
    }
}
